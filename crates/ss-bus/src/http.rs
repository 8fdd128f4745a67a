//! HTTP bridge transport
//!
//! Cross-process delivery without a broker: the relay POSTs encoded events to
//! the peer service's internal ingest endpoint, carrying the partition key in
//! a header. Ordering per key holds because the relay sends sequentially and
//! awaits each response; at-least-once holds because a failed or unacked POST
//! is retried by the relay, and handlers are idempotent.

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::{BusError, EventDispatcher, EventPublisher};

pub const PARTITION_KEY_HEADER: &str = "x-partition-key";

/// Publishes events to a peer service over HTTP.
pub struct HttpEventPublisher {
    base_url: String,
    client: reqwest::Client,
}

impl HttpEventPublisher {
    pub fn new(base_url: impl Into<String>) -> Result<Self, BusError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| BusError::Publish(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }
}

#[async_trait]
impl EventPublisher for HttpEventPublisher {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), BusError> {
        let url = format!("{}/internal/events/{}", self.base_url, topic);

        let response = self
            .client
            .post(&url)
            .header(PARTITION_KEY_HEADER, key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|e| BusError::Publish(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BusError::Publish(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        debug!(topic, key, "Event delivered over HTTP bridge");
        Ok(())
    }
}

/// Ingest endpoint mounted by each service: `POST /internal/events/{topic}`.
/// The dispatch (including retries and dead-lettering) completes before the
/// 202 is returned, so a crash mid-processing leaves the sender retrying.
pub fn ingest_router(dispatcher: Arc<EventDispatcher>) -> Router {
    Router::new()
        .route("/internal/events/:topic", post(ingest))
        .with_state(dispatcher)
}

async fn ingest(
    State(dispatcher): State<Arc<EventDispatcher>>,
    Path(topic): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let key = headers
        .get(PARTITION_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    dispatcher.dispatch(&topic, &key, &body).await;
    StatusCode::ACCEPTED
}
