//! Logical topic names for the user lifecycle streams.

use ss_common::EventKind;

pub const TOPIC_USER_CREATED: &str = "staffsync.user.created";
pub const TOPIC_USER_UPDATED: &str = "staffsync.user.updated";
pub const TOPIC_USER_DELETED: &str = "staffsync.user.deleted";

/// All lifecycle topics, in the order a consumer usually subscribes.
pub const ALL_TOPICS: [&str; 3] = [TOPIC_USER_CREATED, TOPIC_USER_UPDATED, TOPIC_USER_DELETED];

/// Topic an event of the given kind is published on.
pub fn topic_for(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Create => TOPIC_USER_CREATED,
        EventKind::Update => TOPIC_USER_UPDATED,
        EventKind::Delete => TOPIC_USER_DELETED,
    }
}
