//! Wire codec for [`UserLifecycleEvent`]
//!
//! JSON on the wire. Decoding fails loudly on anything that is not a
//! well-formed event: invalid JSON, a missing or non-positive `id`, or an
//! unknown `kind`. No silent coercion.

use ss_common::UserLifecycleEvent;

use crate::BusError;

pub fn encode(event: &UserLifecycleEvent) -> Result<Vec<u8>, BusError> {
    serde_json::to_vec(event).map_err(|e| BusError::MalformedEvent(e.to_string()))
}

pub fn decode(bytes: &[u8]) -> Result<UserLifecycleEvent, BusError> {
    let event: UserLifecycleEvent =
        serde_json::from_slice(bytes).map_err(|e| BusError::MalformedEvent(e.to_string()))?;

    if event.id <= 0 {
        return Err(BusError::MalformedEvent(format!(
            "event id must be positive, got {}",
            event.id
        )));
    }

    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ss_common::{EventKind, Role};

    fn sample() -> UserLifecycleEvent {
        UserLifecycleEvent {
            id: 42,
            email: Some("a@x.com".to_string()),
            password: Some("$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string()),
            role: Some(Role::Employee),
            kind: EventKind::Create,
        }
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let event = sample();
        let decoded = decode(&encode(&event).unwrap()).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn round_trip_preserves_sparse_events() {
        let event = UserLifecycleEvent::deleted(7);
        let decoded = decode(&encode(&event).unwrap()).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn decode_fails_on_missing_id() {
        let err = decode(br#"{"email":"a@x.com","kind":"CREATE"}"#).unwrap_err();
        assert!(matches!(err, BusError::MalformedEvent(_)));
    }

    #[test]
    fn decode_fails_on_non_positive_id() {
        let err = decode(br#"{"id":0,"kind":"DELETE"}"#).unwrap_err();
        assert!(matches!(err, BusError::MalformedEvent(_)));
    }

    #[test]
    fn decode_fails_on_unknown_kind() {
        let err = decode(br#"{"id":1,"kind":"UPSERT"}"#).unwrap_err();
        assert!(matches!(err, BusError::MalformedEvent(_)));
    }

    #[test]
    fn decode_fails_on_garbage() {
        assert!(matches!(decode(b"not json"), Err(BusError::MalformedEvent(_))));
    }
}
