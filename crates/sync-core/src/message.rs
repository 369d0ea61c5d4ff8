//! Message shapes used across the sync pipeline.

use serde::{Deserialize, Serialize};

/// A message record exactly as submitted by a client, before validation.
///
/// Every field is optional at this stage; [`normalize`](crate::normalize)
/// decides what is actually required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    /// Originating address (sender or recipient).
    pub address: Option<String>,
    /// Message text.
    pub body: Option<String>,
    /// Epoch milliseconds.
    #[serde(alias = "date")]
    pub timestamp: Option<i64>,
    /// Classification: 0 = unknown, 1 = inbound, 2 = outbound.
    #[serde(alias = "type")]
    pub message_type: Option<i64>,
    /// Contact name as known to the client, if any.
    pub contact_name: Option<String>,
    /// Client-side identifier, if any. Stored verbatim, used only to
    /// target deletes; never part of the dedup key.
    #[serde(alias = "id")]
    pub external_id: Option<String>,
    /// Pre-formatted date string from the client, if any.
    pub date_formatted: Option<String>,
}

/// A validated message in canonical shape.
///
/// Produced only by [`normalize`](crate::normalize); required fields are
/// guaranteed present and within bounds, optional fields are `None` rather
/// than sentinel strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalMessage {
    pub address: String,
    pub body: String,
    /// Epoch milliseconds, non-negative.
    pub timestamp: i64,
    /// One of 0, 1, 2.
    pub message_type: i64,
    pub contact_name: Option<String>,
    pub external_id: Option<String>,
    pub date_formatted: Option<String>,
}

impl CanonicalMessage {
    /// Derive the deduplication key for this message.
    pub fn key(&self) -> CanonicalKey {
        CanonicalKey {
            address: self.address.clone(),
            body: self.body.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// The deduplication key: two messages with equal keys for the same user
/// are the same logical message.
///
/// The key is derived from content and timestamp only. The client-supplied
/// external id deliberately does not participate, so clients that re-number
/// their local store cannot create duplicates of identical content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalKey {
    pub address: String,
    pub body: String,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(address: &str, body: &str, timestamp: i64) -> CanonicalMessage {
        CanonicalMessage {
            address: address.to_string(),
            body: body.to_string(),
            timestamp,
            message_type: 1,
            contact_name: None,
            external_id: None,
            date_formatted: None,
        }
    }

    #[test]
    fn key_ignores_optional_fields_and_type() {
        let mut a = message("+15550100", "hi", 1000);
        let mut b = message("+15550100", "hi", 1000);
        a.message_type = 1;
        a.external_id = Some("123".to_string());
        b.message_type = 2;
        b.contact_name = Some("Alice".to_string());
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn key_distinguishes_content() {
        let base = message("+15550100", "hi", 1000);
        assert_ne!(base.key(), message("+15550101", "hi", 1000).key());
        assert_ne!(base.key(), message("+15550100", "hi!", 1000).key());
        assert_ne!(base.key(), message("+15550100", "hi", 1001).key());
    }

    #[test]
    fn raw_message_accepts_wire_aliases() {
        let raw: RawMessage = serde_json::from_str(
            r#"{"address":"+15550100","body":"hi","date":1000,"type":1,"id":"abc"}"#,
        )
        .unwrap();
        assert_eq!(raw.timestamp, Some(1000));
        assert_eq!(raw.message_type, Some(1));
        assert_eq!(raw.external_id.as_deref(), Some("abc"));
    }
}
