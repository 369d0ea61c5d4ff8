//! Database models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Row id, the stable user identity.
    pub id: i64,
    /// Unique login name.
    pub username: String,
    /// PHC-format password hash.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Optional display name.
    pub display_name: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
    /// Last update timestamp.
    pub updated_at: String,
}

/// A stored SMS record, owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Message {
    /// Row id.
    pub id: i64,
    /// Owning user.
    pub user_id: i64,
    /// Originating address (sender or recipient).
    pub address: String,
    /// Message text.
    pub body: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    /// Classification: 0 = unknown, 1 = inbound, 2 = outbound.
    pub message_type: i64,
    /// Contact name, if the client knew one.
    pub contact_name: Option<String>,
    /// Client-supplied identifier, if any.
    pub external_id: Option<String>,
    /// Pre-formatted date string, if the client supplied one.
    pub date_formatted: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
    /// Last update timestamp.
    pub updated_at: String,
}

/// Aggregate counts over one user's messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageStats {
    /// Total stored messages.
    pub total: i64,
    /// Counts per message type.
    pub by_type: Vec<TypeCount>,
    /// Highest-volume addresses, largest first.
    pub top_addresses: Vec<AddressCount>,
    /// Per-day counts over the recent window, newest first.
    pub recent_days: Vec<DayCount>,
}

/// Message count for one type value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct TypeCount {
    pub message_type: i64,
    pub count: i64,
}

/// Message count for one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct AddressCount {
    pub address: String,
    pub count: i64,
}

/// Message count for one calendar day (UTC, `YYYY-MM-DD`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct DayCount {
    pub day: String,
    pub count: i64,
}
