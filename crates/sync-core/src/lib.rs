//! Core reconciliation types and traits for SMSVault.
//!
//! This crate contains the storage-independent half of the bulk message
//! sync pipeline:
//!
//! - [`RawMessage`] / [`CanonicalMessage`] / [`CanonicalKey`] - message shapes
//! - [`normalize`] - per-field validation producing a canonical record
//! - [`ExistenceResolver`] / [`MessageWriter`] - storage seams
//! - [`reconcile`] - the insert/duplicate/error fold over a submitted batch
//! - [`BatchReport`] / [`BatchOutcome`] - partial-success reporting
//!
//! Nothing here touches a database or the network; the storage traits are
//! implemented by the `database` crate and by in-memory fakes in tests.
//!
//! # Example
//!
//! ```no_run
//! use sync_core::{reconcile, RawMessage};
//!
//! # async fn example<R, W>(resolver: &R, writer: &W) -> Result<(), sync_core::SyncError>
//! # where R: sync_core::ExistenceResolver + Sync, W: sync_core::MessageWriter + Sync {
//! let batch = vec![RawMessage {
//!     address: Some("+15550100".into()),
//!     body: Some("hello".into()),
//!     timestamp: Some(1700000000000),
//!     message_type: Some(1),
//!     ..Default::default()
//! }];
//! let report = reconcile(resolver, writer, 1, batch, None).await?;
//! println!("inserted {} of {}", report.inserted, report.total);
//! # Ok(())
//! # }
//! ```

mod error;
mod message;
mod normalize;
mod reconcile;
mod report;

pub use error::SyncError;
pub use message::{CanonicalKey, CanonicalMessage, RawMessage};
pub use normalize::{
    normalize, ValidationError, MAX_ADDRESS_LENGTH, MAX_BODY_LENGTH, MAX_CONTACT_NAME_LENGTH,
};
pub use reconcile::{reconcile, ExistenceResolver, MessageWriter, WriteOutcome};
pub use report::{BatchOutcome, BatchReport, ItemError, MAX_REPORTED_ERRORS};

// Re-export async_trait for storage trait implementors
pub use async_trait::async_trait;
