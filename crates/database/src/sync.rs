//! Storage-trait implementations binding the reconcile fold to SQLite.

use std::collections::HashSet;

use async_trait::async_trait;
use sync_core::{
    CanonicalKey, CanonicalMessage, ExistenceResolver, MessageWriter, SyncError, WriteOutcome,
};

use crate::error::DatabaseError;
use crate::message;
use crate::Database;

#[async_trait]
impl ExistenceResolver for Database {
    async fn resolve_existing(
        &self,
        user_id: i64,
        keys: &[CanonicalKey],
    ) -> Result<HashSet<CanonicalKey>, SyncError> {
        message::resolve_existing_keys(self.pool(), user_id, keys)
            .await
            .map_err(storage_unavailable)
    }
}

#[async_trait]
impl MessageWriter for Database {
    async fn insert_message(
        &self,
        user_id: i64,
        message: &CanonicalMessage,
    ) -> Result<WriteOutcome, SyncError> {
        message::insert_message(self.pool(), user_id, message)
            .await
            .map_err(storage_unavailable)
    }
}

fn storage_unavailable(err: DatabaseError) -> SyncError {
    SyncError::StorageUnavailable(err.to_string())
}
