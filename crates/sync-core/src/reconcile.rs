//! The batch reconciliation fold.

use std::collections::HashSet;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::message::{CanonicalKey, CanonicalMessage, RawMessage};
use crate::normalize::normalize;
use crate::report::BatchReport;

/// Batch lookup of already-stored keys, strictly scoped to one user.
#[async_trait]
pub trait ExistenceResolver {
    /// Return the subset of `keys` already present in storage for the user.
    ///
    /// Storage failure must surface as [`SyncError::StorageUnavailable`];
    /// unresolved keys are never reported as absent.
    async fn resolve_existing(
        &self,
        user_id: i64,
        keys: &[CanonicalKey],
    ) -> Result<HashSet<CanonicalKey>, SyncError>;
}

/// Single-row insert with uniqueness-conflict detection.
#[async_trait]
pub trait MessageWriter {
    /// Insert one message, committing independently of the rest of the
    /// batch. A uniqueness conflict is an expected outcome, not an error.
    async fn insert_message(
        &self,
        user_id: i64,
        message: &CanonicalMessage,
    ) -> Result<WriteOutcome, SyncError>;
}

/// Result of one insert attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A new row was stored.
    Inserted,
    /// The uniqueness constraint fired: a concurrent submission stored the
    /// identical key first.
    DuplicateRace,
    /// The store refused this row (e.g. a column constraint). The batch
    /// continues; `code` is a stable per-item error code.
    Rejected { code: &'static str },
}

/// Reconcile a submitted batch against stored state for one user.
///
/// Each raw record is normalized independently; validation failures are
/// recorded per item and never abort the batch. Keys of the valid items are
/// resolved against storage in a single call, then the items are folded in
/// submission order: known keys count as duplicates, new keys are inserted.
/// Keys inserted earlier in the same batch count as duplicates for later
/// items, so a batch is self-deduplicating.
///
/// If `deadline` passes mid-batch, remaining items are counted as skipped
/// and the partial report is returned. Only storage unavailability fails
/// the whole call.
pub async fn reconcile<R, W>(
    resolver: &R,
    writer: &W,
    user_id: i64,
    raws: Vec<RawMessage>,
    deadline: Option<Instant>,
) -> Result<BatchReport, SyncError>
where
    R: ExistenceResolver + Sync + ?Sized,
    W: MessageWriter + Sync + ?Sized,
{
    let mut report = BatchReport::new(raws.len());

    let normalized: Vec<Result<CanonicalMessage, _>> =
        raws.iter().map(normalize).collect();

    let keys: Vec<CanonicalKey> = normalized
        .iter()
        .filter_map(|item| item.as_ref().ok().map(CanonicalMessage::key))
        .collect();

    let mut known = if keys.is_empty() {
        HashSet::new()
    } else {
        resolver.resolve_existing(user_id, &keys).await?
    };

    for (index, item) in normalized.into_iter().enumerate() {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                report.skipped = report.total - index;
                warn!(
                    user_id,
                    processed = index,
                    skipped = report.skipped,
                    "batch deadline passed, returning partial report"
                );
                break;
            }
        }

        let message = match item {
            Ok(message) => message,
            Err(err) => {
                report.record_error(
                    index,
                    err.code(),
                    Some(err.field().to_string()),
                    err.to_string(),
                );
                continue;
            }
        };

        let key = message.key();
        if known.contains(&key) {
            report.duplicate += 1;
            continue;
        }

        match writer.insert_message(user_id, &message).await? {
            WriteOutcome::Inserted => {
                report.inserted += 1;
                known.insert(key);
            }
            WriteOutcome::DuplicateRace => {
                report.duplicate += 1;
                known.insert(key);
            }
            WriteOutcome::Rejected { code } => {
                report.record_error(index, code, None, format!("storage rejected item: {code}"));
            }
        }
    }

    debug!(
        user_id,
        total = report.total,
        inserted = report.inserted,
        duplicate = report.duplicate,
        errored = report.errored,
        skipped = report.skipped,
        "batch reconciled"
    );

    Ok(report)
}
