//! Batch reconciliation reports.

use serde::Serialize;

/// Maximum number of per-item errors listed individually in a report.
/// Overflow errors are still counted in `errored`.
pub const MAX_REPORTED_ERRORS: usize = 10;

/// One per-item failure inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemError {
    /// Zero-based position of the item in the submitted batch.
    pub item: usize,
    /// Stable machine-readable code (e.g. `negative_value`, `constraint`).
    pub code: String,
    /// Field the error refers to, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Human-readable description.
    pub detail: String,
}

/// Aggregate result of reconciling one submitted batch.
///
/// Counts always cover every item; the error list is capped at
/// [`MAX_REPORTED_ERRORS`] entries, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Items in the submitted batch.
    pub total: usize,
    /// Newly stored rows.
    pub inserted: usize,
    /// Rows updated in place. Always 0 under the skip-duplicates policy;
    /// kept so the report shape is stable.
    pub updated: usize,
    /// Items whose key already existed (in storage, earlier in the batch,
    /// or via a lost insert race).
    pub duplicate: usize,
    /// Items that failed validation or were rejected by storage.
    pub errored: usize,
    /// Items never attempted because the processing deadline passed.
    pub skipped: usize,
    /// Per-item errors, capped, in submission order.
    pub errors: Vec<ItemError>,
}

/// HTTP-level classification of a batch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Every item was processed without error.
    Complete,
    /// Some items succeeded and some errored or were skipped.
    Partial,
    /// No item succeeded.
    Failed,
}

impl BatchReport {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Record a per-item error, listing it only while under the cap.
    pub fn record_error(
        &mut self,
        item: usize,
        code: impl Into<String>,
        field: Option<String>,
        detail: impl Into<String>,
    ) {
        self.errored += 1;
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(ItemError {
                item,
                code: code.into(),
                field,
                detail: detail.into(),
            });
        }
    }

    /// Items that made it into (or were matched against) storage.
    pub fn succeeded(&self) -> usize {
        self.inserted + self.updated + self.duplicate
    }

    /// Classify the batch as a whole.
    pub fn outcome(&self) -> BatchOutcome {
        if self.errored == 0 && self.skipped == 0 {
            BatchOutcome::Complete
        } else if self.succeeded() > 0 {
            BatchOutcome::Partial
        } else {
            BatchOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_batch_is_complete() {
        assert_eq!(BatchReport::new(0).outcome(), BatchOutcome::Complete);
    }

    #[test]
    fn all_inserted_is_complete() {
        let mut report = BatchReport::new(3);
        report.inserted = 3;
        assert_eq!(report.outcome(), BatchOutcome::Complete);
    }

    #[test]
    fn duplicates_alone_are_complete() {
        let mut report = BatchReport::new(2);
        report.duplicate = 2;
        assert_eq!(report.outcome(), BatchOutcome::Complete);
    }

    #[test]
    fn mixed_success_and_error_is_partial() {
        let mut report = BatchReport::new(3);
        report.inserted = 2;
        report.record_error(1, "negative_value", Some("timestamp".into()), "bad");
        assert_eq!(report.outcome(), BatchOutcome::Partial);
    }

    #[test]
    fn all_errors_is_failed() {
        let mut report = BatchReport::new(2);
        report.record_error(0, "empty_field", Some("body".into()), "bad");
        report.record_error(1, "empty_field", Some("body".into()), "bad");
        assert_eq!(report.outcome(), BatchOutcome::Failed);
    }

    #[test]
    fn error_list_is_capped_but_counted() {
        let mut report = BatchReport::new(20);
        for i in 0..15 {
            report.record_error(i, "constraint", None, "rejected");
        }
        assert_eq!(report.errored, 15);
        assert_eq!(report.errors.len(), MAX_REPORTED_ERRORS);
        // Listed errors keep submission order.
        let items: Vec<usize> = report.errors.iter().map(|e| e.item).collect();
        assert_eq!(items, (0..MAX_REPORTED_ERRORS).collect::<Vec<_>>());
    }
}
