pub mod transform;

use serde_json::Value;
use tracing::warn;

use crate::errors::IngestError;
use crate::models::{FlatJobRecord, RawListing};
use crate::store::{IdempotentWriter, WriteOutcome};

pub use transform::transform;

/// Outcome counts for one page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub page: u32,
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn new(page: u32) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    /// Report for a batch whose commit was rolled back.
    pub fn all_failed(page: u32, records: usize) -> Self {
        Self {
            page,
            failed: records,
            ..Self::default()
        }
    }

    pub fn total(&self) -> usize {
        self.inserted + self.skipped + self.failed
    }
}

/// Transforms raw listings and writes them through an `IdempotentWriter`.
pub struct Ingestor<W: IdempotentWriter> {
    writer: W,
}

impl<W: IdempotentWriter> Ingestor<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    #[cfg(test)]
    pub fn writer(&self) -> &W {
        &self.writer
    }

    #[cfg(test)]
    pub fn into_writer(self) -> W {
        self.writer
    }

    pub async fn ensure_schema(&mut self) -> Result<(), IngestError> {
        self.writer.ensure_schema().await
    }

    pub async fn upsert_if_absent(
        &mut self,
        record: &FlatJobRecord,
    ) -> Result<WriteOutcome, IngestError> {
        self.writer.upsert_if_absent(record).await
    }

    /// Writes one page inside a single transaction.
    ///
    /// Record-level format and persistence errors are counted as `failed` and
    /// the batch continues. An error from `begin_batch` or `commit_batch` is
    /// returned; after a failed commit the batch has been rolled back and
    /// nothing from it is stored.
    pub async fn ingest_batch(
        &mut self,
        page: u32,
        listings: Vec<Value>,
    ) -> Result<BatchReport, IngestError> {
        let mut report = BatchReport::new(page);
        self.writer.begin_batch().await?;

        for value in listings {
            let listing_id = value.get("id").cloned().unwrap_or(Value::Null);

            let record = match RawListing::from_value(value).and_then(|raw| transform(&raw)) {
                Ok(record) => record,
                Err(err) => {
                    warn!(page, %listing_id, kind = %err.kind(), "Skipping listing: {err}");
                    report.failed += 1;
                    continue;
                }
            };

            match self.upsert_if_absent(&record).await {
                Ok(WriteOutcome::Inserted) => report.inserted += 1,
                Ok(WriteOutcome::Skipped) => report.skipped += 1,
                Err(err) => {
                    warn!(page, listing_id = record.id, kind = %err.kind(), "Failed to write listing: {err}");
                    report.failed += 1;
                }
            }
        }

        if let Err(err) = self.writer.commit_batch().await {
            if let Err(rollback_err) = self.writer.rollback_batch().await {
                warn!(page, "Rollback after failed commit also failed: {rollback_err}");
            }
            return Err(err);
        }

        Ok(report)
    }
}
