//! Idempotent sink for flattened listings.
//!
//! `IdempotentWriter` hides whether the backing store can do a single atomic
//! conditional insert or needs the two-step existence check. The ingestor
//! only sees batch boundaries and an `Inserted`/`Skipped` outcome per record.

use std::str::FromStr;

use async_trait::async_trait;

use crate::errors::IngestError;
use crate::models::FlatJobRecord;

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgListingStore;

/// Target table for flattened listings.
pub const LISTINGS_TABLE: &str = "freelance_jobs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted,
    Skipped,
}

/// How the Postgres writer enforces write-once rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteStrategy {
    /// `INSERT ... ON CONFLICT (id) DO NOTHING`. Safe with concurrent writers.
    #[default]
    Atomic,
    /// `SELECT` for the id, then `INSERT` when absent. Single writer only.
    CheckThenInsert,
}

impl FromStr for WriteStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "atomic" => Ok(WriteStrategy::Atomic),
            "check-then-insert" | "check_then_insert" => Ok(WriteStrategy::CheckThenInsert),
            other => Err(format!(
                "unknown write strategy '{other}' (expected 'atomic' or 'check-then-insert')"
            )),
        }
    }
}

/// Write-once sink. Calls arrive as `begin_batch`, any number of
/// `upsert_if_absent`, then `commit_batch` or `rollback_batch`.
#[async_trait]
pub trait IdempotentWriter: Send {
    /// Creates the target table when no table of that name exists.
    async fn ensure_schema(&mut self) -> Result<(), IngestError>;

    async fn begin_batch(&mut self) -> Result<(), IngestError>;

    /// Inserts `record` unless a row with the same id already exists.
    /// A failure here must leave the open batch usable for later records.
    async fn upsert_if_absent(
        &mut self,
        record: &FlatJobRecord,
    ) -> Result<WriteOutcome, IngestError>;

    async fn commit_batch(&mut self) -> Result<(), IngestError>;

    async fn rollback_batch(&mut self) -> Result<(), IngestError>;
}
