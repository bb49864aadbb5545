use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;

use crate::errors::IngestError;
use crate::models::FlatJobRecord;
use crate::store::{IdempotentWriter, WriteOutcome};

/// In-memory writer with failure injection, used by the ingestor and
/// pipeline tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub schema_ready: bool,
    pub schema_calls: usize,
    pub rows: BTreeMap<i64, FlatJobRecord>,
    staged: Option<BTreeMap<i64, FlatJobRecord>>,
    pub commits: usize,
    pub rollbacks: usize,
    /// Record ids whose write fails with a database error.
    pub failing_ids: HashSet<i64>,
    /// 1-based commit numbers that fail.
    pub failing_commits: HashSet<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes_for(mut self, id: i64) -> Self {
        self.failing_ids.insert(id);
        self
    }

    pub fn fail_commit(mut self, nth: usize) -> Self {
        self.failing_commits.insert(nth);
        self
    }
}

fn injected(message: &str) -> IngestError {
    IngestError::Database(sqlx::Error::Protocol(message.to_string()))
}

#[async_trait]
impl IdempotentWriter for MemoryStore {
    async fn ensure_schema(&mut self) -> Result<(), IngestError> {
        self.schema_calls += 1;
        self.schema_ready = true;
        Ok(())
    }

    async fn begin_batch(&mut self) -> Result<(), IngestError> {
        self.staged = Some(BTreeMap::new());
        Ok(())
    }

    async fn upsert_if_absent(
        &mut self,
        record: &FlatJobRecord,
    ) -> Result<WriteOutcome, IngestError> {
        let staged = self.staged.as_mut().ok_or(IngestError::NoOpenBatch)?;
        if self.failing_ids.contains(&record.id) {
            return Err(injected("injected write failure"));
        }
        if self.rows.contains_key(&record.id) || staged.contains_key(&record.id) {
            return Ok(WriteOutcome::Skipped);
        }
        staged.insert(record.id, record.clone());
        Ok(WriteOutcome::Inserted)
    }

    async fn commit_batch(&mut self) -> Result<(), IngestError> {
        let staged = self.staged.take().ok_or(IngestError::NoOpenBatch)?;
        self.commits += 1;
        if self.failing_commits.contains(&self.commits) {
            return Err(injected("injected commit failure"));
        }
        self.rows.extend(staged);
        Ok(())
    }

    async fn rollback_batch(&mut self) -> Result<(), IngestError> {
        self.staged = None;
        self.rollbacks += 1;
        Ok(())
    }
}
