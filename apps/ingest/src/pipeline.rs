//! Sequential run loop: ensure schema, then fetch and ingest one page at a
//! time. The first page-level failure aborts the run; no later page is
//! requested after it.

use tracing::{debug, error, info};

use crate::errors::{IngestError, RunAborted, Stage};
use crate::fetcher::{ListingSource, PageCursor};
use crate::ingestor::{BatchReport, Ingestor};
use crate::store::IdempotentWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Fetch and ingest exactly one page. No count query is issued.
    SinglePage { page: u32, page_size: u32 },
    /// Count the catalog and walk every page.
    AllPages { page_size: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    SchemaEnsured,
    FetchingPage(u32),
    IngestingBatch(u32),
    Done,
    Aborted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub batches: Vec<BatchReport>,
}

impl RunReport {
    pub fn inserted(&self) -> usize {
        self.batches.iter().map(|b| b.inserted).sum()
    }

    pub fn skipped(&self) -> usize {
        self.batches.iter().map(|b| b.skipped).sum()
    }

    pub fn failed(&self) -> usize {
        self.batches.iter().map(|b| b.failed).sum()
    }
}

pub struct Pipeline<'a, S: ListingSource + ?Sized, W: IdempotentWriter> {
    source: &'a S,
    ingestor: Ingestor<W>,
    state: RunState,
    report: RunReport,
}

impl<'a, S: ListingSource + ?Sized, W: IdempotentWriter> Pipeline<'a, S, W> {
    pub fn new(source: &'a S, writer: W) -> Self {
        Self {
            source,
            ingestor: Ingestor::new(writer),
            state: RunState::Idle,
            report: RunReport::default(),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> RunState {
        self.state
    }

    #[cfg(test)]
    pub fn into_writer(self) -> W {
        self.ingestor.into_writer()
    }

    pub async fn run(&mut self, mode: RunMode) -> Result<RunReport, RunAborted> {
        if let Err(err) = self.ingestor.ensure_schema().await {
            return Err(self.abort(None, Stage::EnsureSchema, err));
        }
        self.transition(RunState::SchemaEnsured);

        let source = self.source;
        let mut cursor = match mode {
            RunMode::SinglePage { page, page_size } => {
                PageCursor::new(source, page, page, page_size)
            }
            RunMode::AllPages { page_size } => {
                let total = match source.total_count().await {
                    Ok(total) => total,
                    Err(err) => return Err(self.abort(None, Stage::CountListings, err)),
                };
                let cursor = PageCursor::all_pages(source, total, page_size);
                info!(
                    "Catalog holds {total} listings, fetching {} pages of {page_size}",
                    cursor.remaining()
                );
                cursor
            }
        };

        while let Some(upcoming) = cursor.upcoming() {
            self.transition(RunState::FetchingPage(upcoming));
            let Some((page, fetched)) = cursor.next_page().await else {
                break;
            };
            let listings = match fetched {
                Ok(listings) => listings,
                Err(err) => return Err(self.abort(Some(page), Stage::FetchPage, err)),
            };

            self.transition(RunState::IngestingBatch(page));
            let record_count = listings.len();
            match self.ingestor.ingest_batch(page, listings).await {
                Ok(batch) => {
                    info!(
                        page,
                        inserted = batch.inserted,
                        skipped = batch.skipped,
                        failed = batch.failed,
                        records = batch.total(),
                        "Page ingested"
                    );
                    self.report.batches.push(batch);
                }
                Err(err) => {
                    self.report
                        .batches
                        .push(BatchReport::all_failed(page, record_count));
                    return Err(self.abort(Some(page), Stage::IngestBatch, err));
                }
            }
        }

        self.transition(RunState::Done);
        let report = std::mem::take(&mut self.report);
        info!(
            pages = report.batches.len(),
            inserted = report.inserted(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Run complete"
        );
        Ok(report)
    }

    fn transition(&mut self, next: RunState) {
        debug!("Run state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn abort(&mut self, page: Option<u32>, stage: Stage, source: IngestError) -> RunAborted {
        self.transition(RunState::Aborted);
        let abort = RunAborted {
            page,
            stage,
            source,
            report: std::mem::take(&mut self.report),
        };
        error!("Run aborted: {abort}");
        abort
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::fake::FakeSource;
    use crate::store::memory::MemoryStore;
    use serde_json::{json, Value};

    fn listing(id: i64) -> Value {
        json!({
            "id": id,
            "job": { "name": "Fullstack", "slug": "fullstack" },
            "slug": format!("fullstack-{id}"),
            "title": format!("Fullstack #{id}"),
            "skills": [{ "name": "TypeScript" }],
            "softSkills": [],
            "durationValue": 3,
            "durationPeriod": "months"
        })
    }

    fn listings(ids: std::ops::RangeInclusive<i64>) -> Vec<Value> {
        ids.map(listing).collect()
    }

    fn catalog() -> FakeSource {
        FakeSource::with_total(7)
            .page(1, listings(1..=3))
            .page(2, listings(4..=6))
            .page(3, listings(7..=7))
    }

    #[tokio::test]
    async fn test_all_pages_run_ingests_every_page_in_order() {
        let source = catalog();
        let mut pipeline = Pipeline::new(&source, MemoryStore::new());
        let report = pipeline
            .run(RunMode::AllPages { page_size: 3 })
            .await
            .unwrap();

        assert_eq!(pipeline.state(), RunState::Done);
        assert_eq!(source.requested(), vec![1, 2, 3]);
        assert_eq!(report.inserted(), 7);
        assert_eq!(report.failed(), 0);
        let pages: Vec<u32> = report.batches.iter().map(|b| b.page).collect();
        assert_eq!(pages, vec![1, 2, 3]);

        let store = pipeline.into_writer();
        assert!(store.schema_ready);
        assert_eq!(store.rows.len(), 7);
    }

    #[tokio::test]
    async fn test_pagination_covers_partial_last_page() {
        let source = FakeSource::with_total(301);
        let mut pipeline = Pipeline::new(&source, MemoryStore::new());
        pipeline
            .run(RunMode::AllPages { page_size: 300 })
            .await
            .unwrap();

        assert_eq!(source.requested(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_rerun_inserts_nothing_new() {
        let source = catalog();
        let mut first = Pipeline::new(&source, MemoryStore::new());
        first.run(RunMode::AllPages { page_size: 3 }).await.unwrap();
        let store = first.into_writer();

        let mut second = Pipeline::new(&source, store);
        let report = second
            .run(RunMode::AllPages { page_size: 3 })
            .await
            .unwrap();

        assert_eq!(report.inserted(), 0);
        assert_eq!(report.skipped(), 7);
        let store = second.into_writer();
        assert_eq!(store.rows.len(), 7);
        assert_eq!(store.schema_calls, 2);
    }

    #[tokio::test]
    async fn test_ids_stay_unique_across_overlapping_pages() {
        // Listings shift between pages when new ones are published mid-run.
        let source = FakeSource::with_total(6)
            .page(1, listings(1..=3))
            .page(2, listings(3..=5));
        let mut pipeline = Pipeline::new(&source, MemoryStore::new());
        let report = pipeline
            .run(RunMode::AllPages { page_size: 3 })
            .await
            .unwrap();

        assert_eq!(report.inserted(), 5);
        assert_eq!(report.skipped(), 1);
        let ids: Vec<i64> = pipeline.into_writer().rows.into_keys().collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_malformed_listing_does_not_stop_the_run() {
        let mut first_page = listings(1..=10);
        first_page[6]["softSkills"] = json!({ "name": "Curiosity" });
        let source = FakeSource::with_total(12)
            .page(1, first_page)
            .page(2, listings(11..=12));

        let mut pipeline = Pipeline::new(&source, MemoryStore::new());
        let report = pipeline
            .run(RunMode::AllPages { page_size: 10 })
            .await
            .unwrap();

        let first = report.batches[0];
        assert_eq!(first.inserted + first.skipped, 9);
        assert_eq!(first.failed, 1);
        assert_eq!(report.batches[1].inserted, 2);
        assert_eq!(pipeline.state(), RunState::Done);
    }

    #[tokio::test]
    async fn test_non_object_item_fails_only_that_record() {
        let source = FakeSource::with_total(4)
            .page(1, vec![listing(1), Value::Null])
            .page(2, vec![listing(3), json!(7)]);

        let mut pipeline = Pipeline::new(&source, MemoryStore::new());
        let report = pipeline
            .run(RunMode::AllPages { page_size: 2 })
            .await
            .unwrap();

        assert_eq!(source.requested(), vec![1, 2, 3]);
        assert_eq!((report.batches[0].inserted, report.batches[0].failed), (1, 1));
        assert_eq!((report.batches[1].inserted, report.batches[1].failed), (1, 1));
        assert_eq!(pipeline.state(), RunState::Done);
        let ids: Vec<i64> = pipeline.into_writer().rows.into_keys().collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_single_page_mode_skips_count_query() {
        let source = catalog().fail_count();
        let mut pipeline = Pipeline::new(&source, MemoryStore::new());
        let report = pipeline
            .run(RunMode::SinglePage {
                page: 2,
                page_size: 3,
            })
            .await
            .unwrap();

        assert_eq!(source.requested(), vec![2]);
        assert_eq!(report.batches.len(), 1);
        assert_eq!(report.inserted(), 3);
    }

    #[tokio::test]
    async fn test_page_fetch_failure_aborts_remaining_pages() {
        let source = catalog().fail_page(2);
        let mut pipeline = Pipeline::new(&source, MemoryStore::new());
        let abort = pipeline
            .run(RunMode::AllPages { page_size: 3 })
            .await
            .unwrap_err();

        assert_eq!(pipeline.state(), RunState::Aborted);
        assert_eq!(abort.page, Some(2));
        assert_eq!(abort.stage, Stage::FetchPage);
        assert_eq!(source.requested(), vec![1, 2]);
        assert_eq!(abort.report.inserted(), 3);
        assert_eq!(pipeline.into_writer().rows.len(), 3);
    }

    #[tokio::test]
    async fn test_count_failure_aborts_before_any_page() {
        let source = catalog().fail_count();
        let mut pipeline = Pipeline::new(&source, MemoryStore::new());
        let abort = pipeline
            .run(RunMode::AllPages { page_size: 3 })
            .await
            .unwrap_err();

        assert_eq!(abort.page, None);
        assert_eq!(abort.stage, Stage::CountListings);
        assert_eq!(abort.source.kind(), crate::errors::ErrorKind::Transport);
        assert!(source.requested().is_empty());
    }

    #[tokio::test]
    async fn test_commit_failure_reports_page_as_failed_and_aborts() {
        let source = catalog();
        let mut pipeline = Pipeline::new(&source, MemoryStore::new().fail_commit(2));
        let abort = pipeline
            .run(RunMode::AllPages { page_size: 3 })
            .await
            .unwrap_err();

        assert_eq!(abort.page, Some(2));
        assert_eq!(abort.stage, Stage::IngestBatch);
        assert_eq!(
            abort.report.batches,
            vec![
                BatchReport {
                    page: 1,
                    inserted: 3,
                    skipped: 0,
                    failed: 0
                },
                BatchReport::all_failed(2, 3),
            ]
        );
        assert_eq!(source.requested(), vec![1, 2]);

        let ids: Vec<i64> = pipeline.into_writer().rows.into_keys().collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
