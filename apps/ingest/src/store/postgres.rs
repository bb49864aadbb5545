use async_trait::async_trait;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, info, warn};

use crate::errors::IngestError;
use crate::models::FlatJobRecord;
use crate::store::{IdempotentWriter, WriteOutcome, WriteStrategy, LISTINGS_TABLE};

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS freelance_jobs (
        id BIGINT PRIMARY KEY,
        created_at TIMESTAMPTZ,
        job TEXT NOT NULL,
        job_slug TEXT NOT NULL,
        slug TEXT NOT NULL,
        title TEXT NOT NULL,
        skills TEXT,
        soft_skills TEXT,
        company_name TEXT,
        city TEXT,
        long DOUBLE PRECISION,
        lat DOUBLE PRECISION,
        duration VARCHAR(100),
        remote VARCHAR(50),
        max_tjm INTEGER,
        min_tjm INTEGER,
        experience VARCHAR(50),
        description TEXT,
        candidate_profile TEXT,
        company_description TEXT
    )
"#;

const INSERT_COLUMNS: &str = r#"
    INSERT INTO freelance_jobs
        (id, created_at, job, job_slug, slug, title, skills, soft_skills,
         company_name, city, long, lat, duration, remote, max_tjm, min_tjm,
         experience, description, candidate_profile, company_description)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
            $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
"#;

// Each record write runs under this savepoint so one failed statement does
// not abort the surrounding batch transaction.
const SAVEPOINT: &str = "SAVEPOINT listing_write";
const RELEASE_SAVEPOINT: &str = "RELEASE SAVEPOINT listing_write";
const ROLLBACK_TO_SAVEPOINT: &str = "ROLLBACK TO SAVEPOINT listing_write";

/// Postgres-backed `IdempotentWriter`. Holds at most one open batch
/// transaction at a time.
pub struct PgListingStore {
    pool: PgPool,
    strategy: WriteStrategy,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgListingStore {
    pub fn new(pool: PgPool, strategy: WriteStrategy) -> Self {
        Self {
            pool,
            strategy,
            tx: None,
        }
    }
}

#[async_trait]
impl IdempotentWriter for PgListingStore {
    async fn ensure_schema(&mut self) -> Result<(), IngestError> {
        let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(LISTINGS_TABLE)
            .fetch_one(&self.pool)
            .await?;

        if exists {
            debug!("Table {LISTINGS_TABLE} already exists");
            return Ok(());
        }

        sqlx::query(CREATE_TABLE_SQL).execute(&self.pool).await?;
        info!("Created table {LISTINGS_TABLE}");
        Ok(())
    }

    async fn begin_batch(&mut self) -> Result<(), IngestError> {
        if let Some(stale) = self.tx.take() {
            warn!("Rolling back a batch that was never finished");
            stale.rollback().await?;
        }
        self.tx = Some(self.pool.begin().await?);
        Ok(())
    }

    async fn upsert_if_absent(
        &mut self,
        record: &FlatJobRecord,
    ) -> Result<WriteOutcome, IngestError> {
        let strategy = self.strategy;
        let tx = self.tx.as_mut().ok_or(IngestError::NoOpenBatch)?;
        let conn: &mut PgConnection = tx;

        sqlx::query(SAVEPOINT).execute(&mut *conn).await?;

        let result = match strategy {
            WriteStrategy::Atomic => insert_on_conflict(conn, record).await,
            WriteStrategy::CheckThenInsert => check_then_insert(conn, record).await,
        };

        match result {
            Ok(outcome) => {
                sqlx::query(RELEASE_SAVEPOINT).execute(&mut *conn).await?;
                Ok(outcome)
            }
            Err(err) => {
                sqlx::query(ROLLBACK_TO_SAVEPOINT)
                    .execute(&mut *conn)
                    .await?;
                Err(err)
            }
        }
    }

    async fn commit_batch(&mut self) -> Result<(), IngestError> {
        let tx = self.tx.take().ok_or(IngestError::NoOpenBatch)?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback_batch(&mut self) -> Result<(), IngestError> {
        // A failed commit already consumed the transaction.
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}

async fn insert_on_conflict(
    conn: &mut PgConnection,
    record: &FlatJobRecord,
) -> Result<WriteOutcome, IngestError> {
    let sql = format!("{INSERT_COLUMNS} ON CONFLICT (id) DO NOTHING");
    let result = bind_record(sqlx::query(&sql), record)
        .execute(&mut *conn)
        .await?;

    Ok(if result.rows_affected() == 0 {
        WriteOutcome::Skipped
    } else {
        WriteOutcome::Inserted
    })
}

async fn check_then_insert(
    conn: &mut PgConnection,
    record: &FlatJobRecord,
) -> Result<WriteOutcome, IngestError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM freelance_jobs WHERE id = $1)")
            .bind(record.id)
            .fetch_one(&mut *conn)
            .await?;
    if exists {
        return Ok(WriteOutcome::Skipped);
    }

    bind_record(sqlx::query(INSERT_COLUMNS), record)
        .execute(&mut *conn)
        .await?;
    Ok(WriteOutcome::Inserted)
}

fn bind_record<'q>(
    query: Query<'q, Postgres, PgArguments>,
    record: &'q FlatJobRecord,
) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(record.id)
        .bind(record.created_at)
        .bind(&record.job)
        .bind(&record.job_slug)
        .bind(&record.slug)
        .bind(&record.title)
        .bind(&record.skills)
        .bind(&record.soft_skills)
        .bind(&record.company_name)
        .bind(&record.city)
        .bind(record.long)
        .bind(record.lat)
        .bind(&record.duration)
        .bind(&record.remote)
        .bind(record.max_tjm)
        .bind(record.min_tjm)
        .bind(&record.experience)
        .bind(&record.description)
        .bind(&record.candidate_profile)
        .bind(&record.company_description)
}
