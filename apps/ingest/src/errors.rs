use std::fmt;

use thiserror::Error;

use crate::pipeline::RunReport;

/// Error raised by the fetcher, the transform step, or the store.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream error (status {status}) for {url}: {message}")]
    UpstreamStatus {
        status: u16,
        url: String,
        message: String,
    },

    #[error("Format error: {0}")]
    Format(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("No open batch: begin_batch must precede writes")]
    NoOpenBatch,
}

/// Coarse classification used for logging and batch accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Format,
    Persistence,
}

impl IngestError {
    pub fn format(message: impl Into<String>) -> Self {
        IngestError::Format(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::Http(_) | IngestError::UpstreamStatus { .. } => ErrorKind::Transport,
            IngestError::Format(_) => ErrorKind::Format,
            IngestError::Database(_) | IngestError::NoOpenBatch => ErrorKind::Persistence,
        }
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        IngestError::Format(err.to_string())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Format => "format",
            ErrorKind::Persistence => "persistence",
        };
        f.write_str(label)
    }
}

/// The step of a run that was executing when it aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    EnsureSchema,
    CountListings,
    FetchPage,
    IngestBatch,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::EnsureSchema => "ensure schema",
            Stage::CountListings => "count listings",
            Stage::FetchPage => "fetch page",
            Stage::IngestBatch => "ingest batch",
        };
        f.write_str(label)
    }
}

/// Fatal run failure. Carries the reports of every page finished before it.
#[derive(Debug, Error)]
#[error("{}: {stage} failed ({}): {source}", page_label(.page), .source.kind())]
pub struct RunAborted {
    pub page: Option<u32>,
    pub stage: Stage,
    #[source]
    pub source: IngestError,
    pub report: RunReport,
}

fn page_label(page: &Option<u32>) -> String {
    match page {
        Some(page) => format!("page {page}"),
        None => "run".to_string(),
    }
}
