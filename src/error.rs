use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::DatasetKind;

/// Result type for studio operations
pub type Result<T> = std::result::Result<T, StudioError>;

/// Errors raised while turning uploaded files into dataset tables
#[derive(Error, Debug)]
pub enum IngestError {
    /// One or both required files were not supplied
    #[error("both CSV files are required, missing: {}", join_kinds(.0))]
    MissingInput(Vec<DatasetKind>),

    /// The CSV reader rejected the file
    #[error("failed to parse {kind} CSV: {source}")]
    Csv {
        kind: DatasetKind,
        #[source]
        source: csv::Error,
    },

    /// The file has no header row
    #[error("{0} CSV has no header row")]
    MissingHeader(DatasetKind),
}

/// Errors talking to the remote solver
#[derive(Error, Debug)]
pub enum TransportError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Invalid URL provided
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Solver answered with a non-success status
    #[error("solver returned {status}: {body}")]
    Api { status: u16, body: String },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

/// Errors editing or submitting the problem definition
#[derive(Error, Debug)]
pub enum BuilderError {
    #[error("no {collection} row at index {index}")]
    RowNotFound {
        collection: &'static str,
        index: usize,
    },

    #[error("problem definition rejected: {}", .0.join("; "))]
    Rejected(Vec<String>),
}

#[derive(Error, Debug)]
pub enum StudioError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Builder(#[from] BuilderError),

    #[error("no {0} dataset has been uploaded")]
    DatasetNotLoaded(DatasetKind),

    #[error("unknown dataset {0:?}")]
    UnknownDataset(String),

    #[error("unknown column {0:?}")]
    UnknownColumn(String),

    #[error("background task failed: {0}")]
    Blocking(String),
}

fn join_kinds(kinds: &[DatasetKind]) -> String {
    kinds
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl ResponseError for StudioError {
    fn status_code(&self) -> StatusCode {
        match self {
            StudioError::Ingest(_) | StudioError::UnknownColumn(_) => StatusCode::BAD_REQUEST,
            StudioError::Builder(BuilderError::Rejected(_)) => StatusCode::BAD_REQUEST,
            StudioError::Builder(BuilderError::RowNotFound { .. }) => StatusCode::NOT_FOUND,
            StudioError::DatasetNotLoaded(_) | StudioError::UnknownDataset(_) => {
                StatusCode::NOT_FOUND
            }
            StudioError::Transport(_) => StatusCode::BAD_GATEWAY,
            StudioError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(serde_json::json!({ "error": self.to_string() }))
    }
}
