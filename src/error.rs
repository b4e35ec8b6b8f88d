use serde::Serialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Fetch failure kinds
// ---------------------------------------------------------------------------

/// Why a single fetch attempt did not produce a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchFailure {
    /// Connection could not be established (DNS, refused, reset).
    Unreachable,
    /// The per-fetch timeout elapsed, or the aggregate deadline did.
    Timeout,
    /// The redirect chain exceeded the configured maximum.
    TooManyRedirects,
    /// The server answered with a non-success status.
    Status,
    /// The locator is not a valid absolute URL.
    InvalidLocator,
    /// The response body could not be read as text.
    Body,
    /// The pipeline worker could not start or stopped without a result.
    WorkerFailed,
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FetchFailure::Unreachable => "unreachable",
            FetchFailure::Timeout => "timeout",
            FetchFailure::TooManyRedirects => "too many redirects",
            FetchFailure::Status => "non-success status",
            FetchFailure::InvalidLocator => "invalid locator",
            FetchFailure::Body => "unreadable body",
            FetchFailure::WorkerFailed => "worker failed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Pipeline error taxonomy
// ---------------------------------------------------------------------------

/// Every way a single source's fetch → parse → normalise pipeline can fail.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("unknown source '{key}'")]
    SourceNotFound { key: String },
    #[error("fetching {locator} failed ({kind}): {message}")]
    FetchFailed {
        locator: String,
        kind: FetchFailure,
        status: Option<u16>,
        message: String,
    },
    #[error("document at {locator} is empty (no header line)")]
    EmptyDocument { locator: String },
    #[error(
        "no rows with a '{time_axis_key}' value in {locator} ({parsed_rows} rows parsed)"
    )]
    NoValidRows {
        locator: String,
        time_axis_key: String,
        parsed_rows: usize,
    },
}

/// Stable machine-readable discriminant of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    SourceNotFound,
    FetchFailed,
    EmptyDocument,
    NoValidRows,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::SourceNotFound { .. } => ErrorKind::SourceNotFound,
            PipelineError::FetchFailed { .. } => ErrorKind::FetchFailed,
            PipelineError::EmptyDocument { .. } => ErrorKind::EmptyDocument,
            PipelineError::NoValidRows { .. } => ErrorKind::NoValidRows,
        }
    }

    /// The locator the pipeline was working on, if it got that far.
    pub fn attempted_locator(&self) -> Option<&str> {
        match self {
            PipelineError::SourceNotFound { .. } => None,
            PipelineError::FetchFailed { locator, .. }
            | PipelineError::EmptyDocument { locator }
            | PipelineError::NoValidRows { locator, .. } => Some(locator),
        }
    }

    pub fn underlying_status(&self) -> Option<u16> {
        match self {
            PipelineError::FetchFailed { status, .. } => *status,
            _ => None,
        }
    }

    /// Flatten into the structured failure shape reported to callers.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            error_kind: self.kind(),
            fetch_failure: match self {
                PipelineError::FetchFailed { kind, .. } => Some(*kind),
                _ => None,
            },
            message: self.to_string(),
            attempted_locator: self.attempted_locator().map(str::to_string),
            underlying_status: self.underlying_status(),
        }
    }
}

/// Serialisable failure, never confusable with a success carrying zero rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub error_kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_failure: Option<FetchFailure>,
    pub message: String,
    pub attempted_locator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underlying_status: Option<u16>,
}
