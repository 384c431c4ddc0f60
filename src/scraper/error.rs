use reqwest::StatusCode;
use thiserror::Error;

/// The detail page could not be retrieved.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid request URL for {ticker}: {source}")]
    Url {
        ticker: String,
        #[source]
        source: url::ParseError,
    },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: StatusCode },

    #[error("failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// The page markup is missing a structure the extractor depends on.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid selector `{selector}`: {message}")]
    Selector { selector: String, message: String },

    #[error("table {table}, row {row}: cell {cell} has no label text")]
    MissingLabel { table: usize, row: usize, cell: usize },
}

/// Cleaning or pivoting produced an unusable record.
#[derive(Debug, Error)]
pub enum NormalizationError {
    #[error("no labelled values left after cleaning")]
    Empty,
}

/// Anything that can fail a single ticker.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Normalize(#[from] NormalizationError),
}

impl PipelineError {
    /// Short category name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "FetchError",
            Self::Parse(_) => "ParseError",
            Self::Normalize(_) => "NormalizationError",
        }
    }
}
