use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Total count for {resource} unavailable: {reason}")]
    CountUnavailable { resource: String, reason: String },

    #[error("Fetching page {page} failed: {source}")]
    PageFetchFailed {
        page: u32,
        #[source]
        source: Box<InventoryError>,
    },

    #[error("Page {page} did not complete within {timeout:?}")]
    PageTimedOut { page: u32, timeout: Duration },

    #[error("Page {page} task aborted: {message}")]
    TaskAborted { page: u32, message: String },

    #[error("{failed_pages} page(s) failed, {fetched} item(s) fetched")]
    PartialFetch { failed_pages: usize, fetched: usize },

    #[error("Fetch cancelled")]
    Cancelled,

    #[error("Page {page} pointed to next page {next_page}, which does not advance")]
    UnexpectedPagination { page: u32, next_page: u32 },

    #[error("Malformed URL '{url}': {reason}")]
    MalformedUrl { url: String, reason: String },

    #[error("Project {project} has no commits")]
    EmptyRepository { project: String },

    #[error("Status code {code} not expected, expecting {expected}")]
    UnexpectedStatus { code: u16, expected: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl InventoryError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            InventoryError::EmptyRepository { .. } => ErrorSeverity::Low,
            InventoryError::ApiError(_)
            | InventoryError::PageFetchFailed { .. }
            | InventoryError::PageTimedOut { .. }
            | InventoryError::TaskAborted { .. }
            | InventoryError::PartialFetch { .. }
            | InventoryError::Cancelled => ErrorSeverity::Medium,
            InventoryError::CountUnavailable { .. }
            | InventoryError::UnexpectedPagination { .. }
            | InventoryError::MalformedUrl { .. }
            | InventoryError::UnexpectedStatus { .. }
            | InventoryError::SerializationError(_) => ErrorSeverity::High,
            InventoryError::IoError(_)
            | InventoryError::UrlError(_)
            | InventoryError::ConfigError { .. }
            | InventoryError::InvalidConfigValueError { .. }
            | InventoryError::MissingConfigError { .. } => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            InventoryError::ApiError(_) | InventoryError::PageTimedOut { .. } => {
                "Check network connectivity to the GitLab instance and retry"
            }
            InventoryError::PageFetchFailed { .. } | InventoryError::PartialFetch { .. } => {
                "Retry the fetch; lower --max-in-flight if the server is rate limiting"
            }
            InventoryError::UnexpectedStatus { code: 401, .. }
            | InventoryError::UnexpectedStatus { code: 403, .. } => {
                "Check that the access token is valid and has the read_api scope"
            }
            InventoryError::UnexpectedStatus { .. } => "Check the request parameters and server logs",
            InventoryError::CountUnavailable { .. } => {
                "The server did not report X-Total; it may be omitted for very large collections"
            }
            InventoryError::EmptyRepository { .. } => "Push at least one commit to the project",
            InventoryError::MalformedUrl { .. } => {
                "Make sure the configured URL host matches the one GitLab reports in web_url"
            }
            InventoryError::ConfigError { .. }
            | InventoryError::InvalidConfigValueError { .. }
            | InventoryError::MissingConfigError { .. }
            | InventoryError::UrlError(_) => "Fix the configuration and run again",
            _ => "Run again with --verbose for details",
        }
    }
}

pub type Result<T> = std::result::Result<T, InventoryError>;
