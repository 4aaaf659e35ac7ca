//! Error types for chatvault.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=catalog, 5=auth, 6=acquisition, etc.)
//! - Retryability flags for operators and wrapping scripts
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

use crate::acquire::AcquisitionError;
use crate::sync::SyncError;

/// Result type alias for chatvault operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Catalog (exit 2)
    DatabaseError,
    CatalogWriteError,

    // Not Found (exit 3)
    ConversationNotFound,
    ArchiveNotFound,

    // Validation (exit 4)
    ValidationError,
    InvalidArgument,

    // Authentication (exit 5)
    AuthenticationFailure,

    // Acquisition (exit 6)
    AcquisitionTimeout,
    WebDriverFailure,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Partial (exit 9)
    PartialExtractionError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::DatabaseError => "DATABASE_ERROR",
            Self::CatalogWriteError => "CATALOG_WRITE_ERROR",
            Self::ConversationNotFound => "CONVERSATION_NOT_FOUND",
            Self::ArchiveNotFound => "ARCHIVE_NOT_FOUND",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::AuthenticationFailure => "AUTHENTICATION_FAILURE",
            Self::AcquisitionTimeout => "ACQUISITION_TIMEOUT",
            Self::WebDriverFailure => "WEBDRIVER_FAILURE",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::PartialExtractionError => "PARTIAL_EXTRACTION_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-9).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::DatabaseError | Self::CatalogWriteError => 2,
            Self::ConversationNotFound | Self::ArchiveNotFound => 3,
            Self::ValidationError | Self::InvalidArgument => 4,
            Self::AuthenticationFailure => 5,
            Self::AcquisitionTimeout | Self::WebDriverFailure => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
            Self::PartialExtractionError => 9,
        }
    }

    /// Whether re-invoking the run with adjusted settings may succeed.
    ///
    /// Timeouts and driver failures are never retried automatically, but an
    /// operator re-run (longer pause, headful browser) often fixes them.
    /// Authentication needs fresh tokens, so it is not retryable as-is.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AcquisitionTimeout
                | Self::WebDriverFailure
                | Self::PartialExtractionError
                | Self::CatalogWriteError
                | Self::DatabaseError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in chatvault operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Authentication failed: still on login page ({url})")]
    AuthenticationFailure { url: String },

    #[error("Timed out after {waited_ms}ms waiting for content (tried: {})", strategies.join(", "))]
    AcquisitionTimeout {
        waited_ms: u64,
        strategies: Vec<String>,
    },

    #[error("WebDriver error: {0}")]
    WebDriver(String),

    #[error("Extraction failed for {graph_id}: {reason}")]
    PartialExtraction { graph_id: String, reason: String },

    #[error("Catalog write failed for {graph_id}: {source}")]
    CatalogWrite {
        graph_id: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Archive write failed for {graph_id}: {source}")]
    ExportWrite {
        graph_id: String,
        #[source]
        source: SyncError,
    },

    #[error("Cannot read archive file {}: {source}", path.display())]
    UnreadableArchive {
        path: PathBuf,
        #[source]
        source: SyncError,
    },

    #[error("Invalid record: {0}")]
    Validation(String),

    #[error("Conversation not found: {graph_id}")]
    ConversationNotFound {
        graph_id: String,
        similar: Vec<String>,
    },

    #[error("Archive directory not found: {path}")]
    ArchiveNotFound { path: PathBuf },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::AuthenticationFailure { .. } => ErrorCode::AuthenticationFailure,
            Self::AcquisitionTimeout { .. } => ErrorCode::AcquisitionTimeout,
            Self::WebDriver(_) => ErrorCode::WebDriverFailure,
            Self::PartialExtraction { .. } => ErrorCode::PartialExtractionError,
            Self::CatalogWrite { .. } => ErrorCode::CatalogWriteError,
            Self::ExportWrite { .. } | Self::UnreadableArchive { .. } => ErrorCode::IoError,
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::ConversationNotFound { .. } => ErrorCode::ConversationNotFound,
            Self::ArchiveNotFound { .. } => ErrorCode::ArchiveNotFound,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Whether this error aborts the whole run rather than a single item.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::PartialExtraction { .. }
                | Self::CatalogWrite { .. }
                | Self::ExportWrite { .. }
                | Self::UnreadableArchive { .. }
                | Self::Validation(_)
        )
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::AuthenticationFailure { .. } => Some(
                "The session cookie was rejected. Copy a fresh value from a logged-in \
                 browser into your tokens file and re-run."
                    .to_string(),
            ),

            Self::AcquisitionTimeout { .. } => Some(
                "The conversation list never appeared. Try a longer --pause, a larger \
                 initial timeout, or --headful to watch the browser. \
                 Use --debug-dir to capture a screenshot and page markup."
                    .to_string(),
            ),

            Self::WebDriver(_) => Some(
                "Check that chromedriver is running (default http://localhost:9515) \
                 or pass --webdriver <url>."
                    .to_string(),
            ),

            Self::CatalogWrite { .. } => Some(
                "Exported files may be ahead of the catalog. Run `cv sync --index-only` \
                 to rebuild catalog rows from the archive."
                    .to_string(),
            ),

            Self::ExportWrite { .. } => Some(
                "Check free space and permissions under the output directory, then re-run \
                 `cv sync`; conversations that were written are skipped as unchanged."
                    .to_string(),
            ),

            Self::UnreadableArchive { path, .. } => Some(format!(
                "Move {} aside or restore it from a backup; the rest of the archive was indexed.",
                path.display()
            )),

            Self::ConversationNotFound { similar, .. } if !similar.is_empty() => {
                Some(format!("Did you mean: {}?", similar.join(", ")))
            }

            Self::ConversationNotFound { graph_id, .. } => Some(format!(
                "No conversation with id '{graph_id}'. Use `cv status` to see catalog contents."
            )),

            Self::ArchiveNotFound { path } => Some(format!(
                "Nothing has been exported to {} yet. Run `cv sync` first or pass --output-dir.",
                path.display()
            )),

            Self::Config(msg) if msg.contains("token") => Some(
                "Tokens file format: {\"p-b\": \"...\", \"p-lat\": \"...\"}. \
                 Pass it with --tokens or CHATVAULT_TOKENS."
                    .to_string(),
            ),

            Self::InvalidArgument(msg) if msg.contains("since") => Some(
                "Use an ISO8601 timestamp, e.g. 2024-05-01T00:00:00Z or 2024-05-01".to_string(),
            ),

            Self::PartialExtraction { .. }
            | Self::Validation(_)
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

impl From<SyncError> for Error {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Io(e) => Self::Io(e),
            SyncError::Json(e) => Self::Json(e),
            SyncError::FileNotFound(path) => Self::ArchiveNotFound { path },
            other @ SyncError::InvalidRecord { .. } => Self::Validation(other.to_string()),
        }
    }
}

impl From<AcquisitionError> for Error {
    fn from(err: AcquisitionError) -> Self {
        match err {
            AcquisitionError::Authentication { url } => Self::AuthenticationFailure { url },
            AcquisitionError::Timeout {
                waited,
                strategies,
            } => Self::AcquisitionTimeout {
                waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                strategies,
            },
            AcquisitionError::Driver(e) => Self::WebDriver(e.to_string()),
            AcquisitionError::InvalidState { .. } => Self::Other(err.to_string()),
            AcquisitionError::NoMessages { graph_id } => Self::PartialExtraction {
                graph_id,
                reason: "no messages found on page".to_string(),
            },
        }
    }
}
