use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Langbase error: {0}")]
    Langbase(#[from] LangbaseError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Langbase API errors
#[derive(Debug, Error)]
pub enum LangbaseError {
    #[error("Langbase unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("LANGBASE_API_KEY is not configured")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Argument extraction errors.
///
/// `Transient` and `InvalidClauseReference` are recovered inside the
/// pipeline; only `Unavailable` reaches callers.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Transient extraction failure in batch {batch}: {message}")]
    Transient { batch: usize, message: String },

    #[error("Extraction unavailable for batch {batch}: {message}")]
    Unavailable { batch: usize, message: String },

    #[error("Unknown clause reference: {clause_id}")]
    InvalidClauseReference { clause_id: String },

    #[error("Batch {batch} skipped after cancellation")]
    Cancelled { batch: usize },
}

/// Result cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache file corrupt at {path}: {message}")]
    Corruption { path: String, message: String },

    #[error("Cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for Langbase operations
pub type LangbaseResult<T> = Result<T, LangbaseError>;

/// Result type alias for extraction operations
pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
