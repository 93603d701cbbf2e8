use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation failed: {field} - {reason}")]
    Validation { field: String, reason: String },

    #[error("CPD error: {0}")]
    Cpd(#[from] CpdError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Conditional probability table errors.
///
/// These are caller contract violations: malformed tables are rejected at the
/// boundary, never padded or truncated.
#[derive(Debug, Error, PartialEq)]
pub enum CpdError {
    #[error("CPD '{variable}' has {actual} rows, expected {expected}")]
    RowCount {
        variable: String,
        expected: usize,
        actual: usize,
    },

    #[error("CPD '{variable}' row {row} has {actual} states, expected {expected}")]
    RowWidth {
        variable: String,
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("CPD '{variable}' row {row} index {index} holds invalid probability {value}")]
    InvalidValue {
        variable: String,
        row: usize,
        index: usize,
        value: f64,
    },

    #[error("CPD '{variable}' row {row} sums to {sum}, expected 1")]
    RowSum {
        variable: String,
        row: usize,
        sum: f64,
    },

    #[error("Index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid probability: {value}")]
    NotAProbability { value: f64 },

    #[error("A row of {len} states cannot be balanced")]
    Unbalanceable { len: usize },

    #[error("Malformed backend shape: {message}")]
    Shape { message: String },

    #[error("Unknown variable: {variable}")]
    UnknownVariable { variable: String },
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Remote store error: {status} - {message}")]
    Remote { status: u16, message: String },

    #[error("Invalid stored data: {message}")]
    InvalidData { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Inference backend errors
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Inference backend unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for CPD operations
pub type CpdResult<T> = Result<T, CpdError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for inference backend operations
pub type BackendResult<T> = Result<T, BackendError>;
