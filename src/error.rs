//! Error types for seedwatch.

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Status source error: {0}")]
    Source(#[from] SourceError),

    #[error("Notify error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Invalid torrent status: {0}")]
    InvalidStatus(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Status source (Deluge daemon) errors.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Request to {endpoint} failed: {reason}")]
    RequestFailed { endpoint: String, reason: String },

    #[error("Authentication with the daemon failed")]
    AuthFailed,

    #[error("Daemon returned an error for {method}: {reason}")]
    Rpc { method: String, reason: String },

    #[error("Invalid response from daemon: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Notifier (Telegram Bot API) errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to notify owner {owner}: {reason}")]
    SendFailed { owner: i64, reason: String },

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Scheduler and worker errors.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Job {job} execution failed: {reason}")]
    ExecutionFailed { job: String, reason: String },

    #[error("Worker {key} action failed: {reason}")]
    WorkerAction { key: String, reason: String },

    #[error("Duplicate job name: {0}")]
    DuplicateJob(String),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
