use thiserror::Error;

/// Errors raised anywhere in the pipeline, from source-match through merge.
///
/// Each variant is either a *file error* (caused by the data in a single
/// source file, never retried, routed to the file's owner) or a transient /
/// code-defect error (retried per the configured `RetryPolicy`, routed to
/// the operator once retries are exhausted). `is_file_error`/`is_retryable`
/// are the single source of truth other crates consult instead of matching
/// on variants directly.
#[derive(Error, Debug)]
pub enum EtlError {
    #[error("no source matches file {filename}")]
    NoMatchingSource { filename: String },

    #[error("file {filename} matches more than one source: {candidates:?}")]
    AmbiguousSource { filename: String, candidates: Vec<String> },

    #[error("{filename} is missing required header(s): {missing:?}")]
    MissingHeader { filename: String, missing: Vec<String> },

    #[error("{filename} is missing required column(s): {missing:?}")]
    MissingColumns { filename: String, missing: Vec<String> },

    #[error("{filename}: grain {grain:?} is not unique in the stage table ({detail})")]
    GrainValidation { filename: String, grain: Vec<String>, detail: String },

    #[error("{filename}: audit '{audit_name}' failed - {detail}")]
    AuditFailed { filename: String, audit_name: String, detail: String },

    #[error("{filename}: {failed}/{processed} rows failed validation, exceeding threshold {threshold} (sample: {sample:?})")]
    ValidationThresholdExceeded { filename: String, failed: usize, processed: usize, threshold: f64, sample: Vec<String> },

    #[error("unable to read {path}")]
    Io { path: String, #[source] source: std::io::Error },

    #[error("unable to move {path} to {destination}")]
    Move { path: String, destination: String, #[source] source: std::io::Error },

    #[error("database error while {operation}")]
    Database { operation: String, #[source] source: sqlx::Error },

    #[error("connection to the warehouse timed out after {0:?}")]
    ConnectionTimeout(std::time::Duration),

    #[error("unexpected error: {0}")]
    CodeDefect(#[from] anyhow::Error),
}

impl EtlError {
    /// Mirrors the original's `FILE_ERROR_EXCEPTIONS` set-membership check:
    /// these kinds are caused by the file's own data, never retried, and
    /// routed to the file's owner rather than the operator.
    pub fn is_file_error(&self) -> bool {
        matches!(
            self,
            EtlError::GrainValidation { .. }
                | EtlError::AuditFailed { .. }
                | EtlError::MissingHeader { .. }
                | EtlError::MissingColumns { .. }
                | EtlError::ValidationThresholdExceeded { .. }
        )
    }

    /// Transient errors (DB round-trip, filesystem hiccup) are retried by
    /// the `RetryPolicy`; file errors and code defects are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EtlError::Database { .. } | EtlError::ConnectionTimeout(_) | EtlError::Io { .. })
    }

    /// `false` means route to the operator instead of the file's owner.
    pub fn notify_owner(&self) -> bool {
        self.is_file_error()
    }

    /// A stable, human-readable tag for this variant - persisted as
    /// `RunLog.error_type` and surfaced in owner/operator notifications
    /// (spec.md §3, §6) so downstream consumers don't have to parse the
    /// `Display` message.
    pub fn kind_name(&self) -> &'static str {
        match self {
            EtlError::NoMatchingSource { .. } => "NoMatchingSource",
            EtlError::AmbiguousSource { .. } => "AmbiguousSource",
            EtlError::MissingHeader { .. } => "MissingHeaderError",
            EtlError::MissingColumns { .. } => "MissingColumnsError",
            EtlError::GrainValidation { .. } => "GrainValidationError",
            EtlError::AuditFailed { .. } => "AuditFailedError",
            EtlError::ValidationThresholdExceeded { .. } => "ValidationThresholdExceededError",
            EtlError::Io { .. } => "IoError",
            EtlError::Move { .. } => "MoveError",
            EtlError::Database { .. } => "DatabaseError",
            EtlError::ConnectionTimeout(_) => "ConnectionTimeout",
            EtlError::CodeDefect(_) => "CodeDefect",
        }
    }
}
