use thiserror::Error;

/// Custom error type for kdash.
///
/// Every variant is a distinct kind; callers (and tests) match on the
/// variant, the message is only for humans. Payloads are plain strings so
/// the error stays `Clone` and one scan outcome can be handed to every
/// caller that joined the same in-flight scan.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KdashError {
    #[error("Invalid subject: {0}")]
    InvalidSubject(String),

    #[error("Scanner unavailable: {0}")]
    ScannerUnavailable(String),

    #[error("Subject not found: {0}")]
    SubjectNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Scan timed out after {0} seconds")]
    ScanTimedOut(u64),

    #[error("Gave up after {0} seconds waiting for an in-flight scan")]
    WaitTimedOut(u64),

    #[error("Malformed scanner output: {0}")]
    MalformedOutput(String),

    #[error("Host metrics unavailable: {0}")]
    SamplingUnavailable(String),

    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Unknown(String),
}

/// Result type alias for kdash.
pub type Result<T> = std::result::Result<T, KdashError>;

impl KdashError {
    pub fn invalid_subject<S: Into<String>>(msg: S) -> Self {
        KdashError::InvalidSubject(msg.into())
    }

    pub fn scanner_unavailable<S: Into<String>>(msg: S) -> Self {
        KdashError::ScannerUnavailable(msg.into())
    }

    pub fn subject_not_found<S: Into<String>>(msg: S) -> Self {
        KdashError::SubjectNotFound(msg.into())
    }

    pub fn permission_denied<S: Into<String>>(msg: S) -> Self {
        KdashError::PermissionDenied(msg.into())
    }

    pub fn malformed_output<S: Into<String>>(msg: S) -> Self {
        KdashError::MalformedOutput(msg.into())
    }

    pub fn sampling_unavailable<S: Into<String>>(msg: S) -> Self {
        KdashError::SamplingUnavailable(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        KdashError::Config(msg.into())
    }

    /// Create a generic error
    pub fn unknown<S: Into<String>>(msg: S) -> Self {
        KdashError::Unknown(msg.into())
    }

    /// HTTP status an API boundary should answer with for this kind.
    pub fn http_status(&self) -> u16 {
        match self {
            KdashError::InvalidSubject(_) | KdashError::UnsupportedFormat(_) => 400,
            KdashError::ScanTimedOut(_) | KdashError::WaitTimedOut(_) => 408,
            KdashError::ScannerUnavailable(_) => 503,
            KdashError::SubjectNotFound(_)
            | KdashError::PermissionDenied(_)
            | KdashError::MalformedOutput(_)
            | KdashError::SamplingUnavailable(_)
            | KdashError::Config(_)
            | KdashError::Unknown(_) => 500,
        }
    }

    /// Stable snake_case name of the kind, used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            KdashError::InvalidSubject(_) => "invalid_subject",
            KdashError::ScannerUnavailable(_) => "scanner_unavailable",
            KdashError::SubjectNotFound(_) => "subject_not_found",
            KdashError::PermissionDenied(_) => "permission_denied",
            KdashError::ScanTimedOut(_) => "scan_timed_out",
            KdashError::WaitTimedOut(_) => "wait_timed_out",
            KdashError::MalformedOutput(_) => "malformed_output",
            KdashError::SamplingUnavailable(_) => "sampling_unavailable",
            KdashError::UnsupportedFormat(_) => "unsupported_format",
            KdashError::Config(_) => "config",
            KdashError::Unknown(_) => "unknown",
        }
    }
}
