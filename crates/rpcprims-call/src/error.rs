use std::fmt;
use std::sync::Arc;

use crate::metadata::Metadata;

/// Canonical RPC status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Code {
    Ok = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl Code {
    /// Parse a status code from its numeric value. Unknown values map to `Unknown`.
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::Ok,
            1 => Self::Cancelled,
            2 => Self::Unknown,
            3 => Self::InvalidArgument,
            4 => Self::DeadlineExceeded,
            5 => Self::NotFound,
            6 => Self::AlreadyExists,
            7 => Self::PermissionDenied,
            8 => Self::ResourceExhausted,
            9 => Self::FailedPrecondition,
            10 => Self::Aborted,
            11 => Self::OutOfRange,
            12 => Self::Unimplemented,
            13 => Self::Internal,
            14 => Self::Unavailable,
            15 => Self::DataLoss,
            16 => Self::Unauthenticated,
            _ => Self::Unknown,
        }
    }

    /// Canonical upper-case name, e.g. `DEADLINE_EXCEEDED`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::Aborted => "ABORTED",
            Self::OutOfRange => "OUT_OF_RANGE",
            Self::Unimplemented => "UNIMPLEMENTED",
            Self::Internal => "INTERNAL",
            Self::Unavailable => "UNAVAILABLE",
            Self::DataLoss => "DATA_LOSS",
            Self::Unauthenticated => "UNAUTHENTICATED",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of an RPC: a status code with optional message, metadata and cause.
///
/// This is the only failure type surfaced by the call drivers. Anything that
/// goes wrong below them is normalized into a `Status` before it reaches the
/// caller.
#[derive(Debug, Clone, thiserror::Error)]
#[error("status {code}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
pub struct Status {
    code: Code,
    message: Option<String>,
    metadata: Metadata,
    #[source]
    cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Status {
    /// Create a status with an explicit code and message.
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
            metadata: Metadata::new(),
            cause: None,
        }
    }

    /// Create a status carrying only a code.
    pub fn from_code(code: Code) -> Self {
        Self {
            code,
            message: None,
            metadata: Metadata::new(),
            cause: None,
        }
    }

    /// The successful status.
    pub fn ok() -> Self {
        Self::from_code(Code::Ok)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(Code::Cancelled, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(Code::Unknown, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(Code::DeadlineExceeded, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Code::NotFound, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(Code::PermissionDenied, message)
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::new(Code::ResourceExhausted, message)
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(Code::FailedPrecondition, message)
    }

    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(Code::Unimplemented, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }

    /// Attach metadata (typically the trailers the status arrived with).
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Attach an underlying cause.
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Returns true if the code is `Ok`.
    pub fn is_ok(&self) -> bool {
        self.code == Code::Ok
    }
}

/// Errors raised by a [`ClientCall`](crate::ClientCall) implementation.
///
/// These never reach callers directly; drivers convert them into [`Status`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum CallError {
    /// `start` was invoked more than once.
    #[error("call already started")]
    AlreadyStarted,

    /// An operation that requires a started call was invoked before `start`.
    #[error("call not started")]
    NotStarted,

    /// A message or a second half-close was submitted after `half_close`.
    #[error("call already half-closed")]
    HalfClosed,

    /// The call was cancelled by the client.
    #[error("call cancelled: {0}")]
    Cancelled(String),

    /// The outbound message exceeds the negotiated limit.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The transport refused the operation with a specific status.
    #[error("call rejected: {0}")]
    Rejected(Status),

    /// Transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<CallError> for Status {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Rejected(status) => status,
            CallError::Cancelled(_) => Status::cancelled(err.to_string()).with_cause(err),
            CallError::MessageTooLarge { .. } => {
                Status::resource_exhausted(err.to_string()).with_cause(err)
            }
            CallError::Transport(_) => Status::unavailable(err.to_string()).with_cause(err),
            CallError::AlreadyStarted | CallError::NotStarted | CallError::HalfClosed => {
                Status::internal(err.to_string()).with_cause(err)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Status>;
