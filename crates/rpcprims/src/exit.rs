use std::fmt;
use std::io;

use rpcprims_call::{Code, Status};

// Exit code constants aligned with sysexits and timeout(1).
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

/// Process exit code for a failed call.
pub fn exit_code(code: Code) -> i32 {
    match code {
        Code::Ok => SUCCESS,
        Code::DeadlineExceeded => TIMEOUT,
        Code::Unavailable => TRANSPORT_ERROR,
        Code::PermissionDenied | Code::Unauthenticated => PERMISSION_DENIED,
        Code::InvalidArgument
        | Code::OutOfRange
        | Code::ResourceExhausted
        | Code::FailedPrecondition => DATA_INVALID,
        Code::Unimplemented | Code::NotFound => USAGE,
        Code::Internal | Code::Unknown | Code::DataLoss => INTERNAL,
        Code::Cancelled | Code::AlreadyExists | Code::Aborted => FAILURE,
    }
}

pub fn status_error(context: &str, status: &Status) -> CliError {
    CliError::new(exit_code(status.code()), format!("{context}: {status}"))
}
