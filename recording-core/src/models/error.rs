use thiserror::Error;

/// Error codes reported through `RecordingEventHandler::on_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    Ok = 0,
    Failed = 1,
    InvalidArgument = 2,
    InternalFailed = 3,
}

impl ErrorCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for ErrorCode {
    type Error = RecordingError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Ok),
            1 => Ok(Self::Failed),
            2 => Ok(Self::InvalidArgument),
            3 => Ok(Self::InternalFailed),
            other => Err(RecordingError::InvalidArgument(format!("unknown error code: {}", other))),
        }
    }
}

/// Recoverable channel lookup/open warnings.
///
/// A warning never changes the session state; the transport keeps retrying
/// under its own policy until it confirms or fails the join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum WarningCode {
    NoAvailableChannel = 103,
    LookupChannelTimeout = 104,
    LookupChannelRejected = 105,
    OpenChannelTimeout = 106,
    OpenChannelRejected = 107,
}

impl WarningCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for WarningCode {
    type Error = RecordingError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            103 => Ok(Self::NoAvailableChannel),
            104 => Ok(Self::LookupChannelTimeout),
            105 => Ok(Self::LookupChannelRejected),
            106 => Ok(Self::OpenChannelTimeout),
            107 => Ok(Self::OpenChannelRejected),
            other => Err(RecordingError::InvalidArgument(format!("unknown warning code: {}", other))),
        }
    }
}

/// Errors returned synchronously by the recording engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordingError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("engine has been released")]
    Released,

    #[error("participant {0} is already in the channel")]
    DuplicateParticipant(u32),

    #[error("operation failed: {0}")]
    Failed(String),

    #[error("internal failure: {0}")]
    Internal(String),
}

impl RecordingError {
    /// The error code this error is reported as.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Internal(_) => ErrorCode::InternalFailed,
            Self::InvalidState(_) | Self::Released | Self::DuplicateParticipant(_) | Self::Failed(_) => {
                ErrorCode::Failed
            }
        }
    }

    /// Negative integer status for callers that speak the numeric contract.
    pub fn status(&self) -> i32 {
        -self.code().code()
    }
}

/// Integer status of an engine call: 0 on success, negative on failure.
pub fn status(result: &Result<(), RecordingError>) -> i32 {
    match result {
        Ok(()) => ErrorCode::Ok.code(),
        Err(e) => e.status(),
    }
}
