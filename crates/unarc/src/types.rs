//! Protocol value types shared by the engine and its callers.

use crate::error::{Result, UnarcError};
use serde::{Deserialize, Serialize};

/// Final status returned by the native entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitCode {
    /// The operation completed
    Success,

    /// The operation failed
    Failure,

    /// The engine hit an unrecoverable condition
    SeriousFailure,
}

impl ExitCode {
    /// Interpret a raw status returned by the engine.
    pub fn from_raw(status: i32) -> Result<Self> {
        match status {
            0 => Ok(ExitCode::Success),
            1 => Ok(ExitCode::Failure),
            2 => Ok(ExitCode::SeriousFailure),
            other => Err(UnarcError::UnexpectedStatus(other)),
        }
    }

    /// Raw status value.
    pub fn code(self) -> i32 {
        match self {
            ExitCode::Success => 0,
            ExitCode::Failure => 1,
            ExitCode::SeriousFailure => 2,
        }
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Success
    }
}

/// Diagnostic code carried by `error` events.
///
/// The bridge never interprets these; they are surfaced as-is so the caller
/// can decide whether an operation is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Ok,
    GeneralError,
    InvalidCompressor,
    OnlyDecompress,
    OutBlockTooSmall,
    NotEnoughMemory,
    ReadError,
    BadCompressedData,
    NotImplemented,
    NoMoreDataRequired,
    OperationTerminated,
    WriteError,
    BadCrc,
    BadPassword,
    BadHeaders,
    Internal,
    /// A value outside the documented set
    Unrecognized(i32),
}

impl ErrorCode {
    pub fn from_raw(code: i32) -> Self {
        match code {
            0 => ErrorCode::Ok,
            -1 => ErrorCode::GeneralError,
            -2 => ErrorCode::InvalidCompressor,
            -3 => ErrorCode::OnlyDecompress,
            -4 => ErrorCode::OutBlockTooSmall,
            -5 => ErrorCode::NotEnoughMemory,
            -6 => ErrorCode::ReadError,
            -7 => ErrorCode::BadCompressedData,
            -8 => ErrorCode::NotImplemented,
            -9 => ErrorCode::NoMoreDataRequired,
            -10 => ErrorCode::OperationTerminated,
            -11 => ErrorCode::WriteError,
            -12 => ErrorCode::BadCrc,
            -13 => ErrorCode::BadPassword,
            -14 => ErrorCode::BadHeaders,
            -15 => ErrorCode::Internal,
            other => ErrorCode::Unrecognized(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            ErrorCode::Ok => 0,
            ErrorCode::GeneralError => -1,
            ErrorCode::InvalidCompressor => -2,
            ErrorCode::OnlyDecompress => -3,
            ErrorCode::OutBlockTooSmall => -4,
            ErrorCode::NotEnoughMemory => -5,
            ErrorCode::ReadError => -6,
            ErrorCode::BadCompressedData => -7,
            ErrorCode::NotImplemented => -8,
            ErrorCode::NoMoreDataRequired => -9,
            ErrorCode::OperationTerminated => -10,
            ErrorCode::WriteError => -11,
            ErrorCode::BadCrc => -12,
            ErrorCode::BadPassword => -13,
            ErrorCode::BadHeaders => -14,
            ErrorCode::Internal => -15,
            ErrorCode::Unrecognized(code) => code,
        }
    }
}

/// Answer to an `overwrite?` request.
///
/// `No` and `Never` share the same wire character; the engine, not this
/// crate, decides what that character means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwriteResponse {
    /// Overwrite this file
    Yes,

    /// Keep the existing file
    No,

    /// Overwrite this and every following file
    Always,

    /// Keep every existing file
    Never,

    /// Stop the operation
    Abort,
}

impl OverwriteResponse {
    /// Character code returned to the engine.
    pub fn code(self) -> i32 {
        let c = match self {
            OverwriteResponse::Yes => b'y',
            OverwriteResponse::No | OverwriteResponse::Never => b'n',
            OverwriteResponse::Always => b'a',
            OverwriteResponse::Abort => b'q',
        };
        i32::from(c)
    }
}

/// Answer to a `password?` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordResponse {
    /// A password was written into the engine's buffer
    Provided,

    /// No password is available
    NotProvided,

    /// Stop the operation
    Abort,
}

impl PasswordResponse {
    /// Character code returned to the engine.
    pub fn code(self) -> i32 {
        let c = match self {
            PasswordResponse::Provided => b'y',
            PasswordResponse::NotProvided => b'n',
            PasswordResponse::Abort => b'q',
        };
        i32::from(c)
    }
}

/// What a password handler hands back: a response plus an optional candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordReply {
    pub response: PasswordResponse,
    pub password: Option<String>,
}

impl PasswordReply {
    /// Reply with a candidate password.
    pub fn provided(password: impl Into<String>) -> Self {
        Self {
            response: PasswordResponse::Provided,
            password: Some(password.into()),
        }
    }

    pub fn not_provided() -> Self {
        Self {
            response: PasswordResponse::NotProvided,
            password: None,
        }
    }

    pub fn abort() -> Self {
        Self {
            response: PasswordResponse::Abort,
            password: None,
        }
    }
}
