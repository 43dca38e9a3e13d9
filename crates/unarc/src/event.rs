//! Typed events decoded from raw engine callbacks.
//!
//! Every callback carries a discriminator tag, two 32-bit integers and one
//! string. [`Event::from_raw`] turns that tuple into one variant of a closed
//! set; tags the crate does not know survive as [`Event::Unknown`].

use crate::types::ErrorCode;
use serde::Serialize;
use std::fmt;

/// Untyped payload of a single callback invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawEvent {
    /// Discriminator tag (e.g. "total", "password?")
    pub tag: String,
    pub int1: i32,
    pub int2: i32,
    /// String argument; empty when the engine passed none
    pub text: String,
}

impl RawEvent {
    pub fn new(tag: impl Into<String>, int1: i32, int2: i32, text: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            int1,
            int2,
            text: text.into(),
        }
    }
}

/// Combine the two callback integers into one 64-bit size.
///
/// The engine packs `int1` as the upper part shifted by 20 bits (not 32),
/// with `int2` as the lower part. Both halves are read as unsigned.
#[inline]
pub fn merge_size(int1: i32, int2: i32) -> u64 {
    (u64::from(int1 as u32) << 20) | u64::from(int2 as u32)
}

/// Payload of an `overwrite?` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverwriteRequest {
    /// Size of the incoming file in bytes
    pub file_size: u64,
    pub file_name: String,
}

/// Payload of a `password?` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PasswordRequest {
    /// Size of the engine's password buffer in bytes, including the terminator
    pub buffer_size: i32,
}

impl PasswordRequest {
    /// Whether an encoded password and its terminator fit the engine's
    /// buffer, i.e. it is at most `buffer_size - 1` bytes with no NUL.
    pub fn fits(&self, encoded: &[u8]) -> bool {
        let Ok(size) = usize::try_from(self.buffer_size) else {
            return false;
        };
        encoded.len() < size && !encoded.contains(&0)
    }
}

/// Discriminant of [`Event`], used as the key of per-kind subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ArchiveSize,
    BytesRead,
    BytesWritten,
    FileInfo,
    OverwriteRequest,
    PasswordRequest,
    Error,
    ArchiveTotalFiles,
    ArchiveUncompressedSize,
    ArchiveCompressedSize,
    Unknown,
}

impl EventKind {
    /// Every known kind, in tag-table order.
    pub const ALL: [EventKind; 11] = [
        EventKind::ArchiveSize,
        EventKind::BytesRead,
        EventKind::BytesWritten,
        EventKind::FileInfo,
        EventKind::OverwriteRequest,
        EventKind::PasswordRequest,
        EventKind::Error,
        EventKind::ArchiveTotalFiles,
        EventKind::ArchiveUncompressedSize,
        EventKind::ArchiveCompressedSize,
        EventKind::Unknown,
    ];

    /// Look up the kind for a discriminator tag.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "total" => EventKind::ArchiveSize,
            "read" => EventKind::BytesRead,
            "write" => EventKind::BytesWritten,
            "filename" => EventKind::FileInfo,
            "overwrite?" => EventKind::OverwriteRequest,
            "password?" => EventKind::PasswordRequest,
            "error" => EventKind::Error,
            "total_files" => EventKind::ArchiveTotalFiles,
            "origsize" => EventKind::ArchiveUncompressedSize,
            "compsize" => EventKind::ArchiveCompressedSize,
            _ => EventKind::Unknown,
        }
    }

    /// The wire tag, or `None` for [`EventKind::Unknown`].
    pub fn tag(self) -> Option<&'static str> {
        match self {
            EventKind::ArchiveSize => Some("total"),
            EventKind::BytesRead => Some("read"),
            EventKind::BytesWritten => Some("write"),
            EventKind::FileInfo => Some("filename"),
            EventKind::OverwriteRequest => Some("overwrite?"),
            EventKind::PasswordRequest => Some("password?"),
            EventKind::Error => Some("error"),
            EventKind::ArchiveTotalFiles => Some("total_files"),
            EventKind::ArchiveUncompressedSize => Some("origsize"),
            EventKind::ArchiveCompressedSize => Some("compsize"),
            EventKind::Unknown => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A decoded engine callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// Total size of the archive in bytes
    ArchiveSize { bytes: u64 },

    /// Cumulative bytes read from the archive
    BytesRead { bytes: u64 },

    /// Cumulative bytes written to disk
    BytesWritten { bytes: u64 },

    /// A file is about to be processed
    FileInfo { size: u64, name: String },

    /// The engine asks whether an existing file may be replaced
    OverwriteRequest(OverwriteRequest),

    /// The engine asks for a password
    PasswordRequest(PasswordRequest),

    /// The engine reports a diagnostic
    Error { code: ErrorCode, message: String },

    /// Number of files in the archive
    ArchiveTotalFiles { count: i32 },

    /// Sum of the uncompressed sizes of all files
    ArchiveUncompressedSize { bytes: u64 },

    /// Sum of the compressed sizes of all files
    ArchiveCompressedSize { bytes: u64 },

    /// A tag this crate does not recognize, kept verbatim
    Unknown(RawEvent),
}

impl Event {
    /// Classify a raw callback. Never fails: unmatched tags map to `Unknown`.
    pub fn from_raw(raw: RawEvent) -> Self {
        let size = merge_size(raw.int1, raw.int2);
        match EventKind::from_tag(&raw.tag) {
            EventKind::ArchiveSize => Event::ArchiveSize { bytes: size },
            EventKind::BytesRead => Event::BytesRead { bytes: size },
            EventKind::BytesWritten => Event::BytesWritten { bytes: size },
            EventKind::FileInfo => Event::FileInfo {
                size,
                name: raw.text,
            },
            EventKind::OverwriteRequest => Event::OverwriteRequest(OverwriteRequest {
                file_size: size,
                file_name: raw.text,
            }),
            EventKind::PasswordRequest => Event::PasswordRequest(PasswordRequest {
                buffer_size: raw.int1,
            }),
            EventKind::Error => Event::Error {
                code: ErrorCode::from_raw(raw.int1),
                message: raw.text,
            },
            EventKind::ArchiveTotalFiles => Event::ArchiveTotalFiles { count: raw.int1 },
            EventKind::ArchiveUncompressedSize => Event::ArchiveUncompressedSize { bytes: size },
            EventKind::ArchiveCompressedSize => Event::ArchiveCompressedSize { bytes: size },
            EventKind::Unknown => Event::Unknown(raw),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::ArchiveSize { .. } => EventKind::ArchiveSize,
            Event::BytesRead { .. } => EventKind::BytesRead,
            Event::BytesWritten { .. } => EventKind::BytesWritten,
            Event::FileInfo { .. } => EventKind::FileInfo,
            Event::OverwriteRequest(_) => EventKind::OverwriteRequest,
            Event::PasswordRequest(_) => EventKind::PasswordRequest,
            Event::Error { .. } => EventKind::Error,
            Event::ArchiveTotalFiles { .. } => EventKind::ArchiveTotalFiles,
            Event::ArchiveUncompressedSize { .. } => EventKind::ArchiveUncompressedSize,
            Event::ArchiveCompressedSize { .. } => EventKind::ArchiveCompressedSize,
            Event::Unknown(_) => EventKind::Unknown,
        }
    }
}
