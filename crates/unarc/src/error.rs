//! Error types for bridge operations.

use thiserror::Error;

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, UnarcError>;

/// Main error type for bridge operations.
#[derive(Debug, Error)]
pub enum UnarcError {
    /// The engine only runs inside a 32-bit address space.
    #[error(
        "The unarc engine is only compatible with 32-bit processes; \
         build for a 32-bit target (e.g. i686-pc-windows-msvc)"
    )]
    UnsupportedPlatform,

    /// The native library could not be loaded.
    #[error("Failed to load native library {path}: {source}")]
    LibraryLoad {
        /// Path that was passed to the loader
        path: String,
        /// Loader error
        #[source]
        source: libloading::Error,
    },

    /// The native library does not export the entry point.
    #[error("Entry point {symbol} not found: {source}")]
    SymbolNotFound {
        /// Exported symbol name
        symbol: &'static str,
        /// Loader error
        #[source]
        source: libloading::Error,
    },

    /// The command cannot be serialized into a valid argument vector.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// The argument vector does not fit the fixed-arity native call.
    #[error("Too many arguments: {count} > {max}")]
    TooManyArguments {
        /// Number of arguments after padding
        count: usize,
        /// Slot ceiling of the native call
        max: usize,
    },

    /// A subscriber or handler panicked while the engine was waiting on it.
    #[error("Callback panicked during native call: {0}")]
    CallbackPanicked(String),

    /// The engine returned a status outside the documented exit codes.
    #[error("Unexpected native status code: {0}")]
    UnexpectedStatus(i32),

    /// The worker task running an async execution failed.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
