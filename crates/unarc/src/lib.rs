//! # Unarc
//!
//! A typed bridge to the native unarc extraction engine.
//!
//! The engine exposes one variadic entry point that takes a flag-based
//! command line and reports everything else (progress, archive metadata,
//! diagnostics, and interactive prompts) through synchronous callbacks made
//! during the call. This crate builds the command line from a [`Command`],
//! performs the native call, decodes each callback into an [`Event`], and
//! answers the two callbacks that need caller input: overwrite confirmation
//! and password entry.
//!
//! Strings cross the boundary in the engine's ANSI code page; see
//! [`TextCodec`].
//!
//! The engine only runs in a 32-bit process; [`NativeEngine::load`] refuses
//! to load it anywhere else.
//!
//! ## Example
//!
//! ```rust,no_run
//! use unarc::{Command, Event, EventKind, ExtractOptions, OverwritePolicy, PasswordReply, Unarc};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut unarc = Unarc::load("unarc.dll")?;
//!
//! unarc
//!     .subscribe(EventKind::BytesWritten, |event| {
//!         if let Event::BytesWritten { bytes } = event {
//!             println!("{} bytes written", bytes);
//!         }
//!     })
//!     .set_password_handler(|_request| PasswordReply::provided("secret"));
//!
//! let options = ExtractOptions {
//!     destination: Some("output".into()),
//!     overwrite: OverwritePolicy::Always,
//!     ..Default::default()
//! };
//! let exit_code = unarc.execute(&Command::extract_with_paths("archive.arc", options))?;
//! println!("Finished: {:?}", exit_code);
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod codec;
pub mod command;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod native;
pub mod types;

// Re-export main types
pub use bridge::Unarc;
pub use codec::TextCodec;
pub use command::{Command, CommandKind, ExtractOptions, ListOptions, OverwritePolicy, TestOptions};
pub use dispatch::{Dispatcher, Reply};
pub use error::{Result, UnarcError};
pub use event::{merge_size, Event, EventKind, OverwriteRequest, PasswordRequest, RawEvent};
pub use native::{Engine, NativeEngine, RawCallback, MAX_ARGUMENTS, MIN_ARGUMENTS};
pub use types::{ErrorCode, ExitCode, OverwriteResponse, PasswordReply, PasswordResponse};
