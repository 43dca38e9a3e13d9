//! The public facade: subscriptions, handshake handlers, and execution.

use crate::codec::TextCodec;
use crate::command::Command;
use crate::dispatch::{Dispatcher, Handlers, Subscribers};
use crate::error::Result;
use crate::event::{Event, EventKind, OverwriteRequest, PasswordRequest};
use crate::native::{self, Engine, NativeEngine};
use crate::types::{ExitCode, OverwriteResponse, PasswordReply};
use std::ffi::OsStr;
use std::sync::Arc;
use tokio::task;

/// Runs commands against an engine and routes its callbacks.
///
/// Registration takes `&mut self` and execution `&self`, so the
/// registrations seen by a running command cannot change under it. Every
/// execution works on its own snapshot.
#[derive(Clone)]
pub struct Unarc {
    engine: Arc<dyn Engine>,
    subscribers: Subscribers,
    handlers: Handlers,
    codec: TextCodec,
}

impl Unarc {
    pub fn new(engine: impl Engine + 'static) -> Self {
        Self::with_engine(Arc::new(engine))
    }

    pub fn with_engine(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            subscribers: Subscribers::default(),
            handlers: Handlers::default(),
            codec: TextCodec::system(),
        }
    }

    /// Load the native engine library and wrap it.
    pub fn load(library: impl AsRef<OsStr>) -> Result<Self> {
        Ok(Self::new(NativeEngine::load(library)?))
    }

    /// Receive every event.
    pub fn subscribe_all<F>(&mut self, subscriber: F) -> &mut Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribers.add_any(Arc::new(subscriber));
        self
    }

    /// Receive events of one kind. Runs after the `subscribe_all` channel.
    pub fn subscribe<F>(&mut self, kind: EventKind, subscriber: F) -> &mut Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribers.add(kind, Arc::new(subscriber));
        self
    }

    /// Answer overwrite requests. Without a handler they are answered with
    /// [`OverwriteResponse::Abort`].
    pub fn set_overwrite_handler<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&OverwriteRequest) -> OverwriteResponse + Send + Sync + 'static,
    {
        self.handlers.overwrite = Some(Arc::new(handler));
        self
    }

    /// Answer password requests. Without a handler they are aborted.
    ///
    /// A password must encode to at most `buffer_size - 1` bytes. A longer
    /// candidate is discarded and the handler is asked again, as often as
    /// it takes.
    pub fn set_password_handler<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&PasswordRequest) -> PasswordReply + Send + Sync + 'static,
    {
        self.handlers.password = Some(Arc::new(handler));
        self
    }

    /// Code page for arguments and callback strings. Defaults to
    /// [`TextCodec::system`].
    pub fn set_codec(&mut self, codec: TextCodec) -> &mut Self {
        self.codec = codec;
        self
    }

    pub fn codec(&self) -> TextCodec {
        self.codec
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.subscribers.clone(), self.handlers.clone()).with_codec(self.codec)
    }

    /// Run a command, blocking until the engine returns.
    ///
    /// Subscribers and handlers run on this thread, inside the engine call.
    ///
    /// # Errors
    ///
    /// Returns an error if the command is malformed, if a subscriber or
    /// handler panicked, or if the engine returns an undocumented status.
    /// Engine-side failures are reported through the exit code and `Error`
    /// events, not as errors.
    pub fn execute(&self, command: &Command) -> Result<ExitCode> {
        native::execute(self.engine.as_ref(), command, self.dispatcher())
    }

    /// Run a command on tokio's blocking pool.
    ///
    /// The current registrations are captured when this is called.
    pub async fn execute_async(&self, command: Command) -> Result<ExitCode> {
        let engine = Arc::clone(&self.engine);
        let dispatcher = self.dispatcher();
        task::spawn_blocking(move || native::execute(engine.as_ref(), &command, dispatcher)).await?
    }
}
