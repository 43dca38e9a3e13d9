//! Callback dispatch and the two interactive handshakes.
//!
//! One [`Dispatcher`] serves one native call. For every callback it decodes
//! the raw message, publishes the event to subscribers, and decides the value
//! returned to the engine. Overwrite and password requests block the engine
//! until the registered handler answers.

use crate::codec::TextCodec;
use crate::event::{Event, EventKind, OverwriteRequest, PasswordRequest, RawEvent};
use crate::types::{OverwriteResponse, PasswordReply, PasswordResponse};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};

/// Receives every published event of the kinds it subscribed to.
pub type Subscriber = Arc<dyn Fn(&Event) + Send + Sync>;

/// Decides whether an existing file may be replaced.
pub type OverwriteHandler = Arc<dyn Fn(&OverwriteRequest) -> OverwriteResponse + Send + Sync>;

/// Supplies a password when the engine asks for one.
///
/// A password fits when its encoded form is at most `buffer_size - 1` bytes:
/// the last byte of the buffer is reserved for the terminator. The handler
/// is called again whenever its candidate does not fit or cannot be encoded,
/// so it must eventually return a fitting password or none.
pub type PasswordHandler = Arc<dyn Fn(&PasswordRequest) -> PasswordReply + Send + Sync>;

/// Value returned to the engine when a callback does not continue normally.
pub(crate) const ABORT_STATUS: i32 = -1;

/// Subscriber lists for the any-event channel and each per-kind channel.
#[derive(Clone, Default)]
pub struct Subscribers {
    any: Vec<Subscriber>,
    by_kind: BTreeMap<EventKind, Vec<Subscriber>>,
}

impl Subscribers {
    pub fn add_any(&mut self, subscriber: Subscriber) {
        self.any.push(subscriber);
    }

    pub fn add(&mut self, kind: EventKind, subscriber: Subscriber) {
        self.by_kind.entry(kind).or_default().push(subscriber);
    }

    /// Total number of registrations across all channels.
    pub fn len(&self) -> usize {
        self.any.len() + self.by_kind.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke the any-event channel, then the event's own channel, each in
    /// registration order.
    pub fn publish(&self, event: &Event) {
        for subscriber in &self.any {
            subscriber(event);
        }
        if let Some(channel) = self.by_kind.get(&event.kind()) {
            for subscriber in channel {
                subscriber(event);
            }
        }
    }
}

impl fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels: BTreeMap<_, _> = self.by_kind.iter().map(|(k, v)| (k, v.len())).collect();
        f.debug_struct("Subscribers")
            .field("any", &self.any.len())
            .field("by_kind", &channels)
            .finish()
    }
}

/// Registered handshake handlers.
#[derive(Clone, Default)]
pub struct Handlers {
    pub overwrite: Option<OverwriteHandler>,
    pub password: Option<PasswordHandler>,
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("overwrite", &self.overwrite.is_some())
            .field("password", &self.password.is_some())
            .finish()
    }
}

/// How one callback is answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Let the engine carry on
    Continue,

    /// Answer to an overwrite request
    Overwrite(OverwriteResponse),

    /// Answer to a password request; `password` is encoded and known to fit
    Password {
        response: PasswordResponse,
        password: Option<Vec<u8>>,
    },
}

impl Reply {
    /// Status value returned from the callback.
    pub fn code(&self) -> i32 {
        match self {
            Reply::Continue => 0,
            Reply::Overwrite(response) => response.code(),
            Reply::Password { response, .. } => response.code(),
        }
    }
}

/// Per-call dispatch state: a snapshot of subscribers and handlers, plus
/// the code page used for the engine's strings.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    subscribers: Subscribers,
    handlers: Handlers,
    codec: TextCodec,
}

impl Dispatcher {
    pub fn new(subscribers: Subscribers, handlers: Handlers) -> Self {
        Self {
            subscribers,
            handlers,
            codec: TextCodec::default(),
        }
    }

    pub fn with_codec(mut self, codec: TextCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn codec(&self) -> TextCodec {
        self.codec
    }

    /// Classify, publish and answer one callback.
    pub fn dispatch(&self, raw: RawEvent) -> Reply {
        let event = Event::from_raw(raw);
        trace!(kind = %event.kind(), "engine callback");

        if let Event::Unknown(raw) = &event {
            warn!(
                tag = %raw.tag,
                int1 = raw.int1,
                int2 = raw.int2,
                text = %raw.text,
                "Unknown event type received"
            );
        }

        self.subscribers.publish(&event);

        match &event {
            Event::OverwriteRequest(request) => Reply::Overwrite(self.answer_overwrite(request)),
            Event::PasswordRequest(request) => self.answer_password(request),
            _ => Reply::Continue,
        }
    }

    fn answer_overwrite(&self, request: &OverwriteRequest) -> OverwriteResponse {
        match &self.handlers.overwrite {
            Some(handler) => handler(request),
            None => {
                warn!(file = %request.file_name, "Overwrite requested without a handler, aborting");
                OverwriteResponse::Abort
            }
        }
    }

    /// Ask the handler until it returns a password that fits or no password.
    ///
    /// The loop is unbounded: an oversized password is never truncated, and
    /// the handler is the only party that can end the exchange.
    fn answer_password(&self, request: &PasswordRequest) -> Reply {
        let Some(handler) = &self.handlers.password else {
            warn!("Password requested without a handler, aborting");
            return Reply::Password {
                response: PasswordResponse::Abort,
                password: None,
            };
        };

        loop {
            let PasswordReply { response, password } = handler(request);
            match password {
                Some(password) if !password.is_empty() => {
                    let Some(encoded) = self.codec.encode(&password) else {
                        warn!(
                            encoding = self.codec.name(),
                            "Password cannot be encoded for the engine, asking again"
                        );
                        continue;
                    };
                    if request.fits(&encoded) {
                        return Reply::Password {
                            response,
                            password: Some(encoded),
                        };
                    }
                    warn!(
                        length = encoded.len(),
                        buffer_size = request.buffer_size,
                        "Password does not fit the engine buffer, asking again"
                    );
                }
                _ => {
                    trace!("Handler returned no password");
                    return Reply::Password {
                        response,
                        password: None,
                    };
                }
            }
        }
    }
}
