//! Native call adapter.
//!
//! The engine exports a single variadic entry point:
//!
//! ```text
//! int FreeArcExtract(cbtype *callback, ...);   // char* arguments
//! ```
//!
//! It reads string arguments until it meets an empty one and indexes into
//! the first [`MIN_ARGUMENTS`] slots without checking, so the vector is always
//! padded with empty strings. The callback carries no user data pointer;
//! the active dispatch session lives in a thread-local slot for the duration
//! of the call.

use crate::codec::TextCodec;
use crate::command::{Command, PASSWORD_FLAG};
use crate::dispatch::{Dispatcher, Reply, ABORT_STATUS};
use crate::error::{Result, UnarcError};
use crate::event::{EventKind, RawEvent};
use crate::types::{ExitCode, OverwriteResponse, PasswordResponse};
use libloading::Library;
use std::any::Any;
use std::cell::Cell;
use std::ffi::{c_char, c_int, CStr, CString, OsStr, OsString};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use tracing::{debug, error, trace};

/// Minimum number of string arguments passed to the engine.
pub const MIN_ARGUMENTS: usize = 10;

/// Number of string slots in every native call.
///
/// The call is emitted with a fixed arity; slots after the real arguments
/// hold empty strings, which the engine reads as the end of input.
pub const MAX_ARGUMENTS: usize = 32;

const ENTRY_POINT: &str = "FreeArcExtract";

/// Signature of the callback handed to the engine.
///
/// `text` is the event's string argument; for `password?` it is the buffer
/// the password is written into.
pub type RawCallback =
    unsafe extern "C" fn(what: *const c_char, int1: c_int, int2: c_int, text: *mut c_char) -> c_int;

type ExtractFn = unsafe extern "C" fn(callback: RawCallback, ...) -> c_int;

/// The callable behind the adapter.
///
/// Implementations must invoke `callback` synchronously, on the calling
/// thread, and only before `extract` returns.
pub trait Engine: Send + Sync {
    /// Run one engine call and return its raw status.
    ///
    /// `args` is already padded to at least [`MIN_ARGUMENTS`] and at most
    /// [`MAX_ARGUMENTS`] entries, encoded in the engine's code page.
    fn extract(&self, callback: RawCallback, args: &[CString]) -> Result<i32>;
}

/// Fail unless the process has a 32-bit address space.
pub fn ensure_supported_process() -> Result<()> {
    if cfg!(target_pointer_width = "32") {
        Ok(())
    } else {
        Err(UnarcError::UnsupportedPlatform)
    }
}

/// The engine loaded from a shared library at run time.
pub struct NativeEngine {
    entry: ExtractFn,
    _library: Library,
}

impl NativeEngine {
    /// Load the engine library and resolve its entry point.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedPlatform` in a 64-bit process, before touching
    /// the library.
    pub fn load(path: impl AsRef<OsStr>) -> Result<Self> {
        ensure_supported_process()?;

        let path = path.as_ref();
        let library = unsafe { Library::new(path) }.map_err(|source| UnarcError::LibraryLoad {
            path: path.to_string_lossy().into_owned(),
            source,
        })?;

        let entry: ExtractFn = {
            let symbol = unsafe { library.get::<ExtractFn>(ENTRY_POINT.as_bytes()) }.map_err(
                |source| UnarcError::SymbolNotFound {
                    symbol: ENTRY_POINT,
                    source,
                },
            )?;
            *symbol
        };

        debug!(path = %path.to_string_lossy(), "Loaded native engine");

        Ok(Self {
            entry,
            _library: library,
        })
    }
}

macro_rules! call_with_slots {
    ($entry:expr, $callback:expr, $slots:ident; $($i:literal)*) => {
        ($entry)($callback, $($slots[$i]),*)
    };
}

/// Lay `args` out in the fixed call slots; unused slots point at an empty
/// string.
fn fill_slots(args: &[CString]) -> Result<[*const c_char; MAX_ARGUMENTS]> {
    if args.len() > MAX_ARGUMENTS {
        return Err(UnarcError::TooManyArguments {
            count: args.len(),
            max: MAX_ARGUMENTS,
        });
    }

    let mut slots: [*const c_char; MAX_ARGUMENTS] = [c"".as_ptr(); MAX_ARGUMENTS];
    for (slot, arg) in slots.iter_mut().zip(args) {
        *slot = arg.as_ptr();
    }
    Ok(slots)
}

impl Engine for NativeEngine {
    fn extract(&self, callback: RawCallback, args: &[CString]) -> Result<i32> {
        let slots = fill_slots(args)?;

        // `args` outlives the call; the engine does not retain the pointers.
        let status = unsafe {
            call_with_slots!(
                self.entry, callback, slots;
                0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15
                16 17 18 19 20 21 22 23 24 25 26 27 28 29 30 31
            )
        };
        Ok(status)
    }
}

/// Pad `args` with empty strings up to `min` entries. Never truncates.
pub fn pad_arguments<T: Clone + Default>(mut args: Vec<T>, min: usize) -> Vec<T> {
    if args.len() < min {
        args.resize(min, T::default());
    }
    args
}

/// Render an argument vector for logs with the password flag masked.
pub fn redact_arguments(args: &[OsString]) -> String {
    let mut in_options = true;
    args.iter()
        .map(|arg| {
            let arg = arg.to_string_lossy();
            if arg == "--" {
                in_options = false;
            }
            if in_options && arg.starts_with(PASSWORD_FLAG) {
                format!("{PASSWORD_FLAG}***")
            } else {
                arg.into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Encode padded arguments into C strings in the engine's code page.
fn encode_arguments(args: &[OsString], codec: TextCodec) -> Result<Vec<CString>> {
    if args.len() > MAX_ARGUMENTS {
        return Err(UnarcError::TooManyArguments {
            count: args.len(),
            max: MAX_ARGUMENTS,
        });
    }

    args.iter()
        .map(|arg| {
            let bytes = codec.encode_os(arg).ok_or_else(|| {
                UnarcError::InvalidCommand(format!(
                    "argument cannot be represented in {}",
                    codec.name()
                ))
            })?;
            CString::new(bytes).map_err(|_| {
                UnarcError::InvalidCommand("argument contains a NUL byte".to_string())
            })
        })
        .collect()
}

/// Run `command` through `engine`, routing every callback to `dispatcher`.
///
/// Arguments are encoded and callback strings decoded with the
/// dispatcher's codec.
///
/// # Errors
///
/// Configuration errors surface before the engine is called, including an
/// argument vector longer than [`MAX_ARGUMENTS`]. If a subscriber or handler
/// panics, the rest of the call is aborted and `CallbackPanicked` is
/// returned instead of the exit code.
pub fn execute(engine: &dyn Engine, command: &Command, dispatcher: Dispatcher) -> Result<ExitCode> {
    let args = command.arguments()?;
    debug!(
        args = %redact_arguments(&args),
        encoding = dispatcher.codec().name(),
        "Executing command"
    );

    let args = encode_arguments(&pad_arguments(args, MIN_ARGUMENTS), dispatcher.codec())?;

    let mut session = Session::new(dispatcher);
    let status = {
        let _guard = SessionGuard::install(&mut session);
        engine.extract(trampoline, &args)
    };

    if let Some(message) = session.failure.take() {
        return Err(UnarcError::CallbackPanicked(message));
    }

    let exit_code = ExitCode::from_raw(status?)?;
    debug!(?exit_code, callbacks = session.callbacks, "Command finished");
    Ok(exit_code)
}

/// State of one native call.
struct Session {
    dispatcher: Dispatcher,
    failure: Option<String>,
    callbacks: u64,
}

impl Session {
    fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            failure: None,
            callbacks: 0,
        }
    }

    /// # Safety
    ///
    /// `what` must be null or a NUL-terminated string. For events other than
    /// `password?`, `text` must be null or NUL-terminated; for `password?` it
    /// must be null or point to at least `int1` writable bytes.
    unsafe fn handle(
        &mut self,
        what: *const c_char,
        int1: c_int,
        int2: c_int,
        text: *mut c_char,
    ) -> c_int {
        self.callbacks += 1;

        let codec = self.dispatcher.codec();
        let tag = codec.decode(unsafe { c_bytes(what) });
        let kind = EventKind::from_tag(&tag);

        if self.failure.is_some() {
            return aborted(kind);
        }

        // The password buffer is output-only and may hold no terminator yet.
        let body = if kind == EventKind::PasswordRequest {
            String::new()
        } else {
            codec.decode(unsafe { c_bytes(text) })
        };

        let raw = RawEvent::new(tag, int1, int2, body);
        let dispatcher = &self.dispatcher;
        match panic::catch_unwind(AssertUnwindSafe(|| dispatcher.dispatch(raw))) {
            Ok(Reply::Password {
                response,
                password: Some(password),
            }) => {
                if unsafe { write_password(text, int1, &password) } {
                    response.code()
                } else {
                    error!(buffer_size = int1, "Password could not be written, aborting");
                    PasswordResponse::Abort.code()
                }
            }
            Ok(reply) => reply.code(),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(%kind, %message, "Callback panicked, aborting native call");
                self.failure = Some(message);
                aborted(kind)
            }
        }
    }
}

thread_local! {
    static ACTIVE_SESSION: Cell<*mut Session> = const { Cell::new(ptr::null_mut()) };
}

/// Installs a session as the callback target and restores the previous one
/// on drop.
struct SessionGuard {
    previous: *mut Session,
}

impl SessionGuard {
    fn install(session: &mut Session) -> Self {
        let current: *mut Session = session;
        let previous = ACTIVE_SESSION.with(|slot| slot.replace(current));
        Self { previous }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        ACTIVE_SESSION.with(|slot| slot.set(self.previous));
    }
}

unsafe extern "C" fn trampoline(
    what: *const c_char,
    int1: c_int,
    int2: c_int,
    text: *mut c_char,
) -> c_int {
    let session = ACTIVE_SESSION.with(Cell::get);
    if session.is_null() {
        error!("Engine callback fired outside of a session");
        return ABORT_STATUS;
    }
    trace!(int1, int2, "trampoline");

    // The session outlives the engine call and is only reached from this
    // thread, one callback at a time.
    unsafe { (*session).handle(what, int1, int2, text) }
}

/// Status returned once a session has failed.
fn aborted(kind: EventKind) -> c_int {
    match kind {
        EventKind::OverwriteRequest => OverwriteResponse::Abort.code(),
        EventKind::PasswordRequest => PasswordResponse::Abort.code(),
        _ => ABORT_STATUS,
    }
}

/// Bytes of a NUL-terminated string, without the terminator.
unsafe fn c_bytes<'a>(ptr: *const c_char) -> &'a [u8] {
    if ptr.is_null() {
        return &[];
    }
    unsafe { CStr::from_ptr(ptr) }.to_bytes()
}

/// Copy an encoded password and its terminator into the engine's buffer.
///
/// Returns `false` without writing when the buffer is null or too small.
unsafe fn write_password(buffer: *mut c_char, size: c_int, bytes: &[u8]) -> bool {
    let Ok(size) = usize::try_from(size) else {
        return false;
    };
    if buffer.is_null() || bytes.len() >= size {
        return false;
    }
    unsafe {
        ptr::copy_nonoverlapping(bytes.as_ptr().cast::<c_char>(), buffer, bytes.len());
        *buffer.add(bytes.len()) = 0;
    }
    true
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_short_argument_list() {
        for k in 0..MIN_ARGUMENTS {
            let args: Vec<String> = (0..k).map(|i| format!("a{i}")).collect();
            let padded = pad_arguments(args.clone(), MIN_ARGUMENTS);
            assert_eq!(padded.len(), MIN_ARGUMENTS);
            assert_eq!(&padded[..k], &args[..]);
            assert!(padded[k..].iter().all(String::is_empty));
        }
    }

    #[test]
    fn test_pad_never_truncates() {
        for k in [MIN_ARGUMENTS, MIN_ARGUMENTS + 1, 25] {
            let args: Vec<String> = (0..k).map(|i| format!("a{i}")).collect();
            assert_eq!(pad_arguments(args.clone(), MIN_ARGUMENTS), args);
        }
    }

    #[test]
    fn test_redact_only_masks_option_password() {
        let args: Vec<OsString> = ["x", "-psecret", "-dpout", "--", "-pfile.arc", "-pname"]
            .iter()
            .map(OsString::from)
            .collect();
        assert_eq!(
            redact_arguments(&args),
            "x -p*** -dpout -- -pfile.arc -pname"
        );
    }

    #[test]
    fn test_write_password_respects_buffer() {
        let mut buffer = [0x7f as c_char; 8];
        let ok = unsafe { write_password(buffer.as_mut_ptr(), 4, b"abc") };
        assert!(ok);
        assert_eq!(&buffer[..4], &[b'a' as c_char, b'b' as c_char, b'c' as c_char, 0]);
        assert_eq!(buffer[4], 0x7f);

        let ok = unsafe { write_password(buffer.as_mut_ptr(), 4, b"abcd") };
        assert!(!ok);
        assert!(!unsafe { write_password(ptr::null_mut(), 4, b"a") });
        assert!(!unsafe { write_password(buffer.as_mut_ptr(), -1, b"a") });
    }

    #[test]
    fn test_encode_arguments_enforces_ceiling() {
        let codec = TextCodec::utf8();
        let full: Vec<OsString> = (0..MAX_ARGUMENTS)
            .map(|i| OsString::from(format!("a{i}")))
            .collect();
        assert_eq!(encode_arguments(&full, codec).unwrap().len(), MAX_ARGUMENTS);

        let over: Vec<OsString> = (0..=MAX_ARGUMENTS)
            .map(|i| OsString::from(format!("a{i}")))
            .collect();
        assert!(matches!(
            encode_arguments(&over, codec),
            Err(UnarcError::TooManyArguments { count, max })
                if count == MAX_ARGUMENTS + 1 && max == MAX_ARGUMENTS
        ));
    }

    #[test]
    fn test_encode_arguments_uses_code_page() {
        let codec = TextCodec::for_code_page(1251).unwrap();
        let args = vec![OsString::from("l"), OsString::from("Привет.arc")];
        let encoded = encode_arguments(&args, codec).unwrap();
        assert_eq!(encoded[1].as_bytes(), b"\xcf\xf0\xe8\xe2\xe5\xf2.arc");

        let codec = TextCodec::for_code_page(1252).unwrap();
        assert!(matches!(
            encode_arguments(&args, codec),
            Err(UnarcError::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_fill_slots_pads_with_empty_strings() {
        let args: Vec<CString> = ["l", "--", "a.arc"]
            .iter()
            .map(|a| CString::new(*a).unwrap())
            .collect();
        let slots = fill_slots(&args).unwrap();

        for (slot, arg) in slots.iter().zip(&args) {
            assert!(ptr::eq(*slot, arg.as_ptr()));
        }
        for slot in &slots[args.len()..] {
            assert_eq!(unsafe { CStr::from_ptr(*slot) }.to_bytes(), b"");
        }

        let over = vec![CString::new("a").unwrap(); MAX_ARGUMENTS + 1];
        assert!(matches!(
            fill_slots(&over),
            Err(UnarcError::TooManyArguments { .. })
        ));
    }

    #[test]
    fn test_trampoline_outside_session_aborts() {
        let status = unsafe { trampoline(c"read".as_ptr(), 0, 1, ptr::null_mut()) };
        assert_eq!(status, ABORT_STATUS);
    }

    #[test]
    fn test_session_guard_restores_previous() {
        let mut outer = Session::new(Dispatcher::default());
        let mut inner = Session::new(Dispatcher::default());
        let outer_ptr: *mut Session = &mut outer;

        {
            let _outer_guard = SessionGuard::install(&mut outer);
            {
                let _inner_guard = SessionGuard::install(&mut inner);
                assert!(!ptr::eq(ACTIVE_SESSION.with(Cell::get), outer_ptr));
            }
            assert!(ptr::eq(ACTIVE_SESSION.with(Cell::get), outer_ptr));
        }
        assert!(ACTIVE_SESSION.with(Cell::get).is_null());
    }

    #[test]
    fn test_panic_message_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }

    #[test]
    fn test_aborted_codes() {
        assert_eq!(aborted(EventKind::OverwriteRequest), 'q' as i32);
        assert_eq!(aborted(EventKind::PasswordRequest), 'q' as i32);
        assert_eq!(aborted(EventKind::BytesRead), ABORT_STATUS);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_load_refuses_64bit_process() {
        assert!(matches!(
            NativeEngine::load("unarc.dll"),
            Err(UnarcError::UnsupportedPlatform)
        ));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_ensure_supported_process_on_64bit() {
        assert!(matches!(
            ensure_supported_process(),
            Err(UnarcError::UnsupportedPlatform)
        ));
    }
}
