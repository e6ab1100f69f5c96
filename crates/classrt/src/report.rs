//! Thread-local error channel.
//!
//! Each thread owns one pending error: an [`ErrorCode`] and a bounded text
//! buffer. The first error raised on a clean thread fixes the code; later
//! raises append their message on a new line and leave the code alone, so
//! the root cause stays visible while context accumulates on the way up.
//!
//! Raising never fails and never touches another thread's state. The buffer
//! is created lazily on first use and is capped at
//! [`Config::error_buffer_capacity`](crate::config::Config) bytes.
//!
//! # Example
//!
//! ```
//! use classrt::raise_error;
//! use classrt::report::{self, ErrorCode};
//!
//! fn open(path: &str) -> classrt::Result<()> {
//!     Err(raise_error!(ErrorCode::IoError, "cannot open {path}"))
//! }
//!
//! assert!(open("missing.img").is_err());
//! assert_eq!(report::error_code(), ErrorCode::IoError);
//! assert!(report::current_error().1.ends_with("cannot open missing.img"));
//! report::clear_error();
//! ```

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;

use classrt_log::{error, trace, warn};

use crate::config::config;
use crate::error::Error;

/// Default capacity of a thread's error buffer, in bytes.
pub const DEFAULT_ERROR_BUFFER_SIZE: usize = 10240;

/// Error codes carried by the channel. The numeric values are stable.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ErrorCode {
    /// No pending error.
    #[default]
    Zero = 0,
    /// Unclassified failure.
    Generic = 1,
    /// Value or buffer overflow.
    Overflow = 2,
    /// Non-fatal condition worth reporting.
    Warning = 3,
    /// Ran out of input.
    Underflow = 4,
    /// I/O failure.
    IoError = 5,
    /// Allocation failure.
    NoMemory = 6,
    /// Caller passed an invalid argument.
    InvalidParameter = 7,
    /// Failure detected at run time.
    RuntimeError = 8,
    /// Lookup of a missing key.
    KeyError = 9,
    /// Misuse of an API.
    ProgrammingError = 10,
}

impl ErrorCode {
    /// Every code, in numeric order.
    pub const ALL: [ErrorCode; 11] = [
        ErrorCode::Zero,
        ErrorCode::Generic,
        ErrorCode::Overflow,
        ErrorCode::Warning,
        ErrorCode::Underflow,
        ErrorCode::IoError,
        ErrorCode::NoMemory,
        ErrorCode::InvalidParameter,
        ErrorCode::RuntimeError,
        ErrorCode::KeyError,
        ErrorCode::ProgrammingError,
    ];

    /// Numeric value of the code.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Name of the code as printed in reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ErrorCode::Zero => "Zero",
            ErrorCode::Generic => "Generic",
            ErrorCode::Overflow => "Overflow",
            ErrorCode::Warning => "Warning",
            ErrorCode::Underflow => "Underflow",
            ErrorCode::IoError => "IOError",
            ErrorCode::NoMemory => "NoMemory",
            ErrorCode::InvalidParameter => "InvalidParameter",
            ErrorCode::RuntimeError => "RuntimeError",
            ErrorCode::KeyError => "KeyError",
            ErrorCode::ProgrammingError => "ProgrammingError",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<i32> for ErrorCode {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
            .ok_or(Error::InvalidErrorCode(value))
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code.as_i32()
    }
}

#[derive(Debug, Default)]
struct ErrorState {
    code: ErrorCode,
    buffer: String,
}

thread_local! {
    static ERROR_STATE: RefCell<ErrorState> = RefCell::new(ErrorState::default());
}

/// Appends as much of `text` as fits in `capacity` bytes, cutting on a
/// character boundary.
fn push_bounded(buffer: &mut String, text: &str, capacity: usize) {
    let room = capacity.saturating_sub(buffer.len());
    if text.len() <= room {
        buffer.push_str(text);
        return;
    }
    let mut end = room;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    buffer.push_str(&text[..end]);
}

/// Records an error on the calling thread and returns it as an [`Error`].
///
/// On a clean thread the buffer is reset and `code` becomes the pending
/// code. Otherwise the message is appended after a newline and the pending
/// code is kept. Prefer the [`raise_error!`](crate::raise_error) macro,
/// which prefixes the source location.
pub fn raise_errors(code: ErrorCode, args: fmt::Arguments<'_>) -> Error {
    let message = fmt::format(args);
    let capacity = config().error_buffer_capacity;

    ERROR_STATE.with_borrow_mut(|state| {
        if state.code == ErrorCode::Zero {
            state.buffer.clear();
            state.code = code;
        } else {
            push_bounded(&mut state.buffer, "\n", capacity);
        }
        push_bounded(&mut state.buffer, &message, capacity);
    });

    trace!(%code, message = %message, "raised");
    Error::Raised { code, message }
}

/// Returns the pending code and a copy of the buffer.
#[must_use]
pub fn current_error() -> (ErrorCode, String) {
    ERROR_STATE.with_borrow(|state| (state.code, state.buffer.clone()))
}

/// Runs `f` on the pending code and buffer without copying the buffer.
pub fn with_current_error<R>(f: impl FnOnce(ErrorCode, &str) -> R) -> R {
    ERROR_STATE.with_borrow(|state| f(state.code, &state.buffer))
}

/// Returns the pending code.
#[must_use]
pub fn error_code() -> ErrorCode {
    ERROR_STATE.with_borrow(|state| state.code)
}

/// Returns `true` if the pending code is `code`.
#[must_use]
pub fn check_error(code: ErrorCode) -> bool {
    error_code() == code
}

/// Resets the pending code to [`ErrorCode::Zero`]. The buffer is reset on
/// the next raise.
pub fn clear_error() {
    ERROR_STATE.with_borrow_mut(|state| state.code = ErrorCode::Zero);
}

/// Logs the pending error and clears it.
///
/// Warnings are logged at warn level, everything else at error level.
/// Returns the logged text, or `None` if nothing was pending.
pub fn print_error() -> Option<String> {
    let (code, message) = ERROR_STATE.with_borrow(|state| {
        (state.code != ErrorCode::Zero).then(|| (state.code, state.buffer.clone()))
    })?;

    if code == ErrorCode::Warning {
        warn!(%code, "{message}");
    } else {
        error!(%code, "{message}");
    }
    clear_error();
    Some(message)
}

/// Saves the pending code and restores it when dropped.
///
/// Used around code that may raise and clear errors of its own while an
/// outer error is pending. Only the code is restored; the buffer keeps
/// whatever was appended meanwhile.
///
/// The guard belongs to the thread that created it.
#[derive(Debug)]
#[must_use = "the saved code is restored when the guard is dropped"]
pub struct ErrorStateGuard {
    saved: ErrorCode,
    _thread_bound: PhantomData<*const ()>,
}

impl ErrorStateGuard {
    /// Saves the calling thread's pending code.
    pub fn save() -> Self {
        Self {
            saved: error_code(),
            _thread_bound: PhantomData,
        }
    }

    /// Code that will be restored.
    #[must_use]
    pub fn saved(&self) -> ErrorCode {
        self.saved
    }
}

impl Drop for ErrorStateGuard {
    fn drop(&mut self) {
        let saved = self.saved;
        let _ = ERROR_STATE.try_with(|cell| cell.borrow_mut().code = saved);
    }
}

/// Raises an error on the calling thread and evaluates to the [`Error`].
///
/// The message is prefixed with the module path, file and line of the call.
///
/// ```
/// use classrt::raise_error;
/// use classrt::report::{self, ErrorCode};
///
/// let err = raise_error!(ErrorCode::KeyError, "no entry named {}", "size");
/// assert_eq!(err.code(), ErrorCode::KeyError);
/// report::clear_error();
/// ```
#[macro_export]
macro_rules! raise_error {
    ($code:expr, $($arg:tt)+) => {
        $crate::report::raise_errors(
            $code,
            format_args!(
                "{}: ({}:{}) {}",
                module_path!(),
                file!(),
                line!(),
                format_args!($($arg)+)
            ),
        )
    };
}

/// Raises a warning and logs the pending error immediately.
#[macro_export]
macro_rules! log_warnings {
    ($($arg:tt)+) => {{
        let _ = $crate::raise_error!($crate::report::ErrorCode::Warning, $($arg)+);
        $crate::report::print_error()
    }};
}
