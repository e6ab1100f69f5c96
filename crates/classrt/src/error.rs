//! Error types for the `classrt` runtime.
//!
//! Rust callers get a typed [`Error`] from every fallible operation. Errors
//! raised through the thread-local channel in [`crate::report`] come back as
//! [`Error::Raised`], carrying the code and the message of that single raise
//! while the accumulated text stays in the channel.

use crate::report::ErrorCode;
use crate::runtime::ObjectRef;
use thiserror::Error;

/// Errors produced by the runtime.
#[derive(Debug, Error)]
pub enum Error {
    /// The ownership arena rejected an operation.
    #[error(transparent)]
    Arena(#[from] classrt_mem::Error),

    /// A handle names a live block that does not hold an object.
    #[error("block {0} does not hold an object")]
    NotAnObject(ObjectRef),

    /// The class has no entry for the slot.
    #[error("class {class} has no slot '{slot}'")]
    SlotNotFound {
        /// Class searched.
        class: &'static str,
        /// Slot name.
        slot: &'static str,
    },

    /// The slot is declared but no class in the chain bound it.
    #[error("slot '{slot}' of class {class} is unimplemented")]
    Unimplemented {
        /// Class searched.
        class: &'static str,
        /// Slot name.
        slot: &'static str,
    },

    /// The bound method does not have the slot's signature.
    #[error("slot '{slot}' holds a method of another signature (expected {expected})")]
    SlotTypeMismatch {
        /// Slot name.
        slot: &'static str,
        /// Signature the slot was declared with.
        expected: &'static str,
    },

    /// The object's state does not contain the requested type.
    #[error("object of class {class} has no state of type {expected}")]
    StateMismatch {
        /// Class of the object.
        class: &'static str,
        /// Requested state type.
        expected: &'static str,
    },

    /// A constructor failed. The instance is still allocated under its
    /// owner and is released with it.
    #[error("constructor of {class} failed for {object}: {source}")]
    Construction {
        /// Class being constructed.
        class: &'static str,
        /// Handle of the partially constructed instance.
        object: ObjectRef,
        /// Error returned by the constructor.
        #[source]
        source: Box<Error>,
    },

    /// Extension data was already attached to the class.
    #[error("extension data of class {class} is already set")]
    ExtensionAlreadySet {
        /// Class name.
        class: &'static str,
    },

    /// [`crate::config::configure`] was called after the configuration was
    /// already fixed.
    #[error("runtime configuration is already installed")]
    AlreadyConfigured,

    /// Integer outside the error code table.
    #[error("invalid error code {0}")]
    InvalidErrorCode(i32),

    /// Error raised through the thread-local channel.
    #[error("{code}: {message}")]
    Raised {
        /// Code the raise was made with.
        code: ErrorCode,
        /// Formatted message of this raise, location prefix included.
        message: String,
    },
}

impl Error {
    /// Channel code describing this error.
    ///
    /// Raised errors keep the code they were raised with; a failed
    /// constructor reports the code of its cause.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Raised { code, .. } => *code,
            Error::Construction { source, .. } => source.code(),
            Error::Arena(classrt_mem::Error::CapacityExhausted) => ErrorCode::NoMemory,
            Error::Arena(
                classrt_mem::Error::StaleContext { .. }
                | classrt_mem::Error::WouldCycle
                | classrt_mem::Error::TypeMismatch { .. },
            )
            | Error::NotAnObject(_)
            | Error::StateMismatch { .. }
            | Error::SlotTypeMismatch { .. }
            | Error::InvalidErrorCode(_) => ErrorCode::InvalidParameter,
            Error::SlotNotFound { .. } => ErrorCode::KeyError,
            Error::Unimplemented { .. } => ErrorCode::ProgrammingError,
            Error::ExtensionAlreadySet { .. } | Error::AlreadyConfigured => {
                ErrorCode::RuntimeError
            }
        }
    }
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;
