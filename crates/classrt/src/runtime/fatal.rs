//! Fatal runtime errors.
//!
//! Dispatching a slot no class bound, initializing a class whose ancestry
//! never reaches the root, and giving a subclass state that leaves out its
//! superclass's are programming errors. They are logged and then
//! end the process or the thread, depending on
//! [`Config::fatal_action`](crate::config::Config).

use std::fmt;

use classrt_log::error;

use crate::config::{FatalAction, config};
use crate::error::Error;
use crate::report::ErrorCode;
use crate::runtime::{Class, MAX_CLASS_DEPTH};

/// Reports a call through a missing or unimplemented slot.
pub(crate) fn unimplemented(class: &'static Class, slot: &'static str, err: &Error) -> ! {
    fail(format_args!(
        "{} contains unimplemented functions.. is it an abstract class? ({err}, slot '{slot}')",
        class.name()
    ))
}

/// Reports a superclass chain that cycles or exceeds [`MAX_CLASS_DEPTH`].
pub(crate) fn malformed_hierarchy(class: &Class) -> ! {
    fail(format_args!(
        "class {} does not reach the root class within {MAX_CLASS_DEPTH} ancestors",
        class.name()
    ))
}

/// Reports a class whose state does not embed its superclass's state.
pub(crate) fn incompatible_state(class: &Class) -> ! {
    let superclass = class.declared_superclass();
    fail(format_args!(
        "class {} state {} does not embed state {} of superclass {}",
        class.name(),
        class.layout().type_name(),
        superclass.layout().type_name(),
        superclass.name()
    ))
}

fn fail(message: fmt::Arguments<'_>) -> ! {
    error!(target: "classrt::fatal", code = %ErrorCode::ProgrammingError, "{message}");
    match config().fatal_action {
        FatalAction::Panic => panic!("{message}"),
        FatalAction::Abort => {
            eprintln!("{message}");
            std::process::abort()
        }
    }
}
