//! `classrt`: a single-inheritance class runtime for Rust
//!
//! `classrt` gives plain Rust code a class system in the style of C object
//! frameworks:
//!
//! - **Class descriptors** declared as `static`s and initialized lazily,
//!   exactly once
//! - **Virtual methods** through typed slots and per-class method tables
//! - **Constructors and destructors** as ordinary slots
//! - **Hierarchical ownership** through the `classrt-mem` arena: freeing an
//!   owner destroys everything it owns
//! - **Introspection** of instances, subclasses and registered classes
//! - **A thread-local error channel** that accumulates context while the
//!   first error code is kept
//!
//! # Example
//!
//! ```rust
//! use classrt::prelude::*;
//! use std::f64::consts::PI;
//!
//! #[derive(Clone, Default)]
//! struct CircleState {
//!     radius: f64,
//! }
//!
//! static AREA: Slot<fn(&Object) -> f64> = Slot::new("area");
//! static CIRCLE_CON: Slot<Constructor<f64>> = Slot::with_flags("Con", SlotFlags::CONSTRUCTOR);
//!
//! fn shape_virtuals(v: &mut VTableBuilder<'_>) {
//!     v.declare(&AREA);
//! }
//!
//! fn circle_con(this: &mut Object, radius: f64) -> classrt::Result<()> {
//!     this.state_mut::<CircleState>()?.radius = radius;
//!     Ok(())
//! }
//!
//! fn circle_area(this: &Object) -> f64 {
//!     this.state::<CircleState>().map_or(0.0, |s| PI * s.radius * s.radius)
//! }
//!
//! fn circle_virtuals(v: &mut VTableBuilder<'_>) {
//!     v.set(&CIRCLE_CON, circle_con).set(&AREA, circle_area);
//! }
//!
//! classrt::class! {
//!     /// Anything with an area.
//!     pub static SHAPE: Shape(OBJECT) {
//!         layout: StateLayout::empty(),
//!         flags: ClassFlags::ABSTRACT,
//!         virtuals: shape_virtuals,
//!     }
//! }
//!
//! classrt::class! {
//!     pub static CIRCLE: Circle(SHAPE) {
//!         layout: StateLayout::of::<CircleState>(),
//!         virtuals: circle_virtuals,
//!     }
//! }
//!
//! let mut arena = Arena::new();
//! let circle = construct(&mut arena, &CIRCLE, &CIRCLE_CON, None, 2.0)?;
//! let object = arena.object(circle)?;
//!
//! assert!((AREA.of(object)(object) - 12.566).abs() < 1e-3);
//! assert!(is_subclass(object, &SHAPE));
//! assert!(!is_instance(object, &SHAPE));
//! # Ok::<(), classrt::Error>(())
//! ```

pub mod config;
pub mod error;
pub mod report;
pub mod runtime;

pub use classrt_mem::{Arena, Context};
pub use error::{Error, Result};
pub use report::ErrorCode;
pub use runtime::{
    Class, ClassFlags, Constructor, Destructor, Object, ObjectArena, ObjectRef, OBJECT, Slot,
    SlotFlags, StateLayout,
};

/// Common imports for defining classes and calling through them.
pub mod prelude {
    pub use crate::report::ErrorCode;
    pub use crate::runtime::{
        Class, ClassFlags, Constructor, DESTRUCTOR, Destructor, Inherits, OBJECT, Object,
        ObjectArena, ObjectRef, Slot, SlotFlags, State, StateLayout, VTableBuilder,
        alloc_object, construct, construct_in_place, is_instance, is_subclass,
    };
    pub use classrt_mem::{Arena, Context};
}

/// Declares a class as a `static`.
///
/// The class is named after the identifier in front of the parentheses and
/// derives from the class inside them. Doc comments become the class's
/// documentation string. `flags` and `virtuals` are optional.
///
/// ```
/// use classrt::prelude::*;
///
/// classrt::class! {
///     /// A thing.
///     pub static THING: Thing(OBJECT) {
///         layout: StateLayout::empty(),
///         flags: ClassFlags::PRIVATE,
///     }
/// }
///
/// assert_eq!(THING.name(), "Thing");
/// assert_eq!(THING.doc().trim(), "A thing.");
/// assert!(THING.flags().contains(ClassFlags::PRIVATE));
/// ```
#[macro_export]
macro_rules! class {
    (@flags) => {
        $crate::runtime::ClassFlags::empty()
    };
    (@flags $flags:expr) => {
        $flags
    };
    (@virtuals) => {
        None
    };
    (@virtuals $virtuals:expr) => {
        Some($virtuals)
    };
    (
        $(#[doc = $doc:literal])*
        $vis:vis static $ident:ident : $name:ident ( $superclass:expr ) {
            layout: $layout:expr,
            $(flags: $flags:expr,)?
            $(virtuals: $virtuals:expr,)?
        }
    ) => {
        $(#[doc = $doc])*
        $vis static $ident: $crate::runtime::Class = $crate::runtime::Class::new(
            stringify!($name),
            concat!("" $(, $doc, "\n")*),
            &$superclass,
            $crate::class!(@flags $($flags)?),
            $layout,
            $crate::class!(@virtuals $($virtuals)?),
        );
    };
}
