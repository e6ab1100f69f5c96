//! Objects and the constructor protocol.
//!
//! An [`Object`] pairs a class with an instance of the class's state. Objects
//! live in a [`classrt_mem::Arena`]: [`alloc_object`] places one under an
//! owner and registers a teardown hook that dispatches the class's
//! [`DESTRUCTOR`] slot, so freeing the owner destroys the object.
//!
//! [`construct`] allocates an object and runs a constructor slot on it in
//! one step. Constructors are ordinary slots typed [`Constructor<A>`]; a class
//! may declare several, and a subclass constructor delegates to its
//! superclass's by resolving the slot in that class.
//!
//! # Example
//!
//! ```
//! use classrt::prelude::*;
//!
//! #[derive(Clone, Default)]
//! struct CounterState {
//!     count: u32,
//! }
//!
//! static COUNTER_CON: Slot<Constructor<u32>> = Slot::with_flags("Con", SlotFlags::CONSTRUCTOR);
//!
//! fn counter_con(this: &mut Object, start: u32) -> classrt::Result<()> {
//!     this.state_mut::<CounterState>()?.count = start;
//!     Ok(())
//! }
//!
//! fn counter_virtuals(v: &mut VTableBuilder<'_>) {
//!     v.set(&COUNTER_CON, counter_con);
//! }
//!
//! classrt::class! {
//!     static COUNTER: Counter(OBJECT) {
//!         layout: StateLayout::of::<CounterState>(),
//!         virtuals: counter_virtuals,
//!     }
//! }
//!
//! let mut arena = Arena::new();
//! let counter = construct(&mut arena, &COUNTER, &COUNTER_CON, None, 5)?;
//! assert_eq!(arena.object(counter)?.state::<CounterState>()?.count, 5);
//! # Ok::<(), classrt::Error>(())
//! ```

use std::any::{Any, type_name};
use std::fmt;

use classrt_log::{debug, trace};
use classrt_mem::{Arena, Context};

use crate::error::{Error, Result};
use crate::runtime::{Class, Slot, SlotFlags, State};

/// Handle to an arena-owned object.
pub type ObjectRef = Context;

/// Constructor slot signature. `A` carries the constructor's arguments.
pub type Constructor<A> = fn(&mut Object, A) -> Result<()>;

/// Destructor slot signature.
pub type Destructor = fn(&mut Object);

/// Runs when an object is released. [`OBJECT`](crate::runtime::OBJECT)
/// binds a no-op.
pub static DESTRUCTOR: Slot<Destructor> = Slot::with_flags("destructor", SlotFlags::DESTRUCTOR);

/// An instance of a class.
pub struct Object {
    class: &'static Class,
    superclass: &'static Class,
    name: &'static str,
    handle: Option<ObjectRef>,
    state: Box<dyn State>,
}

impl Object {
    /// Creates a detached instance with its class's default state,
    /// initializing the class if needed.
    #[must_use]
    pub fn instantiate(class: &'static Class) -> Self {
        let data = class.initialize();
        Self {
            class,
            superclass: data.superclass(),
            name: data.name(),
            handle: None,
            state: data.new_state(),
        }
    }

    /// Class of the object.
    #[must_use]
    pub fn class(&self) -> &'static Class {
        self.class
    }

    /// Superclass of the object's class.
    #[must_use]
    pub fn superclass(&self) -> &'static Class {
        self.superclass
    }

    /// Name of the object's class.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Arena handle, if the object was allocated in an arena.
    #[must_use]
    pub fn handle(&self) -> Option<ObjectRef> {
        self.handle
    }

    /// Borrows the state of type `S`, looking through embedded ancestor
    /// states.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StateMismatch`] if no level of the state is an `S`.
    pub fn state<S: State>(&self) -> Result<&S> {
        let mut class = self.class;
        let mut current: &dyn Any = self.state.as_ref().as_any();
        loop {
            if let Some(found) = current.downcast_ref::<S>() {
                return Ok(found);
            }
            if let Some(base) = class.layout().project(current) {
                current = base;
            } else if class.layout().embeds_base() {
                break;
            }
            if class.is_root() {
                break;
            }
            class = class.declared_superclass();
        }
        Err(self.state_mismatch::<S>())
    }

    /// Mutably borrows the state of type `S`, looking through embedded
    /// ancestor states.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StateMismatch`] if no level of the state is an `S`.
    pub fn state_mut<S: State>(&mut self) -> Result<&mut S> {
        let mismatch = self.state_mismatch::<S>();
        let mut class = self.class;
        let mut current: &mut dyn Any = self.state.as_mut().as_any_mut();
        loop {
            if current.is::<S>() {
                return current.downcast_mut::<S>().ok_or(mismatch);
            }
            let layout = class.layout();
            if layout.embeds_base() {
                match layout.project_mut(current) {
                    Some(base) => current = base,
                    None => break,
                }
            }
            if class.is_root() {
                break;
            }
            class = class.declared_superclass();
        }
        Err(mismatch)
    }

    /// Dispatches the destructor slot.
    pub fn destroy(&mut self) {
        match DESTRUCTOR.try_of(self) {
            Ok(destructor) => destructor(self),
            Err(err) => debug!(class = self.name, %err, "no destructor"),
        }
    }

    fn state_mismatch<S: State>(&self) -> Error {
        Error::StateMismatch {
            class: self.name,
            expected: type_name::<S>(),
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.name)
            .field("superclass", &self.superclass.name())
            .field("handle", &self.handle)
            .field("state", &self.class.layout().type_name())
            .finish()
    }
}

/// Object access on an [`Arena`].
pub trait ObjectArena {
    /// Borrows the object behind `object`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAnObject`] if the block holds another type, or an
    /// arena error for a stale handle.
    fn object(&self, object: ObjectRef) -> Result<&Object>;

    /// Mutably borrows the object behind `object`.
    ///
    /// The borrow can replace the whole object. A block whose object was
    /// replaced (by assignment or swap) no longer answers to its handle and
    /// reports [`Error::NotAnObject`] from then on, so a handle never changes
    /// class.
    ///
    /// # Errors
    ///
    /// As [`ObjectArena::object`].
    fn object_mut(&mut self, object: ObjectRef) -> Result<&mut Object>;
}

impl ObjectArena for Arena {
    fn object(&self, object: ObjectRef) -> Result<&Object> {
        let found = self
            .get::<Object>(object)
            .map_err(|err| not_an_object(err, object))?;
        if found.handle != Some(object) {
            return Err(Error::NotAnObject(object));
        }
        Ok(found)
    }

    fn object_mut(&mut self, object: ObjectRef) -> Result<&mut Object> {
        let found = self
            .get_mut::<Object>(object)
            .map_err(|err| not_an_object(err, object))?;
        if found.handle != Some(object) {
            return Err(Error::NotAnObject(object));
        }
        Ok(found)
    }
}

fn not_an_object(err: classrt_mem::Error, object: ObjectRef) -> Error {
    match err {
        classrt_mem::Error::TypeMismatch { .. } => Error::NotAnObject(object),
        other => other.into(),
    }
}

/// Allocates an instance of `class` under `owner` without running a
/// constructor.
///
/// The block is named after the class and released with its owner; its
/// destructor slot runs first.
///
/// # Errors
///
/// Returns an arena error if `owner` is stale.
pub fn alloc_object(
    arena: &mut Arena,
    class: &'static Class,
    owner: Option<Context>,
) -> Result<ObjectRef> {
    let handle = arena.alloc(owner, Object::instantiate(class))?;
    arena.get_mut::<Object>(handle)?.handle = Some(handle);
    arena.set_name(handle, class.name())?;
    arena.set_teardown(handle, |value| {
        if let Some(object) = value.downcast_mut::<Object>() {
            object.destroy();
        }
    })?;
    trace!(class = class.name(), object = %handle, "allocated object");
    Ok(handle)
}

/// Allocates an instance of `class` under `owner` and runs `constructor`
/// on it.
///
/// The constructor is resolved before anything is allocated, so a class
/// lacking it leaves the arena untouched.
///
/// # Errors
///
/// - [`Error::SlotNotFound`] or [`Error::Unimplemented`] if the class has no
///   such constructor.
/// - [`Error::Construction`] if the constructor fails. The instance stays
///   allocated under `owner` and its handle is in the error.
pub fn construct<A: 'static>(
    arena: &mut Arena,
    class: &'static Class,
    constructor: &'static Slot<Constructor<A>>,
    owner: Option<Context>,
    args: A,
) -> Result<ObjectRef> {
    let method = constructor.resolve_in(class)?;
    let handle = alloc_object(arena, class, owner)?;
    run_constructor(arena, handle, method, args)?;
    Ok(handle)
}

/// Runs `constructor` on an already allocated object, resolving it in the
/// object's class.
///
/// # Errors
///
/// As [`construct`].
pub fn construct_in_place<A: 'static>(
    arena: &mut Arena,
    object: ObjectRef,
    constructor: &'static Slot<Constructor<A>>,
    args: A,
) -> Result<()> {
    let class = arena.object(object)?.class();
    let method = constructor.resolve_in(class)?;
    run_constructor(arena, object, method, args)
}

fn run_constructor<A>(
    arena: &mut Arena,
    handle: ObjectRef,
    method: Constructor<A>,
    args: A,
) -> Result<()> {
    let object = arena.object_mut(handle)?;
    let class = object.name();
    method(object, args).map_err(|source| {
        debug!(class, object = %handle, %source, "constructor failed");
        Error::Construction {
            class,
            object: handle,
            source: Box::new(source),
        }
    })
}
