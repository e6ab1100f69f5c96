//! Class descriptors and the initialization protocol.
//!
//! A [`Class`] is a `static` value built in const context: name, doc string,
//! superclass, flags, state layout and a definition step that fills in the
//! method table. Nothing runs until the class is first initialized, which
//! happens on first use (allocation, dispatch, [`Class::initialize`]).
//!
//! # Architecture
//!
//! Initializing a class:
//!
//! 1. Checks that its ancestry reaches [`OBJECT`] within
//!    [`MAX_CLASS_DEPTH`] steps, and that its state holds its superclass's
//!    state (see [`StateLayout::contains`]). A cycle, an over-deep chain or a
//!    state that drops the superclass's is fatal.
//! 2. Initializes the superclass (recursively).
//! 3. Copies the superclass's [`VTable`], so inherited methods stay in place.
//! 4. Runs the class's definition step, which declares new slots and binds
//!    overrides.
//! 5. Records the instance size and a prototype state, registers the class
//!    name, and publishes the result as [`ClassData`].
//!
//! Every step happens exactly once, however many threads race to use the
//! class first. A class is never published half-initialized.
//!
//! # Root Class
//!
//! [`OBJECT`] is its own superclass. Walks up the chain stop there.
//!
//! # Thread Safety
//!
//! `Class` is `Sync`. Initialization is guarded by a `OnceLock`; a definition
//! step must not dispatch on its own class, which would wait on itself.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem::size_of;
use std::ptr;
use std::sync::OnceLock;

use bitflags::bitflags;
use classrt_log::debug;

use crate::error::{Error, Result};
use crate::runtime::introspection::register_class;
use crate::runtime::object::{DESTRUCTOR, Destructor};
use crate::runtime::{Object, State, StateLayout, VTable, VTableBuilder, fatal};

/// Longest superclass chain accepted, root included.
pub const MAX_CLASS_DEPTH: usize = 256;

bitflags! {
    /// Annotations on a class, read by binding generators and introspection.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClassFlags: u8 {
        /// Leaves slots unimplemented for subclasses to bind.
        const ABSTRACT = 1 << 0;
        /// Not exported to bindings.
        const PRIVATE = 1 << 1;
        /// Bound to a foreign type.
        const BOUND = 1 << 2;
        /// Implemented on the other side of a binding.
        const PROXY = 1 << 3;
    }
}

/// Definition step of a class.
pub type Virtuals = fn(&mut VTableBuilder<'_>);

/// A class descriptor.
///
/// Declared as a `static`, either with [`Class::new`] or the
/// [`class!`](crate::class) macro.
///
/// # Example
///
/// ```
/// use classrt::prelude::*;
///
/// static NAME: Slot<fn(&Object) -> &'static str> = Slot::new("name");
///
/// fn animal_virtuals(v: &mut VTableBuilder<'_>) {
///     v.set(&NAME, |_| "animal");
/// }
///
/// static ANIMAL: Class = Class::new(
///     "Animal",
///     "Something alive.",
///     &OBJECT,
///     ClassFlags::empty(),
///     StateLayout::empty(),
///     Some(animal_virtuals),
/// );
///
/// let data = ANIMAL.initialize();
/// assert_eq!(data.name(), "Animal");
/// assert!(std::ptr::eq(data.superclass(), &OBJECT));
/// ```
pub struct Class {
    name: &'static str,
    doc: &'static str,
    superclass: &'static Class,
    flags: ClassFlags,
    layout: StateLayout,
    virtuals: Option<Virtuals>,
    data: OnceLock<ClassData>,
    extension: OnceLock<Box<dyn Any + Send + Sync>>,
}

/// Root of every class hierarchy.
///
/// Declares the destructor slot with a no-op default.
pub static OBJECT: Class = Class {
    name: "Object",
    doc: "Root of the class hierarchy.",
    superclass: &OBJECT,
    flags: ClassFlags::empty(),
    layout: StateLayout::empty(),
    virtuals: Some(object_virtuals),
    data: OnceLock::new(),
    extension: OnceLock::new(),
};

fn object_virtuals(v: &mut VTableBuilder<'_>) {
    v.set(&DESTRUCTOR, object_destructor as Destructor);
}

fn object_destructor(_object: &mut Object) {}

impl Class {
    /// Creates a class descriptor. Usable in `static` initializers.
    #[must_use]
    pub const fn new(
        name: &'static str,
        doc: &'static str,
        superclass: &'static Class,
        flags: ClassFlags,
        layout: StateLayout,
        virtuals: Option<Virtuals>,
    ) -> Self {
        Self {
            name,
            doc,
            superclass,
            flags,
            layout,
            virtuals,
            data: OnceLock::new(),
            extension: OnceLock::new(),
        }
    }

    /// Class name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Documentation string, as changed by the definition step once the
    /// class is initialized.
    #[must_use]
    pub fn doc(&self) -> &'static str {
        self.data.get().map_or(self.doc, |data| data.doc)
    }

    /// Class annotations.
    #[must_use]
    pub fn flags(&self) -> ClassFlags {
        self.flags
    }

    /// State layout of instances.
    #[must_use]
    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    /// Superclass as declared. [`OBJECT`] returns itself.
    #[must_use]
    pub fn declared_superclass(&self) -> &'static Class {
        self.superclass
    }

    /// Superclass, if the class is initialized.
    #[must_use]
    pub fn superclass(&self) -> Option<&'static Class> {
        self.data.get().map(|data| data.superclass)
    }

    /// Returns `true` for the root class.
    #[must_use]
    pub fn is_root(&self) -> bool {
        ptr::eq(self.superclass, self)
    }

    /// Returns `true` if the class is marked abstract.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(ClassFlags::ABSTRACT)
    }

    /// Returns `true` once initialization has completed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.data.get().is_some()
    }

    /// Initialized data, if any.
    #[must_use]
    pub fn data(&self) -> Option<&ClassData> {
        self.data.get()
    }

    /// The class itself once initialized, `None` before.
    #[must_use]
    pub fn class_ref(&self) -> Option<&'static Class> {
        self.data.get().map(|data| data.class)
    }

    /// Initializes the class and its ancestors, once.
    ///
    /// Repeated calls return the same data. A malformed ancestry, or a state
    /// layout that does not hold the superclass's state, is fatal.
    pub fn initialize(&'static self) -> &'static ClassData {
        if let Some(data) = self.data.get() {
            return data;
        }
        if !self.has_valid_ancestry() {
            fatal::malformed_hierarchy(self);
        }
        if !self.is_root() && !self.layout.contains(&self.superclass.layout) {
            fatal::incompatible_state(self);
        }
        self.data.get_or_init(|| self.build())
    }

    /// Method table, initializing the class if needed.
    pub fn vtable(&'static self) -> &'static VTable {
        &self.initialize().vtable
    }

    /// Size in bytes of an instance, header included.
    pub fn size(&'static self) -> usize {
        self.initialize().size
    }

    /// Iterates from this class up to the root, both included.
    #[must_use]
    pub fn ancestors(&'static self) -> Ancestors {
        Ancestors {
            next: Some(self),
            remaining: MAX_CLASS_DEPTH,
        }
    }

    /// Returns `true` if `other` is this class or one of its ancestors.
    #[must_use]
    pub fn is_subclass_of(&'static self, other: &Class) -> bool {
        self.ancestors().any(|class| ptr::eq(class, other))
    }

    /// Attaches extension data, typically binding-specific. Can be set once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExtensionAlreadySet`] if data is already attached.
    pub fn set_extension<T: Any + Send + Sync>(&self, value: T) -> Result<()> {
        self.extension
            .set(Box::new(value))
            .map_err(|_| Error::ExtensionAlreadySet { class: self.name })
    }

    /// Extension data, if attached and of type `T`.
    #[must_use]
    pub fn extension<T: Any>(&self) -> Option<&T> {
        self.extension
            .get()
            .and_then(|value| (**value).downcast_ref::<T>())
    }

    fn has_valid_ancestry(&self) -> bool {
        let mut class = self;
        for _ in 0..MAX_CLASS_DEPTH {
            if class.is_root() {
                return ptr::eq(class, &OBJECT);
            }
            class = class.superclass;
        }
        false
    }

    fn build(&'static self) -> ClassData {
        let mut entries = if self.is_root() {
            Vec::new()
        } else {
            self.superclass.initialize().vtable.entries().to_vec()
        };
        let mut doc = self.doc;

        if let Some(define) = self.virtuals {
            define(&mut VTableBuilder::new(self, &mut entries, &mut doc));
        }

        let data = ClassData {
            class: self,
            superclass: self.superclass,
            doc,
            size: size_of::<Object>() + self.layout.size(),
            vtable: VTable::from_entries(entries),
            prototype: self.layout.prototype(),
        };

        register_class(self);
        debug!(
            class = self.name,
            superclass = self.superclass.name,
            slots = data.vtable.len(),
            size = data.size,
            "initialized class"
        );
        data
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self, other)
    }
}

impl Eq for Class {}

impl Hash for Class {
    fn hash<H: Hasher>(&self, state: &mut H) {
        ptr::hash(self, state);
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("superclass", &self.superclass.name)
            .field("flags", &self.flags)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Data computed when a class is initialized.
pub struct ClassData {
    class: &'static Class,
    superclass: &'static Class,
    doc: &'static str,
    size: usize,
    vtable: VTable,
    prototype: Box<dyn State>,
}

impl ClassData {
    /// The class this data belongs to.
    #[must_use]
    pub fn class(&self) -> &'static Class {
        self.class
    }

    /// Class name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.class.name
    }

    /// Superclass.
    #[must_use]
    pub fn superclass(&self) -> &'static Class {
        self.superclass
    }

    /// Documentation string.
    #[must_use]
    pub fn doc(&self) -> &'static str {
        self.doc
    }

    /// Size in bytes of an instance, header included.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Method table.
    #[must_use]
    pub fn vtable(&self) -> &VTable {
        &self.vtable
    }

    pub(crate) fn new_state(&self) -> Box<dyn State> {
        self.prototype.as_ref().clone_state()
    }
}

impl fmt::Debug for ClassData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassData")
            .field("name", &self.class.name)
            .field("superclass", &self.superclass.name)
            .field("size", &self.size)
            .field("vtable", &self.vtable)
            .finish()
    }
}

/// Initializes every class in `classes`, for programs that want all
/// initialization done before spawning threads.
pub fn initialize_all(classes: &[&'static Class]) {
    for class in classes {
        class.initialize();
    }
}

/// Iterator over a class and its ancestors.
#[derive(Debug, Clone)]
pub struct Ancestors {
    next: Option<&'static Class>,
    remaining: usize,
}

impl Iterator for Ancestors {
    type Item = &'static Class;

    fn next(&mut self) -> Option<Self::Item> {
        let class = self.next.take()?;
        self.remaining = self.remaining.saturating_sub(1);
        if !class.is_root() && self.remaining > 0 {
            self.next = Some(class.superclass);
        }
        Some(class)
    }
}
