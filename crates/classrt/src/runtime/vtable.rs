//! Method slots and per-class method tables.
//!
//! A [`Slot`] is a `static` declared once per virtual method. Its identity is
//! its address, and its type parameter is the method's function pointer
//! type, so lookups return a correctly typed method without casts at the
//! call site.
//!
//! A [`VTable`] is an ordered list of slot entries. A subclass's table starts
//! as a copy of its superclass's, then the class's definition step declares
//! new slots (appended) and binds implementations (overwriting in place).
//! Every table is therefore a structural prefix-extension of its
//! superclass's table, and a slot keeps the same index in every class
//! derived from the one that declared it.
//!
//! # Example
//!
//! ```
//! use classrt::prelude::*;
//!
//! static AREA: Slot<fn(&Object) -> f64> = Slot::new("area");
//!
//! fn shape_virtuals(v: &mut VTableBuilder<'_>) {
//!     v.declare(&AREA);
//! }
//!
//! fn square_virtuals(v: &mut VTableBuilder<'_>) {
//!     v.set(&AREA, |_| 4.0);
//! }
//!
//! classrt::class! {
//!     pub static SHAPE: Shape(OBJECT) {
//!         layout: StateLayout::empty(),
//!         flags: ClassFlags::ABSTRACT,
//!         virtuals: shape_virtuals,
//!     }
//! }
//!
//! classrt::class! {
//!     pub static SQUARE: Square(SHAPE) {
//!         layout: StateLayout::empty(),
//!         virtuals: square_virtuals,
//!     }
//! }
//!
//! assert_eq!(AREA.resolve_in(&SQUARE).map(|area| area(&Object::instantiate(&SQUARE))).ok(), Some(4.0));
//! assert!(AREA.resolve_in(&SHAPE).is_err());
//! ```

use std::any::{Any, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::ptr;
use std::sync::{Arc, OnceLock};

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::runtime::fatal;
use crate::runtime::{Class, Object};

bitflags! {
    /// Annotations on a slot, read by binding generators and introspection.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SlotFlags: u16 {
        /// Not exported to bindings.
        const PRIVATE = 1 << 0;
        /// Initializes a freshly allocated instance.
        const CONSTRUCTOR = 1 << 1;
        /// Runs when the instance is released.
        const DESTRUCTOR = 1 << 2;
        /// Return value is borrowed from the receiver.
        const BORROWED = 1 << 3;
        /// Return value is owned by another hierarchy.
        const FOREIGN = 1 << 4;
        /// Method writes through an out parameter.
        const OUT = 1 << 5;
        /// Method does not use the receiver's state.
        const CLASS_METHOD = 1 << 6;
    }
}

/// Erased method pointer stored in a table entry.
type Method = Arc<dyn Any + Send + Sync>;

/// Name and annotations of a slot.
#[derive(Debug)]
pub struct SlotInfo {
    name: &'static str,
    flags: SlotFlags,
    signature: fn() -> &'static str,
}

impl SlotInfo {
    /// Slot name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Slot annotations.
    #[must_use]
    pub fn flags(&self) -> SlotFlags {
        self.flags
    }

    /// Function pointer type of the slot.
    #[must_use]
    pub fn signature(&self) -> &'static str {
        (self.signature)()
    }
}

/// A typed virtual method slot.
///
/// `F` is the method's function pointer type, usually taking `&Object` or
/// `&mut Object` first.
pub struct Slot<F> {
    info: SlotInfo,
    index: OnceLock<usize>,
    _method: PhantomData<fn() -> F>,
}

impl<F: Copy + Send + Sync + 'static> Slot<F> {
    /// Creates a slot with no annotations.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self::with_flags(name, SlotFlags::empty())
    }

    /// Creates a slot with annotations.
    #[must_use]
    pub const fn with_flags(name: &'static str, flags: SlotFlags) -> Self {
        Self {
            info: SlotInfo {
                name,
                flags,
                signature: type_name::<F>,
            },
            index: OnceLock::new(),
            _method: PhantomData,
        }
    }

    /// Slot name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.info.name
    }

    /// Slot metadata.
    #[must_use]
    pub fn info(&self) -> &SlotInfo {
        &self.info
    }

    /// Index of the slot in the tables of classes that have it, once any
    /// lookup has succeeded.
    #[must_use]
    pub fn cached_index(&self) -> Option<usize> {
        self.index.get().copied()
    }

    /// Resolves the method bound to this slot in `class`, initializing the
    /// class if needed.
    ///
    /// This is how overridden methods reach an ancestor's implementation:
    /// `AREA.resolve_in(&SHAPE)` returns Shape's method whatever the
    /// receiver's class.
    ///
    /// # Errors
    ///
    /// - [`Error::SlotNotFound`] if `class` does not have the slot.
    /// - [`Error::Unimplemented`] if no class in the chain bound it.
    pub fn resolve_in(&'static self, class: &'static Class) -> Result<F> {
        self.lookup(class.vtable(), class.name())
    }

    /// Resolves the method for `object`'s class.
    ///
    /// # Errors
    ///
    /// As [`Slot::resolve_in`].
    pub fn try_of(&'static self, object: &Object) -> Result<F> {
        self.resolve_in(object.class())
    }

    /// Resolves the method for `object`'s class, treating a missing or
    /// unbound slot as fatal.
    ///
    /// Calling through an abstract slot is a programming error. The runtime
    /// reports it and then aborts or panics, per
    /// [`Config::fatal_action`](crate::config::Config).
    pub fn of(&'static self, object: &Object) -> F {
        match self.try_of(object) {
            Ok(method) => method,
            Err(err) => fatal::unimplemented(object.class(), self.name(), &err),
        }
    }

    fn lookup(&'static self, vtable: &VTable, class: &'static str) -> Result<F> {
        let entry = vtable
            .position(&self.info, self.cached_index())
            .map(|index| {
                let _ = self.index.set(index);
                &vtable.entries[index]
            })
            .ok_or(Error::SlotNotFound {
                class,
                slot: self.info.name,
            })?;

        let method = entry.method.as_ref().ok_or(Error::Unimplemented {
            class,
            slot: self.info.name,
        })?;

        (**method)
            .downcast_ref::<F>()
            .copied()
            .ok_or(Error::SlotTypeMismatch {
                slot: self.info.name,
                expected: type_name::<F>(),
            })
    }
}

impl<F> fmt::Debug for Slot<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("name", &self.info.name)
            .field("flags", &self.info.flags)
            .finish()
    }
}

/// One slot in a class's table.
#[derive(Clone)]
pub struct SlotEntry {
    info: &'static SlotInfo,
    declared_in: &'static Class,
    bound_in: Option<&'static Class>,
    method: Option<Method>,
}

impl SlotEntry {
    /// Slot name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.info.name
    }

    /// Slot annotations.
    #[must_use]
    pub fn flags(&self) -> SlotFlags {
        self.info.flags
    }

    /// Slot metadata.
    #[must_use]
    pub fn info(&self) -> &'static SlotInfo {
        self.info
    }

    /// Class that introduced the slot.
    #[must_use]
    pub fn declared_in(&self) -> &'static Class {
        self.declared_in
    }

    /// Class whose definition bound the current method, if any.
    #[must_use]
    pub fn bound_in(&self) -> Option<&'static Class> {
        self.bound_in
    }

    /// Returns `true` if a method is bound.
    #[must_use]
    pub fn is_implemented(&self) -> bool {
        self.method.is_some()
    }

    /// Returns `true` if both entries describe the same slot bound to the
    /// same method.
    #[must_use]
    pub fn same_binding(&self, other: &SlotEntry) -> bool {
        ptr::eq(self.info, other.info)
            && match (&self.method, &other.method) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
    }
}

impl PartialEq for SlotEntry {
    fn eq(&self, other: &Self) -> bool {
        self.same_binding(other)
            && ptr::eq(self.declared_in, other.declared_in)
            && match (self.bound_in, other.bound_in) {
                (Some(a), Some(b)) => ptr::eq(a, b),
                (None, None) => true,
                _ => false,
            }
    }
}

impl fmt::Debug for SlotEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotEntry")
            .field("name", &self.info.name)
            .field("declared_in", &self.declared_in.name())
            .field("bound_in", &self.bound_in.map(Class::name))
            .field("implemented", &self.method.is_some())
            .finish()
    }
}

/// A class's method table.
#[derive(Clone, Default, PartialEq)]
pub struct VTable {
    entries: Vec<SlotEntry>,
}

impl VTable {
    pub(crate) fn from_entries(entries: Vec<SlotEntry>) -> Self {
        Self { entries }
    }

    /// Entries in declaration order, inherited slots first.
    #[must_use]
    pub fn entries(&self) -> &[SlotEntry] {
        &self.entries
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for a slot, if the table has it.
    #[must_use]
    pub fn entry<F>(&self, slot: &Slot<F>) -> Option<&SlotEntry> {
        self.position(&slot.info, slot.index.get().copied())
            .map(|index| &self.entries[index])
    }

    /// Entry for a slot by name.
    #[must_use]
    pub fn entry_by_name(&self, name: &str) -> Option<&SlotEntry> {
        self.entries.iter().find(|entry| entry.info.name == name)
    }

    /// Returns `true` if every entry of `base` appears at the same index
    /// in this table.
    #[must_use]
    pub fn extends(&self, base: &VTable) -> bool {
        base.entries.len() <= self.entries.len()
            && base
                .entries
                .iter()
                .zip(&self.entries)
                .all(|(ours, theirs)| ptr::eq(ours.info, theirs.info))
    }

    fn position(&self, info: &SlotInfo, hint: Option<usize>) -> Option<usize> {
        if let Some(index) = hint {
            if self
                .entries
                .get(index)
                .is_some_and(|entry| ptr::eq(entry.info, info))
            {
                return Some(index);
            }
        }
        self.entries
            .iter()
            .position(|entry| ptr::eq(entry.info, info))
    }
}

impl fmt::Debug for VTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.entries).finish()
    }
}

/// Edits the table of the class being initialized.
///
/// Handed to a class's definition step. Only slots reachable from the
/// superclass or declared here can be bound.
pub struct VTableBuilder<'a> {
    class: &'static Class,
    entries: &'a mut Vec<SlotEntry>,
    doc: &'a mut &'static str,
}

impl<'a> VTableBuilder<'a> {
    pub(crate) fn new(
        class: &'static Class,
        entries: &'a mut Vec<SlotEntry>,
        doc: &'a mut &'static str,
    ) -> Self {
        Self {
            class,
            entries,
            doc,
        }
    }

    /// Class being defined.
    #[must_use]
    pub fn class(&self) -> &'static Class {
        self.class
    }

    /// Declares a slot without an implementation. Declaring an inherited
    /// slot again has no effect.
    pub fn declare<F>(&mut self, slot: &'static Slot<F>) -> &mut Self
    where
        F: Copy + Send + Sync + 'static,
    {
        if self.find(&slot.info).is_none() {
            self.entries.push(SlotEntry {
                info: &slot.info,
                declared_in: self.class,
                bound_in: None,
                method: None,
            });
        }
        self
    }

    /// Binds `method` to `slot`, declaring the slot if this class is the
    /// first to have it.
    pub fn set<F>(&mut self, slot: &'static Slot<F>, method: F) -> &mut Self
    where
        F: Copy + Send + Sync + 'static,
    {
        let method: Method = Arc::new(method);
        match self.find(&slot.info) {
            Some(index) => {
                let entry = &mut self.entries[index];
                entry.method = Some(method);
                entry.bound_in = Some(self.class);
            }
            None => self.entries.push(SlotEntry {
                info: &slot.info,
                declared_in: self.class,
                bound_in: Some(self.class),
                method: Some(method),
            }),
        }
        self
    }

    /// Sets the class documentation string.
    pub fn set_doc(&mut self, doc: &'static str) -> &mut Self {
        *self.doc = doc;
        self
    }

    fn find(&self, info: &SlotInfo) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| ptr::eq(entry.info, info))
    }
}
