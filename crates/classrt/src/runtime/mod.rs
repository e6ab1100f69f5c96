//! Class runtime.
//!
//! # Architecture
//!
//! - [`class`]: class descriptors, the root class and the initialization
//!   protocol.
//! - [`vtable`]: typed method slots and per-class method tables.
//! - [`state`]: per-class instance state and its embedding in subclasses.
//! - [`object`]: arena-owned objects and the constructor protocol.
//! - [`introspection`]: instance and subclass queries, class registry.
//!
//! # Dispatch
//!
//! A call goes through a slot: `AREA.of(&object)` returns the method bound
//! for the object's class, typed by the slot. Overrides replace an
//! inherited entry in place; the overridden method stays reachable through
//! `AREA.resolve_in(&SHAPE)`.

pub mod class;
pub(crate) mod fatal;
pub mod introspection;
pub mod object;
pub mod state;
pub mod vtable;

pub use class::{
    Ancestors, Class, ClassData, ClassFlags, MAX_CLASS_DEPTH, OBJECT, Virtuals, initialize_all,
};
pub use introspection::{
    abstract_slots, all_classes, class_from_name, class_hierarchy, class_of, is_instance,
    is_instance_by_name, is_subclass,
};
pub use object::{
    Constructor, DESTRUCTOR, Destructor, Object, ObjectArena, ObjectRef, alloc_object,
    construct, construct_in_place,
};
pub use state::{Inherits, State, StateLayout};
pub use vtable::{Slot, SlotEntry, SlotFlags, SlotInfo, VTable, VTableBuilder};
