//! Runtime type queries and the class registry.
//!
//! Every class registers its name when it is initialized. The registry keeps
//! the first class registered under a name.

use std::ptr;
use std::sync::OnceLock;

use classrt_log::debug;
use fxhash::FxHashMap;
use parking_lot::RwLock;

use crate::runtime::{Class, Object, SlotEntry};

static CLASS_REGISTRY: OnceLock<RwLock<FxHashMap<&'static str, &'static Class>>> = OnceLock::new();

fn registry() -> &'static RwLock<FxHashMap<&'static str, &'static Class>> {
    CLASS_REGISTRY.get_or_init(|| RwLock::new(FxHashMap::default()))
}

pub(crate) fn register_class(class: &'static Class) {
    let mut registry = registry().write();
    match registry.get(class.name()) {
        Some(existing) if !ptr::eq(*existing, class) => {
            debug!(class = class.name(), "class name already registered; keeping the first");
        }
        Some(_) => {}
        None => {
            registry.insert(class.name(), class);
        }
    }
}

/// Returns `true` if `object`'s class is exactly `class`.
#[must_use]
pub fn is_instance(object: &Object, class: &Class) -> bool {
    ptr::eq(object.class(), class)
}

/// Returns `true` if `object`'s class is `class` or derives from it.
///
/// Every object is a subclass of [`OBJECT`](crate::runtime::OBJECT).
#[must_use]
pub fn is_subclass(object: &Object, class: &Class) -> bool {
    object.class().is_subclass_of(class)
}

/// Returns `true` if `object`'s class is named `name`.
#[must_use]
pub fn is_instance_by_name(object: &Object, name: &str) -> bool {
    object.name() == name
}

/// Class of `object`.
#[must_use]
pub fn class_of(object: &Object) -> &'static Class {
    object.class()
}

/// `class` followed by its ancestors, ending with the root.
#[must_use]
pub fn class_hierarchy(class: &'static Class) -> Vec<&'static Class> {
    class.ancestors().collect()
}

/// Looks up an initialized class by name.
#[must_use]
pub fn class_from_name(name: &str) -> Option<&'static Class> {
    registry().read().get(name).copied()
}

/// Every initialized class, sorted by name.
#[must_use]
pub fn all_classes() -> Vec<&'static Class> {
    let mut classes: Vec<_> = registry().read().values().copied().collect();
    classes.sort_unstable_by_key(|class| class.name());
    classes
}

/// Slots of `class` that no class in its chain has bound.
pub fn abstract_slots(class: &'static Class) -> Vec<&'static str> {
    class
        .vtable()
        .entries()
        .iter()
        .filter(|entry| !entry.is_implemented())
        .map(SlotEntry::name)
        .collect()
}
