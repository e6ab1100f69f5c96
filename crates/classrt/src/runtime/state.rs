//! Per-class instance state.
//!
//! An object carries one boxed state value, created from its class's
//! [`StateLayout`]. A subclass that adds fields embeds its superclass's state
//! and implements [`Inherits`], which lets [`Object::state`] find any
//! ancestor's state inside a derived instance by walking the class chain.
//!
//! [`Object::state`]: crate::runtime::Object::state

use std::any::{Any, TypeId, type_name};
use std::mem::size_of;

/// Instance state stored in an object.
///
/// Implemented for every `Clone + Send + Sync + 'static` type.
pub trait State: Any + Send + Sync {
    /// Clones the state into a new box.
    fn clone_state(&self) -> Box<dyn State>;

    /// Upcasts to `&dyn Any`.
    fn as_any(&self) -> &dyn Any;

    /// Upcasts to `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any + Clone + Send + Sync> State for T {
    fn clone_state(&self) -> Box<dyn State> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// State that embeds its superclass's state.
///
/// # Example
///
/// ```
/// use classrt::runtime::Inherits;
///
/// #[derive(Clone, Default)]
/// struct ShapeState {
///     label: String,
/// }
///
/// #[derive(Clone, Default)]
/// struct CircleState {
///     shape: ShapeState,
///     radius: f64,
/// }
///
/// impl Inherits for CircleState {
///     type Base = ShapeState;
///
///     fn base(&self) -> &ShapeState {
///         &self.shape
///     }
///
///     fn base_mut(&mut self) -> &mut ShapeState {
///         &mut self.shape
///     }
/// }
/// ```
pub trait Inherits: State {
    /// Superclass state type.
    type Base: State;

    /// Borrows the embedded superclass state.
    fn base(&self) -> &Self::Base;

    /// Mutably borrows the embedded superclass state.
    fn base_mut(&mut self) -> &mut Self::Base;
}

type Upcast = fn(&dyn Any) -> Option<&dyn Any>;
type UpcastMut = fn(&mut dyn Any) -> Option<&mut dyn Any>;

/// How a class builds and projects its instance state.
#[derive(Clone, Copy)]
pub struct StateLayout {
    type_id: fn() -> TypeId,
    type_name: fn() -> &'static str,
    size: usize,
    prototype: fn() -> Box<dyn State>,
    upcast: Option<Upcast>,
    upcast_mut: Option<UpcastMut>,
}

impl StateLayout {
    /// Layout with no state.
    #[must_use]
    pub const fn empty() -> Self {
        Self::of::<()>()
    }

    /// Layout whose state is a `T` that does not embed ancestor state.
    ///
    /// Ancestor state lookups on such instances only succeed for types the
    /// ancestors share with `T`.
    #[must_use]
    pub const fn of<T: State + Default>() -> Self {
        Self {
            type_id: TypeId::of::<T>,
            type_name: type_name::<T>,
            size: size_of::<T>(),
            prototype: prototype::<T>,
            upcast: None,
            upcast_mut: None,
        }
    }

    /// Layout whose state is a `T` embedding its superclass's state.
    #[must_use]
    pub const fn inherits<T: Inherits + Default>() -> Self {
        Self {
            type_id: TypeId::of::<T>,
            type_name: type_name::<T>,
            size: size_of::<T>(),
            prototype: prototype::<T>,
            upcast: Some(upcast::<T>),
            upcast_mut: Some(upcast_mut::<T>),
        }
    }

    /// Name of the state type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        (self.type_name)()
    }

    /// Size of the state type in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Returns `true` if the state embeds its superclass's state.
    #[must_use]
    pub const fn embeds_base(&self) -> bool {
        self.upcast.is_some()
    }

    /// Returns `true` if a state built from this layout holds a `base`
    /// state: it is the same type, it embeds one directly, or `base` is
    /// empty.
    #[must_use]
    pub fn contains(&self, base: &StateLayout) -> bool {
        let target = (base.type_id)();
        if target == TypeId::of::<()>() || (self.type_id)() == target {
            return true;
        }
        let prototype = self.prototype();
        self.project(prototype.as_ref().as_any())
            .is_some_and(|embedded| Any::type_id(embedded) == target)
    }

    pub(crate) fn prototype(&self) -> Box<dyn State> {
        (self.prototype)()
    }

    pub(crate) fn project<'a>(&self, state: &'a dyn Any) -> Option<&'a dyn Any> {
        self.upcast.and_then(|upcast| upcast(state))
    }

    pub(crate) fn project_mut<'a>(&self, state: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        self.upcast_mut.and_then(|upcast| upcast(state))
    }
}

impl std::fmt::Debug for StateLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateLayout")
            .field("type_name", &self.type_name())
            .field("size", &self.size)
            .field("embeds_base", &self.embeds_base())
            .finish()
    }
}

fn prototype<T: State + Default>() -> Box<dyn State> {
    Box::new(T::default())
}

fn upcast<T: Inherits>(state: &dyn Any) -> Option<&dyn Any> {
    state
        .downcast_ref::<T>()
        .map(|state| state.base().as_any())
}

fn upcast_mut<T: Inherits>(state: &mut dyn Any) -> Option<&mut dyn Any> {
    state
        .downcast_mut::<T>()
        .map(|state| state.base_mut().as_any_mut())
}
