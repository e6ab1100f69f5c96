//! Hierarchical ownership arena for the `classrt` object runtime.
//!
//! Every block in the arena has at most one parent. Freeing a block frees its
//! whole subtree, running each block's teardown hook first. The arena is the
//! only owner of the values it stores; callers hold [`Context`] handles,
//! which are plain generational indices and never keep a block alive.
//!
//! # Architecture
//!
//! - [`Arena`]: slot table plus free list. Slots are reused with a bumped
//!   generation so stale handles are detected instead of aliasing.
//! - [`Context`]: `Copy` handle naming one block. Used both as an owning
//!   parent designation and as a non-owning reference.
//! - [`TeardownHook`]: closure run on a block's value right before release.
//!
//! # Teardown Order
//!
//! Freeing a subtree runs hooks **shallowest-first** (pre-order): a parent's
//! hook runs before its children's, siblings run in allocation order. All
//! hooks of the subtree run before any block of the subtree is released.
//! Values are then dropped deepest-first. The traversal uses an explicit
//! stack, so deep trees do not consume call stack.
//!
//! If a hook panics, nothing is released and the subtree stays attached to
//! its owner. Hooks that already ran are gone; freeing the subtree again (or
//! dropping the arena) runs the rest.
//!
//! # Thread Safety
//!
//! `Arena` is `Send` but not `Sync`. Sharing one arena between threads
//! requires external synchronization (e.g. a `Mutex<Arena>`).
//!
//! # Example
//!
//! ```
//! use classrt_mem::Arena;
//!
//! let mut arena = Arena::new();
//! let root = arena.new_context(None).unwrap();
//! let value = arena.alloc(Some(root), 42u32).unwrap();
//!
//! assert_eq!(*arena.get::<u32>(value).unwrap(), 42);
//!
//! // Freeing the parent releases the child as well.
//! assert_eq!(arena.free(root).unwrap(), 2);
//! assert!(!arena.contains(value));
//! ```

use std::any::{Any, type_name};
use std::borrow::Cow;
use std::fmt;
use std::fmt::Write as _;

use thiserror::Error;
use classrt_log::{debug, trace};

/// Errors produced by arena operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The handle refers to a block that was freed (or never existed).
    #[error("stale context handle #{index} (generation {generation})")]
    StaleContext {
        /// Slot index of the handle.
        index: u32,
        /// Generation recorded in the handle.
        generation: u32,
    },

    /// Reparenting would make a block its own ancestor.
    #[error("reparenting would create an ownership cycle")]
    WouldCycle,

    /// The block carries no value of the requested type.
    #[error("block does not hold a value of type {expected}")]
    TypeMismatch {
        /// The requested type name.
        expected: &'static str,
    },

    /// The slot table cannot grow any further.
    #[error("arena slot table exhausted")]
    CapacityExhausted,
}

/// Result type for arena operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Hook invoked on a block's value immediately before the block is released.
///
/// Blocks created by [`Arena::new_context`] carry no value; their hook
/// receives `&mut ()`.
pub type TeardownHook = Box<dyn FnOnce(&mut (dyn Any + Send)) + Send>;

/// Handle to one arena block.
///
/// A `Context` does not own anything. Once its block is freed, every lookup
/// through the handle fails with [`Error::StaleContext`], even if the slot is
/// reused by a later allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Context {
    index: u32,
    generation: u32,
}

impl Context {
    /// Slot index of this handle.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of this handle.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    fn stale(self) -> Error {
        Error::StaleContext {
            index: self.index,
            generation: self.generation,
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}v{}", self.index, self.generation)
    }
}

/// Arena usage statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArenaStats {
    /// Number of live blocks.
    pub live_blocks: usize,
    /// Sum of the value sizes of all live blocks.
    pub live_bytes: usize,
    /// Highest number of simultaneously live blocks.
    pub peak_blocks: usize,
    /// Number of blocks released so far.
    pub released_blocks: usize,
}

struct Block {
    value: Option<Box<dyn Any + Send>>,
    type_name: &'static str,
    size: usize,
    name: Option<Cow<'static, str>>,
    parent: Option<Context>,
    children: Vec<Context>,
    teardown: Option<TeardownHook>,
}

struct Entry {
    generation: u32,
    block: Option<Block>,
}

/// Hierarchical ownership arena.
///
/// See the [module documentation](self) for the ownership and teardown
/// model.
pub struct Arena {
    entries: Vec<Entry>,
    free_list: Vec<u32>,
    stats: ArenaStats,
}

impl Arena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty arena with room for `capacity` blocks.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Arena {
            entries: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            stats: ArenaStats::default(),
        }
    }

    /// Creates an empty context block (no value) under `parent`.
    ///
    /// A `None` parent creates a top-level context.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleContext`] if `parent` is not live.
    pub fn new_context(&mut self, parent: Option<Context>) -> Result<Context> {
        self.insert(parent, None, "<context>", 0)
    }

    /// Moves `value` into a new block owned by `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleContext`] if `parent` is not live, or
    /// [`Error::CapacityExhausted`] if the slot table is full.
    pub fn alloc<T: Any + Send>(
        &mut self,
        parent: Option<Context>,
        value: T,
    ) -> Result<Context> {
        self.insert(
            parent,
            Some(Box::new(value)),
            type_name::<T>(),
            size_of::<T>(),
        )
    }

    fn insert(
        &mut self,
        parent: Option<Context>,
        value: Option<Box<dyn Any + Send>>,
        type_name: &'static str,
        size: usize,
    ) -> Result<Context> {
        if let Some(parent) = parent {
            self.block(parent)?;
        }

        let block = Block {
            value,
            type_name,
            size,
            name: None,
            parent,
            children: Vec::new(),
            teardown: None,
        };

        let ctx = match self.free_list.pop() {
            Some(index) => {
                let entry = &mut self.entries[index as usize];
                entry.block = Some(block);
                Context {
                    index,
                    generation: entry.generation,
                }
            }
            None => {
                let index = u32::try_from(self.entries.len())
                    .map_err(|_| Error::CapacityExhausted)?;
                self.entries.push(Entry {
                    generation: 0,
                    block: Some(block),
                });
                Context {
                    index,
                    generation: 0,
                }
            }
        };

        if let Some(parent) = parent {
            self.block_mut(parent)?.children.push(ctx);
        }

        self.stats.live_blocks += 1;
        self.stats.live_bytes += size;
        self.stats.peak_blocks =
            self.stats.peak_blocks.max(self.stats.live_blocks);

        trace!(%ctx, type_name, size, "allocated block");
        Ok(ctx)
    }

    fn block(&self, ctx: Context) -> Result<&Block> {
        self.entries
            .get(ctx.index as usize)
            .filter(|entry| entry.generation == ctx.generation)
            .and_then(|entry| entry.block.as_ref())
            .ok_or_else(|| ctx.stale())
    }

    fn block_mut(&mut self, ctx: Context) -> Result<&mut Block> {
        self.entries
            .get_mut(ctx.index as usize)
            .filter(|entry| entry.generation == ctx.generation)
            .and_then(|entry| entry.block.as_mut())
            .ok_or_else(|| ctx.stale())
    }

    /// Returns `true` if `ctx` names a live block.
    #[must_use]
    pub fn contains(&self, ctx: Context) -> bool {
        self.block(ctx).is_ok()
    }

    /// Number of live blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stats.live_blocks
    }

    /// Returns `true` if the arena holds no live block.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stats.live_blocks == 0
    }

    /// Returns the usage statistics.
    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        self.stats
    }

    /// Borrows the value stored in `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleContext`] for a dead handle and
    /// [`Error::TypeMismatch`] if the block holds no `T`.
    pub fn get<T: Any>(&self, ctx: Context) -> Result<&T> {
        self.block(ctx)?
            .value
            .as_deref()
            .and_then(|value| value.downcast_ref::<T>())
            .ok_or(Error::TypeMismatch {
                expected: type_name::<T>(),
            })
    }

    /// Mutably borrows the value stored in `ctx`.
    ///
    /// # Errors
    ///
    /// Same as [`Arena::get`].
    pub fn get_mut<T: Any>(&mut self, ctx: Context) -> Result<&mut T> {
        self.block_mut(ctx)?
            .value
            .as_deref_mut()
            .and_then(|value| value.downcast_mut::<T>())
            .ok_or(Error::TypeMismatch {
                expected: type_name::<T>(),
            })
    }

    /// Type name of the value stored in `ctx` (`"<context>"` when empty).
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleContext`] for a dead handle.
    pub fn type_name_of(&self, ctx: Context) -> Result<&'static str> {
        Ok(self.block(ctx)?.type_name)
    }

    /// Attaches a human-readable name to a block (shown by [`Arena::report`]).
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleContext`] for a dead handle.
    pub fn set_name(
        &mut self,
        ctx: Context,
        name: impl Into<Cow<'static, str>>,
    ) -> Result<()> {
        self.block_mut(ctx)?.name = Some(name.into());
        Ok(())
    }

    /// Returns the name attached to a block, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleContext`] for a dead handle.
    pub fn name(&self, ctx: Context) -> Result<Option<&str>> {
        Ok(self.block(ctx)?.name.as_deref())
    }

    /// Registers the teardown hook of a block, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleContext`] for a dead handle.
    pub fn set_teardown<F>(&mut self, ctx: Context, hook: F) -> Result<()>
    where
        F: FnOnce(&mut (dyn Any + Send)) + Send + 'static,
    {
        self.block_mut(ctx)?.teardown = Some(Box::new(hook));
        Ok(())
    }

    /// Removes and returns the teardown hook of a block without running it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleContext`] for a dead handle.
    pub fn take_teardown(&mut self, ctx: Context) -> Result<Option<TeardownHook>> {
        Ok(self.block_mut(ctx)?.teardown.take())
    }

    /// Returns `true` if a teardown hook is registered for `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleContext`] for a dead handle.
    pub fn has_teardown(&self, ctx: Context) -> Result<bool> {
        Ok(self.block(ctx)?.teardown.is_some())
    }

    /// Returns the owning parent of a block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleContext`] for a dead handle.
    pub fn parent(&self, ctx: Context) -> Result<Option<Context>> {
        Ok(self.block(ctx)?.parent)
    }

    /// Returns the direct children of a block in allocation order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleContext`] for a dead handle.
    pub fn children(&self, ctx: Context) -> Result<&[Context]> {
        Ok(&self.block(ctx)?.children)
    }

    /// Moves a block (and its subtree) under `new_parent`.
    ///
    /// `None` detaches the block and makes it a top-level context. A block
    /// never has more than one owner: it is removed from its previous
    /// parent's children.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleContext`] if either handle is dead, or
    /// [`Error::WouldCycle`] if `new_parent` is `ctx` or one of its
    /// descendants.
    pub fn reparent(
        &mut self,
        ctx: Context,
        new_parent: Option<Context>,
    ) -> Result<()> {
        let old_parent = self.block(ctx)?.parent;

        if let Some(target) = new_parent {
            let mut current = Some(target);
            while let Some(ancestor) = current {
                if ancestor == ctx {
                    return Err(Error::WouldCycle);
                }
                current = self.block(ancestor)?.parent;
            }
        }

        if let Some(old) = old_parent {
            self.block_mut(old)?.children.retain(|child| *child != ctx);
        }
        if let Some(target) = new_parent {
            self.block_mut(target)?.children.push(ctx);
        }
        self.block_mut(ctx)?.parent = new_parent;

        trace!(%ctx, ?old_parent, ?new_parent, "reparented block");
        Ok(())
    }

    /// Collects the subtree rooted at `root` in pre-order.
    fn subtree(&self, root: Context) -> Vec<Context> {
        let mut order = Vec::new();
        let mut stack = vec![root];

        while let Some(ctx) = stack.pop() {
            if let Ok(block) = self.block(ctx) {
                order.push(ctx);
                // Reversed so the first child is visited first.
                stack.extend(block.children.iter().rev().copied());
            }
        }

        order
    }

    /// Number of live blocks in the subtree rooted at `ctx` (itself included).
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleContext`] for a dead handle.
    pub fn total_blocks(&self, ctx: Context) -> Result<usize> {
        self.block(ctx)?;
        Ok(self.subtree(ctx).len())
    }

    /// Sum of value sizes in the subtree rooted at `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleContext`] for a dead handle.
    pub fn total_size(&self, ctx: Context) -> Result<usize> {
        self.block(ctx)?;
        Ok(self
            .subtree(ctx)
            .into_iter()
            .filter_map(|c| self.block(c).ok())
            .map(|block| block.size)
            .sum())
    }

    /// Frees a block and everything it owns.
    ///
    /// Returns the number of blocks released.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleContext`] for a dead handle.
    pub fn free(&mut self, ctx: Context) -> Result<usize> {
        let order = self.subtree(ctx);
        if order.is_empty() {
            self.block(ctx)?;
        }

        // The subtree stays attached while hooks run, so a panicking hook
        // leaves the rest reachable from its owner.
        self.run_teardown(&order);

        if let Some(parent) = self.block(ctx)?.parent {
            if let Ok(block) = self.block_mut(parent) {
                block.children.retain(|child| *child != ctx);
            }
        }
        for &block in order.iter().rev() {
            self.release(block);
        }

        debug!(%ctx, released = order.len(), "freed subtree");
        Ok(order.len())
    }

    /// Frees every descendant of `ctx` but keeps `ctx` itself.
    ///
    /// Returns the number of blocks released.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleContext`] for a dead handle.
    pub fn free_children(&mut self, ctx: Context) -> Result<usize> {
        let children = self.block(ctx)?.children.clone();
        let mut released = 0;
        for child in children {
            released += self.free(child)?;
        }
        Ok(released)
    }

    fn run_teardown(&mut self, order: &[Context]) {
        for &ctx in order {
            let Ok(block) = self.block_mut(ctx) else {
                continue;
            };
            // Taken before the call so a hook can never run twice.
            let Some(hook) = block.teardown.take() else {
                continue;
            };

            trace!(%ctx, type_name = block.type_name, "running teardown hook");
            match block.value.as_deref_mut() {
                Some(value) => hook(value),
                None => {
                    let mut empty = ();
                    hook(&mut empty);
                }
            }
        }
    }

    fn release(&mut self, ctx: Context) {
        let Some(entry) = self.entries.get_mut(ctx.index as usize) else {
            return;
        };
        if entry.generation != ctx.generation {
            return;
        }
        let Some(block) = entry.block.take() else {
            return;
        };

        entry.generation = entry.generation.wrapping_add(1);
        self.free_list.push(ctx.index);
        self.stats.live_blocks -= 1;
        self.stats.live_bytes -= block.size;
        self.stats.released_blocks += 1;

        trace!(%ctx, type_name = block.type_name, "released block");
        drop(block);
    }

    /// Top-level contexts (blocks without a parent) in slot order.
    #[must_use]
    pub fn roots(&self) -> Vec<Context> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                let block = entry.block.as_ref()?;
                if block.parent.is_some() {
                    return None;
                }
                Some(Context {
                    index: u32::try_from(index).ok()?,
                    generation: entry.generation,
                })
            })
            .collect()
    }

    /// Renders the subtree rooted at `ctx` as an indented tree.
    ///
    /// ```text
    /// arena report on 'image' (total 72 bytes in 3 blocks)
    ///     image                          classrt::runtime::object::Object   24 bytes
    ///         buffer                     alloc::vec::Vec<u8>                24 bytes
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleContext`] for a dead handle.
    pub fn report(&self, ctx: Context) -> Result<String> {
        let root = self.block(ctx)?;
        let mut out = String::new();

        let _ = writeln!(
            out,
            "arena report on '{}' (total {} bytes in {} blocks)",
            root.name.as_deref().unwrap_or(root.type_name),
            self.total_size(ctx)?,
            self.total_blocks(ctx)?,
        );

        let mut stack = vec![(ctx, 1usize)];
        while let Some((current, depth)) = stack.pop() {
            let Ok(block) = self.block(current) else {
                continue;
            };
            let label = block.name.as_deref().unwrap_or("<unnamed>");
            let _ = writeln!(
                out,
                "{:indent$}{label:<30} {:<34} {} bytes",
                "",
                block.type_name,
                block.size,
                indent = depth * 4,
            );
            stack.extend(
                block.children.iter().rev().map(|child| (*child, depth + 1)),
            );
        }

        Ok(out)
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("live_blocks", &self.stats.live_blocks)
            .field("live_bytes", &self.stats.live_bytes)
            .field("slots", &self.entries.len())
            .finish()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        for root in self.roots() {
            let _ = self.free(root);
        }
    }
}
