//! `classrt` memory management infrastructure
//!
//! This crate provides the hierarchical ownership arena the `classrt` object
//! runtime allocates its instances from:
//!
//! - **Ownership contexts**: every block has exactly one parent; freeing a
//!   parent frees the whole subtree
//! - **Teardown hooks**: per-block closures run right before release
//! - **Generational handles**: stale references are detected, never aliased
//!

pub mod arena;

pub use arena::{Arena, ArenaStats, Context, Error, Result, TeardownHook};
