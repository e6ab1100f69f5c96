//! Property tests for cascading frees.
//!
//! Random ownership forests are built from a list of parent choices, then a
//! random block is freed. The tests check that exactly the subtree goes away
//! and that every hook in it runs exactly once, parents before children.

use classrt_mem::{Arena, Context};
use proptest::prelude::*;
use std::any::Any;
use std::sync::{Arc, Mutex};

/// Builds a forest where block `i` is owned by block `parents[i] % i` (or is
/// top-level when the choice is `None`).
fn build_forest(
    parents: &[Option<usize>],
    log: &Arc<Mutex<Vec<usize>>>,
) -> (Arena, Vec<Context>) {
    let mut arena = Arena::new();
    let mut handles: Vec<Context> = Vec::new();

    for (i, choice) in parents.iter().enumerate() {
        let parent = match choice {
            Some(p) if i > 0 => Some(handles[p % i]),
            _ => None,
        };
        let ctx = arena.alloc(parent, i).unwrap();
        let log = Arc::clone(log);
        arena
            .set_teardown(ctx, move |value: &mut (dyn Any + Send)| {
                let id = *value.downcast_mut::<usize>().unwrap();
                log.lock().unwrap().push(id);
            })
            .unwrap();
        handles.push(ctx);
    }

    (arena, handles)
}

fn is_descendant(arena_parents: &[Option<usize>], node: usize, ancestor: usize) -> bool {
    let mut current = Some(node);
    while let Some(n) = current {
        if n == ancestor {
            return true;
        }
        current = arena_parents[n];
    }
    false
}

proptest! {
    #[test]
    fn free_removes_exactly_the_subtree(
        parents in prop::collection::vec(prop::option::of(0usize..64), 1..64),
        victim in 0usize..64,
    ) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (mut arena, handles) = build_forest(&parents, &log);
        let victim = victim % handles.len();

        // Resolved parent index of every block.
        let resolved: Vec<Option<usize>> = parents
            .iter()
            .enumerate()
            .map(|(i, choice)| match choice {
                Some(p) if i > 0 => Some(p % i),
                _ => None,
            })
            .collect();

        let expected: Vec<usize> = (0..handles.len())
            .filter(|&n| is_descendant(&resolved, n, victim))
            .collect();

        let released = arena.free(handles[victim]).unwrap();
        prop_assert_eq!(released, expected.len());

        for (n, handle) in handles.iter().enumerate() {
            prop_assert_eq!(arena.contains(*handle), !expected.contains(&n));
        }

        let mut ran = log.lock().unwrap().clone();
        // Parents run before their children.
        for (pos, &id) in ran.iter().enumerate() {
            if let Some(parent) = resolved[id] {
                if expected.contains(&parent) {
                    let parent_pos = ran.iter().position(|&x| x == parent).unwrap();
                    prop_assert!(parent_pos < pos);
                }
            }
        }
        ran.sort_unstable();
        prop_assert_eq!(ran, expected);
    }

    #[test]
    fn every_hook_runs_once_on_drop(
        parents in prop::collection::vec(prop::option::of(0usize..32), 1..32),
    ) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (arena, handles) = build_forest(&parents, &log);
        drop(arena);

        let mut ran = log.lock().unwrap().clone();
        ran.sort_unstable();
        prop_assert_eq!(ran, (0..handles.len()).collect::<Vec<_>>());
    }
}
