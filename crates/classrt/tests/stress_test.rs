//! Stress tests for the class runtime.
//!
//! - Many threads racing to initialize the same classes
//! - Wide and deep ownership trees of objects
//! - Error channels under concurrent load
//!
//! Run with: `cargo test --test stress_test -- --nocapture`

use classrt::prelude::*;
use classrt::raise_error;
use classrt::report;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

static DEFINITIONS_RUN: AtomicUsize = AtomicUsize::new(0);
static DESTROYED: AtomicUsize = AtomicUsize::new(0);

static PING: Slot<fn(&Object) -> u32> = Slot::new("ping");

fn base_virtuals(v: &mut VTableBuilder<'_>) {
    DEFINITIONS_RUN.fetch_add(1, Ordering::SeqCst);
    v.set(&PING, |_| 1).set(&DESTRUCTOR, count_destroyed);
}

fn leaf_virtuals(v: &mut VTableBuilder<'_>) {
    DEFINITIONS_RUN.fetch_add(1, Ordering::SeqCst);
    v.set(&PING, |_| 2);
}

fn count_destroyed(_this: &mut Object) {
    DESTROYED.fetch_add(1, Ordering::SeqCst);
}

classrt::class! {
    static STRESS_BASE: StressBase(OBJECT) {
        layout: StateLayout::of::<u64>(),
        virtuals: base_virtuals,
    }
}

classrt::class! {
    static STRESS_LEAF: StressLeaf(STRESS_BASE) {
        layout: StateLayout::of::<u64>(),
        virtuals: leaf_virtuals,
    }
}

// ============================================================================
// Concurrent initialization
// ============================================================================

#[test]
fn test_concurrent_first_use_initializes_once() {
    const THREADS: usize = 16;
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let object = Object::instantiate(&STRESS_LEAF);
                let data: *const _ = STRESS_LEAF.initialize();
                (PING.of(&object)(&object), data as usize)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(results.iter().all(|(ping, _)| *ping == 2));
    assert!(results.windows(2).all(|pair| pair[0].1 == pair[1].1));

    // One definition step per class.
    assert_eq!(DEFINITIONS_RUN.load(Ordering::SeqCst), 2);
    assert!(ptr::eq(
        STRESS_LEAF.initialize().superclass(),
        &STRESS_BASE
    ));
}

// ============================================================================
// Large ownership trees
// ============================================================================

#[test]
fn test_wide_tree() {
    let mut arena = Arena::new();
    let root = alloc_object(&mut arena, &STRESS_BASE, None).unwrap();
    for _ in 0..10_000 {
        alloc_object(&mut arena, &STRESS_LEAF, Some(root)).unwrap();
    }

    let before = DESTROYED.load(Ordering::SeqCst);
    assert_eq!(arena.free(root).unwrap(), 10_001);
    assert!(DESTROYED.load(Ordering::SeqCst) - before >= 10_001);
    assert!(arena.is_empty());
}

#[test]
fn test_deep_chain() {
    let mut arena = Arena::new();
    let root = alloc_object(&mut arena, &STRESS_BASE, None).unwrap();
    let mut parent = root;
    for _ in 0..50_000 {
        parent = alloc_object(&mut arena, &STRESS_LEAF, Some(parent)).unwrap();
    }

    assert_eq!(arena.total_blocks(root).unwrap(), 50_001);
    assert_eq!(arena.free(root).unwrap(), 50_001);
    assert!(arena.is_empty());
}

#[test]
fn test_arena_per_thread() {
    let handles: Vec<_> = (0..8)
        .map(|_| {
            thread::spawn(|| {
                let mut arena = Arena::new();
                let root = arena.new_context(None).unwrap();
                for _ in 0..1_000 {
                    let object = alloc_object(&mut arena, &STRESS_LEAF, Some(root)).unwrap();
                    let object = arena.object(object).unwrap();
                    assert_eq!(PING.of(object)(object), 2);
                }
                arena.free(root).unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 1_001);
    }
}

// ============================================================================
// Error channel load
// ============================================================================

#[test]
fn test_error_channels_under_load() {
    let handles: Vec<_> = (0..8)
        .map(|t| {
            thread::spawn(move || {
                for round in 0..500 {
                    report::clear_error();
                    let _ = raise_error!(ErrorCode::Generic, "thread {t} round {round}");
                    let _ = raise_error!(ErrorCode::KeyError, "context");
                    let (code, text) = report::current_error();
                    assert_eq!(code, ErrorCode::Generic);
                    assert!(text.contains(&format!("thread {t} round {round}\n")));
                }
                report::clear_error();
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}
