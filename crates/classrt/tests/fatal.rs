// Fatal error integration tests
//
// Runs with the panic fatal action so misuse can be observed without
// aborting the test process.

use classrt::config::{self, Config, FatalAction};
use classrt::prelude::*;

fn panic_on_fatal() {
    let _ = config::configure(Config {
        fatal_action: FatalAction::Panic,
        ..Config::default()
    });
    assert_eq!(config::config().fatal_action, FatalAction::Panic);
}

static SPEAK: Slot<fn(&Object) -> &'static str> = Slot::new("speak");
static UNDECLARED: Slot<fn(&Object)> = Slot::new("undeclared");

fn animal_virtuals(v: &mut VTableBuilder<'_>) {
    v.declare(&SPEAK);
}

classrt::class! {
    static ANIMAL: Animal(OBJECT) {
        layout: StateLayout::empty(),
        flags: ClassFlags::ABSTRACT,
        virtuals: animal_virtuals,
    }
}

classrt::class! {
    static PET: Pet(OBJECT) {
        layout: StateLayout::of::<String>(),
    }
}

// Drops the superclass state entirely.
classrt::class! {
    static STRAY: Stray(PET) {
        layout: StateLayout::empty(),
    }
}

classrt::class! {
    static ROBOT_PET: RobotPet(PET) {
        layout: StateLayout::of::<u64>(),
    }
}

static LOOP_A: Class = Class::new(
    "LoopA",
    "",
    &LOOP_B,
    ClassFlags::empty(),
    StateLayout::empty(),
    None,
);

static LOOP_B: Class = Class::new(
    "LoopB",
    "",
    &LOOP_A,
    ClassFlags::empty(),
    StateLayout::empty(),
    None,
);

#[test]
#[should_panic(expected = "Animal contains unimplemented functions.. is it an abstract class?")]
fn test_calling_abstract_slot_is_fatal() {
    panic_on_fatal();
    let animal = Object::instantiate(&ANIMAL);
    let _ = SPEAK.of(&animal);
}

#[test]
#[should_panic(expected = "contains unimplemented functions")]
fn test_calling_undeclared_slot_is_fatal() {
    panic_on_fatal();
    let animal = Object::instantiate(&ANIMAL);
    let _ = UNDECLARED.of(&animal);
}

#[test]
#[should_panic(expected = "does not reach the root class")]
fn test_cyclic_hierarchy_is_fatal() {
    panic_on_fatal();
    let _ = LOOP_A.initialize();
}

#[test]
#[should_panic(expected = "class Stray state () does not embed state")]
fn test_subclass_without_superclass_state_is_fatal() {
    panic_on_fatal();
    let _ = STRAY.initialize();
}

#[test]
#[should_panic(expected = "does not embed state")]
fn test_subclass_with_unrelated_state_is_fatal() {
    panic_on_fatal();
    let _ = Object::instantiate(&ROBOT_PET);
}

#[test]
fn test_try_of_is_not_fatal() {
    panic_on_fatal();
    let animal = Object::instantiate(&ANIMAL);
    assert!(SPEAK.try_of(&animal).is_err());
    assert!(!LOOP_B.is_initialized());
    assert!(PET.initialize().size() > 0);
}
