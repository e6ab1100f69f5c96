// Dispatch integration tests
//
// Virtual calls, overrides and explicit calls to an ancestor's method on the
// shape hierarchy from `common`.

mod common;

use classrt::prelude::*;
use classrt::runtime::{abstract_slots, class_from_name, class_hierarchy};
use classrt::Error;
use common::{
    AREA, CIRCLE, DESCRIBE, RECTANGLE, SCALE, SHAPE, SQUARE, approx_eq, area_of, circle, square,
};
use std::ptr;

#[test]
fn test_circle_area() {
    let mut arena = Arena::new();
    let c = circle(&mut arena, None, "unit-ish", 2.0);

    let area = area_of(&arena, c);
    assert!((area - 12.566).abs() < 1e-3, "area was {area}");

    let object = arena.object(c).unwrap();
    assert!(is_subclass(object, &SHAPE));
    assert!(!is_instance(object, &SHAPE));
    assert!(is_instance(object, &CIRCLE));
}

#[test]
fn test_rectangle_and_square() {
    let mut arena = Arena::new();
    let rect = construct(
        &mut arena,
        &RECTANGLE,
        &common::RECTANGLE_CON,
        None,
        ("rect", 3.0, 4.0),
    )
    .unwrap();
    let sq = square(&mut arena, None, "sq", 5.0);

    assert!(approx_eq(area_of(&arena, rect), 12.0));
    assert!(approx_eq(area_of(&arena, sq), 25.0));

    let object = arena.object(sq).unwrap();
    assert!(is_subclass(object, &RECTANGLE));
    assert!(is_subclass(object, &SHAPE));
    assert!(is_subclass(object, &OBJECT));
    assert!(!is_subclass(object, &CIRCLE));
}

#[test]
fn test_inherited_method_dispatches_virtually() {
    let mut arena = Arena::new();
    let c = circle(&mut arena, None, "wheel", 1.0);
    let object = arena.object(c).unwrap();

    // `describe` is bound once on Shape and calls `area` virtually.
    let text = DESCRIBE.of(object)(object);
    assert_eq!(text, "Circle 'wheel' with area 3.142");
}

#[test]
fn test_override_reaches_ancestor_method() {
    let mut arena = Arena::new();
    let sq = square(&mut arena, None, "tile", 2.0);
    let object = arena.object(sq).unwrap();

    assert_eq!(DESCRIBE.of(object)(object), "square: Square 'tile' with area 4.000");

    let shape_describe = DESCRIBE.resolve_in(&SHAPE).unwrap();
    assert_eq!(shape_describe(object), "Square 'tile' with area 4.000");
}

#[test]
fn test_mutating_method() {
    let mut arena = Arena::new();
    let c = circle(&mut arena, None, "growing", 1.0);

    let object = arena.object_mut(c).unwrap();
    let scale = SCALE.of(object);
    scale(object, 3.0);

    assert!(approx_eq(
        arena.object(c).unwrap().state::<common::CircleState>().unwrap().radius,
        3.0
    ));
}

#[test]
fn test_abstract_slot_is_unimplemented() {
    let mut arena = Arena::new();
    let shape = alloc_object(&mut arena, &SHAPE, None).unwrap();
    let object = arena.object(shape).unwrap();

    assert!(matches!(
        AREA.try_of(object),
        Err(Error::Unimplemented { class: "Shape", slot: "area" })
    ));
    assert_eq!(abstract_slots(&SHAPE), ["area", "scale"]);
    assert!(abstract_slots(&CIRCLE).is_empty());
}

#[test]
fn test_vtables_extend_superclass() {
    for (class, superclass) in [
        (&SHAPE, &OBJECT),
        (&CIRCLE, &SHAPE),
        (&RECTANGLE, &SHAPE),
        (&SQUARE, &RECTANGLE),
    ] {
        let data = class.initialize();
        assert!(ptr::eq(data.superclass(), superclass));
        assert!(class.vtable().extends(superclass.vtable()), "{class} does not extend {superclass}");
    }

    // Inherited bindings are shared, overridden ones are replaced in place.
    let rect = RECTANGLE.vtable().entry(&AREA).unwrap();
    let sq = SQUARE.vtable().entry(&AREA).unwrap();
    assert!(rect.same_binding(sq));

    let shape = SHAPE.vtable().entry(&DESCRIBE).unwrap();
    let sq = SQUARE.vtable().entry(&DESCRIBE).unwrap();
    assert!(!shape.same_binding(sq));
    assert!(ptr::eq(sq.declared_in(), &SHAPE));
    assert!(sq.bound_in().is_some_and(|class| ptr::eq(class, &SQUARE)));
}

#[test]
fn test_initialization_is_idempotent() {
    let first = SQUARE.initialize();
    let before = first.vtable().clone();

    for _ in 0..10 {
        assert!(ptr::eq(SQUARE.initialize(), first));
    }
    assert_eq!(SQUARE.vtable(), &before);
}

#[test]
fn test_class_metadata() {
    assert_eq!(SHAPE.name(), "Shape");
    assert!(SHAPE.is_abstract());
    SHAPE.initialize();
    assert_eq!(SHAPE.doc(), "Anything with an area.");
    assert_eq!(CIRCLE.doc(), "");

    let names: Vec<_> = class_hierarchy(&SQUARE).into_iter().map(|c| c.name()).collect();
    assert_eq!(names, ["Square", "Rectangle", "Shape", "Object"]);

    CIRCLE.initialize();
    assert!(class_from_name("Circle").is_some_and(|class| ptr::eq(class, &CIRCLE)));
    assert!(CIRCLE.size() > SHAPE.size());
}
