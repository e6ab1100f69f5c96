// Common fixtures for integration tests
//
// A small shape hierarchy:
//
//   Object
//   └── Shape (abstract, declares `area`, binds `describe`)
//       ├── Circle
//       └── Rectangle
//           └── Square
//
// Destructors record the order in which objects are destroyed.

#![allow(dead_code)]

use classrt::prelude::*;
use parking_lot::Mutex;
use std::f64::consts::PI;

#[derive(Clone, Default, Debug, PartialEq)]
pub struct ShapeState {
    pub label: String,
}

#[derive(Clone, Default, Debug, PartialEq)]
pub struct CircleState {
    pub shape: ShapeState,
    pub radius: f64,
}

impl Inherits for CircleState {
    type Base = ShapeState;

    fn base(&self) -> &ShapeState {
        &self.shape
    }

    fn base_mut(&mut self) -> &mut ShapeState {
        &mut self.shape
    }
}

#[derive(Clone, Default, Debug, PartialEq)]
pub struct RectangleState {
    pub shape: ShapeState,
    pub width: f64,
    pub height: f64,
}

impl Inherits for RectangleState {
    type Base = ShapeState;

    fn base(&self) -> &ShapeState {
        &self.shape
    }

    fn base_mut(&mut self) -> &mut ShapeState {
        &mut self.shape
    }
}

pub static AREA: Slot<fn(&Object) -> f64> = Slot::new("area");
pub static DESCRIBE: Slot<fn(&Object) -> String> = Slot::new("describe");
pub static SCALE: Slot<fn(&mut Object, f64)> = Slot::new("scale");

pub static SHAPE_CON: Slot<Constructor<&'static str>> =
    Slot::with_flags("Con", SlotFlags::CONSTRUCTOR);
pub static CIRCLE_CON: Slot<Constructor<(&'static str, f64)>> =
    Slot::with_flags("CircleCon", SlotFlags::CONSTRUCTOR);
pub static RECTANGLE_CON: Slot<Constructor<(&'static str, f64, f64)>> =
    Slot::with_flags("RectangleCon", SlotFlags::CONSTRUCTOR);
pub static SQUARE_CON: Slot<Constructor<(&'static str, f64)>> =
    Slot::with_flags("SquareCon", SlotFlags::CONSTRUCTOR);

/// Labels of destroyed shapes, in destruction order.
pub static DESTROYED: Mutex<Vec<String>> = Mutex::new(Vec::new());

fn shape_con(this: &mut Object, label: &'static str) -> classrt::Result<()> {
    if label.is_empty() {
        return Err(classrt::raise_error!(
            ErrorCode::InvalidParameter,
            "{} needs a label",
            this.name()
        ));
    }
    this.state_mut::<ShapeState>()?.label = label.to_string();
    Ok(())
}

fn shape_describe(this: &Object) -> String {
    let label = this
        .state::<ShapeState>()
        .map(|state| state.label.clone())
        .unwrap_or_default();
    format!("{} '{}' with area {:.3}", this.name(), label, AREA.of(this)(this))
}

fn shape_destructor(this: &mut Object) {
    let label = this
        .state::<ShapeState>()
        .map(|state| state.label.clone())
        .unwrap_or_default();
    DESTROYED.lock().push(label);
}

fn shape_virtuals(v: &mut VTableBuilder<'_>) {
    v.declare(&AREA)
        .declare(&SCALE)
        .set(&DESCRIBE, shape_describe)
        .set(&SHAPE_CON, shape_con)
        .set(&DESTRUCTOR, shape_destructor)
        .set_doc("Anything with an area.");
}

fn circle_con(this: &mut Object, (label, radius): (&'static str, f64)) -> classrt::Result<()> {
    SHAPE_CON.resolve_in(&SHAPE)?(this, label)?;
    if radius < 0.0 {
        return Err(classrt::raise_error!(
            ErrorCode::InvalidParameter,
            "negative radius {radius}"
        ));
    }
    this.state_mut::<CircleState>()?.radius = radius;
    Ok(())
}

fn circle_area(this: &Object) -> f64 {
    this.state::<CircleState>()
        .map_or(0.0, |state| PI * state.radius * state.radius)
}

fn circle_scale(this: &mut Object, factor: f64) {
    if let Ok(state) = this.state_mut::<CircleState>() {
        state.radius *= factor;
    }
}

fn circle_virtuals(v: &mut VTableBuilder<'_>) {
    v.set(&CIRCLE_CON, circle_con)
        .set(&AREA, circle_area)
        .set(&SCALE, circle_scale);
}

fn rectangle_con(
    this: &mut Object,
    (label, width, height): (&'static str, f64, f64),
) -> classrt::Result<()> {
    SHAPE_CON.resolve_in(&SHAPE)?(this, label)?;
    let state = this.state_mut::<RectangleState>()?;
    state.width = width;
    state.height = height;
    Ok(())
}

fn rectangle_area(this: &Object) -> f64 {
    this.state::<RectangleState>()
        .map_or(0.0, |state| state.width * state.height)
}

fn rectangle_scale(this: &mut Object, factor: f64) {
    if let Ok(state) = this.state_mut::<RectangleState>() {
        state.width *= factor;
        state.height *= factor;
    }
}

fn rectangle_virtuals(v: &mut VTableBuilder<'_>) {
    v.set(&RECTANGLE_CON, rectangle_con)
        .set(&AREA, rectangle_area)
        .set(&SCALE, rectangle_scale);
}

fn square_con(this: &mut Object, (label, side): (&'static str, f64)) -> classrt::Result<()> {
    RECTANGLE_CON.resolve_in(&RECTANGLE)?(this, (label, side, side))
}

fn square_describe(this: &Object) -> String {
    let inherited = DESCRIBE.resolve_in(&SHAPE).map(|describe| describe(this));
    format!("square: {}", inherited.unwrap_or_default())
}

fn square_virtuals(v: &mut VTableBuilder<'_>) {
    v.set(&SQUARE_CON, square_con)
        .set(&DESCRIBE, square_describe);
}

classrt::class! {
    /// Abstract base of all shapes.
    pub static SHAPE: Shape(OBJECT) {
        layout: StateLayout::of::<ShapeState>(),
        flags: ClassFlags::ABSTRACT,
        virtuals: shape_virtuals,
    }
}

classrt::class! {
    pub static CIRCLE: Circle(SHAPE) {
        layout: StateLayout::inherits::<CircleState>(),
        virtuals: circle_virtuals,
    }
}

classrt::class! {
    pub static RECTANGLE: Rectangle(SHAPE) {
        layout: StateLayout::inherits::<RectangleState>(),
        virtuals: rectangle_virtuals,
    }
}

classrt::class! {
    pub static SQUARE: Square(RECTANGLE) {
        layout: StateLayout::of::<RectangleState>(),
        virtuals: square_virtuals,
    }
}

/// Builds a circle owned by `owner`.
pub fn circle(arena: &mut Arena, owner: Option<Context>, label: &'static str, radius: f64) -> ObjectRef {
    construct(arena, &CIRCLE, &CIRCLE_CON, owner, (label, radius)).expect("circle constructed")
}

/// Builds a square owned by `owner`.
pub fn square(arena: &mut Arena, owner: Option<Context>, label: &'static str, side: f64) -> ObjectRef {
    construct(arena, &SQUARE, &SQUARE_CON, owner, (label, side)).expect("square constructed")
}

/// Calls `area` on an arena object.
pub fn area_of(arena: &Arena, object: ObjectRef) -> f64 {
    let object = arena.object(object).expect("live object");
    AREA.of(object)(object)
}

/// Returns `true` if `a` and `b` differ by less than 1e-9.
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
