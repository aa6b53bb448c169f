//! Class projection: registration, handles, field access and methods

use tether_engine::vm::{Value, Vm};
use tether_engine::{
    Class, ClassDescriptor, ClassSpec, ConversionErrorKind, Engine, Methods, Object,
    ACCESSOR_PREFIX,
};

#[derive(Debug, Class)]
#[tether(methods = point_methods)]
struct Point {
    x: f64,
    #[tether("name=Y")]
    y: f64,
    label: Option<String>,
    #[tether("-")]
    cache: Vec<u8>,
}

fn point_methods() -> Methods<Point> {
    Methods::new()
        .method("norm", |p: &Point| p.x.hypot(p.y))
        .method_mut("scale", |p: &mut Point, k: f64| {
            p.x *= k;
            p.y *= k;
        })
}

#[derive(Debug, Class)]
struct Marker {
    id: u32,
}

#[derive(Debug, Class)]
struct Unregistered {
    id: u32,
}

const POINT_UUID: &str = "6f1c2a3e-0b4d-4e59-9a7b-1c2d3e4f5a6b";
const MARKER_UUID: &str = "0d9e8f7a-6b5c-4d3e-8f1a-2b3c4d5e6f70";

fn point(x: f64, y: f64) -> Point {
    Point {
        x,
        y,
        label: None,
        cache: Vec::new(),
    }
}

fn engine() -> Engine {
    let engine = Engine::new(Vm::new());
    engine.define_class(
        ClassSpec::<Point>::new(POINT_UUID, "Point")
            .constructor(|x: f64, y: f64| Object::new(point(x, y))),
    );
    engine.define_class(ClassSpec::<Marker>::new(MARKER_UUID, "Marker"));
    engine
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn test_registration_bijection() {
    let engine = engine();
    let registry = engine.registry();
    assert_eq!(registry.len(), 2);
    assert!(registry.is_defined::<Point>());
    assert!(!registry.is_defined::<Unregistered>());

    let accessor = ClassDescriptor::accessor_name(POINT_UUID);
    assert!(accessor.starts_with(ACCESSOR_PREFIX));
    assert_eq!(accessor.len(), ACCESSOR_PREFIX.len() + 32);

    let descriptor = registry.lookup_accessor(&accessor).unwrap();
    assert_eq!(descriptor.name, "Point");
    assert_eq!(descriptor.type_id, std::any::TypeId::of::<Point>());
    assert_eq!(
        engine.vm().get_global(&accessor),
        Value::Table(descriptor.metatable.clone())
    );
    assert_eq!(descriptor.metatable.get("__name"), Value::string("Point"));
    assert_eq!(descriptor.metatable.get("__uuid"), Value::string(POINT_UUID));
}

#[test]
#[should_panic(expected = "already exists")]
fn test_duplicate_class_panics() {
    let engine = engine();
    engine.define_class(ClassSpec::<Point>::new(POINT_UUID, "Point"));
}

// ============================================================================
// Handles
// ============================================================================

#[test]
fn test_handle_identity_is_stable() {
    let engine = engine();
    let object = Object::new(point(1.0, 2.0));
    let a = engine.encode(&object).unwrap();
    let b = engine.encode(&object).unwrap();
    assert!(a.as_userdata().unwrap().ptr_eq(b.as_userdata().unwrap()));

    let decoded: Object<Point> = engine.decode(&a).unwrap();
    assert!(decoded.ptr_eq(&object));
}

#[test]
fn test_handle_recreated_after_release() {
    let engine = engine();
    let object = Object::new(point(1.0, 2.0));
    let first = engine.encode(&object).unwrap();
    drop(first);
    let second = engine.encode(&object).unwrap();
    let decoded: Object<Point> = engine.decode(&second).unwrap();
    assert!(decoded.ptr_eq(&object));
}

#[test]
fn test_class_mismatch() {
    let engine = engine();
    let marker = engine.encode(&Object::new(Marker { id: 1 })).unwrap();
    let err = engine.decode::<Object<Point>>(&marker).unwrap_err();
    assert_eq!(
        err.kind,
        ConversionErrorKind::ClassTypeMismatch {
            expected: "Point".to_string(),
            found: "Marker".to_string(),
        }
    );

    let err = engine.decode::<Object<Point>>(&Value::Number(1.0)).unwrap_err();
    assert_eq!(err.to_string(), "decoding fail: cannot convert number to Point");
}

#[test]
fn test_unregistered_class() {
    let engine = engine();
    let err = engine
        .encode(&Object::new(Unregistered { id: 0 }))
        .unwrap_err();
    assert!(matches!(
        err.kind,
        ConversionErrorKind::ClassNotRegistered { .. }
    ));
}

#[test]
fn test_bare_class_not_mappable() {
    let engine = engine();
    let err = engine.encode(&point(0.0, 0.0)).unwrap_err();
    assert!(matches!(
        err.kind,
        ConversionErrorKind::ObjectNotMappable { .. }
    ));
}

// ============================================================================
// Field access
// ============================================================================

#[test]
fn test_getter_and_setter() {
    let engine = engine();
    let vm = engine.vm();
    let object = Object::new(point(3.0, 4.0));
    let handle = engine.encode(&object).unwrap();

    assert_eq!(vm.get_field(&handle, "x").unwrap(), Value::Number(3.0));
    assert_eq!(vm.get_field(&handle, "Y").unwrap(), Value::Number(4.0));
    assert_eq!(vm.get_field(&handle, "label").unwrap(), Value::Nil);

    vm.set_field(&handle, "Y", 10.0).unwrap();
    vm.set_field(&handle, "label", "origin").unwrap();
    assert_eq!(object.borrow().y, 10.0);
    assert_eq!(object.borrow().label.as_deref(), Some("origin"));

    object.borrow_mut().x = -1.0;
    assert_eq!(vm.get_field(&handle, "x").unwrap(), Value::Number(-1.0));
}

#[test]
fn test_unknown_and_skipped_fields() {
    let engine = engine();
    let vm = engine.vm();
    let handle = engine.encode(&Object::new(point(0.0, 0.0))).unwrap();

    let err = vm.get_field(&handle, "y").unwrap_err();
    assert_eq!(err.to_string(), "element y not found.");
    let err = vm.get_field(&handle, "cache").unwrap_err();
    assert_eq!(err.to_string(), "element cache not found.");
    let err = vm.set_field(&handle, "z", 1).unwrap_err();
    assert_eq!(err.to_string(), "element z not found.");
    let err = vm.set_field(&handle, "norm", 1).unwrap_err();
    assert_eq!(err.to_string(), "method norm is not assignable.");
}

#[test]
fn test_setter_conversion_error() {
    let engine = engine();
    let vm = engine.vm();
    let handle = engine.encode(&Object::new(point(0.0, 0.0))).unwrap();
    let err = vm.set_field(&handle, "x", true).unwrap_err();
    assert_eq!(
        err.to_string(),
        "decoding <x> fail: cannot convert boolean to f64"
    );
}

#[test]
fn test_borrowed_instance_not_addressable() {
    let engine = engine();
    let vm = engine.vm();
    let object = Object::new(point(0.0, 0.0));
    let handle = engine.encode(&object).unwrap();

    let guard = object.borrow_mut();
    let err = vm.set_field(&handle, "x", 1.0).unwrap_err();
    assert!(err.to_string().contains("is not addressable"));
    let err = vm.get_field(&handle, "x").unwrap_err();
    assert!(err.to_string().contains("is not addressable"));
    drop(guard);

    vm.set_field(&handle, "x", 1.0).unwrap();
    assert_eq!(object.borrow().x, 1.0);
}

#[test]
fn test_accessor_rejects_foreign_receiver() {
    let engine = engine();
    let vm = engine.vm();
    let descriptor = engine
        .registry()
        .lookup(std::any::TypeId::of::<Point>())
        .unwrap();
    let index = descriptor.metatable.get("__index");
    let marker = engine.encode(&Object::new(Marker { id: 7 })).unwrap();

    let err = vm
        .call(&index, &[marker, Value::string("x")], Some(1))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "bad argument #1 to '__index' (Point expected, got Marker)"
    );
}

// ============================================================================
// Methods and statics
// ============================================================================

#[test]
fn test_method_dispatch() {
    let engine = engine();
    let vm = engine.vm();
    let object = Object::new(point(3.0, 4.0));
    let handle = engine.encode(&object).unwrap();

    let out = vm.call_method(&handle, "norm", &[], Some(1)).unwrap();
    assert_eq!(out, vec![Value::Number(5.0)]);

    let out = vm
        .call_method(&handle, "scale", &[Value::from(2)], None)
        .unwrap();
    assert!(out.is_empty());
    assert_eq!(object.borrow().x, 6.0);
    assert_eq!(vm.get_field(&handle, "Y").unwrap(), Value::Number(8.0));
}

#[test]
fn test_method_receiver_type_checked() {
    let engine = engine();
    let vm = engine.vm();
    let handle = engine.encode(&Object::new(point(3.0, 4.0))).unwrap();
    let norm = vm.get_field(&handle, "norm").unwrap();
    let err = vm.call(&norm, &[Value::Bool(false)], None).unwrap_err();
    assert_eq!(
        err.to_string(),
        "bad argument #1 to 'norm' (Point expected, got boolean)"
    );
}

#[test]
fn test_constructor() {
    let engine = engine();
    let vm = engine.vm();
    let accessor = vm.get_global(&ClassDescriptor::accessor_name(POINT_UUID));
    let new = vm.get_field(&accessor, "new").unwrap();
    let out = vm
        .call(&new, &[Value::from(6), Value::from(8)], Some(1))
        .unwrap();

    let object: Object<Point> = engine.decode(&out[0]).unwrap();
    assert_eq!(object.borrow().x, 6.0);
    let norm = vm.call_method(&out[0], "norm", &[], Some(1)).unwrap();
    assert_eq!(norm, vec![Value::Number(10.0)]);
}
