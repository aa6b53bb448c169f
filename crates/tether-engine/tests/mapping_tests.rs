//! Table mappings: field tags, nesting, methods and the standalone check

use proptest::prelude::*;
use tether_engine::vm::{Function, Table, Value, Vm, VmError};
use tether_engine::{
    ConversionErrorKind, Engine, EngineConfig, HostFn, Methods, TableMapping,
};

#[derive(Debug, Default, Clone, PartialEq, TableMapping)]
struct Profile {
    #[tether("name=login")]
    name: String,
    age: u32,
    #[tether("option")]
    email: Option<String>,
    tags: Vec<String>,
    #[tether("-")]
    cache: Vec<u8>,
}

#[derive(Debug, Default, TableMapping)]
struct Team {
    members: Vec<Profile>,
}

#[derive(Debug, Default, TableMapping)]
struct Limits {
    #[tether("option")]
    max: i64,
    #[tether("option")]
    ratio: Option<f64>,
}

#[derive(Debug, Default, Clone, PartialEq, TableMapping)]
struct Series {
    label: String,
    points: Vec<Option<i32>>,
}

#[derive(Debug, Default, TableMapping)]
struct Link {
    inner: Option<String>,
}

#[derive(Default, TableMapping)]
struct Hooks {
    label: String,
    on_change: HostFn<i32, ()>,
}

#[derive(Debug, Default, TableMapping)]
#[tether(standalone)]
struct Session {
    token: String,
}

#[derive(Debug, Default, TableMapping)]
struct Request {
    path: String,
    session: Session,
}

#[derive(Debug, Default, TableMapping)]
#[tether(methods = counter_methods)]
struct Counter {
    count: i64,
}

fn counter_methods() -> Methods<Counter> {
    Methods::new()
        .method("get", |c: &Counter| c.count)
        .method_mut("add", |c: &mut Counter, n: i64| {
            c.count += n;
            c.count
        })
}

fn engine() -> Engine {
    Engine::new(Vm::new())
}

// ============================================================================
// Encoding and decoding
// ============================================================================

proptest! {
    #[test]
    fn test_mapping_round_trip(
        name in "[a-z]{0,12}",
        age in any::<u32>(),
        email in proptest::option::of("[a-z]{1,8}@example\\.org"),
        tags in proptest::collection::vec("[a-z]{1,6}", 0..5),
    ) {
        let engine = engine();
        let profile = Profile { name, age, email, tags, cache: Vec::new() };
        let value = engine.encode(&profile).unwrap();
        let back: Profile = engine.decode(&value).unwrap();
        prop_assert_eq!(back, profile);
    }

    #[test]
    fn test_sequence_with_holes_round_trip(
        label in "[a-z]{0,8}",
        points in proptest::collection::vec(proptest::option::of(any::<i32>()), 0..12),
    ) {
        let engine = engine();
        let mut series = Series { label, points };
        let value = engine.encode(&series).unwrap();
        let back: Series = engine.decode(&value).unwrap();
        // a sequence ends at its last non-nil element
        while series.points.last() == Some(&None) {
            series.points.pop();
        }
        prop_assert_eq!(back, series);
    }
}

#[test]
fn test_sequence_holes_keep_positions() {
    let engine = engine();
    let series = Series {
        label: "gaps".to_string(),
        points: vec![Some(1), None, Some(3), None],
    };
    let value = engine.encode(&series).unwrap();
    let back: Series = engine.decode(&value).unwrap();
    assert_eq!(back.points, vec![Some(1), None, Some(3)]);

    let points = value.as_table().unwrap().get("points");
    let err = engine.decode::<Vec<i32>>(&points).unwrap_err();
    assert_eq!(err.path, "1");
    assert_eq!(err.to_string(), "decoding <1> fail: cannot convert nil to i32");
}

#[test]
fn test_untagged_option_field_is_required() {
    let engine = engine();
    let value = engine.encode(&Link { inner: None }).unwrap();
    assert!(value.as_table().unwrap().is_empty());
    let err = engine.decode::<Link>(&value).unwrap_err();
    assert_eq!(
        err.kind,
        ConversionErrorKind::FieldNotFound {
            field: "inner".to_string()
        }
    );

    let value = engine
        .encode(&Link {
            inner: Some("next".to_string()),
        })
        .unwrap();
    let back: Link = engine.decode(&value).unwrap();
    assert_eq!(back.inner.as_deref(), Some("next"));
}

#[test]
fn test_integer_field_bounds() {
    let engine = engine();
    let decode_max = |n: f64| {
        let table = Table::new();
        table.set("max", n);
        engine.decode::<Limits>(&Value::Table(table))
    };

    assert_eq!(decode_max(-9_223_372_036_854_775_808.0).unwrap().max, i64::MIN);
    assert_eq!(decode_max(1e18).unwrap().max, 1_000_000_000_000_000_000);
    for n in [9_223_372_036_854_775_808.0, -1.9e19, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let err = decode_max(n).unwrap_err();
        assert_eq!(err.path, "max");
        assert!(matches!(err.kind, ConversionErrorKind::TypeConvert { .. }));
    }

    let table = Table::new();
    table.set("login", "ada");
    table.set("age", 4_294_967_296.0);
    table.set("tags", Table::new());
    let err = engine.decode::<Profile>(&Value::Table(table)).unwrap_err();
    assert_eq!(err.path, "age");
    assert!(matches!(err.kind, ConversionErrorKind::TypeConvert { .. }));
}

#[test]
fn test_tags_shape_the_table() {
    let engine = engine();
    let profile = Profile {
        name: "ada".to_string(),
        age: 36,
        email: None,
        tags: vec!["math".to_string()],
        cache: vec![1, 2, 3],
    };
    let value = engine.encode(&profile).unwrap();
    let table = value.as_table().unwrap();
    assert_eq!(table.get("login"), Value::string("ada"));
    assert!(table.get("name").is_nil());
    assert!(table.get("email").is_nil());
    assert!(table.get("cache").is_nil());
    assert_eq!(table.get("age"), Value::Number(36.0));
}

#[test]
fn test_missing_required_field() {
    let engine = engine();
    let table = Table::new();
    table.set("login", "ada");
    let err = engine.decode::<Profile>(&Value::Table(table)).unwrap_err();
    assert_eq!(
        err.kind,
        ConversionErrorKind::FieldNotFound {
            field: "age".to_string()
        }
    );
    assert_eq!(err.to_string(), "decoding fail: field age not found");
}

#[test]
fn test_optional_fields_keep_existing_values() {
    let engine = engine();
    let mut limits = Limits {
        max: 5,
        ratio: Some(0.5),
    };
    engine
        .decode_into(&Value::Table(Table::new()), &mut limits)
        .unwrap();
    assert_eq!(limits.max, 5);
    assert_eq!(limits.ratio, Some(0.5));

    let table = Table::new();
    table.set("max", "12");
    engine.decode_into(&Value::Table(table), &mut limits).unwrap();
    assert_eq!(limits.max, 12);
}

#[test]
fn test_nested_error_path() {
    let engine = engine();
    let good = Table::new();
    good.set("login", "a");
    good.set("age", 1);
    good.set("tags", Table::new());
    let bad = Table::new();
    bad.set("login", "b");
    bad.set("age", "old");
    bad.set("tags", Table::new());
    let members = Table::new();
    members.push(good);
    members.push(bad);
    let team = Table::new();
    team.set("members", members);

    let err = engine.decode::<Team>(&Value::Table(team)).unwrap_err();
    assert_eq!(err.path, "members.1.age");
    assert_eq!(
        err.to_string(),
        "decoding <members.1.age> fail: cannot convert string to u32 (invalid digit found in string)"
    );
}

#[test]
fn test_not_a_table() {
    let engine = engine();
    let err = engine.decode::<Limits>(&Value::Number(1.0)).unwrap_err();
    assert!(matches!(err.kind, ConversionErrorKind::TypeConvert { .. }));
}

// ============================================================================
// Function fields
// ============================================================================

#[test]
fn test_function_fields_are_omitted() {
    let engine = engine();
    let hooks = Hooks {
        label: "h".to_string(),
        on_change: HostFn::new(|_| ()),
    };
    let value = engine.encode(&hooks).unwrap();
    let table = value.as_table().unwrap();
    assert_eq!(table.get("label"), Value::string("h"));
    assert!(table.get("on_change").is_nil());

    table.set("on_change", Function::new("f", |_| Ok(0)));
    let decoded: Hooks = engine.decode(&value).unwrap();
    assert_eq!(decoded.label, "h");
    assert!(!decoded.on_change.is_set());
}

#[test]
fn test_function_value_rejected() {
    let engine = engine();
    let err = engine.encode(&HostFn::<(), ()>::default()).unwrap_err();
    assert!(err.is_func_not_supported());
}

// ============================================================================
// Standalone mappings
// ============================================================================

#[test]
fn test_standalone_alone_is_fine() {
    let engine = engine();
    let session = Session {
        token: "t".to_string(),
    };
    assert!(engine.encode(&session).is_ok());
}

#[test]
fn test_standalone_nested_rejected() {
    let engine = engine();
    let request = Request {
        path: "/".to_string(),
        session: Session::default(),
    };
    let err = engine.encode(&request).unwrap_err();
    assert!(matches!(
        err.kind,
        ConversionErrorKind::StandaloneNested { .. }
    ));
    assert_eq!(err.path, "session");
}

#[test]
fn test_standalone_check_disabled() {
    let config = EngineConfig {
        reject_nested_standalone: false,
        ..EngineConfig::default()
    };
    let engine = Engine::with_config(Vm::new(), config);
    let value = engine.encode(&Request::default()).unwrap();
    let session = value.as_table().unwrap().get("session");
    assert!(session.as_table().is_some());
}

// ============================================================================
// Methods
// ============================================================================

#[test]
fn test_mapping_methods() {
    let engine = engine();
    let vm = engine.vm();
    let value = engine.encode(&Counter { count: 2 }).unwrap();

    let out = vm.call_method(&value, "add", &[Value::from(5)], Some(1)).unwrap();
    assert_eq!(out, vec![Value::Number(7.0)]);
    assert_eq!(value.as_table().unwrap().get("count"), Value::Number(7.0));

    let out = vm.call_method(&value, "get", &[], Some(1)).unwrap();
    assert_eq!(out, vec![Value::Number(7.0)]);
}

#[test]
fn test_method_table_is_shared() {
    let engine = engine();
    let a = engine.encode(&Counter::default()).unwrap();
    let b = engine.encode(&Counter::default()).unwrap();
    let mt_a = a.as_table().unwrap().metatable().unwrap();
    let mt_b = b.as_table().unwrap().metatable().unwrap();
    assert!(mt_a.ptr_eq(&mt_b));
}

#[test]
fn test_skip_methods() {
    let config = EngineConfig {
        skip_methods: true,
        ..EngineConfig::default()
    };
    let engine = Engine::with_config(Vm::new(), config);
    let value = engine.encode(&Counter::default()).unwrap();
    assert!(value.as_table().unwrap().metatable().is_none());
    let err = engine
        .vm()
        .call_method(&value, "get", &[], Some(1))
        .unwrap_err();
    assert!(matches!(err, VmError::NotCallable(_)));
}

#[test]
fn test_method_receiver_must_be_table() {
    let engine = engine();
    let value = engine.encode(&Counter::default()).unwrap();
    let get = engine.vm().get_field(&value, "get").unwrap();
    let err = engine.vm().call(&get, &[Value::Number(1.0)], None).unwrap_err();
    assert_eq!(
        err.to_string(),
        "bad argument #1 to 'get' (table expected, got number)"
    );
}
