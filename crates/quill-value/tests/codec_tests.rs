//! Serialization codec: wire layout, decoding and round trips

use proptest::prelude::*;
use quill_value::{
    ArrayKey, ArrayValue, ObjectHandle, StringBuf, Value, ValueError, Var, serialize, unserialize,
};
use std::cmp::Ordering;

fn wire(value: &Value) -> String {
    String::from_utf8(serialize(value)).unwrap()
}

#[test]
fn test_nested_array_layout() {
    let mut inner = ArrayValue::new();
    inner.put("on", true);
    let mut outer = ArrayValue::new();
    outer.append(Value::Null);
    outer.put("cfg", Value::Array(inner));
    outer.put(-3, 2.25);

    assert_eq!(
        wire(&Value::Array(outer)),
        "a:3:{i:0;N;s:3:\"cfg\";a:1:{s:2:\"on\";b:1;}i:-3;d:2.25;}"
    );
}

#[test]
fn test_string_length_counts_bytes() {
    assert_eq!(wire(&Value::from("\u{65e5}\u{672c}")), "s:6:\"\u{65e5}\u{672c}\";");
    let unicode = Value::Str(StringBuf::unicode("\u{65e5}\u{672c}"));
    assert_eq!(wire(&unicode), "s:6:\"\u{65e5}\u{672c}\";");
}

#[test]
fn test_decoded_key_types() {
    let value = unserialize(b"a:2:{s:1:\"5\";s:3:\"int\";s:2:\"05\";s:3:\"str\";}").unwrap();
    let array = value.as_array().unwrap();
    let keys: Vec<ArrayKey> = array.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![ArrayKey::Int(5), ArrayKey::string("05")]);
}

#[test]
fn test_self_reference_round_trip() {
    let cell = Var::new(Value::Null);
    let mut a = ArrayValue::new();
    a.put_ref("me", cell.clone());
    a.put("n", 1);
    cell.set(Value::Array(a.copy()));

    let bytes = serialize(&cell.get());
    let decoded = unserialize(&bytes).unwrap();
    let decoded = decoded.as_array().unwrap();
    let me = decoded.get_raw("me").unwrap();
    assert!(me.is_var());
    let inner = me.get();
    assert_eq!(inner.get_index("n"), Some(Value::Int(1)));
}

#[test]
fn test_shared_object_round_trip() {
    let o = ObjectHandle::new("Node");
    o.set_field("name", "root");
    o.set_field("self", o.clone());

    let decoded = unserialize(&serialize(&Value::Object(o))).unwrap();
    let Value::Object(root) = decoded else {
        panic!("expected object");
    };
    assert_eq!(root.class_name(), "Node");
    let Some(Value::Object(inner)) = root.get_field("self") else {
        panic!("expected nested object");
    };
    assert!(inner.ptr_eq(&root));
    root.unset_field("self");
}

#[test]
fn test_errors_carry_offsets() {
    let err = unserialize(b"a:1:{i:0;i:1;").unwrap_err();
    assert!(matches!(err, ValueError::Unserialize { offset: 13, .. }), "{err}");

    let err = unserialize(b"i:1;junk").unwrap_err();
    assert!(matches!(err, ValueError::Unserialize { offset: 4, .. }), "{err}");
}

#[test]
fn test_cycle_through_unshared_cell() {
    let cell = Var::new(Value::Null);
    cell.with_mut(|v| {
        if let Some(array) = v.ensure_array() {
            array.put_ref(0, cell.clone());
        }
    });
    let root = cell.get();
    drop(cell);

    let bytes = serialize(&root);
    assert_eq!(String::from_utf8(bytes.clone()).unwrap(), "a:1:{i:0;a:1:{i:0;R:2;}}");

    let decoded = unserialize(&bytes).unwrap();
    let inner = decoded.get_index(0).unwrap();
    let slot = inner.as_array().unwrap().get_raw(0).unwrap();
    assert!(slot.is_var());
    assert_eq!(serialize(&decoded), bytes);
}

#[test]
fn test_decoded_self_reference_re_encodes() {
    let value = unserialize(b"a:1:{i:0;R:1;}").unwrap();
    assert_eq!(wire(&value), "a:1:{i:0;a:1:{i:0;R:2;}}");
}

#[test]
fn test_compare_self_referential_arrays() {
    let value = unserialize(b"a:1:{i:0;R:1;}").unwrap();
    assert!(value.loose_eq(&value.clone()));
    assert!(value.strict_eq(&value.clone()));
    assert_eq!(value.loose_cmp(&value.clone()), Ordering::Equal);

    let other = unserialize(b"a:1:{i:0;R:1;}").unwrap();
    assert!(!value.loose_eq(&other));
    assert!(!value.strict_eq(&other));
    assert_eq!(value.compare(&other, Ordering::Less), Ordering::Less);
    assert_eq!(value.compare(&other, Ordering::Greater), Ordering::Greater);
}

fn value_tree() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        any::<f64>()
            .prop_filter("finite", |d| d.is_finite())
            .prop_map(Value::Float),
        prop::collection::vec(any::<u8>(), 0..12)
            .prop_map(|bytes| Value::Str(StringBuf::from_bytes(&bytes))),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop::collection::vec((prop_oneof![
            any::<i64>().prop_map(ArrayKey::Int),
            "[a-z0-9]{0,4}".prop_map(|s| ArrayKey::string(&s)),
        ], inner), 0..6)
            .prop_map(|pairs| {
                let mut array = ArrayValue::new();
                for (key, value) in pairs {
                    array.put(key, value);
                }
                Value::Array(array)
            })
    })
}

proptest! {
    #[test]
    fn prop_round_trip(value in value_tree()) {
        let bytes = serialize(&value);
        let decoded = unserialize(&bytes).unwrap();
        prop_assert_eq!(&decoded, &value);
        prop_assert_eq!(serialize(&decoded), bytes);
    }
}
