//! Array semantics through the public API
//!
//! Covers key normalization, tail keys, insertion order and copy-on-write
//! independence, including property tests over random edit sequences.

use proptest::prelude::*;
use quill_value::{ArrayKey, ArrayValue, ConstArray, StringBuf, Value};

fn keys(array: &ArrayValue) -> Vec<ArrayKey> {
    array.iter().map(|(k, _)| k).collect()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_append_from_empty() {
    let mut a = ArrayValue::new();
    a.append("a");
    a.append("b");
    assert_eq!(keys(&a), vec![ArrayKey::Int(0), ArrayKey::Int(1)]);
    assert_eq!(a.values(), ["a", "b"].into_iter().map(Value::from).collect());
}

#[test]
fn test_tail_key_recomputed_after_removing_max() {
    let mut a: ArrayValue = ["a", "b"].into_iter().map(Value::from).collect();
    assert_eq!(a.remove(1), Some(Value::from("b")));
    assert_eq!(a.append("c"), ArrayKey::Int(1));
    assert_eq!(a.get(1), Some(Value::from("c")));
}

#[test]
fn test_copy_does_not_see_new_keys() {
    let a: ArrayValue = [1, 2].into_iter().map(Value::from).collect();
    let mut b = a.copy();
    b.put("x", "y");
    assert!(!a.contains_key("x"));
    assert!(b.contains_key("x"));
}

#[test]
fn test_binary_five_equals_int_five() {
    let five = Value::Str(StringBuf::from("5"));
    assert!(five.loose_eq(&Value::Int(5)));
    assert!(!five.strict_eq(&Value::Int(5)));
}

#[test]
fn test_key_normalization() {
    let mut a = ArrayValue::new();
    a.put("8", "string eight");
    assert_eq!(a.get(8), Some(Value::from("string eight")));
    a.put(8, "int eight");
    assert_eq!(a.len(), 1);

    a.put("08", "padded");
    assert_eq!(a.len(), 2);
    assert_ne!(a.get("08"), a.get(8));
    assert_eq!(keys(&a), vec![ArrayKey::Int(8), ArrayKey::string("08")]);
}

#[test]
fn test_overwrite_keeps_position() {
    let mut a = ArrayValue::new();
    a.put("k1", 1);
    a.put(2, 2);
    a.put("k3", 3);
    a.put(2, 20);
    assert_eq!(
        keys(&a),
        vec![ArrayKey::string("k1"), ArrayKey::Int(2), ArrayKey::string("k3")]
    );
    assert_eq!(a.get(2), Some(Value::Int(20)));
}

#[test]
fn test_growth_past_hash_threshold() {
    let mut a = ArrayValue::new();
    for i in 0..1000 {
        a.put(format!("key{i}").as_str(), i);
    }
    assert_eq!(a.len(), 1000);
    for i in (0..1000).step_by(7) {
        assert_eq!(a.get(format!("key{i}").as_str()), Some(Value::Int(i)));
    }
    for i in 0..500 {
        a.remove(format!("key{i}").as_str());
    }
    assert_eq!(a.len(), 500);
    assert_eq!(a.iter().next().map(|(k, _)| k), Some(ArrayKey::string("key500")));
}

#[test]
fn test_splice_by_position() {
    let mut a: ArrayValue = [10, 20, 30, 40].into_iter().map(Value::from).collect();
    a.put("s", 50);
    let replacement: ArrayValue = [99].into_iter().map(Value::from).collect();

    let removed = a.splice(1, 3, Some(&replacement));
    assert_eq!(removed.values(), [20, 30].into_iter().map(Value::from).collect());
    let values: Vec<Value> = a.iter().map(|(_, v)| v).collect();
    assert_eq!(
        values,
        vec![Value::Int(10), Value::Int(99), Value::Int(40), Value::Int(50)]
    );
    assert!(a.contains_key("s"));
}

#[test]
fn test_shared_cursor() {
    let mut a: ArrayValue = [1, 2, 3].into_iter().map(Value::from).collect();
    assert_eq!(a.current(), Some(Value::Int(1)));
    assert_eq!(a.next(), Some(Value::Int(2)));
    assert_eq!(a.key(), Some(ArrayKey::Int(1)));
    assert_eq!(a.end(), Some(Value::Int(3)));
    assert_eq!(a.next(), None);
    assert!(!a.has_current());
    assert_eq!(a.reset(), Some(Value::Int(1)));
}

#[test]
fn test_const_array_forks_on_write() {
    let mut source = ArrayValue::new();
    source.put("name", "quill");
    source.append(1);
    let constant = ConstArray::freeze(&source).unwrap();

    let shared = ArrayValue::from_const(constant.clone());
    let mut private = ArrayValue::from_const(constant.clone());
    private.put("name", "fork");

    assert!(shared.is_const());
    assert!(!private.is_const());
    assert_eq!(shared.get("name"), Some(Value::from("quill")));
    assert_eq!(constant.to_array().get("name"), Some(Value::from("quill")));
    assert_eq!(private.get("name"), Some(Value::from("fork")));
}

// ============================================================================
// Properties
// ============================================================================

#[derive(Debug, Clone)]
enum Edit {
    Put(i64, i64),
    PutStr(String, i64),
    Append(i64),
    Remove(i64),
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (0i64..16, any::<i64>()).prop_map(|(k, v)| Edit::Put(k, v)),
        ("[a-z]{1,3}", any::<i64>()).prop_map(|(k, v)| Edit::PutStr(k, v)),
        any::<i64>().prop_map(Edit::Append),
        (0i64..16).prop_map(Edit::Remove),
    ]
}

fn apply(array: &mut ArrayValue, edit: &Edit) {
    match edit {
        Edit::Put(k, v) => array.put(*k, *v),
        Edit::PutStr(k, v) => array.put(k.as_str(), *v),
        Edit::Append(v) => {
            array.append(*v);
        }
        Edit::Remove(k) => {
            array.remove(*k);
        }
    }
}

proptest! {
    #[test]
    fn prop_copy_is_independent(
        setup in prop::collection::vec(edit(), 0..24),
        edits in prop::collection::vec(edit(), 1..24),
    ) {
        let mut a = ArrayValue::new();
        for e in &setup {
            apply(&mut a, e);
        }
        let before = a.entries();

        let mut b = a.copy();
        for e in &edits {
            apply(&mut b, e);
        }
        prop_assert_eq!(a.entries(), before.clone());

        let b_before = b.entries();
        let mut c = b.copy();
        for e in &setup {
            apply(&mut a, e);
        }
        for e in &edits {
            apply(&mut c, e);
        }
        prop_assert_eq!(b.entries(), b_before);
    }

    #[test]
    fn prop_insertion_order(names in prop::collection::btree_set("[a-z]{1,4}", 1..32)) {
        let names: Vec<String> = names.into_iter().collect();
        let mut a = ArrayValue::new();
        for (i, name) in names.iter().enumerate() {
            a.put(name.as_str(), i as i64);
        }
        let middle = &names[names.len() / 2];
        a.put(middle.as_str(), -1);

        let expected: Vec<ArrayKey> = names.iter().map(|n| ArrayKey::string(n)).collect();
        prop_assert_eq!(keys(&a), expected);
        prop_assert_eq!(a.get(middle.as_str()), Some(Value::Int(-1)));
    }
}
