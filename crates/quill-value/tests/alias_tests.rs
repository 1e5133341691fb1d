//! Reference cells, argument thunks and deep copies

use quill_value::{ArgValue, ArrayValue, CopyMap, ObjectHandle, ParamMode, Value, Var};

#[test]
fn test_alias_bind() {
    let a = Var::new(Value::Int(1));
    let b = a.clone();
    b.set(Value::Int(2));
    assert_eq!(a.get(), Value::Int(2));
    assert!(a.ptr_eq(&b));
}

#[test]
fn test_array_copy_preserves_references() {
    let mut a = ArrayValue::new();
    a.put("ref", 1);
    a.put("plain", 1);
    let cell = a.get_var("ref");

    let mut b = a.copy();
    b.put("ref", 2);
    b.put("plain", 2);

    assert_eq!(a.get("ref"), Some(Value::Int(2)));
    assert_eq!(cell.get(), Value::Int(2));
    assert_eq!(a.get("plain"), Some(Value::Int(1)));
}

#[test]
fn test_reference_into_nested_array() {
    let root = Var::new(Value::Null);
    let leaf = root.with_mut(|v| {
        v.ensure_array()
            .and_then(|a| a.get_array("config", |inner| inner.get_var("depth")))
            .unwrap_or_default()
    });
    leaf.set(Value::Int(3));

    let depth = root
        .get()
        .get_index("config")
        .and_then(|c| c.get_index("depth"));
    assert_eq!(depth, Some(Value::Int(3)));
}

#[test]
fn test_thunk_follows_parameter_mode() {
    let args = Var::new(Value::Null);
    let thunk = ArgValue::index(&args, "opts").then_index("verbose");

    assert_eq!(thunk.resolve(ParamMode::ByValue).value(), Value::Null);
    assert_eq!(args.get(), Value::Null);

    let bound = thunk.resolve(ParamMode::ByRef);
    bound.as_var().unwrap().set(Value::Bool(true));
    assert_eq!(thunk.to_value(), Value::Bool(true));
    assert_eq!(
        args.get().get_index("opts").and_then(|o| o.get_index("verbose")),
        Some(Value::Bool(true))
    );
}

#[test]
fn test_thunk_sees_current_container() {
    let arr: ArrayValue = [1, 2].into_iter().map(Value::from).collect();
    let arr = Var::new(Value::Array(arr));
    let thunk = ArgValue::index(&arr, 1i64);
    assert_eq!(thunk.to_local_value(), Value::Int(2));

    arr.set(Value::Null);
    assert_eq!(thunk.to_local_value(), Value::Null);
}

#[test]
fn test_field_thunk_on_object() {
    let this = Var::new(Value::Object(ObjectHandle::new("Counter")));
    let thunk = ArgValue::field(&this, "hits");
    let hits = thunk.to_local_var_decl_as_ref();
    hits.set(Value::Int(1));
    hits.set(hits.get().increment(1));

    let Value::Object(o) = this.get() else {
        panic!("expected object");
    };
    assert_eq!(o.get_field("hits"), Some(Value::Int(2)));
}

#[test]
fn test_deep_copy_is_independent() {
    let inner: ArrayValue = [1].into_iter().map(Value::from).collect();
    let mut outer = ArrayValue::new();
    outer.put("inner", Value::Array(inner));
    let shared = outer.get_var("inner");
    outer.put_ref("alias", shared);

    let copy = Value::Array(outer.clone()).deep_copy(&mut CopyMap::new());
    let copy = copy.as_array().unwrap();
    copy.get_raw("alias").unwrap().set(Value::Int(0));

    assert_eq!(copy.get("inner"), Some(Value::Int(0)));
    assert!(matches!(outer.get("inner"), Some(Value::Array(_))));
}
