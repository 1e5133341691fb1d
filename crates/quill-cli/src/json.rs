//! JSON <-> value conversion
//!
//! JSON objects become string-keyed arrays, so keys that spell canonical
//! integers become integer keys. Arrays whose keys run 0..n render back as
//! JSON arrays; every other array renders as a JSON object.

use quill_value::{ArrayKey, ArrayValue, Slot, StringBuf, Value};
use serde_json::{Map, Number, Value as Json};
use std::collections::HashSet;

/// Build a value from parsed JSON
pub fn from_json(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::Str(StringBuf::literal(s)),
        Json::Array(items) => Value::Array(items.iter().map(from_json).collect()),
        Json::Object(map) => {
            let mut array = ArrayValue::with_capacity(map.len());
            for (key, value) in map {
                array.put(key.as_str(), from_json(value));
            }
            Value::Array(array)
        }
    }
}

/// Render a value as JSON
///
/// Objects are rendered as their fields. An object or reference already being
/// rendered higher up in the tree renders as `null`.
pub fn to_json(value: &Value) -> Json {
    Renderer::default().value(value)
}

#[derive(Default)]
struct Renderer {
    objects: HashSet<u64>,
    vars: HashSet<usize>,
}

impl Renderer {
    fn value(&mut self, value: &Value) -> Json {
        match value {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(d) => Number::from_f64(*d).map_or(Json::Null, Json::Number),
            Value::Str(s) => Json::String(s.to_string_lossy()),
            Value::Array(a) => {
                let members = self.members(a);
                let is_list = members
                    .iter()
                    .enumerate()
                    .all(|(i, (key, _))| key.as_int() == Some(i as i64));
                if is_list {
                    Json::Array(members.into_iter().map(|(_, v)| v).collect())
                } else {
                    into_map(members)
                }
            }
            Value::Object(o) => {
                if !self.objects.insert(o.id()) {
                    return Json::Null;
                }
                let fields = into_map(self.members(&o.fields()));
                self.objects.remove(&o.id());
                fields
            }
        }
    }

    fn members(&mut self, array: &ArrayValue) -> Vec<(ArrayKey, Json)> {
        let mut members = Vec::with_capacity(array.len());
        array.for_each_slot(|key, slot| {
            let json = match slot {
                Slot::Value(value) => self.value(value),
                Slot::Var(var) => {
                    if self.vars.insert(var.id()) {
                        let json = self.value(&var.get());
                        self.vars.remove(&var.id());
                        json
                    } else {
                        Json::Null
                    }
                }
            };
            members.push((key.clone(), json));
        });
        members
    }
}

fn into_map(members: Vec<(ArrayKey, Json)>) -> Json {
    let mut map = Map::with_capacity(members.len());
    for (key, json) in members {
        map.insert(key.to_string(), json);
    }
    Json::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_keys_are_normalized() {
        let value = from_json(&json!({"7": "seven", "07": "padded", "name": [1, 2.5, null]}));
        let array = value.as_array().unwrap();
        assert_eq!(array.get(7), Some(Value::from("seven")));
        assert_eq!(array.get("07"), Some(Value::from("padded")));
        let list = array.get("name").unwrap();
        assert_eq!(list.get_index(1), Some(Value::Float(2.5)));
    }

    #[test]
    fn test_lists_render_as_arrays() {
        let value = from_json(&json!([true, "x"]));
        assert_eq!(to_json(&value), json!([true, "x"]));

        let mut sparse = ArrayValue::new();
        sparse.put(1, "b");
        assert_eq!(to_json(&Value::Array(sparse)), json!({"1": "b"}));
    }

    #[test]
    fn test_non_finite_floats_render_as_null() {
        assert_eq!(to_json(&Value::Float(f64::INFINITY)), Json::Null);
    }

    #[test]
    fn test_self_referential_array_renders_null() {
        let value = quill_value::unserialize(b"a:2:{i:0;R:1;i:1;s:1:\"x\";}").unwrap();
        assert_eq!(to_json(&value), json!([[null, "x"], "x"]));
    }
}
