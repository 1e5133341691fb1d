//! `serialize()` wire format
//!
//! ```text
//! N;                          null
//! b:0;  b:1;                  boolean
//! i:<decimal>;                integer
//! d:<decimal>;                float (also INF, -INF, NAN)
//! s:<bytes>:"<raw bytes>";    string, length in bytes
//! U:<units>:"<utf-8>";        unicode string, length in UTF-16 units (decode only)
//! a:<n>:{<key><value>...}     array; keys are i: or s:
//! O:<len>:"<class>":<n>:{...} object with its fields
//! R:<slot>;                   reference to an earlier slot (shared cell)
//! r:<slot>;                   the value of an earlier slot (same object)
//! ```
//!
//! Slots number every serialized value (not keys) from 1 in document order.
//! `R:` entries take no slot; `r:` entries do.

use crate::array::ArrayValue;
use crate::config::{self, TextEncoding};
use crate::entry::Slot;
use crate::error::{ValueError, ValueResult};
use crate::key::ArrayKey;
use crate::numeric;
use crate::object::ObjectHandle;
use crate::string::{StringBuf, decode_bytes, encode_units};
use crate::value::Value;
use crate::var::Var;
use rustc_hash::{FxHashMap, FxHashSet};

/// Serialize a value
pub fn serialize(value: &Value) -> Vec<u8> {
    let mut serializer = Serializer::new();
    serializer.write_value(value);
    serializer.into_bytes()
}

/// Parse a complete serialized value
pub fn unserialize(input: &[u8]) -> ValueResult<Value> {
    Unserializer::new(input).read()
}

/// Encoder with the reference table of one document
pub struct Serializer {
    out: Vec<u8>,
    /// Last slot number handed out
    slot: usize,
    /// Cell id -> slot of its first occurrence
    vars: FxHashMap<usize, usize>,
    /// Unshared cells on the current path -> slot
    open: FxHashMap<usize, usize>,
    /// Object address -> slot of its first occurrence
    objects: FxHashMap<usize, usize>,
}

impl Serializer {
    /// Empty document
    pub fn new() -> Self {
        Self {
            out: Vec::with_capacity(64),
            slot: 0,
            vars: FxHashMap::default(),
            open: FxHashMap::default(),
            objects: FxHashMap::default(),
        }
    }

    /// Finish and take the encoded bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.out
    }

    fn write_int(&mut self, tag: u8, i: i64) {
        self.out.push(tag);
        self.out.push(b':');
        self.out
            .extend_from_slice(itoa::Buffer::new().format(i).as_bytes());
        self.out.push(b';');
    }

    fn write_len(&mut self, len: usize) {
        self.out
            .extend_from_slice(itoa::Buffer::new().format(len).as_bytes());
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.out.extend_from_slice(b"s:");
        self.write_len(bytes.len());
        self.out.extend_from_slice(b":\"");
        self.out.extend_from_slice(bytes);
        self.out.extend_from_slice(b"\";");
    }

    fn write_key(&mut self, key: &ArrayKey) {
        match key {
            ArrayKey::Int(i) => self.write_int(b'i', *i),
            ArrayKey::Str(s) => self.write_bytes(&StringBuf::Interned(s.clone()).bytes()),
        }
    }

    fn write_members(&mut self, members: &ArrayValue) {
        self.write_len(members.len());
        self.out.extend_from_slice(b":{");
        members.for_each_slot(|key, slot| {
            self.write_key(key);
            self.write_slot(slot);
        });
        self.out.push(b'}');
    }

    fn write_slot(&mut self, slot: &Slot) {
        match slot {
            Slot::Value(value) => self.write_value(value),
            Slot::Var(var) if var.handle_count() > 1 => {
                if let Some(&slot) = self.vars.get(&var.id()) {
                    self.write_int(b'R', slot as i64);
                } else {
                    self.vars.insert(var.id(), self.slot + 1);
                    self.write_value(&var.get());
                }
            }
            // A cell held only by its own contents still closes a cycle
            Slot::Var(var) => {
                if let Some(&slot) = self.open.get(&var.id()) {
                    self.write_int(b'R', slot as i64);
                    return;
                }
                self.open.insert(var.id(), self.slot + 1);
                self.write_value(&var.get());
                self.open.remove(&var.id());
            }
        }
    }

    /// Append one value (counts as one slot)
    pub fn write_value(&mut self, value: &Value) {
        self.slot += 1;
        match value {
            Value::Null => self.out.extend_from_slice(b"N;"),
            Value::Bool(b) => self.write_int(b'b', i64::from(*b)),
            Value::Int(i) => self.write_int(b'i', *i),
            Value::Float(d) => {
                self.out.extend_from_slice(b"d:");
                self.out
                    .extend_from_slice(numeric::format_double_exact(*d).as_bytes());
                self.out.push(b';');
            }
            Value::Str(s) => self.write_bytes(&s.bytes()),
            Value::Array(a) => {
                self.out.extend_from_slice(b"a:");
                self.write_members(a);
            }
            Value::Object(o) => {
                if let Some(&slot) = self.objects.get(&o.addr()) {
                    self.write_int(b'r', slot as i64);
                    return;
                }
                self.objects.insert(o.addr(), self.slot);
                let class = o.class_name();
                self.out.extend_from_slice(b"O:");
                self.write_len(class.len());
                self.out.extend_from_slice(b":\"");
                self.out.extend_from_slice(class.as_bytes());
                self.out.extend_from_slice(b"\":");
                self.write_members(&o.fields());
            }
        }
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoder over one document
///
/// Every decoded value is registered as a cell so that a later `R:` can bind
/// to it; cells nothing else refers to are unwrapped to plain values once the
/// document is complete.
pub struct Unserializer<'a> {
    input: &'a [u8],
    pos: usize,
    slots: Vec<Var>,
    max_depth: usize,
    unicode: bool,
    encoding: TextEncoding,
}

impl<'a> Unserializer<'a> {
    /// Decoder using the active configuration
    pub fn new(input: &'a [u8]) -> Self {
        let (max_depth, unicode, encoding) =
            config::with_active(|c| (c.max_depth, c.unicode_semantics, c.encoding));
        Self {
            input,
            pos: 0,
            slots: Vec::new(),
            max_depth,
            unicode,
            encoding,
        }
    }

    /// Decode the whole input as one value
    pub fn read(mut self) -> ValueResult<Value> {
        let result = self.read_document();
        if let Err(err) = &result {
            tracing::debug!(target: "quill::serialize", error = %err, "unserialize failed");
        }
        result
    }

    fn read_document(&mut self) -> ValueResult<Value> {
        let root = self.read_slot(0)?;
        if self.pos != self.input.len() {
            return Err(self.error("trailing data"));
        }
        self.slots.clear();

        let mut value = if root.handle_count() == 1 {
            root.take()
        } else {
            root.get()
        };
        unbind_value(&mut value, &mut FxHashSet::default());
        Ok(value)
    }

    fn error(&self, reason: &str) -> ValueError {
        ValueError::unserialize(self.pos, reason)
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn eat(&mut self, byte: u8) -> ValueResult<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    fn tag(&mut self) -> ValueResult<u8> {
        let tag = self.peek().ok_or_else(|| self.error("unexpected end of input"))?;
        self.pos += 1;
        Ok(tag)
    }

    /// Bytes up to (not including) `end`, consuming `end`
    fn until(&mut self, end: u8) -> ValueResult<&'a [u8]> {
        let input: &'a [u8] = self.input;
        let rest = &input[self.pos..];
        let len = rest
            .iter()
            .position(|&b| b == end)
            .ok_or_else(|| self.error(&format!("missing '{}'", end as char)))?;
        self.pos += len + 1;
        Ok(&rest[..len])
    }

    fn take(&mut self, len: usize) -> ValueResult<&'a [u8]> {
        let input: &'a [u8] = self.input;
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= input.len())
            .ok_or_else(|| self.error("length exceeds input"))?;
        let bytes = &input[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_i64(&mut self, end: u8) -> ValueResult<i64> {
        let start = self.pos;
        let digits = self.until(end)?;
        let text = std::str::from_utf8(digits).ok();
        text.and_then(|t| t.parse::<i64>().ok())
            .ok_or_else(|| ValueError::unserialize(start, "invalid integer"))
    }

    fn read_len(&mut self, end: u8) -> ValueResult<usize> {
        let start = self.pos;
        let len = self.read_i64(end)?;
        usize::try_from(len).map_err(|_| ValueError::unserialize(start, "negative length"))
    }

    fn read_f64(&mut self) -> ValueResult<f64> {
        let start = self.pos;
        let text = self.until(b';')?;
        match text {
            b"INF" => Ok(f64::INFINITY),
            b"-INF" => Ok(f64::NEG_INFINITY),
            b"NAN" => Ok(f64::NAN),
            _ => std::str::from_utf8(text)
                .ok()
                .and_then(|t| t.parse::<f64>().ok())
                .ok_or_else(|| ValueError::unserialize(start, "invalid float")),
        }
    }

    /// `<len>:"<bytes>"` after the tag and colon
    fn read_quoted(&mut self, terminator: u8) -> ValueResult<&'a [u8]> {
        let len = self.read_len(b':')?;
        self.eat(b'"')?;
        let bytes = self.take(len)?;
        self.eat(b'"')?;
        self.eat(terminator)?;
        Ok(bytes)
    }

    /// `<units>:"<utf-8>";`
    fn read_unicode(&mut self) -> ValueResult<Vec<u16>> {
        let units = self.read_len(b':')?;
        self.eat(b'"')?;
        let start = self.pos;
        let limit = units
            .saturating_mul(4)
            .saturating_add(start)
            .min(self.input.len());
        let window = &self.input[start..limit];
        let rest = std::str::from_utf8(window)
            .or_else(|err| std::str::from_utf8(&window[..err.valid_up_to()]));
        let rest = rest.map_err(|_| ValueError::unserialize(start, "invalid utf-8"))?;

        let mut out = Vec::with_capacity(units);
        let mut consumed = 0;
        for c in rest.chars() {
            if out.len() >= units {
                break;
            }
            let mut buf = [0u16; 2];
            out.extend_from_slice(c.encode_utf16(&mut buf));
            consumed += c.len_utf8();
        }
        if out.len() != units {
            return Err(ValueError::unserialize(start, "unicode length mismatch"));
        }
        self.pos += consumed;
        self.eat(b'"')?;
        self.eat(b';')?;
        Ok(out)
    }

    fn string_value(&self, bytes: &[u8]) -> StringBuf {
        if self.unicode {
            StringBuf::from_units(&decode_bytes(bytes, self.encoding))
        } else {
            StringBuf::from_bytes(bytes)
        }
    }

    fn unicode_value(&self, units: &[u16]) -> StringBuf {
        if self.unicode {
            StringBuf::from_units(units)
        } else {
            StringBuf::from(encode_units(units, self.encoding))
        }
    }

    fn slot_ref(&self, n: i64, at: usize) -> ValueResult<Var> {
        usize::try_from(n)
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| self.slots.get(i))
            .cloned()
            .ok_or_else(|| ValueError::unserialize(at, "reference to an unknown slot"))
    }

    fn read_key(&mut self) -> ValueResult<ArrayKey> {
        let at = self.pos;
        match self.tag()? {
            b'i' => {
                self.eat(b':')?;
                Ok(ArrayKey::Int(self.read_i64(b';')?))
            }
            b's' => {
                self.eat(b':')?;
                let bytes = self.read_quoted(b';')?;
                Ok(self.string_value(bytes).to_key())
            }
            b'U' => {
                self.eat(b':')?;
                let units = self.read_unicode()?;
                Ok(self.unicode_value(&units).to_key())
            }
            _ => Err(ValueError::unserialize(at, "invalid array key")),
        }
    }

    /// One value position: either an `R:` binding or a fresh slot
    fn read_slot(&mut self, depth: usize) -> ValueResult<Var> {
        if depth > self.max_depth {
            return Err(ValueError::recursion(self.max_depth));
        }
        if self.peek() == Some(b'R') {
            let at = self.pos;
            self.pos += 1;
            self.eat(b':')?;
            let n = self.read_i64(b';')?;
            return self.slot_ref(n, at);
        }

        let var = Var::default();
        self.slots.push(var.clone());
        let at = self.pos;
        let value = match self.tag()? {
            b'N' => {
                self.eat(b';')?;
                Value::Null
            }
            b'b' => {
                self.eat(b':')?;
                match self.read_i64(b';')? {
                    0 => Value::Bool(false),
                    1 => Value::Bool(true),
                    _ => return Err(ValueError::unserialize(at, "invalid boolean")),
                }
            }
            b'i' => {
                self.eat(b':')?;
                Value::Int(self.read_i64(b';')?)
            }
            b'd' => {
                self.eat(b':')?;
                Value::Float(self.read_f64()?)
            }
            b's' => {
                self.eat(b':')?;
                let bytes = self.read_quoted(b';')?;
                Value::Str(self.string_value(bytes))
            }
            b'U' => {
                self.eat(b':')?;
                let units = self.read_unicode()?;
                Value::Str(self.unicode_value(&units))
            }
            b'r' => {
                self.eat(b':')?;
                let n = self.read_i64(b';')?;
                self.slot_ref(n, at)?.get()
            }
            b'a' => {
                self.eat(b':')?;
                Value::Array(self.read_members(depth)?)
            }
            b'O' => {
                self.eat(b':')?;
                let class = self.read_quoted(b':')?;
                let object = ObjectHandle::new(&String::from_utf8_lossy(class));
                var.set(Value::Object(object.clone()));
                object.set_fields(self.read_members(depth)?);
                Value::Object(object)
            }
            _ => return Err(ValueError::unserialize(at, "unknown type tag")),
        };
        var.set(value);
        Ok(var)
    }

    /// `<n>:{<key><value>...}`
    fn read_members(&mut self, depth: usize) -> ValueResult<ArrayValue> {
        let count = self.read_len(b':')?;
        self.eat(b'{')?;
        let mut members = ArrayValue::with_capacity(count.min(1024));
        for _ in 0..count {
            let key = self.read_key()?;
            let var = self.read_slot(depth + 1)?;
            members.put_ref(key, var);
        }
        self.eat(b'}')?;
        Ok(members)
    }
}

/// Unwrap cells that only their own slot refers to
fn unbind_value(value: &mut Value, seen: &mut FxHashSet<usize>) {
    match value {
        Value::Array(a) => a.for_each_slot_mut(|_, slot| unbind_slot(slot, seen)),
        Value::Object(o) => {
            if seen.insert(o.addr()) {
                o.with_fields_mut(|fields| {
                    fields.for_each_slot_mut(|_, slot| unbind_slot(slot, seen));
                });
            }
        }
        _ => {}
    }
}

fn unbind_slot(slot: &mut Slot, seen: &mut FxHashSet<usize>) {
    match slot {
        Slot::Var(var) if var.handle_count() == 1 => {
            let mut value = var.take();
            unbind_value(&mut value, seen);
            *slot = Slot::Value(value);
        }
        Slot::Var(var) => {
            if seen.insert(var.id()) {
                var.with_mut(|value| unbind_value(value, seen));
            }
        }
        Slot::Value(value) => unbind_value(value, seen),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;

    fn encode(value: &Value) -> String {
        String::from_utf8(serialize(value)).unwrap()
    }

    fn decode(text: &str) -> Value {
        unserialize(text.as_bytes()).unwrap()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(encode(&Value::Null), "N;");
        assert_eq!(encode(&Value::Bool(true)), "b:1;");
        assert_eq!(encode(&Value::Int(-42)), "i:-42;");
        assert_eq!(encode(&Value::Float(0.5)), "d:0.5;");
        assert_eq!(encode(&Value::Float(100.0)), "d:100;");
        assert_eq!(encode(&Value::Float(f64::NEG_INFINITY)), "d:-INF;");
        assert_eq!(encode(&Value::from("h\u{e9}")), "s:3:\"h\u{e9}\";");
    }

    #[test]
    fn test_array_layout() {
        let mut a = ArrayValue::new();
        a.append("x");
        a.put("k", 1.5);
        assert_eq!(
            encode(&Value::Array(a)),
            "a:2:{i:0;s:1:\"x\";s:1:\"k\";d:1.5;}"
        );
    }

    #[test]
    fn test_decode_keys_keep_typing_and_order() {
        let value = decode("a:3:{s:1:\"b\";i:1;i:7;i:2;s:2:\"08\";i:3;}");
        let a = value.as_array().unwrap();
        let keys: Vec<ArrayKey> = a.iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![ArrayKey::string("b"), ArrayKey::Int(7), ArrayKey::string("08")]
        );
        assert!(a.get_raw(7).is_some_and(|slot| !slot.is_var()));
    }

    #[test]
    fn test_references_round_trip() {
        let shared = Var::new(Value::Int(1));
        let mut a = ArrayValue::new();
        a.put_ref(0, shared.clone());
        a.put_ref(1, shared);
        a.append(2);

        let bytes = serialize(&Value::Array(a));
        assert_eq!(String::from_utf8_lossy(&bytes), "a:3:{i:0;i:1;i:1;R:2;i:2;i:2;}");

        let decoded = unserialize(&bytes).unwrap();
        let decoded = decoded.as_array().unwrap();
        decoded.get_raw(0).unwrap().set(Value::Int(9));
        assert_eq!(decoded.get(1), Some(Value::Int(9)));
        assert!(!decoded.get_raw(2).unwrap().is_var());
    }

    #[test]
    fn test_objects_and_back_references() {
        let o = ObjectHandle::new("Point");
        o.set_field("x", 1);
        let mut a = ArrayValue::new();
        a.append(o.clone());
        a.append(o);

        let text = encode(&Value::Array(a));
        assert_eq!(text, "a:2:{i:0;O:5:\"Point\":1:{s:1:\"x\";i:1;}i:1;r:2;}");

        let decoded = decode(&text);
        let (Some(Value::Object(first)), Some(Value::Object(second))) =
            (decoded.get_index(0), decoded.get_index(1))
        else {
            panic!("expected objects");
        };
        assert!(first.ptr_eq(&second));
        assert_eq!(first.class_name(), "Point");
        assert_eq!(first.get_field("x"), Some(Value::Int(1)));
    }

    #[test]
    fn test_unicode_decode() {
        let value = decode("U:2:\"h\u{e9}\";");
        assert_eq!(value, Value::from("h\u{e9}"));

        let _guard = RuntimeConfig::default().with_unicode_semantics(true).install();
        let value = decode("U:2:\"h\u{e9}\";");
        assert_eq!(value, Value::Str(StringBuf::unicode("h\u{e9}")));
        let value = decode("s:3:\"h\u{e9}\";");
        assert_eq!(value, Value::Str(StringBuf::unicode("h\u{e9}")));
    }

    #[test]
    fn test_special_floats() {
        assert!(matches!(decode("d:NAN;"), Value::Float(d) if d.is_nan()));
        assert_eq!(decode("d:INF;"), Value::Float(f64::INFINITY));
        assert_eq!(decode("d:1.0E+25;"), Value::Float(1e25));
    }

    #[test]
    fn test_malformed_input() {
        let cases: &[(&str, usize)] = &[
            ("", 0),
            ("i:12", 2),
            ("s:9:\"abc\";", 5),
            ("b:2;", 0),
            ("a:1:{N;N;}", 5),
            ("x:1;", 0),
            ("R:3;", 0),
            ("N;N;", 2),
        ];
        for &(input, offset) in cases {
            match unserialize(input.as_bytes()) {
                Err(ValueError::Unserialize { offset: at, .. }) => {
                    assert_eq!(at, offset, "offset for {input:?}")
                }
                other => panic!("{input:?} decoded to {other:?}"),
            }
        }
    }

    #[test]
    fn test_depth_limit() {
        let _guard = RuntimeConfig::default().with_max_depth(2).install();
        assert!(unserialize(b"a:1:{i:0;a:1:{i:0;N;}}").is_ok());
        assert!(matches!(
            unserialize(b"a:1:{i:0;a:1:{i:0;a:1:{i:0;N;}}}"),
            Err(ValueError::Recursion { depth: 2 })
        ));
    }
}
