//! Dynamically typed values
//!
//! [`Value`] is the closed set of guest-language values. Every conversion is
//! total: incompatible inputs fall back to `0`, `0.0`, `false` or `""` and
//! never fail. Comparison and arithmetic follow the loose typing rules of the
//! guest language:
//!
//! - a boolean or null operand reduces both sides to booleans
//!   (except `null` against a string, which compares as `""`),
//! - numbers and numeric strings compare numerically,
//! - a non-numeric string against a number is converted to a number
//!   (`"abc" == 0`),
//! - two non-numeric strings compare by content.

use crate::array::ArrayValue;
use crate::key::{ArrayKey, IntoArrayKey};
use crate::numeric;
use crate::object::ObjectHandle;
use crate::string::{InternedString, StringBuf, StringWidth, well_known};
use crate::var::Var;
use std::cmp::Ordering;

/// Classification driving comparison dispatch
///
/// Strings are pre-classified as `LongCmp`/`DoubleCmp` when their whole
/// content is a numeric literal, so comparisons need not rescan them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Null
    Null,
    /// Boolean
    Bool,
    /// Integer
    Long,
    /// String holding an integer literal
    LongCmp,
    /// Float
    Double,
    /// String holding a float literal (or an integer too large for `i64`)
    DoubleCmp,
    /// Non-numeric string
    String,
    /// Array
    Array,
    /// Object
    Object,
}

impl ValueType {
    /// Compares numerically against other numeric types
    pub fn is_number_cmp(self) -> bool {
        matches!(
            self,
            ValueType::Long | ValueType::LongCmp | ValueType::Double | ValueType::DoubleCmp
        )
    }

    /// Compares as an integer
    pub fn is_long_cmp(self) -> bool {
        matches!(self, ValueType::Long | ValueType::LongCmp)
    }

    /// Is an actual number (not a numeric string)
    pub fn is_number(self) -> bool {
        matches!(self, ValueType::Long | ValueType::Double)
    }

    /// Both operands add as integers
    pub fn is_long_add(self, other: ValueType) -> bool {
        self.is_long_cmp() && other.is_long_cmp()
    }
}

/// A guest-language value
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// Null
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// String (binary or unicode)
    Str(StringBuf),
    /// Ordered associative array
    Array(ArrayValue),
    /// Object handle (shared by identity)
    Object(ObjectHandle),
}

impl Value {
    /// Comparison classification
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Long,
            Value::Float(_) => ValueType::Double,
            Value::Str(s) => s.value_type(),
            Value::Array(_) => ValueType::Array,
            Value::Object(_) => ValueType::Object,
        }
    }

    /// Type name as reported by `gettype()`
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "double",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Check if null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this is a number or a numeric string
    pub fn is_numeric(&self) -> bool {
        match self {
            Value::Int(_) | Value::Float(_) => true,
            Value::Str(s) => s.is_numeric(),
            _ => false,
        }
    }

    /// `empty()` semantics: everything that converts to `false`
    pub fn is_empty(&self) -> bool {
        !self.to_bool()
    }

    /// Borrow as an array
    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Borrow as a string
    pub fn as_str(&self) -> Option<&StringBuf> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    // Conversions

    /// Truthiness
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(d) => *d != 0.0,
            Value::Str(s) => s.to_bool(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(_) => true,
        }
    }

    /// Integer value (floats truncate and saturate, NaN is 0)
    pub fn to_long(&self) -> i64 {
        match self {
            Value::Null => 0,
            Value::Bool(b) => i64::from(*b),
            Value::Int(i) => *i,
            Value::Float(d) => numeric::double_to_long(*d),
            Value::Str(s) => s.to_long(),
            Value::Array(a) => i64::from(!a.is_empty()),
            Value::Object(_) => 1,
        }
    }

    /// Float value
    pub fn to_double(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Int(i) => *i as f64,
            Value::Float(d) => *d,
            Value::Str(s) => s.to_double(),
            Value::Array(a) => f64::from(u8::from(!a.is_empty())),
            Value::Object(_) => 1.0,
        }
    }

    /// Integer or float, whichever the value reads as
    ///
    /// Strings become integers when their numeric prefix is integral.
    pub fn to_number(&self) -> Value {
        match self {
            Value::Int(_) | Value::Float(_) => self.clone(),
            Value::Str(s) => match s.value_type() {
                ValueType::LongCmp => Value::Int(s.to_long()),
                ValueType::DoubleCmp => Value::Float(s.to_double()),
                _ => {
                    let (long, double) = (s.to_long(), s.to_double());
                    if long as f64 == double {
                        Value::Int(long)
                    } else {
                        Value::Float(double)
                    }
                }
            },
            _ => Value::Int(self.to_long()),
        }
    }

    /// String conversion following the active string semantics
    ///
    /// Small integers come from the interned table; arrays and objects become
    /// `"Array"` and `"Object"`.
    pub fn to_string_value(&self) -> StringBuf {
        match self {
            Value::Null | Value::Bool(false) => StringBuf::literal(""),
            Value::Bool(true) => StringBuf::literal("1"),
            Value::Int(i) => match InternedString::small_int(*i) {
                Some(s) if !crate::config::unicode_semantics() => StringBuf::Interned(s),
                _ => StringBuf::literal(itoa::Buffer::new().format(*i)),
            },
            Value::Float(d) => StringBuf::literal(&numeric::format_double(*d)),
            Value::Str(s) => s.clone(),
            Value::Array(_) => {
                tracing::warn!(target: "quill::value", "array to string conversion");
                StringBuf::Interned(well_known::ARRAY.clone())
            }
            Value::Object(_) => StringBuf::Interned(well_known::OBJECT.clone()),
        }
    }

    /// Array conversion: arrays copy, objects expose their fields, null is
    /// empty, scalars wrap as `[0 => value]`
    pub fn to_array(&self) -> ArrayValue {
        match self {
            Value::Null => ArrayValue::new(),
            Value::Array(a) => a.copy(),
            Value::Object(o) => o.fields(),
            scalar => {
                let mut array = ArrayValue::with_capacity(1);
                array.append(scalar.clone());
                array
            }
        }
    }

    /// Normalized array key
    ///
    /// Null is `""`, booleans and floats become integers, strings normalize
    /// canonical integers. Arrays and objects are illegal offsets; they warn
    /// and key by their string conversion.
    pub fn to_key(&self) -> ArrayKey {
        match self {
            Value::Null => ArrayKey::Str(well_known::EMPTY.clone()),
            Value::Bool(b) => ArrayKey::Int(i64::from(*b)),
            Value::Int(i) => ArrayKey::Int(*i),
            Value::Float(d) => ArrayKey::Int(numeric::double_to_long(*d)),
            Value::Str(s) => s.to_key(),
            Value::Array(_) | Value::Object(_) => {
                tracing::warn!(
                    target: "quill::value",
                    kind = self.type_name(),
                    "illegal offset type"
                );
                self.to_string_value().to_key()
            }
        }
    }

    // Comparison

    /// Loose equality (`==`)
    pub fn loose_eq(&self, other: &Value) -> bool {
        self.loose_eq_at(other, 0)
    }

    pub(crate) fn loose_eq_at(&self, other: &Value, depth: usize) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, Value::Str(s)) | (Value::Str(s), Value::Null) => s.is_empty(),
            (Value::Null | Value::Bool(_), _) | (_, Value::Null | Value::Bool(_)) => {
                self.to_bool() == other.to_bool()
            }
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => str_compare(a, b) == Some(Ordering::Equal),
            (Value::Array(a), Value::Array(b)) => a.loose_eq_at(b, depth),
            (Value::Object(a), Value::Object(b)) => {
                a.ptr_eq(b)
                    || (a.class_name() == b.class_name()
                        && a.fields().loose_eq_at(&b.fields(), depth))
            }
            (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => {
                false
            }
            _ => number_compare(&self.to_number(), &other.to_number()) == Some(Ordering::Equal),
        }
    }

    /// Strict equality (`===`): same variant and content, no coercion
    ///
    /// Strings of different widths are never identical.
    pub fn strict_eq(&self, other: &Value) -> bool {
        self.strict_eq_at(other, 0)
    }

    pub(crate) fn strict_eq_at(&self, other: &Value, depth: usize) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.strict_eq_at(b, depth),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Ordering with `uncomparable` reported for pairs without an order
    /// (NaN, arrays with disjoint keys, objects of different classes)
    pub fn compare(&self, other: &Value, uncomparable: Ordering) -> Ordering {
        self.compare_at(other, uncomparable, 0)
    }

    pub(crate) fn compare_at(
        &self,
        other: &Value,
        uncomparable: Ordering,
        depth: usize,
    ) -> Ordering {
        let ord = match (self, other) {
            (Value::Null, Value::Str(s)) => Some(if s.is_empty() {
                Ordering::Equal
            } else {
                Ordering::Less
            }),
            (Value::Str(s), Value::Null) => Some(if s.is_empty() {
                Ordering::Equal
            } else {
                Ordering::Greater
            }),
            (Value::Null | Value::Bool(_), _) | (_, Value::Null | Value::Bool(_)) => {
                Some(self.to_bool().cmp(&other.to_bool()))
            }
            (Value::Str(a), Value::Str(b)) => str_compare(a, b),
            (Value::Array(a), Value::Array(b)) => Some(a.compare_at(b, uncomparable, depth)),
            (Value::Object(a), Value::Object(b)) => {
                if a.ptr_eq(b) {
                    Some(Ordering::Equal)
                } else if a.class_name() == b.class_name() {
                    Some(a.fields().compare_at(&b.fields(), uncomparable, depth))
                } else {
                    None
                }
            }
            (Value::Object(_), _) => Some(Ordering::Greater),
            (_, Value::Object(_)) => Some(Ordering::Less),
            (Value::Array(_), _) => Some(Ordering::Greater),
            (_, Value::Array(_)) => Some(Ordering::Less),
            _ => number_compare(&self.to_number(), &other.to_number()),
        };
        ord.unwrap_or(uncomparable)
    }

    /// Three-way loose comparison (uncomparable pairs report `Greater`)
    pub fn loose_cmp(&self, other: &Value) -> Ordering {
        self.compare(other, Ordering::Greater)
    }

    /// `<`
    pub fn lt(&self, other: &Value) -> bool {
        self.compare(other, Ordering::Greater) == Ordering::Less
    }

    /// `<=`
    pub fn leq(&self, other: &Value) -> bool {
        self.compare(other, Ordering::Greater) != Ordering::Greater
    }

    /// `>`
    pub fn gt(&self, other: &Value) -> bool {
        self.compare(other, Ordering::Less) == Ordering::Greater
    }

    /// `>=`
    pub fn geq(&self, other: &Value) -> bool {
        self.compare(other, Ordering::Less) != Ordering::Less
    }

    // Arithmetic

    fn numeric_operands(&self, other: &Value, op: &'static str) -> (Value, Value) {
        if matches!(self, Value::Array(_)) || matches!(other, Value::Array(_)) {
            tracing::warn!(target: "quill::value", op, "unsupported operand types");
        }
        (self.to_number(), other.to_number())
    }

    /// `+`; two arrays form their union
    pub fn add(&self, other: &Value) -> Value {
        if let (Value::Array(a), Value::Array(b)) = (self, other) {
            return Value::Array(a.union(b));
        }
        match self.numeric_operands(other, "+") {
            (Value::Int(a), Value::Int(b)) => a
                .checked_add(b)
                .map_or_else(|| Value::Float(a as f64 + b as f64), Value::Int),
            (a, b) => Value::Float(a.to_double() + b.to_double()),
        }
    }

    /// `-`
    pub fn sub(&self, other: &Value) -> Value {
        match self.numeric_operands(other, "-") {
            (Value::Int(a), Value::Int(b)) => a
                .checked_sub(b)
                .map_or_else(|| Value::Float(a as f64 - b as f64), Value::Int),
            (a, b) => Value::Float(a.to_double() - b.to_double()),
        }
    }

    /// `*`
    pub fn mul(&self, other: &Value) -> Value {
        match self.numeric_operands(other, "*") {
            (Value::Int(a), Value::Int(b)) => a
                .checked_mul(b)
                .map_or_else(|| Value::Float(a as f64 * b as f64), Value::Int),
            (a, b) => Value::Float(a.to_double() * b.to_double()),
        }
    }

    /// `/`; exact integer quotients stay integers, division by zero is `false`
    pub fn div(&self, other: &Value) -> Value {
        let (a, b) = self.numeric_operands(other, "/");
        if b.to_double() == 0.0 {
            tracing::warn!(target: "quill::value", "division by zero");
            return Value::Bool(false);
        }
        if let (Value::Int(a), Value::Int(b)) = (&a, &b)
            && let Some(0) = a.checked_rem(*b)
            && let Some(q) = a.checked_div(*b)
        {
            return Value::Int(q);
        }
        Value::Float(a.to_double() / b.to_double())
    }

    /// `%` on integer operands; modulo by zero is `false`
    pub fn modulo(&self, other: &Value) -> Value {
        let (a, b) = (self.to_long(), other.to_long());
        if b == 0 {
            tracing::warn!(target: "quill::value", "modulo by zero");
            return Value::Bool(false);
        }
        Value::Int(a.checked_rem(b).unwrap_or(0))
    }

    /// Unary `-`
    pub fn neg(&self) -> Value {
        match self.to_number() {
            Value::Int(i) => i
                .checked_neg()
                .map_or_else(|| Value::Float(-(i as f64)), Value::Int),
            number => Value::Float(-number.to_double()),
        }
    }

    /// `++` (`delta > 0`) or `--` (`delta < 0`)
    ///
    /// Null increments to 1 and stays null on decrement. Non-numeric strings
    /// increment alphanumerically (`"a"` → `"b"`, `"Az"` → `"Ba"`,
    /// `"zz"` → `"aaa"`) and are left alone on decrement; an empty string
    /// becomes `"1"` or `-1`. Booleans, arrays and objects are unchanged.
    pub fn increment(&self, delta: i64) -> Value {
        match self {
            Value::Null if delta > 0 => Value::Int(delta),
            Value::Null => Value::Null,
            Value::Int(_) | Value::Float(_) => self.add(&Value::Int(delta)),
            Value::Str(s) if s.is_empty() => {
                if delta > 0 {
                    Value::Str(StringBuf::literal("1"))
                } else {
                    Value::Int(delta)
                }
            }
            Value::Str(s) if s.is_numeric() => s_number(s).add(&Value::Int(delta)),
            Value::Str(s) if delta > 0 => Value::Str(increment_string(s)),
            _ => self.clone(),
        }
    }

    // Element access

    /// Read `self[key]`: array elements, object fields or string offsets
    pub fn get_index<K: IntoArrayKey>(&self, key: K) -> Option<Value> {
        let key = key.into_array_key();
        match self {
            Value::Array(a) => a.get_key(&key),
            Value::Object(o) => o.get_field(key),
            Value::Str(s) => {
                let offset = usize::try_from(key.as_int()?).ok()?;
                s.char_at(offset).map(Value::Str)
            }
            _ => None,
        }
    }

    /// Convert null, `false` or `""` into an empty array and borrow the array
    ///
    /// Any other scalar cannot be used as an array: it warns and yields `None`.
    pub fn ensure_array(&mut self) -> Option<&mut ArrayValue> {
        let vivify = match self {
            Value::Null | Value::Bool(false) => true,
            Value::Str(s) => s.is_empty(),
            _ => false,
        };
        if vivify {
            *self = Value::Array(ArrayValue::new());
        }
        match self {
            Value::Array(a) => Some(a),
            other => {
                tracing::warn!(
                    target: "quill::value",
                    kind = other.type_name(),
                    "cannot use a scalar value as an array"
                );
                None
            }
        }
    }

    /// Reference cell for `self[key]`, auto-vivifying the array
    ///
    /// A scalar that cannot become an array yields a detached cell; writes to
    /// it are lost.
    pub fn element_var<K: IntoArrayKey>(&mut self, key: K) -> Var {
        match self {
            Value::Object(o) => o.field_var(key),
            _ => match self.ensure_array() {
                Some(array) => array.get_var(key),
                None => detached("element"),
            },
        }
    }

    /// Reference cell for `self->name`, creating a `stdClass` from an empty
    /// value
    pub fn field_var<K: IntoArrayKey>(&mut self, name: K) -> Var {
        if self.is_empty() && !matches!(self, Value::Object(_) | Value::Array(_)) {
            tracing::warn!(target: "quill::value", "creating default object from empty value");
            *self = Value::Object(ObjectHandle::std_class());
        }
        match self {
            Value::Object(o) => o.field_var(name),
            _ => detached("field"),
        }
    }
}

fn detached(kind: &'static str) -> Var {
    tracing::warn!(target: "quill::value", kind, "writing through a detached slot");
    Var::default()
}

fn s_number(s: &StringBuf) -> Value {
    Value::Str(s.clone()).to_number()
}

/// Numeric ordering; `None` when either side is NaN
fn number_compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        _ => a.to_double().partial_cmp(&b.to_double()),
    }
}

/// String ordering: numerically when both sides are numeric, else by content
fn str_compare(a: &StringBuf, b: &StringBuf) -> Option<Ordering> {
    let (ta, tb) = (a.value_type(), b.value_type());
    if ta.is_number_cmp() && tb.is_number_cmp() {
        if ta.is_long_add(tb) {
            Some(a.to_long().cmp(&b.to_long()))
        } else {
            a.to_double().partial_cmp(&b.to_double())
        }
    } else {
        Some(a.content_cmp(b))
    }
}

/// Alphanumeric increment of the trailing run of letters and digits
fn increment_units<T>(units: &mut Vec<T>)
where
    T: Copy + From<u8> + Into<u32>,
{
    #[derive(Clone, Copy)]
    enum Run {
        Lower,
        Upper,
        Digit,
    }

    let mut carry = None;
    let mut pos = units.len();
    while pos > 0 {
        pos -= 1;
        let u: u32 = units[pos].into();
        let (run, wrapped) = match u {
            0x61..=0x7A => (Run::Lower, u == 0x7A),
            0x41..=0x5A => (Run::Upper, u == 0x5A),
            0x30..=0x39 => (Run::Digit, u == 0x39),
            _ => {
                carry = None;
                break;
            }
        };
        if wrapped {
            let base = match run {
                Run::Lower => b'a',
                Run::Upper => b'A',
                Run::Digit => b'0',
            };
            units[pos] = T::from(base);
            carry = Some((run, pos));
        } else {
            // u is ASCII here
            units[pos] = T::from(u as u8 + 1);
            carry = None;
            break;
        }
    }
    if let Some((run, pos)) = carry {
        let lead = match run {
            Run::Lower => b'a',
            Run::Upper => b'A',
            Run::Digit => b'1',
        };
        units.insert(pos, T::from(lead));
    }
}

fn increment_string(s: &StringBuf) -> StringBuf {
    match s.width() {
        StringWidth::Binary => {
            let mut bytes = s.bytes().into_owned();
            increment_units(&mut bytes);
            StringBuf::from(bytes)
        }
        StringWidth::Unicode => {
            let mut units = s.units().into_owned();
            increment_units(&mut units);
            StringBuf::from_units(&units)
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null | Value::Bool(false) => Ok(()),
            Value::Bool(true) => f.write_str("1"),
            Value::Int(i) => f.write_str(itoa::Buffer::new().format(*i)),
            Value::Float(d) => f.write_str(&numeric::format_double(*d)),
            Value::Str(s) => std::fmt::Display::fmt(s, f),
            Value::Array(_) => f.write_str("Array"),
            Value::Object(_) => f.write_str("Object"),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Float(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(StringBuf::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(StringBuf::from(s))
    }
}

impl From<StringBuf> for Value {
    fn from(s: StringBuf) -> Self {
        Value::Str(s)
    }
}

impl From<ArrayValue> for Value {
    fn from(a: ArrayValue) -> Self {
        Value::Array(a)
    }
}

impl From<ObjectHandle> for Value {
    fn from(o: ObjectHandle) -> Self {
        Value::Object(o)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
