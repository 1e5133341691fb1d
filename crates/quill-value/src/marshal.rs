//! Conversion costs toward native parameter types
//!
//! An overload resolver picks the candidate whose parameters need the
//! cheapest conversions. Costs are plain integers; lower is better and
//! [`INCOMPATIBLE`] rules a candidate out.

use crate::string::StringBuf;
use crate::value::{Value, ValueType};

/// Same representation, no conversion
pub const IDENTICAL: u32 = 0;
/// Same content, different representation
pub const EQUAL: u32 = 1;
/// Numeric conversion that keeps the exact value
pub const NUMERIC_LOSSLESS: u32 = 10;
/// Numeric conversion that may round or truncate
pub const NUMERIC_LOSSY: u32 = 20;
/// Null becomes the target's empty value
pub const FROM_NULL: u32 = 30;
/// Truthiness test
pub const TO_BOOLEAN: u32 = 40;
/// Numeric string parsed to a number
pub const STRING_TO_NUMBER: u32 = 50;
/// Rendering a non-string as a string
pub const TO_STRING: u32 = 60;
/// Transcoding between byte and unicode strings
pub const BINARY_TO_STRING: u32 = 70;
/// Splitting a string into a char array
pub const TO_CHAR_ARRAY: u32 = 80;
/// Wrapping as a generic object
pub const TO_OBJECT: u32 = 90;
/// No conversion exists
pub const INCOMPATIBLE: u32 = 1000;

/// Native parameter type a value may be marshaled to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarshalTarget {
    /// `bool`
    Boolean,
    /// `i8`
    Byte,
    /// `i16`
    Short,
    /// `i32`
    Integer,
    /// `i64`
    Long,
    /// `f32`
    Float,
    /// `f64`
    Double,
    /// A single UTF-16 code unit
    Char,
    /// Native unicode string
    String,
    /// Byte array
    ByteArray,
    /// UTF-16 code unit array
    CharArray,
    /// Binary string value
    BinaryValue,
    /// Unicode string value
    UnicodeValue,
    /// String value of either width
    StringValue,
    /// Untyped object
    Object,
}

impl MarshalTarget {
    fn int_range(self) -> Option<(i64, i64)> {
        match self {
            MarshalTarget::Byte => Some((i8::MIN.into(), i8::MAX.into())),
            MarshalTarget::Short => Some((i16::MIN.into(), i16::MAX.into())),
            MarshalTarget::Integer => Some((i32::MIN.into(), i32::MAX.into())),
            MarshalTarget::Long => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }

    fn is_float(self) -> bool {
        matches!(self, MarshalTarget::Float | MarshalTarget::Double)
    }

    fn is_text(self) -> bool {
        matches!(
            self,
            MarshalTarget::String
                | MarshalTarget::BinaryValue
                | MarshalTarget::UnicodeValue
                | MarshalTarget::StringValue
        )
    }
}

/// Cost of converting `value` to `target`
pub fn marshal_cost(value: &Value, target: MarshalTarget) -> u32 {
    match value {
        Value::Null => FROM_NULL,
        Value::Bool(_) => bool_cost(target),
        Value::Int(i) => long_cost(*i, target),
        Value::Float(d) => double_cost(*d, target),
        Value::Str(s) => string_cost(s, target),
        Value::Array(_) | Value::Object(_) => match target {
            MarshalTarget::Object if matches!(value, Value::Object(_)) => IDENTICAL,
            MarshalTarget::Object => TO_OBJECT,
            MarshalTarget::Boolean => TO_BOOLEAN,
            _ => INCOMPATIBLE,
        },
    }
}

fn bool_cost(target: MarshalTarget) -> u32 {
    match target {
        MarshalTarget::Boolean => IDENTICAL,
        MarshalTarget::Object => TO_OBJECT,
        t if t.int_range().is_some() || t.is_float() => NUMERIC_LOSSY,
        t if t.is_text() => TO_STRING,
        _ => INCOMPATIBLE,
    }
}

fn long_cost(i: i64, target: MarshalTarget) -> u32 {
    if let Some((min, max)) = target.int_range() {
        return match target {
            MarshalTarget::Long => IDENTICAL,
            _ if (min..=max).contains(&i) => NUMERIC_LOSSLESS,
            _ => NUMERIC_LOSSY,
        };
    }
    match target {
        MarshalTarget::Double if i.unsigned_abs() <= 1 << 53 => NUMERIC_LOSSLESS,
        MarshalTarget::Float if i.unsigned_abs() <= 1 << 24 => NUMERIC_LOSSLESS,
        MarshalTarget::Double | MarshalTarget::Float => NUMERIC_LOSSY,
        MarshalTarget::Char if u16::try_from(i).is_ok() => NUMERIC_LOSSY,
        MarshalTarget::Boolean => TO_BOOLEAN,
        MarshalTarget::Object => TO_OBJECT,
        t if t.is_text() => TO_STRING,
        _ => INCOMPATIBLE,
    }
}

fn double_cost(d: f64, target: MarshalTarget) -> u32 {
    if let Some((min, max)) = target.int_range() {
        // max + 1 is a power of two, so the bound is exact even for i64
        let exact = d.fract() == 0.0 && d >= min as f64 && d < max as f64 + 1.0;
        return if exact { NUMERIC_LOSSLESS } else { NUMERIC_LOSSY };
    }
    match target {
        MarshalTarget::Double => IDENTICAL,
        MarshalTarget::Float if f64::from(d as f32) == d || d.is_nan() => NUMERIC_LOSSLESS,
        MarshalTarget::Float => NUMERIC_LOSSY,
        MarshalTarget::Boolean => TO_BOOLEAN,
        MarshalTarget::Object => TO_OBJECT,
        t if t.is_text() => TO_STRING,
        _ => INCOMPATIBLE,
    }
}

fn string_cost(s: &StringBuf, target: MarshalTarget) -> u32 {
    let unicode = s.is_unicode();
    match target {
        MarshalTarget::StringValue => IDENTICAL,
        MarshalTarget::String | MarshalTarget::UnicodeValue if unicode => {
            if target == MarshalTarget::UnicodeValue {
                IDENTICAL
            } else {
                EQUAL
            }
        }
        MarshalTarget::BinaryValue if !unicode => IDENTICAL,
        MarshalTarget::String | MarshalTarget::UnicodeValue | MarshalTarget::BinaryValue => {
            BINARY_TO_STRING
        }
        MarshalTarget::ByteArray if !unicode => EQUAL,
        MarshalTarget::ByteArray | MarshalTarget::CharArray => TO_CHAR_ARRAY,
        MarshalTarget::Char if s.len() == 1 => EQUAL,
        MarshalTarget::Char => INCOMPATIBLE,
        MarshalTarget::Boolean => TO_BOOLEAN,
        MarshalTarget::Object => TO_OBJECT,
        t => string_number_cost(s.value_type(), t),
    }
}

/// Numeric targets: only numeric-looking strings convert
fn string_number_cost(kind: ValueType, target: MarshalTarget) -> u32 {
    match kind {
        ValueType::LongCmp => STRING_TO_NUMBER,
        ValueType::DoubleCmp if target.is_float() => STRING_TO_NUMBER,
        ValueType::DoubleCmp => STRING_TO_NUMBER + NUMERIC_LOSSY - NUMERIC_LOSSLESS,
        _ => INCOMPATIBLE,
    }
}

impl Value {
    /// Cost of converting this value to `target`; see [`marshal_cost`]
    pub fn marshal_cost(&self, target: MarshalTarget) -> u32 {
        marshal_cost(self, target)
    }
}
