//! Numeric string classification, parsing and float formatting
//!
//! All scanners work over code units so the same rules apply to byte strings
//! and UTF-16 strings.

use crate::value::ValueType;

/// A string code unit (byte or UTF-16 unit)
pub trait CodeUnit: Copy {
    /// Widen to a `u32` code point value
    fn unit(self) -> u32;
}

impl CodeUnit for u8 {
    #[inline]
    fn unit(self) -> u32 {
        self as u32
    }
}

impl CodeUnit for u16 {
    #[inline]
    fn unit(self) -> u32 {
        self as u32
    }
}

#[inline]
fn is_space(u: u32) -> bool {
    matches!(u, 0x20 | 0x09 | 0x0A | 0x0B | 0x0C | 0x0D)
}

#[inline]
fn is_digit(u: u32) -> bool {
    (0x30..=0x39).contains(&u)
}

#[inline]
fn digit(u: u32) -> i64 {
    (u - 0x30) as i64
}

/// Shape of the longest numeric prefix of a string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NumericPrefix {
    /// Index of the first non-space unit
    start: usize,
    /// One past the last unit of the numeric prefix (== start when none)
    end: usize,
    /// The prefix has a fraction or an exponent
    is_double: bool,
}

fn scan_prefix<T: CodeUnit>(units: &[T]) -> NumericPrefix {
    let n = units.len();
    let mut i = 0;
    while i < n && is_space(units[i].unit()) {
        i += 1;
    }
    let start = i;

    if i < n && matches!(units[i].unit(), 0x2B | 0x2D) {
        i += 1;
    }
    let int_start = i;
    while i < n && is_digit(units[i].unit()) {
        i += 1;
    }
    let int_digits = i - int_start;

    let mut is_double = false;
    let mut frac_digits = 0;
    if i < n && units[i].unit() == 0x2E {
        let dot = i;
        i += 1;
        let frac_start = i;
        while i < n && is_digit(units[i].unit()) {
            i += 1;
        }
        frac_digits = i - frac_start;
        if int_digits + frac_digits == 0 {
            i = dot;
        } else {
            is_double = true;
        }
    }

    if int_digits + frac_digits == 0 {
        return NumericPrefix {
            start,
            end: start,
            is_double: false,
        };
    }

    if i < n && matches!(units[i].unit(), 0x45 | 0x65) {
        let mark = i;
        i += 1;
        if i < n && matches!(units[i].unit(), 0x2B | 0x2D) {
            i += 1;
        }
        let exp_start = i;
        while i < n && is_digit(units[i].unit()) {
            i += 1;
        }
        if i == exp_start {
            i = mark;
        } else {
            is_double = true;
        }
    }

    NumericPrefix {
        start,
        end: i,
        is_double,
    }
}

/// Classify a string for numeric comparison
///
/// Returns [`ValueType::LongCmp`] for a whole integer that fits in `i64`,
/// [`ValueType::DoubleCmp`] for any other complete numeric literal, and
/// [`ValueType::String`] otherwise. Leading and trailing whitespace is allowed;
/// hexadecimal is not numeric.
pub fn classify<T: CodeUnit>(units: &[T]) -> ValueType {
    let prefix = scan_prefix(units);
    if prefix.end == prefix.start {
        return ValueType::String;
    }
    let mut i = prefix.end;
    while i < units.len() && is_space(units[i].unit()) {
        i += 1;
    }
    if i != units.len() {
        return ValueType::String;
    }
    if prefix.is_double {
        return ValueType::DoubleCmp;
    }
    match parse_integer(&units[prefix.start..prefix.end]) {
        Some(_) => ValueType::LongCmp,
        None => ValueType::DoubleCmp,
    }
}

/// Parse `[+-]digits` exactly, failing on overflow
fn parse_integer<T: CodeUnit>(units: &[T]) -> Option<i64> {
    let (negative, digits) = match units.first().map(|u| u.unit()) {
        Some(0x2D) => (true, &units[1..]),
        Some(0x2B) => (false, &units[1..]),
        _ => (false, units),
    };
    if digits.is_empty() {
        return None;
    }
    let mut acc: i64 = 0;
    for u in digits {
        let u = u.unit();
        if !is_digit(u) {
            return None;
        }
        acc = acc.checked_mul(10)?;
        acc = if negative {
            acc.checked_sub(digit(u))?
        } else {
            acc.checked_add(digit(u))?
        };
    }
    Some(acc)
}

/// Integer value of a string
///
/// Whole numeric literals convert exactly, float literals are truncated, and
/// anything else converts its leading integer digits (`"12abc"` is 12, `"abc"`
/// is 0). Overflowing digit runs saturate.
pub fn parse_long<T: CodeUnit>(units: &[T]) -> i64 {
    let prefix = scan_prefix(units);
    if prefix.end == prefix.start {
        return 0;
    }
    let literal = &units[prefix.start..prefix.end];
    if prefix.is_double {
        return double_to_long(parse_double_literal(literal));
    }
    match parse_integer(literal) {
        Some(v) => v,
        None if literal[0].unit() == 0x2D => i64::MIN,
        None => i64::MAX,
    }
}

/// Float value of a string (its longest numeric prefix, or 0.0)
pub fn parse_double<T: CodeUnit>(units: &[T]) -> f64 {
    let prefix = scan_prefix(units);
    if prefix.end == prefix.start {
        return 0.0;
    }
    parse_double_literal(&units[prefix.start..prefix.end])
}

fn parse_double_literal<T: CodeUnit>(units: &[T]) -> f64 {
    // The scanner only admits ASCII, so the narrowing is exact.
    let text: String = units.iter().map(|u| u.unit() as u8 as char).collect();
    text.parse::<f64>().unwrap_or(0.0)
}

/// Canonical array-key form of a string
///
/// Only `"0"` or an optional `-` followed by a non-zero digit and more digits
/// (fitting in `i64`) normalize to an integer key. `"08"`, `"-0"`, `"+1"` and
/// `" 1"` all stay strings.
pub fn canonical_key<T: CodeUnit>(units: &[T]) -> Option<i64> {
    let first = units.first()?.unit();
    if first == 0x30 {
        return if units.len() == 1 { Some(0) } else { None };
    }
    let digits = if first == 0x2D { &units[1..] } else { units };
    let lead = digits.first()?.unit();
    if !(0x31..=0x39).contains(&lead) || digits.len() > 19 {
        return None;
    }
    parse_integer(units)
}

/// Convert a float to an integer the way casts do
///
/// Truncates toward zero; NaN becomes 0 and out-of-range values saturate.
pub fn double_to_long(d: f64) -> i64 {
    if d.is_nan() {
        0
    } else {
        d as i64
    }
}

/// Format a float for display with 14 significant digits
///
/// Whole values print without a fraction (`1.0` is `"1"`); magnitudes below
/// 1e-4 or at or above 1e14 use `1.0E+25` style.
pub fn format_double(d: f64) -> String {
    if d.is_nan() {
        return "NAN".to_string();
    }
    if d.is_infinite() {
        return if d > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    if d == 0.0 {
        return if d.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let sci = format!("{:.13e}", d.abs());
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    let mut digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();
    while digits.len() > 1 && digits.ends_with('0') {
        digits.pop();
    }

    let mut out = String::with_capacity(24);
    if d < 0.0 {
        out.push('-');
    }
    if !(-4..14).contains(&exp) {
        out.push_str(&digits[..1]);
        out.push('.');
        if digits.len() > 1 {
            out.push_str(&digits[1..]);
        } else {
            out.push('0');
        }
        out.push('E');
        out.push(if exp < 0 { '-' } else { '+' });
        out.push_str(&exp.unsigned_abs().to_string());
    } else if exp >= 0 {
        let int_len = exp as usize + 1;
        if digits.len() <= int_len {
            out.push_str(&digits);
            out.extend(std::iter::repeat_n('0', int_len - digits.len()));
        } else {
            out.push_str(&digits[..int_len]);
            out.push('.');
            out.push_str(&digits[int_len..]);
        }
    } else {
        out.push_str("0.");
        out.extend(std::iter::repeat_n('0', (-exp - 1) as usize));
        out.push_str(&digits);
    }
    out
}

/// Format a float for the wire format: shortest round-trip digits
///
/// `100.0` is `"100"`, `1e25` is `"1.0E+25"`, non-finite values are
/// `INF`, `-INF` and `NAN`.
pub fn format_double_exact(d: f64) -> String {
    if d.is_nan() {
        return "NAN".to_string();
    }
    if d.is_infinite() {
        return if d > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    let mut buffer = ryu::Buffer::new();
    let text = buffer.format_finite(d);
    match text.split_once('e') {
        Some((mantissa, exp)) => {
            let mut out = String::with_capacity(text.len() + 4);
            out.push_str(mantissa);
            if !mantissa.contains('.') {
                out.push_str(".0");
            }
            out.push('E');
            if !exp.starts_with('-') {
                out.push('+');
            }
            out.push_str(exp);
            out
        }
        None => text.strip_suffix(".0").unwrap_or(text).to_string(),
    }
}
