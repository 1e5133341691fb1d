//! String buffers across widths and storage strategies

use quill_value::string::LargeBinaryBuf;
use quill_value::{RuntimeConfig, StringBuf, TextEncoding, Value};

#[test]
fn test_large_buffer_reproduces_content() {
    let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
    let mut large = LargeBinaryBuf::new(4096);
    large.append(&data);
    assert_eq!(large.chunk_count(), 2);

    let s = StringBuf::Large(large);
    assert_eq!(s.len(), 5000);
    assert_eq!(s.bytes().as_ref(), data.as_slice());
}

#[test]
fn test_builder_promotes_to_chunks() {
    let _guard = RuntimeConfig::default().with_large_strings(64, 100).install();
    let mut s = StringBuf::new();
    for _ in 0..30 {
        s.append_str("abcd");
    }
    assert!(matches!(s, StringBuf::Large(_)));
    assert_eq!(s.len(), 120);
    assert_eq!(s.to_string_lossy(), "abcd".repeat(30));
}

#[test]
fn test_cross_width_comparison() {
    let binary = Value::from("caf\u{e9}");
    let unicode = Value::Str(StringBuf::unicode("caf\u{e9}"));
    assert!(binary.loose_eq(&unicode));
    assert!(!binary.strict_eq(&unicode));

    let numeric = Value::Str(StringBuf::unicode("1e1"));
    assert!(numeric.loose_eq(&Value::from("10")));
}

#[test]
fn test_latin1_transcoding() {
    let _guard = RuntimeConfig::default()
        .with_encoding(TextEncoding::Latin1)
        .install();
    let binary = StringBuf::from_bytes(&[0x63, 0xe9]);
    let unicode = binary.to_unicode();
    assert_eq!(unicode.units().as_ref(), &[0x63u16, 0xe9]);
    assert_eq!(unicode.to_binary().bytes().as_ref(), &[0x63u8, 0xe9]);
}

#[test]
fn test_conversions_follow_unicode_semantics() {
    let _guard = RuntimeConfig::default().with_unicode_semantics(true).install();
    let s = Value::Int(42).to_string_value();
    assert!(s.is_unicode());
    assert_eq!(s.to_string_lossy(), "42");
}
