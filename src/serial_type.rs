//! Serial Types are how the record format tags each stored column value.
//! See https://www.sqlite.org/fileformat.html#record_format

use byteorder::{BigEndian, ByteOrder};

use crate::error::Error;
use crate::value::Value;

/// Body lengths of the fixed-width serial types 0..=7.
const FIXED_DATA_LENS: [u32; 8] = [0, 1, 2, 3, 4, 6, 8, 8];

/// Returns the serial type for the given value.
///
/// The width of the integer variant picks the code directly; a value the
/// host supplied as `Int64` is stored as an 8-byte integer even when it
/// would fit a narrower code.
pub fn derive_type_or_len(v: &Value) -> u32 {
    match v {
        // Serial Type	Content Size	Meaning
        // 0	        0	            Value is a NULL.
        Value::Null => 0,
        // 1	        1	            Value is an 8-bit twos-complement integer.
        Value::Int8(_) => 1,
        // 2	        2	            Value is a big-endian 16-bit twos-complement integer.
        Value::Int16(_) => 2,
        // 4	        4	            Value is a big-endian 32-bit twos-complement integer.
        Value::Int32(_) => 4,
        // 6	        8	            Value is a big-endian 64-bit twos-complement integer.
        Value::Int64(_) => 6,
        // 7	        8	            Value is a big-endian IEEE 754-2008 64-bit floating point number.
        Value::Real32(_) | Value::Real64(_) => 7,
        // N≥12 & even	(N-12)/2	    Value is a BLOB that is (N-12)/2 bytes in length.
        Value::Blob(b) => b.len() as u32 * 2 + 12,
        // N≥13 & odd	(N-13)/2	    Value is a string (N-13)/2 bytes in length.
        Value::Text(s) => s.len() as u32 * 2 + 13,
    }
}

/// Returns the number of body bytes a column with the given serial type
/// occupies. The integer-0/1 sentinels (8, 9) and the reserved codes
/// (10, 11) have empty bodies.
pub fn derive_data_len(type_or_len: u32) -> u32 {
    if type_or_len >= 12 {
        (type_or_len - 12 - type_or_len % 2) / 2
    } else if type_or_len < 8 {
        FIXED_DATA_LENS[type_or_len as usize]
    } else {
        0
    }
}

/// Returns the number of body bytes the value occupies on disk.
/// Differs from the host-side width only for `Real32`, which is widened.
pub fn stored_len(v: &Value) -> usize {
    match v {
        Value::Null => 0,
        Value::Int8(_) => 1,
        Value::Int16(_) => 2,
        Value::Int32(_) => 4,
        Value::Int64(_) => 8,
        Value::Real32(_) | Value::Real64(_) => 8,
        Value::Blob(b) => b.len(),
        Value::Text(s) => s.len(),
    }
}

/// Writes the big-endian body of `v` at the start of `buf` and returns the
/// number of bytes written.
pub fn write_body(buf: &mut [u8], v: &Value) -> usize {
    match v {
        Value::Null => 0,
        Value::Int8(x) => {
            buf[0] = *x as u8;
            1
        }
        Value::Int16(x) => {
            BigEndian::write_i16(buf, *x);
            2
        }
        Value::Int32(x) => {
            BigEndian::write_i32(buf, *x);
            4
        }
        Value::Int64(x) => {
            BigEndian::write_i64(buf, *x);
            8
        }
        Value::Real32(x) => {
            BigEndian::write_u64(buf, f32_to_f64_bits(x.to_bits()));
            8
        }
        Value::Real64(x) => {
            BigEndian::write_u64(buf, x.to_bits());
            8
        }
        Value::Blob(b) => {
            buf[..b.len()].copy_from_slice(b);
            b.len()
        }
        Value::Text(s) => {
            buf[..s.len()].copy_from_slice(s.as_bytes());
            s.len()
        }
    }
}

/// Widens an IEEE-754 single bit pattern to the double bit pattern by
/// rebiasing the exponent and shifting the mantissa. Works on the bit
/// representation so the result does not depend on how the host lays out
/// floats in memory.
pub fn f32_to_f64_bits(bits: u32) -> u64 {
    let exp8 = (bits >> 23) & 0xff;
    let exp11: u64 = if exp8 == 0 {
        0
    } else if exp8 < 127 {
        (1023 - (127 - exp8)) as u64
    } else {
        (1023 + (exp8 - 127)) as u64
    };
    ((bits as u64 >> 31) << 63) | (exp11 << 52) | (((bits & 0x7f_ffff) as u64) << (52 - 23))
}

/// Sign-extends a big-endian twos-complement body of 1..=8 bytes to i64.
pub fn int_from_body(data: &[u8]) -> i64 {
    let mut v = data[0] as i8 as i64;
    for b in &data[1..] {
        v = (v << 8) | *b as i64;
    }
    v
}

/// Deserializes a stored column body into a [`Value`] borrowing from `data`.
///
/// Small integers are returned in the variant matching the stored width;
/// the 3- and 6-byte widths, which this library never writes but the format
/// permits, come back sign-extended as `Int64`.
pub fn decode(type_or_len: u32, data: &[u8]) -> Result<Value<'_>, Error> {
    match type_or_len {
        0 => Ok(Value::Null),
        1 => Ok(Value::Int8(data[0] as i8)),
        2 => Ok(Value::Int16(BigEndian::read_i16(data))),
        3 | 5 => Ok(Value::Int64(int_from_body(
            &data[..derive_data_len(type_or_len) as usize],
        ))),
        4 => Ok(Value::Int32(BigEndian::read_i32(data))),
        6 => Ok(Value::Int64(BigEndian::read_i64(data))),
        7 => Ok(Value::Real64(f64::from_bits(BigEndian::read_u64(data)))),
        // 8	0	Value is the integer 0. (Schema format 4 and higher.)
        8 => Ok(Value::Int8(0)),
        // 9	0	Value is the integer 1. (Schema format 4 and higher.)
        9 => Ok(Value::Int8(1)),
        10 | 11 => Err(Error::Malformed),
        t if t % 2 == 0 => Ok(Value::Blob(&data[..(t as usize - 12) / 2])),
        t => {
            let s = std::str::from_utf8(&data[..(t as usize - 13) / 2])
                .map_err(|_| Error::Malformed)?;
            Ok(Value::Text(s))
        }
    }
}

#[test]
fn test_type_and_len_round_trip() {
    let cases: Vec<(Value, u32, usize)> = vec![
        (Value::Null, 0, 0),
        (Value::Int8(-5), 1, 1),
        (Value::Int16(300), 2, 2),
        (Value::Int32(70000), 4, 4),
        (Value::Int64(1 << 40), 6, 8),
        (Value::Real32(1.5), 7, 8),
        (Value::Real64(2.25), 7, 8),
        (Value::Blob(&[1, 2, 3]), 18, 3),
        (Value::Text("Ten"), 19, 3),
        (Value::Text(""), 13, 0),
    ];
    for (v, expected_type, expected_len) in cases {
        let t = derive_type_or_len(&v);
        assert_eq!(t, expected_type, "serial type for {:?}", v);
        assert_eq!(stored_len(&v), expected_len, "stored length for {:?}", v);
        assert_eq!(derive_data_len(t) as usize, expected_len);
    }
}

#[test]
fn test_derive_data_len_sentinels() {
    assert_eq!(derive_data_len(8), 0);
    assert_eq!(derive_data_len(9), 0);
    assert_eq!(derive_data_len(3), 3);
    assert_eq!(derive_data_len(5), 6);
    assert_eq!(derive_data_len(12), 0);
    assert_eq!(derive_data_len(13), 0);
    assert_eq!(derive_data_len(413), 200);
}

#[test]
fn test_f32_widening_matches_native_cast() {
    for f in [0.0f32, 1.0, 1.5, -2.25, 3.1415927, 1e-20, -1e20] {
        assert_eq!(f32_to_f64_bits(f.to_bits()), (f as f64).to_bits());
    }
}

#[test]
fn test_int_from_body_sign_extends() {
    assert_eq!(int_from_body(&[0x7f]), 127);
    assert_eq!(int_from_body(&[0xff]), -1);
    assert_eq!(int_from_body(&[0xff, 0xff]), -1);
    assert_eq!(int_from_body(&[0x01, 0x00]), 256);
    assert_eq!(
        int_from_body(&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe]),
        -2
    );
}

#[test]
fn test_write_body_then_decode() {
    let mut buf = [0u8; 16];
    let cases: Vec<Value> = vec![
        Value::Int8(-100),
        Value::Int16(-30000),
        Value::Int32(123456789),
        Value::Int64(-(1 << 50)),
        Value::Real64(3.14159),
        Value::Text("hello"),
        Value::Blob(&[0, 1, 255]),
    ];
    for v in cases {
        let n = write_body(&mut buf, &v);
        assert_eq!(n, stored_len(&v));
        let t = derive_type_or_len(&v);
        assert_eq!(decode(t, &buf[..n]).unwrap(), v);
    }
    // A 4-byte float reads back as the widened double.
    let n = write_body(&mut buf, &Value::Real32(1.5));
    assert_eq!(decode(7, &buf[..n]).unwrap(), Value::Real64(1.5));
}
