//! Binary primitives shared by every Pixie message: base-128 varints,
//! zigzag-encoded signed integers, length-prefixed strings, fixed-width
//! numerics, and the scaled-decimal string formatting used for price fields.

use bidfx_core::error::{BidFxError, Result};

/// A forward-only cursor over a byte slice, mirroring the Python
/// implementation's habit of popping consumed bytes off the front of a
/// `bytearray`. Reading past the end is a protocol error, not a panic.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        ByteReader { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(BidFxError::pricing(format!(
                "buffer underrun: wanted {n} bytes, {} remain",
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn take_byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }
}

/// Encode an unsigned integer as a base-128 varint, least significant group
/// first, continuation bit set on every byte but the last.
pub fn encode_varint(mut n: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(10);
    loop {
        let b = (n & 0x7f) as u8;
        n >>= 7;
        if n != 0 {
            out.push(b | 0x80);
        } else {
            out.push(b);
            break;
        }
    }
    out
}

/// Decode a base-128 varint, up to 10 groups (64 bits).
pub fn decode_varint(reader: &mut ByteReader) -> Result<u64> {
    let mut result: u64 = 0;
    for offset in (0..64).step_by(7) {
        let b = reader.take_byte()?;
        result |= ((b & 0x7f) as u64) << offset;
        if b < 0x80 {
            break;
        }
    }
    Ok(result)
}

/// Map a signed value onto the unsigned domain so that small-magnitude
/// values (positive or negative) encode as small varints.
pub fn encode_zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

pub fn decode_zigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Encode a length-prefixed, UTF-8 string. `None` is encoded as a single
/// zero byte; the empty string as a single `0x01` byte; anything else as
/// `varint(byte_len + 1)` followed by the UTF-8 bytes.
pub fn encode_string(s: Option<&str>) -> Vec<u8> {
    match s {
        None => vec![0],
        Some("") => vec![1],
        Some(s) => {
            let utf = s.as_bytes();
            let mut out = encode_varint(utf.len() as u64 + 1);
            out.extend_from_slice(utf);
            out
        }
    }
}

pub fn decode_string(reader: &mut ByteReader) -> Result<Option<String>> {
    let length = decode_varint(reader)?;
    if length == 0 {
        return Ok(None);
    }
    let length = length - 1;
    if length == 0 {
        return Ok(Some(String::new()));
    }
    let bytes = reader.take(length as usize)?;
    let s = String::from_utf8(bytes.to_vec())
        .map_err(|e| BidFxError::pricing(format!("invalid utf-8 in string field: {e}")))?;
    Ok(Some(s))
}

/// Encode a list of subject components (`[k1, v1, k2, v2, ...]`) as a
/// varint-prefixed list of strings.
pub fn encode_strings_list(strings: &[String]) -> Vec<u8> {
    let mut out = encode_varint(strings.len() as u64);
    for s in strings {
        out.extend(encode_string(Some(s)));
    }
    out
}

pub fn decode_strings_list(reader: &mut ByteReader) -> Result<Vec<String>> {
    let length = decode_varint(reader)?;
    let mut out = Vec::with_capacity(length as usize);
    for _ in 0..length {
        out.push(decode_string(reader)?.unwrap_or_default());
    }
    Ok(out)
}

pub fn read_fixed1(reader: &mut ByteReader) -> Result<[u8; 1]> {
    Ok([reader.take_byte()?])
}

pub fn read_fixed2(reader: &mut ByteReader) -> Result<[u8; 2]> {
    Ok(reader.take(2)?.try_into().unwrap())
}

pub fn read_fixed3(reader: &mut ByteReader) -> Result<[u8; 3]> {
    Ok(reader.take(3)?.try_into().unwrap())
}

pub fn read_fixed4(reader: &mut ByteReader) -> Result<[u8; 4]> {
    Ok(reader.take(4)?.try_into().unwrap())
}

pub fn read_fixed8(reader: &mut ByteReader) -> Result<[u8; 8]> {
    Ok(reader.take(8)?.try_into().unwrap())
}

pub fn read_fixed16(reader: &mut ByteReader) -> Result<[u8; 16]> {
    Ok(reader.take(16)?.try_into().unwrap())
}

pub fn read_byte_array(reader: &mut ByteReader) -> Result<Vec<u8>> {
    let length = decode_varint(reader)?;
    Ok(reader.take(length as usize)?.to_vec())
}

pub fn read_int_fixed4(reader: &mut ByteReader) -> Result<i64> {
    Ok(i32::from_be_bytes(read_fixed4(reader)?) as i64)
}

pub fn read_long_fixed8(reader: &mut ByteReader) -> Result<i64> {
    Ok(i64::from_be_bytes(read_fixed8(reader)?))
}

pub fn read_double_fixed8(reader: &mut ByteReader) -> Result<f64> {
    Ok(f64::from_be_bytes(read_fixed8(reader)?))
}

const POWERS_OF_TEN: [i64; 19] = [
    1,
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
    10_000_000_000,
    100_000_000_000,
    1_000_000_000_000,
    10_000_000_000_000,
    100_000_000_000_000,
    1_000_000_000_000_000,
    10_000_000_000_000_000,
    100_000_000_000_000_000,
    1_000_000_000_000_000_000,
];

/// Render a scaled integer (an integer meant to be read with `scale` implied
/// decimal places) as a decimal string, trimming trailing fractional zeros
/// but always keeping at least one fractional digit.
pub fn scale_to_double(value: i64, scale: u32) -> String {
    if scale == 0 {
        return format!("{value}.0");
    }
    if value < 0 {
        format!("-{}", scale_down(value.unsigned_abs(), scale))
    } else {
        scale_down(value as u64, scale)
    }
}

fn scale_down(value: u64, scale: u32) -> String {
    let pow10 = POWERS_OF_TEN[scale as usize] as u64;
    let whole = value / pow10;
    let frac = value % pow10;
    // Render the fractional part left-padded to `scale` digits, then trim
    // trailing zeros but keep at least the first fractional digit.
    let frac_str = format!("{:0width$}", frac, width = scale as usize);
    let trimmed = frac_str[1..].trim_end_matches('0');
    format!("{whole}.{}{trimmed}", &frac_str[..1])
}

/// Render a scaled integer as a plain (unscaled) integer string — used for
/// long-typed fields whose `scale` describes an implicit multiplier rather
/// than a decimal point.
pub fn scale_to_long(value: i64, scale: u32) -> String {
    (value * POWERS_OF_TEN[scale as usize]).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_round_trip_small_and_large() {
        for n in [0u64, 1, 127, 128, 300, 16384, u32::MAX as u64, u64::MAX] {
            let encoded = encode_varint(n);
            let mut reader = ByteReader::new(&encoded);
            assert_eq!(decode_varint(&mut reader).unwrap(), n);
        }
    }

    #[test]
    fn zigzag_round_trip() {
        for n in [0i64, 1, -1, 2, -2, i32::MAX as i64, i32::MIN as i64] {
            assert_eq!(decode_zigzag(encode_zigzag(n)), n);
        }
    }

    #[test]
    fn string_encoding_distinguishes_null_and_empty() {
        assert_eq!(encode_string(None), vec![0]);
        assert_eq!(encode_string(Some("")), vec![1]);

        let mut reader = ByteReader::new(&encode_string(None));
        assert_eq!(decode_string(&mut reader).unwrap(), None);

        let mut reader = ByteReader::new(&encode_string(Some("")));
        assert_eq!(decode_string(&mut reader).unwrap(), Some(String::new()));

        let mut reader = ByteReader::new(&encode_string(Some("EURUSD")));
        assert_eq!(decode_string(&mut reader).unwrap(), Some("EURUSD".to_string()));
    }

    #[test]
    fn strings_list_round_trip() {
        let list = vec!["Symbol".to_string(), "EURUSD".to_string(), "Level".to_string(), "1".to_string()];
        let encoded = encode_strings_list(&list);
        let mut reader = ByteReader::new(&encoded);
        assert_eq!(decode_strings_list(&mut reader).unwrap(), list);
    }

    #[test]
    fn scale_to_double_matches_reference_examples() {
        assert_eq!(scale_to_double(12345, 2), "123.45");
        assert_eq!(scale_to_double(-12345, 2), "-123.45");
        assert_eq!(scale_to_double(100, 2), "1.0");
        assert_eq!(scale_to_double(5, 0), "5.0");
        assert_eq!(scale_to_double(100500, 4), "10.05");
    }

    #[test]
    fn scale_to_long_applies_power_of_ten() {
        assert_eq!(scale_to_long(42, 3), "42000");
        assert_eq!(scale_to_long(0, 5), "0");
    }
}
