use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

/// Errors surfaced while encoding or decoding wire data.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("truncated buffer: need {need} bytes but only {have} remain")]
    Truncated { need: usize, have: usize },
    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,
    #[error("length overflow: {len} bytes does not fit a u32 prefix")]
    LengthOverflow { len: usize },
    #[error("unsupported {what} version {version} (reader supports up to {supported})")]
    UnsupportedVersion {
        what: &'static str,
        version: u8,
        supported: u8,
    },
    #[error("malformed {what} frame header")]
    MalformedFrame { what: &'static str },
    #[error("{leftover} trailing bytes after decoding {what}")]
    TrailingBytes { what: &'static str, leftover: usize },
}

/// A bounds-checked read position over a byte slice.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Whether every byte has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.pos == self.buf.len()
    }

    /// Consume and return the next `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.remaining() < n {
            return Err(WireError::Truncated {
                need: n,
                have: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }
}

/// Types that can be written to the wire.
pub trait WireEncode {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError>;
}

/// Types that can be read back from the wire.
pub trait WireDecode: Sized {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, WireError>;
}

// ---------------------------------------------------------------------------
// Integers
// ---------------------------------------------------------------------------

macro_rules! impl_wire_for_int {
    ($ty:ty, $size:expr, $read:ident, $write:ident) => {
        impl WireEncode for $ty {
            fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
                let mut tmp = [0u8; $size];
                LittleEndian::$write(&mut tmp, *self);
                out.extend_from_slice(&tmp);
                Ok(())
            }
        }

        impl WireDecode for $ty {
            fn decode(cur: &mut Cursor<'_>) -> Result<Self, WireError> {
                let bytes = cur.take($size)?;
                Ok(LittleEndian::$read(bytes))
            }
        }
    };
}

impl_wire_for_int!(u16, 2, read_u16, write_u16);
impl_wire_for_int!(u32, 4, read_u32, write_u32);
impl_wire_for_int!(u64, 8, read_u64, write_u64);

// u8 is a single byte, no endianness needed.

impl WireEncode for u8 {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        out.push(*self);
        Ok(())
    }
}

impl WireDecode for u8 {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, WireError> {
        Ok(cur.take(1)?[0])
    }
}

// ---------------------------------------------------------------------------
// bool
// ---------------------------------------------------------------------------

impl WireEncode for bool {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        out.push(u8::from(*self));
        Ok(())
    }
}

impl WireDecode for bool {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, WireError> {
        Ok(u8::decode(cur)? != 0)
    }
}

// ---------------------------------------------------------------------------
// String (u32 byte count + UTF-8 bytes)
// ---------------------------------------------------------------------------

fn encode_len(len: usize, out: &mut Vec<u8>) -> Result<(), WireError> {
    let len = u32::try_from(len).map_err(|_| WireError::LengthOverflow { len })?;
    len.encode(out)
}

impl WireEncode for String {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.as_str().encode(out)
    }
}

impl WireEncode for &str {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        encode_len(self.len(), out)?;
        out.extend_from_slice(self.as_bytes());
        Ok(())
    }
}

impl WireDecode for String {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, WireError> {
        let len = u32::decode(cur)? as usize;
        let bytes = cur.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::InvalidUtf8)
    }
}

// ---------------------------------------------------------------------------
// Vec<T> (u32 element count + elements)
// ---------------------------------------------------------------------------

impl<T: WireEncode> WireEncode for Vec<T> {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        encode_len(self.len(), out)?;
        for item in self {
            item.encode(out)?;
        }
        Ok(())
    }
}

impl<T: WireDecode> WireDecode for Vec<T> {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, WireError> {
        let len = u32::decode(cur)? as usize;
        let mut result = Vec::with_capacity(len.min(4096));
        for _ in 0..len {
            result.push(T::decode(cur)?);
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<T: WireEncode + WireDecode + std::fmt::Debug + PartialEq>(val: &T) -> T {
        let mut buf = Vec::new();
        val.encode(&mut buf).unwrap();
        let mut cur = Cursor::new(&buf);
        let result = T::decode(&mut cur).unwrap();
        assert!(cur.is_exhausted(), "all bytes should be consumed");
        result
    }

    #[test]
    fn test_u8() {
        assert_eq!(roundtrip(&0u8), 0u8);
        assert_eq!(roundtrip(&255u8), 255u8);
    }

    #[test]
    fn test_u16() {
        assert_eq!(roundtrip(&0x1234u16), 0x1234u16);
        assert_eq!(roundtrip(&u16::MAX), u16::MAX);
    }

    #[test]
    fn test_u32() {
        assert_eq!(roundtrip(&0xDEADBEEFu32), 0xDEADBEEFu32);
    }

    #[test]
    fn test_u64() {
        assert_eq!(roundtrip(&0u64), 0u64);
        assert_eq!(roundtrip(&u64::MAX), u64::MAX);
    }

    #[test]
    fn test_bool() {
        assert!(roundtrip(&true));
        assert!(!roundtrip(&false));
    }

    #[test]
    fn test_string() {
        assert_eq!(roundtrip(&String::new()), String::new());
        assert_eq!(roundtrip(&"hello world".to_string()), "hello world");
        assert_eq!(roundtrip(&"utf-8: \u{1F600}".to_string()), "utf-8: \u{1F600}");
    }

    #[test]
    fn test_vec_u64() {
        assert_eq!(roundtrip(&Vec::<u64>::new()), Vec::<u64>::new());
        assert_eq!(roundtrip(&vec![100u64, 200, 300]), vec![100u64, 200, 300]);
    }

    #[test]
    fn test_little_endian_layout() {
        let mut buf = Vec::new();
        0x04030201u32.encode(&mut buf).unwrap();
        assert_eq!(buf, vec![0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_truncated() {
        let buf = vec![0u8; 2];
        let mut cur = Cursor::new(&buf);
        let result = u32::decode(&mut cur);
        match result.unwrap_err() {
            WireError::Truncated { need, have } => {
                assert_eq!(need, 4);
                assert_eq!(have, 2);
            }
            other => panic!("expected Truncated, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_utf8() {
        let mut buf = Vec::new();
        2u32.encode(&mut buf).unwrap();
        buf.extend_from_slice(&[0xFF, 0xFE]);
        let mut cur = Cursor::new(&buf);
        assert!(matches!(
            String::decode(&mut cur),
            Err(WireError::InvalidUtf8)
        ));
    }

    #[test]
    fn test_string_truncated_payload() {
        let mut buf = Vec::new();
        10u32.encode(&mut buf).unwrap();
        buf.extend_from_slice(b"abc");
        let mut cur = Cursor::new(&buf);
        assert!(matches!(
            String::decode(&mut cur),
            Err(WireError::Truncated { .. })
        ));
    }

    #[test]
    fn test_multiple_values_in_buffer() {
        let mut buf = Vec::new();
        42u32.encode(&mut buf).unwrap();
        "hello".to_string().encode(&mut buf).unwrap();
        true.encode(&mut buf).unwrap();

        let mut cur = Cursor::new(&buf);
        assert_eq!(u32::decode(&mut cur).unwrap(), 42);
        assert_eq!(String::decode(&mut cur).unwrap(), "hello");
        assert!(bool::decode(&mut cur).unwrap());
        assert!(cur.is_exhausted());
    }
}
