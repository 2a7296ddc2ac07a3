//! Versioned frames for durably encoded structs.
//!
//! Every struct that lands on disk is wrapped in a frame carrying the
//! writer's compatibility version, its current version, and the byte length
//! of the body:
//!
//! ```text
//! +--------+---------+-------------+------ ... ------+
//! | compat | current | length: u32 | body (length B) |
//! +--------+---------+-------------+------ ... ------+
//! ```
//!
//! A reader refuses a frame whose `current` version exceeds what it
//! understands, and refuses a body whose declared length disagrees with the
//! bytes actually consumed. Fields added in later versions are read only
//! when the frame's version says they are present, so old frames stay
//! decodable forever.

use crate::wire::{Cursor, WireDecode, WireError};

/// Bytes occupied by a frame header.
pub const FRAME_HEADER_SIZE: usize = 6;

/// In-progress frame being written. Created by [`FrameWriter::begin`];
/// the header's length field is patched when [`FrameWriter::finish`] runs.
#[must_use]
pub struct FrameWriter {
    len_at: usize,
}

impl FrameWriter {
    /// Write a frame header with a zero length placeholder.
    pub fn begin(out: &mut Vec<u8>, compat: u8, current: u8) -> Self {
        debug_assert!(compat <= current);
        out.push(compat);
        out.push(current);
        let len_at = out.len();
        out.extend_from_slice(&[0u8; 4]);
        Self { len_at }
    }

    /// Patch the real body length into the header written by `begin`.
    pub fn finish(self, out: &mut Vec<u8>) -> Result<(), WireError> {
        let body = out.len() - self.len_at - 4;
        let len = u32::try_from(body).map_err(|_| WireError::LengthOverflow { len: body })?;
        out[self.len_at..self.len_at + 4].copy_from_slice(&len.to_le_bytes());
        Ok(())
    }
}

/// Read a frame header and return `(version, body_cursor)`.
///
/// The returned cursor is bounded to the declared body length; the outer
/// cursor is positioned past the frame. Fails with `UnsupportedVersion`
/// when the frame was written at a version newer than `supported`, and with
/// `MalformedFrame` when the header itself is inconsistent.
pub fn read_frame<'a>(
    cur: &mut Cursor<'a>,
    what: &'static str,
    supported: u8,
) -> Result<(u8, Cursor<'a>), WireError> {
    let compat = u8::decode(cur)?;
    let current = u8::decode(cur)?;
    if compat == 0 || compat > current {
        return Err(WireError::MalformedFrame { what });
    }
    if current > supported {
        return Err(WireError::UnsupportedVersion {
            what,
            version: current,
            supported,
        });
    }
    let len = u32::decode(cur)? as usize;
    let body = cur.take(len)?;
    Ok((current, Cursor::new(body)))
}

/// Verify the frame body was consumed exactly.
pub fn finish_frame(body: &Cursor<'_>, what: &'static str) -> Result<(), WireError> {
    if !body.is_exhausted() {
        return Err(WireError::TrailingBytes {
            what,
            leftover: body.remaining(),
        });
    }
    Ok(())
}

/// Encode `body` inside a `(compat, current, length)` frame.
pub fn encode_framed(
    out: &mut Vec<u8>,
    compat: u8,
    current: u8,
    body: impl FnOnce(&mut Vec<u8>) -> Result<(), WireError>,
) -> Result<(), WireError> {
    let frame = FrameWriter::begin(out, compat, current);
    body(out)?;
    frame.finish(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::WireEncode;

    fn frame_with(compat: u8, current: u8, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let frame = FrameWriter::begin(&mut out, compat, current);
        out.extend_from_slice(body);
        frame.finish(&mut out).unwrap();
        out
    }

    #[test]
    fn test_header_layout() {
        let buf = frame_with(1, 2, &[0xAA, 0xBB, 0xCC]);
        assert_eq!(buf.len(), FRAME_HEADER_SIZE + 3);
        assert_eq!(buf[0], 1); // compat
        assert_eq!(buf[1], 2); // current
        assert_eq!(u32::from_le_bytes(buf[2..6].try_into().unwrap()), 3);
    }

    #[test]
    fn test_roundtrip() {
        let mut out = Vec::new();
        encode_framed(&mut out, 1, 1, |b| {
            0x11223344u32.encode(b)?;
            "abc".encode(b)
        })
        .unwrap();

        let mut cur = Cursor::new(&out);
        let (version, mut body) = read_frame(&mut cur, "test", 1).unwrap();
        assert_eq!(version, 1);
        assert_eq!(u32::decode(&mut body).unwrap(), 0x11223344);
        assert_eq!(String::decode(&mut body).unwrap(), "abc");
        finish_frame(&body, "test").unwrap();
        assert!(cur.is_exhausted());
    }

    #[test]
    fn test_reject_newer_version() {
        let buf = frame_with(1, 3, &[]);
        let mut cur = Cursor::new(&buf);
        match read_frame(&mut cur, "test", 2).unwrap_err() {
            WireError::UnsupportedVersion {
                version, supported, ..
            } => {
                assert_eq!(version, 3);
                assert_eq!(supported, 2);
            }
            other => panic!("expected UnsupportedVersion, got {other:?}"),
        }
    }

    #[test]
    fn test_reject_inconsistent_header() {
        // compat greater than current
        let buf = frame_with(2, 2, &[]);
        let mut mangled = buf.clone();
        mangled[1] = 1;
        let mut cur = Cursor::new(&mangled);
        assert!(matches!(
            read_frame(&mut cur, "test", 2),
            Err(WireError::MalformedFrame { .. })
        ));

        // zero compat
        let mut zero = buf;
        zero[0] = 0;
        let mut cur = Cursor::new(&zero);
        assert!(matches!(
            read_frame(&mut cur, "test", 2),
            Err(WireError::MalformedFrame { .. })
        ));
    }

    #[test]
    fn test_reject_short_body() {
        let mut buf = frame_with(1, 1, &[1, 2, 3, 4]);
        buf.truncate(buf.len() - 2);
        let mut cur = Cursor::new(&buf);
        assert!(matches!(
            read_frame(&mut cur, "test", 1),
            Err(WireError::Truncated { .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_detected() {
        let buf = frame_with(1, 1, &[9, 9]);
        let mut cur = Cursor::new(&buf);
        let (_, body) = read_frame(&mut cur, "test", 1).unwrap();
        match finish_frame(&body, "test").unwrap_err() {
            WireError::TrailingBytes { leftover, .. } => assert_eq!(leftover, 2),
            other => panic!("expected TrailingBytes, got {other:?}"),
        }
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut out = frame_with(1, 1, &[0x01]);
        out.extend_from_slice(&frame_with(1, 1, &[0x02]));

        let mut cur = Cursor::new(&out);
        let (_, mut a) = read_frame(&mut cur, "test", 1).unwrap();
        assert_eq!(u8::decode(&mut a).unwrap(), 0x01);
        let (_, mut b) = read_frame(&mut cur, "test", 1).unwrap();
        assert_eq!(u8::decode(&mut b).unwrap(), 0x02);
        assert!(cur.is_exhausted());
    }
}
