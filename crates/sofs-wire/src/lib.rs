//! Binary wire encoding for sofs.
//!
//! Little-endian primitive encodings behind the [`WireEncode`] /
//! [`WireDecode`] traits, plus the versioned frame helpers every durably
//! stored struct uses. See [`frame`] for the frame layout.

pub mod frame;
mod wire;

pub use frame::{FRAME_HEADER_SIZE, FrameWriter, encode_framed, finish_frame, read_frame};
pub use wire::{Cursor, WireDecode, WireEncode, WireError};
