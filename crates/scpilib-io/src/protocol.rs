//! SCPI response framing and binary block decoding.
//!
//! An instrument answers a query with either one line of ASCII text ended
//! by the read terminator, or an IEEE 488.2 binary block:
//!
//! ```text
//! #<n><len><payload>[terminator]   definite length: n digits of len
//! #0<payload><terminator>          indefinite length
//! ```
//!
//! The block marker byte is configurable; `#` is the standard one.

use bytes::{Buf, BufMut, BytesMut};

use scpilib_core::error::{Error, Result};

/// Default line terminator for commands and responses.
pub const DEFAULT_TERMINATOR: u8 = b'\n';

/// Default first byte of a binary block.
pub const DEFAULT_BLOCK_MARKER: u8 = b'#';

/// Element format of binary float blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinFloatFormat {
    /// IEEE-754 single precision, little-endian.
    #[default]
    Real32Le,
    /// IEEE-754 single precision, big-endian.
    Real32Be,
    /// IEEE-754 double precision, little-endian.
    Real64Le,
    /// IEEE-754 double precision, big-endian.
    Real64Be,
}

impl BinFloatFormat {
    /// Bytes per element.
    pub fn element_size(self) -> usize {
        match self {
            BinFloatFormat::Real32Le | BinFloatFormat::Real32Be => 4,
            BinFloatFormat::Real64Le | BinFloatFormat::Real64Be => 8,
        }
    }
}

/// Result of attempting to decode one response from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// An ASCII line, terminator and trailing `\r` removed.
    Line {
        text: String,
        /// Number of bytes consumed from the input buffer.
        consumed: usize,
    },

    /// A binary block payload.
    Block {
        payload: Vec<u8>,
        /// Number of bytes consumed from the input buffer.
        consumed: usize,
        /// Whether the terminator after a definite block was consumed too.
        terminated: bool,
    },

    /// The bytes cannot be a valid response (bad block header, non-UTF-8
    /// line).
    Invalid {
        message: String,
        /// Number of bytes to discard.
        consumed: usize,
    },

    /// The buffer does not yet contain a complete response. More data is needed.
    Incomplete,
}

/// Decode one response from the front of `buf`.
///
/// A response whose first byte is `block_marker` is decoded as a binary
/// block, anything else as a line ending at `terminator`.
///
/// An indefinite block (`#0`) is only complete once the buffer ends with the
/// terminator, since the payload itself may contain terminator bytes.
pub fn decode_response(buf: &[u8], terminator: u8, block_marker: u8) -> DecodeResult {
    if buf.is_empty() {
        return DecodeResult::Incomplete;
    }
    if buf[0] == block_marker {
        decode_block(buf, terminator)
    } else {
        decode_line(buf, terminator)
    }
}

/// Decode one terminator-ended ASCII line.
pub fn decode_line(buf: &[u8], terminator: u8) -> DecodeResult {
    let term_pos = match buf.iter().position(|&b| b == terminator) {
        Some(pos) => pos,
        None => return DecodeResult::Incomplete,
    };

    let consumed = term_pos + 1;
    let mut body = &buf[..term_pos];
    if body.last() == Some(&b'\r') {
        body = &body[..body.len() - 1];
    }

    match std::str::from_utf8(body) {
        Ok(s) => DecodeResult::Line {
            text: s.to_string(),
            consumed,
        },
        Err(_) => DecodeResult::Invalid {
            message: "response line is not valid UTF-8".into(),
            consumed,
        },
    }
}

fn decode_block(buf: &[u8], terminator: u8) -> DecodeResult {
    let digits = match buf.get(1) {
        Some(d) if d.is_ascii_digit() => (d - b'0') as usize,
        Some(_) => {
            return DecodeResult::Invalid {
                message: "binary block header: length-digit count is not a digit".into(),
                consumed: buf
                    .iter()
                    .position(|&b| b == terminator)
                    .map_or(buf.len(), |p| p + 1),
            }
        }
        None => return DecodeResult::Incomplete,
    };

    if digits == 0 {
        // Indefinite length: payload runs to the final terminator.
        return match buf.last() {
            Some(&b) if b == terminator && buf.len() >= 3 => DecodeResult::Block {
                payload: buf[2..buf.len() - 1].to_vec(),
                consumed: buf.len(),
                terminated: true,
            },
            _ => DecodeResult::Incomplete,
        };
    }

    let header_len = 2 + digits;
    if buf.len() < header_len {
        return DecodeResult::Incomplete;
    }
    let len_field = &buf[2..header_len];
    let len = match std::str::from_utf8(len_field)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
    {
        Some(len) => len,
        None => {
            return DecodeResult::Invalid {
                message: format!("binary block header: bad length field {len_field:?}"),
                consumed: buf.len(),
            }
        }
    };

    let end = header_len + len;
    if buf.len() < end {
        return DecodeResult::Incomplete;
    }
    let terminated = buf.get(end) == Some(&terminator);
    DecodeResult::Block {
        payload: buf[header_len..end].to_vec(),
        consumed: if terminated { end + 1 } else { end },
        terminated,
    }
}

/// Decode a binary block payload into floats.
///
/// A payload whose length is not a whole number of elements is a decode
/// error.
pub fn decode_float_block(payload: &[u8], format: BinFloatFormat) -> Result<Vec<f64>> {
    let size = format.element_size();
    if payload.len() % size != 0 {
        return Err(Error::decode(
            format!(
                "binary block of {} bytes is not a multiple of {size}-byte elements",
                payload.len()
            ),
            format!("{payload:02X?}"),
        ));
    }

    let mut cursor = payload;
    let mut out = Vec::with_capacity(payload.len() / size);
    while cursor.has_remaining() {
        let v = match format {
            BinFloatFormat::Real32Le => cursor.get_f32_le() as f64,
            BinFloatFormat::Real32Be => cursor.get_f32() as f64,
            BinFloatFormat::Real64Le => cursor.get_f64_le(),
            BinFloatFormat::Real64Be => cursor.get_f64(),
        };
        out.push(v);
    }
    Ok(out)
}

/// Encode floats as a definite-length binary block (no terminator).
pub fn encode_float_block(values: &[f64], format: BinFloatFormat, block_marker: u8) -> BytesMut {
    let mut payload = BytesMut::with_capacity(values.len() * format.element_size());
    for &v in values {
        match format {
            BinFloatFormat::Real32Le => payload.put_f32_le(v as f32),
            BinFloatFormat::Real32Be => payload.put_f32(v as f32),
            BinFloatFormat::Real64Le => payload.put_f64_le(v),
            BinFloatFormat::Real64Be => payload.put_f64(v),
        }
    }

    let len = payload.len().to_string();
    let mut out = BytesMut::with_capacity(2 + len.len() + payload.len());
    out.put_u8(block_marker);
    out.put_u8(b'0' + len.len() as u8);
    out.put_slice(len.as_bytes());
    out.put_slice(&payload);
    out
}

/// Frame a command for the wire: the text followed by the terminator.
pub fn encode_command(cmd: &str, terminator: u8) -> BytesMut {
    let mut out = BytesMut::with_capacity(cmd.len() + 1);
    out.put_slice(cmd.as_bytes());
    out.put_u8(terminator);
    out
}
