//! Binary codec for captured responses.
//!
//! ```text
//! [status: i16 LE]
//! [varint header-count]
//!   { [varint name-len][name] [varint value-count] { [varint value-len][value] }* }*
//! [varint body-len][body]
//! ```
//!
//! Varints are LEB128: 7 bits per byte, low group first, high bit set on every
//! byte but the last. The format is only ever read back by the process family
//! that wrote it; there is no version tag.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::cache::capture::CachedResponse;

/// A `u64` never needs more than ten 7-bit groups.
const MAX_VARINT_LEN: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("record truncated at offset {0}")]
    Truncated(usize),

    #[error("varint at offset {0} overflows 64 bits")]
    VarintOverflow(usize),

    #[error("header text at offset {0} is not valid UTF-8")]
    InvalidUtf8(usize),

    #[error("{0} trailing bytes after body")]
    TrailingBytes(usize),

    #[error("{names} header names but {values} value lists")]
    LengthMismatch { names: usize, values: usize },
}

pub fn encode(response: &CachedResponse) -> Result<Bytes, CodecError> {
    if response.header_names.len() != response.header_values.len() {
        return Err(CodecError::LengthMismatch {
            names: response.header_names.len(),
            values: response.header_values.len(),
        });
    }

    let mut buf = BytesMut::with_capacity(encoded_len_hint(response));
    buf.put_i16_le(response.status as i16);
    put_varint(&mut buf, response.header_names.len() as u64);
    for (name, values) in response.header_names.iter().zip(&response.header_values) {
        put_bytes(&mut buf, name.as_bytes());
        put_varint(&mut buf, values.len() as u64);
        for value in values {
            put_bytes(&mut buf, value.as_bytes());
        }
    }
    put_bytes(&mut buf, &response.body);
    Ok(buf.freeze())
}

pub fn decode(data: &[u8]) -> Result<CachedResponse, CodecError> {
    let mut reader = Reader { data, pos: 0 };

    let status = i16::from_le_bytes(reader.array::<2>()?) as u16;

    let count = reader.len()?;
    let mut header_names = Vec::with_capacity(count.min(64));
    let mut header_values = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        header_names.push(reader.string()?);
        let value_count = reader.len()?;
        let mut values = Vec::with_capacity(value_count.min(16));
        for _ in 0..value_count {
            values.push(reader.string()?);
        }
        header_values.push(values);
    }

    let body = Bytes::copy_from_slice(reader.bytes()?);

    let rest = data.len() - reader.pos;
    if rest != 0 {
        return Err(CodecError::TrailingBytes(rest));
    }

    Ok(CachedResponse {
        status,
        header_names,
        header_values,
        body,
    })
}

fn encoded_len_hint(response: &CachedResponse) -> usize {
    let headers: usize = response
        .header_names
        .iter()
        .zip(&response.header_values)
        .map(|(n, vs)| n.len() + 2 + vs.iter().map(|v| v.len() + 1).sum::<usize>())
        .sum();
    2 + 2 + headers + response.body.len() + MAX_VARINT_LEN
}

fn put_varint(buf: &mut BytesMut, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

fn put_bytes(buf: &mut BytesMut, bytes: &[u8]) {
    put_varint(buf, bytes.len() as u64);
    buf.put_slice(bytes);
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or(CodecError::Truncated(self.pos))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn varint(&mut self) -> Result<u64, CodecError> {
        let start = self.pos;
        let mut value = 0u64;
        for i in 0..MAX_VARINT_LEN {
            let byte = *self
                .data
                .get(self.pos)
                .ok_or(CodecError::Truncated(self.pos))?;
            self.pos += 1;

            let group = u64::from(byte & 0x7f);
            // The tenth byte may only carry the single remaining bit.
            if i == MAX_VARINT_LEN - 1 && group > 1 {
                return Err(CodecError::VarintOverflow(start));
            }
            value |= group << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(CodecError::VarintOverflow(start))
    }

    /// A length prefix; anything longer than what is left cannot be valid.
    fn len(&mut self) -> Result<usize, CodecError> {
        let at = self.pos;
        let value = self.varint()?;
        usize::try_from(value)
            .ok()
            .filter(|&n| n <= self.data.len() - self.pos)
            .ok_or(CodecError::Truncated(at))
    }

    fn bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let n = self.len()?;
        self.take(n)
    }

    fn string(&mut self) -> Result<String, CodecError> {
        let at = self.pos;
        let raw = self.bytes()?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8(at))
    }
}
