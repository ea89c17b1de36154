//! Basic Encoding Rules primitives used by SNMP messages.
//!
//! Only the subset SNMPv2c needs: single-byte tags, definite lengths up to
//! four length octets, two's complement integers and unsigned application
//! integers.

use thiserror::Error;

/// Errors from decoding (or, rarely, encoding) BER data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BerError {
    #[error("truncated data: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("invalid length encoding")]
    InvalidLength,

    #[error("integer does not fit in {bits} bits")]
    IntegerOverflow { bits: u32 },

    #[error("empty integer content")]
    EmptyInteger,

    #[error("expected tag 0x{expected:02x}, found 0x{found:02x}")]
    UnexpectedTag { expected: u8, found: u8 },

    #[error("unsupported tag 0x{0:02x}")]
    UnsupportedTag(u8),

    #[error("invalid object identifier: {0}")]
    InvalidOid(String),

    #[error("{0} trailing bytes after value")]
    TrailingData(usize),
}

/// Append a length in definite form.
pub fn write_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = (len as u64).to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    let significant = &bytes[skip..];
    out.push(0x80 | significant.len() as u8);
    out.extend_from_slice(significant);
}

/// Append a complete tag-length-value element.
pub fn write_tlv(tag: u8, content: &[u8], out: &mut Vec<u8>) {
    out.push(tag);
    write_length(content.len(), out);
    out.extend_from_slice(content);
}

/// Minimal two's complement content octets for a signed integer.
pub fn integer_content(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant_zero = bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0;
        let redundant_ones = bytes[start] == 0xff && bytes[start + 1] & 0x80 != 0;
        if !(redundant_zero || redundant_ones) {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

/// Content octets for an unsigned application integer (Counter32, Counter64...).
/// A leading zero is added when the high bit would otherwise read as a sign.
pub fn unsigned_content(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes
        .iter()
        .take(bytes.len() - 1)
        .take_while(|&&b| b == 0)
        .count();
    let mut out = Vec::with_capacity(9);
    if bytes[skip] & 0x80 != 0 {
        out.push(0);
    }
    out.extend_from_slice(&bytes[skip..]);
    out
}

/// Decode a signed two's complement integer of at most 64 bits.
pub fn decode_integer(content: &[u8]) -> Result<i64, BerError> {
    if content.is_empty() {
        return Err(BerError::EmptyInteger);
    }
    if content.len() > 8 {
        return Err(BerError::IntegerOverflow { bits: 64 });
    }
    let mut value: i64 = if content[0] & 0x80 != 0 { -1 } else { 0 };
    for &b in content {
        value = (value << 8) | i64::from(b);
    }
    Ok(value)
}

/// Decode an unsigned application integer of at most 64 bits.
///
/// Some agents encode large counters without the leading zero octet; those
/// are read as unsigned rather than rejected.
pub fn decode_unsigned(content: &[u8]) -> Result<u64, BerError> {
    if content.is_empty() {
        return Err(BerError::EmptyInteger);
    }
    let digits = if content.len() > 1 && content[0] == 0 {
        &content[1..]
    } else {
        content
    };
    if digits.len() > 8 {
        return Err(BerError::IntegerOverflow { bits: 64 });
    }
    Ok(digits.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
}

/// Decode an unsigned application integer that must fit in 32 bits.
pub fn decode_unsigned32(content: &[u8]) -> Result<u32, BerError> {
    let value = decode_unsigned(content)?;
    u32::try_from(value).map_err(|_| BerError::IntegerOverflow { bits: 32 })
}

/// Cursor over a buffer of BER elements.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Fail unless every byte has been consumed.
    pub fn finish(&self) -> Result<(), BerError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(BerError::TrailingData(n)),
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], BerError> {
        let available = self.remaining();
        if n > available {
            return Err(BerError::Truncated {
                needed: n,
                available,
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_length(&mut self) -> Result<usize, BerError> {
        let first = self.take(1)?[0];
        if first < 0x80 {
            return Ok(usize::from(first));
        }
        let octets = usize::from(first & 0x7f);
        // 0x80 is the indefinite form, which SNMP forbids.
        if octets == 0 || octets > 4 {
            return Err(BerError::InvalidLength);
        }
        Ok(self
            .take(octets)?
            .iter()
            .fold(0usize, |acc, &b| (acc << 8) | usize::from(b)))
    }

    /// Read the next element, returning its tag and content octets.
    pub fn read_tlv(&mut self) -> Result<(u8, &'a [u8]), BerError> {
        let tag = self.take(1)?[0];
        if tag & 0x1f == 0x1f {
            return Err(BerError::UnsupportedTag(tag));
        }
        let len = self.read_length()?;
        let content = self.take(len)?;
        Ok((tag, content))
    }

    /// Read the next element and require a specific tag.
    pub fn expect(&mut self, expected: u8) -> Result<&'a [u8], BerError> {
        let (found, content) = self.read_tlv()?;
        if found != expected {
            return Err(BerError::UnexpectedTag { expected, found });
        }
        Ok(content)
    }
}
