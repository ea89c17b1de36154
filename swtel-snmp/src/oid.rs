//! Object identifiers.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::ber::BerError;

/// Error parsing a dotted OID string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid OID {input:?}: {reason}")]
pub struct OidParseError {
    pub input: String,
    pub reason: String,
}

/// An SNMP object identifier.
///
/// Ordering is lexicographic over the arcs, which is the order agents walk
/// their MIB in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid(Vec<u32>);

impl Oid {
    pub fn new(arcs: Vec<u32>) -> Self {
        Self(arcs)
    }

    pub fn arcs(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last arc, i.e. the row index for a table column instance.
    pub fn last(&self) -> Option<u32> {
        self.0.last().copied()
    }

    /// Append one arc.
    pub fn child(&self, arc: u32) -> Oid {
        let mut arcs = self.0.clone();
        arcs.push(arc);
        Oid(arcs)
    }

    /// True if `self` lies at or below `prefix`.
    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// BER content octets.
    pub fn encode_content(&self) -> Result<Vec<u8>, BerError> {
        let (first, second) = match self.0.as_slice() {
            [first, second, ..] => (*first, *second),
            _ => {
                return Err(BerError::InvalidOid(format!(
                    "{} needs at least two arcs",
                    self
                )))
            }
        };
        if first > 2 || (first < 2 && second >= 40) {
            return Err(BerError::InvalidOid(format!(
                "{} has an invalid leading arc pair",
                self
            )));
        }

        let mut out = Vec::with_capacity(self.0.len() + 4);
        write_base128(u64::from(first) * 40 + u64::from(second), &mut out);
        for &arc in &self.0[2..] {
            write_base128(u64::from(arc), &mut out);
        }
        Ok(out)
    }

    /// Decode BER content octets.
    pub fn decode_content(content: &[u8]) -> Result<Oid, BerError> {
        if content.is_empty() {
            return Err(BerError::InvalidOid("empty content".to_string()));
        }

        let mut subids = Vec::new();
        let mut acc: u64 = 0;
        let mut pending = false;
        for &b in content {
            if acc > u64::from(u32::MAX) {
                return Err(BerError::InvalidOid("sub-identifier too large".to_string()));
            }
            acc = (acc << 7) | u64::from(b & 0x7f);
            pending = b & 0x80 != 0;
            if !pending {
                subids.push(acc);
                acc = 0;
            }
        }
        if pending {
            return Err(BerError::InvalidOid("unterminated sub-identifier".to_string()));
        }

        let mut arcs = Vec::with_capacity(subids.len() + 1);
        let combined = subids[0];
        let (first, second) = match combined {
            0..=39 => (0, combined),
            40..=79 => (1, combined - 40),
            _ => (2, combined - 80),
        };
        arcs.push(first);
        arcs.push(to_arc(second)?);
        for &subid in &subids[1..] {
            arcs.push(to_arc(subid)?);
        }
        Ok(Oid(arcs))
    }
}

fn to_arc(value: u64) -> Result<u32, BerError> {
    u32::try_from(value).map_err(|_| BerError::InvalidOid(format!("arc {value} exceeds 32 bits")))
}

fn write_base128(value: u64, out: &mut Vec<u8>) {
    let mut groups = [0u8; 10];
    let mut n = 0;
    let mut v = value;
    loop {
        groups[n] = (v & 0x7f) as u8;
        n += 1;
        v >>= 7;
        if v == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let continuation = if i > 0 { 0x80 } else { 0 };
        out.push(groups[i] | continuation);
    }
}

impl fmt::Display for Oid {
    /// Dotted form with a leading dot, e.g. `.1.3.6.1.2.1.31.1.1.1.18`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for arc in &self.0 {
            write!(f, ".{arc}")?;
        }
        Ok(())
    }
}

impl FromStr for Oid {
    type Err = OidParseError;

    /// Accepts dotted notation with or without the leading dot.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason: &str| OidParseError {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = s.trim();
        let body = trimmed.strip_prefix('.').unwrap_or(trimmed);
        if body.is_empty() {
            return Err(err("empty"));
        }

        let arcs = body
            .split('.')
            .map(|part| {
                part.parse::<u32>()
                    .map_err(|_| err(&format!("bad arc {part:?}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if arcs.len() < 2 {
            return Err(err("needs at least two arcs"));
        }
        Ok(Oid(arcs))
    }
}
