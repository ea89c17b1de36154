//! Counter decoding for a batched fetch.
//!
//! A sampling cycle is all or nothing: any binding that is not a counter
//! reading for a requested name fails the whole cycle.

use std::collections::{BTreeMap, BTreeSet};

use swtel_snmp::{Oid, Value, Varbind};
use thiserror::Error;

/// Why a fetch response could not be turned into counter readings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("empty response for {requested} requested OIDs")]
    Empty { requested: usize },

    #[error("response contains unrequested OID {0}")]
    Unexpected(Oid),

    #[error("response contains {0} more than once")]
    Duplicate(Oid),

    #[error("response is missing {0}")]
    Missing(Oid),

    #[error("{name} is not available on the device ({kind})")]
    Unavailable { name: Oid, kind: &'static str },

    #[error("{name} has type {kind}, expected Counter32 or Counter64")]
    NotCounter { name: Oid, kind: &'static str },
}

/// Read a counter value. Only the two counter widths are accepted.
pub fn counter_value(name: &Oid, value: &Value) -> Result<u64, DecodeError> {
    match value {
        Value::Counter32(v) => Ok(u64::from(*v)),
        Value::Counter64(v) => Ok(*v),
        other if other.is_exception() => Err(DecodeError::Unavailable {
            name: name.clone(),
            kind: other.type_name(),
        }),
        other => Err(DecodeError::NotCounter {
            name: name.clone(),
            kind: other.type_name(),
        }),
    }
}

/// Decode the response to a fetch of `requested`.
///
/// Every requested name must appear exactly once with a counter value, and
/// nothing else may appear.
pub fn decode_counters(
    requested: &[Oid],
    response: &[Varbind],
) -> Result<BTreeMap<Oid, u64>, DecodeError> {
    if response.is_empty() && !requested.is_empty() {
        return Err(DecodeError::Empty {
            requested: requested.len(),
        });
    }

    let wanted: BTreeSet<&Oid> = requested.iter().collect();
    let mut values = BTreeMap::new();
    for vb in response {
        if !wanted.contains(&vb.name) {
            return Err(DecodeError::Unexpected(vb.name.clone()));
        }
        let value = counter_value(&vb.name, &vb.value)?;
        if values.insert(vb.name.clone(), value).is_some() {
            return Err(DecodeError::Duplicate(vb.name.clone()));
        }
    }

    if let Some(missing) = requested.iter().find(|name| !values.contains_key(*name)) {
        return Err(DecodeError::Missing(missing.clone()));
    }
    Ok(values)
}
