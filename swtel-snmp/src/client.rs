//! SNMP client trait and errors.

use std::io;

use thiserror::Error;

use crate::ber::BerError;
use crate::oid::Oid;
use crate::pdu::{error_status_name, Varbind};

/// Errors from SNMP operations.
#[derive(Debug, Error)]
pub enum SnmpError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("cannot resolve agent address {0}")]
    Resolve(String),

    #[error("no response after {attempts} attempt(s)")]
    Timeout { attempts: u32 },

    #[error("malformed message: {0}")]
    Ber(#[from] BerError),

    #[error("agent returned {} (status {status}) at index {index}", status_name(.status))]
    Agent { status: i64, index: i64 },

    #[error("unexpected PDU type 0x{0:02x} in response")]
    UnexpectedPdu(u8),

    #[error("walk did not advance past {0}")]
    NonIncreasing(Oid),
}

fn status_name(status: &i64) -> &'static str {
    error_status_name(*status)
}

/// Trait for reading object values from a device.
/// Abstracted for testing with mock implementations.
pub trait SnmpClient: Send + Sync {
    /// Walk the subtree rooted at `prefix`, returning every binding below it
    /// in MIB order.
    fn walk(&self, prefix: &Oid) -> Result<Vec<Varbind>, SnmpError>;

    /// Fetch the given instances in a single request.
    ///
    /// Missing instances come back as exception values rather than errors;
    /// callers decide whether that is fatal.
    fn get(&self, names: &[Oid]) -> Result<Vec<Varbind>, SnmpError>;
}

impl<C: SnmpClient + ?Sized> SnmpClient for std::sync::Arc<C> {
    fn walk(&self, prefix: &Oid) -> Result<Vec<Varbind>, SnmpError> {
        (**self).walk(prefix)
    }

    fn get(&self, names: &[Oid]) -> Result<Vec<Varbind>, SnmpError> {
        (**self).get(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_error_names_status() {
        let err = SnmpError::Agent {
            status: 2,
            index: 1,
        };
        assert_eq!(err.to_string(), "agent returned noSuchName (status 2) at index 1");
    }

    #[test]
    fn test_timeout_display() {
        let err = SnmpError::Timeout { attempts: 2 };
        assert_eq!(err.to_string(), "no response after 2 attempt(s)");
    }

    #[test]
    fn test_ber_error_converts() {
        let err: SnmpError = BerError::InvalidLength.into();
        assert!(matches!(err, SnmpError::Ber(BerError::InvalidLength)));
    }
}
