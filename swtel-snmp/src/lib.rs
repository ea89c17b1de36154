//! SNMPv2c client for the switch telemetry agent.
//!
//! This crate provides:
//! - `Oid` object identifiers and a BER codec for SNMP messages
//! - `SnmpClient` trait for bulk walks and batched gets
//! - `UdpSession`, the real community-string client over UDP
//! - `MockSnmpClient` for testing without a device

pub mod ber;
pub mod client;
pub mod mock;
pub mod oid;
pub mod pdu;
pub mod session;

pub use ber::BerError;
pub use client::{SnmpClient, SnmpError};
pub use mock::MockSnmpClient;
pub use oid::{Oid, OidParseError};
pub use pdu::{Message, Pdu, PduType, Value, Varbind, VERSION_2C};
pub use session::{SessionConfig, UdpSession, DEFAULT_SNMP_PORT};
