//! Community-based SNMPv2c session over UDP.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::client::{SnmpClient, SnmpError};
use crate::oid::Oid;
use crate::pdu::{Message, Pdu, PduType, Value, Varbind};

/// Default agent port.
pub const DEFAULT_SNMP_PORT: u16 = 161;

/// Largest datagram accepted from an agent.
const MAX_DATAGRAM: usize = 65_535;

/// Connection parameters for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub target: String,
    pub port: u16,
    pub community: String,
    /// Per-attempt response timeout.
    pub timeout: Duration,
    /// Retransmissions after the first attempt.
    pub retries: u32,
    /// max-repetitions for GetBulk during walks.
    pub max_repetitions: u32,
}

impl SessionConfig {
    pub fn new(target: impl Into<String>, community: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            port: DEFAULT_SNMP_PORT,
            community: community.into(),
            timeout: Duration::from_secs(5),
            retries: 1,
            max_repetitions: 25,
        }
    }
}

/// A v2c client bound to one agent.
///
/// Requests are serialized over one socket so that replies cannot be picked
/// up by a concurrent caller.
#[derive(Debug)]
pub struct UdpSession {
    socket: Mutex<UdpSocket>,
    peer: SocketAddr,
    community: Vec<u8>,
    timeout: Duration,
    retries: u32,
    max_repetitions: u32,
    next_request_id: AtomicI32,
}

impl UdpSession {
    /// Resolve the agent and open a connected socket.
    pub fn connect(config: &SessionConfig) -> Result<Self, SnmpError> {
        let peer = (config.target.as_str(), config.port)
            .to_socket_addrs()
            .map_err(|e| SnmpError::Resolve(format!("{}:{}: {e}", config.target, config.port)))?
            .next()
            .ok_or_else(|| SnmpError::Resolve(format!("{}:{}", config.target, config.port)))?;

        let local: SocketAddr = if peer.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local)?;
        socket.connect(peer)?;

        debug!(%peer, timeout = ?config.timeout, retries = config.retries, "SNMP session opened");

        Ok(Self {
            socket: Mutex::new(socket),
            peer,
            community: config.community.as_bytes().to_vec(),
            timeout: config.timeout,
            retries: config.retries,
            max_repetitions: config.max_repetitions.max(1),
            next_request_id: AtomicI32::new(seed_request_id()),
        })
    }

    /// Address of the agent.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn request_id(&self) -> i32 {
        // Request ids stay positive; some agents mishandle negative ones.
        self.next_request_id.fetch_add(1, Ordering::Relaxed) & i32::MAX
    }

    /// Send one PDU and wait for the matching response, retransmitting on
    /// timeout.
    fn exchange(&self, pdu: Pdu) -> Result<Pdu, SnmpError> {
        let request_id = pdu.request_id;
        let packet = Message::v2c(&self.community, pdu).encode()?;
        let attempts = self.retries + 1;

        let socket = self.socket.lock().unwrap_or_else(|e| e.into_inner());
        let mut buf = vec![0u8; MAX_DATAGRAM];

        for attempt in 1..=attempts {
            socket.send(&packet)?;
            trace!(request_id, attempt, bytes = packet.len(), "request sent");

            let deadline = Instant::now() + self.timeout;
            while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
                if remaining.is_zero() {
                    break;
                }
                socket.set_read_timeout(Some(remaining))?;
                let len = match socket.recv(&mut buf) {
                    Ok(len) => len,
                    Err(e) if is_timeout(&e) => break,
                    Err(e) => return Err(e.into()),
                };

                let reply = match Message::decode(&buf[..len]) {
                    Ok(reply) => reply,
                    Err(e) => {
                        debug!(error = %e, "discarding malformed datagram");
                        continue;
                    }
                };
                if reply.pdu.request_id != request_id {
                    trace!(got = reply.pdu.request_id, want = request_id, "discarding stale response");
                    continue;
                }
                if reply.pdu.kind != PduType::Response {
                    return Err(SnmpError::UnexpectedPdu(reply.pdu.kind.tag()));
                }
                if reply.pdu.error_status != 0 {
                    return Err(SnmpError::Agent {
                        status: reply.pdu.error_status,
                        index: reply.pdu.error_index,
                    });
                }
                return Ok(reply.pdu);
            }
            debug!(request_id, attempt, attempts, "request timed out");
        }

        Err(SnmpError::Timeout { attempts })
    }
}

impl SnmpClient for UdpSession {
    fn walk(&self, prefix: &Oid) -> Result<Vec<Varbind>, SnmpError> {
        let mut results = Vec::new();
        let mut cursor = prefix.clone();

        loop {
            let pdu = Pdu::get_bulk(
                self.request_id(),
                0,
                i64::from(self.max_repetitions),
                std::slice::from_ref(&cursor),
            );
            let response = self.exchange(pdu)?;
            if response.varbinds.is_empty() {
                return Ok(results);
            }

            for vb in response.varbinds {
                if vb.value == Value::EndOfMibView || !vb.name.starts_with(prefix) {
                    return Ok(results);
                }
                if vb.name <= cursor {
                    return Err(SnmpError::NonIncreasing(cursor));
                }
                cursor = vb.name.clone();
                results.push(vb);
            }
        }
    }

    fn get(&self, names: &[Oid]) -> Result<Vec<Varbind>, SnmpError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let response = self.exchange(Pdu::get(self.request_id(), names))?;
        Ok(response.varbinds)
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

fn seed_request_id() -> i32 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos & 0x3fff_ffff) as i32
}
