//! SNMPv2c messages, PDUs and variable bindings.

use std::fmt;

use crate::ber::{
    decode_integer, decode_unsigned, decode_unsigned32, integer_content, unsigned_content,
    write_tlv, BerError, Reader,
};
use crate::oid::Oid;

/// Message version field for SNMPv2c.
pub const VERSION_2C: i64 = 1;

/// Universal and application tags.
pub mod tag {
    pub const INTEGER: u8 = 0x02;
    pub const OCTET_STRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OBJECT_IDENTIFIER: u8 = 0x06;
    pub const SEQUENCE: u8 = 0x30;

    pub const IP_ADDRESS: u8 = 0x40;
    pub const COUNTER32: u8 = 0x41;
    pub const GAUGE32: u8 = 0x42;
    pub const TIME_TICKS: u8 = 0x43;
    pub const OPAQUE: u8 = 0x44;
    pub const COUNTER64: u8 = 0x46;

    pub const NO_SUCH_OBJECT: u8 = 0x80;
    pub const NO_SUCH_INSTANCE: u8 = 0x81;
    pub const END_OF_MIB_VIEW: u8 = 0x82;
}

/// A varbind value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    OctetString(Vec<u8>),
    Null,
    ObjectId(Oid),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Opaque(Vec<u8>),
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl Value {
    /// Short type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "INTEGER",
            Value::OctetString(_) => "OCTET STRING",
            Value::Null => "NULL",
            Value::ObjectId(_) => "OBJECT IDENTIFIER",
            Value::IpAddress(_) => "IpAddress",
            Value::Counter32(_) => "Counter32",
            Value::Gauge32(_) => "Gauge32",
            Value::TimeTicks(_) => "TimeTicks",
            Value::Opaque(_) => "Opaque",
            Value::Counter64(_) => "Counter64",
            Value::NoSuchObject => "noSuchObject",
            Value::NoSuchInstance => "noSuchInstance",
            Value::EndOfMibView => "endOfMibView",
        }
    }

    /// True for the v2c exception values.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    /// The value as text, if it is an OCTET STRING.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::OctetString(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<(), BerError> {
        match self {
            Value::Integer(v) => write_tlv(tag::INTEGER, &integer_content(*v), out),
            Value::OctetString(bytes) => write_tlv(tag::OCTET_STRING, bytes, out),
            Value::Null => write_tlv(tag::NULL, &[], out),
            Value::ObjectId(oid) => write_tlv(tag::OBJECT_IDENTIFIER, &oid.encode_content()?, out),
            Value::IpAddress(addr) => write_tlv(tag::IP_ADDRESS, addr, out),
            Value::Counter32(v) => write_tlv(tag::COUNTER32, &unsigned_content(u64::from(*v)), out),
            Value::Gauge32(v) => write_tlv(tag::GAUGE32, &unsigned_content(u64::from(*v)), out),
            Value::TimeTicks(v) => write_tlv(tag::TIME_TICKS, &unsigned_content(u64::from(*v)), out),
            Value::Opaque(bytes) => write_tlv(tag::OPAQUE, bytes, out),
            Value::Counter64(v) => write_tlv(tag::COUNTER64, &unsigned_content(*v), out),
            Value::NoSuchObject => write_tlv(tag::NO_SUCH_OBJECT, &[], out),
            Value::NoSuchInstance => write_tlv(tag::NO_SUCH_INSTANCE, &[], out),
            Value::EndOfMibView => write_tlv(tag::END_OF_MIB_VIEW, &[], out),
        }
        Ok(())
    }

    fn decode(tag_byte: u8, content: &[u8]) -> Result<Value, BerError> {
        Ok(match tag_byte {
            tag::INTEGER => Value::Integer(decode_integer(content)?),
            tag::OCTET_STRING => Value::OctetString(content.to_vec()),
            tag::NULL => Value::Null,
            tag::OBJECT_IDENTIFIER => Value::ObjectId(Oid::decode_content(content)?),
            tag::IP_ADDRESS => {
                let addr: [u8; 4] = content.try_into().map_err(|_| BerError::InvalidLength)?;
                Value::IpAddress(addr)
            }
            tag::COUNTER32 => Value::Counter32(decode_unsigned32(content)?),
            tag::GAUGE32 => Value::Gauge32(decode_unsigned32(content)?),
            tag::TIME_TICKS => Value::TimeTicks(decode_unsigned32(content)?),
            tag::OPAQUE => Value::Opaque(content.to_vec()),
            tag::COUNTER64 => Value::Counter64(decode_unsigned(content)?),
            tag::NO_SUCH_OBJECT => Value::NoSuchObject,
            tag::NO_SUCH_INSTANCE => Value::NoSuchInstance,
            tag::END_OF_MIB_VIEW => Value::EndOfMibView,
            other => return Err(BerError::UnsupportedTag(other)),
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{v}"),
            Value::OctetString(bytes) => write!(f, "{:?}", String::from_utf8_lossy(bytes)),
            Value::ObjectId(oid) => write!(f, "{oid}"),
            Value::IpAddress([a, b, c, d]) => write!(f, "{a}.{b}.{c}.{d}"),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => {
                write!(f, "{}({v})", self.type_name())
            }
            Value::Counter64(v) => write!(f, "Counter64({v})"),
            Value::Opaque(bytes) => write!(f, "Opaque({} bytes)", bytes.len()),
            Value::Null | Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView => {
                f.write_str(self.type_name())
            }
        }
    }
}

/// A name/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Varbind {
    pub name: Oid,
    pub value: Value,
}

impl Varbind {
    pub fn new(name: Oid, value: Value) -> Self {
        Self { name, value }
    }

    /// A request binding, which always carries NULL.
    pub fn null(name: Oid) -> Self {
        Self::new(name, Value::Null)
    }
}

/// PDU type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PduType {
    GetRequest = 0xa0,
    GetNextRequest = 0xa1,
    Response = 0xa2,
    SetRequest = 0xa3,
    GetBulkRequest = 0xa5,
    InformRequest = 0xa6,
    TrapV2 = 0xa7,
    Report = 0xa8,
}

impl PduType {
    pub fn from_tag(tag_byte: u8) -> Option<PduType> {
        Some(match tag_byte {
            0xa0 => PduType::GetRequest,
            0xa1 => PduType::GetNextRequest,
            0xa2 => PduType::Response,
            0xa3 => PduType::SetRequest,
            0xa5 => PduType::GetBulkRequest,
            0xa6 => PduType::InformRequest,
            0xa7 => PduType::TrapV2,
            0xa8 => PduType::Report,
            _ => return None,
        })
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

/// A protocol data unit.
///
/// For GetBulkRequest the two middle fields carry non-repeaters and
/// max-repetitions instead of error status and index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    pub kind: PduType,
    pub request_id: i32,
    pub error_status: i64,
    pub error_index: i64,
    pub varbinds: Vec<Varbind>,
}

impl Pdu {
    pub fn get(request_id: i32, names: &[Oid]) -> Self {
        Self {
            kind: PduType::GetRequest,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: names.iter().cloned().map(Varbind::null).collect(),
        }
    }

    pub fn get_bulk(request_id: i32, non_repeaters: i64, max_repetitions: i64, names: &[Oid]) -> Self {
        Self {
            kind: PduType::GetBulkRequest,
            request_id,
            error_status: non_repeaters,
            error_index: max_repetitions,
            varbinds: names.iter().cloned().map(Varbind::null).collect(),
        }
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<(), BerError> {
        let mut bindings = Vec::new();
        for vb in &self.varbinds {
            let mut pair = Vec::new();
            write_tlv(tag::OBJECT_IDENTIFIER, &vb.name.encode_content()?, &mut pair);
            vb.value.encode(&mut pair)?;
            write_tlv(tag::SEQUENCE, &pair, &mut bindings);
        }

        let mut body = Vec::new();
        write_tlv(tag::INTEGER, &integer_content(i64::from(self.request_id)), &mut body);
        write_tlv(tag::INTEGER, &integer_content(self.error_status), &mut body);
        write_tlv(tag::INTEGER, &integer_content(self.error_index), &mut body);
        write_tlv(tag::SEQUENCE, &bindings, &mut body);

        write_tlv(self.kind.tag(), &body, out);
        Ok(())
    }

    fn decode(tag_byte: u8, content: &[u8]) -> Result<Pdu, BerError> {
        let kind = PduType::from_tag(tag_byte).ok_or(BerError::UnsupportedTag(tag_byte))?;
        let mut body = Reader::new(content);

        let request_id = decode_integer(body.expect(tag::INTEGER)?)?;
        let request_id =
            i32::try_from(request_id).map_err(|_| BerError::IntegerOverflow { bits: 32 })?;
        let error_status = decode_integer(body.expect(tag::INTEGER)?)?;
        let error_index = decode_integer(body.expect(tag::INTEGER)?)?;

        let mut list = Reader::new(body.expect(tag::SEQUENCE)?);
        body.finish()?;

        let mut varbinds = Vec::new();
        while !list.is_empty() {
            let mut pair = Reader::new(list.expect(tag::SEQUENCE)?);
            let name = Oid::decode_content(pair.expect(tag::OBJECT_IDENTIFIER)?)?;
            let (value_tag, value_content) = pair.read_tlv()?;
            pair.finish()?;
            varbinds.push(Varbind::new(name, Value::decode(value_tag, value_content)?));
        }

        Ok(Pdu {
            kind,
            request_id,
            error_status,
            error_index,
            varbinds,
        })
    }
}

/// Name of an RFC 3416 error-status code.
pub fn error_status_name(status: i64) -> &'static str {
    match status {
        0 => "noError",
        1 => "tooBig",
        2 => "noSuchName",
        3 => "badValue",
        4 => "readOnly",
        5 => "genErr",
        6 => "noAccess",
        7 => "wrongType",
        8 => "wrongLength",
        9 => "wrongEncoding",
        10 => "wrongValue",
        11 => "noCreation",
        12 => "inconsistentValue",
        13 => "resourceUnavailable",
        14 => "commitFailed",
        15 => "undoFailed",
        16 => "authorizationError",
        17 => "notWritable",
        18 => "inconsistentName",
        _ => "unknownError",
    }
}

/// A community-based message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub version: i64,
    pub community: Vec<u8>,
    pub pdu: Pdu,
}

impl Message {
    pub fn v2c(community: &[u8], pdu: Pdu) -> Self {
        Self {
            version: VERSION_2C,
            community: community.to_vec(),
            pdu,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, BerError> {
        let mut body = Vec::new();
        write_tlv(tag::INTEGER, &integer_content(self.version), &mut body);
        write_tlv(tag::OCTET_STRING, &self.community, &mut body);
        self.pdu.encode(&mut body)?;

        let mut out = Vec::with_capacity(body.len() + 4);
        write_tlv(tag::SEQUENCE, &body, &mut out);
        Ok(out)
    }

    pub fn decode(buf: &[u8]) -> Result<Message, BerError> {
        let mut outer = Reader::new(buf);
        let mut body = Reader::new(outer.expect(tag::SEQUENCE)?);
        outer.finish()?;

        let version = decode_integer(body.expect(tag::INTEGER)?)?;
        let community = body.expect(tag::OCTET_STRING)?.to_vec();
        let (pdu_tag, pdu_content) = body.read_tlv()?;
        body.finish()?;

        Ok(Message {
            version,
            community,
            pdu: Pdu::decode(pdu_tag, pdu_content)?,
        })
    }
}
