//! SNMPv2c message and PDU (de)serialization on top of [`super::ber`].

use crate::error::{Result, TunnelError};

use super::ber::{
    decode_integer, decode_octet_string, decode_oid, encode_integer, encode_oid, read_tlv, write_tlv,
    TAG_GET_BULK_REQUEST, TAG_GET_NEXT_REQUEST, TAG_GET_REQUEST, TAG_GET_RESPONSE, TAG_INTEGER,
    TAG_NULL, TAG_OCTET_STRING, TAG_OID, TAG_SEQUENCE,
};

pub const TAG_COUNTER32: u8 = 0x41;
pub const TAG_GAUGE32: u8 = 0x42;
pub const TAG_TIME_TICKS: u8 = 0x43;
pub const TAG_COUNTER64: u8 = 0x46;
pub const TAG_NO_SUCH_OBJECT: u8 = 0x80;
pub const TAG_END_OF_MIB_VIEW: u8 = 0x82;

pub const ERR_NO_ERROR: i64 = 0;
pub const ERR_NO_SUCH_NAME: i64 = 2;

fn bad(msg: impl Into<String>) -> TunnelError {
    TunnelError::Protocol(format!("SNMP PDU: {}", msg.into()))
}

#[derive(Debug, Clone)]
pub enum SnmpValue {
    Integer(i64),
    OctetString(Vec<u8>),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Counter64(u64),
    Null,
    EndOfMibView,
}

impl SnmpValue {
    fn encode(&self) -> (u8, Vec<u8>) {
        match self {
            SnmpValue::Integer(v) => (TAG_INTEGER, encode_integer(*v)),
            SnmpValue::OctetString(s) => (TAG_OCTET_STRING, s.clone()),
            SnmpValue::Counter32(v) => (TAG_COUNTER32, encode_integer(*v as i64)),
            SnmpValue::Gauge32(v) => (TAG_GAUGE32, encode_integer(*v as i64)),
            SnmpValue::TimeTicks(v) => (TAG_TIME_TICKS, encode_integer(*v as i64)),
            SnmpValue::Counter64(v) => (TAG_COUNTER64, encode_integer(*v as i64)),
            SnmpValue::Null => (TAG_NULL, Vec::new()),
            SnmpValue::EndOfMibView => (TAG_END_OF_MIB_VIEW, Vec::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduKind {
    GetRequest,
    GetNextRequest,
    GetBulkRequest,
}

#[derive(Debug)]
pub struct SnmpRequest {
    pub version: i64,
    pub community: Vec<u8>,
    pub kind: PduKind,
    pub request_id: i64,
    /// `error_status` field in GETBULK doubles as `non_repeaters`.
    pub non_repeaters: i64,
    /// `error_index` field in GETBULK doubles as `max_repetitions`.
    pub max_repetitions: i64,
    pub oids: Vec<Vec<u32>>,
}

pub fn decode_request(datagram: &[u8]) -> Result<SnmpRequest> {
    let (message, rest) = read_tlv(datagram)?;
    if message.tag != TAG_SEQUENCE || !rest.is_empty() {
        return Err(bad("datagram is not a single top-level SEQUENCE"));
    }

    let (version_tlv, after_version) = read_tlv(message.content)?;
    let version = decode_integer(&version_tlv)?;
    if version != 1 {
        return Err(bad("only SNMPv2c (version 1) is supported"));
    }

    let (community_tlv, after_community) = read_tlv(after_version)?;
    let community = decode_octet_string(&community_tlv)?.to_vec();

    let (pdu, pdu_rest) = read_tlv(after_community)?;
    if !pdu_rest.is_empty() {
        return Err(bad("trailing bytes after PDU"));
    }

    let kind = match pdu.tag {
        TAG_GET_REQUEST => PduKind::GetRequest,
        TAG_GET_NEXT_REQUEST => PduKind::GetNextRequest,
        TAG_GET_BULK_REQUEST => PduKind::GetBulkRequest,
        other => return Err(bad(format!("unsupported/unwritable PDU tag {other:#x}"))),
    };

    let (request_id_tlv, after_id) = read_tlv(pdu.content)?;
    let request_id = decode_integer(&request_id_tlv)?;
    let (field2_tlv, after_field2) = read_tlv(after_id)?;
    let field2 = decode_integer(&field2_tlv)?;
    let (field3_tlv, after_field3) = read_tlv(after_field2)?;
    let field3 = decode_integer(&field3_tlv)?;

    let (varbind_list, varbind_rest) = read_tlv(after_field3)?;
    if varbind_list.tag != TAG_SEQUENCE || !varbind_rest.is_empty() {
        return Err(bad("expected varbind-list SEQUENCE"));
    }

    let mut oids = Vec::new();
    let mut remaining = varbind_list.content;
    while !remaining.is_empty() {
        let (varbind, next) = read_tlv(remaining)?;
        if varbind.tag != TAG_SEQUENCE {
            return Err(bad("expected varbind SEQUENCE"));
        }
        let (oid_tlv, oid_rest) = read_tlv(varbind.content)?;
        if oid_tlv.tag != TAG_OID {
            return Err(bad("varbind name is not an OID"));
        }
        oids.push(decode_oid(&oid_tlv)?);
        // the value TLV (typically NULL in a request) is intentionally ignored
        let _ = oid_rest;
        remaining = next;
    }

    Ok(SnmpRequest {
        version,
        community,
        kind,
        request_id,
        non_repeaters: field2,
        max_repetitions: field3,
        oids,
    })
}

pub fn encode_response(
    community: &[u8],
    request_id: i64,
    error_status: i64,
    error_index: i64,
    varbinds: &[(Vec<u32>, SnmpValue)],
) -> Result<Vec<u8>> {
    let mut varbind_list = Vec::new();
    for (oid, value) in varbinds {
        let oid_bytes = encode_oid(oid)?;
        let mut oid_tlv = Vec::new();
        write_tlv(&mut oid_tlv, TAG_OID, &oid_bytes);
        let (value_tag, value_bytes) = value.encode();
        let mut value_tlv = Vec::new();
        write_tlv(&mut value_tlv, value_tag, &value_bytes);
        let mut varbind = oid_tlv;
        varbind.extend_from_slice(&value_tlv);
        let mut varbind_seq = Vec::new();
        write_tlv(&mut varbind_seq, TAG_SEQUENCE, &varbind);
        varbind_list.extend_from_slice(&varbind_seq);
    }
    let mut varbind_list_tlv = Vec::new();
    write_tlv(&mut varbind_list_tlv, TAG_SEQUENCE, &varbind_list);

    let mut pdu_body = Vec::new();
    write_tlv(&mut pdu_body, TAG_INTEGER, &encode_integer(request_id));
    write_tlv(&mut pdu_body, TAG_INTEGER, &encode_integer(error_status));
    write_tlv(&mut pdu_body, TAG_INTEGER, &encode_integer(error_index));
    pdu_body.extend_from_slice(&varbind_list_tlv);

    let mut pdu_tlv = Vec::new();
    write_tlv(&mut pdu_tlv, TAG_GET_RESPONSE, &pdu_body);

    let mut message_body = Vec::new();
    write_tlv(&mut message_body, TAG_INTEGER, &encode_integer(1));
    write_tlv(&mut message_body, TAG_OCTET_STRING, community);
    message_body.extend_from_slice(&pdu_tlv);

    let mut message = Vec::new();
    write_tlv(&mut message, TAG_SEQUENCE, &message_body);
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_get_request(oids: &[Vec<u32>]) -> Vec<u8> {
        let mut varbind_list = Vec::new();
        for oid in oids {
            let oid_bytes = encode_oid(oid).unwrap();
            let mut oid_tlv = Vec::new();
            write_tlv(&mut oid_tlv, TAG_OID, &oid_bytes);
            let mut null_tlv = Vec::new();
            write_tlv(&mut null_tlv, TAG_NULL, &[]);
            let mut varbind = oid_tlv;
            varbind.extend_from_slice(&null_tlv);
            let mut varbind_seq = Vec::new();
            write_tlv(&mut varbind_seq, TAG_SEQUENCE, &varbind);
            varbind_list.extend_from_slice(&varbind_seq);
        }
        let mut varbind_list_tlv = Vec::new();
        write_tlv(&mut varbind_list_tlv, TAG_SEQUENCE, &varbind_list);

        let mut pdu_body = Vec::new();
        write_tlv(&mut pdu_body, TAG_INTEGER, &encode_integer(42));
        write_tlv(&mut pdu_body, TAG_INTEGER, &encode_integer(0));
        write_tlv(&mut pdu_body, TAG_INTEGER, &encode_integer(0));
        pdu_body.extend_from_slice(&varbind_list_tlv);
        let mut pdu_tlv = Vec::new();
        write_tlv(&mut pdu_tlv, TAG_GET_REQUEST, &pdu_body);

        let mut message_body = Vec::new();
        write_tlv(&mut message_body, TAG_INTEGER, &encode_integer(1));
        write_tlv(&mut message_body, TAG_OCTET_STRING, b"public");
        message_body.extend_from_slice(&pdu_tlv);
        let mut message = Vec::new();
        write_tlv(&mut message, TAG_SEQUENCE, &message_body);
        message
    }

    #[test]
    fn decodes_get_request() {
        let datagram = build_get_request(&[vec![1, 3, 6, 1, 4, 1, 99999, 1, 1]]);
        let req = decode_request(&datagram).unwrap();
        assert_eq!(req.community, b"public");
        assert_eq!(req.kind, PduKind::GetRequest);
        assert_eq!(req.request_id, 42);
        assert_eq!(req.oids.len(), 1);
    }

    #[test]
    fn response_round_trips_through_decode_of_varbind_oids() {
        let encoded = encode_response(
            b"public",
            7,
            ERR_NO_ERROR,
            0,
            &[(vec![1, 3, 6, 1, 4, 1, 99999, 1, 1], SnmpValue::OctetString(b"sssonector".to_vec()))],
        )
        .unwrap();
        assert!(!encoded.is_empty());
        assert_eq!(encoded[0], TAG_SEQUENCE);
    }
}
