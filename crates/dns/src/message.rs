// SPDX-License-Identifier: MIT

//! Binary DNS message construction and parsing (§4.3), built on
//! `hickory-proto` — the ecosystem's standard pure-Rust DNS protocol
//! crate, rather than a hand-rolled byte parser (SPEC_FULL §4.3).

use crate::error::DnsError;
use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::rdata::{A, AAAA};
use hickory_proto::rr::{Name, RData, Record, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinEncodable};
use std::net::{Ipv4Addr, Ipv6Addr};

pub fn decode(bytes: &[u8]) -> Result<Message, DnsError> {
    Message::from_bytes(bytes).map_err(|e| DnsError::Decode(e.to_string()))
}

pub fn encode(message: &Message) -> Result<Vec<u8>, DnsError> {
    message.to_bytes().map_err(|e| DnsError::Encode(e.to_string()))
}

/// Normalizes a raw wire qname: lowercase, trailing dot removed (§3
/// `DNSQuery`). Delegates to the shared core helper so the resolver and
/// the Decision Engine agree on the canonical form.
pub fn normalize_qname(name: &Name) -> String {
    pcguard_core::DnsQuery::normalize_qname(&name.to_ascii())
}

/// Builds a `NOERROR` response with a sinkhole A/AAAA record, TTL =
/// `sinkhole_ttl_secs` (§4.3 "Block").
pub fn sinkhole_response(
    request: &Message,
    sinkhole_v4: Ipv4Addr,
    sinkhole_v6: Ipv6Addr,
    ttl_secs: u32,
) -> Result<Message, DnsError> {
    let mut response = base_response(request, ResponseCode::NoError);
    for query in request.queries() {
        let name = query.name().clone();
        match query.query_type() {
            RecordType::A => {
                response.add_answer(Record::from_rdata(
                    name.into(),
                    ttl_secs,
                    RData::A(A(sinkhole_v4)),
                ));
            }
            RecordType::AAAA => {
                response.add_answer(Record::from_rdata(
                    name.into(),
                    ttl_secs,
                    RData::AAAA(AAAA(sinkhole_v6)),
                ));
            }
            _ => {}
        }
    }
    Ok(response)
}

/// Builds an `NXDOMAIN` response (§4.3 "alternative per configuration").
pub fn nxdomain_response(request: &Message) -> Message {
    base_response(request, ResponseCode::NXDomain)
}

/// Builds a `SERVFAIL` response, used when every upstream fails (§4.3,
/// §7).
pub fn servfail_response(request: &Message) -> Message {
    base_response(request, ResponseCode::ServFail)
}

fn base_response(request: &Message, code: ResponseCode) -> Message {
    let mut response = Message::new();
    response.set_id(request.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(OpCode::Query);
    response.set_recursion_desired(request.recursion_desired());
    response.set_recursion_available(true);
    response.set_response_code(code);
    for query in request.queries() {
        response.add_query(query.clone());
    }
    response
}
