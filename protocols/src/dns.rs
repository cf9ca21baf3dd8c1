//! Reverse (PTR) DNS queries over plain UDP.
//!
//! Queries are built with pnet's DNS packet types, answers are decoded with
//! `dns-parser`, which follows name compression across the whole message.

use std::net::Ipv4Addr;

use anyhow::Context;
use dns_parser::{Packet, RData, ResponseCode};
use pnet::packet::dns::{
    DnsClass, DnsPacket, DnsQuery, DnsTypes, MutableDnsPacket, Opcode, Retcode,
};
use thiserror::Error;

use ipalloc_common::utils::ip;

pub const DNS_HDR_LEN: usize = 12;
pub const DNS_PORT: u16 = 53;

const CLASS_IN: u16 = 1;

#[derive(Debug, Error)]
pub enum DnsError {
    #[error("dns message shorter than its header")]
    Truncated,
    #[error("malformed dns message: {0}")]
    Malformed(#[from] dns_parser::Error),
    #[error("dns message is not a response")]
    NotAResponse,
    #[error("dns server answered with rcode {0}")]
    ErrorCode(u8),
    #[error("no PTR record in answer")]
    NoPtrRecord,
}

pub fn create_ptr_packet(ip_addr: &Ipv4Addr, id: u16) -> anyhow::Result<Vec<u8>> {
    let query: DnsQuery = create_ptr_query(ip_addr);
    let q_fixed_len: usize = 4;
    let qlen: usize = query.qname.len() + q_fixed_len;
    let total: usize = DNS_HDR_LEN + qlen;
    let mut buffer: Vec<u8> = vec![0u8; total];

    {
        let mut dns: MutableDnsPacket =
            MutableDnsPacket::new(&mut buffer).context("creating dns header")?;
        dns.set_id(id);
        dns.set_is_response(0);
        dns.set_opcode(Opcode::StandardQuery);
        dns.set_is_authoriative(0);
        dns.set_is_truncated(0);
        dns.set_is_recursion_desirable(1);
        dns.set_is_recursion_available(0);
        dns.set_zero_reserved(0);
        dns.set_is_non_authenticated_data(0);
        dns.set_rcode(Retcode::NoError);
        dns.set_query_count(1);
        dns.set_response_count(0);
        dns.set_authority_rr_count(0);
        dns.set_additional_rr_count(0);
    }

    // pnet leaves the question section to us
    let mut cursor: usize = DNS_HDR_LEN;

    buffer[cursor..cursor + query.qname.len()].copy_from_slice(&query.qname);
    cursor += query.qname.len();

    buffer[cursor..cursor + 2].copy_from_slice(&query.qtype.0.to_be_bytes());
    cursor += 2;

    buffer[cursor..cursor + 2].copy_from_slice(&query.qclass.0.to_be_bytes());

    Ok(buffer)
}

/// Transaction id of a DNS message, used to pair responses with queries.
pub fn transaction_id(payload: &[u8]) -> Result<u16, DnsError> {
    DnsPacket::new(payload)
        .map(|dns| dns.get_id())
        .ok_or(DnsError::Truncated)
}

/// Extracts the first PTR target of a response, without the root dot.
pub fn get_hostname(payload: &[u8]) -> Result<(u16, String), DnsError> {
    let packet: Packet = Packet::parse(payload)?;
    if packet.header.query {
        return Err(DnsError::NotAResponse);
    }
    if packet.header.response_code != ResponseCode::NoError {
        return Err(DnsError::ErrorCode(packet.header.response_code.into()));
    }

    let name: String = packet
        .answers
        .iter()
        .find_map(|record| match &record.data {
            RData::PTR(ptr) => Some(ptr.0.to_string()),
            _ => None,
        })
        .ok_or(DnsError::NoPtrRecord)?;

    let hostname: &str = ip::trim_root_label(&name);
    if hostname.is_empty() {
        return Err(DnsError::NoPtrRecord);
    }
    Ok((packet.header.id, hostname.to_string()))
}

fn create_ptr_query(ip_addr: &Ipv4Addr) -> DnsQuery {
    let ptr_string: String = ip::reverse_address_to_ptr(ip_addr);
    DnsQuery {
        qname: encode_dns_name(&ptr_string),
        qtype: DnsTypes::PTR,
        qclass: DnsClass(CLASS_IN),
        payload: Vec::new(),
    }
}

fn encode_dns_name(name: &str) -> Vec<u8> {
    let mut encoded: Vec<u8> = Vec::new();
    for label in name.split('.') {
        if label.is_empty() {
            continue;
        }
        encoded.push(label.len() as u8);
        encoded.extend_from_slice(label.as_bytes());
    }
    encoded.push(0);
    encoded
}
