use std::collections::HashSet;

use bytes::{Buf, BufMut};

use crate::error::DnsError;

const POINTER_MASK: u8 = 0xC0;
const MAX_LABEL_LEN: usize = 63;

/// DNS Question Section
/// Format: QNAME + QTYPE (2 bytes) + QCLASS (2 bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    pub name: String, // Domain name, labels joined with '.'
    pub qtype: u16,   // Query type (A, AAAA, CNAME, etc.)
    pub qclass: u16,  // Query class (usually IN for Internet)
}

/// The only record type and class the proxy ever writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    A = 1, // IPv4 address
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordClass {
    IN = 1, // Internet
}

impl RecordType {
    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

impl RecordClass {
    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

impl DnsQuestion {
    /// Parse a DNS question from bytes starting at the given offset
    /// Returns the question and the new offset after parsing
    pub fn from_bytes(bytes: &[u8], offset: usize) -> Result<(Self, usize), DnsError> {
        let (name, new_offset) = parse_domain_name(bytes, offset)?;

        if new_offset + 4 > bytes.len() {
            return Err(DnsError::TruncatedMessage);
        }

        let mut rest = &bytes[new_offset..new_offset + 4];
        let qtype = rest.get_u16();
        let qclass = rest.get_u16();

        Ok((
            DnsQuestion {
                name,
                qtype,
                qclass,
            },
            new_offset + 4,
        ))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DnsError> {
        let mut bytes = encode_domain_name(&self.name)?;
        bytes.put_u16(self.qtype);
        bytes.put_u16(self.qclass);
        Ok(bytes)
    }
}

/// Parse `count` questions starting at `offset`
pub fn parse_questions(
    bytes: &[u8],
    count: u16,
    mut offset: usize,
) -> Result<(Vec<DnsQuestion>, usize), DnsError> {
    // qdcount comes from the client, so don't size the allocation by it
    let mut questions = Vec::with_capacity(count.min(4) as usize);

    for _ in 0..count {
        let (question, new_offset) = DnsQuestion::from_bytes(bytes, offset)?;
        questions.push(question);
        offset = new_offset;
    }

    Ok((questions, offset))
}

/// Parse a domain name from DNS message format
/// Supports DNS name compression (pointers)
/// Returns the parsed domain name and the offset where the enclosing record
/// continues: right after the first pointer followed, or after the terminator
pub fn parse_domain_name(bytes: &[u8], mut offset: usize) -> Result<(String, usize), DnsError> {
    let mut labels = Vec::new();
    let mut resume_offset = None;
    let mut visited = HashSet::new();

    loop {
        let length = *bytes.get(offset).ok_or(DnsError::TruncatedMessage)?;

        match length & POINTER_MASK {
            POINTER_MASK => {
                let low = *bytes.get(offset + 1).ok_or(DnsError::TruncatedMessage)?;
                let target = u16::from_be_bytes([length & !POINTER_MASK, low]) as usize;

                if !visited.insert(target) {
                    return Err(DnsError::CompressionLoop { offset: target });
                }
                if resume_offset.is_none() {
                    resume_offset = Some(offset + 2);
                }
                offset = target;
                continue;
            }
            0 => {}
            // 0b01 and 0b10 prefixes are reserved label types
            _ => return Err(DnsError::MalformedLabel),
        }

        offset += 1;

        if length == 0 {
            break;
        }

        let end = offset + length as usize;
        let label = bytes.get(offset..end).ok_or(DnsError::TruncatedMessage)?;
        let label = std::str::from_utf8(label).map_err(|_| DnsError::MalformedLabel)?;

        labels.push(label);
        offset = end;
    }

    Ok((labels.join("."), resume_offset.unwrap_or(offset)))
}

/// Encode a domain name to DNS message format
/// Format: length-prefixed labels terminated with a null byte
/// Example: "example.com" -> [7]example[3]com[0]
pub fn encode_domain_name(name: &str) -> Result<Vec<u8>, DnsError> {
    let mut encoded = Vec::with_capacity(name.len() + 2);

    for label in name.split('.').filter(|label| !label.is_empty()) {
        let label_bytes = label.as_bytes();
        if label_bytes.len() > MAX_LABEL_LEN {
            return Err(DnsError::LabelTooLong(label.to_string()));
        }

        encoded.put_u8(label_bytes.len() as u8);
        encoded.put_slice(label_bytes);
    }

    // Null terminator
    encoded.put_u8(0);

    Ok(encoded)
}
