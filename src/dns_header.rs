use bytes::{Buf, BufMut};

use crate::error::DnsError;

pub const HEADER_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsHeader {
    pub id: u16,
    pub flags: u16,
    pub question_count: u16,
    pub answer_count: u16,
    pub authority_count: u16,
    pub additional_count: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsFlags {
    pub qr: bool,              // Query/Response (false = query, true = response)
    pub opcode: u8,            // Operation code (0 = standard query)
    pub aa: bool,              // Authoritative Answer
    pub tc: bool,              // Truncation
    pub rd: bool,              // Recursion Desired
    pub ra: bool,              // Recursion Available
    pub z: u8,                 // Reserved (must be 0)
    pub rcode: u8,             // Response code
}

/// Response codes the proxy synthesizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    NoError = 0,
    ServFail = 2,
    NxDomain = 3,
    Refused = 5,
}

impl ResponseCode {
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl DnsFlags {
    pub fn to_u16(&self) -> u16 {
        let mut flags: u16 = 0;

        if self.qr { flags |= 1 << 15; }           // QR at bit 15
        flags |= (self.opcode as u16 & 0xF) << 11; // OPCODE at bits 11-14
        if self.aa { flags |= 1 << 10; }           // AA at bit 10
        if self.tc { flags |= 1 << 9; }            // TC at bit 9
        if self.rd { flags |= 1 << 8; }            // RD at bit 8
        if self.ra { flags |= 1 << 7; }            // RA at bit 7
        flags |= (self.z as u16 & 0x7) << 4;       // Z at bits 4-6 (reserved)
        flags |= self.rcode as u16 & 0xF;          // RCODE at bits 0-3

        flags
    }

    pub fn from_u16(flags: u16) -> Self {
        DnsFlags {
            qr: (flags & (1 << 15)) != 0,
            opcode: ((flags >> 11) & 0xF) as u8,
            aa: (flags & (1 << 10)) != 0,
            tc: (flags & (1 << 9)) != 0,
            rd: (flags & (1 << 8)) != 0,
            ra: (flags & (1 << 7)) != 0,
            z: ((flags >> 4) & 0x7) as u8,
            rcode: (flags & 0xF) as u8,
        }
    }

    /// Flags for a synthesized reply: QR and RA set, RD echoed from the
    /// request, everything else cleared apart from the response code.
    pub fn response_to(request_flags: u16, rcode: ResponseCode) -> Self {
        let request = DnsFlags::from_u16(request_flags);

        DnsFlags {
            qr: true,
            opcode: 0,
            aa: false,
            tc: false,
            rd: request.rd,
            ra: true,
            z: 0,
            rcode: rcode.to_u8(),
        }
    }
}

impl DnsHeader {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DnsError> {
        if bytes.len() < HEADER_LEN {
            return Err(DnsError::TruncatedMessage);
        }

        let mut buf = &bytes[..HEADER_LEN];
        Ok(DnsHeader {
            id: buf.get_u16(),
            flags: buf.get_u16(),
            question_count: buf.get_u16(),
            answer_count: buf.get_u16(),
            authority_count: buf.get_u16(),
            additional_count: buf.get_u16(),
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];

        let mut buf = &mut bytes[..];
        buf.put_u16(self.id);
        buf.put_u16(self.flags);
        buf.put_u16(self.question_count);
        buf.put_u16(self.answer_count);
        buf.put_u16(self.authority_count);
        buf.put_u16(self.additional_count);

        bytes
    }
}

/// Build a 12-byte header; authority and additional counts are always 0
pub fn build_header(id: u16, flags: u16, question_count: u16, answer_count: u16) -> [u8; HEADER_LEN] {
    DnsHeader {
        id,
        flags,
        question_count,
        answer_count,
        authority_count: 0,
        additional_count: 0,
    }
    .to_bytes()
}
