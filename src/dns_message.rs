use std::net::Ipv4Addr;

use bytes::BufMut;

use crate::dns_header::{build_header, DnsFlags, DnsHeader, ResponseCode, HEADER_LEN};
use crate::dns_question::{parse_questions, DnsQuestion, RecordClass, RecordType};
use crate::error::DnsError;

/// TTL of a synthesized redirect answer, in seconds
pub const REDIRECT_TTL: u32 = 300;

/// Compression pointer to the first question name, which always sits right
/// after the header
const QUESTION_NAME_POINTER: u16 = 0xC000 | HEADER_LEN as u16;

/// Parse the DNS request from the buffer
/// Takes an immutable borrow of the buffer, returns owned structures
pub fn parse_request(buf: &[u8]) -> Result<(DnsHeader, Vec<DnsQuestion>), DnsError> {
    let header = DnsHeader::from_bytes(buf)?;
    let (questions, _) = parse_questions(buf, header.question_count, HEADER_LEN)?;

    Ok((header, questions))
}

/// Build a reply to `request` with the given response code
///
/// The question section is copied byte for byte from the request (everything
/// after the header), so any compression the client used is preserved. When
/// `answer_ip` is given a single A record pointing back at the first question
/// name is appended.
pub fn build_response(
    request: &[u8],
    rcode: ResponseCode,
    answer_ip: Option<Ipv4Addr>,
) -> Result<Vec<u8>, DnsError> {
    let request_header = DnsHeader::from_bytes(request)?;
    let flags = DnsFlags::response_to(request_header.flags, rcode).to_u16();
    let answer_count = u16::from(answer_ip.is_some());

    let question_section = &request[HEADER_LEN..];
    let mut response = Vec::with_capacity(request.len() + 16);

    response.put_slice(&build_header(
        request_header.id,
        flags,
        request_header.question_count,
        answer_count,
    ));
    response.put_slice(question_section);

    if let Some(ip) = answer_ip {
        response.put_u16(QUESTION_NAME_POINTER);
        response.put_u16(RecordType::A.to_u16());
        response.put_u16(RecordClass::IN.to_u16());
        response.put_u32(REDIRECT_TTL);
        response.put_u16(4);
        response.put_slice(&ip.octets());
    }

    Ok(response)
}
