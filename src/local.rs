use std::net::Ipv4Addr;

use crate::config::BlockMode;
use crate::dns_header::ResponseCode;
use crate::dns_message::build_response;
use crate::error::DnsError;

/// Create the locally synthesized reply for a blacklisted query
/// Redirect mode answers with a single A record for `redirect_ip`
pub fn blocked_response(
    request: &[u8],
    mode: BlockMode,
    redirect_ip: Ipv4Addr,
) -> Result<Vec<u8>, DnsError> {
    match mode {
        BlockMode::Nxdomain => build_response(request, ResponseCode::NxDomain, None),
        BlockMode::Refused => build_response(request, ResponseCode::Refused, None),
        BlockMode::Redirect => build_response(request, ResponseCode::NoError, Some(redirect_ip)),
    }
}

/// Create the SERVFAIL reply sent when the upstream resolver fails us
pub fn servfail_response(request: &[u8]) -> Result<Vec<u8>, DnsError> {
    build_response(request, ResponseCode::ServFail, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns_header::{DnsFlags, DnsHeader};
    use crate::dns_message::tests::make_query;

    fn rcode_and_answers(response: &[u8]) -> (u8, u16) {
        let header = DnsHeader::from_bytes(response).unwrap();
        (DnsFlags::from_u16(header.flags).rcode, header.answer_count)
    }

    #[test]
    fn test_blocked_response_per_mode() {
        let query = make_query(7, "ads.tracker.test", 0x0100);
        let ip = Ipv4Addr::LOCALHOST;

        let nx = blocked_response(&query, BlockMode::Nxdomain, ip).unwrap();
        assert_eq!(rcode_and_answers(&nx), (3, 0));
        assert_eq!(nx.len(), query.len());

        let refused = blocked_response(&query, BlockMode::Refused, ip).unwrap();
        assert_eq!(rcode_and_answers(&refused), (5, 0));

        let redirect = blocked_response(&query, BlockMode::Redirect, ip).unwrap();
        assert_eq!(rcode_and_answers(&redirect), (0, 1));
        assert_eq!(&redirect[redirect.len() - 4..], &[0x7F, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_servfail_response() {
        let query = make_query(0x5150, "example.org", 0x0100);
        let response = servfail_response(&query).unwrap();
        let header = DnsHeader::from_bytes(&response).unwrap();
        assert_eq!(header.id, 0x5150);
        assert_eq!(rcode_and_answers(&response), (2, 0));
    }
}
