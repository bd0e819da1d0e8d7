use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tracing::{debug, error, warn};

use crate::error::ForwardError;
use crate::local::servfail_response;

/// Largest possible UDP payload, so replies are never cut short
const MAX_UDP_RESPONSE_SIZE: usize = 65535;

/// How a forwarded query ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// Upstream reply relayed verbatim
    Relayed,
    /// No reply in time, SERVFAIL synthesized
    TimedOut,
    /// Upstream session failed, SERVFAIL synthesized
    TransportError,
}

/// A short-lived socket used for exactly one upstream exchange
///
/// The socket is connected to the upstream so datagrams from any other peer
/// are discarded by the kernel. Dropping the session closes the socket.
struct UpstreamSession {
    socket: UdpSocket,
}

impl UpstreamSession {
    async fn open(upstream: SocketAddr) -> Result<Self, ForwardError> {
        // Bind to ephemeral port (0 = OS assigns)
        let bind_addr: SocketAddr = if upstream.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(upstream).await?;
        Ok(Self { socket })
    }

    async fn exchange(&self, request: &[u8]) -> Result<Vec<u8>, ForwardError> {
        self.socket.send(request).await?;

        let mut reply = vec![0u8; MAX_UDP_RESPONSE_SIZE];
        let size = self.socket.recv(&mut reply).await?;
        reply.truncate(size);
        Ok(reply)
    }
}

/// Relays queries to a single upstream resolver
#[derive(Debug, Clone)]
pub struct Forwarder {
    upstream: SocketAddr,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(upstream: SocketAddr, timeout: Duration) -> Self {
        Self { upstream, timeout }
    }

    /// Send `request` unmodified and wait for the first reply datagram
    pub async fn query_upstream(&self, request: &[u8]) -> Result<Vec<u8>, ForwardError> {
        let session = UpstreamSession::open(self.upstream).await?;

        tokio::time::timeout(self.timeout, session.exchange(request))
            .await
            .map_err(|_| ForwardError::Timeout(self.timeout))?
    }

    /// Forward a client query and answer the client through `listener`
    ///
    /// Every path ends with something sent to the client when possible: the
    /// upstream reply on success, SERVFAIL on timeout or transport error.
    pub async fn forward(
        &self,
        listener: &UdpSocket,
        request: &[u8],
        client: SocketAddr,
    ) -> ForwardOutcome {
        let (response, outcome) = match self.query_upstream(request).await {
            Ok(reply) => {
                debug!(%client, upstream = %self.upstream, bytes = reply.len(), "Relaying upstream reply");
                (reply, ForwardOutcome::Relayed)
            }
            Err(e) => {
                let outcome = match e {
                    ForwardError::Timeout(_) => ForwardOutcome::TimedOut,
                    ForwardError::Io(_) => ForwardOutcome::TransportError,
                };
                warn!(%client, upstream = %self.upstream, error = %e, "Upstream failed, answering SERVFAIL");

                match servfail_response(request) {
                    Ok(response) => (response, outcome),
                    Err(e) => {
                        debug!(%client, error = %e, "Cannot build SERVFAIL for undecodable query, dropping");
                        return outcome;
                    }
                }
            }
        };

        if let Err(e) = listener.send_to(&response, client).await {
            error!(%client, error = %e, "Failed to send response");
        }
        outcome
    }
}
