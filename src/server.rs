use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::config::ProxyConfig;
use crate::dns_message::parse_request;
use crate::forwarder::{ForwardOutcome, Forwarder};
use crate::local::blocked_response;

/// Largest possible UDP payload, so queries are never cut short
const MAX_DATAGRAM_SIZE: usize = 65535;

/// What happened to one client datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Blocked,
    Forwarded(ForwardOutcome),
}

/// State shared by every per-query task
struct Handler {
    socket: Arc<UdpSocket>,
    config: ProxyConfig,
    forwarder: Forwarder,
    inflight: Option<Semaphore>,
}

/// DNS proxy that filters queries against the blacklist and relays the rest
pub struct DnsServer {
    handler: Arc<Handler>,
}

impl DnsServer {
    /// Create a new DNS server bound to the configured listen address
    pub async fn bind(config: ProxyConfig) -> io::Result<Self> {
        let socket = UdpSocket::bind(config.listen).await?;
        let forwarder = Forwarder::new(config.upstream, config.upstream_timeout);
        let inflight = config.max_inflight.map(Semaphore::new);

        Ok(Self {
            handler: Arc::new(Handler {
                socket: Arc::new(socket),
                config,
                forwarder,
                inflight,
            }),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.handler.socket.local_addr()
    }

    /// Run the DNS server main loop
    /// Every datagram is handled on its own task; this never returns unless
    /// the listening socket itself fails.
    pub async fn run(self) -> io::Result<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            match self.handler.socket.recv_from(&mut buf).await {
                Ok((size, client)) => {
                    debug!(%client, bytes = size, "Received query");

                    let handler = self.handler.clone();
                    let request = buf[..size].to_vec();
                    tokio::spawn(async move {
                        handler.handle_datagram(&request, client).await;
                    });
                }
                // ICMP errors from earlier sends surface here on some platforms
                Err(e) if is_transient(&e) => {
                    debug!(error = %e, "Transient receive error");
                }
                Err(e) => {
                    error!(error = %e, "Error receiving data");
                    return Err(e);
                }
            }
        }
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

/// Extract the first question's name, or None when the query can't be
/// classified and must be forwarded as is
fn first_question_name(request: &[u8]) -> Option<String> {
    match parse_request(request) {
        Ok((_, questions)) => questions.into_iter().next().map(|question| question.name),
        Err(e) => {
            debug!(error = %e, "Undecodable query, forwarding unfiltered");
            None
        }
    }
}

impl Handler {
    async fn handle_datagram(&self, request: &[u8], client: SocketAddr) -> Disposition {
        if let Some(domain) = first_question_name(request) {
            if self.config.blacklist.is_blocked(&domain) {
                self.answer_blocked(request, client, &domain).await;
                return Disposition::Blocked;
            }
            debug!(%client, %domain, "Forwarding query");
        }

        // Held until the forward completes; None when unbounded
        let _permit = match &self.inflight {
            Some(semaphore) => semaphore.acquire().await.ok(),
            None => None,
        };

        let outcome = self.forwarder.forward(&self.socket, request, client).await;
        Disposition::Forwarded(outcome)
    }

    async fn answer_blocked(&self, request: &[u8], client: SocketAddr, domain: &str) {
        let mode = self.config.mode;
        let response = match blocked_response(request, mode, self.config.redirect_ip) {
            Ok(response) => response,
            Err(e) => {
                error!(%client, %domain, error = %e, "Failed to build blocked response");
                return;
            }
        };

        if let Err(e) = self.socket.send_to(&response, client).await {
            error!(%client, error = %e, "Failed to send response");
            return;
        }
        info!(%domain, %mode, "Blocked query");
    }
}
