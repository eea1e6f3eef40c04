use async_trait::async_trait;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use surge_ping::{
    Client as PingClient, Config as PingConfig, PingIdentifier, PingSequence, SurgeError, ICMP,
};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::config::DnsUpstream;
use crate::error::ProberError;
use crate::models::{ProbeOutcome, ProbeTarget};

/// Message carried by [`ProbeOutcome::Error`] when the target does not resolve.
pub const RESOLUTION_FAILED: &str = "resolution failed";

/// Port used when ICMP is not available to this process.
const ECHO_PORT: u16 = 7;

/// One bounded reachability check.
///
/// Implementations must return within `timeout` plus a small overhead and
/// report every failure as a [`ProbeOutcome`] rather than panicking. The
/// controller may drop the returned future at any await point when a stop
/// is requested, so sockets have to be released by `Drop`.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &ProbeTarget, timeout: Duration) -> ProbeOutcome;
}

/// ICMP echo prober with a TCP echo-port fallback.
pub struct NetworkProber {
    icmp_v4: Option<PingClient>,
    icmp_v6: Option<PingClient>,
    dns_resolver: TokioResolver,
}

impl NetworkProber {
    /// Must be called from within a tokio runtime.
    pub fn new(upstream: DnsUpstream) -> Result<Self, ProberError> {
        let dns_resolver = match upstream {
            DnsUpstream::System => TokioResolver::builder_tokio()?.build(),
            DnsUpstream::Cloudflare => resolver_with(ResolverConfig::cloudflare()),
            DnsUpstream::Google => resolver_with(ResolverConfig::google()),
            DnsUpstream::Quad9 => resolver_with(ResolverConfig::quad9()),
        };
        info!(upstream = ?upstream, "DNS resolver configured");

        Ok(Self {
            icmp_v4: icmp_client(ICMP::V4, "IPv4"),
            icmp_v6: icmp_client(ICMP::V6, "IPv6"),
            dns_resolver,
        })
    }

    /// True when probes go out as ICMP echo requests for IPv4 targets.
    pub fn uses_icmp(&self) -> bool {
        self.icmp_v4.is_some()
    }

    async fn resolve(&self, address: &str) -> Result<IpAddr, String> {
        if let Ok(ip) = address.parse::<IpAddr>() {
            return Ok(ip);
        }
        match self.dns_resolver.lookup_ip(address).await {
            Ok(lookup) => lookup.iter().next().ok_or_else(|| "no IP address found".into()),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn icmp_echo(client: &PingClient, ip: IpAddr, deadline: Instant) -> ProbeOutcome {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return ProbeOutcome::Unreachable;
        }

        let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
        pinger.timeout(remaining);

        let payload = [0u8; 56];
        match timeout_at(deadline, pinger.ping(PingSequence(0), &payload)).await {
            Ok(Ok((_, rtt))) => {
                debug!(%ip, rtt_ms = rtt.as_secs_f64() * 1000.0, "ICMP echo reply");
                ProbeOutcome::Reachable
            }
            Ok(Err(SurgeError::Timeout { .. })) | Err(_) => ProbeOutcome::Unreachable,
            Ok(Err(e)) => ProbeOutcome::Error(e.to_string()),
        }
    }

    async fn tcp_connect(addr: SocketAddr, deadline: Instant) -> ProbeOutcome {
        if deadline <= Instant::now() {
            return ProbeOutcome::Unreachable;
        }
        match timeout_at(deadline, TcpStream::connect(addr)).await {
            Ok(Ok(_)) => ProbeOutcome::Reachable,
            // A refusal still proves the host answered.
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => ProbeOutcome::Reachable,
            Ok(Err(e)) => ProbeOutcome::Error(e.to_string()),
            Err(_) => ProbeOutcome::Unreachable,
        }
    }
}

#[async_trait]
impl Prober for NetworkProber {
    async fn probe(&self, target: &ProbeTarget, timeout: Duration) -> ProbeOutcome {
        let deadline = Instant::now() + timeout;

        let ip = match timeout_at(deadline, self.resolve(target.as_str())).await {
            Ok(Ok(ip)) => ip,
            Ok(Err(detail)) => {
                debug!(target_host = %target, %detail, "resolution failed");
                return ProbeOutcome::Error(RESOLUTION_FAILED.into());
            }
            Err(_) => {
                debug!(
                    target_host = %target,
                    "resolution did not finish within the probe timeout"
                );
                return ProbeOutcome::Error(RESOLUTION_FAILED.into());
            }
        };

        let client = match ip {
            IpAddr::V4(_) => self.icmp_v4.as_ref(),
            IpAddr::V6(_) => self.icmp_v6.as_ref(),
        };
        match client {
            Some(client) => Self::icmp_echo(client, ip, deadline).await,
            None => Self::tcp_connect(SocketAddr::new(ip, ECHO_PORT), deadline).await,
        }
    }
}

fn resolver_with(config: ResolverConfig) -> TokioResolver {
    TokioResolver::builder_with_config(config, TokioConnectionProvider::default()).build()
}

fn icmp_client(kind: ICMP, family: &str) -> Option<PingClient> {
    match PingClient::new(&PingConfig::builder().kind(kind).build()) {
        Ok(client) => Some(client),
        Err(e) => {
            warn!(family, error = %e, "ICMP socket unavailable, falling back to TCP echo probes");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn accepted_handshake_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);

        let outcome = NetworkProber::tcp_connect(addr, deadline).await;
        assert_eq!(outcome, ProbeOutcome::Reachable);
    }

    #[tokio::test]
    async fn refused_connection_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let deadline = Instant::now() + Duration::from_secs(2);

        let outcome = NetworkProber::tcp_connect(addr, deadline).await;
        assert_eq!(outcome, ProbeOutcome::Reachable);
    }

    #[tokio::test]
    async fn expired_deadline_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let outcome = NetworkProber::tcp_connect(addr, Instant::now()).await;
        assert_eq!(outcome, ProbeOutcome::Unreachable);
    }
}
