//! Reverse name lookups.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::debug;

use ipalloc_protocols::dns;

const RESOLV_CONF: &str = "/etc/resolv.conf";
const RECV_BUFFER_LEN: usize = 4096;

#[async_trait]
pub trait PtrResolver: Send + Sync {
    /// Reverse name of `addr`, `None` when there is none or the lookup failed.
    async fn lookup_ptr(&self, addr: Ipv4Addr) -> Option<String>;
}

/// Asks one DNS server for `in-addr.arpa` PTR records over UDP.
pub struct DnsPtrResolver {
    server: SocketAddr,
    timeout: Duration,
}

impl DnsPtrResolver {
    pub fn new(server: SocketAddr, timeout: Duration) -> Self {
        Self { server, timeout }
    }

    /// Uses the first `nameserver` of the system resolver configuration,
    /// falling back to a local resolver on port 53.
    pub fn from_system(timeout: Duration) -> Self {
        let server = std::fs::read_to_string(RESOLV_CONF)
            .ok()
            .and_then(|contents| first_nameserver(&contents))
            .unwrap_or_else(|| SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), dns::DNS_PORT));
        debug!(%server, "using system resolver for PTR lookups");
        Self::new(server, timeout)
    }

    pub fn server(&self) -> SocketAddr {
        self.server
    }

    async fn query(&self, addr: Ipv4Addr) -> anyhow::Result<String> {
        let id: u16 = rand::random();
        let packet: Vec<u8> = dns::create_ptr_packet(&addr, id)?;

        let local: SocketAddr = match self.server {
            SocketAddr::V4(_) => SocketAddr::from(([0, 0, 0, 0], 0)),
            SocketAddr::V6(_) => SocketAddr::from(([0u16; 8], 0)),
        };
        let socket = UdpSocket::bind(local).await.context("binding dns socket")?;
        socket.connect(self.server).await.context("connecting dns socket")?;
        socket.send(&packet).await.context("sending PTR query")?;

        let mut buffer = vec![0u8; RECV_BUFFER_LEN];
        loop {
            let len: usize = socket.recv(&mut buffer).await.context("reading PTR answer")?;
            let payload: &[u8] = &buffer[..len];
            // Stray datagrams for an earlier query are dropped.
            if dns::transaction_id(payload).ok() != Some(id) {
                continue;
            }
            let (_, hostname) = dns::get_hostname(payload)?;
            return Ok(hostname);
        }
    }
}

#[async_trait]
impl PtrResolver for DnsPtrResolver {
    async fn lookup_ptr(&self, addr: Ipv4Addr) -> Option<String> {
        match tokio::time::timeout(self.timeout, self.query(addr)).await {
            Ok(Ok(hostname)) => Some(hostname),
            Ok(Err(e)) => {
                debug!(%addr, "no PTR name: {e:#}");
                None
            }
            Err(_) => {
                debug!(%addr, "PTR lookup timed out");
                None
            }
        }
    }
}

fn first_nameserver(resolv_conf: &str) -> Option<SocketAddr> {
    resolv_conf
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#') && !line.starts_with(';'))
        .filter_map(|line| line.strip_prefix("nameserver"))
        .filter_map(|rest| rest.split_whitespace().next())
        // scoped IPv6 servers (fe80::1%eth0) are not usable from here
        .find_map(|addr| addr.parse::<IpAddr>().ok())
        .map(|ip| SocketAddr::new(ip, dns::DNS_PORT))
}
