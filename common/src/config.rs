//! # Process configuration
//!
//! Every setting is a command-line flag backed by an environment variable.
//! Missing connection parameters are rejected by the argument parser, before
//! any scanning or serving begins.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args};

pub const DEFAULT_CONCURRENCY: usize = 100;
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(4 * 60 * 60);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_STORE_PORT: u16 = 5432;
pub const DEFAULT_LISTEN_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 8080));

const DNS_PORT: u16 = 53;

/// Where the network segments come from.
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct SourceConfig {
    /// Base URL of the xCAT REST API
    #[arg(long = "xcat-api-server", env = "XCAT_API_SERVER", value_parser = non_blank)]
    pub api_server: String,

    /// Token sent as X-Auth-Token
    #[arg(long = "xcat-token", env = "XCAT_TOKEN", value_parser = non_blank, hide_env_values = true)]
    pub token: String,

    /// Accept self-signed certificates from the API server
    #[arg(
        long = "xcat-insecure",
        env = "XCAT_INSECURE",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub insecure: bool,
}

/// Where the inventory lives.
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct StoreConfig {
    #[arg(long = "store-host", env = "STORE_HOST", value_parser = non_blank)]
    pub host: String,

    #[arg(long = "store-port", env = "STORE_PORT", default_value_t = DEFAULT_STORE_PORT)]
    pub port: u16,

    #[arg(long = "store-user", env = "STORE_USER", value_parser = non_blank)]
    pub user: String,

    #[arg(long = "store-password", env = "STORE_PASSWD", value_parser = non_blank, hide_env_values = true)]
    pub password: String,

    #[arg(long = "store-db", env = "STORE_DB", value_parser = non_blank)]
    pub database: String,

    /// Table holding one row per address record
    #[arg(long = "store-collection", env = "STORE_COLLECTION", value_parser = non_blank)]
    pub collection: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ScanConfig {
    /// Number of probe workers
    #[arg(long, env = "SCAN_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY, value_parser = at_least_one)]
    pub concurrency: usize,

    /// Seconds between the end of one pass and the start of the next
    #[arg(long = "scan-interval-secs", env = "SCAN_INTERVAL_SECS", default_value = "14400", value_parser = secs)]
    pub interval: Duration,

    #[arg(long = "ping-timeout-ms", env = "PING_TIMEOUT_MS", default_value = "1000", value_parser = millis)]
    pub ping_timeout: Duration,

    #[arg(long = "ptr-timeout-ms", env = "PTR_TIMEOUT_MS", default_value = "1000", value_parser = millis)]
    pub ptr_timeout: Duration,

    /// Resolver for PTR lookups, `addr` or `addr:port`; defaults to the system resolver
    #[arg(long = "dns-server", env = "DNS_SERVER", value_parser = dns_server)]
    pub dns_server: Option<SocketAddr>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            interval: DEFAULT_SCAN_INTERVAL,
            ping_timeout: DEFAULT_PROBE_TIMEOUT,
            ptr_timeout: DEFAULT_PROBE_TIMEOUT,
            dns_server: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct Config {
    #[command(flatten)]
    pub source: SourceConfig,

    #[command(flatten)]
    pub store: StoreConfig,

    #[command(flatten)]
    pub scan: ScanConfig,

    /// Address the HTTP API listens on
    #[arg(long = "listen", env = "LISTEN_ADDR", default_value_t = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,
}

fn non_blank(s: &str) -> Result<String, String> {
    let value: &str = s.trim();
    if value.is_empty() {
        return Err("must not be empty".into());
    }
    Ok(value.to_string())
}

fn at_least_one(s: &str) -> Result<usize, String> {
    match s.trim().parse::<usize>() {
        Ok(0) => Err("must be at least 1".into()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn secs(s: &str) -> Result<Duration, String> {
    s.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| e.to_string())
}

fn millis(s: &str) -> Result<Duration, String> {
    s.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| e.to_string())
}

/// Accepts `addr` or `addr:port`; the port defaults to 53.
fn dns_server(s: &str) -> Result<SocketAddr, String> {
    let s: &str = s.trim();
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Ok(addr);
    }
    s.parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, DNS_PORT))
        .map_err(|e| e.to_string())
}
