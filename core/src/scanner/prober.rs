//! Liveness probing.

use std::net::Ipv4Addr;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Extra time granted to the ping process itself (fork, exec, socket setup).
const PROCESS_GRACE: Duration = Duration::from_millis(500);

#[async_trait]
pub trait Prober: Send + Sync {
    /// `true` when `addr` answered. Errors and silence both mean `false`.
    async fn is_alive(&self, addr: Ipv4Addr) -> bool;
}

/// Sends a single ICMP echo through the system `ping` binary, which carries
/// the raw socket privileges so this process does not have to.
pub struct PingProber {
    program: String,
    timeout: Duration,
}

impl PingProber {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "ping".to_string(),
            timeout,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, addr: Ipv4Addr) -> Command {
        // -W takes whole seconds
        let wait_secs: u64 = self.timeout.as_secs_f64().ceil().max(1.0) as u64;
        let mut cmd = Command::new(&self.program);
        cmd.arg("-c1")
            .arg("-W")
            .arg(wait_secs.to_string())
            .arg(addr.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Prober for PingProber {
    async fn is_alive(&self, addr: Ipv4Addr) -> bool {
        let deadline: Duration = self.timeout.max(Duration::from_secs(1)) + PROCESS_GRACE;
        match tokio::time::timeout(deadline, self.command(addr).status()).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                debug!(%addr, "ping could not run: {e}");
                false
            }
            Err(_) => {
                debug!(%addr, "ping timed out");
                false
            }
        }
    }
}
