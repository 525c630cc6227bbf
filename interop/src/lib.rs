//! HTTP/2 framing conformance probes.
//!
//! This crate drives a live HTTP/2 server through deliberately malformed or
//! edge-case exchanges and checks how it reacts: a GOAWAY, a closed connection,
//! or a specific acknowledgement.
//!
//! # Usage
//!
//! ```bash
//! h2interop --server-host localhost --server-port 8443 --test-case framing
//! ```
//!
//! Scenarios are grouped in suites (`framing`, `tls`). Scenarios outside the
//! requested suite are reported as skipped.
//!
//! The binary exits with:
//! - 0: every scenario that ran passed
//! - 1: at least one scenario failed
//! - 2: the harness itself could not run (bad arguments, unresolvable target)

pub mod harness;
pub mod report;
pub mod scenarios;
pub mod testcase;
pub mod tls;

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;

use testcase::TestResult;

/// Default budget for one expected reaction from the server.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Connection parameters handed to every scenario.
#[derive(Debug, Clone)]
pub struct InteropCtx {
    pub server_host: String,
    pub server_port: u16,
    pub use_tls: bool,
    /// Name sent in SNI instead of `server_host`.
    pub server_host_override: Option<String>,
    /// How long a scenario waits for the reaction it expects.
    pub timeout: Duration,
}

impl InteropCtx {
    pub fn new(server_host: impl Into<String>, server_port: u16) -> Self {
        Self {
            server_host: server_host.into(),
            server_port,
            use_tls: true,
            server_host_override: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Plaintext variant, used against h2c servers and in tests.
    pub fn plaintext(server_host: impl Into<String>, server_port: u16) -> Self {
        Self {
            use_tls: false,
            ..Self::new(server_host, server_port)
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The TLS server name.
    pub fn server_name(&self) -> &str {
        self.server_host_override
            .as_deref()
            .unwrap_or(&self.server_host)
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn authority(&self) -> String {
        if self.server_host.contains(':') && !self.server_host.starts_with('[') {
            format!("[{}]:{}", self.server_host, self.server_port)
        } else {
            format!("{}:{}", self.server_host, self.server_port)
        }
    }

    /// Resolve the target once. Failing here is fatal for the whole run.
    pub async fn resolve(&self) -> std::io::Result<SocketAddr> {
        tokio::net::lookup_host((self.server_host.as_str(), self.server_port))
            .await?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} resolved to no addresses", self.authority()),
                )
            })
    }
}

/// The async scenario function type.
pub type AsyncScenarioFn =
    for<'a> fn(&'a InteropCtx) -> Pin<Box<dyn Future<Output = TestResult> + Send + 'a>>;

/// A registered scenario.
///
/// Scenarios are registered with the `scenario!` macro in [`scenarios`].
pub struct InteropTest {
    /// `<suite>.<case>`, e.g. `framing.short_preface`.
    pub name: &'static str,
    /// The suite a `--test-case` filter selects on.
    pub suite: &'static str,
    pub description: &'static str,
    pub func: AsyncScenarioFn,
}

inventory::collect!(InteropTest);
