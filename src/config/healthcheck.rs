// ABOUTME: Health check declarations for apps in the stack file.
// ABOUTME: An HTTP JSON status endpoint or a plain TCP port, polled at a fixed interval.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthcheckConfig {
    #[serde(default)]
    pub http: Option<HttpCheck>,

    #[serde(default)]
    pub tcp: Option<TcpCheck>,

    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,
}

/// GET `http://<host>:<port><path>`; healthy on 200 with a JSON body.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpCheck {
    /// Name of one of the app's declared ports.
    pub port: String,
    #[serde(default = "default_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TcpCheck {
    /// Name of one of the app's declared ports.
    pub port: String,
}

/// The one probe a health check resolves to.
#[derive(Debug, Clone, Copy)]
pub enum ProbeKind<'a> {
    Http(&'a HttpCheck),
    Tcp(&'a TcpCheck),
}

impl ProbeKind<'_> {
    pub fn port_name(&self) -> &str {
        match self {
            ProbeKind::Http(check) => &check.port,
            ProbeKind::Tcp(check) => &check.port,
        }
    }
}

impl HealthcheckConfig {
    pub fn probe(&self) -> Result<ProbeKind<'_>, String> {
        match (&self.http, &self.tcp) {
            (Some(http), None) => Ok(ProbeKind::Http(http)),
            (None, Some(tcp)) => Ok(ProbeKind::Tcp(tcp)),
            (None, None) => Err("health check needs one of `http` or `tcp`".to_string()),
            (Some(_), Some(_)) => Err("health check cannot be both `http` and `tcp`".to_string()),
        }
    }
}

fn default_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_path() -> String {
    "/".to_string()
}
