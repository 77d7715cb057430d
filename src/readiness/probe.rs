// ABOUTME: Built-in health probes: HTTP JSON status endpoints and TCP ports.
// ABOUTME: AppHealthCheck binds a probe to the live deployment info of one app.

use super::{DEFAULT_INTERVAL, HealthCheckCapable, ProbeError};
use crate::config::{HealthcheckConfig, ProbeKind};
use crate::spec::AppInfo;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(2);

/// GET a status endpoint; healthy on 200 with a JSON body.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    name: String,
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(name: impl Into<String>, addr: SocketAddr, path: &str) -> Self {
        Self {
            name: name.into(),
            client: reqwest::Client::new(),
            url: format!("http://{addr}{path}"),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn probe(client: &reqwest::Client, url: &str) -> Result<(), ProbeError> {
        let response = client
            .get(url)
            .timeout(HTTP_TIMEOUT)
            .send()
            .await
            .map_err(|e| ProbeError::retryable(format!("GET {url}: {e}")))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ProbeError::retryable(format!("GET {url}: status {status}")));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map(|_| ())
            .map_err(|e| ProbeError::retryable(format!("GET {url}: invalid JSON body: {e}")))
    }
}

#[async_trait]
impl HealthCheckCapable for HttpProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> Result<(), ProbeError> {
        Self::probe(&self.client, &self.url).await
    }
}

/// Healthy once a TCP connection is accepted.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    name: String,
    addr: SocketAddr,
}

impl TcpProbe {
    pub fn new(name: impl Into<String>, addr: SocketAddr) -> Self {
        Self {
            name: name.into(),
            addr,
        }
    }

    async fn probe(addr: SocketAddr) -> Result<(), ProbeError> {
        tokio::net::TcpStream::connect(addr)
            .await
            .map(drop)
            .map_err(|e| ProbeError::retryable(format!("connect {addr}: {e}")))
    }
}

#[async_trait]
impl HealthCheckCapable for TcpProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> Result<(), ProbeError> {
        Self::probe(self.addr).await
    }
}

#[derive(Debug, Clone)]
enum Endpoint {
    /// Recorded as running is enough.
    Status,
    Http { port: String, path: String },
    Tcp { port: String },
}

/// Health check of a deployed app, addressed through its latest [`AppInfo`].
///
/// The address is read on every probe, so a check built before the app is
/// deployed starts passing once the app records its info.
#[derive(Debug, Clone)]
pub struct AppHealthCheck {
    name: String,
    info: Arc<AppInfo>,
    endpoint: Endpoint,
    interval: Duration,
    client: reqwest::Client,
}

impl AppHealthCheck {
    pub fn new(
        name: impl Into<String>,
        info: Arc<AppInfo>,
        config: &HealthcheckConfig,
    ) -> Result<Self, String> {
        let endpoint = match config.probe()? {
            ProbeKind::Http(http) => Endpoint::Http {
                port: http.port.clone(),
                path: http.path.clone(),
            },
            ProbeKind::Tcp(tcp) => Endpoint::Tcp {
                port: tcp.port.clone(),
            },
        };
        Ok(Self {
            name: name.into(),
            info,
            endpoint,
            interval: config.interval,
            client: reqwest::Client::new(),
        })
    }

    /// Healthy as soon as the app is recorded as running.
    pub fn running(name: impl Into<String>, info: Arc<AppInfo>) -> Self {
        Self {
            name: name.into(),
            info,
            endpoint: Endpoint::Status,
            interval: DEFAULT_INTERVAL,
            client: reqwest::Client::new(),
        }
    }

    fn addr(
        &self,
        host: IpAddr,
        port_name: &str,
        ports: &BTreeMap<String, u16>,
    ) -> Result<SocketAddr, ProbeError> {
        ports
            .get(port_name)
            .map(|port| SocketAddr::new(host, *port))
            .ok_or_else(|| {
                ProbeError::fatal(format!("{} does not expose port {port_name:?}", self.name))
            })
    }
}

#[async_trait]
impl HealthCheckCapable for AppHealthCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn health_check(&self) -> Result<(), ProbeError> {
        let info = self.info.info();
        if !info.is_running() {
            return Err(ProbeError::retryable(format!("{} hasn't started yet", self.name)));
        }
        if let Endpoint::Status = self.endpoint {
            return Ok(());
        }
        let host = info
            .host_from_host
            .ok_or_else(|| ProbeError::retryable(format!("{} has no address yet", self.name)))?;

        match &self.endpoint {
            Endpoint::Status => Ok(()),
            Endpoint::Tcp { port } => TcpProbe::probe(self.addr(host, port, &info.ports)?).await,
            Endpoint::Http { port, path } => {
                let addr = self.addr(host, port, &info.ports)?;
                HttpProbe::probe(&self.client, &format!("http://{addr}{path}")).await
            }
        }
    }
}
