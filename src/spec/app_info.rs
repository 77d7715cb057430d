// ABOUTME: Observed deployment facts for a single application.
// ABOUTME: AppInfo is the lock-protected handle the scheduler and health checks share.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

/// Opaque tag identifying an application kind, e.g. `cored` or `postgres`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppType(String);

impl AppType {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AppType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Lifecycle status of an application as last observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppStatus {
    /// Never deployed. Serialised as an empty string.
    #[default]
    #[serde(rename = "")]
    NotDeployed,
    #[serde(rename = "running")]
    Running,
    #[serde(rename = "stopped")]
    Stopped,
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppStatus::NotDeployed => write!(f, "not-deployed"),
            AppStatus::Running => write!(f, "running"),
            AppStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// Facts about a deployed instance, produced by a target's deploy call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentInfo {
    /// Name of the container the app runs in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,

    /// Address the app is reachable at from the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_from_host: Option<IpAddr>,

    /// Address the app is reachable at from sibling containers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_from_container: Option<IpAddr>,

    #[serde(default)]
    pub status: AppStatus,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ports: BTreeMap<String, u16>,

    /// Apps this one waited for before deploying; stop order is the reverse.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_at: Option<DateTime<Utc>>,
}

impl DeploymentInfo {
    pub fn stopped() -> Self {
        Self {
            status: AppStatus::Stopped,
            ..Default::default()
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == AppStatus::Running
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AppInfoData {
    #[serde(rename = "type")]
    app_type: AppType,

    #[serde(default)]
    info: DeploymentInfo,
}

/// Long-lived holder pairing an app type with its latest deployment info.
///
/// Readers get a snapshot copy, so a health check polling `info()` never
/// holds the lock across a probe.
#[derive(Debug)]
pub struct AppInfo {
    data: RwLock<AppInfoData>,
}

impl AppInfo {
    pub fn new(app_type: AppType) -> Self {
        Self {
            data: RwLock::new(AppInfoData {
                app_type,
                info: DeploymentInfo::default(),
            }),
        }
    }

    pub fn app_type(&self) -> AppType {
        self.data.read().app_type.clone()
    }

    pub fn info(&self) -> DeploymentInfo {
        self.data.read().info.clone()
    }

    pub fn set_info(&self, info: DeploymentInfo) {
        self.data.write().info = info;
    }
}

impl Serialize for AppInfo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.data.read().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AppInfo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        AppInfoData::deserialize(deserializer).map(|data| Self {
            data: RwLock::new(data),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_deployed_serialises_as_empty_string() {
        let json = serde_json::to_string(&AppStatus::NotDeployed).unwrap();
        assert_eq!(json, "\"\"");
        let status: AppStatus = serde_json::from_str("\"stopped\"").unwrap();
        assert_eq!(status, AppStatus::Stopped);
    }

    #[test]
    fn info_uses_camel_case_fields() {
        let info = DeploymentInfo {
            container: Some("devnet-postgres".to_string()),
            host_from_host: Some("127.0.0.1".parse().unwrap()),
            status: AppStatus::Running,
            depends_on: vec!["cored".to_string()],
            ..Default::default()
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["hostFromHost"], "127.0.0.1");
        assert_eq!(json["dependsOn"][0], "cored");
        assert!(json.get("hostFromContainer").is_none());
    }

    #[test]
    fn set_info_replaces_snapshot() {
        let app = AppInfo::new(AppType::new("postgres"));
        assert_eq!(app.info().status, AppStatus::NotDeployed);

        app.set_info(DeploymentInfo {
            status: AppStatus::Running,
            ..Default::default()
        });
        assert!(app.info().is_running());
        assert_eq!(app.app_type(), AppType::new("postgres"));
    }
}
