use serde::{Deserialize, Serialize};

/// Host asset detail from the asset management search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostAsset {
    pub id: u64,
    /// Id used by the legacy VM endpoints for the same host.
    #[serde(default)]
    pub qweb_host_id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dns_host_name: Option<String>,
    #[serde(default)]
    pub fqdn: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub tracking_method: Option<String>,
    #[serde(default)]
    pub last_vuln_scan: Option<String>,
}
