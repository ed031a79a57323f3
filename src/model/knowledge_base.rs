use serde::{Deserialize, Serialize};

/// Knowledge base entry for one QID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Vulnerability {
    pub qid: u64,
    #[serde(default)]
    pub vuln_type: Option<String>,
    #[serde(default)]
    pub severity_level: Option<u8>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub published_datetime: Option<String>,
    #[serde(default)]
    pub last_service_modification_datetime: Option<String>,
    /// `1` when a vendor patch exists.
    #[serde(default)]
    pub patchable: Option<u8>,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub consequence: Option<String>,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default)]
    pub cve_list: Option<CveList>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CveList {
    #[serde(rename = "CVE", default)]
    pub cves: Vec<Cve>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Cve {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl Vulnerability {
    pub fn cve_ids(&self) -> Vec<&str> {
        self.cve_list.iter().flat_map(|l| l.cves.iter().map(|c| c.id.as_str())).collect()
    }
}
