//! Documents of the `/api/2.0/fo/` endpoints.

use serde::Deserialize;

use super::{expect_document, DocumentKind};
use crate::error::ClientError;
use crate::model::Vulnerability;

/// Error document returned in place of the requested one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimpleReturn {
    #[serde(rename = "RESPONSE", default)]
    response: SimpleResponse,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
struct SimpleResponse {
    #[serde(rename = "CODE", default)]
    code: Option<String>,
    #[serde(rename = "TEXT", default)]
    text: Option<String>,
}

impl SimpleReturn {
    pub fn code(&self) -> Option<&str> {
        self.response.code.as_deref()
    }

    pub fn text(&self) -> Option<&str> {
        self.response.text.as_deref()
    }

    pub fn into_error(self) -> ClientError {
        ClientError::Service {
            code: self.response.code.unwrap_or_default(),
            message: self.response.text.unwrap_or_default(),
        }
    }
}

pub fn decode_simple_return(xml: &str) -> Result<SimpleReturn, ClientError> {
    Ok(quick_xml::de::from_str(xml)?)
}

/// Host ids of one `HOST_LIST_OUTPUT` page and the link to the next one, if truncated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostIdPage {
    pub ids: Vec<u64>,
    pub next_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HostListOutput {
    #[serde(rename = "RESPONSE")]
    response: HostListResponse,
}

#[derive(Debug, Deserialize)]
struct HostListResponse {
    #[serde(rename = "ID_SET", default)]
    id_set: Option<IdSet>,
    #[serde(rename = "HOST_LIST", default)]
    host_list: Option<HostList>,
    #[serde(rename = "WARNING", default)]
    warning: Option<Warning>,
}

/// `details=None` answer: ids and inclusive ranges, in document order.
#[derive(Debug, Deserialize)]
struct IdSet {
    #[serde(rename = "$value", default)]
    entries: Vec<IdEntry>,
}

#[derive(Debug, Deserialize)]
enum IdEntry {
    #[serde(rename = "ID")]
    Id(u64),
    #[serde(rename = "ID_RANGE")]
    Range(String),
}

/// `details=Basic` answer.
#[derive(Debug, Deserialize)]
struct HostList {
    #[serde(rename = "HOST", default)]
    hosts: Vec<HostId>,
}

#[derive(Debug, Deserialize)]
struct HostId {
    #[serde(rename = "ID")]
    id: u64,
}

#[derive(Debug, Deserialize)]
struct Warning {
    #[serde(rename = "URL", default)]
    url: Option<String>,
}

/// Most ids one `ID_RANGE` may expand to.
const MAX_ID_RANGE_SPAN: u64 = 1_000_000;

fn expand_range(range: &str) -> Result<std::ops::RangeInclusive<u64>, ClientError> {
    let invalid = || ClientError::Service {
        code: "INVALID_ID_RANGE".into(),
        message: format!("cannot parse id range {range:?}"),
    };
    let (start, end) = range.split_once('-').ok_or_else(invalid)?;
    let start: u64 = start.trim().parse().map_err(|_| invalid())?;
    let end: u64 = end.trim().parse().map_err(|_| invalid())?;
    if end < start {
        return Err(invalid());
    }
    if end - start >= MAX_ID_RANGE_SPAN {
        return Err(ClientError::Service {
            code: "INVALID_ID_RANGE".into(),
            message: format!("id range {range:?} spans more than {MAX_ID_RANGE_SPAN} ids"),
        });
    }
    Ok(start..=end)
}

/// Decode a `HOST_LIST_OUTPUT` page, expanding `ID_RANGE` entries.
pub fn decode_host_ids(xml: &str) -> Result<HostIdPage, ClientError> {
    expect_document(xml, DocumentKind::HostListOutput)?;
    let output: HostListOutput = quick_xml::de::from_str(xml)?;
    let response = output.response;

    let mut ids = Vec::new();
    if let Some(set) = response.id_set {
        for entry in set.entries {
            match entry {
                IdEntry::Id(id) => ids.push(id),
                IdEntry::Range(range) => ids.extend(expand_range(&range)?),
            }
        }
    }
    if let Some(list) = response.host_list {
        ids.extend(list.hosts.into_iter().map(|h| h.id));
    }

    let next_url = response.warning.and_then(|w| w.url).map(|u| u.trim().to_string());
    Ok(HostIdPage { ids, next_url: next_url.filter(|u| !u.is_empty()) })
}

#[derive(Debug, Deserialize)]
struct VulnListOutput {
    #[serde(rename = "RESPONSE")]
    response: VulnListResponse,
}

#[derive(Debug, Deserialize)]
struct VulnListResponse {
    #[serde(rename = "VULN_LIST", default)]
    vuln_list: Option<VulnList>,
}

#[derive(Debug, Deserialize)]
struct VulnList {
    #[serde(rename = "VULN", default)]
    vulns: Vec<Vulnerability>,
}

/// Decode a `KNOWLEDGE_BASE_VULN_LIST_OUTPUT` document.
pub fn decode_vulnerabilities(xml: &str) -> Result<Vec<Vulnerability>, ClientError> {
    expect_document(xml, DocumentKind::KnowledgeBaseVulnListOutput)?;
    let output: VulnListOutput = quick_xml::de::from_str(xml)?;
    Ok(output.response.vuln_list.map(|l| l.vulns).unwrap_or_default())
}
