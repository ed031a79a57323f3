use serde::{Deserialize, Serialize};

/// Web application registered for scanning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebApp {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created_date: Option<String>,
    #[serde(default)]
    pub updated_date: Option<String>,
}

/// Web application reference embedded in a finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingWebApp {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Vulnerability or sensitive-content finding of a web application scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Cursor for `lastId` pagination.
    pub id: u64,
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub qid: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub finding_type: Option<String>,
    #[serde(default)]
    pub severity: Option<u8>,
    #[serde(default)]
    pub potential: Option<bool>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub first_detected_date: Option<String>,
    #[serde(default)]
    pub last_detected_date: Option<String>,
    #[serde(default)]
    pub last_tested_date: Option<String>,
    #[serde(default)]
    pub times_detected: Option<u32>,
    #[serde(default)]
    pub web_app: Option<FindingWebApp>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finding_decodes_nested_web_app() {
        let xml = r#"<Finding>
  <id>8121</id>
  <uniqueId>5d9d6c4e-0000-0000-0000-000000000000</uniqueId>
  <qid>150004</qid>
  <name><![CDATA[Path-Based Vulnerability]]></name>
  <type>VULNERABILITY</type>
  <severity>2</severity>
  <potential>false</potential>
  <status>ACTIVE</status>
  <timesDetected>4</timesDetected>
  <webApp><id>42</id><name>Portal</name><url>https://portal.example</url></webApp>
</Finding>"#;
        let finding: Finding = quick_xml::de::from_str(xml).unwrap();
        assert_eq!(finding.id, 8121);
        assert_eq!(finding.kind.as_deref(), Some("VULNERABILITY"));
        assert_eq!(finding.potential, Some(false));
        assert_eq!(finding.times_detected, Some(4));
        assert_eq!(finding.web_app.map(|w| w.id), Some(42));
    }
}
