//! Records assembled by the detection parser.
//!
//! Known leaf elements land in typed fields. Anything else, including known numeric fields whose
//! text does not parse, is kept verbatim in `extra` under its element name; leaves of nested
//! containers are flattened the same way, the last occurrence winning.

use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

/// One host of a `HOST_LIST_VM_DETECTION_OUTPUT` document with its detections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetectionHost {
    pub id: u64,
    pub ip: Option<String>,
    pub ipv6: Option<String>,
    pub tracking_method: Option<String>,
    pub os: Option<String>,
    pub dns: Option<String>,
    pub netbios: Option<String>,
    pub qg_hostid: Option<String>,
    pub last_scan_datetime: Option<String>,
    pub last_vm_scanned_date: Option<String>,
    pub detections: Vec<Detection>,
    pub extra: BTreeMap<String, String>,
}

/// A vulnerability detected on a host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Detection {
    pub qid: u64,
    /// `Confirmed`, `Potential` or `Info`.
    pub kind: Option<String>,
    pub severity: Option<u8>,
    pub port: Option<u16>,
    pub protocol: Option<String>,
    pub ssl: Option<bool>,
    pub status: Option<String>,
    pub results: Option<String>,
    pub first_found_datetime: Option<String>,
    pub last_found_datetime: Option<String>,
    pub last_test_datetime: Option<String>,
    pub last_update_datetime: Option<String>,
    pub times_found: Option<u32>,
    pub is_disabled: Option<bool>,
    pub extra: BTreeMap<String, String>,
}

/// Something leaf text can be assigned to.
pub(crate) trait Assign {
    fn assign(&mut self, element: &str, text: String);
}

fn parsed<T: FromStr>(element: &str, text: String, extra: &mut BTreeMap<String, String>) -> Option<T> {
    match text.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            extra.insert(element.to_string(), text);
            None
        }
    }
}

/// The API writes booleans as `0`/`1`.
fn flag(element: &str, text: String, extra: &mut BTreeMap<String, String>) -> Option<bool> {
    match text.as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => {
            extra.insert(element.to_string(), text);
            None
        }
    }
}

impl Assign for DetectionHost {
    fn assign(&mut self, element: &str, text: String) {
        match element {
            "ID" => {
                if let Some(id) = parsed(element, text, &mut self.extra) {
                    self.id = id;
                }
            }
            "IP" => self.ip = Some(text),
            "IPV6" => self.ipv6 = Some(text),
            "TRACKING_METHOD" => self.tracking_method = Some(text),
            "OS" => self.os = Some(text),
            "DNS" => self.dns = Some(text),
            "NETBIOS" => self.netbios = Some(text),
            "QG_HOSTID" => self.qg_hostid = Some(text),
            "LAST_SCAN_DATETIME" => self.last_scan_datetime = Some(text),
            "LAST_VM_SCANNED_DATE" => self.last_vm_scanned_date = Some(text),
            _ => {
                self.extra.insert(element.to_string(), text);
            }
        }
    }
}

impl Assign for Detection {
    fn assign(&mut self, element: &str, text: String) {
        let extra = &mut self.extra;
        match element {
            "QID" => {
                if let Some(qid) = parsed(element, text, extra) {
                    self.qid = qid;
                }
            }
            "TYPE" => self.kind = Some(text),
            "SEVERITY" => self.severity = parsed(element, text, extra),
            "PORT" => self.port = parsed(element, text, extra),
            "PROTOCOL" => self.protocol = Some(text),
            "SSL" => self.ssl = flag(element, text, extra),
            "STATUS" => self.status = Some(text),
            "RESULTS" => self.results = Some(text),
            "FIRST_FOUND_DATETIME" => self.first_found_datetime = Some(text),
            "LAST_FOUND_DATETIME" => self.last_found_datetime = Some(text),
            "LAST_TEST_DATETIME" => self.last_test_datetime = Some(text),
            "LAST_UPDATE_DATETIME" => self.last_update_datetime = Some(text),
            "TIMES_FOUND" => self.times_found = parsed(element, text, extra),
            "IS_DISABLED" => self.is_disabled = flag(element, text, extra),
            _ => {
                extra.insert(element.to_string(), text);
            }
        }
    }
}
