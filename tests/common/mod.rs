//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use qualys_client::transport::{ApiRequest, RequestBody, ScriptedTransport};
use qualys_client::{Client, ClientConfig, Credentials, TrackingSleeper};
use std::sync::Arc;
use url::Url;

pub const API_URL: &str = "https://qualysapi.example.com";

pub fn config() -> ClientConfig {
    let mut config =
        ClientConfig::new(Url::parse(API_URL).unwrap(), Credentials::new("scanner", "hunter2"));
    config.retry.max_attempts = 2;
    config.retry.jitter = false;
    config
}

/// Route client logs to the test output; `cargo test -- --nocapture` shows them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Client answering from `transport`, never sleeping for real.
pub fn client(config: ClientConfig, transport: &ScriptedTransport) -> (Client, TrackingSleeper) {
    init_tracing();
    let sleeper = TrackingSleeper::new();
    let client = Client::builder(config)
        .transport(Arc::new(transport.clone()))
        .sleeper(Arc::new(sleeper.clone()))
        .build()
        .expect("client");
    (client, sleeper)
}

pub fn xml_body(request: &ApiRequest) -> &str {
    match &request.body {
        RequestBody::Xml(xml) => xml,
        other => panic!("expected an XML body, got {other:?}"),
    }
}

pub fn form_value<'a>(request: &'a ApiRequest, key: &str) -> Option<&'a str> {
    match &request.body {
        RequestBody::Form(params) => {
            params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
        }
        _ => None,
    }
}

/// A `ServiceResponse` page of `<WebApp>`-shaped records.
pub fn service_page(tag: &str, ids: &[u64], has_more: bool) -> String {
    let records: String = ids
        .iter()
        .map(|id| format!("<{tag}><id>{id}</id><name>record {id}</name></{tag}>"))
        .collect();
    let last_id = ids.last().map(|id| format!("<lastId>{id}</lastId>")).unwrap_or_default();
    let data = if ids.is_empty() { String::new() } else { format!("<data>{records}</data>") };
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <ServiceResponse><responseCode>SUCCESS</responseCode><count>{}</count>\
         <hasMoreRecords>{has_more}</hasMoreRecords>{last_id}{data}</ServiceResponse>",
        ids.len()
    )
}

/// A detection listing with one host per entry of `detections`, holding that many detections.
pub fn detection_listing(first_host_id: u64, detections: &[usize]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" ?>\n\
         <!DOCTYPE HOST_LIST_VM_DETECTION_OUTPUT SYSTEM \"https://qualysapi.example.com/api/2.0/fo/asset/host/vm/detection/host_list_vm_detection_output.dtd\">\n\
         <HOST_LIST_VM_DETECTION_OUTPUT>\n  <RESPONSE>\n    <DATETIME>2024-05-01T12:00:00Z</DATETIME>\n    <HOST_LIST>\n",
    );
    for (offset, count) in detections.iter().enumerate() {
        let id = first_host_id + offset as u64;
        xml.push_str(&format!(
            "      <HOST>\n        <ID>{id}</ID>\n        <IP>10.0.0.{id}</IP>\n        <TRACKING_METHOD>IP</TRACKING_METHOD>\n        <OS><![CDATA[Linux 5.x]]></OS>\n        <DNS_DATA><HOSTNAME><![CDATA[host{id}]]></HOSTNAME></DNS_DATA>\n"
        ));
        if *count > 0 {
            xml.push_str("        <DETECTION_LIST>\n");
            for n in 0..*count {
                xml.push_str(&format!(
                    "          <DETECTION>\n            <QID>{}</QID>\n            <TYPE>Confirmed</TYPE>\n            <SEVERITY>{}</SEVERITY>\n            <STATUS>Active</STATUS>\n            <RESULTS><![CDATA[Package openssl <1.1.1 & friends]]></RESULTS>\n          </DETECTION>\n",
                    38000 + n,
                    n % 5 + 1
                ));
            }
            xml.push_str("        </DETECTION_LIST>\n");
        }
        xml.push_str("      </HOST>\n");
    }
    xml.push_str("    </HOST_LIST>\n  </RESPONSE>\n</HOST_LIST_VM_DETECTION_OUTPUT>\n");
    xml
}
