//! The `ServiceResponse` envelope of the REST search endpoints.
//!
//! ```xml
//! <ServiceResponse>
//!   <responseCode>SUCCESS</responseCode>
//!   <count>2</count>
//!   <hasMoreRecords>true</hasMoreRecords>
//!   <lastId>1017</lastId>
//!   <data><WebApp>...</WebApp><WebApp>...</WebApp></data>
//! </ServiceResponse>
//! ```

use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{expect_document, DocumentKind};
use crate::error::ClientError;

const SUCCESS: &str = "SUCCESS";

/// Pagination metadata of one page, handed to the builder of the next request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMeta {
    pub response_code: String,
    pub count: u64,
    pub has_more_records: bool,
    pub last_id: Option<u64>,
}

/// Records of one page plus its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ServicePage<T> {
    pub meta: PageMeta,
    pub records: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceResponse<T> {
    response_code: String,
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    has_more_records: Option<bool>,
    #[serde(default)]
    last_id: Option<u64>,
    #[serde(default = "Option::default")]
    data: Option<Data<T>>,
    #[serde(default)]
    response_error_details: Option<ErrorDetails>,
}

#[derive(Debug, Deserialize)]
struct Data<T> {
    #[serde(rename = "$value", default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetails {
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    error_resolution: Option<String>,
}

impl ErrorDetails {
    fn message(self) -> String {
        match (self.error_message, self.error_resolution) {
            (Some(message), Some(resolution)) => format!("{message} ({resolution})"),
            (Some(message), None) => message,
            (None, Some(resolution)) => resolution,
            (None, None) => String::new(),
        }
    }
}

/// Decode one page of `T` records.
///
/// A response code other than `SUCCESS` becomes [`ClientError::Service`].
pub fn decode_page<T: DeserializeOwned>(xml: &str) -> Result<ServicePage<T>, ClientError> {
    expect_document(xml, DocumentKind::ServiceResponse)?;
    let envelope: ServiceResponse<T> = quick_xml::de::from_str(xml)?;
    if envelope.response_code != SUCCESS {
        return Err(ClientError::Service {
            code: envelope.response_code,
            message: envelope.response_error_details.unwrap_or_default().message(),
        });
    }
    let records = envelope.data.map(|d| d.items).unwrap_or_default();
    Ok(ServicePage {
        meta: PageMeta {
            response_code: envelope.response_code,
            count: envelope.count.unwrap_or(records.len() as u64),
            has_more_records: envelope.has_more_records.unwrap_or(false),
            last_id: envelope.last_id,
        },
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Item {
        id: u64,
        name: String,
    }

    #[test]
    fn decodes_records_and_meta() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<ServiceResponse xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <responseCode>SUCCESS</responseCode>
  <count>2</count>
  <hasMoreRecords>true</hasMoreRecords>
  <lastId>12</lastId>
  <data>
    <WebApp><id>11</id><name><![CDATA[Portal]]></name></WebApp>
    <WebApp><id>12</id><name>Shop &amp; Cart</name></WebApp>
  </data>
</ServiceResponse>"#;

        let page: ServicePage<Item> = decode_page(xml).unwrap();

        assert_eq!(
            page.meta,
            PageMeta {
                response_code: "SUCCESS".into(),
                count: 2,
                has_more_records: true,
                last_id: Some(12),
            }
        );
        assert_eq!(
            page.records,
            vec![
                Item { id: 11, name: "Portal".into() },
                Item { id: 12, name: "Shop & Cart".into() },
            ]
        );
    }

    #[test]
    fn missing_data_is_an_empty_page() {
        let xml = "<ServiceResponse><responseCode>SUCCESS</responseCode><count>0</count></ServiceResponse>";
        let page: ServicePage<Item> = decode_page(xml).unwrap();
        assert!(page.records.is_empty());
        assert!(!page.meta.has_more_records);
        assert_eq!(page.meta.last_id, None);
    }

    #[test]
    fn error_codes_become_service_errors() {
        let xml = r#"<ServiceResponse>
  <responseCode>INVALID_REQUEST</responseCode>
  <responseErrorDetails>
    <errorMessage>Unknown field webApp.nme</errorMessage>
    <errorResolution>Check the criteria</errorResolution>
  </responseErrorDetails>
</ServiceResponse>"#;
        match decode_page::<Item>(xml).unwrap_err() {
            ClientError::Service { code, message } => {
                assert_eq!(code, "INVALID_REQUEST");
                assert_eq!(message, "Unknown field webApp.nme (Check the criteria)");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
