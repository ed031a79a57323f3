//! `ServiceRequest` bodies for the REST search endpoints.

use quick_xml::escape::escape;
use std::fmt::Write;

/// One search criterion, rendered as `<Criteria field=".." operator="..">value</Criteria>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Criteria {
    pub field: String,
    pub operator: String,
    pub value: String,
}

impl Criteria {
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: impl ToString) -> Self {
        Self { field: field.into(), operator: operator.into(), value: value.to_string() }
    }

    pub fn equals(field: impl Into<String>, value: impl ToString) -> Self {
        Self::new(field, "EQUALS", value)
    }

    /// `IN` criterion over a comma separated list.
    pub fn one_of(field: impl Into<String>, values: &[u64]) -> Self {
        let joined = values.iter().map(u64::to_string).collect::<Vec<_>>().join(",");
        Self::new(field, "IN", joined)
    }
}

/// Where a page starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Start {
    First,
    Offset(u64),
    Id(u64),
}

pub(crate) fn render(criteria: &[Criteria], limit: u32, start: Start) -> String {
    let mut xml = String::from("<ServiceRequest><preferences>");
    // Writing to a String cannot fail.
    let _ = write!(xml, "<limitResults>{limit}</limitResults>");
    match start {
        Start::First => {}
        Start::Offset(offset) => {
            let _ = write!(xml, "<startFromOffset>{offset}</startFromOffset>");
        }
        Start::Id(id) => {
            let _ = write!(xml, "<startFromId>{id}</startFromId>");
        }
    }
    xml.push_str("</preferences>");

    if !criteria.is_empty() {
        xml.push_str("<filters>");
        for c in criteria {
            let _ = write!(
                xml,
                r#"<Criteria field="{}" operator="{}">{}</Criteria>"#,
                escape(c.field.as_str()),
                escape(c.operator.as_str()),
                escape(c.value.as_str())
            );
        }
        xml.push_str("</filters>");
    }
    xml.push_str("</ServiceRequest>");
    xml
}
