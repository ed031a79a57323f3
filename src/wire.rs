//! Decoding of the API's XML documents.
//!
//! The API speaks two dialects. The REST search endpoints wrap everything in a
//! `ServiceResponse` envelope ([`service`]); the older `/api/2.0/fo/` endpoints answer with
//! upper-case documents whose root element names the payload ([`legacy`]). Either may instead
//! return a `SIMPLE_RETURN` error document with a success status. Decoders first sniff the root
//! element with [`root_element`] and only then pick the matching shape.

pub mod legacy;
pub mod service;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ClientError;

pub use legacy::{HostIdPage, SimpleReturn};
pub use service::{PageMeta, ServicePage};

/// Top-level shapes the client understands, keyed by root element name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    ServiceResponse,
    HostListOutput,
    HostListVmDetectionOutput,
    KnowledgeBaseVulnListOutput,
    SimpleReturn,
}

impl DocumentKind {
    pub fn from_root(name: &str) -> Option<Self> {
        match name {
            "ServiceResponse" => Some(Self::ServiceResponse),
            "HOST_LIST_OUTPUT" => Some(Self::HostListOutput),
            "HOST_LIST_VM_DETECTION_OUTPUT" => Some(Self::HostListVmDetectionOutput),
            "KNOWLEDGE_BASE_VULN_LIST_OUTPUT" => Some(Self::KnowledgeBaseVulnListOutput),
            "SIMPLE_RETURN" => Some(Self::SimpleReturn),
            _ => None,
        }
    }

    pub fn root_name(self) -> &'static str {
        match self {
            Self::ServiceResponse => "ServiceResponse",
            Self::HostListOutput => "HOST_LIST_OUTPUT",
            Self::HostListVmDetectionOutput => "HOST_LIST_VM_DETECTION_OUTPUT",
            Self::KnowledgeBaseVulnListOutput => "KNOWLEDGE_BASE_VULN_LIST_OUTPUT",
            Self::SimpleReturn => "SIMPLE_RETURN",
        }
    }
}

/// Name of the first element in `xml`, skipping the declaration, comments and doctype.
pub fn root_element(xml: &str) -> Result<String, ClientError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                return Ok(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            }
            Event::Eof => {
                return Err(ClientError::UnexpectedDocument {
                    expected: "an XML document",
                    found: String::new(),
                })
            }
            _ => {}
        }
    }
}

/// Check that `xml` is a `expected` document.
///
/// A `SIMPLE_RETURN` in place of the expected document is the service reporting an error and
/// becomes [`ClientError::Service`].
pub fn expect_document(xml: &str, expected: DocumentKind) -> Result<(), ClientError> {
    let root = root_element(xml)?;
    match DocumentKind::from_root(&root) {
        Some(kind) if kind == expected => Ok(()),
        Some(DocumentKind::SimpleReturn) => Err(legacy::decode_simple_return(xml)?.into_error()),
        _ => Err(ClientError::UnexpectedDocument { expected: expected.root_name(), found: root }),
    }
}
