//! Records delivered to iteratees.
//!
//! Field coverage follows what downstream converters read; unknown elements are ignored by the
//! decoders. Host detections come from the streaming parser instead, see
//! [`stream::record`](crate::stream::record).

pub mod assets;
pub mod knowledge_base;
pub mod was;

pub use assets::HostAsset;
pub use knowledge_base::{Cve, CveList, Vulnerability};
pub use was::{Finding, FindingWebApp, WebApp};
