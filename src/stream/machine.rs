//! Element-level state machine assembling [`DetectionHost`] records.
//!
//! Transitions:
//!
//! ```text
//! Idle --<HOST>--> InHost --<DETECTION_LIST>--> InDetectionList --<DETECTION>--> InDetection
//!  ^                 |  ^                          |        ^                        |
//!  +----</HOST>------+  +----</DETECTION_LIST>-----+        +-----</DETECTION>-------+
//! ```
//!
//! Text is buffered from the most recent opening tag and assigned, trimmed, to the record on top
//! of the target stack when an element closes.

use super::record::{Assign, Detection, DetectionHost};
use crate::error::ClientError;

const HOST: &str = "HOST";
const DETECTION_LIST: &str = "DETECTION_LIST";
const DETECTION: &str = "DETECTION";
const SIMPLE_RETURN: &str = "SIMPLE_RETURN";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Idle,
    InHost,
    InDetectionList,
    InDetection,
}

#[derive(Debug)]
enum Target {
    Host(DetectionHost),
    Detection(Detection),
}

impl Target {
    fn assign(&mut self, element: &str, text: String) {
        match self {
            Target::Host(host) => host.assign(element, text),
            Target::Detection(detection) => detection.assign(element, text),
        }
    }
}

#[derive(Debug)]
pub(crate) struct DetectionMachine {
    state: State,
    targets: Vec<Target>,
    text: String,
    root: Option<String>,
    error_code: Option<String>,
    error_text: Option<String>,
}

impl Default for DetectionMachine {
    fn default() -> Self {
        Self {
            state: State::Idle,
            targets: Vec::new(),
            text: String::new(),
            root: None,
            error_code: None,
            error_text: None,
        }
    }
}

impl DetectionMachine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> State {
        self.state
    }

    pub(crate) fn open(&mut self, element: &str) {
        self.text.clear();
        if self.root.is_none() {
            self.root = Some(element.to_string());
        }
        match (self.state, element) {
            (State::Idle, HOST) => {
                self.targets.push(Target::Host(DetectionHost::default()));
                self.state = State::InHost;
            }
            (State::InHost, DETECTION_LIST) => self.state = State::InDetectionList,
            (State::InDetectionList, DETECTION) => {
                self.targets.push(Target::Detection(Detection::default()));
                self.state = State::InDetection;
            }
            _ => {}
        }
    }

    pub(crate) fn text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Close `element`, returning the host it completed, if any.
    pub(crate) fn close(&mut self, element: &str) -> Option<DetectionHost> {
        let text = std::mem::take(&mut self.text);
        match (self.state, element) {
            (State::InDetection, DETECTION) => {
                if let Some(Target::Detection(detection)) = self.targets.pop() {
                    if let Some(Target::Host(host)) = self.targets.last_mut() {
                        host.detections.push(detection);
                    }
                }
                self.state = State::InDetectionList;
                None
            }
            (State::InDetectionList, DETECTION_LIST) => {
                self.state = State::InHost;
                None
            }
            (State::InHost, HOST) => {
                self.state = State::Idle;
                match self.targets.pop() {
                    Some(Target::Host(host)) => Some(host),
                    _ => None,
                }
            }
            (State::InHost | State::InDetection, _) => {
                let text = text.trim();
                if !text.is_empty() {
                    if let Some(target) = self.targets.last_mut() {
                        target.assign(element, text.to_string());
                    }
                }
                None
            }
            (State::Idle, _) if self.root.as_deref() == Some(SIMPLE_RETURN) => {
                let text = text.trim().to_string();
                match element {
                    "CODE" => self.error_code = Some(text),
                    "TEXT" => self.error_text = Some(text),
                    _ => {}
                }
                None
            }
            _ => None,
        }
    }

    /// Root element seen so far.
    pub(crate) fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    /// The service error carried by a `SIMPLE_RETURN` document.
    pub(crate) fn service_error(&mut self) -> Option<ClientError> {
        if self.root.as_deref() != Some(SIMPLE_RETURN) {
            return None;
        }
        Some(ClientError::Service {
            code: self.error_code.take().unwrap_or_default(),
            message: self.error_text.take().unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(machine: &mut DetectionMachine, element: &str, text: &str) -> Option<DetectionHost> {
        machine.open(element);
        machine.text(text);
        machine.close(element)
    }

    #[test]
    fn walks_through_every_state() {
        let mut m = DetectionMachine::new();
        m.open("HOST_LIST");
        assert_eq!(m.state(), State::Idle);
        m.open("HOST");
        assert_eq!(m.state(), State::InHost);
        assert!(leaf(&mut m, "ID", " 101 ").is_none());
        m.open("DETECTION_LIST");
        assert_eq!(m.state(), State::InDetectionList);
        m.open("DETECTION");
        assert_eq!(m.state(), State::InDetection);
        leaf(&mut m, "QID", "6");
        m.text("\n   ");
        assert!(m.close("DETECTION").is_none());
        assert_eq!(m.state(), State::InDetectionList);
        m.close("DETECTION_LIST");
        assert_eq!(m.state(), State::InHost);

        let host = m.close("HOST").expect("host completed");

        assert_eq!(m.state(), State::Idle);
        assert_eq!(host.id, 101);
        assert_eq!(host.detections.len(), 1);
        assert_eq!(host.detections[0].qid, 6);
        assert!(m.service_error().is_none());
    }

    #[test]
    fn nested_leaves_are_flattened() {
        let mut m = DetectionMachine::new();
        m.open("HOST");
        m.open("DNS_DATA");
        leaf(&mut m, "HOSTNAME", "web01");
        m.close("DNS_DATA");
        let host = m.close("HOST").unwrap();
        assert_eq!(host.extra.get("HOSTNAME").map(String::as_str), Some("web01"));
        assert!(!host.extra.contains_key("DNS_DATA"));
    }

    #[test]
    fn simple_return_is_captured() {
        let mut m = DetectionMachine::new();
        m.open("SIMPLE_RETURN");
        m.open("RESPONSE");
        leaf(&mut m, "CODE", "1920");
        leaf(&mut m, "TEXT", "Request limit exceeded");
        match m.service_error() {
            Some(ClientError::Service { code, message }) => {
                assert_eq!(code, "1920");
                assert_eq!(message, "Request limit exceeded");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
