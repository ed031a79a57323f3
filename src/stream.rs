//! Incremental parsing of host detection listings.
//!
//! A detection listing for a few hundred hosts easily runs to hundreds of megabytes, so it is
//! never buffered. [`parse_host_detections`] reads the body event by event, assembles one
//! [`DetectionHost`] at a time and hands each to the iteratee as soon as its `</HOST>` arrives:
//!
//! - At most `concurrency` iteratee calls run at once. Reading pauses while all slots are busy.
//! - Records are dispatched in document order; completion order is unspecified.
//! - With an `iteratee_error_limit`, reaching that many failures before the first success stops
//!   the parse at the next tag boundary. The host being assembled (or waiting for a slot) is
//!   dropped, the body reader is released, calls already running finish, and the parse fails
//!   with [`ClientError::IterateeErrorLimit`]. The budget is checked once more after the last
//!   call finished, so failures landing after the end of input fail the parse too.
//! - Whatever the outcome, the call returns only after every started iteratee call finished.

pub(crate) mod dispatch;
pub(crate) mod machine;
pub mod record;

use quick_xml::events::Event;
use quick_xml::Reader;
use std::sync::Arc;
use tokio::io::AsyncBufRead;
use tracing::debug;

use crate::error::ClientError;
use crate::iterate::{Iteratee, IterateeErrorHook};
use crate::wire::DocumentKind;
use dispatch::Dispatcher;
use machine::DetectionMachine;

pub use record::{Detection, DetectionHost};

/// Dispatch and error budget settings for one parse.
#[derive(Clone, Default)]
pub struct StreamOptions {
    /// Iteratee calls allowed to run at once; zero is treated as one.
    pub concurrency: usize,
    pub iteratee_error_limit: Option<usize>,
    pub on_iteratee_error: Option<IterateeErrorHook<DetectionHost>>,
}

impl std::fmt::Debug for StreamOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamOptions")
            .field("concurrency", &self.concurrency)
            .field("iteratee_error_limit", &self.iteratee_error_limit)
            .field("on_iteratee_error", &self.on_iteratee_error.is_some())
            .finish()
    }
}

/// Outcome of a completed parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Hosts handed to the iteratee.
    pub hosts: usize,
    pub successes: usize,
    pub failures: usize,
}

/// Parse a `HOST_LIST_VM_DETECTION_OUTPUT` body from `reader`, calling `iteratee` per host.
pub async fn parse_host_detections<R>(
    reader: R,
    iteratee: Arc<dyn Iteratee<DetectionHost>>,
    options: StreamOptions,
) -> Result<StreamSummary, ClientError>
where
    R: AsyncBufRead + Unpin,
{
    let mut dispatcher = Dispatcher::new(
        iteratee,
        options.concurrency,
        options.iteratee_error_limit,
        options.on_iteratee_error,
    );
    let mut machine = DetectionMachine::new();
    let mut xml = Reader::from_reader(reader);

    let outcome = read_document(&mut xml, &mut machine, &mut dispatcher).await;
    drop(xml);
    dispatcher.drain().await;

    let hosts = outcome?;
    // Calls still running at end of input may have used up the budget.
    if dispatcher.budget_exceeded() {
        return Err(dispatcher.limit_error());
    }
    if let Some(error) = machine.service_error() {
        return Err(error);
    }
    let expected = DocumentKind::HostListVmDetectionOutput.root_name();
    if machine.root() != Some(expected) {
        return Err(ClientError::UnexpectedDocument {
            expected,
            found: machine.root().unwrap_or_default().to_string(),
        });
    }

    let summary =
        StreamSummary { hosts, successes: dispatcher.successes(), failures: dispatcher.failures() };
    debug!(?summary, "detection stream complete");
    Ok(summary)
}

/// Drive the machine to the end of the document, returning the number of dispatched hosts.
async fn read_document<R>(
    xml: &mut Reader<R>,
    machine: &mut DetectionMachine,
    dispatcher: &mut Dispatcher<DetectionHost>,
) -> Result<usize, ClientError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut hosts = 0;
    loop {
        let completed = match xml.read_event_into_async(&mut buf).await? {
            Event::Start(e) => {
                machine.open(&String::from_utf8_lossy(e.name().as_ref()));
                None
            }
            Event::Empty(e) => {
                if dispatcher.budget_exceeded() {
                    return Err(dispatcher.limit_error());
                }
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                machine.open(&name);
                machine.close(&name)
            }
            Event::Text(e) => {
                machine.text(&e.unescape()?);
                None
            }
            Event::CData(e) => {
                machine.text(&String::from_utf8_lossy(&e));
                None
            }
            Event::End(e) => {
                if dispatcher.budget_exceeded() {
                    return Err(dispatcher.limit_error());
                }
                machine.close(&String::from_utf8_lossy(e.name().as_ref()))
            }
            Event::Eof => return Ok(hosts),
            _ => None,
        };
        buf.clear();

        if let Some(host) = completed {
            dispatcher.submit(host).await?;
            hosts += 1;
        }
    }
}
