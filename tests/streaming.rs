//! Incremental detection parsing and dispatch.

mod common;

use common::detection_listing;
use qualys_client::error::{BoxError, ClientError};
use qualys_client::stream::{DetectionHost, StreamOptions, StreamSummary};
use qualys_client::{parse_host_detections, Iteratee};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Iteratee recording every host it sees, failing for ids in `fail`.
fn recorder(fail: &'static [u64]) -> (Arc<Mutex<Vec<DetectionHost>>>, Arc<dyn Iteratee<DetectionHost>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let iteratee = move |host: DetectionHost| {
        let sink = sink.clone();
        async move {
            let id = host.id;
            sink.lock().unwrap().push(host);
            if fail.contains(&id) {
                return Err::<(), BoxError>(format!("cannot store host {id}").into());
            }
            Ok(())
        }
    };
    (seen, Arc::new(iteratee))
}

fn options(concurrency: usize, limit: Option<usize>) -> StreamOptions {
    StreamOptions { concurrency, iteratee_error_limit: limit, on_iteratee_error: None }
}

#[tokio::test]
async fn hosts_are_delivered_in_document_order() {
    let xml = detection_listing(1, &[1, 2, 0]);
    let (seen, iteratee) = recorder(&[]);

    let summary = parse_host_detections(xml.as_bytes(), iteratee, options(1, Some(10)))
        .await
        .expect("parse");

    assert_eq!(summary, StreamSummary { hosts: 3, successes: 3, failures: 0 });
    let seen = seen.lock().unwrap();
    let shape: Vec<(u64, usize)> = seen.iter().map(|h| (h.id, h.detections.len())).collect();
    assert_eq!(shape, vec![(1, 1), (2, 2), (3, 0)]);

    let host = &seen[1];
    assert_eq!(host.ip.as_deref(), Some("10.0.0.2"));
    assert_eq!(host.os.as_deref(), Some("Linux 5.x"));
    assert_eq!(host.tracking_method.as_deref(), Some("IP"));
    assert_eq!(host.detections[1].qid, 38001);
    assert_eq!(host.detections[1].severity, Some(2));
    assert_eq!(host.detections[0].kind.as_deref(), Some("Confirmed"));
    assert_eq!(
        host.detections[0].results.as_deref(),
        Some("Package openssl <1.1.1 & friends")
    );
}

#[tokio::test]
async fn error_budget_stops_the_parse() {
    let xml = detection_listing(1, &[1, 1, 1, 1, 1]);
    let (seen, iteratee) = recorder(&[1, 2, 3, 4, 5]);

    let err = parse_host_detections(xml.as_bytes(), iteratee, options(1, Some(2)))
        .await
        .expect_err("budget exhausted");

    assert!(matches!(err, ClientError::IterateeErrorLimit { limit: 2 }), "{err:?}");
    assert_eq!(err.to_string(), "Exceeded iteratee error limit 2");
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn budget_used_up_by_the_last_hosts_fails_the_parse() {
    let xml = detection_listing(1, &[0, 0]);

    for concurrency in [1, 4] {
        let (seen, iteratee) = recorder(&[1, 2]);
        let err = parse_host_detections(xml.as_bytes(), iteratee, options(concurrency, Some(2)))
            .await
            .expect_err("budget exhausted at end of input");

        assert!(
            matches!(err, ClientError::IterateeErrorLimit { limit: 2 }),
            "concurrency {concurrency}: {err:?}"
        );
        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}

#[tokio::test]
async fn one_success_disarms_the_budget() {
    let xml = detection_listing(1, &[0, 0, 0, 0]);
    let (seen, iteratee) = recorder(&[2, 3, 4]);

    let summary = parse_host_detections(xml.as_bytes(), iteratee, options(1, Some(2)))
        .await
        .expect("first host succeeded");

    assert_eq!(summary, StreamSummary { hosts: 4, successes: 1, failures: 3 });
    assert_eq!(seen.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn failures_are_reported_and_skipped() {
    let xml = detection_listing(1, &[1, 1, 1]);
    let (seen, iteratee) = recorder(&[2]);
    let reported = Arc::new(Mutex::new(Vec::new()));
    let sink = reported.clone();
    let options = StreamOptions {
        concurrency: 1,
        iteratee_error_limit: Some(10),
        on_iteratee_error: Some(Arc::new(move |error: &BoxError, host: &DetectionHost| {
            sink.lock().unwrap().push((host.id, error.to_string()));
        })),
    };

    let summary = parse_host_detections(xml.as_bytes(), iteratee, options).await.expect("parse");

    assert_eq!(summary, StreamSummary { hosts: 3, successes: 2, failures: 1 });
    assert_eq!(seen.lock().unwrap().len(), 3);
    assert_eq!(*reported.lock().unwrap(), vec![(2, "cannot store host 2".to_string())]);
}

#[tokio::test]
async fn parsing_is_repeatable() {
    let xml = detection_listing(40, &[3, 0, 1]);
    let (first, iteratee) = recorder(&[]);
    parse_host_detections(xml.as_bytes(), iteratee, options(1, None)).await.expect("first parse");
    let (second, iteratee) = recorder(&[]);
    parse_host_detections(xml.as_bytes(), iteratee, options(1, None)).await.expect("second parse");

    assert_eq!(*first.lock().unwrap(), *second.lock().unwrap());
}

#[tokio::test]
async fn malformed_documents_fail_after_draining() {
    let xml = "<HOST_LIST_VM_DETECTION_OUTPUT><RESPONSE><HOST_LIST>\
        <HOST><ID>1</ID></HOST>\
        <HOST><ID>2</ID></DETECTION_LIST>";
    let (seen, iteratee) = recorder(&[]);

    let err = parse_host_detections(xml.as_bytes(), iteratee, options(1, None))
        .await
        .expect_err("mismatched end tag");

    assert!(matches!(err, ClientError::Xml(_)), "{err:?}");
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn service_errors_surface_as_errors() {
    let xml = r#"<?xml version="1.0" encoding="UTF-8" ?>
<SIMPLE_RETURN>
  <RESPONSE>
    <DATETIME>2024-05-01T12:00:00Z</DATETIME>
    <CODE>1965</CODE>
    <TEXT>This API cannot be run again for another 23 hours.</TEXT>
  </RESPONSE>
</SIMPLE_RETURN>"#;
    let (seen, iteratee) = recorder(&[]);

    let err = parse_host_detections(xml.as_bytes(), iteratee, options(1, None))
        .await
        .expect_err("service error");

    match err {
        ClientError::Service { code, message } => {
            assert_eq!(code, "1965");
            assert!(message.contains("23 hours"), "{message}");
        }
        other => panic!("expected a service error, got {other:?}"),
    }
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn other_documents_are_rejected() {
    let xml = "<HOST_LIST_OUTPUT><RESPONSE><HOST_LIST><HOST><ID>1</ID></HOST></HOST_LIST></RESPONSE></HOST_LIST_OUTPUT>";
    let (_, iteratee) = recorder(&[]);

    let err = parse_host_detections(xml.as_bytes(), iteratee, options(1, None))
        .await
        .expect_err("wrong document");

    assert!(matches!(err, ClientError::UnexpectedDocument { .. }), "{err:?}");
}

#[tokio::test(start_paused = true)]
async fn concurrency_bounds_running_calls() {
    let xml = detection_listing(1, &[1; 8]);
    let current = Arc::new(AtomicUsize::new(0));
    let max = Arc::new(AtomicUsize::new(0));
    let calls = Arc::new(AtomicUsize::new(0));
    let (c, m, n) = (current.clone(), max.clone(), calls.clone());
    let iteratee = move |_: DetectionHost| {
        let (c, m, n) = (c.clone(), m.clone(), n.clone());
        async move {
            let now = c.fetch_add(1, Ordering::SeqCst) + 1;
            m.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(25)).await;
            c.fetch_sub(1, Ordering::SeqCst);
            n.fetch_add(1, Ordering::SeqCst);
            Ok::<(), BoxError>(())
        }
    };

    let summary = parse_host_detections(xml.as_bytes(), Arc::new(iteratee), options(2, None))
        .await
        .expect("parse");

    assert_eq!(summary.successes, 8);
    assert_eq!(max.load(Ordering::SeqCst), 2);
    // Every started call finished before the parse returned.
    assert_eq!(calls.load(Ordering::SeqCst), 8);
    assert_eq!(current.load(Ordering::SeqCst), 0);
}
