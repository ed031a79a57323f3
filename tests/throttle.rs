//! Adaptive concurrency under the throttler.

use qualys_client::rate_limit::{RateLimitState, SharedRateLimitState};
use qualys_client::telemetry::{ClientEvent, ClientResponseEvent, EventBus};
use qualys_client::ConcurrencyThrottler;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct InFlight {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl InFlight {
    fn enter(&self) -> usize {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
        now
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

fn state(concurrency: u32, running: u32) -> RateLimitState {
    RateLimitState { concurrency, concurrency_running: running, ..Default::default() }
}

fn response(next: RateLimitState) -> ClientEvent {
    ClientEvent::Response(ClientResponseEvent {
        method: "POST".into(),
        url: "https://qualysapi.example.com/qps/rest/2.0/search/am/hostasset".into(),
        attempt: 1,
        status: 200,
        status_text: "OK".into(),
        duration: Duration::from_millis(40),
        exhaustion: None,
        rate_limit_state: RateLimitState::default(),
        next_rate_limit_state: next,
    })
}

#[tokio::test(start_paused = true)]
async fn ceiling_is_never_exceeded() {
    let throttler = ConcurrencyThrottler::new(EventBus::new(), SharedRateLimitState::new(state(15, 0)));
    let in_flight = Arc::new(InFlight::default());

    let tasks = (0..20).map(|_| {
        let in_flight = in_flight.clone();
        async move {
            in_flight.enter();
            tokio::time::sleep(Duration::from_millis(10)).await;
            in_flight.leave();
        }
    });
    throttler.run(tasks).await;

    assert_eq!(in_flight.max.load(Ordering::SeqCst), 11);
}

#[tokio::test(start_paused = true)]
async fn other_consumers_shrink_the_first_wave() {
    let throttler = ConcurrencyThrottler::new(EventBus::new(), SharedRateLimitState::new(state(15, 7)));
    let origin = tokio::time::Instant::now();
    let started = Arc::new(std::sync::Mutex::new(Vec::new()));

    let tasks = (0..12).map(|_| {
        let started = started.clone();
        async move {
            started.lock().unwrap().push(origin.elapsed());
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    });
    throttler.run(tasks).await;

    let started = started.lock().unwrap();
    assert_eq!(started.len(), 12);
    assert_eq!(started.iter().filter(|at| at.is_zero()).count(), 6);
}

#[tokio::test(start_paused = true)]
async fn response_events_lower_the_ceiling_for_later_tasks() {
    let bus = EventBus::new();
    let throttler = ConcurrencyThrottler::new(bus.clone(), SharedRateLimitState::new(state(15, 0)));
    let in_flight = Arc::new(InFlight::default());
    let seen_at_start = Arc::new(std::sync::Mutex::new(Vec::new()));

    let tasks = (0..20).map(|index| {
        let (bus, in_flight, seen_at_start) = (bus.clone(), in_flight.clone(), seen_at_start.clone());
        async move {
            let now = in_flight.enter();
            seen_at_start.lock().unwrap().push((index, now));
            if index == 0 {
                bus.emit(response(state(4, 0)));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            in_flight.leave();
        }
    });
    throttler.run(tasks).await;

    let seen = seen_at_start.lock().unwrap();
    assert_eq!(seen.len(), 20);
    for (index, now) in seen.iter().filter(|(index, _)| *index >= 11) {
        assert!(*now <= 3, "task {index} started with {now} in flight");
    }
}

#[tokio::test(start_paused = true)]
async fn subscription_lives_only_while_running() {
    let bus = EventBus::new();
    let throttler = ConcurrencyThrottler::new(bus.clone(), SharedRateLimitState::default());

    let counts = throttler
        .run((0..3).map(|_| {
            let bus = bus.clone();
            async move { bus.listener_count() }
        }))
        .await;

    assert_eq!(counts, vec![1, 1, 1]);
    assert_eq!(bus.listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn outputs_follow_input_order() {
    let throttler = ConcurrencyThrottler::new(EventBus::new(), SharedRateLimitState::new(state(15, 0)));

    let outputs = throttler
        .run((0..6u64).map(|index| async move {
            tokio::time::sleep(Duration::from_millis(60 - index * 10)).await;
            index
        }))
        .await;

    assert_eq!(outputs, vec![0, 1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn empty_input_finishes_immediately() {
    let throttler = ConcurrencyThrottler::new(EventBus::new(), SharedRateLimitState::default());
    let outputs: Vec<()> = throttler.run(Vec::<std::future::Ready<()>>::new()).await;
    assert!(outputs.is_empty());
}
