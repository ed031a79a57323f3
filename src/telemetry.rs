//! Client lifecycle events.
//!
//! The request executor and retry policy describe what they do as [`ClientEvent`]s published on
//! the client's [`EventBus`]. Consumers:
//!
//! - [`LogListener`] turns them into `tracing` records (subscribed by every client).
//! - [`ConcurrencyThrottler`](crate::throttle::ConcurrencyThrottler) reads capacity snapshots
//!   from response events to resize its queue.
//! - Callers may subscribe their own listeners for metrics.
//!
//! ```rust
//! use qualys_client::telemetry::{ClientEvent, EventBus};
//!
//! let bus = EventBus::new();
//! let _subscription = bus.subscribe(|event: &ClientEvent| println!("{event}"));
//! ```

pub mod bus;
pub mod events;
pub mod log;

pub use bus::{EventBus, EventListener, Subscription};
pub use events::{
    ClientDelayedRequestEvent, ClientEvent, ClientRequestEvent, ClientResponseEvent,
    ClientRetryEvent,
};
pub use log::LogListener;
