//! # rxstream: demand-driven reactive streams
//!
//! Publishers describe streams of values that end with a completion.
//! Subscribers receive them as far as their demand allows: nothing is pushed
//! that was not asked for, except through subjects, which drop values for
//! subscribers without credit.
//!
//! ## Quick Start
//!
//! ```rust
//! use rxstream::prelude::*;
//!
//! let seen = std::sync::Arc::new(std::sync::Mutex::new(vec![]));
//! let out = seen.clone();
//! let _handle = from_iter(0..10)
//!   .filter(|v| v % 2 == 0)
//!   .map(|v| v * 2)
//!   .sink_value(move |v| out.lock().unwrap().push(v));
//! assert_eq!(*seen.lock().unwrap(), vec![0, 4, 8, 12, 16]);
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Demand`] | How many more values a subscriber accepts |
//! | [`Publisher`] | Describes a stream; every subscribe starts a run |
//! | [`Subscriber`] | Receives a subscription, values, then one completion |
//! | [`Subscription`] | Requests more values or cancels |
//! | [`Subject`] | A publisher values can be sent into by hand |
//! | [`Scheduler`] | Where and when hand-off work runs |
//!
//! ## Feature Flags
//!
//! - **`futures-scheduler`** (default): [`ThreadPoolScheduler`] on the
//!   `futures` thread pool
//! - **`tokio-scheduler`**: [`TokioScheduler`] on a tokio runtime
//!
//! [`Demand`]: demand::Demand
//! [`Publisher`]: publisher::Publisher
//! [`Subscriber`]: subscriber::Subscriber
//! [`Subscription`]: subscription::Subscription
//! [`Subject`]: subject::Subject
//! [`Scheduler`]: scheduler::Scheduler
//! [`ThreadPoolScheduler`]: scheduler
//! [`TokioScheduler`]: scheduler

pub mod demand;
pub mod error;
pub mod ops;
pub mod prelude;
pub mod publisher;
pub mod scheduler;
pub mod subject;
pub mod subscriber;
pub mod subscription;

#[cfg(test)]
mod test_util;

pub use prelude::*;
