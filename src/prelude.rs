//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

// Protocol
pub use crate::demand::Demand;
// Errors
pub use crate::error::{ApiError, ConfigError, DecodeError, FetchError, TransportError};
// Operators
pub use crate::ops::{
  decode::{Decoder, JsonDecoder},
  handle_events::EventHooks,
  into_stream::PublisherStream,
  merge::merge_many,
  multicast::{Autoconnect, Multicast},
  share::Share,
};
// Publishers and sources
pub use crate::publisher::{
  data_task, empty, fail, from_iter, just, timer, BoxedPublisher, DataTask, FuturePublisher,
  MockTransport, Promise, Publisher, PublisherExt, Request, Responder, Response, ResponseMeta,
  Sequence, Transport,
};
// Schedulers
#[cfg(feature = "futures-scheduler")]
pub use crate::scheduler::ThreadPoolScheduler;
#[cfg(feature = "tokio-scheduler")]
pub use crate::scheduler::TokioScheduler;
pub use crate::scheduler::{ImmediateScheduler, Scheduler, TaskHandle, TestScheduler};
// Subjects
pub use crate::subject::{CurrentValueSubject, PassthroughSubject, Subject};
// Subscribers and subscriptions
pub use crate::subscriber::{BoxedSubscriber, Completion, Subscriber};
pub use crate::subscription::{
  BoxedSubscription, CancelBag, Cancellable, EmptySubscription, Subscription, SubscriptionGuard,
};
