//! Publisher trait and combinator surface
//!
//! A [`Publisher`] describes a stream; nothing happens until it is subscribed.
//! Every call to `subscribe` starts an independent run unless the publisher
//! says otherwise (subjects, `share`, `multicast`, `FuturePublisher`).
//!
//! [`PublisherExt`] is implemented for every publisher and offers the operator
//! chain:
//!
//! ```rust
//! use rxstream::prelude::*;
//!
//! let seen = std::sync::Arc::new(std::sync::Mutex::new(vec![]));
//! let out = seen.clone();
//! let _handle = from_iter(1..=6)
//!   .filter(|v| v % 2 == 0)
//!   .map(|v| v * 10)
//!   .sink_value(move |v| out.lock().unwrap().push(v));
//! assert_eq!(*seen.lock().unwrap(), vec![20, 40, 60]);
//! ```

use std::{
  convert::Infallible,
  fmt::Debug,
  marker::PhantomData,
  sync::{Arc, Mutex},
  time::Duration,
};

use crate::{
  error::ConfigError,
  ops::{
    catch::{CatchOp, RetryOp},
    collect::CollectOp,
    combine_latest::CombineLatestOp,
    decode::{DecodeOp, Decoder},
    filter::{FilterMapOp, FilterOp},
    flat_map::FlatMapOp,
    handle_events::{EventHooks, HandleEventsOp},
    into_stream::PublisherStream,
    map::{never, MapErrOp, MapOp, SetFailureType, TryMapOp},
    merge::MergeOp,
    multicast::Multicast,
    prepend::PrependOp,
    receive_on::ReceiveOnOp,
    scan::ScanOp,
    share::Share,
    sink,
    subscribe_on::SubscribeOnOp,
    switch_to_latest::SwitchToLatestOp,
    take::{DropFirstOp, TakeOp},
  },
  scheduler::Scheduler,
  subject::Subject,
  subscriber::{BoxedSubscriber, Completion, Subscriber},
  subscription::Cancellable,
};

pub mod data_task;
pub mod future;
pub mod sequence;
pub mod timer;

pub use data_task::{
  data_task, DataTask, MockTransport, Request, Responder, Response, ResponseMeta, Transport,
};
pub use future::{FuturePublisher, Promise};
pub use sequence::{empty, fail, from_iter, just, Fail, Sequence};
pub use timer::{timer, Timer};

/// A description of a stream of `Item`s that ends with a [`Completion`].
pub trait Publisher {
  type Item;
  type Err;

  /// Attaches `subscriber`. It first receives a subscription, then values as
  /// far as its demand allows, then at most one completion.
  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<Self::Item, Self::Err> + 'static;
}

// ============================================================================
// Type erasure
// ============================================================================

trait DynPublisher<Item, Err>: Send + Sync {
  fn subscribe_boxed(&self, subscriber: BoxedSubscriber<Item, Err>);
}

impl<P> DynPublisher<P::Item, P::Err> for P
where
  P: Publisher + Send + Sync,
  P::Item: 'static,
  P::Err: 'static,
{
  fn subscribe_boxed(&self, subscriber: BoxedSubscriber<P::Item, P::Err>) {
    self.subscribe(subscriber)
  }
}

/// A publisher with its concrete type hidden, so publishers built from
/// different operator chains can be stored or returned as one type.
pub struct BoxedPublisher<Item, Err>(Arc<dyn DynPublisher<Item, Err>>);

impl<Item, Err> Clone for BoxedPublisher<Item, Err> {
  fn clone(&self) -> Self { BoxedPublisher(self.0.clone()) }
}

impl<Item, Err> Publisher for BoxedPublisher<Item, Err> {
  type Item = Item;
  type Err = Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<Item, Err> + 'static,
  {
    self.0.subscribe_boxed(Box::new(subscriber))
  }
}

// ============================================================================
// PublisherExt
// ============================================================================

/// The operator chain, available on every [`Publisher`].
pub trait PublisherExt: Publisher + Sized {
  /// Transforms every value.
  fn map<B, F>(self, f: F) -> MapOp<Self, F>
  where
    F: Fn(Self::Item) -> B + Send + Sync + 'static,
  {
    MapOp { source: self, func: Arc::new(f) }
  }

  /// Transforms every value with a function that may fail; the first failure
  /// ends the stream and cancels upstream.
  fn try_map<B, F>(self, f: F) -> TryMapOp<Self, F>
  where
    F: Fn(Self::Item) -> Result<B, Self::Err> + Send + Sync + 'static,
  {
    TryMapOp { source: self, func: Arc::new(f) }
  }

  /// Converts the failure.
  fn map_err<E, F>(self, f: F) -> MapErrOp<Self, F>
  where
    F: Fn(Self::Err) -> E + Send + Sync + 'static,
  {
    MapErrOp { source: self, func: Arc::new(f) }
  }

  /// Gives a stream that cannot fail the failure type `E`.
  fn set_failure_type<E>(self) -> SetFailureType<Self, E>
  where
    Self: Publisher<Err = Infallible>,
  {
    MapErrOp { source: self, func: Arc::new(never::<E> as fn(Infallible) -> E) }
  }

  /// Keeps the values satisfying `filter`.
  fn filter<F>(self, filter: F) -> FilterOp<Self, F>
  where
    F: Fn(&Self::Item) -> bool + Send + Sync + 'static,
  {
    FilterOp { source: self, filter: Arc::new(filter) }
  }

  /// Maps and drops the `None`s in one step.
  fn filter_map<B, F>(self, f: F) -> FilterMapOp<Self, F>
  where
    F: Fn(Self::Item) -> Option<B> + Send + Sync + 'static,
  {
    FilterMapOp { source: self, func: Arc::new(f) }
  }

  /// Emits every intermediate state of a fold starting from `seed`.
  fn scan<B, F>(self, seed: B, f: F) -> ScanOp<Self, F, B>
  where
    F: Fn(B, Self::Item) -> B + Send + Sync + 'static,
    B: Clone + Send + 'static,
  {
    ScanOp { source: self, binary_op: Arc::new(f), seed }
  }

  /// Interleaves this stream with `other`.
  fn merge<P>(self, other: P) -> MergeOp<Self, P>
  where
    P: Publisher<Item = Self::Item, Err = Self::Err>,
  {
    MergeOp { a: self, b: other }
  }

  /// Maps every value to a publisher and merges them all.
  fn flat_map<P, F>(self, f: F) -> FlatMapOp<Self, F, P>
  where
    F: Fn(Self::Item) -> P + Send + Sync + 'static,
    P: Publisher<Err = Self::Err>,
  {
    FlatMapOp { source: self, func: Arc::new(f), max: None, _inner: PhantomData }
  }

  /// Like [`PublisherExt::flat_map`], with at most `max` inner publishers
  /// subscribed at once. A zero bound is rejected.
  fn flat_map_max<P, F>(self, max: usize, f: F) -> Result<FlatMapOp<Self, F, P>, ConfigError>
  where
    F: Fn(Self::Item) -> P + Send + Sync + 'static,
    P: Publisher<Err = Self::Err>,
  {
    FlatMapOp::new(self, f, Some(max))
  }

  /// Pairs the latest values of this stream and `other`.
  fn combine_latest<P>(self, other: P) -> CombineLatestOp<Self, P>
  where
    P: Publisher<Err = Self::Err>,
  {
    CombineLatestOp { a: self, b: other }
  }

  /// Follows only the most recent inner publisher.
  fn switch_to_latest(self) -> SwitchToLatestOp<Self>
  where
    Self::Item: Publisher<Err = Self::Err>,
  {
    SwitchToLatestOp { source: self }
  }

  /// `map` followed by `switch_to_latest`.
  fn switch_map<P, F>(self, f: F) -> SwitchToLatestOp<MapOp<Self, F>>
  where
    F: Fn(Self::Item) -> P + Send + Sync + 'static,
    P: Publisher<Err = Self::Err>,
  {
    SwitchToLatestOp { source: self.map(f) }
  }

  /// Shares one upstream subscription among all subscribers. The upstream is
  /// subscribed with the first subscriber and cancelled when the last leaves.
  fn share(self) -> Share<Self>
  where
    Self: Send + Sync + 'static,
    Self::Item: Clone + Send + 'static,
    Self::Err: Clone + Send + 'static,
  {
    Share::new(self)
  }

  /// Routes this stream through `subject` once [`Multicast::connect`] is
  /// called.
  fn multicast<Sub>(self, subject: Sub) -> Multicast<Self, Sub>
  where
    Sub: Subject<Item = Self::Item, Err = Self::Err>,
  {
    Multicast::new(self, subject)
  }

  /// Performs the subscription on `scheduler`.
  fn subscribe_on<Sch: Scheduler>(self, scheduler: Sch) -> SubscribeOnOp<Self, Sch>
  where
    Self: Send + Sync + 'static,
  {
    SubscribeOnOp { source: Arc::new(self), scheduler }
  }

  /// Delivers every event on `scheduler`.
  fn receive_on<Sch: Scheduler>(self, scheduler: Sch) -> ReceiveOnOp<Self, Sch> {
    ReceiveOnOp { source: self, scheduler, delay: None }
  }

  /// Delivers every value and the completion `delay` later on `scheduler`.
  fn delay<Sch: Scheduler>(self, delay: Duration, scheduler: Sch) -> ReceiveOnOp<Self, Sch> {
    ReceiveOnOp { source: self, scheduler, delay: Some(delay) }
  }

  /// Runs side effects on the protocol events passing through.
  fn handle_events(self, hooks: EventHooks<Self::Item, Self::Err>) -> HandleEventsOp<Self> {
    HandleEventsOp { source: self, hooks }
  }

  /// Logs every protocol event through `tracing`, prefixed by `prefix`.
  fn print(self, prefix: impl Into<String>) -> HandleEventsOp<Self>
  where
    Self::Item: Debug + 'static,
    Self::Err: Debug + 'static,
  {
    self.handle_events(EventHooks::print(prefix))
  }

  /// Emits the first `count` values, then finishes and cancels upstream.
  fn take(self, count: usize) -> TakeOp<Self> { TakeOp { source: self, count } }

  /// Skips the first `count` values.
  fn drop_first(self, count: usize) -> DropFirstOp<Self> { DropFirstOp { source: self, count } }

  /// Emits `values` before anything from this stream.
  fn prepend(self, values: impl IntoIterator<Item = Self::Item>) -> PrependOp<Self, Self::Item> {
    PrependOp { source: self, values: values.into_iter().collect() }
  }

  /// Gathers every value and emits them as one `Vec` when the stream
  /// finishes.
  fn collect(self) -> CollectOp<Self> { CollectOp { source: self } }

  /// Replaces a failed stream with the publisher `f` builds from the failure.
  fn catch<P, F>(self, f: F) -> CatchOp<Self, F>
  where
    F: Fn(Self::Err) -> P + Send + Sync + 'static,
    P: Publisher<Item = Self::Item>,
  {
    CatchOp { source: self, handler: Arc::new(f) }
  }

  /// Resubscribes after a failure, at most `attempts` times.
  fn retry(self, attempts: usize) -> RetryOp<Self>
  where
    Self: Clone,
  {
    RetryOp { source: self, attempts }
  }

  /// Decodes every payload with `decoder`.
  fn decode<D>(self, decoder: D) -> DecodeOp<Self, D>
  where
    D: Decoder,
  {
    DecodeOp { source: self, decoder: Arc::new(decoder) }
  }

  /// Bridges into a `futures::Stream`, asking for one value per poll.
  fn into_stream(self) -> PublisherStream<Self::Item, Self::Err>
  where
    Self::Item: Send + 'static,
    Self::Err: Send + 'static,
  {
    PublisherStream::new(&self)
  }

  /// Hides the concrete type.
  fn erase(self) -> BoxedPublisher<Self::Item, Self::Err>
  where
    Self: Send + Sync + 'static,
    Self::Item: 'static,
    Self::Err: 'static,
  {
    BoxedPublisher(Arc::new(self))
  }

  /// Subscribes with closures and asks for everything.
  fn sink<V, C>(self, on_value: V, on_completion: C) -> Cancellable
  where
    V: FnMut(Self::Item) + Send + 'static,
    C: FnOnce(Completion<Self::Err>) + Send + 'static,
  {
    sink::sink(&self, on_value, on_completion)
  }

  /// Subscribes a value callback to a stream that cannot fail.
  fn sink_value<V>(self, on_value: V) -> Cancellable
  where
    Self: Publisher<Err = Infallible>,
    V: FnMut(Self::Item) + Send + 'static,
  {
    sink::sink(&self, on_value, |_| {})
  }

  /// Writes every value into `target` through `write`.
  fn assign<T, W>(self, target: &Arc<Mutex<T>>, write: W) -> Cancellable
  where
    Self: Publisher<Err = Infallible>,
    T: Send + 'static,
    W: FnMut(&mut T, Self::Item) + Send + 'static,
  {
    sink::assign(&self, target.clone(), write)
  }
}

impl<P: Publisher> PublisherExt for P {}
