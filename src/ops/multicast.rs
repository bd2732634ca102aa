//! Explicitly connected multicasting through a caller-supplied subject.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
  demand::Demand,
  publisher::Publisher,
  subject::Subject,
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, Cancellable, UpstreamSlot},
};

/// Subscribers attach to the subject; the upstream only starts once
/// [`Multicast::connect`] is called. This lets every subscriber be in place
/// before the first value is produced.
pub struct Multicast<S, Sub> {
  source: Arc<S>,
  subject: Sub,
  connection: Arc<Mutex<Option<Cancellable>>>,
}

impl<S, Sub: Clone> Clone for Multicast<S, Sub> {
  fn clone(&self) -> Self {
    Multicast {
      source: self.source.clone(),
      subject: self.subject.clone(),
      connection: self.connection.clone(),
    }
  }
}

impl<S, Sub> Multicast<S, Sub>
where
  S: Publisher,
  Sub: Subject<Item = S::Item, Err = S::Err>,
{
  pub(crate) fn new(source: S, subject: Sub) -> Self {
    Multicast { source: Arc::new(source), subject, connection: Arc::new(Mutex::new(None)) }
  }

  /// Subscribes the subject to the upstream. While that connection is open,
  /// calling `connect` again returns the same handle.
  pub fn connect(&self) -> Cancellable {
    let handle = {
      let mut connection = self.connection.lock();
      if let Some(open) = connection.as_ref().filter(|c| !c.is_closed()) {
        return open.clone();
      }
      let handle = Cancellable::new();
      *connection = Some(handle.clone());
      handle
    };
    tracing::debug!("multicast connecting upstream");
    self
      .source
      .subscribe(ConnectSubscriber { subject: self.subject.clone(), slot: handle.0.clone() });
    handle
  }

  /// A publisher that connects as soon as someone subscribes to it.
  pub fn autoconnect(self) -> Autoconnect<S, Sub> { Autoconnect(self) }
}

impl<S, Sub> Publisher for Multicast<S, Sub>
where
  S: Publisher,
  Sub: Subject<Item = S::Item, Err = S::Err>,
{
  type Item = S::Item;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<S::Item, S::Err> + 'static,
  {
    self.subject.subscribe(subscriber)
  }
}

/// See [`Multicast::autoconnect`].
pub struct Autoconnect<S, Sub>(Multicast<S, Sub>);

impl<S, Sub: Clone> Clone for Autoconnect<S, Sub> {
  fn clone(&self) -> Self { Autoconnect(self.0.clone()) }
}

impl<S, Sub> Publisher for Autoconnect<S, Sub>
where
  S: Publisher,
  Sub: Subject<Item = S::Item, Err = S::Err>,
{
  type Item = S::Item;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<S::Item, S::Err> + 'static,
  {
    self.0.subject.subscribe(subscriber);
    self.0.connect();
  }
}

struct ConnectSubscriber<Sub> {
  subject: Sub,
  slot: Arc<UpstreamSlot>,
}

impl<Sub: Subject> Subscriber<Sub::Item, Sub::Err> for ConnectSubscriber<Sub> {
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    if self.slot.set(subscription.clone()) {
      subscription.request(Demand::Unlimited);
    }
  }

  fn receive(&mut self, value: Sub::Item) -> Demand {
    self.subject.send(value);
    Demand::NONE
  }

  fn receive_completion(&mut self, completion: Completion<Sub::Err>) {
    self.slot.release();
    self.subject.send_completion(completion);
  }
}

#[cfg(test)]
mod test {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  use crate::{prelude::*, test_util::Recorder};

  #[test]
  fn nothing_flows_before_connect() {
    let multicast = from_iter(1..=3).multicast(PassthroughSubject::new());
    let (a, b) = (Recorder::new(Demand::Unlimited), Recorder::new(Demand::Unlimited));
    multicast.subscribe(a.clone());
    multicast.subscribe(b.clone());
    assert!(a.values().is_empty());

    let connection = multicast.connect();
    assert_eq!(a.values(), vec![1, 2, 3]);
    assert_eq!(b.values(), vec![1, 2, 3]);
    assert_eq!(b.completion(), Some(Completion::Finished));
    assert!(connection.is_closed());
  }

  #[test]
  fn connect_is_idempotent_while_open() {
    let subscribes = Arc::new(AtomicUsize::new(0));
    let count = subscribes.clone();
    let upstream = PassthroughSubject::<i32, ()>::new();
    let multicast = upstream
      .clone()
      .handle_events(EventHooks::new().on_subscription(move || {
        count.fetch_add(1, Ordering::SeqCst);
      }))
      .multicast(PassthroughSubject::new());
    let rec = Recorder::new(Demand::Unlimited);
    multicast.subscribe(rec.clone());

    let first = multicast.connect();
    let _second = multicast.connect();
    assert_eq!(subscribes.load(Ordering::SeqCst), 1);
    upstream.send(1);

    first.cancel();
    assert_eq!(upstream.subscriber_count(), 0);
    upstream.send(2);
    assert_eq!(rec.values(), vec![1]);
  }

  #[test]
  fn current_value_subject_replays_to_late_subscribers() {
    let upstream = PassthroughSubject::<&str, ()>::new();
    let multicast = upstream.clone().multicast(CurrentValueSubject::new("idle"));
    let _connection = multicast.connect();
    upstream.send("loading");

    let rec = Recorder::new(Demand::Unlimited);
    multicast.subscribe(rec.clone());
    upstream.send("ready");
    assert_eq!(rec.values(), vec!["loading", "ready"]);
  }

  #[test]
  fn autoconnect_starts_with_first_subscriber() {
    let auto = from_iter(["a", "b"]).multicast(PassthroughSubject::new()).autoconnect();
    let rec = Recorder::new(Demand::Unlimited);
    auto.subscribe(rec.clone());
    assert_eq!(rec.values(), vec!["a", "b"]);
    assert_eq!(rec.completion(), Some(Completion::Finished));
  }
}
