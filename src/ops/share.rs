//! Sharing one upstream subscription among many subscribers.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::{
  demand::Demand,
  publisher::Publisher,
  subject::subject_core::{SubjectCore, SubjectHooks},
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, UpstreamSlot},
};

/// Shares one upstream subscription among every subscriber.
///
/// The upstream is subscribed when the first subscriber arrives and cancelled
/// once the last one leaves; a later subscriber connects again. Values are
/// not replayed: a subscriber sees what arrives while it is attached. Once the
/// upstream completed, later subscribers receive that completion right away.
///
/// The demand sent upstream is the largest demand any subscriber has open, so
/// subscribers asking for less miss the values they had no room for.
pub struct Share<S: Publisher>(Arc<ShareNode<S>>);

impl<S: Publisher> Clone for Share<S> {
  fn clone(&self) -> Self { Share(self.0.clone()) }
}

impl<S> Share<S>
where
  S: Publisher + Send + Sync + 'static,
  S::Item: Clone + Send + 'static,
  S::Err: Clone + Send + 'static,
{
  pub(crate) fn new(source: S) -> Self {
    Share(Arc::new_cyclic(|me: &Weak<ShareNode<S>>| {
      let hooks: Weak<dyn SubjectHooks> = me.clone();
      ShareNode {
        source,
        subject: Arc::new(SubjectCore::with_hooks(hooks)),
        state: Mutex::new(ShareState { connection: None, upstream_outstanding: Demand::NONE }),
        me: me.clone(),
      }
    }))
  }

  /// Number of subscribers currently attached.
  pub fn subscriber_count(&self) -> usize { self.0.subject.subscriber_count() }
}

impl<S> Publisher for Share<S>
where
  S: Publisher + Send + Sync + 'static,
  S::Item: Clone + Send + 'static,
  S::Err: Clone + Send + 'static,
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

struct ShareState {
  connection: Option<Arc<UpstreamSlot>>,
  upstream_outstanding: Demand,
}

struct ShareNode<S: Publisher> {
  source: S,
  subject: Arc<SubjectCore<S::Item, S::Err>>,
  state: Mutex<ShareState>,
  me: Weak<ShareNode<S>>,
}

impl<S> ShareNode<S>
where
  S: Publisher + Send + Sync + 'static,
  S::Item: Clone + Send + 'static,
  S::Err: Clone + Send + 'static,
{
  fn connect(&self) {
    let Some(node) = self.me.upgrade() else { return };
    let slot = {
      let mut state = self.state.lock();
      if state.connection.is_some()
        || self.subject.is_terminated()
        || self.subject.subscriber_count() == 0
      {
        return;
      }
      let slot = Arc::new(UpstreamSlot::new());
      state.connection = Some(slot.clone());
      state.upstream_outstanding = Demand::NONE;
      slot
    };
    tracing::debug!("share connected upstream");
    self.source.subscribe(ShareUpstream { node, slot });
  }

  /// Demand to add upstream so it covers the hungriest subscriber.
  fn take_extra(&self, slot: &Arc<UpstreamSlot>) -> Demand {
    let mut state = self.state.lock();
    if !state.connection.as_ref().is_some_and(|c| Arc::ptr_eq(c, slot)) {
      return Demand::NONE;
    }
    let extra = self.subject.max_outstanding().excess_over(state.upstream_outstanding);
    state.upstream_outstanding += extra;
    extra
  }

  fn is_current(&self, slot: &Arc<UpstreamSlot>) -> bool {
    self.state.lock().connection.as_ref().is_some_and(|c| Arc::ptr_eq(c, slot))
  }
}

impl<S> SubjectHooks for ShareNode<S>
where
  S: Publisher + Send + Sync + 'static,
  S::Item: Clone + Send + 'static,
  S::Err: Clone + Send + 'static,
{
  fn demand_changed(&self) {
    let slot = self.state.lock().connection.clone();
    if let Some(slot) = slot {
      let extra = self.take_extra(&slot);
      if !extra.is_none() {
        slot.request(extra);
      }
    }
  }

  fn detached(&self) {
    let slot = {
      let mut state = self.state.lock();
      if self.subject.subscriber_count() > 0 || self.subject.is_terminated() {
        return;
      }
      state.connection.take()
    };
    if let Some(slot) = slot {
      tracing::debug!("share disconnected upstream, no subscribers left");
      slot.cancel();
    }
  }
}

struct ShareUpstream<S: Publisher> {
  node: Arc<ShareNode<S>>,
  slot: Arc<UpstreamSlot>,
}

impl<S> Subscriber<S::Item, S::Err> for ShareUpstream<S>
where
  S: Publisher + Send + Sync + 'static,
  S::Item: Clone + Send + 'static,
  S::Err: Clone + Send + 'static,
{
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    if !self.node.is_current(&self.slot) {
      subscription.cancel();
      return;
    }
    if self.slot.set(subscription) {
      self.node.demand_changed();
    }
  }

  fn receive(&mut self, value: S::Item) -> Demand {
    {
      let mut state = self.node.state.lock();
      if !state.connection.as_ref().is_some_and(|c| Arc::ptr_eq(c, &self.slot)) {
        return Demand::NONE;
      }
      state.upstream_outstanding.consume();
    }
    self.node.subject.send(value);
    self.node.take_extra(&self.slot)
  }

  fn receive_completion(&mut self, completion: Completion<S::Err>) {
    let current = {
      let mut state = self.node.state.lock();
      let current = state.connection.as_ref().is_some_and(|c| Arc::ptr_eq(c, &self.slot));
      if current {
        state.connection = None;
      }
      current
    };
    self.slot.release();
    if current {
      tracing::debug!(failed = completion.is_failed(), "shared upstream completed");
      self.node.subject.send_completion(completion);
    }
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
  fn subscribers_share_values_and_completion() {
    let upstream = PassthroughSubject::<&str, ()>::new();
    let shared = upstream.clone().share();
    let (a, b) = (Recorder::new(Demand::Unlimited), Recorder::new(Demand::Unlimited));
    shared.subscribe(a.clone());
    shared.subscribe(b.clone());
    assert_eq!(upstream.subscriber_count(), 1);

    upstream.send("payload");
    upstream.send_completion(Completion::Finished);
    assert_eq!(a.values(), vec!["payload"]);
    assert_eq!(b.values(), vec!["payload"]);
    assert_eq!(b.completion(), Some(Completion::Finished));

    let late = Recorder::new(Demand::Unlimited);
    shared.subscribe(late.clone());
    assert!(late.values().is_empty());
    assert_eq!(late.completion(), Some(Completion::Finished));
  }

  #[test]
  fn upstream_runs_once_for_all_subscribers() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let f = fetches.clone();
    let trigger = PassthroughSubject::<(), ()>::new();
    let shared = trigger
      .clone()
      .map(move |_| f.fetch_add(1, Ordering::SeqCst))
      .share();
    let (a, b) = (Recorder::new(Demand::Unlimited), Recorder::new(Demand::Unlimited));
    shared.subscribe(a.clone());
    shared.subscribe(b.clone());
    trigger.send(());
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    assert_eq!(a.values(), vec![0]);
    assert_eq!(b.values(), vec![0]);
  }

  #[test]
  fn upstream_demand_is_the_largest_downstream_demand() {
    let rec_demand = Recorder::<i32, ()>::new(Demand::max(1));
    let rec_more = Recorder::<i32, ()>::new(Demand::max(3));
    let shared = Sequence::new(1..=10).share();
    shared.subscribe(rec_demand.clone());
    assert_eq!(rec_demand.values(), vec![1]);
    shared.subscribe(rec_more.clone());
    assert_eq!(rec_more.values(), vec![2, 3, 4]);
    assert_eq!(rec_demand.values(), vec![1]);
  }

  #[test]
  fn last_cancel_disconnects() {
    let upstream = PassthroughSubject::<i32, ()>::new();
    let shared = upstream.clone().share();
    let (a, b) = (Recorder::new(Demand::Unlimited), Recorder::new(Demand::Unlimited));
    shared.subscribe(a.clone());
    shared.subscribe(b.clone());
    a.cancel();
    assert_eq!(upstream.subscriber_count(), 1);
    b.cancel();
    assert_eq!(upstream.subscriber_count(), 0);

    let c = Recorder::new(Demand::Unlimited);
    shared.subscribe(c.clone());
    assert_eq!(upstream.subscriber_count(), 1);
    upstream.send(5);
    assert_eq!(c.values(), vec![5]);
    assert!(a.values().is_empty());
  }

  #[test]
  fn failure_reaches_everyone() {
    let upstream = PassthroughSubject::<i32, &str>::new();
    let shared = upstream.clone().share();
    let (a, b) = (Recorder::new(Demand::Unlimited), Recorder::new(Demand::Unlimited));
    shared.subscribe(a.clone());
    shared.subscribe(b.clone());
    upstream.send_completion(Completion::Failed("offline"));
    assert_eq!(a.completion(), Some(Completion::Failed("offline")));
    assert_eq!(b.completion(), Some(Completion::Failed("offline")));
  }
}
