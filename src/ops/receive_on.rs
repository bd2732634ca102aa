//! `receive_on` and `delay`: moving downstream delivery onto a scheduler.
//!
//! Every event the upstream produces is queued and a task is scheduled for
//! it. Each task delivers whatever event is at the head of the queue, holding
//! the downstream subscriber's lock while it does. Events therefore arrive in
//! upstream order even on a multi-threaded scheduler. Demand goes upstream
//! directly; it is not routed through the scheduler.

use std::{
  collections::VecDeque,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
  time::Duration,
};

use parking_lot::Mutex;

use crate::{
  demand::Demand,
  publisher::Publisher,
  scheduler::Scheduler,
  subscriber::{BoxedSubscriber, Completion, Subscriber},
  subscription::{BoxedSubscription, Subscription, UpstreamSlot},
};

/// Delivers every event on a scheduler, optionally after a fixed delay.
///
/// The subscription itself is always handed over without delay; values and
/// the completion are each delayed by the same amount from the moment they
/// arrive, so their relative spacing is kept.
pub struct ReceiveOnOp<S, Sch> {
  pub(crate) source: S,
  pub(crate) scheduler: Sch,
  pub(crate) delay: Option<Duration>,
}

impl<S: Clone, Sch: Clone> Clone for ReceiveOnOp<S, Sch> {
  fn clone(&self) -> Self {
    ReceiveOnOp { source: self.source.clone(), scheduler: self.scheduler.clone(), delay: self.delay }
  }
}

impl<S, Sch> Publisher for ReceiveOnOp<S, Sch>
where
  S: Publisher,
  S::Item: Send + 'static,
  S::Err: Send + 'static,
  Sch: Scheduler,
{
  type Item = S::Item;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<S::Item, S::Err> + 'static,
  {
    let hop = Arc::new(Hop {
      subscriber: Mutex::new(Some(Box::new(subscriber))),
      events: Mutex::new(VecDeque::new()),
      upstream: UpstreamSlot::new(),
      cancelled: AtomicBool::new(false),
    });
    self.source.subscribe(HopSubscriber { hop, scheduler: self.scheduler.clone(), delay: self.delay })
  }
}

enum Event<Item, Err> {
  Subscription,
  Value(Item),
  Completion(Completion<Err>),
}

struct Hop<Item, Err> {
  subscriber: Mutex<Option<BoxedSubscriber<Item, Err>>>,
  events: Mutex<VecDeque<Event<Item, Err>>>,
  upstream: UpstreamSlot,
  cancelled: AtomicBool,
}

impl<Item, Err> Hop<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn run_next(self: &Arc<Self>) {
    let mut subscriber = self.subscriber.lock();
    if self.cancelled.load(Ordering::Acquire) {
      subscriber.take();
      return;
    }
    let Some(event) = self.events.lock().pop_front() else { return };
    match event {
      Event::Subscription => {
        if let Some(s) = subscriber.as_mut() {
          s.receive_subscription(self.clone());
        }
      }
      Event::Value(value) => {
        let more = subscriber.as_mut().map_or(Demand::NONE, |s| s.receive(value));
        drop(subscriber);
        if !more.is_none() {
          self.upstream.request(more);
        }
      }
      Event::Completion(completion) => {
        let taken = subscriber.take();
        drop(subscriber);
        self.upstream.release();
        if let Some(mut s) = taken {
          s.receive_completion(completion);
        }
      }
    }
  }
}

impl<Item, Err> Subscription for Hop<Item, Err>
where
  Item: Send,
  Err: Send,
{
  fn request(&self, demand: Demand) { self.upstream.request(demand) }

  fn cancel(&self) {
    if self.cancelled.swap(true, Ordering::AcqRel) {
      return;
    }
    self.events.lock().clear();
    self.upstream.cancel();
  }
}

struct HopSubscriber<Item, Err, Sch> {
  hop: Arc<Hop<Item, Err>>,
  scheduler: Sch,
  delay: Option<Duration>,
}

impl<Item, Err, Sch> HopSubscriber<Item, Err, Sch>
where
  Item: Send + 'static,
  Err: Send + 'static,
  Sch: Scheduler,
{
  fn dispatch(&self, event: Event<Item, Err>, delay: Option<Duration>) {
    if self.hop.cancelled.load(Ordering::Acquire) {
      return;
    }
    self.hop.events.lock().push_back(event);
    let hop = self.hop.clone();
    self.scheduler.schedule(Box::new(move || hop.run_next()), delay);
  }
}

impl<Item, Err, Sch> Subscriber<Item, Err> for HopSubscriber<Item, Err, Sch>
where
  Item: Send + 'static,
  Err: Send + 'static,
  Sch: Scheduler,
{
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    if self.hop.upstream.set(subscription) {
      self.dispatch(Event::Subscription, None);
    }
  }

  fn receive(&mut self, value: Item) -> Demand {
    self.dispatch(Event::Value(value), self.delay);
    Demand::NONE
  }

  fn receive_completion(&mut self, completion: Completion<Err>) {
    self.dispatch(Event::Completion(completion), self.delay);
  }
}
