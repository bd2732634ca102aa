//! One downstream emitter fed by a succession of upstreams. Each new
//! upstream is asked for whatever demand the downstream still has open.

use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc, Weak,
};

use parking_lot::Mutex;

use crate::{
  demand::Demand,
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, Emitter, Subscription, UpstreamSlot},
};

pub(crate) struct Relay<Item, Err> {
  pub(crate) emitter: Arc<Emitter<Item, Err>>,
  upstream: Mutex<Arc<UpstreamSlot>>,
  cancelled: AtomicBool,
}

impl<Item, Err> Relay<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  pub(crate) fn start<O>(subscriber: O) -> Arc<Self>
  where
    O: Subscriber<Item, Err> + 'static,
  {
    let relay = Arc::new(Relay {
      emitter: Arc::new(Emitter::new(subscriber)),
      upstream: Mutex::new(Arc::new(UpstreamSlot::new())),
      cancelled: AtomicBool::new(false),
    });
    relay.emitter.start(Arc::new(RelayHandle(Arc::downgrade(&relay))));
    relay
  }

  /// A fresh slot for the next upstream, replacing the previous one.
  pub(crate) fn attach(&self) -> Arc<UpstreamSlot> {
    let slot = Arc::new(UpstreamSlot::new());
    if self.cancelled.load(Ordering::Acquire) {
      slot.cancel();
    }
    *self.upstream.lock() = slot.clone();
    slot
  }

  pub(crate) fn connected(&self, slot: &UpstreamSlot, subscription: BoxedSubscription) {
    if slot.set(subscription) {
      let open = self.emitter.outstanding();
      if !open.is_none() {
        slot.request(open);
      }
    }
  }

  pub(crate) fn is_live(&self) -> bool { !self.cancelled.load(Ordering::Acquire) }
}

struct RelayHandle<Item, Err>(Weak<Relay<Item, Err>>);

impl<Item: Send + 'static, Err: Send + 'static> Subscription for RelayHandle<Item, Err> {
  fn request(&self, demand: Demand) {
    if let Some(relay) = self.0.upgrade() {
      relay.emitter.request(demand);
      let slot = relay.upstream.lock().clone();
      slot.request(demand);
    }
  }

  fn cancel(&self) {
    if let Some(relay) = self.0.upgrade() {
      relay.cancelled.store(true, Ordering::Release);
      relay.emitter.close();
      let slot = relay.upstream.lock().clone();
      slot.cancel();
    }
  }
}

/// Forwards everything, completions included, into a relay.
pub(crate) struct RelayUpstream<Item, Err> {
  pub(crate) relay: Arc<Relay<Item, Err>>,
  pub(crate) slot: Arc<UpstreamSlot>,
}

impl<Item: Send + 'static, Err: Send + 'static> Subscriber<Item, Err> for RelayUpstream<Item, Err> {
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    self.relay.connected(&self.slot, subscription)
  }

  fn receive(&mut self, value: Item) -> Demand {
    self.relay.emitter.push(value);
    Demand::NONE
  }

  fn receive_completion(&mut self, completion: Completion<Err>) {
    self.slot.release();
    self.relay.emitter.finish(completion);
  }
}
