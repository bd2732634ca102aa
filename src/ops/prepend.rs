use std::sync::Arc;

use super::relay::{Relay, RelayUpstream};
use crate::{
  demand::Demand,
  publisher::{Publisher, Sequence},
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, UpstreamSlot},
};

/// Emits `values` first, then subscribes to the source.
///
/// The source is not subscribed before every prepended value was delivered,
/// so a cold source does no work for a subscriber that never asks that far.
pub struct PrependOp<S, Item> {
  pub(crate) source: S,
  pub(crate) values: Vec<Item>,
}

impl<S: Clone, Item: Clone> Clone for PrependOp<S, Item> {
  fn clone(&self) -> Self { PrependOp { source: self.source.clone(), values: self.values.clone() } }
}

impl<S, Item> Publisher for PrependOp<S, Item>
where
  S: Publisher<Item = Item> + Clone + Send + 'static,
  Item: Clone + Send + 'static,
  S::Err: Send + 'static,
{
  type Item = Item;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<Item, S::Err> + 'static,
  {
    let relay = Relay::start(subscriber);
    let slot = relay.attach();
    Sequence::<_, S::Err>::new(self.values.clone()).subscribe(PrefixUpstream {
      relay,
      slot,
      source: self.source.clone(),
    })
  }
}

struct PrefixUpstream<S: Publisher> {
  relay: Arc<Relay<S::Item, S::Err>>,
  slot: Arc<UpstreamSlot>,
  source: S,
}

impl<S> Subscriber<S::Item, S::Err> for PrefixUpstream<S>
where
  S: Publisher + Send + 'static,
  S::Item: Send + 'static,
  S::Err: Send + 'static,
{
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    self.relay.connected(&self.slot, subscription)
  }

  fn receive(&mut self, value: S::Item) -> Demand {
    self.relay.emitter.push(value);
    Demand::NONE
  }

  fn receive_completion(&mut self, completion: Completion<S::Err>) {
    self.slot.release();
    match completion {
      Completion::Finished if self.relay.is_live() => {
        let slot = self.relay.attach();
        self.source.subscribe(RelayUpstream { relay: self.relay.clone(), slot });
      }
      Completion::Finished => {}
      failed => self.relay.emitter.finish(failed),
    }
  }
}
