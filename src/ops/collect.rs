use std::sync::{Arc, Weak};

use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, Emitter, Subscription, UpstreamSlot},
};

/// Gathers every upstream value and emits them as one `Vec` once the source
/// finishes. An empty source yields an empty `Vec`; a failure discards what
/// was gathered.
///
/// The upstream is asked for everything up front. The single output value
/// still waits for downstream demand.
pub struct CollectOp<S> {
  pub(crate) source: S,
}

impl<S: Clone> Clone for CollectOp<S> {
  fn clone(&self) -> Self { CollectOp { source: self.source.clone() } }
}

impl<S> Publisher for CollectOp<S>
where
  S: Publisher,
  S::Item: Send + 'static,
  S::Err: Send + 'static,
{
  type Item = Vec<S::Item>;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<Vec<S::Item>, S::Err> + 'static,
  {
    let emitter = Arc::new(Emitter::new(subscriber));
    let upstream = Arc::new(UpstreamSlot::new());
    emitter.start(Arc::new(CollectSubscription {
      emitter: Arc::downgrade(&emitter),
      upstream: upstream.clone(),
    }));
    if upstream.is_closed() {
      return;
    }
    self.source.subscribe(Collector { values: vec![], emitter, upstream })
  }
}

struct CollectSubscription<Item, Err> {
  emitter: Weak<Emitter<Vec<Item>, Err>>,
  upstream: Arc<UpstreamSlot>,
}

impl<Item: Send, Err: Send> Subscription for CollectSubscription<Item, Err> {
  fn request(&self, demand: Demand) {
    if let Some(emitter) = self.emitter.upgrade() {
      emitter.request(demand);
    }
  }

  fn cancel(&self) {
    if let Some(emitter) = self.emitter.upgrade() {
      emitter.close();
    }
    self.upstream.cancel();
  }
}

struct Collector<Item, Err> {
  values: Vec<Item>,
  emitter: Arc<Emitter<Vec<Item>, Err>>,
  upstream: Arc<UpstreamSlot>,
}

impl<Item: Send, Err: Send> Subscriber<Item, Err> for Collector<Item, Err> {
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    if self.upstream.set(subscription.clone()) {
      subscription.request(Demand::Unlimited);
    }
  }

  fn receive(&mut self, value: Item) -> Demand {
    self.values.push(value);
    Demand::NONE
  }

  fn receive_completion(&mut self, completion: Completion<Err>) {
    self.upstream.release();
    if let Completion::Finished = completion {
      self.emitter.push(std::mem::take(&mut self.values));
    }
    self.emitter.finish(completion);
  }
}
