use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, EmptySubscription},
};

/// Emits only the first `count` values, then cancels upstream and finishes.
///
/// If the source completes before that, its completion is passed on as is.
pub struct TakeOp<S> {
  pub(crate) source: S,
  pub(crate) count: usize,
}

impl<S: Clone> Clone for TakeOp<S> {
  fn clone(&self) -> Self { TakeOp { source: self.source.clone(), count: self.count } }
}

impl<S: Publisher> Publisher for TakeOp<S> {
  type Item = S::Item;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<S::Item, S::Err> + 'static,
  {
    self.source.subscribe(TakeSubscriber {
      subscriber,
      remaining: self.count,
      upstream: None,
      done: false,
    })
  }
}

struct TakeSubscriber<O> {
  subscriber: O,
  remaining: usize,
  upstream: Option<BoxedSubscription>,
  done: bool,
}

impl<O> TakeSubscriber<O> {
  fn finish<Item, Err>(&mut self)
  where
    O: Subscriber<Item, Err>,
  {
    self.done = true;
    if let Some(upstream) = self.upstream.take() {
      upstream.cancel();
    }
    self.subscriber.receive_completion(Completion::Finished);
  }
}

impl<Item, Err, O> Subscriber<Item, Err> for TakeSubscriber<O>
where
  O: Subscriber<Item, Err>,
{
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    if self.remaining == 0 {
      subscription.cancel();
      self.subscriber.receive_subscription(EmptySubscription::boxed());
      self.finish::<Item, Err>();
      return;
    }
    self.upstream = Some(subscription.clone());
    self.subscriber.receive_subscription(subscription)
  }

  fn receive(&mut self, value: Item) -> Demand {
    if self.done {
      return Demand::NONE;
    }
    self.remaining -= 1;
    let more = self.subscriber.receive(value);
    if self.remaining == 0 {
      self.finish::<Item, Err>();
      return Demand::NONE;
    }
    more
  }

  fn receive_completion(&mut self, completion: Completion<Err>) {
    if !self.done {
      self.done = true;
      self.upstream = None;
      self.subscriber.receive_completion(completion)
    }
  }
}

/// Skips the first `count` values. Each skipped value is asked for again, so
/// the downstream still receives as many values as it requested.
pub struct DropFirstOp<S> {
  pub(crate) source: S,
  pub(crate) count: usize,
}

impl<S: Clone> Clone for DropFirstOp<S> {
  fn clone(&self) -> Self { DropFirstOp { source: self.source.clone(), count: self.count } }
}

impl<S: Publisher> Publisher for DropFirstOp<S> {
  type Item = S::Item;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<S::Item, S::Err> + 'static,
  {
    self.source.subscribe(DropFirstSubscriber { subscriber, remaining: self.count })
  }
}

struct DropFirstSubscriber<O> {
  subscriber: O,
  remaining: usize,
}

impl<Item, Err, O> Subscriber<Item, Err> for DropFirstSubscriber<O>
where
  O: Subscriber<Item, Err>,
{
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    self.subscriber.receive_subscription(subscription)
  }

  fn receive(&mut self, value: Item) -> Demand {
    if self.remaining > 0 {
      self.remaining -= 1;
      return Demand::max(1);
    }
    self.subscriber.receive(value)
  }

  fn receive_completion(&mut self, completion: Completion<Err>) {
    self.subscriber.receive_completion(completion)
  }
}
