use std::sync::Arc;

use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::BoxedSubscription,
};

/// Passes on only the values that satisfy a predicate.
///
/// A dropped value used up one unit of upstream demand without touching the
/// downstream balance, so it is replaced by asking upstream for one more.
pub struct FilterOp<S, F> {
  pub(crate) source: S,
  pub(crate) filter: Arc<F>,
}

impl<S: Clone, F> Clone for FilterOp<S, F> {
  fn clone(&self) -> Self { FilterOp { source: self.source.clone(), filter: self.filter.clone() } }
}

impl<S, F> Publisher for FilterOp<S, F>
where
  S: Publisher,
  F: Fn(&S::Item) -> bool + Send + Sync + 'static,
{
  type Item = S::Item;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<S::Item, S::Err> + 'static,
  {
    self.source.subscribe(FilterSubscriber { subscriber, filter: self.filter.clone() })
  }
}

pub struct FilterSubscriber<O, F> {
  subscriber: O,
  filter: Arc<F>,
}

impl<Item, Err, O, F> Subscriber<Item, Err> for FilterSubscriber<O, F>
where
  O: Subscriber<Item, Err>,
  F: Fn(&Item) -> bool + Send + Sync,
{
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    self.subscriber.receive_subscription(subscription)
  }

  fn receive(&mut self, value: Item) -> Demand {
    if (self.filter)(&value) {
      self.subscriber.receive(value)
    } else {
      Demand::max(1)
    }
  }

  fn receive_completion(&mut self, completion: Completion<Err>) {
    self.subscriber.receive_completion(completion)
  }
}

/// Maps values through a function returning `Option`, dropping the `None`s.
pub struct FilterMapOp<S, F> {
  pub(crate) source: S,
  pub(crate) func: Arc<F>,
}

impl<S: Clone, F> Clone for FilterMapOp<S, F> {
  fn clone(&self) -> Self { FilterMapOp { source: self.source.clone(), func: self.func.clone() } }
}

impl<S, F, B> Publisher for FilterMapOp<S, F>
where
  S: Publisher,
  F: Fn(S::Item) -> Option<B> + Send + Sync + 'static,
{
  type Item = B;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<B, S::Err> + 'static,
  {
    self.source.subscribe(FilterMapSubscriber { subscriber, func: self.func.clone() })
  }
}

pub struct FilterMapSubscriber<O, F> {
  subscriber: O,
  func: Arc<F>,
}

impl<Item, Err, B, O, F> Subscriber<Item, Err> for FilterMapSubscriber<O, F>
where
  O: Subscriber<B, Err>,
  F: Fn(Item) -> Option<B> + Send + Sync,
{
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    self.subscriber.receive_subscription(subscription)
  }

  fn receive(&mut self, value: Item) -> Demand {
    match (self.func)(value) {
      Some(v) => self.subscriber.receive(v),
      None => Demand::max(1),
    }
  }

  fn receive_completion(&mut self, completion: Completion<Err>) {
    self.subscriber.receive_completion(completion)
  }
}
