use std::sync::Arc;

use super::{
  subject_core::{NoReplay, SubjectCore},
  Subject,
};
use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::BoxedSubscription,
};

/// Broadcasts values to the subscribers attached when they are sent.
///
/// Clones share the same subscriber list.
pub struct PassthroughSubject<Item, Err>(Arc<SubjectCore<Item, Err>>);

impl<Item, Err> PassthroughSubject<Item, Err> {
  pub fn new() -> Self { PassthroughSubject(Arc::new(SubjectCore::new(NoReplay))) }

  /// Number of subscribers currently attached.
  pub fn subscriber_count(&self) -> usize { self.0.subscriber_count() }
}

impl<Item, Err> PassthroughSubject<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  #[inline]
  pub fn send(&self, value: Item) { self.0.send(value) }

  #[inline]
  pub fn send_completion(&self, completion: Completion<Err>) { self.0.send_completion(completion) }
}

impl<Item, Err> Default for PassthroughSubject<Item, Err> {
  fn default() -> Self { Self::new() }
}

impl<Item, Err> Clone for PassthroughSubject<Item, Err> {
  fn clone(&self) -> Self { PassthroughSubject(self.0.clone()) }
}

impl<Item, Err> Publisher for PassthroughSubject<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  type Item = Item;
  type Err = Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<Item, Err> + 'static,
  {
    self.0.subscribe(subscriber)
  }
}

impl<Item, Err> Subscriber<Item, Err> for PassthroughSubject<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    self.0.attach_upstream(subscription)
  }

  fn receive(&mut self, value: Item) -> Demand {
    self.0.send(value);
    Demand::NONE
  }

  fn receive_completion(&mut self, completion: Completion<Err>) {
    self.0.send_completion(completion)
  }
}

impl<Item, Err> Subject for PassthroughSubject<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  fn send(&self, value: Item) { self.0.send(value) }

  fn send_completion(&self, completion: Completion<Err>) { self.0.send_completion(completion) }
}
