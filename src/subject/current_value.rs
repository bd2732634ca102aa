use std::sync::Arc;

use super::{
  subject_core::{Latest, SubjectCore},
  Subject,
};
use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::BoxedSubscription,
};

/// A subject holding the latest value.
///
/// Every new subscriber first receives the current value, as soon as it asks
/// for at least one, followed by whatever is sent afterwards.
pub struct CurrentValueSubject<Item, Err>(Arc<SubjectCore<Item, Err, Latest<Item>>>);

impl<Item, Err> CurrentValueSubject<Item, Err> {
  pub fn new(value: Item) -> Self { CurrentValueSubject(Arc::new(SubjectCore::new(Latest(value)))) }

  pub fn subscriber_count(&self) -> usize { self.0.subscriber_count() }
}

impl<Item, Err> CurrentValueSubject<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  /// The latest value sent, or the initial one.
  pub fn value(&self) -> Item { self.0.current() }

  /// Replaces the current value and broadcasts it, exactly like `send`.
  #[inline]
  pub fn set_value(&self, value: Item) { self.0.send(value) }

  #[inline]
  pub fn send(&self, value: Item) { self.0.send(value) }

  #[inline]
  pub fn send_completion(&self, completion: Completion<Err>) { self.0.send_completion(completion) }
}

impl<Item, Err> Clone for CurrentValueSubject<Item, Err> {
  fn clone(&self) -> Self { CurrentValueSubject(self.0.clone()) }
}

impl<Item, Err> Publisher for CurrentValueSubject<Item, Err>
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

impl<Item, Err> Subscriber<Item, Err> for CurrentValueSubject<Item, Err>
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

impl<Item, Err> Subject for CurrentValueSubject<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  fn send(&self, value: Item) { self.0.send(value) }

  fn send_completion(&self, completion: Completion<Err>) { self.0.send_completion(completion) }
}

#[cfg(test)]
mod test {
  use crate::{prelude::*, test_util::Recorder};

  #[test]
  fn new_subscriber_starts_with_latest_value() {
    let subject = CurrentValueSubject::<i32, ()>::new(0);
    subject.send(2);
    subject.send(3);
    let rec = Recorder::new(Demand::Unlimited);
    subject.subscribe(rec.clone());
    subject.send(4);
    assert_eq!(rec.values(), vec![3, 4]);
    assert_eq!(subject.value(), 4);
  }

  #[test]
  fn replay_waits_for_demand() {
    let subject = CurrentValueSubject::<&str, ()>::new("seed");
    let rec = Recorder::new(Demand::NONE);
    subject.subscribe(rec.clone());
    assert!(rec.values().is_empty());
    rec.request(Demand::max(1));
    assert_eq!(rec.values(), vec!["seed"]);
  }

  #[test]
  fn value_tracks_sends_without_subscribers() {
    let subject = CurrentValueSubject::<i32, ()>::new(1);
    subject.set_value(5);
    assert_eq!(subject.value(), 5);
    assert_eq!(subject.subscriber_count(), 0);
  }

  #[test]
  fn completed_subject_only_replays_completion() {
    let subject = CurrentValueSubject::<i32, ()>::new(1);
    subject.send_completion(Completion::Finished);
    subject.send(9);
    assert_eq!(subject.value(), 1);
    let rec = Recorder::new(Demand::Unlimited);
    subject.subscribe(rec.clone());
    assert!(rec.values().is_empty());
    assert_eq!(rec.completion(), Some(Completion::Finished));
  }
}
