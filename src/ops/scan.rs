use std::sync::Arc;

use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::BoxedSubscription,
};

/// Folds every value into an accumulator and emits each intermediate state.
///
/// Every subscription starts from its own copy of the seed.
pub struct ScanOp<S, F, B> {
  pub(crate) source: S,
  pub(crate) binary_op: Arc<F>,
  pub(crate) seed: B,
}

impl<S: Clone, F, B: Clone> Clone for ScanOp<S, F, B> {
  fn clone(&self) -> Self {
    ScanOp { source: self.source.clone(), binary_op: self.binary_op.clone(), seed: self.seed.clone() }
  }
}

impl<S, F, B> Publisher for ScanOp<S, F, B>
where
  S: Publisher,
  F: Fn(B, S::Item) -> B + Send + Sync + 'static,
  B: Clone + Send + 'static,
{
  type Item = B;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<B, S::Err> + 'static,
  {
    self.source.subscribe(ScanSubscriber {
      subscriber,
      binary_op: self.binary_op.clone(),
      acc: Some(self.seed.clone()),
    })
  }
}

pub struct ScanSubscriber<O, F, B> {
  subscriber: O,
  binary_op: Arc<F>,
  acc: Option<B>,
}

impl<Item, Err, O, F, B> Subscriber<Item, Err> for ScanSubscriber<O, F, B>
where
  O: Subscriber<B, Err>,
  F: Fn(B, Item) -> B + Send + Sync,
  B: Clone + Send,
{
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    self.subscriber.receive_subscription(subscription)
  }

  fn receive(&mut self, value: Item) -> Demand {
    let Some(acc) = self.acc.take() else {
      return Demand::NONE;
    };
    let next = (self.binary_op)(acc, value);
    self.acc = Some(next.clone());
    self.subscriber.receive(next)
  }

  fn receive_completion(&mut self, completion: Completion<Err>) {
    self.subscriber.receive_completion(completion)
  }
}

#[cfg(test)]
mod test {
  use crate::{prelude::*, test_util::Recorder};

  #[test]
  fn scan_initial() {
    let rec = Recorder::<i32, _>::new(Demand::Unlimited);
    from_iter(vec![1, 1, 1, 1, 1]).scan(100, |acc, v| acc + v).subscribe(rec.clone());
    assert_eq!(rec.values(), vec![101, 102, 103, 104, 105]);
    assert_eq!(rec.completion(), Some(Completion::Finished));
  }

  #[test]
  fn one_state_per_value_under_backpressure() {
    let rec = Recorder::<Vec<char>, _>::new(Demand::max(2));
    from_iter("abcd".chars())
      .scan(vec![], |mut acc, c| {
        acc.push(c);
        acc
      })
      .subscribe(rec.clone());
    assert_eq!(rec.values(), vec![vec!['a'], vec!['a', 'b']]);
    rec.request(Demand::max(1));
    assert_eq!(rec.values().last(), Some(&vec!['a', 'b', 'c']));
  }

  #[test]
  fn each_subscription_starts_from_the_seed() {
    let rec = Recorder::<i32, _>::new(Demand::Unlimited);
    let sums = from_iter(1..=3).scan(0, |acc, v| acc + v);
    sums.subscribe(rec.clone());
    sums.subscribe(rec.clone());
    assert_eq!(rec.values(), vec![1, 3, 6, 1, 3, 6]);
  }

  #[test]
  fn forwards_failure() {
    let rec = Recorder::<i32, &str>::new(Demand::Unlimited);
    fail::<i32, _>("x").scan(0, |acc, v| acc + v).subscribe(rec.clone());
    assert_eq!(rec.completion(), Some(Completion::Failed("x")));
    assert!(rec.values().is_empty());
  }
}
