use std::{convert::Infallible, sync::Arc};

use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::BoxedSubscription,
};

/// Transforms every value with a function. Demand passes through unchanged.
pub struct MapOp<S, F> {
  pub(crate) source: S,
  pub(crate) func: Arc<F>,
}

impl<S: Clone, F> Clone for MapOp<S, F> {
  fn clone(&self) -> Self { MapOp { source: self.source.clone(), func: self.func.clone() } }
}

impl<S, F, B> Publisher for MapOp<S, F>
where
  S: Publisher,
  F: Fn(S::Item) -> B + Send + Sync + 'static,
{
  type Item = B;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<B, S::Err> + 'static,
  {
    self.source.subscribe(MapSubscriber { subscriber, func: self.func.clone() })
  }
}

pub struct MapSubscriber<O, F> {
  subscriber: O,
  func: Arc<F>,
}

impl<Item, Err, B, O, F> Subscriber<Item, Err> for MapSubscriber<O, F>
where
  O: Subscriber<B, Err>,
  F: Fn(Item) -> B + Send + Sync,
{
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    self.subscriber.receive_subscription(subscription)
  }

  fn receive(&mut self, value: Item) -> Demand { self.subscriber.receive((self.func)(value)) }

  fn receive_completion(&mut self, completion: Completion<Err>) {
    self.subscriber.receive_completion(completion)
  }
}

/// Like [`MapOp`], but the function may fail. A failure cancels upstream and
/// ends the stream with that error.
pub struct TryMapOp<S, F> {
  pub(crate) source: S,
  pub(crate) func: Arc<F>,
}

impl<S: Clone, F> Clone for TryMapOp<S, F> {
  fn clone(&self) -> Self { TryMapOp { source: self.source.clone(), func: self.func.clone() } }
}

impl<S, F, B> Publisher for TryMapOp<S, F>
where
  S: Publisher,
  F: Fn(S::Item) -> Result<B, S::Err> + Send + Sync + 'static,
{
  type Item = B;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<B, S::Err> + 'static,
  {
    self.source.subscribe(TryMapSubscriber::new(subscriber, self.func.clone()))
  }
}

pub struct TryMapSubscriber<O, F> {
  subscriber: O,
  func: Arc<F>,
  upstream: Option<BoxedSubscription>,
  failed: bool,
}

impl<O, F> TryMapSubscriber<O, F> {
  pub(crate) fn new(subscriber: O, func: Arc<F>) -> Self {
    TryMapSubscriber { subscriber, func, upstream: None, failed: false }
  }
}

impl<Item, Err, B, O, F> Subscriber<Item, Err> for TryMapSubscriber<O, F>
where
  O: Subscriber<B, Err>,
  F: Fn(Item) -> Result<B, Err> + Send + Sync,
{
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    self.upstream = Some(subscription.clone());
    self.subscriber.receive_subscription(subscription)
  }

  fn receive(&mut self, value: Item) -> Demand {
    if self.failed {
      return Demand::NONE;
    }
    match (self.func)(value) {
      Ok(v) => self.subscriber.receive(v),
      Err(e) => {
        self.failed = true;
        if let Some(upstream) = self.upstream.take() {
          upstream.cancel();
        }
        self.subscriber.receive_completion(Completion::Failed(e));
        Demand::NONE
      }
    }
  }

  fn receive_completion(&mut self, completion: Completion<Err>) {
    if !self.failed {
      self.upstream = None;
      self.subscriber.receive_completion(completion)
    }
  }
}

/// Converts the failure type of a stream.
pub struct MapErrOp<S, F> {
  pub(crate) source: S,
  pub(crate) func: Arc<F>,
}

impl<S: Clone, F> Clone for MapErrOp<S, F> {
  fn clone(&self) -> Self { MapErrOp { source: self.source.clone(), func: self.func.clone() } }
}

impl<S, F, E> Publisher for MapErrOp<S, F>
where
  S: Publisher,
  F: Fn(S::Err) -> E + Send + Sync + 'static,
{
  type Item = S::Item;
  type Err = E;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<S::Item, E> + 'static,
  {
    self.source.subscribe(MapErrSubscriber { subscriber, func: self.func.clone() })
  }
}

pub struct MapErrSubscriber<O, F> {
  subscriber: O,
  func: Arc<F>,
}

impl<Item, Err, E, O, F> Subscriber<Item, Err> for MapErrSubscriber<O, F>
where
  O: Subscriber<Item, E>,
  F: Fn(Err) -> E + Send + Sync,
{
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    self.subscriber.receive_subscription(subscription)
  }

  fn receive(&mut self, value: Item) -> Demand { self.subscriber.receive(value) }

  fn receive_completion(&mut self, completion: Completion<Err>) {
    self.subscriber.receive_completion(completion.map_err(|e| (self.func)(e)))
  }
}

/// Gives an infallible stream any failure type, so it can be combined with
/// fallible ones.
pub type SetFailureType<S, E> = MapErrOp<S, fn(Infallible) -> E>;

pub(crate) fn never<E>(e: Infallible) -> E { match e {} }

#[cfg(test)]
mod test {
  use crate::{prelude::*, test_util::Recorder};

  #[test]
  fn primitive_type() {
    let rec = Recorder::<i32, _>::new(Demand::Unlimited);
    from_iter(100..103).map(|v| v * 2).subscribe(rec.clone());
    assert_eq!(rec.values(), vec![200, 202, 204]);
    assert_eq!(rec.completion(), Some(Completion::Finished));
  }

  #[test]
  fn demand_passes_through() {
    let rec = Recorder::<String, _>::new(Demand::max(2));
    from_iter(0..10).map(|v| v.to_string()).subscribe(rec.clone());
    assert_eq!(rec.values(), vec!["0", "1"]);
    rec.request(Demand::max(1));
    assert_eq!(rec.value_count(), 3);
  }

  #[test]
  fn composition_matches_single_map() {
    let f = |v: i32| v + 3;
    let g = |v: i32| v * 7;
    let chained = Recorder::<i32, _>::new(Demand::Unlimited);
    let fused = Recorder::<i32, _>::new(Demand::Unlimited);
    from_iter(-5..5).map(f).map(g).subscribe(chained.clone());
    from_iter(-5..5).map(move |v| g(f(v))).subscribe(fused.clone());
    assert_eq!(chained.values(), fused.values());
  }

  #[test]
  fn try_map_failure_cancels_upstream() {
    let rec = Recorder::<i32, String>::new(Demand::Unlimited);
    Sequence::<_, String>::new(1..)
      .try_map(|v| if v < 3 { Ok(v) } else { Err(format!("{v} is too big")) })
      .subscribe(rec.clone());
    assert_eq!(rec.values(), vec![1, 2]);
    assert_eq!(rec.completion(), Some(Completion::Failed("3 is too big".to_owned())));
    assert_eq!(rec.completions(), 1);
  }

  #[test]
  fn map_err_and_set_failure_type() {
    let rec = Recorder::<i32, usize>::new(Demand::Unlimited);
    fail::<i32, _>("four").map_err(str::len).subscribe(rec.clone());
    assert_eq!(rec.completion(), Some(Completion::Failed(4)));

    let rec = Recorder::<i32, String>::new(Demand::Unlimited);
    just(1).set_failure_type::<String>().subscribe(rec.clone());
    assert_eq!(rec.values(), vec![1]);
    assert_eq!(rec.completion(), Some(Completion::Finished));
  }
}
