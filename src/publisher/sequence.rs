//! Synchronous sources built from iterators.

use std::{convert::Infallible, iter, marker::PhantomData, sync::Arc};

use crate::{
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::Emitter,
};

/// Emits the elements of an iterable as demand allows, then finishes.
///
/// Each subscription iterates its own clone of the iterable. The completion
/// follows the last element right away, even when no more demand is left.
///
/// ```
/// use rxstream::prelude::*;
///
/// let seen = std::sync::Arc::new(std::sync::Mutex::new(vec![]));
/// let out = seen.clone();
/// let _handle = from_iter(vec![1, 2, 3]).sink_value(move |v| out.lock().unwrap().push(v));
/// assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
/// ```
pub struct Sequence<I, Err> {
  iterable: I,
  _err: PhantomData<fn() -> Err>,
}

impl<I, Err> Sequence<I, Err> {
  /// A sequence carrying the failure type `Err`, for mixing with fallible
  /// streams. It never actually fails.
  pub fn new(iterable: I) -> Self { Sequence { iterable, _err: PhantomData } }
}

impl<I: Clone, Err> Clone for Sequence<I, Err> {
  fn clone(&self) -> Self { Sequence::new(self.iterable.clone()) }
}

impl<I, Err> Publisher for Sequence<I, Err>
where
  I: IntoIterator + Clone,
  I::IntoIter: Send + 'static,
  I::Item: Send + 'static,
  Err: Send + 'static,
{
  type Item = I::Item;
  type Err = Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<I::Item, Err> + 'static,
  {
    let values = self.iterable.clone().into_iter();
    let emitter = Arc::new(Emitter::with_source(subscriber, values, Completion::Finished));
    emitter.start(emitter.clone());
  }
}

/// A sequence over `iterable` that can never fail.
pub fn from_iter<I: IntoIterator>(iterable: I) -> Sequence<I, Infallible> { Sequence::new(iterable) }

/// A single value, then finished.
pub fn just<T>(value: T) -> Sequence<iter::Once<T>, Infallible> { Sequence::new(iter::once(value)) }

/// Finishes without emitting, with any item and failure type.
pub fn empty<T, Err>() -> Sequence<iter::Empty<T>, Err> { Sequence::new(iter::empty()) }

/// Fails right after subscription.
pub struct Fail<Item, Err> {
  error: Err,
  _item: PhantomData<fn() -> Item>,
}

pub fn fail<Item, Err>(error: Err) -> Fail<Item, Err> { Fail { error, _item: PhantomData } }

impl<Item, Err: Clone> Clone for Fail<Item, Err> {
  fn clone(&self) -> Self { fail(self.error.clone()) }
}

impl<Item, Err> Publisher for Fail<Item, Err>
where
  Item: Send + 'static,
  Err: Clone + Send + 'static,
{
  type Item = Item;
  type Err = Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<Item, Err> + 'static,
  {
    let emitter = Arc::new(Emitter::new(subscriber));
    emitter.start(emitter.clone());
    emitter.finish(Completion::Failed(self.error.clone()));
  }
}

#[cfg(test)]
mod test {
  use crate::{prelude::*, test_util::Recorder};

  #[test]
  fn honours_demand() {
    let rec = Recorder::<i32, _>::new(Demand::max(2));
    from_iter(0..5).subscribe(rec.clone());
    assert_eq!(rec.values(), vec![0, 1]);
    assert!(rec.completion().is_none());
    rec.request(Demand::max(3));
    assert_eq!(rec.values(), vec![0, 1, 2, 3, 4]);
    assert_eq!(rec.completion(), Some(Completion::Finished));
  }

  #[test]
  fn empty_finishes_without_demand() {
    let rec = Recorder::<u8, ()>::new(Demand::NONE);
    empty().subscribe(rec.clone());
    assert_eq!(rec.subscriptions(), 1);
    assert_eq!(rec.completion(), Some(Completion::Finished));
  }

  #[test]
  fn fail_completes_with_the_error() {
    let rec = Recorder::<u8, &str>::new(Demand::NONE);
    fail("nope").subscribe(rec.clone());
    assert_eq!(rec.completion(), Some(Completion::Failed("nope")));
  }

  #[test]
  fn just_emits_one_value() {
    let rec = Recorder::new(Demand::max(1));
    just("hello").subscribe(rec.clone());
    assert_eq!(rec.values(), vec!["hello"]);
    assert_eq!(rec.completion(), Some(Completion::Finished));
  }

  #[test]
  fn cancel_stops_an_endless_sequence() {
    let rec = Recorder::<usize, _>::new(Demand::Unlimited).cancel_after(3);
    from_iter(0..).subscribe(rec.clone());
    assert_eq!(rec.values(), vec![0, 1, 2]);
    assert!(rec.completion().is_none());
  }
}
