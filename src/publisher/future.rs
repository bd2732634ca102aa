//! A single-value source that runs once, eagerly.

use std::{
  future::Future,
  sync::{Arc, Weak},
};

use futures::task::{Spawn, SpawnError, SpawnExt};
use parking_lot::Mutex;

use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::{Emitter, Subscription},
};

struct Outcome<Item, Err> {
  result: Option<Result<Item, Err>>,
  // Set when the promise was dropped unresolved.
  abandoned: bool,
  waiting: Vec<Arc<Emitter<Item, Err>>>,
}

type SharedOutcome<Item, Err> = Arc<Mutex<Outcome<Item, Err>>>;

/// The write end of a [`FuturePublisher`]. Resolving consumes it, so a
/// publisher resolves at most once. Dropping it unresolved finishes every
/// subscriber without a value.
pub struct Promise<Item, Err>(SharedOutcome<Item, Err>);

impl<Item, Err> Promise<Item, Err>
where
  Item: Clone,
  Err: Clone,
{
  /// Settles the publisher and hands the outcome to everyone waiting.
  pub fn resolve(self, result: Result<Item, Err>) {
    let waiting = {
      let mut outcome = self.0.lock();
      outcome.result = Some(result.clone());
      std::mem::take(&mut outcome.waiting)
    };
    for emitter in waiting {
      deliver(&emitter, result.clone());
    }
  }
}

impl<Item, Err> Drop for Promise<Item, Err> {
  fn drop(&mut self) {
    let waiting = {
      let mut outcome = self.0.lock();
      if outcome.result.is_some() {
        return;
      }
      outcome.abandoned = true;
      std::mem::take(&mut outcome.waiting)
    };
    tracing::debug!(waiting = waiting.len(), "promise dropped unresolved");
    for emitter in waiting {
      emitter.finish(Completion::Finished);
    }
  }
}

fn deliver<Item, Err>(emitter: &Emitter<Item, Err>, result: Result<Item, Err>) {
  match result {
    Ok(value) => {
      emitter.push(value);
      emitter.finish(Completion::Finished);
    }
    Err(e) => emitter.finish(Completion::Failed(e)),
  }
}

/// A computation producing exactly one value or one failure.
///
/// The work starts when the publisher is built, whether or not anyone
/// subscribes. Every subscriber receives the same outcome: right away if it
/// is already known, otherwise once it resolves. The value is held back until
/// the subscriber asks for it.
pub struct FuturePublisher<Item, Err>(SharedOutcome<Item, Err>);

impl<Item, Err> Clone for FuturePublisher<Item, Err> {
  fn clone(&self) -> Self { FuturePublisher(self.0.clone()) }
}

impl<Item, Err> FuturePublisher<Item, Err>
where
  Item: Clone,
  Err: Clone,
{
  /// Runs `work` immediately with the promise that settles this publisher.
  ///
  /// ```
  /// use rxstream::prelude::*;
  ///
  /// let answer = FuturePublisher::<u32, ()>::new(|promise| promise.resolve(Ok(42)));
  /// let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
  /// let out = seen.clone();
  /// let _handle = answer.sink(move |v| *out.lock().unwrap() = Some(v), |_| {});
  /// assert_eq!(*seen.lock().unwrap(), Some(42));
  /// ```
  pub fn new(work: impl FnOnce(Promise<Item, Err>)) -> Self {
    let outcome = Arc::new(Mutex::new(Outcome { result: None, abandoned: false, waiting: vec![] }));
    work(Promise(outcome.clone()));
    FuturePublisher(outcome)
  }

  /// A publisher already settled with `result`.
  pub fn resolved(result: Result<Item, Err>) -> Self {
    Self::new(|promise| promise.resolve(result))
  }

  /// Drives `future` on `spawner` and settles with its output.
  pub fn spawn<F, Sp>(future: F, spawner: &Sp) -> Result<Self, SpawnError>
  where
    F: Future<Output = Result<Item, Err>> + Send + 'static,
    Sp: Spawn + ?Sized,
    Item: Send + 'static,
    Err: Send + 'static,
  {
    let mut spawned = Ok(());
    let publisher =
      Self::new(|promise| spawned = spawner.spawn(async move { promise.resolve(future.await) }));
    spawned.map(|_| publisher)
  }
}

impl<Item, Err> Publisher for FuturePublisher<Item, Err>
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
    let emitter = Arc::new(Emitter::new(subscriber));
    let (settled, abandoned) = {
      let mut outcome = self.0.lock();
      if outcome.result.is_none() && !outcome.abandoned {
        outcome.waiting.push(emitter.clone());
      }
      (outcome.result.clone(), outcome.abandoned)
    };
    emitter.start(Arc::new(FutureSubscription {
      emitter: emitter.clone(),
      outcome: Arc::downgrade(&self.0),
    }));
    if let Some(result) = settled {
      deliver(&emitter, result);
    } else if abandoned {
      emitter.finish(Completion::Finished);
    }
  }
}

/// Leaves the waiting list on cancel, so an unresolved publisher does not
/// hold on to subscribers that are gone.
struct FutureSubscription<Item, Err> {
  emitter: Arc<Emitter<Item, Err>>,
  outcome: Weak<Mutex<Outcome<Item, Err>>>,
}

impl<Item: Send, Err: Send> Subscription for FutureSubscription<Item, Err> {
  fn request(&self, demand: Demand) { self.emitter.request(demand) }

  fn cancel(&self) {
    self.emitter.close();
    if let Some(outcome) = self.outcome.upgrade() {
      outcome.lock().waiting.retain(|e| !Arc::ptr_eq(e, &self.emitter));
    }
  }
}

impl<Item, Err> FuturePublisher<Item, Err> {
  #[cfg(test)]
  fn waiting_count(&self) -> usize { self.0.lock().waiting.len() }
}
