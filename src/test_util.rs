use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
  demand::Demand,
  subscriber::{Completion, Subscriber},
  subscription::BoxedSubscription,
};

struct Record<Item, Err> {
  values: Vec<Item>,
  completion: Option<Completion<Err>>,
  subscription: Option<BoxedSubscription>,
  subscriptions: usize,
  completions: usize,
}

/// Subscriber that records every event and lets the test drive demand.
pub(crate) struct Recorder<Item, Err> {
  record: Arc<Mutex<Record<Item, Err>>>,
  initial: Demand,
  per_value: Demand,
  cancel_after: Option<usize>,
}

impl<Item, Err> Clone for Recorder<Item, Err> {
  fn clone(&self) -> Self {
    Recorder {
      record: self.record.clone(),
      initial: self.initial,
      per_value: self.per_value,
      cancel_after: self.cancel_after,
    }
  }
}

impl<Item, Err> Recorder<Item, Err> {
  /// Requests `initial` as soon as the subscription arrives.
  pub(crate) fn new(initial: Demand) -> Self {
    Recorder {
      record: Arc::new(Mutex::new(Record {
        values: vec![],
        completion: None,
        subscription: None,
        subscriptions: 0,
        completions: 0,
      })),
      initial,
      per_value: Demand::NONE,
      cancel_after: None,
    }
  }

  /// Answers every value with `demand`.
  pub(crate) fn then_request(mut self, demand: Demand) -> Self {
    self.per_value = demand;
    self
  }

  /// Cancels from inside `receive` once `count` values arrived.
  pub(crate) fn cancel_after(mut self, count: usize) -> Self {
    self.cancel_after = Some(count);
    self
  }

  pub(crate) fn request(&self, demand: Demand) {
    let subscription = self.record.lock().subscription.clone();
    if let Some(s) = subscription {
      s.request(demand);
    }
  }

  pub(crate) fn cancel(&self) {
    let subscription = self.record.lock().subscription.clone();
    if let Some(s) = subscription {
      s.cancel();
    }
  }

  pub(crate) fn value_count(&self) -> usize { self.record.lock().values.len() }

  pub(crate) fn subscriptions(&self) -> usize { self.record.lock().subscriptions }

  pub(crate) fn completions(&self) -> usize { self.record.lock().completions }
}

impl<Item: Clone, Err> Recorder<Item, Err> {
  pub(crate) fn values(&self) -> Vec<Item> { self.record.lock().values.clone() }
}

impl<Item, Err: Clone> Recorder<Item, Err> {
  pub(crate) fn completion(&self) -> Option<Completion<Err>> {
    self.record.lock().completion.clone()
  }
}

impl<Item, Err> Subscriber<Item, Err> for Recorder<Item, Err>
where
  Item: Send,
  Err: Send,
{
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    {
      let mut record = self.record.lock();
      record.subscription = Some(subscription.clone());
      record.subscriptions += 1;
    }
    if !self.initial.is_none() {
      subscription.request(self.initial);
    }
  }

  fn receive(&mut self, value: Item) -> Demand {
    let cancel = {
      let mut record = self.record.lock();
      record.values.push(value);
      match self.cancel_after {
        Some(n) if record.values.len() >= n => record.subscription.clone(),
        _ => None,
      }
    };
    if let Some(s) = cancel {
      s.cancel();
      return Demand::NONE;
    }
    self.per_value
  }

  fn receive_completion(&mut self, completion: Completion<Err>) {
    let mut record = self.record.lock();
    record.completion = Some(completion);
    record.completions += 1;
    record.subscription = None;
  }
}
