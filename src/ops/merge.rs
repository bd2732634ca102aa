use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::lanes::Lanes;
use crate::{
  demand::Demand,
  error::ConfigError,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, Emitter, Subscription},
};

/// Interleaves the values of two publishers as they arrive.
#[derive(Clone)]
pub struct MergeOp<A, B> {
  pub(crate) a: A,
  pub(crate) b: B,
}

impl<A, B> Publisher for MergeOp<A, B>
where
  A: Publisher,
  B: Publisher<Item = A::Item, Err = A::Err>,
  A::Item: Send + 'static,
  A::Err: Send + 'static,
{
  type Item = A::Item;
  type Err = A::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<A::Item, A::Err> + 'static,
  {
    let node = MergeNode::start(subscriber, 2);
    self.a.subscribe(MergeLane { node: node.clone(), index: 0 });
    self.b.subscribe(MergeLane { node, index: 1 });
  }
}

/// Interleaves the values of any number of publishers of one type. Built by
/// [`merge_many`].
#[derive(Clone)]
pub struct MergeMany<S> {
  sources: Vec<S>,
}

/// Merges every publisher in `sources`.
///
/// Fails with [`ConfigError::NoSources`] when `sources` is empty, since such a
/// merge could never emit nor decide when to complete.
pub fn merge_many<S>(sources: impl IntoIterator<Item = S>) -> Result<MergeMany<S>, ConfigError>
where
  S: Publisher,
{
  let sources: Vec<S> = sources.into_iter().collect();
  if sources.is_empty() {
    return Err(ConfigError::NoSources("merge_many"));
  }
  Ok(MergeMany { sources })
}

impl<S> Publisher for MergeMany<S>
where
  S: Publisher,
  S::Item: Send + 'static,
  S::Err: Send + 'static,
{
  type Item = S::Item;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<S::Item, S::Err> + 'static,
  {
    let node = MergeNode::start(subscriber, self.sources.len());
    for (index, source) in self.sources.iter().enumerate() {
      source.subscribe(MergeLane { node: node.clone(), index });
    }
  }
}

struct MergeState {
  lanes: Lanes,
  remaining: usize,
  done: bool,
}

struct MergeNode<Item, Err> {
  emitter: Emitter<Item, Err>,
  state: Mutex<MergeState>,
}

impl<Item, Err> MergeNode<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn start<O>(subscriber: O, count: usize) -> Arc<Self>
  where
    O: Subscriber<Item, Err> + 'static,
  {
    let node = Arc::new(MergeNode {
      emitter: Emitter::new(subscriber),
      state: Mutex::new(MergeState { lanes: Lanes::with_ids(0..count), remaining: count, done: false }),
    });
    let weak: Weak<Self> = Arc::downgrade(&node);
    node.emitter.set_demand_hook(Arc::new(move |_| {
      if let Some(node) = weak.upgrade() {
        node.grant();
      }
    }));
    node.emitter.start(node.clone());
    node
  }

  fn grant(&self) {
    let grants = {
      let mut state = self.state.lock();
      if state.done {
        return;
      }
      state.lanes.grant(self.emitter.outstanding())
    };
    for (upstream, demand) in grants {
      upstream.request(demand);
    }
  }
}

impl<Item, Err> Subscription for MergeNode<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn request(&self, demand: Demand) {
    self.emitter.request(demand);
    self.grant();
  }

  fn cancel(&self) {
    let upstreams = {
      let mut state = self.state.lock();
      state.done = true;
      state.lanes.take_all()
    };
    self.emitter.close();
    upstreams.iter().for_each(|s| s.cancel());
  }
}

struct MergeLane<Item, Err> {
  node: Arc<MergeNode<Item, Err>>,
  index: usize,
}

impl<Item, Err> Subscriber<Item, Err> for MergeLane<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    let accepted = {
      let mut state = self.node.state.lock();
      !state.done && state.lanes.attach(self.index, subscription.clone())
    };
    if accepted {
      self.node.grant();
    } else {
      subscription.cancel();
    }
  }

  fn receive(&mut self, value: Item) -> Demand {
    self.node.state.lock().lanes.delivered(self.index);
    self.node.emitter.push(value);
    self.node.grant();
    Demand::NONE
  }

  fn receive_completion(&mut self, completion: Completion<Err>) {
    match completion {
      Completion::Finished => {
        let all_done = {
          let mut state = self.node.state.lock();
          if state.done {
            return;
          }
          state.lanes.remove(self.index);
          state.remaining -= 1;
          state.done = state.remaining == 0;
          state.done
        };
        if all_done {
          self.node.emitter.finish(Completion::Finished);
        } else {
          self.node.grant();
        }
      }
      Completion::Failed(e) => {
        let others = {
          let mut state = self.node.state.lock();
          if state.done {
            return;
          }
          state.done = true;
          state.lanes.remove(self.index);
          state.lanes.take_all()
        };
        self.node.emitter.finish(Completion::Failed(e));
        others.iter().for_each(|s| s.cancel());
      }
    }
  }
}

#[cfg(test)]
mod test {
  use crate::{prelude::*, test_util::Recorder};

  #[test]
  fn odd_even_merge() {
    let even = PassthroughSubject::<i32, ()>::new();
    let odd = PassthroughSubject::<i32, ()>::new();
    let rec = Recorder::new(Demand::Unlimited);
    even.clone().merge(odd.clone()).subscribe(rec.clone());

    (0..10).for_each(|v| if v % 2 == 0 { even.send(v) } else { odd.send(v) });
    assert_eq!(rec.values(), (0..10).collect::<Vec<_>>());

    even.send_completion(Completion::Finished);
    assert!(rec.completion().is_none());
    odd.send_completion(Completion::Finished);
    assert_eq!(rec.completion(), Some(Completion::Finished));
  }

  #[test]
  fn sequences_keep_their_own_order() {
    let rec = Recorder::<i32, _>::new(Demand::Unlimited);
    from_iter([1, 2]).merge(from_iter([10, 20, 30])).subscribe(rec.clone());
    let values = rec.values();
    assert_eq!(values.len(), 5);
    let a: Vec<_> = values.iter().copied().filter(|v| *v < 10).collect();
    let b: Vec<_> = values.iter().copied().filter(|v| *v >= 10).collect();
    assert_eq!(a, vec![1, 2]);
    assert_eq!(b, vec![10, 20, 30]);
    assert_eq!(rec.completion(), Some(Completion::Finished));
  }

  #[test]
  fn first_failure_cancels_the_rest() {
    let a = PassthroughSubject::<i32, &str>::new();
    let b = PassthroughSubject::<i32, &str>::new();
    let rec = Recorder::new(Demand::Unlimited);
    a.clone().merge(b.clone()).subscribe(rec.clone());

    a.send(1);
    b.send(10);
    b.send_completion(Completion::Failed("b broke"));
    a.send(2);
    assert_eq!(rec.values(), vec![1, 10]);
    assert_eq!(rec.completion(), Some(Completion::Failed("b broke")));
    assert_eq!(a.subscriber_count(), 0);
  }

  #[test]
  fn bounded_demand_is_shared_across_upstreams() {
    let rec = Recorder::<i32, _>::new(Demand::max(3));
    from_iter([1, 2]).merge(from_iter([10, 20, 30])).subscribe(rec.clone());
    assert_eq!(rec.value_count(), 3);
    assert!(rec.completion().is_none());
    rec.request(Demand::max(2));
    assert_eq!(rec.value_count(), 5);
    assert_eq!(rec.completion(), Some(Completion::Finished));
  }

  #[test]
  fn merge_many_checks_configuration() {
    let none: Vec<Sequence<Vec<i32>, ()>> = vec![];
    assert_eq!(merge_many(none).err(), Some(ConfigError::NoSources("merge_many")));

    let rec = Recorder::<i32, ()>::new(Demand::Unlimited);
    let sources = (0..3).map(|i| Sequence::new(vec![i; 2]));
    merge_many(sources).unwrap().subscribe(rec.clone());
    assert_eq!(rec.value_count(), 6);
    assert_eq!(rec.completion(), Some(Completion::Finished));
  }

  #[test]
  fn cancel_reaches_every_upstream() {
    let a = PassthroughSubject::<i32, ()>::new();
    let b = PassthroughSubject::<i32, ()>::new();
    let rec = Recorder::new(Demand::Unlimited);
    a.clone().merge(b.clone()).subscribe(rec.clone());
    assert_eq!(a.subscriber_count() + b.subscriber_count(), 2);
    rec.cancel();
    assert_eq!(a.subscriber_count() + b.subscriber_count(), 0);
    a.send(1);
    assert!(rec.values().is_empty());
  }
}
