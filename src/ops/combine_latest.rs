use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::lanes::Lanes;
use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, Emitter, Subscription},
};

/// Pairs the latest value of two publishers, emitting whenever either one
/// updates once both have produced something.
#[derive(Clone)]
pub struct CombineLatestOp<A, B> {
  pub(crate) a: A,
  pub(crate) b: B,
}

impl<A, B> Publisher for CombineLatestOp<A, B>
where
  A: Publisher,
  B: Publisher<Err = A::Err>,
  A::Item: Clone + Send + 'static,
  B::Item: Clone + Send + 'static,
  A::Err: Send + 'static,
{
  type Item = (A::Item, B::Item);
  type Err = A::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<(A::Item, B::Item), A::Err> + 'static,
  {
    let node = Arc::new(CombineLatestNode {
      emitter: Emitter::new(subscriber),
      state: Mutex::new(CombineState {
        lanes: Lanes::with_ids([LEFT, RIGHT]),
        left: None,
        right: None,
        remaining: 2,
        done: false,
      }),
    });
    let weak: Weak<CombineLatestNode<_, _, _>> = Arc::downgrade(&node);
    node.emitter.set_demand_hook(Arc::new(move |_| {
      if let Some(node) = weak.upgrade() {
        node.grant();
      }
    }));
    node.emitter.start(node.clone());
    self.a.subscribe(LeftSubscriber(node.clone()));
    self.b.subscribe(RightSubscriber(node));
  }
}

const LEFT: usize = 0;
const RIGHT: usize = 1;

struct CombineState<A, B> {
  lanes: Lanes,
  left: Option<A>,
  right: Option<B>,
  remaining: usize,
  done: bool,
}

struct CombineLatestNode<A, B, Err> {
  emitter: Emitter<(A, B), Err>,
  state: Mutex<CombineState<A, B>>,
}

impl<A, B, Err> CombineLatestNode<A, B, Err>
where
  A: Clone + Send + 'static,
  B: Clone + Send + 'static,
  Err: Send + 'static,
{
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

  fn attach(&self, lane: usize, subscription: BoxedSubscription) {
    let accepted = {
      let mut state = self.state.lock();
      !state.done && state.lanes.attach(lane, subscription.clone())
    };
    if accepted {
      self.grant();
    } else {
      subscription.cancel();
    }
  }

  fn update(&self, lane: usize, store: impl FnOnce(&mut CombineState<A, B>)) -> Demand {
    let pair = {
      let mut state = self.state.lock();
      if state.done {
        return Demand::NONE;
      }
      state.lanes.delivered(lane);
      store(&mut state);
      state.left.clone().zip(state.right.clone())
    };
    if let Some(pair) = pair {
      self.emitter.push(pair);
    }
    self.grant();
    Demand::NONE
  }

  fn complete(&self, lane: usize, completion: Completion<Err>) {
    match completion {
      Completion::Finished => {
        let all_done = {
          let mut state = self.state.lock();
          if state.done {
            return;
          }
          state.lanes.remove(lane);
          state.remaining -= 1;
          state.done = state.remaining == 0;
          state.done
        };
        if all_done {
          self.emitter.finish(Completion::Finished);
        }
      }
      Completion::Failed(e) => {
        let other = {
          let mut state = self.state.lock();
          if state.done {
            return;
          }
          state.done = true;
          state.lanes.take_all()
        };
        self.emitter.finish(Completion::Failed(e));
        other.iter().for_each(|s| s.cancel());
      }
    }
  }
}

impl<A, B, Err> Subscription for CombineLatestNode<A, B, Err>
where
  A: Clone + Send + 'static,
  B: Clone + Send + 'static,
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

struct LeftSubscriber<A, B, Err>(Arc<CombineLatestNode<A, B, Err>>);

impl<A, B, Err> Subscriber<A, Err> for LeftSubscriber<A, B, Err>
where
  A: Clone + Send + 'static,
  B: Clone + Send + 'static,
  Err: Send + 'static,
{
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    self.0.attach(LEFT, subscription)
  }

  fn receive(&mut self, value: A) -> Demand { self.0.update(LEFT, |s| s.left = Some(value)) }

  fn receive_completion(&mut self, completion: Completion<Err>) {
    self.0.complete(LEFT, completion)
  }
}

struct RightSubscriber<A, B, Err>(Arc<CombineLatestNode<A, B, Err>>);

impl<A, B, Err> Subscriber<B, Err> for RightSubscriber<A, B, Err>
where
  A: Clone + Send + 'static,
  B: Clone + Send + 'static,
  Err: Send + 'static,
{
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    self.0.attach(RIGHT, subscription)
  }

  fn receive(&mut self, value: B) -> Demand { self.0.update(RIGHT, |s| s.right = Some(value)) }

  fn receive_completion(&mut self, completion: Completion<Err>) {
    self.0.complete(RIGHT, completion)
  }
}

#[cfg(test)]
mod test {
  use crate::{prelude::*, test_util::Recorder};

  #[test]
  fn emits_latest_pair_after_both_sides_produced() {
    let a = PassthroughSubject::<i32, ()>::new();
    let b = PassthroughSubject::<&str, ()>::new();
    let rec = Recorder::new(Demand::Unlimited);
    a.clone().combine_latest(b.clone()).subscribe(rec.clone());

    a.send(1);
    assert!(rec.values().is_empty());
    b.send("x");
    a.send(2);
    b.send("y");
    assert_eq!(rec.values(), vec![(1, "x"), (2, "x"), (2, "y")]);
  }

  #[test]
  fn completes_after_both_sides() {
    let a = PassthroughSubject::<i32, ()>::new();
    let b = PassthroughSubject::<i32, ()>::new();
    let rec = Recorder::new(Demand::Unlimited);
    a.clone().combine_latest(b.clone()).subscribe(rec.clone());
    a.send_completion(Completion::Finished);
    assert!(rec.completion().is_none());
    b.send_completion(Completion::Finished);
    assert_eq!(rec.completion(), Some(Completion::Finished));
  }

  #[test]
  fn failure_cancels_other_side() {
    let a = PassthroughSubject::<i32, &str>::new();
    let b = PassthroughSubject::<i32, &str>::new();
    let rec = Recorder::new(Demand::Unlimited);
    a.clone().combine_latest(b.clone()).subscribe(rec.clone());
    b.send_completion(Completion::Failed("b"));
    assert_eq!(rec.completion(), Some(Completion::Failed("b")));
    assert_eq!(a.subscriber_count(), 0);
  }

  #[test]
  fn bounded_demand_caps_emitted_pairs() {
    let a = PassthroughSubject::<i32, ()>::new();
    let b = PassthroughSubject::<char, ()>::new();
    let rec = Recorder::new(Demand::max(2));
    a.clone().combine_latest(b.clone()).subscribe(rec.clone());
    a.send(1);
    b.send('x');
    a.send(2);
    b.send('y');
    a.send(3);
    assert_eq!(rec.values(), vec![(1, 'x'), (2, 'x')]);
  }

  #[test]
  fn finished_sequence_keeps_its_last_value() {
    let rec = Recorder::<(i32, char), ()>::new(Demand::Unlimited);
    Sequence::new([1, 2, 3]).combine_latest(Sequence::new(['a', 'b'])).subscribe(rec.clone());
    assert_eq!(rec.values(), vec![(3, 'a'), (3, 'b')]);
    assert_eq!(rec.completion(), Some(Completion::Finished));
  }
}
