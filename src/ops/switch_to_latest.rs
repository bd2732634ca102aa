use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::lanes::Lanes;
use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, Emitter, Subscription},
};

/// Flattens a publisher of publishers by following only the most recent
/// inner publisher.
#[derive(Clone)]
pub struct SwitchToLatestOp<S> {
  pub(crate) source: S,
}

impl<S, P> Publisher for SwitchToLatestOp<S>
where
  S: Publisher<Item = P>,
  P: Publisher<Err = S::Err>,
  P::Item: Send + 'static,
  S::Err: Send + 'static,
{
  type Item = P::Item;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<P::Item, S::Err> + 'static,
  {
    let node = Arc::new(SwitchNode {
      emitter: Emitter::new(subscriber),
      state: Mutex::new(SwitchState {
        lanes: Lanes::new(),
        outer: None,
        outer_finished: false,
        generation: 0,
        done: false,
      }),
    });
    let weak: Weak<SwitchNode<_, _>> = Arc::downgrade(&node);
    node.emitter.set_demand_hook(Arc::new(move |_| {
      if let Some(node) = weak.upgrade() {
        node.grant();
      }
    }));
    node.emitter.start(node.clone());
    self.source.subscribe(SwitchOuter { node });
  }
}

struct SwitchState {
  // Holds at most the lane of the current inner publisher.
  lanes: Lanes,
  outer: Option<BoxedSubscription>,
  outer_finished: bool,
  generation: usize,
  done: bool,
}

struct SwitchNode<Item, Err> {
  emitter: Emitter<Item, Err>,
  state: Mutex<SwitchState>,
}

impl<Item, Err> SwitchNode<Item, Err>
where
  Item: Send + 'static,
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

  fn fail(&self, error: Err) {
    let upstreams = {
      let mut state = self.state.lock();
      if state.done {
        return;
      }
      state.done = true;
      let mut all = state.lanes.take_all();
      all.extend(state.outer.take());
      all
    };
    self.emitter.finish(Completion::Failed(error));
    upstreams.iter().for_each(|s| s.cancel());
  }
}

impl<Item, Err> Subscription for SwitchNode<Item, Err>
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
      let mut all = state.lanes.take_all();
      all.extend(state.outer.take());
      all
    };
    self.emitter.close();
    upstreams.iter().for_each(|s| s.cancel());
  }
}

struct SwitchOuter<Item, Err> {
  node: Arc<SwitchNode<Item, Err>>,
}

impl<P, Item, Err> Subscriber<P, Err> for SwitchOuter<Item, Err>
where
  P: Publisher<Item = Item, Err = Err>,
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    let accepted = {
      let mut state = self.node.state.lock();
      if state.done {
        false
      } else {
        state.outer = Some(subscription.clone());
        true
      }
    };
    if accepted {
      subscription.request(Demand::Unlimited);
    } else {
      subscription.cancel();
    }
  }

  fn receive(&mut self, inner: P) -> Demand {
    let (generation, previous) = {
      let mut state = self.node.state.lock();
      if state.done {
        return Demand::NONE;
      }
      state.generation += 1;
      let previous = state.lanes.take_all();
      let generation = state.generation;
      state.lanes.add(generation);
      (generation, previous)
    };
    previous.iter().for_each(|s| s.cancel());
    inner.subscribe(SwitchInner { node: self.node.clone(), generation });
    Demand::NONE
  }

  fn receive_completion(&mut self, completion: Completion<Err>) {
    match completion {
      Completion::Finished => {
        let all_done = {
          let mut state = self.node.state.lock();
          state.outer = None;
          state.outer_finished = true;
          if state.done || !state.lanes.is_empty() {
            return;
          }
          state.done = true;
          true
        };
        if all_done {
          self.node.emitter.finish(Completion::Finished);
        }
      }
      Completion::Failed(e) => self.node.fail(e),
    }
  }
}

struct SwitchInner<Item, Err> {
  node: Arc<SwitchNode<Item, Err>>,
  generation: usize,
}

impl<Item, Err> Subscriber<Item, Err> for SwitchInner<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    let accepted = {
      let mut state = self.node.state.lock();
      !state.done && state.lanes.attach(self.generation, subscription.clone())
    };
    if accepted {
      self.node.grant();
    } else {
      subscription.cancel();
    }
  }

  fn receive(&mut self, value: Item) -> Demand {
    {
      let mut state = self.node.state.lock();
      if state.done || !state.lanes.contains(self.generation) {
        return Demand::NONE;
      }
      state.lanes.delivered(self.generation);
    }
    self.node.emitter.push(value);
    self.node.grant();
    Demand::NONE
  }

  fn receive_completion(&mut self, completion: Completion<Err>) {
    let upstreams = {
      let mut state = self.node.state.lock();
      if state.done || !state.lanes.contains(self.generation) {
        return;
      }
      state.lanes.remove(self.generation);
      let upstreams = match &completion {
        Completion::Finished if !(state.outer_finished && state.lanes.is_empty()) => return,
        Completion::Finished => vec![],
        Completion::Failed(_) => {
          let mut all = state.lanes.take_all();
          all.extend(state.outer.take());
          all
        }
      };
      state.done = true;
      upstreams
    };
    self.node.emitter.finish(completion);
    upstreams.iter().for_each(|s| s.cancel());
  }
}

#[cfg(test)]
mod test {
  use std::{sync::Barrier, thread};

  use crate::{prelude::*, test_util::Recorder};

  type Inner = PassthroughSubject<i32, ()>;

  #[test]
  fn follows_only_the_latest_inner() {
    let outer = PassthroughSubject::<PassthroughSubject<i32, ()>, ()>::new();
    let first = PassthroughSubject::new();
    let second = PassthroughSubject::new();
    let rec = Recorder::new(Demand::Unlimited);
    outer.clone().switch_to_latest().subscribe(rec.clone());

    outer.send(first.clone());
    first.send(1);
    outer.send(second.clone());
    first.send(2);
    second.send(3);
    assert_eq!(rec.values(), vec![1, 3]);
    assert_eq!(first.subscriber_count(), 0);
  }

  #[test]
  fn completes_once_outer_and_active_inner_are_done() {
    let outer = PassthroughSubject::<PassthroughSubject<i32, ()>, ()>::new();
    let inner = PassthroughSubject::new();
    let rec = Recorder::new(Demand::Unlimited);
    outer.clone().switch_to_latest().subscribe(rec.clone());

    outer.send(inner.clone());
    outer.send_completion(Completion::Finished);
    assert!(rec.completion().is_none());
    inner.send(9);
    inner.send_completion(Completion::Finished);
    assert_eq!(rec.values(), vec![9]);
    assert_eq!(rec.completion(), Some(Completion::Finished));
  }

  #[test]
  fn inner_failure_fails_the_stream() {
    let rec = Recorder::<i32, &str>::new(Demand::Unlimited);
    Sequence::<_, &str>::new([1, 2])
      .switch_map(|v| if v == 2 { fail("bad").erase() } else { Sequence::new([v]).erase() })
      .subscribe(rec.clone());
    assert_eq!(rec.values(), vec![1]);
    assert_eq!(rec.completion(), Some(Completion::Failed("bad")));
  }

  #[test]
  fn empty_outer_finishes() {
    let rec = Recorder::<i32, ()>::new(Demand::NONE);
    empty::<Sequence<Vec<i32>, ()>, ()>().switch_to_latest().subscribe(rec.clone());
    assert_eq!(rec.completion(), Some(Completion::Finished));
  }

  #[test]
  fn finished_inner_does_not_end_a_later_generation() {
    let outer = PassthroughSubject::<Inner, ()>::new();
    let (first, second) = (Inner::new(), Inner::new());
    let rec = Recorder::new(Demand::Unlimited);
    outer.clone().switch_to_latest().subscribe(rec.clone());

    outer.send(first.clone());
    first.send_completion(Completion::Finished);
    outer.send(second.clone());
    outer.send_completion(Completion::Finished);
    assert!(rec.completion().is_none());
    second.send(4);
    second.send_completion(Completion::Finished);
    assert_eq!(rec.values(), vec![4]);
    assert_eq!(rec.completion(), Some(Completion::Finished));
  }

  #[test]
  fn racing_inner_completion_never_cuts_off_the_next_inner() {
    for _ in 0..200 {
      let outer = PassthroughSubject::<Inner, ()>::new();
      let (first, second) = (Inner::new(), Inner::new());
      let rec = Recorder::new(Demand::Unlimited);
      outer.clone().switch_to_latest().subscribe(rec.clone());
      outer.send(first.clone());

      let barrier = std::sync::Arc::new(Barrier::new(2));
      let (b, f) = (barrier.clone(), first.clone());
      let finishing = thread::spawn(move || {
        b.wait();
        f.send_completion(Completion::Finished);
      });
      barrier.wait();
      outer.send(second.clone());
      outer.send_completion(Completion::Finished);
      finishing.join().unwrap();

      assert_eq!(second.subscriber_count(), 1);
      assert!(rec.completion().is_none());
      second.send(1);
      second.send_completion(Completion::Finished);
      assert_eq!(rec.values(), vec![1]);
      assert_eq!(rec.completion(), Some(Completion::Finished));
    }
  }
}
