use std::{
  collections::VecDeque,
  marker::PhantomData,
  sync::{Arc, Weak},
};

use parking_lot::Mutex;

use super::lanes::Lanes;
use crate::{
  demand::Demand,
  error::ConfigError,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, Emitter, Subscription},
};

/// Maps every value to an inner publisher and merges all inner streams.
///
/// With a concurrency bound at most that many inner publishers are subscribed
/// at once. Outer values arriving while every slot is busy wait in a queue,
/// unmapped, and are mapped in arrival order as inner streams complete.
pub struct FlatMapOp<S, F, P> {
  pub(crate) source: S,
  pub(crate) func: Arc<F>,
  pub(crate) max: Option<usize>,
  pub(crate) _inner: PhantomData<fn() -> P>,
}

impl<S: Clone, F, P> Clone for FlatMapOp<S, F, P> {
  fn clone(&self) -> Self {
    FlatMapOp {
      source: self.source.clone(),
      func: self.func.clone(),
      max: self.max,
      _inner: PhantomData,
    }
  }
}

impl<S, F, P> FlatMapOp<S, F, P> {
  pub(crate) fn new(source: S, func: F, max: Option<usize>) -> Result<Self, ConfigError> {
    if max == Some(0) {
      return Err(ConfigError::ZeroConcurrency);
    }
    Ok(FlatMapOp { source, func: Arc::new(func), max, _inner: PhantomData })
  }
}

impl<S, F, P> Publisher for FlatMapOp<S, F, P>
where
  S: Publisher,
  S::Item: Send + 'static,
  F: Fn(S::Item) -> P + Send + Sync + 'static,
  P: Publisher<Err = S::Err> + 'static,
  P::Item: Send + 'static,
  S::Err: Send + 'static,
{
  type Item = P::Item;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<P::Item, S::Err> + 'static,
  {
    let node = Arc::new(FlatMapNode {
      emitter: Emitter::new(subscriber),
      max: self.max,
      state: Mutex::new(FlatMapState {
        lanes: Lanes::new(),
        pending: VecDeque::new(),
        outer: None,
        outer_finished: false,
        next_id: 0,
        done: false,
      }),
    });
    let weak: Weak<FlatMapNode<_, _, _>> = Arc::downgrade(&node);
    node.emitter.set_demand_hook(Arc::new(move |_| {
      if let Some(node) = weak.upgrade() {
        node.grant();
      }
    }));
    node.emitter.start(node.clone());
    self.source.subscribe(FlatMapOuter { node, func: self.func.clone(), _inner: PhantomData });
  }
}

struct FlatMapState<In> {
  lanes: Lanes,
  pending: VecDeque<In>,
  outer: Option<BoxedSubscription>,
  outer_finished: bool,
  next_id: usize,
  done: bool,
}

impl<In> FlatMapState<In> {
  fn open_lane(&mut self) -> usize {
    let id = self.next_id;
    self.next_id += 1;
    self.lanes.add(id);
    id
  }

  fn has_free_slot(&self, max: Option<usize>) -> bool {
    max.map_or(true, |max| self.lanes.len() < max)
  }

  fn is_drained(&self) -> bool {
    self.outer_finished && self.lanes.is_empty() && self.pending.is_empty()
  }
}

struct FlatMapNode<In, Item, Err> {
  emitter: Emitter<Item, Err>,
  max: Option<usize>,
  state: Mutex<FlatMapState<In>>,
}

impl<In, Item, Err> FlatMapNode<In, Item, Err>
where
  In: Send + 'static,
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

  /// Marks the node done and hands back every upstream to cancel, or `None`
  /// if it already was.
  fn shut_down(&self) -> Option<Vec<BoxedSubscription>> {
    let mut state = self.state.lock();
    if state.done {
      return None;
    }
    state.done = true;
    state.pending.clear();
    let mut all = state.lanes.take_all();
    all.extend(state.outer.take());
    Some(all)
  }

  fn fail(&self, error: Err) {
    let Some(upstreams) = self.shut_down() else { return };
    self.emitter.finish(Completion::Failed(error));
    upstreams.iter().for_each(|s| s.cancel());
  }

  /// Maps `value` and subscribes the result into lane `id`.
  fn launch<F, P>(self: &Arc<Self>, func: &Arc<F>, value: In, id: usize)
  where
    F: Fn(In) -> P + Send + Sync + 'static,
    P: Publisher<Item = Item, Err = Err> + 'static,
  {
    let inner = func(value);
    let node = self.clone();
    inner.subscribe(FlatMapInner { node, func: func.clone(), id, _inner: PhantomData });
  }
}

impl<In, Item, Err> Subscription for FlatMapNode<In, Item, Err>
where
  In: Send + 'static,
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn request(&self, demand: Demand) {
    self.emitter.request(demand);
    self.grant();
  }

  fn cancel(&self) {
    let upstreams = self.shut_down().unwrap_or_default();
    self.emitter.close();
    upstreams.iter().for_each(|s| s.cancel());
  }
}

struct FlatMapOuter<In, Item, Err, F, P> {
  node: Arc<FlatMapNode<In, Item, Err>>,
  func: Arc<F>,
  _inner: PhantomData<fn() -> P>,
}

impl<In, Item, Err, F, P> Subscriber<In, Err> for FlatMapOuter<In, Item, Err, F, P>
where
  In: Send + 'static,
  F: Fn(In) -> P + Send + Sync + 'static,
  P: Publisher<Item = Item, Err = Err> + 'static,
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

  fn receive(&mut self, value: In) -> Demand {
    let id = {
      let mut state = self.node.state.lock();
      if state.done {
        return Demand::NONE;
      }
      if !state.has_free_slot(self.node.max) {
        state.pending.push_back(value);
        return Demand::NONE;
      }
      state.open_lane()
    };
    self.node.launch(&self.func, value, id);
    Demand::NONE
  }

  fn receive_completion(&mut self, completion: Completion<Err>) {
    match completion {
      Completion::Finished => {
        {
          let mut state = self.node.state.lock();
          state.outer = None;
          state.outer_finished = true;
          if state.done || !state.is_drained() {
            return;
          }
          state.done = true;
        }
        self.node.emitter.finish(Completion::Finished);
      }
      Completion::Failed(e) => self.node.fail(e),
    }
  }
}

struct FlatMapInner<In, Item, Err, F, P> {
  node: Arc<FlatMapNode<In, Item, Err>>,
  func: Arc<F>,
  id: usize,
  _inner: PhantomData<fn() -> P>,
}

impl<In, Item, Err, F, P> Subscriber<Item, Err> for FlatMapInner<In, Item, Err, F, P>
where
  In: Send + 'static,
  F: Fn(In) -> P + Send + Sync + 'static,
  P: Publisher<Item = Item, Err = Err> + 'static,
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    let accepted = {
      let mut state = self.node.state.lock();
      !state.done && state.lanes.attach(self.id, subscription.clone())
    };
    if accepted {
      self.node.grant();
    } else {
      subscription.cancel();
    }
  }

  fn receive(&mut self, value: Item) -> Demand {
    self.node.state.lock().lanes.delivered(self.id);
    self.node.emitter.push(value);
    self.node.grant();
    Demand::NONE
  }

  fn receive_completion(&mut self, completion: Completion<Err>) {
    match completion {
      Completion::Finished => {
        let next = {
          let mut state = self.node.state.lock();
          if state.done {
            return;
          }
          state.lanes.remove(self.id);
          if state.is_drained() {
            state.done = true;
            None
          } else {
            match state.pending.pop_front() {
              Some(value) => Some(Some((value, state.open_lane()))),
              None => Some(None),
            }
          }
        };
        match next {
          None => self.node.emitter.finish(Completion::Finished),
          Some(Some((value, id))) => self.node.launch(&self.func, value, id),
          Some(None) => self.node.grant(),
        }
      }
      Completion::Failed(e) => self.node.fail(e),
    }
  }
}
