use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::subscribers::{broadcast_completion, Subscribers};
use crate::{
  demand::Demand,
  subscriber::{Completion, Subscriber},
  subscription::{EmptySubscription, Emitter, Subscription},
};

/// Observes the downstream side of a subject. Used by `share` to fold demand
/// upstream and to disconnect once nobody listens.
pub(crate) trait SubjectHooks: Send + Sync {
  fn demand_changed(&self);

  fn detached(&self);
}

/// What a subject hands to each new subscriber before live values.
pub(crate) trait Replay<Item>: Send + 'static {
  fn replay(&self) -> Option<Item>;

  fn record(&mut self, value: &Item);
}

/// Nothing is replayed.
pub(crate) struct NoReplay;

impl<Item> Replay<Item> for NoReplay {
  fn replay(&self) -> Option<Item> { None }

  fn record(&mut self, _value: &Item) {}
}

/// The latest value is replayed. Always holds one.
pub(crate) struct Latest<Item>(pub(crate) Item);

impl<Item: Clone + Send + 'static> Replay<Item> for Latest<Item> {
  fn replay(&self) -> Option<Item> { Some(self.0.clone()) }

  fn record(&mut self, value: &Item) { self.0 = value.clone() }
}

struct CoreState<Item, Err, R> {
  subscribers: Subscribers<Item, Err>,
  terminal: Option<Completion<Err>>,
  replay: R,
  upstreams: Vec<crate::subscription::BoxedSubscription>,
}

/// State shared by every handle of one subject.
///
/// Values are offered to each subscriber against its own demand; a subscriber
/// without credit misses the value. A completion detaches everyone and is
/// replayed to anyone subscribing later.
pub(crate) struct SubjectCore<Item, Err, R = NoReplay> {
  state: Mutex<CoreState<Item, Err, R>>,
  hooks: Option<Weak<dyn SubjectHooks>>,
}

impl<Item, Err> SubjectCore<Item, Err> {
  pub(crate) fn with_hooks(hooks: Weak<dyn SubjectHooks>) -> Self {
    SubjectCore { hooks: Some(hooks), ..Self::new(NoReplay) }
  }
}

impl<Item: Clone, Err> SubjectCore<Item, Err, Latest<Item>> {
  pub(crate) fn current(&self) -> Item { self.state.lock().replay.0.clone() }
}

impl<Item, Err, R> SubjectCore<Item, Err, R> {
  pub(crate) fn new(replay: R) -> Self {
    SubjectCore {
      state: Mutex::new(CoreState {
        subscribers: Subscribers::default(),
        terminal: None,
        replay,
        upstreams: vec![],
      }),
      hooks: None,
    }
  }

  pub(crate) fn subscriber_count(&self) -> usize { self.state.lock().subscribers.len() }

  pub(crate) fn max_outstanding(&self) -> Demand { self.state.lock().subscribers.max_outstanding() }

  pub(crate) fn is_terminated(&self) -> bool { self.state.lock().terminal.is_some() }

  fn hooks(&self) -> Option<Arc<dyn SubjectHooks>> { self.hooks.as_ref().and_then(Weak::upgrade) }

  fn detach(&self, id: usize) {
    let removed = self.state.lock().subscribers.remove(id);
    if removed.is_some() {
      if let Some(hooks) = self.hooks() {
        hooks.detached();
      }
    }
  }
}

impl<Item, Err, R> SubjectCore<Item, Err, R>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
  R: Replay<Item>,
{
  pub(crate) fn subscribe<S>(self: &Arc<Self>, subscriber: S)
  where
    S: Subscriber<Item, Err> + 'static,
  {
    let emitter = Arc::new(Emitter::new(subscriber));
    if let Some(hooks) = self.hooks.clone() {
      emitter.set_demand_hook(Arc::new(move |_| {
        if let Some(hooks) = hooks.upgrade() {
          hooks.demand_changed();
        }
      }));
    }
    let registered = {
      let mut state = self.state.lock();
      match &state.terminal {
        Some(completion) => Err(completion.clone()),
        None => {
          if let Some(v) = state.replay.replay() {
            emitter.enqueue(v);
          }
          Ok(state.subscribers.add(emitter.clone()))
        }
      }
    };
    match registered {
      Ok(id) => {
        let subscription = SubjectSubscription {
          core: Arc::downgrade(self),
          emitter: Arc::downgrade(&emitter),
          id,
        };
        emitter.start(Arc::new(subscription));
      }
      Err(completion) => {
        emitter.start(EmptySubscription::boxed());
        emitter.finish(completion);
      }
    }
  }

  pub(crate) fn send(&self, value: Item) {
    let taken = {
      let mut state = self.state.lock();
      if state.terminal.is_some() {
        return;
      }
      state.replay.record(&value);
      state.subscribers.offer_all(value)
    };
    taken.iter().for_each(|e| e.drain());
  }

  pub(crate) fn send_completion(&self, completion: Completion<Err>) {
    let emitters = {
      let mut state = self.state.lock();
      if state.terminal.is_some() {
        return;
      }
      state.terminal = Some(completion.clone());
      state.upstreams.clear();
      state.subscribers.take_all()
    };
    tracing::trace!(subscribers = emitters.len(), failed = completion.is_failed(), "subject terminated");
    broadcast_completion(emitters, completion);
  }

  /// Keeps a publisher that drives this subject, asking it for everything.
  pub(crate) fn attach_upstream(&self, subscription: crate::subscription::BoxedSubscription) {
    let accepted = {
      let mut state = self.state.lock();
      if state.terminal.is_none() {
        state.upstreams.push(subscription.clone());
        true
      } else {
        false
      }
    };
    if accepted {
      subscription.request(Demand::Unlimited);
    } else {
      subscription.cancel();
    }
  }
}

struct SubjectSubscription<Item, Err, R> {
  core: Weak<SubjectCore<Item, Err, R>>,
  emitter: Weak<Emitter<Item, Err>>,
  id: usize,
}

impl<Item, Err, R> Subscription for SubjectSubscription<Item, Err, R>
where
  Item: Send,
  Err: Send,
  R: Send,
{
  fn request(&self, demand: Demand) {
    if let Some(emitter) = self.emitter.upgrade() {
      emitter.request(demand);
    }
    if let Some(hooks) = self.core.upgrade().and_then(|core| core.hooks()) {
      hooks.demand_changed();
    }
  }

  fn cancel(&self) {
    if let Some(emitter) = self.emitter.upgrade() {
      emitter.close();
    }
    if let Some(core) = self.core.upgrade() {
      core.detach(self.id);
    }
  }
}
