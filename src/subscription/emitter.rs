//! Per-subscriber delivery core.
//!
//! Every publisher in the crate funnels downstream traffic through an
//! [`Emitter`]. It owns the subscriber together with its demand balance, a
//! FIFO of values waiting for credit, an optional pull source and a pending
//! completion. Deliveries run in a trampoline: whichever thread finds the
//! emitter idle drives the loop, everyone else only updates state. This keeps
//! calls into one subscriber serialised and lets the subscriber call back into
//! `request` or `cancel` without recursing.

use std::{collections::VecDeque, iter::Peekable, sync::Arc};

use parking_lot::Mutex;

use crate::{
  demand::Demand,
  subscriber::{BoxedSubscriber, Completion, Subscriber},
  subscription::{BoxedSubscription, Subscription},
};

type PullSource<Item> = Peekable<Box<dyn Iterator<Item = Item> + Send>>;

struct State<Item, Err> {
  demand: Demand,
  queue: VecDeque<Item>,
  source: Option<PullSource<Item>>,
  completion: Option<Completion<Err>>,
  emitting: bool,
  cancelled: bool,
  terminated: bool,
}

enum Step<Item, Err> {
  Value(Item),
  Complete(Completion<Err>),
  Release,
}

impl<Item, Err> State<Item, Err> {
  fn next_value(&mut self) -> Option<Item> {
    if self.demand.is_none() {
      return None;
    }
    if let Some(v) = self.queue.pop_front() {
      return Some(v);
    }
    self.source.as_mut().and_then(Iterator::next)
  }

  fn drained(&mut self) -> bool {
    self.queue.is_empty() && self.source.as_mut().map_or(true, |s| s.peek().is_none())
  }

  fn next_step(&mut self) -> Option<Step<Item, Err>> {
    if self.emitting || self.terminated {
      return None;
    }
    let step = if self.cancelled {
      self.terminated = true;
      Step::Release
    } else if let Some(v) = self.next_value() {
      self.demand.consume();
      Step::Value(v)
    } else if self.completion.is_some() && self.drained() {
      self.terminated = true;
      Step::Complete(self.completion.take()?)
    } else {
      return None;
    };
    self.emitting = true;
    Some(step)
  }
}

/// Called with the demand a subscriber returned from `receive`.
pub(crate) type DemandHook = Arc<dyn Fn(Demand) + Send + Sync>;

pub(crate) struct Emitter<Item, Err> {
  state: Mutex<State<Item, Err>>,
  subscriber: Mutex<Option<BoxedSubscriber<Item, Err>>>,
  demand_hook: Mutex<Option<DemandHook>>,
}

impl<Item, Err> Emitter<Item, Err> {
  /// Wraps `subscriber`. Nothing is delivered before [`Emitter::start`].
  pub(crate) fn new<S>(subscriber: S) -> Self
  where
    S: Subscriber<Item, Err> + 'static,
  {
    Emitter {
      state: Mutex::new(State {
        demand: Demand::NONE,
        queue: VecDeque::new(),
        source: None,
        completion: None,
        emitting: true,
        cancelled: false,
        terminated: false,
      }),
      subscriber: Mutex::new(Some(Box::new(subscriber))),
      demand_hook: Mutex::new(None),
    }
  }

  /// Lets the owner of the emitter observe demand that arrives through
  /// `receive` return values rather than through its subscription.
  pub(crate) fn set_demand_hook(&self, hook: DemandHook) { *self.demand_hook.lock() = Some(hook); }

  /// An emitter that pulls its values from `values` as credit arrives and
  /// ends with `completion` once they run out.
  pub(crate) fn with_source<S, I>(subscriber: S, values: I, completion: Completion<Err>) -> Self
  where
    S: Subscriber<Item, Err> + 'static,
    I: Iterator<Item = Item> + Send + 'static,
  {
    let emitter = Self::new(subscriber);
    {
      let mut st = emitter.state.lock();
      let boxed: Box<dyn Iterator<Item = Item> + Send> = Box::new(values);
      st.source = Some(boxed.peekable());
      st.completion = Some(completion);
    }
    emitter
  }

  /// Hands the subscription to the subscriber, then opens delivery.
  pub(crate) fn start(&self, subscription: BoxedSubscription) {
    if let Some(s) = self.subscriber.lock().as_mut() {
      s.receive_subscription(subscription);
    }
    self.state.lock().emitting = false;
    self.drain();
  }

  /// Adds credit and delivers whatever it allows.
  pub(crate) fn request(&self, demand: Demand) {
    {
      let mut st = self.state.lock();
      if st.terminated || st.cancelled {
        return;
      }
      st.demand += demand;
    }
    self.drain();
  }

  /// Buffers `value` for delivery once credit allows.
  pub(crate) fn push(&self, value: Item) {
    if self.enqueue(value) {
      self.drain();
    }
  }

  /// Accepts `value` only if the subscriber has credit left for it, dropping
  /// it otherwise. Returns whether the value was taken.
  pub(crate) fn offer(&self, value: Item) -> bool {
    let taken = self.enqueue_if_demanded(value);
    if taken {
      self.drain();
    }
    taken
  }

  /// Like [`Emitter::push`] without delivering. The caller drains later,
  /// typically after releasing its own locks.
  pub(crate) fn enqueue(&self, value: Item) -> bool {
    let mut st = self.state.lock();
    if st.terminated || st.cancelled || st.completion.is_some() {
      return false;
    }
    st.queue.push_back(value);
    true
  }

  /// Like [`Emitter::offer`] without delivering.
  pub(crate) fn enqueue_if_demanded(&self, value: Item) -> bool {
    let mut st = self.state.lock();
    if st.terminated || st.cancelled || st.completion.is_some() {
      return false;
    }
    if st.demand.saturating_sub(st.queue.len()).is_none() {
      return false;
    }
    st.queue.push_back(value);
    true
  }

  /// Schedules the terminal event. A failure discards buffered values, a
  /// normal finish is delivered after them. Only the first call counts.
  pub(crate) fn finish(&self, completion: Completion<Err>) {
    {
      let mut st = self.state.lock();
      if st.terminated || st.cancelled || st.completion.is_some() {
        return;
      }
      if completion.is_failed() {
        st.queue.clear();
        st.source = None;
      }
      st.completion = Some(completion);
    }
    self.drain();
  }

  /// Stops delivery for good and releases the subscriber.
  pub(crate) fn close(&self) {
    {
      let mut st = self.state.lock();
      if st.cancelled {
        return;
      }
      st.cancelled = true;
      st.queue.clear();
      st.source = None;
    }
    self.drain();
  }

  /// Credit not yet covered by buffered values.
  pub(crate) fn outstanding(&self) -> Demand {
    let st = self.state.lock();
    if st.terminated || st.cancelled {
      return Demand::NONE;
    }
    st.demand.saturating_sub(st.queue.len())
  }

  /// `true` once the completion was delivered or the emitter was closed.
  pub(crate) fn is_terminated(&self) -> bool {
    let st = self.state.lock();
    st.terminated || st.cancelled
  }

  /// Runs the delivery loop unless another caller already does.
  pub(crate) fn drain(&self) {
    loop {
      let step = match self.state.lock().next_step() {
        Some(step) => step,
        None => return,
      };
      match step {
        Step::Value(v) => {
          let more = match self.subscriber.lock().as_mut() {
            Some(s) => s.receive(v),
            None => Demand::NONE,
          };
          if !more.is_none() {
            self.state.lock().demand += more;
            // Still marked as emitting, so values the hook causes upstream
            // are queued and picked up by this loop.
            let hook = self.demand_hook.lock().clone();
            if let Some(hook) = hook {
              hook(more);
            }
          }
          self.state.lock().emitting = false;
        }
        Step::Complete(c) => {
          let subscriber = self.subscriber.lock().take();
          if let Some(mut s) = subscriber {
            s.receive_completion(c);
          }
          return;
        }
        Step::Release => {
          let subscriber = self.subscriber.lock().take();
          drop(subscriber);
          return;
        }
      }
    }
  }
}

impl<Item, Err> Subscription for Emitter<Item, Err>
where
  Item: Send,
  Err: Send,
{
  fn request(&self, demand: Demand) { Emitter::request(self, demand) }

  fn cancel(&self) { self.close() }
}
