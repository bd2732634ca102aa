//! Side effects on protocol events, and the `print` debugging aid.

use std::{fmt::Debug, sync::Arc};

use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, Subscription},
};

type Hook<T> = Option<Arc<dyn Fn(T) + Send + Sync>>;

/// Callbacks for the events flowing through a `handle_events` stage. Every
/// callback is optional.
pub struct EventHooks<Item, Err> {
  subscription: Hook<()>,
  value: Option<Arc<dyn Fn(&Item) + Send + Sync>>,
  completion: Option<Arc<dyn Fn(&Completion<Err>) + Send + Sync>>,
  cancel: Hook<()>,
  request: Hook<Demand>,
}

impl<Item, Err> Clone for EventHooks<Item, Err> {
  fn clone(&self) -> Self {
    EventHooks {
      subscription: self.subscription.clone(),
      value: self.value.clone(),
      completion: self.completion.clone(),
      cancel: self.cancel.clone(),
      request: self.request.clone(),
    }
  }
}

impl<Item, Err> Default for EventHooks<Item, Err> {
  fn default() -> Self {
    EventHooks { subscription: None, value: None, completion: None, cancel: None, request: None }
  }
}

impl<Item, Err> EventHooks<Item, Err> {
  pub fn new() -> Self { Self::default() }

  pub fn on_subscription(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
    self.subscription = Some(Arc::new(move |()| f()));
    self
  }

  pub fn on_value(mut self, f: impl Fn(&Item) + Send + Sync + 'static) -> Self {
    self.value = Some(Arc::new(f));
    self
  }

  pub fn on_completion(mut self, f: impl Fn(&Completion<Err>) + Send + Sync + 'static) -> Self {
    self.completion = Some(Arc::new(f));
    self
  }

  pub fn on_cancel(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
    self.cancel = Some(Arc::new(move |()| f()));
    self
  }

  /// Called for every demand sent upstream, including demand returned from
  /// `receive`.
  pub fn on_request(mut self, f: impl Fn(Demand) + Send + Sync + 'static) -> Self {
    self.request = Some(Arc::new(f));
    self
  }
}

impl<Item, Err> EventHooks<Item, Err>
where
  Item: Debug + 'static,
  Err: Debug + 'static,
{
  /// Hooks logging every event at info level under the `rxstream::print`
  /// target.
  pub fn print(prefix: impl Into<String>) -> Self {
    let prefix: Arc<str> = prefix.into().into();
    let (p1, p2, p3, p4, p5) =
      (prefix.clone(), prefix.clone(), prefix.clone(), prefix.clone(), prefix);
    EventHooks::new()
      .on_subscription(move || log_event(&p1, format_args!("receive subscription")))
      .on_request(move |d| log_event(&p2, format_args!("request {d:?}")))
      .on_value(move |v| log_event(&p3, format_args!("receive value: {v:?}")))
      .on_completion(move |c| match c {
        Completion::Finished => log_event(&p4, format_args!("receive finished")),
        Completion::Failed(e) => log_event(&p4, format_args!("receive error: {e:?}")),
      })
      .on_cancel(move || log_event(&p5, format_args!("receive cancel")))
  }
}

fn log_event(prefix: &str, event: std::fmt::Arguments<'_>) {
  tracing::info!(target: "rxstream::print", "{prefix}: {event}");
}

/// Runs [`EventHooks`] as events pass, without altering them.
pub struct HandleEventsOp<S: Publisher> {
  pub(crate) source: S,
  pub(crate) hooks: EventHooks<S::Item, S::Err>,
}

impl<S: Publisher + Clone> Clone for HandleEventsOp<S> {
  fn clone(&self) -> Self {
    HandleEventsOp { source: self.source.clone(), hooks: self.hooks.clone() }
  }
}

impl<S> Publisher for HandleEventsOp<S>
where
  S: Publisher,
  S::Item: 'static,
  S::Err: 'static,
{
  type Item = S::Item;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<S::Item, S::Err> + 'static,
  {
    self.source.subscribe(HandleEventsSubscriber { subscriber, hooks: self.hooks.clone() })
  }
}

struct HandleEventsSubscriber<O, Item, Err> {
  subscriber: O,
  hooks: EventHooks<Item, Err>,
}

impl<O, Item, Err> Subscriber<Item, Err> for HandleEventsSubscriber<O, Item, Err>
where
  O: Subscriber<Item, Err>,
{
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    if let Some(f) = &self.hooks.subscription {
      f(());
    }
    let hooked = HookedSubscription {
      inner: subscription,
      cancel: self.hooks.cancel.clone(),
      request: self.hooks.request.clone(),
    };
    self.subscriber.receive_subscription(Arc::new(hooked))
  }

  fn receive(&mut self, value: Item) -> Demand {
    if let Some(f) = &self.hooks.value {
      f(&value);
    }
    let more = self.subscriber.receive(value);
    if let (Some(f), false) = (&self.hooks.request, more.is_none()) {
      f(more);
    }
    more
  }

  fn receive_completion(&mut self, completion: Completion<Err>) {
    if let Some(f) = &self.hooks.completion {
      f(&completion);
    }
    self.subscriber.receive_completion(completion)
  }
}

struct HookedSubscription {
  inner: BoxedSubscription,
  cancel: Hook<()>,
  request: Hook<Demand>,
}

impl Subscription for HookedSubscription {
  fn request(&self, demand: Demand) {
    if let Some(f) = &self.request {
      f(demand);
    }
    self.inner.request(demand)
  }

  fn cancel(&self) {
    if let Some(f) = &self.cancel {
      f(());
    }
    self.inner.cancel()
  }
}
