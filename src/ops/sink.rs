//! Terminal subscribers: `sink` and `assign`.

use std::sync::{Arc, Mutex, PoisonError};

use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, Cancellable, UpstreamSlot},
};

/// A subscriber asking for everything and handing it to closures.
pub struct SinkSubscriber<V, C> {
  on_value: V,
  on_completion: Option<C>,
  slot: Arc<UpstreamSlot>,
}

impl<Item, Err, V, C> Subscriber<Item, Err> for SinkSubscriber<V, C>
where
  V: FnMut(Item) + Send,
  C: FnOnce(Completion<Err>) + Send,
{
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    if self.slot.set(subscription.clone()) {
      subscription.request(Demand::Unlimited);
    }
  }

  fn receive(&mut self, value: Item) -> Demand {
    (self.on_value)(value);
    Demand::NONE
  }

  fn receive_completion(&mut self, completion: Completion<Err>) {
    self.slot.release();
    if let Some(on_completion) = self.on_completion.take() {
      on_completion(completion);
    }
  }
}

pub(crate) fn sink<P, V, C>(source: &P, on_value: V, on_completion: C) -> Cancellable
where
  P: Publisher,
  V: FnMut(P::Item) + Send + 'static,
  C: FnOnce(Completion<P::Err>) + Send + 'static,
{
  let handle = Cancellable::new();
  source.subscribe(SinkSubscriber {
    on_value,
    on_completion: Some(on_completion),
    slot: handle.0.clone(),
  });
  handle
}

pub(crate) fn assign<P, T, W>(source: &P, target: Arc<Mutex<T>>, mut write: W) -> Cancellable
where
  P: Publisher,
  T: Send + 'static,
  W: FnMut(&mut T, P::Item) + Send + 'static,
{
  sink(
    source,
    move |value| {
      let mut slot = target.lock().unwrap_or_else(PoisonError::into_inner);
      write(&mut slot, value);
    },
    |_| {},
  )
}

#[cfg(test)]
mod test {
  use std::sync::{Arc, Mutex};

  use crate::prelude::*;

  #[test]
  fn sink_sees_values_then_completion() {
    let log = Arc::new(Mutex::new(vec![]));
    let (values, done) = (log.clone(), log.clone());
    let handle = Sequence::<_, &str>::new([1, 2]).sink(
      move |v| values.lock().unwrap().push(format!("value {v}")),
      move |c| done.lock().unwrap().push(format!("{c:?}")),
    );
    assert_eq!(*log.lock().unwrap(), vec!["value 1", "value 2", "Finished"]);
    assert!(handle.is_closed());
  }

  #[test]
  fn cancel_stops_delivery() {
    let subject = PassthroughSubject::<i32, std::convert::Infallible>::new();
    let seen = Arc::new(Mutex::new(vec![]));
    let s = seen.clone();
    let handle = subject.clone().sink_value(move |v| s.lock().unwrap().push(v));
    subject.send(1);
    handle.cancel();
    subject.send(2);
    assert_eq!(*seen.lock().unwrap(), vec![1]);
    assert_eq!(subject.subscriber_count(), 0);
  }

  #[test]
  fn guard_cancels_when_dropped() {
    let subject = PassthroughSubject::<i32, std::convert::Infallible>::new();
    {
      let _guard = subject.clone().sink_value(|_| {}).unsubscribe_when_dropped();
      assert_eq!(subject.subscriber_count(), 1);
    }
    assert_eq!(subject.subscriber_count(), 0);
  }

  #[test]
  fn assign_writes_into_the_target() {
    #[derive(Default)]
    struct Model {
      title: String,
    }
    let model = Arc::new(Mutex::new(Model::default()));
    let subject = CurrentValueSubject::<&str, std::convert::Infallible>::new("first");
    let mut bag = CancelBag::new();
    subject.clone().assign(&model, |m, v| m.title = v.to_string()).store(&mut bag);
    assert_eq!(model.lock().unwrap().title, "first");
    subject.send("second");
    assert_eq!(model.lock().unwrap().title, "second");

    drop(bag);
    subject.send("third");
    assert_eq!(model.lock().unwrap().title, "second");
  }
}
