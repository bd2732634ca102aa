//! Bridge from a [`Publisher`] into a `futures::Stream`.
//!
//! The stream pulls: each poll that finds nothing buffered asks the upstream
//! for exactly one value, so an infinite publisher is safe to consume.
//!
//! ```rust
//! use futures::{executor::block_on, StreamExt};
//! use rxstream::prelude::*;
//!
//! let values: Vec<_> = block_on(from_iter(1..).into_stream().take(3).collect());
//! assert_eq!(values, vec![Ok(1), Ok(2), Ok(3)]);
//! ```

use std::{
  collections::VecDeque,
  pin::Pin,
  sync::Arc,
  task::{Context, Poll, Waker},
};

use futures::Stream;
use parking_lot::Mutex;

use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::BoxedSubscription,
};

struct StreamState<Item, Err> {
  queue: VecDeque<Result<Item, Err>>,
  waker: Option<Waker>,
  subscription: Option<BoxedSubscription>,
  requested: bool,
  closed: bool,
}

impl<Item, Err> StreamState<Item, Err> {
  fn take_waker(&mut self) -> Option<Waker> { self.waker.take() }
}

/// A `Stream` of `Ok` values, ending with one `Err` if the publisher fails.
/// Dropping the stream cancels the subscription.
pub struct PublisherStream<Item, Err> {
  state: Arc<Mutex<StreamState<Item, Err>>>,
}

impl<Item, Err> PublisherStream<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  pub(crate) fn new<P>(publisher: &P) -> Self
  where
    P: Publisher<Item = Item, Err = Err>,
  {
    let state = Arc::new(Mutex::new(StreamState {
      queue: VecDeque::new(),
      waker: None,
      subscription: None,
      requested: false,
      closed: false,
    }));
    publisher.subscribe(StreamSubscriber { state: state.clone() });
    PublisherStream { state }
  }
}

impl<Item, Err> Stream for PublisherStream<Item, Err> {
  type Item = Result<Item, Err>;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    loop {
      let subscription = {
        let mut state = self.state.lock();
        if let Some(item) = state.queue.pop_front() {
          return Poll::Ready(Some(item));
        }
        if state.closed {
          return Poll::Ready(None);
        }
        state.waker = Some(cx.waker().clone());
        match state.subscription.clone() {
          Some(s) if !state.requested => {
            state.requested = true;
            s
          }
          _ => return Poll::Pending,
        }
      };
      subscription.request(Demand::max(1));
    }
  }
}

impl<Item, Err> Drop for PublisherStream<Item, Err> {
  fn drop(&mut self) {
    let subscription = self.state.lock().subscription.take();
    if let Some(s) = subscription {
      s.cancel();
    }
  }
}

struct StreamSubscriber<Item, Err> {
  state: Arc<Mutex<StreamState<Item, Err>>>,
}

impl<Item: Send, Err: Send> Subscriber<Item, Err> for StreamSubscriber<Item, Err> {
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    let waker = {
      let mut state = self.state.lock();
      state.subscription = Some(subscription);
      state.take_waker()
    };
    if let Some(w) = waker {
      w.wake();
    }
  }

  fn receive(&mut self, value: Item) -> Demand {
    let waker = {
      let mut state = self.state.lock();
      state.queue.push_back(Ok(value));
      state.requested = false;
      state.take_waker()
    };
    if let Some(w) = waker {
      w.wake();
    }
    Demand::NONE
  }

  fn receive_completion(&mut self, completion: Completion<Err>) {
    let waker = {
      let mut state = self.state.lock();
      if let Completion::Failed(e) = completion {
        state.queue.push_back(Err(e));
      }
      state.closed = true;
      state.subscription = None;
      state.take_waker()
    };
    if let Some(w) = waker {
      w.wake();
    }
  }
}
