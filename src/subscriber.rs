//! Subscriber trait and completion events
//!
//! A [`Subscriber`] is the consuming end of a stream. It is handed a
//! [`Subscription`](crate::subscription::Subscription) first, then receives
//! values (answering each with additional demand), then at most one
//! [`Completion`].

use crate::{demand::Demand, subscription::BoxedSubscription};

// ============================================================================
// Completion
// ============================================================================

/// The terminal event of a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Completion<E> {
  /// The stream ended normally.
  Finished,
  /// The stream ended with an error.
  Failed(E),
}

impl<E> Completion<E> {
  #[inline]
  pub fn is_finished(&self) -> bool { matches!(self, Completion::Finished) }

  #[inline]
  pub fn is_failed(&self) -> bool { matches!(self, Completion::Failed(_)) }

  pub fn map_err<F, E2>(self, f: F) -> Completion<E2>
  where
    F: FnOnce(E) -> E2,
  {
    match self {
      Completion::Finished => Completion::Finished,
      Completion::Failed(e) => Completion::Failed(f(e)),
    }
  }

  pub fn into_result(self) -> Result<(), E> {
    match self {
      Completion::Finished => Ok(()),
      Completion::Failed(e) => Err(e),
    }
  }
}

// ============================================================================
// Subscriber Trait
// ============================================================================

/// The consumer of a stream.
///
/// Calls into one subscriber are always serialised by its publisher, which is
/// why every method takes `&mut self`. The subscriber may call back into its
/// subscription (`request` or `cancel`) from inside any of these methods.
pub trait Subscriber<Item, Err>: Send {
  /// Called exactly once, before anything else.
  ///
  /// Nothing is delivered until the subscriber requests demand through the
  /// subscription.
  fn receive_subscription(&mut self, subscription: BoxedSubscription);

  /// Receives one value and answers with the demand to add on top of what is
  /// still outstanding. Return [`Demand::NONE`] to leave the balance as is.
  fn receive(&mut self, value: Item) -> Demand;

  /// Receives the terminal event. Nothing follows it.
  fn receive_completion(&mut self, completion: Completion<Err>);
}

/// Boxed subscriber, used wherever subscribers of different concrete types
/// share one container (subjects, erased publishers).
pub type BoxedSubscriber<Item, Err> = Box<dyn Subscriber<Item, Err>>;

impl<Item, Err, S> Subscriber<Item, Err> for Box<S>
where
  S: Subscriber<Item, Err> + ?Sized,
{
  #[inline]
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    (**self).receive_subscription(subscription)
  }

  #[inline]
  fn receive(&mut self, value: Item) -> Demand { (**self).receive(value) }

  #[inline]
  fn receive_completion(&mut self, completion: Completion<Err>) {
    (**self).receive_completion(completion)
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn completion_helpers() {
    let failed: Completion<&str> = Completion::Failed("boom");
    assert!(failed.is_failed());
    assert_eq!(failed.map_err(str::len), Completion::Failed(4));
    assert_eq!(Completion::<()>::Finished.into_result(), Ok(()));
    assert_eq!(failed.into_result(), Err("boom"));
  }
}
