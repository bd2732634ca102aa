//! Subscription handles
//!
//! A [`Subscription`] binds one publisher to one subscriber. The subscriber
//! uses it to ask for more values or to stop the stream; the publisher side
//! owns the demand balance behind it.
//!
//! [`Cancellable`] is the user-facing handle returned by the terminal
//! operators (`sink`, `assign`, `connect`).

use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::demand::Demand;

mod emitter;
pub(crate) use emitter::Emitter;

/// The live binding between one publisher and one subscriber.
pub trait Subscription: Send + Sync {
  /// Adds `demand` to the outstanding balance.
  fn request(&self, demand: Demand);

  /// Stops delivery. Idempotent, and safe to call from inside the
  /// subscriber's own callbacks.
  fn cancel(&self);
}

/// Shared, type-erased subscription.
pub type BoxedSubscription = Arc<dyn Subscription>;

/// A subscription with nothing behind it.
pub struct EmptySubscription;

impl EmptySubscription {
  pub fn boxed() -> BoxedSubscription { Arc::new(EmptySubscription) }
}

impl Subscription for EmptySubscription {
  fn request(&self, _demand: Demand) {}

  fn cancel(&self) {}
}

// ============================================================================
// UpstreamSlot
// ============================================================================

enum SlotState {
  Pending,
  Active(BoxedSubscription),
  Closed,
}

/// Holds an upstream subscription that may arrive after the slot was handed
/// out, and may be cancelled before it arrives.
pub(crate) struct UpstreamSlot(Mutex<SlotState>);

impl UpstreamSlot {
  pub(crate) fn new() -> Self { UpstreamSlot(Mutex::new(SlotState::Pending)) }

  /// Stores the subscription. If the slot is already closed the subscription
  /// is cancelled on the spot and `false` is returned.
  pub(crate) fn set(&self, subscription: BoxedSubscription) -> bool {
    let mut state = self.0.lock();
    if matches!(*state, SlotState::Closed) {
      drop(state);
      subscription.cancel();
      return false;
    }
    *state = SlotState::Active(subscription);
    true
  }

  pub(crate) fn request(&self, demand: Demand) {
    let active = match &*self.0.lock() {
      SlotState::Active(s) => Some(s.clone()),
      _ => None,
    };
    if let Some(s) = active {
      s.request(demand);
    }
  }

  pub(crate) fn cancel(&self) {
    let previous = std::mem::replace(&mut *self.0.lock(), SlotState::Closed);
    if let SlotState::Active(s) = previous {
      s.cancel();
    }
  }

  /// Drops the upstream without cancelling it, used once it has completed.
  pub(crate) fn release(&self) { *self.0.lock() = SlotState::Closed; }

  pub(crate) fn is_closed(&self) -> bool { matches!(*self.0.lock(), SlotState::Closed) }
}

// ============================================================================
// Cancellable
// ============================================================================

/// Handle to a running stream, returned by the terminal operators.
///
/// Cloning the handle does not duplicate the stream; every clone cancels the
/// same subscription.
#[derive(Clone)]
pub struct Cancellable(pub(crate) Arc<UpstreamSlot>);

impl Cancellable {
  pub(crate) fn new() -> Self { Cancellable(Arc::new(UpstreamSlot::new())) }

  /// Stops the stream and releases everything it holds upstream.
  pub fn cancel(&self) { self.0.cancel() }

  /// `true` once the stream was cancelled or has completed.
  pub fn is_closed(&self) -> bool { self.0.is_closed() }

  /// Wraps the handle in a guard that cancels the stream on drop.
  ///
  /// Binding the guard to `_` drops it at once and cancels the stream.
  pub fn unsubscribe_when_dropped(self) -> SubscriptionGuard { SubscriptionGuard(self) }

  /// Moves the handle into `bag`, tying the stream's lifetime to it.
  pub fn store(self, bag: &mut CancelBag) { bag.0.push(self) }
}

impl std::fmt::Debug for Cancellable {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Cancellable").field("is_closed", &self.is_closed()).finish()
  }
}

/// Cancels the wrapped stream when dropped.
#[derive(Debug)]
#[must_use]
pub struct SubscriptionGuard(Cancellable);

impl SubscriptionGuard {
  pub fn new(handle: Cancellable) -> Self { SubscriptionGuard(handle) }
}

impl Drop for SubscriptionGuard {
  #[inline]
  fn drop(&mut self) { self.0.cancel() }
}

/// A set of stream handles cancelled together when the bag is dropped.
#[derive(Default)]
pub struct CancelBag(SmallVec<[Cancellable; 4]>);

impl CancelBag {
  pub fn new() -> Self { Self::default() }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  /// Cancels every stream in the bag now and empties it.
  pub fn cancel_all(&mut self) {
    for handle in self.0.drain(..) {
      handle.cancel();
    }
  }
}

impl Drop for CancelBag {
  fn drop(&mut self) { self.cancel_all() }
}

#[cfg(test)]
mod test {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;

  #[derive(Default)]
  struct Counting {
    requested: AtomicUsize,
    cancelled: AtomicUsize,
  }

  impl Subscription for Counting {
    fn request(&self, demand: Demand) {
      self.requested.fetch_add(demand.as_max().unwrap_or(usize::MAX), Ordering::SeqCst);
    }

    fn cancel(&self) { self.cancelled.fetch_add(1, Ordering::SeqCst); }
  }

  #[test]
  fn slot_cancels_late_subscription() {
    let slot = UpstreamSlot::new();
    slot.cancel();
    let upstream = Arc::new(Counting::default());
    assert!(!slot.set(upstream.clone()));
    assert_eq!(upstream.cancelled.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn cancel_is_idempotent() {
    let handle = Cancellable::new();
    let upstream = Arc::new(Counting::default());
    handle.0.set(upstream.clone());
    handle.0.request(Demand::max(3));
    handle.cancel();
    handle.cancel();
    assert!(handle.is_closed());
    assert_eq!(upstream.requested.load(Ordering::SeqCst), 3);
    assert_eq!(upstream.cancelled.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn bag_cancels_on_drop() {
    let upstream = Arc::new(Counting::default());
    {
      let mut bag = CancelBag::new();
      for _ in 0..5 {
        let handle = Cancellable::new();
        handle.0.set(upstream.clone());
        handle.store(&mut bag);
      }
      assert_eq!(bag.len(), 5);
    }
    assert_eq!(upstream.cancelled.load(Ordering::SeqCst), 5);
  }

  #[test]
  fn guard_cancels_on_drop() {
    let upstream = Arc::new(Counting::default());
    let handle = Cancellable::new();
    handle.0.set(upstream.clone());
    {
      let _guard = handle.clone().unsubscribe_when_dropped();
    }
    assert!(handle.is_closed());
    assert_eq!(upstream.cancelled.load(Ordering::SeqCst), 1);
  }
}
