//! Recovering from failures: `catch` swaps in a fallback publisher, `retry`
//! resubscribes to the source.
//!
//! Both keep one downstream emitter alive across upstream replacements. A new
//! upstream is asked for whatever demand the downstream still has open.

use std::sync::Arc;

use super::relay::{Relay, RelayUpstream};
use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::{BoxedSubscription, UpstreamSlot},
};

// ============================================================================
// catch
// ============================================================================

/// Replaces a failed stream with a fallback publisher built from the failure.
/// Values already delivered stay delivered.
pub struct CatchOp<S, F> {
  pub(crate) source: S,
  pub(crate) handler: Arc<F>,
}

impl<S: Clone, F> Clone for CatchOp<S, F> {
  fn clone(&self) -> Self { CatchOp { source: self.source.clone(), handler: self.handler.clone() } }
}

impl<S, F, P> Publisher for CatchOp<S, F>
where
  S: Publisher,
  S::Item: Send + 'static,
  F: Fn(S::Err) -> P + Send + Sync + 'static,
  P: Publisher<Item = S::Item>,
  P::Err: Send + 'static,
{
  type Item = S::Item;
  type Err = P::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<S::Item, P::Err> + 'static,
  {
    let relay = Relay::start(subscriber);
    let slot = relay.attach();
    self.source.subscribe(CatchUpstream { relay, slot, handler: self.handler.clone() })
  }
}

struct CatchUpstream<Item, Err, F> {
  relay: Arc<Relay<Item, Err>>,
  slot: Arc<UpstreamSlot>,
  handler: Arc<F>,
}

impl<Item, Err, SrcErr, F, P> Subscriber<Item, SrcErr> for CatchUpstream<Item, Err, F>
where
  Item: Send + 'static,
  Err: Send + 'static,
  F: Fn(SrcErr) -> P + Send + Sync,
  P: Publisher<Item = Item, Err = Err>,
{
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    self.relay.connected(&self.slot, subscription)
  }

  fn receive(&mut self, value: Item) -> Demand {
    self.relay.emitter.push(value);
    Demand::NONE
  }

  fn receive_completion(&mut self, completion: Completion<SrcErr>) {
    self.slot.release();
    match completion {
      Completion::Finished => self.relay.emitter.finish(Completion::Finished),
      Completion::Failed(e) => {
        if !self.relay.is_live() {
          return;
        }
        tracing::debug!("upstream failed, switching to fallback");
        let fallback = (self.handler)(e);
        let slot = self.relay.attach();
        fallback.subscribe(RelayUpstream { relay: self.relay.clone(), slot });
      }
    }
  }
}

// ============================================================================
// retry
// ============================================================================

/// Resubscribes to the source after a failure, at most `attempts` times. The
/// last failure is passed on once attempts run out.
pub struct RetryOp<S> {
  pub(crate) source: S,
  pub(crate) attempts: usize,
}

impl<S: Clone> Clone for RetryOp<S> {
  fn clone(&self) -> Self { RetryOp { source: self.source.clone(), attempts: self.attempts } }
}

impl<S> Publisher for RetryOp<S>
where
  S: Publisher + Clone + Send + 'static,
  S::Item: Send + 'static,
  S::Err: Send + 'static,
{
  type Item = S::Item;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<S::Item, S::Err> + 'static,
  {
    let relay = Relay::start(subscriber);
    let slot = relay.attach();
    self.source.subscribe(RetryUpstream {
      relay,
      slot,
      source: self.source.clone(),
      remaining: self.attempts,
    })
  }
}

struct RetryUpstream<S: Publisher> {
  relay: Arc<Relay<S::Item, S::Err>>,
  slot: Arc<UpstreamSlot>,
  source: S,
  remaining: usize,
}

impl<S> Subscriber<S::Item, S::Err> for RetryUpstream<S>
where
  S: Publisher + Clone + Send + 'static,
  S::Item: Send + 'static,
  S::Err: Send + 'static,
{
  fn receive_subscription(&mut self, subscription: BoxedSubscription) {
    self.relay.connected(&self.slot, subscription)
  }

  fn receive(&mut self, value: S::Item) -> Demand {
    self.relay.emitter.push(value);
    Demand::NONE
  }

  fn receive_completion(&mut self, completion: Completion<S::Err>) {
    self.slot.release();
    match completion {
      Completion::Failed(_) if self.remaining > 0 && self.relay.is_live() => {
        tracing::debug!(remaining = self.remaining, "upstream failed, resubscribing");
        let retry = RetryUpstream {
          relay: self.relay.clone(),
          slot: self.relay.attach(),
          source: self.source.clone(),
          remaining: self.remaining - 1,
        };
        self.source.subscribe(retry);
      }
      completion => self.relay.emitter.finish(completion),
    }
  }
}

#[cfg(test)]
mod test {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  use crate::{prelude::*, test_util::Recorder};

  #[test]
  fn catch_switches_to_fallback() {
    let subject = PassthroughSubject::<i32, &str>::new();
    let rec = Recorder::<i32, std::convert::Infallible>::new(Demand::Unlimited);
    subject.clone().catch(|_| from_iter([9, 10])).subscribe(rec.clone());
    subject.send(1);
    subject.send_completion(Completion::Failed("offline"));
    assert_eq!(rec.values(), vec![1, 9, 10]);
    assert_eq!(rec.completion(), Some(Completion::Finished));
  }

  #[test]
  fn fallback_gets_remaining_demand() {
    let rec = Recorder::<u32, std::convert::Infallible>::new(Demand::max(1));
    fail::<u32, &str>("offline").catch(|_| from_iter(10..)).subscribe(rec.clone());
    assert_eq!(rec.values(), vec![10]);
    rec.request(Demand::max(2));
    assert_eq!(rec.values(), vec![10, 11, 12]);
  }

  #[test]
  fn fallback_sees_the_failure() {
    let rec = Recorder::<String, ()>::new(Demand::Unlimited);
    fail::<String, &str>("offline")
      .catch(|e| Sequence::<_, ()>::new([format!("recovered from {e}")]))
      .subscribe(rec.clone());
    assert_eq!(rec.values(), vec!["recovered from offline".to_string()]);
  }

  fn flaky(
    failures: usize, calls: Arc<AtomicUsize>,
  ) -> impl Publisher<Item = i32, Err = &'static str> + Clone {
    Sequence::<_, &'static str>::new([1]).try_map(move |v| {
      if calls.fetch_add(1, Ordering::SeqCst) < failures {
        Err("flaky")
      } else {
        Ok(v)
      }
    })
  }

  #[test]
  fn retry_resubscribes_until_success() {
    let calls = Arc::new(AtomicUsize::new(0));
    let rec = Recorder::new(Demand::Unlimited);
    flaky(2, calls.clone()).retry(2).subscribe(rec.clone());
    assert_eq!(rec.values(), vec![1]);
    assert_eq!(rec.completion(), Some(Completion::Finished));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[test]
  fn retry_gives_up_after_attempts() {
    let calls = Arc::new(AtomicUsize::new(0));
    let rec = Recorder::<i32, &str>::new(Demand::Unlimited);
    flaky(5, calls.clone()).retry(1).subscribe(rec.clone());
    assert!(rec.values().is_empty());
    assert_eq!(rec.completion(), Some(Completion::Failed("flaky")));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn cancel_stops_retrying() {
    let subject = PassthroughSubject::<i32, &str>::new();
    let rec = Recorder::<i32, &str>::new(Demand::Unlimited);
    subject.clone().retry(3).subscribe(rec.clone());
    rec.cancel();
    assert_eq!(subject.subscriber_count(), 0);
    subject.send(1);
    assert!(rec.values().is_empty());
  }
}
