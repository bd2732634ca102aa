//! Demand bookkeeping for operators with several upstreams.
//!
//! Each upstream is a lane. Bounded downstream credit is handed out one unit
//! per lane at a time, round robin, so the sum claimed from all upstreams never
//! exceeds what the downstream still has outstanding. Unlimited downstream
//! credit is forwarded to every lane once.

use crate::{demand::Demand, subscription::BoxedSubscription};

struct Lane {
  id: usize,
  subscription: Option<BoxedSubscription>,
  claimed: usize,
  unlimited: bool,
}

#[derive(Default)]
pub(crate) struct Lanes {
  lanes: Vec<Lane>,
  cursor: usize,
}

impl Lanes {
  pub(crate) fn new() -> Self { Self::default() }

  pub(crate) fn with_ids(ids: impl IntoIterator<Item = usize>) -> Self {
    let mut lanes = Self::new();
    ids.into_iter().for_each(|id| lanes.add(id));
    lanes
  }

  /// Registers a lane whose subscription has not arrived yet.
  pub(crate) fn add(&mut self, id: usize) {
    self.lanes.push(Lane { id, subscription: None, claimed: 0, unlimited: false });
  }

  /// Stores the subscription of lane `id`. Returns `false` when no such lane
  /// is registered any more, in which case the caller cancels it.
  pub(crate) fn attach(&mut self, id: usize, subscription: BoxedSubscription) -> bool {
    match self.lanes.iter_mut().find(|l| l.id == id) {
      Some(lane) => {
        lane.subscription = Some(subscription);
        true
      }
      None => false,
    }
  }

  pub(crate) fn contains(&self, id: usize) -> bool { self.lanes.iter().any(|l| l.id == id) }

  /// Removes lane `id`; its claimed credit returns to the pool.
  pub(crate) fn remove(&mut self, id: usize) -> Option<BoxedSubscription> {
    let pos = self.lanes.iter().position(|l| l.id == id)?;
    self.lanes.remove(pos).subscription
  }

  /// Removes every lane, returning the subscriptions to cancel.
  pub(crate) fn take_all(&mut self) -> Vec<BoxedSubscription> {
    self.lanes.drain(..).filter_map(|l| l.subscription).collect()
  }

  /// Lane `id` delivered one value, spending one unit of its claim.
  pub(crate) fn delivered(&mut self, id: usize) {
    if let Some(lane) = self.lanes.iter_mut().find(|l| l.id == id) {
      debug_assert!(lane.unlimited || lane.claimed > 0, "lane {id} delivered past its claim");
      lane.claimed = lane.claimed.saturating_sub(1);
    }
  }

  pub(crate) fn len(&self) -> usize { self.lanes.len() }

  pub(crate) fn is_empty(&self) -> bool { self.lanes.is_empty() }

  /// Hands out credit against the downstream balance `outstanding`. The
  /// returned requests must be issued after releasing the caller's lock.
  pub(crate) fn grant(&mut self, outstanding: Demand) -> Vec<(BoxedSubscription, Demand)> {
    let mut grants = vec![];
    let limit = match outstanding {
      Demand::Unlimited => {
        for lane in self.lanes.iter_mut().filter(|l| !l.unlimited) {
          if let Some(s) = &lane.subscription {
            lane.unlimited = true;
            grants.push((s.clone(), Demand::Unlimited));
          }
        }
        return grants;
      }
      Demand::Max(n) => n,
    };

    let claimed: usize = self.lanes.iter().map(|l| l.claimed).sum();
    let mut free = limit.saturating_sub(claimed);
    let count = self.lanes.len();
    for step in 0..count {
      if free == 0 {
        break;
      }
      let lane = &mut self.lanes[(self.cursor + step) % count];
      if lane.unlimited || lane.claimed > 0 {
        continue;
      }
      if let Some(s) = &lane.subscription {
        lane.claimed = 1;
        free -= 1;
        grants.push((s.clone(), Demand::max(1)));
      }
    }
    if count > 0 {
      self.cursor = (self.cursor + 1) % count;
    }
    grants
  }
}

#[cfg(test)]
mod test {
  use std::sync::Arc;

  use super::*;
  use crate::subscription::EmptySubscription;

  fn attached(ids: &[usize]) -> Lanes {
    let mut lanes = Lanes::with_ids(ids.iter().copied());
    for id in ids {
      lanes.attach(*id, Arc::new(EmptySubscription));
    }
    lanes
  }

  #[test]
  fn bounded_credit_is_never_over_claimed() {
    let mut lanes = attached(&[0, 1, 2]);
    assert_eq!(lanes.grant(Demand::max(2)).len(), 2);
    // Everything outstanding is already claimed.
    assert!(lanes.grant(Demand::max(2)).is_empty());
  }

  #[test]
  fn delivered_credit_can_be_granted_again() {
    let mut lanes = attached(&[0, 1]);
    assert_eq!(lanes.grant(Demand::max(1)).len(), 1);
    lanes.delivered(0);
    assert_eq!(lanes.grant(Demand::max(1)).len(), 1);
  }

  #[test]
  #[cfg(debug_assertions)]
  #[should_panic(expected = "delivered past its claim")]
  fn delivery_without_claim_is_caught() {
    let mut lanes = attached(&[0, 1]);
    lanes.grant(Demand::max(1));
    lanes.delivered(1);
  }

  #[test]
  fn unlimited_is_forwarded_once() {
    let mut lanes = attached(&[0, 1]);
    let grants = lanes.grant(Demand::Unlimited);
    assert_eq!(grants.len(), 2);
    assert!(grants.iter().all(|(_, d)| d.is_unlimited()));
    assert!(lanes.grant(Demand::Unlimited).is_empty());
  }

  #[test]
  fn lanes_without_subscription_are_skipped() {
    let mut lanes = Lanes::with_ids([0, 1]);
    lanes.attach(1, Arc::new(EmptySubscription));
    assert_eq!(lanes.grant(Demand::max(5)).len(), 1);
    assert!(!lanes.attach(7, Arc::new(EmptySubscription)));
    assert_eq!(lanes.take_all().len(), 1);
    assert!(lanes.is_empty());
  }
}
