//! Backpressure credit.
//!
//! A [`Demand`] is the number of further values a subscriber is willing to
//! accept. It is requested incrementally: every `request` call adds to the
//! running balance and every delivered value takes one unit off it. Once a
//! balance is [`Demand::Unlimited`] it stays unlimited.

use std::ops::{Add, AddAssign};

/// The amount of values a subscriber asks for.
///
/// Variants are declared so that the derived ordering puts every bounded
/// demand below `Unlimited`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Demand {
  /// At most this many further values.
  Max(usize),
  /// No limit, the publisher may deliver freely.
  Unlimited,
}

impl Demand {
  /// "Deliver nothing yet".
  pub const NONE: Demand = Demand::Max(0);

  #[inline]
  pub fn max(count: usize) -> Self { Demand::Max(count) }

  #[inline]
  pub fn is_none(&self) -> bool { matches!(self, Demand::Max(0)) }

  #[inline]
  pub fn is_unlimited(&self) -> bool { matches!(self, Demand::Unlimited) }

  /// The bounded count, `None` for unlimited demand.
  #[inline]
  pub fn as_max(&self) -> Option<usize> {
    match self {
      Demand::Max(n) => Some(*n),
      Demand::Unlimited => None,
    }
  }

  /// The credit left once `used` values are already spoken for.
  #[inline]
  pub fn saturating_sub(self, used: usize) -> Demand {
    match self {
      Demand::Unlimited => Demand::Unlimited,
      Demand::Max(n) => Demand::Max(n.saturating_sub(used)),
    }
  }

  /// The amount `self` exceeds `other` by, `NONE` when it does not.
  pub fn excess_over(self, other: Demand) -> Demand {
    match (self, other) {
      (_, Demand::Unlimited) => Demand::NONE,
      (Demand::Unlimited, Demand::Max(_)) => Demand::Unlimited,
      (Demand::Max(a), Demand::Max(b)) => Demand::Max(a.saturating_sub(b)),
    }
  }

  /// Takes one unit of credit for a delivered value.
  ///
  /// Delivering without credit is a broken backpressure contract.
  #[inline]
  pub(crate) fn consume(&mut self) {
    if let Demand::Max(n) = self {
      debug_assert!(*n > 0, "value delivered past the requested demand");
      *n = n.saturating_sub(1);
    }
  }
}

impl Default for Demand {
  fn default() -> Self { Demand::NONE }
}

impl Add for Demand {
  type Output = Demand;

  fn add(self, rhs: Demand) -> Demand {
    match (self, rhs) {
      (Demand::Max(a), Demand::Max(b)) => Demand::Max(a.saturating_add(b)),
      _ => Demand::Unlimited,
    }
  }
}

impl AddAssign for Demand {
  #[inline]
  fn add_assign(&mut self, rhs: Demand) { *self = *self + rhs; }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn addition_saturates() {
    assert_eq!(Demand::max(usize::MAX) + Demand::max(1), Demand::max(usize::MAX));
    assert_eq!(Demand::max(2) + Demand::max(3), Demand::max(5));
    assert_eq!(Demand::Unlimited + Demand::max(3), Demand::Unlimited);
    assert_eq!(Demand::max(3) + Demand::Unlimited, Demand::Unlimited);
  }

  #[test]
  fn unlimited_is_greatest() {
    assert!(Demand::Unlimited > Demand::max(usize::MAX));
    assert!(Demand::max(2) > Demand::NONE);
    assert_eq!(std::cmp::max(Demand::max(4), Demand::Unlimited), Demand::Unlimited);
  }

  #[test]
  fn consume_counts_down_and_absorbs_unlimited() {
    let mut d = Demand::max(2);
    d.consume();
    assert_eq!(d, Demand::max(1));
    d.consume();
    assert!(d.is_none());

    let mut u = Demand::Unlimited;
    u.consume();
    assert!(u.is_unlimited());
  }

  #[test]
  #[cfg(debug_assertions)]
  #[should_panic(expected = "past the requested demand")]
  fn consume_without_credit_panics_in_debug() {
    let mut d = Demand::NONE;
    d.consume();
  }

  #[test]
  fn excess() {
    assert_eq!(Demand::max(5).excess_over(Demand::max(2)), Demand::max(3));
    assert_eq!(Demand::max(1).excess_over(Demand::max(2)), Demand::NONE);
    assert_eq!(Demand::Unlimited.excess_over(Demand::max(2)), Demand::Unlimited);
    assert_eq!(Demand::Unlimited.excess_over(Demand::Unlimited), Demand::NONE);
  }
}
