//! Subjects
//!
//! A subject is a publisher that values are pushed into by hand. It is also a
//! [`Subscriber`](crate::subscriber::Subscriber), so any upstream can drive it.
//!
//! - [`PassthroughSubject`] forwards values to whoever listens at that moment.
//! - [`CurrentValueSubject`] also remembers the latest value and replays it to
//!   new subscribers.
//!
//! Delivery respects each subscriber's own demand: a subscriber with no
//! outstanding credit simply misses the value.

use crate::{publisher::Publisher, subscriber::Completion};

mod current_value;
mod passthrough;
pub(crate) mod subject_core;
mod subscribers;

pub use current_value::CurrentValueSubject;
pub use passthrough::PassthroughSubject;

/// A publisher that can be fed imperatively.
pub trait Subject: Publisher + Clone + Send + Sync + 'static {
  /// Offers `value` to every current subscriber that has demand for it.
  fn send(&self, value: Self::Item);

  /// Ends the subject. Later calls to `send` and `send_completion` are
  /// ignored, and later subscribers receive this completion straight away.
  fn send_completion(&self, completion: Completion<Self::Err>);
}
