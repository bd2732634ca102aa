//! Scheduler abstraction.
//!
//! A [`Scheduler`] decides where and when a unit of work runs. Operators that
//! cross an execution context (`subscribe_on`, `receive_on`, `delay`, `timer`)
//! take one as an explicit argument; there is no global default.
//!
//! | Scheduler | Runs tasks on |
//! |---|---|
//! | [`ImmediateScheduler`] | the calling thread, trampolined |
//! | [`ThreadPoolScheduler`] | a `futures` thread pool (feature `futures-scheduler`) |
//! | [`TokioScheduler`] | a tokio runtime (feature `tokio-scheduler`) |
//! | [`TestScheduler`] | virtual time, driven by the test |

use std::{
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
  time::Duration,
};

mod immediate;
mod test_scheduler;
#[cfg(feature = "futures-scheduler")]
mod thread_pool;
#[cfg(feature = "tokio-scheduler")]
mod tokio;

pub use immediate::ImmediateScheduler;
pub use test_scheduler::TestScheduler;
#[cfg(feature = "futures-scheduler")]
pub use thread_pool::ThreadPoolScheduler;
#[cfg(feature = "tokio-scheduler")]
pub use self::tokio::TokioScheduler;

/// A one-shot unit of work.
pub type Task = Box<dyn FnOnce() + Send>;

/// A unit of work run once per interval, receiving the tick count from zero.
pub type RepeatingTask = Box<dyn FnMut(usize) + Send>;

/// Handle to a scheduled task. Cancelling it prevents every run that has not
/// started yet.
#[derive(Clone, Debug, Default)]
pub struct TaskHandle(Arc<AtomicBool>);

impl TaskHandle {
  pub fn new() -> Self { Self::default() }

  pub fn cancel(&self) { self.0.store(true, Ordering::Release) }

  pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::Acquire) }

  /// Wraps `task` so it becomes a no-op once this handle is cancelled.
  pub(crate) fn guard(&self, task: Task) -> Task {
    let handle = self.clone();
    Box::new(move || {
      if !handle.is_cancelled() {
        task()
      }
    })
  }
}

/// Runs units of work, optionally after a delay, on some execution context.
///
/// Tasks scheduled with the same delay from one thread run in the order they
/// were scheduled.
pub trait Scheduler: Clone + Send + Sync + 'static {
  /// Runs `task` once, after `delay` if one is given.
  fn schedule(&self, task: Task, delay: Option<Duration>) -> TaskHandle;

  /// Runs `task` every `interval` until the returned handle is cancelled.
  ///
  /// The default implementation reschedules after each run, so one tick never
  /// overlaps the next.
  fn schedule_repeating(&self, task: RepeatingTask, interval: Duration) -> TaskHandle {
    let handle = TaskHandle::new();
    repeat(self.clone(), handle.clone(), task, interval, 0);
    handle
  }
}

fn repeat<S: Scheduler>(
  scheduler: S, handle: TaskHandle, mut task: RepeatingTask, interval: Duration, tick: usize,
) {
  let next = scheduler.clone();
  scheduler.schedule(
    Box::new(move || {
      if handle.is_cancelled() {
        return;
      }
      task(tick);
      if !handle.is_cancelled() {
        repeat(next, handle, task, interval, tick + 1);
      }
    }),
    Some(interval),
  );
}
