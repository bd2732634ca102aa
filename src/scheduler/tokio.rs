use std::time::Duration;

use tokio::runtime::Handle;

use super::{Scheduler, Task, TaskHandle};

/// Runs work as tasks on a tokio runtime.
#[derive(Clone, Debug)]
pub struct TokioScheduler(Handle);

impl TokioScheduler {
  pub fn new(handle: Handle) -> Self { TokioScheduler(handle) }

  /// The runtime the caller is running in.
  ///
  /// # Panics
  ///
  /// Panics when called outside a tokio runtime.
  pub fn current() -> Self { TokioScheduler(Handle::current()) }
}

impl Scheduler for TokioScheduler {
  fn schedule(&self, task: Task, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new();
    let task = handle.guard(task);
    self.0.spawn(async move {
      if let Some(d) = delay {
        tokio::time::sleep(d).await;
      }
      task();
    });
    handle
  }
}
