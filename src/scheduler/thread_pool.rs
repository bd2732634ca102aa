use std::{io, time::Duration};

use futures::executor::ThreadPool;
use once_cell::sync::Lazy;

use super::{Scheduler, Task, TaskHandle};

static GLOBAL_POOL: Lazy<ThreadPoolScheduler> =
  Lazy::new(|| ThreadPoolScheduler::new().expect("Failed to create the global thread pool"));

/// Runs work on a `futures` thread pool.
///
/// Delays are served by `futures-time` timers, so a sleeping task does not
/// hold a pool thread.
#[derive(Clone, Debug)]
pub struct ThreadPoolScheduler(ThreadPool);

impl ThreadPoolScheduler {
  /// A pool with one thread per CPU.
  pub fn new() -> io::Result<Self> { ThreadPool::new().map(ThreadPoolScheduler) }

  pub fn with_pool_size(size: usize) -> io::Result<Self> {
    ThreadPool::builder().pool_size(size).create().map(ThreadPoolScheduler)
  }

  /// Wraps an existing pool.
  pub fn from_pool(pool: ThreadPool) -> Self { ThreadPoolScheduler(pool) }

  /// The process-wide pool, created on first use.
  pub fn global() -> Self { GLOBAL_POOL.clone() }
}

impl Scheduler for ThreadPoolScheduler {
  fn schedule(&self, task: Task, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new();
    let task = handle.guard(task);
    self.0.spawn_ok(async move {
      if let Some(d) = delay {
        futures_time::task::sleep(d.into()).await;
      }
      task();
    });
    handle
  }
}

#[cfg(test)]
mod test {
  use std::sync::{mpsc, Arc, Mutex};

  use super::*;

  #[test]
  fn runs_off_the_calling_thread() {
    let scheduler = ThreadPoolScheduler::with_pool_size(2).unwrap();
    let (tx, rx) = mpsc::channel();
    scheduler.schedule(
      Box::new(move || tx.send(std::thread::current().id()).unwrap()),
      Some(Duration::from_millis(5)),
    );
    let worker = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_ne!(worker, std::thread::current().id());
  }

  #[test]
  fn cancel_before_the_delay_elapses() {
    let scheduler = ThreadPoolScheduler::global();
    let hit = Arc::new(Mutex::new(false));
    let h = hit.clone();
    let handle =
      scheduler.schedule(Box::new(move || *h.lock().unwrap() = true), Some(Duration::from_millis(50)));
    handle.cancel();
    std::thread::sleep(Duration::from_millis(150));
    assert!(!*hit.lock().unwrap());
  }
}
