//! Virtual-time scheduler for deterministic tests.
//!
//! Time only moves when the test calls [`TestScheduler::advance_by`] or
//! [`TestScheduler::flush`]; due tasks then run synchronously on the calling
//! thread, earliest first and FIFO among tasks due at the same instant.
//!
//! ```rust
//! use std::time::Duration;
//! use rxstream::prelude::*;
//!
//! let scheduler = TestScheduler::new();
//! let hits = std::sync::Arc::new(std::sync::Mutex::new(vec![]));
//! let h = hits.clone();
//! let _c = just(42)
//!   .delay(Duration::from_millis(100), scheduler.clone())
//!   .sink_value(move |v| h.lock().unwrap().push(v));
//!
//! scheduler.advance_by(Duration::from_millis(99));
//! assert!(hits.lock().unwrap().is_empty());
//! scheduler.advance_by(Duration::from_millis(1));
//! assert_eq!(*hits.lock().unwrap(), vec![42]);
//! ```

use std::{cmp::Ordering, collections::BinaryHeap, sync::Arc, time::Duration};

use parking_lot::Mutex;

use super::{Scheduler, Task, TaskHandle};

struct ScheduledTask {
  due: Duration,
  id: usize,
  task: Task,
}

impl PartialEq for ScheduledTask {
  fn eq(&self, other: &Self) -> bool { self.due == other.due && self.id == other.id }
}

impl Eq for ScheduledTask {}

impl PartialOrd for ScheduledTask {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for ScheduledTask {
  fn cmp(&self, other: &Self) -> Ordering {
    // Min-heap: earlier times first, then FIFO by id
    other.due.cmp(&self.due).then_with(|| other.id.cmp(&self.id))
  }
}

#[derive(Default)]
struct State {
  now: Duration,
  queue: BinaryHeap<ScheduledTask>,
  next_id: usize,
}

/// A virtual time scheduler. Clones share one clock and one task queue.
#[derive(Clone, Default)]
pub struct TestScheduler(Arc<Mutex<State>>);

impl TestScheduler {
  pub fn new() -> Self { Self::default() }

  /// Current virtual time, starting at zero.
  pub fn now(&self) -> Duration { self.0.lock().now }

  /// Number of tasks waiting to run, cancelled ones included.
  pub fn pending_count(&self) -> usize { self.0.lock().queue.len() }

  pub fn is_empty(&self) -> bool { self.0.lock().queue.is_empty() }

  /// Moves time forward by `duration`, running every task that falls due on
  /// the way.
  pub fn advance_by(&self, duration: Duration) {
    let target = self.now() + duration;
    self.run_until(Some(target));
    let mut state = self.0.lock();
    if state.now < target {
      state.now = target;
    }
  }

  /// Runs tasks until the queue is empty, moving time to each one's due
  /// instant. Never returns while a repeating task is still active.
  pub fn flush(&self) { self.run_until(None) }

  fn run_until(&self, limit: Option<Duration>) {
    loop {
      let task = {
        let mut state = self.0.lock();
        let due = match state.queue.peek() {
          Some(next) if limit.map_or(true, |l| next.due <= l) => next.due,
          _ => return,
        };
        state.now = due;
        state.queue.pop()
      };
      if let Some(scheduled) = task {
        (scheduled.task)();
      }
    }
  }
}

impl Scheduler for TestScheduler {
  fn schedule(&self, task: Task, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new();
    let task = handle.guard(task);
    let mut state = self.0.lock();
    let due = state.now + delay.unwrap_or(Duration::ZERO);
    let id = state.next_id;
    state.next_id += 1;
    state.queue.push(ScheduledTask { due, id, task });
    handle
  }
}

#[cfg(test)]
mod test {
  use std::sync::Mutex;

  use super::*;

  #[test]
  fn runs_in_time_then_fifo_order() {
    let scheduler = TestScheduler::new();
    let log = Arc::new(Mutex::new(vec![]));
    for (label, ms) in [("late", 20), ("a", 10), ("b", 10)] {
      let l = log.clone();
      scheduler
        .schedule(Box::new(move || l.lock().unwrap().push(label)), Some(Duration::from_millis(ms)));
    }
    scheduler.advance_by(Duration::from_millis(10));
    assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    assert_eq!(scheduler.now(), Duration::from_millis(10));
    scheduler.flush();
    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "late"]);
    assert_eq!(scheduler.now(), Duration::from_millis(20));
  }

  #[test]
  fn cancelled_task_does_not_run() {
    let scheduler = TestScheduler::new();
    let hit = Arc::new(Mutex::new(false));
    let h = hit.clone();
    let handle = scheduler.schedule(Box::new(move || *h.lock().unwrap() = true), None);
    handle.cancel();
    scheduler.flush();
    assert!(!*hit.lock().unwrap());
  }

  #[test]
  fn repeating_ticks_until_cancelled() {
    let scheduler = TestScheduler::new();
    let ticks = Arc::new(Mutex::new(vec![]));
    let t = ticks.clone();
    let handle = scheduler.schedule_repeating(
      Box::new(move |tick| t.lock().unwrap().push(tick)),
      Duration::from_millis(5),
    );
    scheduler.advance_by(Duration::from_millis(16));
    assert_eq!(*ticks.lock().unwrap(), vec![0, 1, 2]);

    handle.cancel();
    scheduler.advance_by(Duration::from_millis(50));
    assert_eq!(*ticks.lock().unwrap(), vec![0, 1, 2]);
  }

  #[test]
  fn task_scheduled_from_a_task_runs_in_the_same_advance() {
    let scheduler = TestScheduler::new();
    let log = Arc::new(Mutex::new(vec![]));
    let (s, l) = (scheduler.clone(), log.clone());
    scheduler.schedule(
      Box::new(move || {
        let inner = l.clone();
        s.schedule(Box::new(move || inner.lock().unwrap().push(2)), None);
        l.lock().unwrap().push(1);
      }),
      None,
    );
    scheduler.advance_by(Duration::ZERO);
    assert_eq!(*log.lock().unwrap(), vec![1, 2]);
  }
}
