use std::{cell::RefCell, collections::VecDeque, time::Duration};

use super::{Scheduler, Task, TaskHandle};

thread_local! {
  static TRAMPOLINE: RefCell<Option<VecDeque<Task>>> = const { RefCell::new(None) };
}

/// Runs work on the calling thread.
///
/// A task scheduled from inside another task is queued and runs once the
/// outer one returns, so deep hand-off chains do not grow the stack and run
/// in FIFO order. Delays block the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmediateScheduler;

struct ResetOnExit;

impl Drop for ResetOnExit {
  fn drop(&mut self) { TRAMPOLINE.with(|q| *q.borrow_mut() = None) }
}

impl Scheduler for ImmediateScheduler {
  fn schedule(&self, task: Task, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new();
    let task = handle.guard(task);
    let job: Task = match delay {
      Some(d) if !d.is_zero() => Box::new(move || {
        std::thread::sleep(d);
        task()
      }),
      _ => task,
    };

    let first = TRAMPOLINE.with(|q| {
      let mut q = q.borrow_mut();
      match q.as_mut() {
        Some(queue) => {
          queue.push_back(job);
          None
        }
        None => {
          *q = Some(VecDeque::new());
          Some(job)
        }
      }
    });

    if let Some(job) = first {
      let _reset = ResetOnExit;
      job();
      while let Some(next) = TRAMPOLINE.with(|q| q.borrow_mut().as_mut().and_then(VecDeque::pop_front)) {
        next();
      }
    }
    handle
  }
}
