use std::{convert::Infallible, sync::Arc, time::Duration};

use parking_lot::Mutex;

use crate::{
  demand::Demand,
  publisher::Publisher,
  scheduler::{Scheduler, TaskHandle},
  subscriber::Subscriber,
  subscription::{Emitter, Subscription},
};

/// Emits a tick counter every `interval` on `scheduler`, starting from zero.
///
/// A tick that arrives while the subscriber has no outstanding demand is
/// dropped. The timer runs until the subscription is cancelled.
pub fn timer<Sch: Scheduler>(interval: Duration, scheduler: Sch) -> Timer<Sch> {
  Timer { interval, scheduler }
}

#[derive(Clone)]
pub struct Timer<Sch> {
  interval: Duration,
  scheduler: Sch,
}

impl<Sch: Scheduler> Publisher for Timer<Sch> {
  type Item = usize;
  type Err = Infallible;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<usize, Infallible> + 'static,
  {
    let emitter = Arc::new(Emitter::new(subscriber));
    let subscription =
      Arc::new(TimerSubscription { emitter: emitter.clone(), task: Mutex::new(None) });
    emitter.start(subscription.clone());
    if emitter.is_terminated() {
      return;
    }

    let ticks = Arc::downgrade(&emitter);
    let handle = self.scheduler.schedule_repeating(
      Box::new(move |tick| {
        if let Some(emitter) = ticks.upgrade() {
          emitter.offer(tick);
        }
      }),
      self.interval,
    );
    *subscription.task.lock() = Some(handle.clone());
    if emitter.is_terminated() {
      handle.cancel();
    }
  }
}

struct TimerSubscription {
  emitter: Arc<Emitter<usize, Infallible>>,
  task: Mutex<Option<TaskHandle>>,
}

impl Subscription for TimerSubscription {
  fn request(&self, demand: Demand) { self.emitter.request(demand) }

  fn cancel(&self) {
    self.emitter.close();
    if let Some(task) = self.task.lock().take() {
      task.cancel();
    }
  }
}

#[cfg(test)]
mod test {
  use std::time::Duration;

  use crate::{prelude::*, test_util::Recorder};

  #[test]
  fn ticks_without_demand_are_dropped() {
    let scheduler = TestScheduler::new();
    let rec = Recorder::new(Demand::max(2));
    timer(Duration::from_millis(10), scheduler.clone()).subscribe(rec.clone());

    scheduler.advance_by(Duration::from_millis(45));
    assert_eq!(rec.values(), vec![0, 1]);

    rec.request(Demand::max(1));
    scheduler.advance_by(Duration::from_millis(10));
    assert_eq!(rec.values(), vec![0, 1, 4]);
  }

  #[test]
  fn cancel_stops_the_schedule() {
    let scheduler = TestScheduler::new();
    let rec = Recorder::new(Demand::Unlimited);
    timer(Duration::from_millis(5), scheduler.clone()).subscribe(rec.clone());
    scheduler.advance_by(Duration::from_millis(10));
    rec.cancel();
    scheduler.advance_by(Duration::from_millis(50));
    assert_eq!(rec.values(), vec![0, 1]);
    assert!(scheduler.is_empty());
  }
}
