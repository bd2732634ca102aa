use std::sync::Arc;

use crate::{publisher::Publisher, scheduler::Scheduler, subscriber::Subscriber};

/// Performs the upstream subscription, and with it whatever work the
/// upstream does on subscribe, as a task on a scheduler.
pub struct SubscribeOnOp<S, Sch> {
  pub(crate) source: Arc<S>,
  pub(crate) scheduler: Sch,
}

impl<S, Sch: Clone> Clone for SubscribeOnOp<S, Sch> {
  fn clone(&self) -> Self {
    SubscribeOnOp { source: self.source.clone(), scheduler: self.scheduler.clone() }
  }
}

impl<S, Sch> Publisher for SubscribeOnOp<S, Sch>
where
  S: Publisher + Send + Sync + 'static,
  Sch: Scheduler,
{
  type Item = S::Item;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<S::Item, S::Err> + 'static,
  {
    let source = self.source.clone();
    tracing::trace!("scheduling upstream subscription");
    self.scheduler.schedule(Box::new(move || source.subscribe(subscriber)), None);
  }
}

#[cfg(test)]
mod test {
  use crate::{prelude::*, test_util::Recorder};

  #[test]
  fn subscription_waits_for_the_scheduler() {
    let scheduler = TestScheduler::new();
    let rec = Recorder::<i32, ()>::new(Demand::Unlimited);
    Sequence::new(1..4).subscribe_on(scheduler.clone()).subscribe(rec.clone());
    assert_eq!(rec.subscriptions(), 0);

    scheduler.flush();
    assert_eq!(rec.values(), vec![1, 2, 3]);
    assert_eq!(rec.completion(), Some(Completion::Finished));
  }

  #[cfg(feature = "futures-scheduler")]
  #[test]
  fn thread_pool() {
    use std::{
      sync::{Arc, Mutex},
      thread,
      time::Duration,
    };

    let pool = ThreadPoolScheduler::new().unwrap();
    let res = Arc::new(Mutex::new(vec![]));
    let c_res = res.clone();
    let thread = Arc::new(Mutex::new(vec![]));
    let c_thread = thread.clone();
    let _handle = from_iter(1..5).subscribe_on(pool).sink_value(move |v| {
      res.lock().unwrap().push(v);
      thread.lock().unwrap().push(thread::current().id());
    });

    thread::sleep(Duration::from_millis(50));
    assert_eq!(*c_res.lock().unwrap(), (1..5).collect::<Vec<_>>());
    assert_ne!(c_thread.lock().unwrap()[0], thread::current().id());
  }
}
