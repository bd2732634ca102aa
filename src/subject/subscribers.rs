use std::sync::Arc;

use smallvec::SmallVec;

use crate::{demand::Demand, subscriber::Completion, subscription::Emitter};

/// The emitters currently attached to a subject, keyed by a stable id.
pub(crate) struct Subscribers<Item, Err> {
  entries: Vec<(usize, Arc<Emitter<Item, Err>>)>,
  next_id: usize,
}

impl<Item, Err> Default for Subscribers<Item, Err> {
  fn default() -> Self { Subscribers { entries: vec![], next_id: 0 } }
}

impl<Item, Err> Subscribers<Item, Err> {
  /// Add an emitter and return its unique id.
  pub(crate) fn add(&mut self, emitter: Arc<Emitter<Item, Err>>) -> usize {
    let id = self.next_id;
    self.next_id += 1;
    self.entries.push((id, emitter));
    id
  }

  /// Remove an emitter by id.
  pub(crate) fn remove(&mut self, id: usize) -> Option<Arc<Emitter<Item, Err>>> {
    let pos = self.entries.iter().position(|(i, _)| *i == id)?;
    Some(self.entries.remove(pos).1)
  }

  pub(crate) fn len(&self) -> usize { self.entries.len() }

  pub(crate) fn is_empty(&self) -> bool { self.entries.is_empty() }

  /// The largest demand any attached subscriber still has open.
  pub(crate) fn max_outstanding(&self) -> Demand {
    self.entries.iter().map(|(_, e)| e.outstanding()).max().unwrap_or(Demand::NONE)
  }

  /// Offers `value` to every subscriber with credit left, cloning it for all
  /// but the last one. Returns the emitters that took it; they still have to
  /// be drained once the caller released its lock.
  pub(crate) fn offer_all(&self, value: Item) -> SmallVec<[Arc<Emitter<Item, Err>>; 4]>
  where
    Item: Clone,
  {
    let mut taken = SmallVec::new();
    let mut iter = self.entries.iter().peekable();
    while let Some((_, emitter)) = iter.next() {
      if iter.peek().is_some() {
        if emitter.enqueue_if_demanded(value.clone()) {
          taken.push(emitter.clone());
        }
      } else {
        if emitter.enqueue_if_demanded(value) {
          taken.push(emitter.clone());
        }
        break;
      }
    }
    taken
  }

  /// Detaches everyone, handing out the emitters to complete.
  pub(crate) fn take_all(&mut self) -> Vec<Arc<Emitter<Item, Err>>> {
    self.entries.drain(..).map(|(_, e)| e).collect()
  }
}

/// Completes every emitter in `emitters`, cloning the completion for all but
/// the last one.
pub(crate) fn broadcast_completion<Item, Err: Clone>(
  emitters: Vec<Arc<Emitter<Item, Err>>>, completion: Completion<Err>,
) {
  let mut iter = emitters.into_iter().peekable();
  while let Some(emitter) = iter.next() {
    if iter.peek().is_some() {
      emitter.finish(completion.clone());
    } else {
      emitter.finish(completion);
      break;
    }
  }
}
