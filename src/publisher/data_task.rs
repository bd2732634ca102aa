//! Network fetch abstraction.
//!
//! The crate does not speak HTTP itself. A [`Transport`] performs one fetch
//! and answers through a [`Responder`]; [`data_task`] turns that into a
//! publisher of exactly one `(payload, ResponseMeta)` pair or one
//! [`TransportError`].

use std::{
  collections::HashMap,
  sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Weak,
  },
};

use parking_lot::Mutex;

use crate::{
  demand::Demand,
  error::TransportError,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::{Emitter, Subscription},
};

/// What to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
  pub url: String,
  pub headers: Vec<(String, String)>,
}

impl Request {
  pub fn get(url: impl Into<String>) -> Self { Request { url: url.into(), headers: vec![] } }

  pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }
}

/// Metadata delivered alongside a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMeta {
  pub status: u16,
  pub url: String,
  pub headers: Vec<(String, String)>,
}

/// A payload with its metadata.
pub type Response = (Vec<u8>, ResponseMeta);

/// Completes one fetch. Consumed by the first answer.
pub struct Responder(Box<dyn FnOnce(Result<Response, TransportError>) + Send>);

impl Responder {
  pub fn respond(self, result: Result<Response, TransportError>) { (self.0)(result) }
}

/// Something that can fetch a [`Request`], synchronously or not.
pub trait Transport: Send + Sync + 'static {
  /// Starts fetching `request` and eventually answers through `responder`,
  /// from any thread.
  fn fetch(&self, request: &Request, responder: Responder);
}

/// A publisher running one fetch per subscription, started by the first
/// non-zero demand.
pub fn data_task<T: Transport>(transport: Arc<T>, request: Request) -> DataTask<T> {
  DataTask { transport, request }
}

pub struct DataTask<T> {
  transport: Arc<T>,
  request: Request,
}

impl<T> Clone for DataTask<T> {
  fn clone(&self) -> Self {
    DataTask { transport: self.transport.clone(), request: self.request.clone() }
  }
}

impl<T: Transport> Publisher for DataTask<T> {
  type Item = Response;
  type Err = TransportError;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<Response, TransportError> + 'static,
  {
    let task = Arc::new_cyclic(|me| FetchSubscription {
      emitter: Emitter::new(subscriber),
      transport: self.transport.clone(),
      request: self.request.clone(),
      started: AtomicBool::new(false),
      me: me.clone(),
    });
    task.emitter.start(task.clone());
  }
}

struct FetchSubscription<T> {
  emitter: Emitter<Response, TransportError>,
  transport: Arc<T>,
  request: Request,
  started: AtomicBool,
  me: Weak<FetchSubscription<T>>,
}

impl<T: Transport> FetchSubscription<T> {
  fn complete(&self, result: Result<Response, TransportError>) {
    match result {
      Ok(response) => {
        tracing::debug!(url = %self.request.url, status = response.1.status, "data task finished");
        self.emitter.push(response);
        self.emitter.finish(Completion::Finished);
      }
      Err(e) => {
        tracing::debug!(url = %self.request.url, error = %e, "data task failed");
        self.emitter.finish(Completion::Failed(e));
      }
    }
  }
}

impl<T: Transport> Subscription for FetchSubscription<T> {
  fn request(&self, demand: Demand) {
    self.emitter.request(demand);
    if demand.is_none() || self.emitter.is_terminated() {
      return;
    }
    if self.started.swap(true, Ordering::AcqRel) {
      return;
    }
    tracing::debug!(url = %self.request.url, "data task started");
    let me = self.me.clone();
    self.transport.fetch(
      &self.request,
      Responder(Box::new(move |result| {
        if let Some(task) = me.upgrade() {
          task.complete(result);
        }
      })),
    );
  }

  fn cancel(&self) { self.emitter.close() }
}

// ============================================================================
// MockTransport
// ============================================================================

/// An in-memory [`Transport`] answering from canned responses, for tests and
/// demos. Unknown URLs fail with [`TransportError::Unreachable`].
#[derive(Default)]
pub struct MockTransport {
  routes: Mutex<HashMap<String, Result<Vec<u8>, TransportError>>>,
  fetches: AtomicUsize,
}

impl MockTransport {
  pub fn new() -> Self { Self::default() }

  /// Answers fetches of `url` with `payload` and status 200.
  pub fn route(self, url: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
    self.routes.lock().insert(url.into(), Ok(payload.into()));
    self
  }

  /// Answers fetches of `url` with `error`.
  pub fn fail(self, url: impl Into<String>, error: TransportError) -> Self {
    self.routes.lock().insert(url.into(), Err(error));
    self
  }

  /// How many fetches were started so far.
  pub fn fetch_count(&self) -> usize { self.fetches.load(Ordering::SeqCst) }
}

impl Transport for MockTransport {
  fn fetch(&self, request: &Request, responder: Responder) {
    self.fetches.fetch_add(1, Ordering::SeqCst);
    let answer = self.routes.lock().get(&request.url).cloned();
    let result = match answer {
      Some(Ok(payload)) => Ok((
        payload,
        ResponseMeta { status: 200, url: request.url.clone(), headers: request.headers.clone() },
      )),
      Some(Err(e)) => Err(e),
      None => Err(TransportError::Unreachable(request.url.clone())),
    };
    responder.respond(result);
  }
}
