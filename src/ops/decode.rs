//! Decoding byte payloads into typed values.

use std::{marker::PhantomData, sync::Arc};

use serde::de::DeserializeOwned;

use crate::{
  error::DecodeError,
  ops::map::TryMapSubscriber,
  publisher::Publisher,
  subscriber::Subscriber,
};

/// Turns a byte payload into a typed value.
pub trait Decoder: Send + Sync + 'static {
  type Output;

  fn decode(&self, bytes: &[u8]) -> Result<Self::Output, DecodeError>;
}

/// Decodes JSON payloads with `serde_json`.
pub struct JsonDecoder<T>(PhantomData<fn() -> T>);

impl<T> JsonDecoder<T> {
  pub fn new() -> Self { JsonDecoder(PhantomData) }
}

impl<T> Default for JsonDecoder<T> {
  fn default() -> Self { Self::new() }
}

impl<T> Clone for JsonDecoder<T> {
  fn clone(&self) -> Self { Self::new() }
}

impl<T: DeserializeOwned + 'static> Decoder for JsonDecoder<T> {
  type Output = T;

  fn decode(&self, bytes: &[u8]) -> Result<T, DecodeError> {
    serde_json::from_slice(bytes).map_err(DecodeError::from)
  }
}

/// Runs every payload through a [`Decoder`]. The first payload that fails to
/// decode ends the stream with that failure and cancels upstream.
pub struct DecodeOp<S, D> {
  pub(crate) source: S,
  pub(crate) decoder: Arc<D>,
}

impl<S: Clone, D> Clone for DecodeOp<S, D> {
  fn clone(&self) -> Self { DecodeOp { source: self.source.clone(), decoder: self.decoder.clone() } }
}

impl<S, D> Publisher for DecodeOp<S, D>
where
  S: Publisher,
  S::Item: AsRef<[u8]>,
  S::Err: From<DecodeError>,
  D: Decoder,
{
  type Item = D::Output;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<D::Output, S::Err> + 'static,
  {
    let decoder = self.decoder.clone();
    let decode = move |payload: S::Item| decoder.decode(payload.as_ref()).map_err(S::Err::from);
    self.source.subscribe(TryMapSubscriber::new(subscriber, Arc::new(decode)))
  }
}

#[cfg(test)]
mod test {
  use serde::Deserialize;

  use crate::{prelude::*, test_util::Recorder};

  #[derive(Debug, Clone, PartialEq, Deserialize)]
  struct Post {
    id: u32,
    title: String,
  }

  #[test]
  fn decodes_json_payloads() {
    let rec = Recorder::<Post, DecodeError>::new(Demand::Unlimited);
    Sequence::new([br#"{"id": 1, "title": "hello"}"#.to_vec()])
      .decode(JsonDecoder::<Post>::new())
      .subscribe(rec.clone());
    assert_eq!(rec.values(), vec![Post { id: 1, title: "hello".into() }]);
    assert_eq!(rec.completion(), Some(Completion::Finished));
  }

  #[test]
  fn malformed_payload_fails_and_cancels() {
    let subject = PassthroughSubject::<Vec<u8>, FetchError>::new();
    let rec = Recorder::<u32, FetchError>::new(Demand::Unlimited);
    subject.clone().decode(JsonDecoder::<u32>::new()).subscribe(rec.clone());
    subject.send(b"7".to_vec());
    subject.send(b"seven".to_vec());
    assert_eq!(rec.values(), vec![7]);
    assert!(matches!(rec.completion(), Some(Completion::Failed(FetchError::Decode(_)))));
    assert_eq!(subject.subscriber_count(), 0);
  }
}
