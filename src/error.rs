//! Error types shared by the sources and operators.
//!
//! Stream failures travel as values inside
//! [`Completion::Failed`](crate::subscriber::Completion). The enums here are
//! all `Clone` because multicasting nodes hand one failure to several
//! subscribers.

/// Failure of a [`Transport`](crate::publisher::Transport) fetch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
  /// The remote end could not be reached.
  #[error("{0} is unreachable")]
  Unreachable(String),

  /// The fetch did not answer in time.
  #[error("request timed out")]
  TimedOut,

  /// Any other transport failure.
  #[error("transport failed: {0}")]
  Other(String),
}

/// Failure to turn bytes into a typed value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
  #[error("malformed payload: {0}")]
  Malformed(String),
}

impl From<serde_json::Error> for DecodeError {
  fn from(e: serde_json::Error) -> Self { DecodeError::Malformed(e.to_string()) }
}

/// Failure of a fetch-then-decode pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
  #[error(transparent)]
  Transport(#[from] TransportError),

  #[error(transparent)]
  Decode(#[from] DecodeError),
}

/// Domain level failure exposed to application code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
  /// The address could not be reached.
  #[error("{0} is unreachable")]
  AddressUnreachable(String),

  /// The server answered with something that could not be understood.
  #[error("the server responded with garbage")]
  InvalidResponse,
}

impl ApiError {
  /// Maps a lower level failure for a request to `url`.
  ///
  /// Transport failures become [`ApiError::AddressUnreachable`], everything
  /// else is an [`ApiError::InvalidResponse`]. Meant to be passed to
  /// `map_err`:
  ///
  /// ```rust
  /// # use rxstream::prelude::*;
  /// let to_api = ApiError::from_fetch("https://example.com/items");
  /// let e = to_api(FetchError::Transport(TransportError::TimedOut));
  /// assert_eq!(e, ApiError::AddressUnreachable("https://example.com/items".into()));
  /// ```
  pub fn from_fetch(url: impl Into<String>) -> impl Fn(FetchError) -> ApiError + Clone {
    let url = url.into();
    move |e| match e {
      FetchError::Transport(_) => ApiError::AddressUnreachable(url.clone()),
      FetchError::Decode(_) => ApiError::InvalidResponse,
    }
  }
}

/// Invalid operator configuration, reported when the operator is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
  /// A combinator that needs at least one source got none.
  #[error("{0} needs at least one source")]
  NoSources(&'static str),

  /// A concurrency bound of zero would never subscribe anything.
  #[error("concurrency bound must be at least 1")]
  ZeroConcurrency,
}
