//! Error types for `facemark-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid cutoff time {0:?}: expected HH:MM")]
  InvalidCutoff(String),

  #[error("unknown identity provider: {0:?}")]
  UnknownProvider(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
