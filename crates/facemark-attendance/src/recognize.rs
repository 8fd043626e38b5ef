//! Face-matching boundary.
//!
//! A capture arrives as base64, optionally wrapped in a `data:` URL. The
//! [`FaceMatcher`] decides whether it shows the logged-in identity. The only
//! matcher shipped is [`PlaceholderMatcher`], which accepts every decodable
//! image.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use facemark_core::identity::Identity;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecognizeError {
  #[error("no image data provided")]
  Empty,
  #[error("image is not valid base64: {0}")]
  InvalidBase64(String),
}

/// Decoded image bytes from a capture.
#[derive(Debug, Clone)]
pub struct CapturedImage {
  bytes: Vec<u8>,
}

impl CapturedImage {
  /// Accepts bare base64 or a `data:image/...;base64,` URL.
  pub fn from_base64(data: &str) -> Result<Self, RecognizeError> {
    let payload = match data.split_once(',') {
      Some((_, rest)) => rest,
      None => data,
    }
    .trim();
    if payload.is_empty() {
      return Err(RecognizeError::Empty);
    }

    let bytes = STANDARD
      .decode(payload)
      .map_err(|e| RecognizeError::InvalidBase64(e.to_string()))?;
    if bytes.is_empty() {
      return Err(RecognizeError::Empty);
    }
    Ok(Self { bytes })
  }

  pub fn as_bytes(&self) -> &[u8] { &self.bytes }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDecision {
  Match,
  NoMatch,
}

pub trait FaceMatcher: Send + Sync {
  fn verify(&self, image: &CapturedImage, identity: &Identity) -> MatchDecision;
}

/// Accepts any image.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderMatcher;

impl FaceMatcher for PlaceholderMatcher {
  fn verify(&self, image: &CapturedImage, identity: &Identity) -> MatchDecision {
    tracing::debug!(name = %identity.name, bytes = image.as_bytes().len(), "placeholder face match");
    MatchDecision::Match
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn data_url_prefix_is_stripped() {
    let image = CapturedImage::from_base64("data:image/jpeg;base64,aGVsbG8=").unwrap();
    assert_eq!(image.as_bytes(), b"hello");

    let bare = CapturedImage::from_base64("aGVsbG8=").unwrap();
    assert_eq!(bare.as_bytes(), b"hello");
  }

  #[test]
  fn empty_and_garbage_are_rejected() {
    assert_eq!(CapturedImage::from_base64("").unwrap_err(), RecognizeError::Empty);
    assert_eq!(
      CapturedImage::from_base64("data:image/png;base64,").unwrap_err(),
      RecognizeError::Empty,
    );
    assert!(matches!(
      CapturedImage::from_base64("not base64!!").unwrap_err(),
      RecognizeError::InvalidBase64(_),
    ));
  }
}
