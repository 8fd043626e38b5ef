//! The daily attendance workflow.
//!
//! - [`Recorder`] marks a student present at most once per day and hands the
//!   confirmation mail to the [`Dispatcher`] pool.
//! - [`Reconciler`] mails every identity with an address but no record for a
//!   given day.
//! - [`PolicyAccess`] loads the notification policy, materialising the default
//!   on first read. Both operations above take the policy as an argument.
//! - [`recognize`] is the face-matching boundary.

pub mod dispatch;
pub mod error;
pub mod policy;
pub mod recognize;
pub mod reconciler;
pub mod recorder;

pub use dispatch::{ConfirmationJob, DispatchConfig, DispatchWorkers, Dispatcher, SubmitError};
pub use error::{Error, Result};
pub use policy::PolicyAccess;
pub use recognize::{CapturedImage, FaceMatcher, MatchDecision, PlaceholderMatcher, RecognizeError};
pub use reconciler::{ReconciliationReport, Reconciler};
pub use recorder::{Confirmation, RecordOutcome, Recorder};

#[cfg(test)]
mod test_support;
