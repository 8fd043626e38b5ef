//! Bounded worker pool for attendance confirmations.
//!
//! The recorder submits a [`ConfirmationJob`] and returns immediately; a fixed
//! set of workers drains the queue, calls the [`Notifier`] under a timeout,
//! and flags the record as `email_sent` on success. A full queue rejects the
//! job instead of blocking the request. Nothing is retried.

use std::{sync::Arc, time::Duration};

use facemark_core::{
  notify::{Delivery, Notification, Notifier},
  store::AttendanceStore,
};
use thiserror::Error;
use tokio::{
  sync::{Mutex, mpsc},
  task::JoinSet,
};
use uuid::Uuid;

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct DispatchConfig {
  /// Concurrent notifier calls.
  pub workers:        usize,
  /// Jobs that may wait for a worker before submissions are rejected.
  pub queue_capacity: usize,
  /// Upper bound on a single notifier call.
  pub timeout:        Duration,
}

impl Default for DispatchConfig {
  fn default() -> Self {
    Self {
      workers:        2,
      queue_capacity: 256,
      timeout:        Duration::from_secs(10),
    }
  }
}

// ─── Jobs ────────────────────────────────────────────────────────────────────

/// One confirmation to deliver for a freshly created record.
#[derive(Debug, Clone)]
pub struct ConfirmationJob {
  pub record_id:    Uuid,
  pub recipient:    String,
  pub notification: Notification,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
  #[error("confirmation queue is full")]
  Full,
  #[error("confirmation dispatcher has shut down")]
  Closed,
}

// ─── Dispatcher ──────────────────────────────────────────────────────────────

/// Submission handle. Cloning is cheap; workers exit once every clone has
/// been dropped and the queue is drained.
#[derive(Clone)]
pub struct Dispatcher {
  tx: mpsc::Sender<ConfirmationJob>,
}

/// The worker tasks behind a [`Dispatcher`].
pub struct DispatchWorkers {
  tasks: JoinSet<()>,
}

impl Dispatcher {
  /// Start `config.workers` workers on the current runtime.
  pub fn spawn<S, N>(
    store: Arc<S>,
    notifier: Arc<N>,
    config: DispatchConfig,
  ) -> (Self, DispatchWorkers)
  where
    S: AttendanceStore + 'static,
    N: Notifier + 'static,
  {
    let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
    let rx = Arc::new(Mutex::new(rx));
    let mut tasks = JoinSet::new();

    for worker in 0..config.workers.max(1) {
      let rx = Arc::clone(&rx);
      let store = Arc::clone(&store);
      let notifier = Arc::clone(&notifier);

      tasks.spawn(async move {
        loop {
          let job = rx.lock().await.recv().await;
          let Some(job) = job else { break };
          deliver(store.as_ref(), notifier.as_ref(), job, config.timeout).await;
        }
        tracing::debug!(worker, "confirmation worker stopped");
      });
    }

    (Self { tx }, DispatchWorkers { tasks })
  }

  /// Queue a job without waiting.
  pub fn submit(&self, job: ConfirmationJob) -> Result<(), SubmitError> {
    self.tx.try_send(job).map_err(|e| match e {
      mpsc::error::TrySendError::Full(_) => SubmitError::Full,
      mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
    })
  }
}

impl DispatchWorkers {
  /// Wait for the workers to finish. Only returns after every
  /// [`Dispatcher`] clone is dropped.
  pub async fn join(mut self) {
    while let Some(res) = self.tasks.join_next().await {
      if let Err(e) = res {
        tracing::error!(error = %e, "confirmation worker panicked");
      }
    }
  }
}

// ─── Delivery ────────────────────────────────────────────────────────────────

/// Call the notifier, turning an elapsed timeout into a failed delivery.
pub(crate) async fn send_with_timeout<N: Notifier>(
  notifier: &N,
  recipient: &str,
  notification: &Notification,
  timeout: Duration,
) -> Delivery {
  match tokio::time::timeout(timeout, notifier.send(recipient, notification)).await {
    Ok(delivery) => delivery,
    Err(_) => Err(format!("timed out after {}ms", timeout.as_millis())),
  }
}

async fn deliver<S, N>(store: &S, notifier: &N, job: ConfirmationJob, timeout: Duration)
where
  S: AttendanceStore,
  N: Notifier,
{
  match send_with_timeout(notifier, &job.recipient, &job.notification, timeout).await {
    Ok(message) => {
      tracing::info!(
        recipient = %job.recipient,
        record_id = %job.record_id,
        %message,
        "attendance confirmation sent",
      );
      if let Err(e) = store.mark_email_sent(job.record_id).await {
        tracing::error!(record_id = %job.record_id, error = %e, "failed to flag confirmation as sent");
      }
    }
    Err(message) => {
      tracing::error!(
        recipient = %job.recipient,
        record_id = %job.record_id,
        %message,
        "attendance confirmation failed",
      );
    }
  }
}
