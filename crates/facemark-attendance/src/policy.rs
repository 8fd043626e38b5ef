//! Load and replace the notification policy.

use std::sync::Arc;

use facemark_core::{policy::NotificationPolicy, store::AttendanceStore};

use crate::{Error, Result};

/// Owns the load/default-materialise step for [`NotificationPolicy`].
///
/// Callers fetch the policy here and pass it into the recorder and
/// reconciler explicitly.
pub struct PolicyAccess<S> {
  store: Arc<S>,
}

impl<S> Clone for PolicyAccess<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: AttendanceStore> PolicyAccess<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// The active policy. The first call on an unconfigured store persists
  /// and returns [`NotificationPolicy::default`].
  pub async fn get(&self) -> Result<NotificationPolicy> {
    if let Some(policy) = self.store.load_policy().await.map_err(Error::storage)? {
      return Ok(policy);
    }

    let (policy, wrote) = self
      .store
      .insert_policy_if_absent(NotificationPolicy::default())
      .await
      .map_err(Error::storage)?;
    if wrote {
      tracing::info!(?policy, "materialised default notification policy");
    }
    Ok(policy)
  }

  /// Replace all policy fields at once.
  pub async fn set(&self, policy: NotificationPolicy) -> Result<NotificationPolicy> {
    self.store.save_policy(policy).await.map_err(Error::storage)?;
    tracing::info!(?policy, "notification policy updated");
    Ok(policy)
  }
}

#[cfg(test)]
mod tests {
  use facemark_core::policy::CutoffTime;
  use facemark_store_sqlite::SqliteStore;

  use super::*;

  async fn access() -> (PolicyAccess<SqliteStore>, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    (PolicyAccess::new(Arc::clone(&store)), store)
  }

  #[tokio::test]
  async fn first_get_materialises_defaults() {
    let (policies, store) = access().await;
    assert!(store.load_policy().await.unwrap().is_none());

    let policy = policies.get().await.unwrap();
    assert_eq!(policy, NotificationPolicy::default());
    assert_eq!(policy.cutoff_time.to_string(), "10:00");
    assert_eq!(store.load_policy().await.unwrap(), Some(policy));
  }

  #[tokio::test]
  async fn set_then_get_round_trips() {
    let (policies, _) = access().await;
    let wanted = NotificationPolicy {
      attendance_confirmations: false,
      absence_alerts:           false,
      cutoff_time:              CutoffTime::new(8, 15).unwrap(),
    };

    assert_eq!(policies.set(wanted).await.unwrap(), wanted);
    assert_eq!(policies.get().await.unwrap(), wanted);
  }
}
