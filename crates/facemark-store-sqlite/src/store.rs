//! [`SqliteStore`] — the SQLite implementation of [`AttendanceStore`].

use std::path::Path;

use chrono::{DateTime, NaiveDate, SubsecRound as _, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use facemark_core::{
  attendance::{AttendanceRecord, DayStats, InsertOutcome, LedgerQuery, NewAttendance},
  identity::{Identity, NewIdentity},
  policy::NotificationPolicy,
  store::AttendanceStore,
};

use crate::{
  Error, Result,
  encode::{
    ATTENDANCE_COLUMNS, IDENTITY_COLUMNS, POLICY_COLUMNS, RawAttendance, RawIdentity,
    RawPolicy, encode_date, encode_dt, encode_provider, encode_time, encode_uuid,
  },
  schema::migrate,
};

/// True for UNIQUE and PRIMARY KEY violations; foreign-key and CHECK
/// failures stay errors.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(f, _)
      if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        || f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
  )
}

/// Current time at the precision the `created_at` columns keep, so a value
/// returned from an insert compares equal to the same row read back.
fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

enum RawInsert {
  Inserted,
  Duplicate(RawAttendance),
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// An attendance store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. All calls
/// are serialised on the connection's thread.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and bring its schema up to date.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        migrate(conn)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn identity_where(
    &self,
    clause: &'static str,
    param: String,
  ) -> Result<Option<Identity>> {
    let raw: Option<RawIdentity> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE {clause}"),
              rusqlite::params![param],
              RawIdentity::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawIdentity::into_identity).transpose()
  }

  async fn identities_where(&self, clause: &'static str) -> Result<Vec<Identity>> {
    let raws: Vec<RawIdentity> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {IDENTITY_COLUMNS} FROM users WHERE {clause} ORDER BY created_at, name"
        ))?;
        let rows = stmt
          .query_map([], RawIdentity::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawIdentity::into_identity).collect()
  }

  /// Update one nullable column on `users` and return the fresh row.
  async fn set_identity_column(
    &self,
    id: Uuid,
    column: &'static str,
    value: Option<String>,
  ) -> Result<Option<Identity>> {
    let id_str = encode_uuid(id);
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          &format!("UPDATE users SET {column} = ?1 WHERE id = ?2"),
          rusqlite::params![value, id_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.get_identity(id).await
  }
}

// ─── AttendanceStore impl ────────────────────────────────────────────────────

impl AttendanceStore for SqliteStore {
  type Error = Error;

  // ── Identities ────────────────────────────────────────────────────────────

  async fn create_identity(&self, input: NewIdentity) -> Result<Option<Identity>> {
    let identity = Identity {
      id:            Uuid::new_v4(),
      name:          input.name,
      email:         input.email,
      password_hash: input.password_hash,
      photo_url:     input.photo_url,
      provider:      input.provider,
      provider_id:   input.provider_id,
      created_at:    now(),
    };

    let id_str       = encode_uuid(identity.id);
    let name         = identity.name.clone();
    let email        = identity.email.clone();
    let hash         = identity.password_hash.clone();
    let photo_url    = identity.photo_url.clone();
    let provider_str = encode_provider(identity.provider);
    let provider_id  = identity.provider_id.clone();
    let at_str       = encode_dt(identity.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        let res = conn.execute(
          "INSERT INTO users (
             id, name, email, password_hash, photo_url,
             provider, provider_id, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            id_str,
            name,
            email,
            hash,
            photo_url,
            provider_str,
            provider_id,
            at_str,
          ],
        );
        match res {
          Ok(_) => Ok(true),
          Err(e) if is_unique_violation(&e) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if !inserted {
      tracing::debug!(name = %identity.name, "identity name already taken");
      return Ok(None);
    }
    Ok(Some(identity))
  }

  async fn get_identity(&self, id: Uuid) -> Result<Option<Identity>> {
    self.identity_where("id = ?1", encode_uuid(id)).await
  }

  async fn find_identity_by_name(&self, name: &str) -> Result<Option<Identity>> {
    self.identity_where("name = ?1", name.to_owned()).await
  }

  async fn list_identities(&self) -> Result<Vec<Identity>> {
    self.identities_where("1 = 1").await
  }

  async fn identities_with_email(&self) -> Result<Vec<Identity>> {
    self
      .identities_where("email IS NOT NULL AND TRIM(email) != ''")
      .await
  }

  async fn set_identity_email(
    &self,
    id: Uuid,
    email: Option<String>,
  ) -> Result<Option<Identity>> {
    self.set_identity_column(id, "email", email).await
  }

  async fn set_identity_photo(
    &self,
    id: Uuid,
    photo_url: Option<String>,
  ) -> Result<Option<Identity>> {
    self.set_identity_column(id, "photo_url", photo_url).await
  }

  // ── Ledger ────────────────────────────────────────────────────────────────

  async fn insert_attendance(&self, input: NewAttendance) -> Result<InsertOutcome> {
    let record = AttendanceRecord {
      id:          Uuid::new_v4(),
      name:        input.name,
      identity_id: Some(input.identity_id),
      date:        input.date,
      time:        input.time,
      email_sent:  false,
      created_at:  now(),
    };

    let id_str   = encode_uuid(record.id);
    let name     = record.name.clone();
    let user_str = encode_uuid(input.identity_id);
    let date_str = encode_date(record.date);
    let time_str = encode_time(record.time);
    let at_str   = encode_dt(record.created_at);

    let outcome = self
      .conn
      .call(move |conn| {
        let res = conn.execute(
          "INSERT INTO attendance (id, name, user_id, date, time, email_sent, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
          rusqlite::params![id_str, name, user_str, date_str, time_str, at_str],
        );
        match res {
          Ok(_) => Ok(RawInsert::Inserted),
          Err(e) if is_unique_violation(&e) => {
            let existing = conn.query_row(
              &format!(
                "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE user_id = ?1 AND date = ?2"
              ),
              rusqlite::params![user_str, date_str],
              RawAttendance::from_row,
            )?;
            Ok(RawInsert::Duplicate(existing))
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    match outcome {
      RawInsert::Inserted => Ok(InsertOutcome::Inserted(record)),
      RawInsert::Duplicate(raw) => Ok(InsertOutcome::Duplicate(raw.into_record()?)),
    }
  }

  async fn find_attendance(
    &self,
    identity_id: Uuid,
    name: &str,
    date: NaiveDate,
  ) -> Result<Option<AttendanceRecord>> {
    let user_str = encode_uuid(identity_id);
    let name     = name.to_owned();
    let date_str = encode_date(date);

    let raw: Option<RawAttendance> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {ATTENDANCE_COLUMNS} FROM attendance
                 WHERE date = ?1
                   AND (user_id = ?2 OR (user_id IS NULL AND name = ?3))
                 ORDER BY user_id IS NULL, created_at
                 LIMIT 1"
              ),
              rusqlite::params![date_str, user_str, name],
              RawAttendance::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAttendance::into_record).transpose()
  }

  async fn list_attendance(&self, query: &LedgerQuery) -> Result<Vec<AttendanceRecord>> {
    let date_str = query.date.map(encode_date);
    let name     = query.name.clone().filter(|n| !n.is_empty());

    let raws: Vec<RawAttendance> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ATTENDANCE_COLUMNS} FROM attendance
           WHERE (?1 IS NULL OR date = ?1)
             AND (?2 IS NULL OR name = ?2)
           ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![date_str, name], RawAttendance::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAttendance::into_record).collect()
  }

  async fn mark_email_sent(&self, record_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(record_id);
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE attendance SET email_sent = 1 WHERE id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::RecordNotFound(record_id));
    }
    Ok(())
  }

  async fn day_stats(&self, date: NaiveDate) -> Result<DayStats> {
    let date_str = encode_date(date);

    let (present, total): (i64, i64) = self
      .conn
      .call(move |conn| {
        // Legacy rows without a user link count once per distinct name.
        let present: i64 = conn.query_row(
          "SELECT COUNT(DISTINCT COALESCE(user_id, 'name:' || name))
           FROM attendance WHERE date = ?1",
          rusqlite::params![date_str],
          |r| r.get(0),
        )?;
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
        Ok((present, total))
      })
      .await?;

    Ok(DayStats {
      date,
      present: present.max(0) as u64,
      total: total.max(0) as u64,
    })
  }

  // ── Policy ────────────────────────────────────────────────────────────────

  async fn load_policy(&self) -> Result<Option<NotificationPolicy>> {
    let raw: Option<RawPolicy> = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {POLICY_COLUMNS} FROM notification_settings ORDER BY id LIMIT 1"),
              [],
              RawPolicy::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPolicy::into_policy).transpose()
  }

  async fn insert_policy_if_absent(
    &self,
    policy: NotificationPolicy,
  ) -> Result<(NotificationPolicy, bool)> {
    let cutoff = policy.cutoff_time.to_string();
    let at_str = encode_dt(now());

    let (raw, inserted): (RawPolicy, bool) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let inserted = tx.execute(
          "INSERT INTO notification_settings
             (id, attendance_confirmations, absence_alerts, cutoff_time, created_at)
           SELECT 1, ?1, ?2, ?3, ?4
           WHERE NOT EXISTS (SELECT 1 FROM notification_settings)",
          rusqlite::params![
            policy.attendance_confirmations,
            policy.absence_alerts,
            cutoff,
            at_str,
          ],
        )? > 0;
        let raw = tx.query_row(
          &format!("SELECT {POLICY_COLUMNS} FROM notification_settings ORDER BY id LIMIT 1"),
          [],
          RawPolicy::from_row,
        )?;
        tx.commit()?;
        Ok((raw, inserted))
      })
      .await?;

    Ok((raw.into_policy()?, inserted))
  }

  async fn save_policy(&self, policy: NotificationPolicy) -> Result<()> {
    let cutoff = policy.cutoff_time.to_string();
    let at_str = encode_dt(now());

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let updated = tx.execute(
          "UPDATE notification_settings
           SET attendance_confirmations = ?1, absence_alerts = ?2, cutoff_time = ?3
           WHERE id = (SELECT MIN(id) FROM notification_settings)",
          rusqlite::params![policy.attendance_confirmations, policy.absence_alerts, cutoff],
        )?;
        if updated == 0 {
          tx.execute(
            "INSERT INTO notification_settings
               (id, attendance_confirmations, absence_alerts, cutoff_time, created_at)
             VALUES (1, ?1, ?2, ?3, ?4)",
            rusqlite::params![
              policy.attendance_confirmations,
              policy.absence_alerts,
              cutoff,
              at_str,
            ],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
