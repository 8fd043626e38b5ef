//! SQL schema for the FaceMark SQLite store.
//!
//! Applied at connection startup and gated on `PRAGMA user_version`. A
//! database at version 0 may be empty or may carry the legacy layout that
//! predates notifications (no email columns, no identity link on attendance,
//! `users.password` instead of `users.password_hash`); [`migrate`] upgrades
//! both to [`SCHEMA_VERSION`]. Every step is idempotent.
//!
//! Legacy data was written without uniqueness constraints, so before the
//! unique indexes go on, [`repair_legacy_rows`] links unlinked attendance to
//! its identity by name, keeps only the earliest record per person per day,
//! and renames all but the oldest holder of a duplicated name.

use rusqlite::{Connection, OptionalExtension as _};

/// The `user_version` stamped after a successful migration.
pub const SCHEMA_VERSION: i64 = 2;

/// Connection-level settings; run outside any transaction.
const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

/// Table DDL; a no-op for tables that already exist.
const TABLES: &str = "
CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    email         TEXT,
    password_hash TEXT NOT NULL,
    photo_url     TEXT,
    provider      TEXT NOT NULL DEFAULT 'local',   -- 'local' | 'google' | 'github'
    provider_id   TEXT,
    created_at    TEXT NOT NULL                    -- RFC 3339 UTC
);

-- One row per person per day; only email_sent is ever updated.
CREATE TABLE IF NOT EXISTS attendance (
    id         TEXT PRIMARY KEY,
    name       TEXT NOT NULL,                      -- display copy of users.name
    user_id    TEXT REFERENCES users(id),          -- NULL only on legacy rows
    date       TEXT NOT NULL,                      -- YYYY-MM-DD
    time       TEXT NOT NULL,                      -- HH:MM:SS
    email_sent INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notification_settings (
    id                       INTEGER PRIMARY KEY CHECK (id = 1),
    attendance_confirmations INTEGER NOT NULL DEFAULT 1,
    absence_alerts           INTEGER NOT NULL DEFAULT 1,
    cutoff_time              TEXT    NOT NULL DEFAULT '10:00',
    created_at               TEXT    NOT NULL
);
";

/// Columns the legacy layout lacks: `(table, column, definition)`.
const LEGACY_COLUMNS: &[(&str, &str, &str)] = &[
  ("users", "email", "TEXT"),
  ("users", "provider", "TEXT DEFAULT 'local'"),
  ("users", "provider_id", "TEXT"),
  ("attendance", "user_id", "TEXT"),
  ("attendance", "email_sent", "INTEGER DEFAULT 0"),
];

/// Uniqueness lives here, after legacy columns exist. NULL `user_id`s are
/// distinct under SQLite's UNIQUE semantics, so unlinked legacy rows never
/// collide.
const INDEXES: &str = "
CREATE UNIQUE INDEX IF NOT EXISTS users_name_idx          ON users(name);
CREATE UNIQUE INDEX IF NOT EXISTS attendance_user_date_idx ON attendance(user_id, date);
CREATE INDEX        IF NOT EXISTS attendance_date_idx      ON attendance(date);
CREATE INDEX        IF NOT EXISTS attendance_name_idx      ON attendance(name);
";

/// Bring `conn` up to [`SCHEMA_VERSION`].
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<()> {
  conn.execute_batch(PRAGMAS)?;

  let version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
  if version >= SCHEMA_VERSION {
    return Ok(());
  }

  let tx = conn.transaction()?;
  tx.execute_batch(TABLES)?;

  if has_column(&tx, "users", "password")? && !has_column(&tx, "users", "password_hash")? {
    tx.execute_batch("ALTER TABLE users RENAME COLUMN password TO password_hash")?;
    tracing::info!("renamed users.password to users.password_hash");
  }

  for (table, column, definition) in LEGACY_COLUMNS {
    if !has_column(&tx, table, column)? {
      tx.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {definition}"))?;
      tracing::info!(table, column, "added legacy column");
    }
  }

  repair_legacy_rows(&tx)?;
  tx.execute_batch(INDEXES)?;
  tx.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))?;
  tx.commit()?;

  tracing::debug!(from = version, to = SCHEMA_VERSION, "schema migrated");
  Ok(())
}

/// Make legacy rows satisfy the unique indexes. A no-op on clean data.
fn repair_legacy_rows(tx: &Connection) -> rusqlite::Result<()> {
  // Names held by more than one identity are ambiguous; leave those rows
  // unlinked.
  let linked = tx.execute(
    "UPDATE attendance
        SET user_id = (SELECT u.id FROM users u WHERE u.name = attendance.name)
      WHERE user_id IS NULL
        AND (SELECT COUNT(*) FROM users u WHERE u.name = attendance.name) = 1",
    [],
  )?;
  if linked > 0 {
    tracing::info!(rows = linked, "linked legacy attendance to identities by name");
  }

  let mut stmt = tx.prepare(
    "SELECT a.id, a.name, a.date, a.time FROM attendance a
      WHERE a.user_id IS NOT NULL
        AND EXISTS (
          SELECT 1 FROM attendance b
           WHERE b.user_id = a.user_id AND b.date = a.date
             AND (b.time < a.time OR (b.time = a.time AND b.rowid < a.rowid))
        )",
  )?;
  let later: Vec<(String, String, String, String)> = stmt
    .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)))?
    .collect::<rusqlite::Result<_>>()?;
  drop(stmt);
  for (id, name, date, time) in &later {
    tracing::warn!(%id, %name, %date, %time, "dropping duplicate attendance record");
    tx.execute("DELETE FROM attendance WHERE id = ?1", [id])?;
  }

  let mut stmt = tx.prepare(
    "SELECT u.id, u.name FROM users u
      WHERE EXISTS (
        SELECT 1 FROM users v
         WHERE v.name = u.name
           AND (v.created_at < u.created_at
                OR (v.created_at IS u.created_at AND v.rowid < u.rowid))
      )",
  )?;
  let shadowed: Vec<(String, String)> = stmt
    .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
    .collect::<rusqlite::Result<_>>()?;
  drop(stmt);
  for (id, name) in &shadowed {
    let short: String = id.chars().take(8).collect();
    let renamed = format!("{name} ({short})");
    tracing::warn!(%id, from = %name, to = %renamed, "renaming identity with duplicate name");
    tx.execute("UPDATE users SET name = ?1 WHERE id = ?2", [&renamed, id])?;
    tx.execute("UPDATE attendance SET name = ?1 WHERE user_id = ?2", [&renamed, id])?;
  }

  Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2",
        rusqlite::params![table, column],
        |_| Ok(()),
      )
      .optional()?
      .is_some(),
  )
}
