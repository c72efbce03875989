//! Client-side Record Store (C3): a SQLite-backed store of records, conflicts, sync state, and
//! local identity, grounded on `persistence/{record,sync,conflict,user,server}.go`'s SQL shapes
//! (an `ON CONFLICT DO UPDATE` sync-state upsert, an ascending `id` listing, a `version > ?`
//! push-candidate filter) and rewritten against `rusqlite`.
//!
//! Every mutating operation takes an explicit [`rusqlite::Transaction`] supplied by the caller —
//! the store never opens its own transaction when one is already in scope, so a full `Sync`
//! (push, then pull, then conflict materialization) commits or rolls back as one unit.
//! [`RecordStore::with_transaction`] opens that scope for a single synchronous step;
//! [`RecordStore::lock_connection`] opens it for a whole async operation spanning several steps,
//! letting the caller hold one [`rusqlite::Transaction`] across `.await` points.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

use keeper_core::record::RecordType;
use keeper_core::sync_state::SyncState;

use crate::error::ClientError;

const SCHEMA: &[&str] = &[
	"CREATE TABLE IF NOT EXISTS sync_state (
		id TEXT PRIMARY KEY,
		value INTEGER NOT NULL DEFAULT 0
	)",
	"CREATE TABLE IF NOT EXISTS records (
		id TEXT PRIMARY KEY,
		created_at INTEGER NOT NULL,
		modified_at INTEGER NOT NULL,
		type INTEGER NOT NULL,
		big_data INTEGER NOT NULL,
		data BLOB NOT NULL,
		dek BLOB NOT NULL,
		deleted INTEGER NOT NULL DEFAULT 0,
		version INTEGER NOT NULL,
		corrupted INTEGER NOT NULL DEFAULT 0
	)",
	"CREATE TABLE IF NOT EXISTS conflicts (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		created_at INTEGER NOT NULL,
		modified_at INTEGER NOT NULL,
		record_id TEXT NOT NULL,
		local TEXT NOT NULL,
		remote TEXT NOT NULL
	)",
	"CREATE TABLE IF NOT EXISTS users (
		id TEXT PRIMARY KEY,
		username TEXT NOT NULL UNIQUE,
		password TEXT NOT NULL,
		salt TEXT NOT NULL
	)",
	"CREATE TABLE IF NOT EXISTS servers (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		address TEXT NOT NULL,
		login TEXT NOT NULL,
		password TEXT NOT NULL,
		active INTEGER NOT NULL DEFAULT 0
	)",
];

fn record_type_to_int(t: RecordType) -> i64 {
	match t {
		RecordType::LoginPassword => 1,
		RecordType::Text => 2,
		RecordType::BankCard => 3,
		RecordType::Binary => 4,
	}
}

fn record_type_from_int(v: i64) -> Result<RecordType, ClientError> {
	match v {
		1 => Ok(RecordType::LoginPassword),
		2 => Ok(RecordType::Text),
		3 => Ok(RecordType::BankCard),
		4 => Ok(RecordType::Binary),
		other => Err(ClientError::Storage(format!("unknown record type discriminant {}", other))),
	}
}

fn to_epoch(ts: DateTime<Utc>) -> i64 {
	ts.timestamp()
}

fn from_epoch(secs: i64) -> DateTime<Utc> {
	Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

/// A locally stored record, the client-side analogue of [`keeper_core::record::Record`].
///
/// This is a plain row type rather than a re-export of the core `Record` because the store needs
/// to carry `corrupted`, which is a client-local flag with no server-side or wire counterpart.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalRecord {
	/// See [`keeper_core::record::Record::id`].
	pub id: Uuid,
	/// See [`keeper_core::record::Record::record_type`].
	pub record_type: RecordType,
	/// See [`keeper_core::record::Record::created_at`].
	pub created_at: DateTime<Utc>,
	/// See [`keeper_core::record::Record::modified_at`].
	pub modified_at: DateTime<Utc>,
	/// See [`keeper_core::record::Record::version`].
	pub version: i32,
	/// See [`keeper_core::record::Record::big_data`].
	pub big_data: bool,
	/// See [`keeper_core::record::Record::payload`].
	pub payload: Vec<u8>,
	/// See [`keeper_core::record::Record::dek`].
	pub dek: Vec<u8>,
	/// See [`keeper_core::record::Record::deleted`].
	pub deleted: bool,
	/// See [`keeper_core::record::Record::corrupted`].
	pub corrupted: bool,
}

impl LocalRecord {
	/// Wraps a freshly sealed [`keeper_core::record::Record`] for insertion.
	pub fn from_sealed(record: keeper_core::record::Record) -> Self {
		LocalRecord {
			id: record.id,
			record_type: record.record_type,
			created_at: record.created_at,
			modified_at: record.modified_at,
			version: record.version,
			big_data: record.big_data,
			payload: record.payload,
			dek: record.dek,
			deleted: record.deleted,
			corrupted: record.corrupted,
		}
	}

	/// Borrows this row as a [`keeper_core::record::Record`] for decode/reseal operations.
	pub fn as_core(&self) -> keeper_core::record::Record {
		keeper_core::record::Record {
			id: self.id,
			record_type: self.record_type,
			created_at: self.created_at,
			modified_at: self.modified_at,
			version: self.version,
			big_data: self.big_data,
			payload: self.payload.clone(),
			dek: self.dek.clone(),
			deleted: self.deleted,
			corrupted: self.corrupted,
		}
	}
}

/// An immutable snapshot of one side of a [`Conflict`], stored as JSON so it never shares storage
/// with the live `records` row it was captured from.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConflictSnapshot {
	/// The record id this snapshot was captured for.
	pub id: Uuid,
	/// See [`keeper_core::record::Record::record_type`].
	pub record_type: RecordType,
	/// See [`keeper_core::record::Record::modified_at`].
	pub modified_at: DateTime<Utc>,
	/// See [`keeper_core::record::Record::version`].
	pub version: i32,
	/// See [`keeper_core::record::Record::big_data`].
	pub big_data: bool,
	/// See [`keeper_core::record::Record::payload`].
	pub payload: Vec<u8>,
	/// See [`keeper_core::record::Record::dek`].
	pub dek: Vec<u8>,
	/// Tombstone marker for this side, captured at conflict time.
	pub deleted: bool,
}

impl From<&LocalRecord> for ConflictSnapshot {
	fn from(r: &LocalRecord) -> Self {
		ConflictSnapshot {
			id: r.id,
			record_type: r.record_type,
			modified_at: r.modified_at,
			version: r.version,
			big_data: r.big_data,
			payload: r.payload.clone(),
			dek: r.dek.clone(),
			deleted: r.deleted,
		}
	}
}

/// A materialized divergence for a specific record id, captured during pull.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
	/// Row id, assigned on insert.
	pub id: i64,
	/// When this conflict was first recorded.
	pub created_at: DateTime<Utc>,
	/// When this conflict was last touched (conflicts are never updated in place today, so this
	/// equals `created_at`).
	pub modified_at: DateTime<Utc>,
	/// The record id this conflict is about.
	pub record_id: Uuid,
	/// The client's side as it stood at conflict time.
	pub local: ConflictSnapshot,
	/// The server's side as observed during the pull that detected the conflict.
	pub remote: ConflictSnapshot,
}

/// SQLite-backed implementation of the client-side Record Store.
pub struct RecordStore {
	conn: Mutex<Connection>,
}

impl RecordStore {
	/// Opens (creating if necessary) the local database at `path`, running the schema creation
	/// statements. These are idempotent (`CREATE TABLE IF NOT EXISTS`): there is only one schema
	/// generation so far, unlike the server's append-only migration log.
	pub fn open(path: impl AsRef<Path>) -> Result<Self, ClientError> {
		let conn = Connection::open(path)?;
		for statement in SCHEMA {
			conn.execute(statement, [])?;
		}
		Ok(Self { conn: Mutex::new(conn) })
	}

	/// Opens an in-memory database, for tests.
	pub fn open_in_memory() -> Result<Self, ClientError> {
		let conn = Connection::open_in_memory()?;
		for statement in SCHEMA {
			conn.execute(statement, [])?;
		}
		Ok(Self { conn: Mutex::new(conn) })
	}

	/// Runs `f` inside a single transaction, committing on `Ok` and rolling back on `Err`. Suited to
	/// a single synchronous step; a full `Sync` spans several steps across `.await` points and
	/// instead locks once via [`RecordStore::lock_connection`] for its whole duration.
	pub fn with_transaction<F, T>(&self, f: F) -> Result<T, ClientError>
	where
		F: FnOnce(&Transaction) -> Result<T, ClientError>,
	{
		let mut conn = self.conn.lock().expect("record store mutex poisoned");
		let tx = conn.transaction()?;
		let result = f(&tx)?;
		tx.commit()?;
		Ok(result)
	}

	/// Locks the underlying connection for the duration of an entire multi-step async operation —
	/// the whole push-then-pull body of a `Sync`, or a conflict resolution — so the caller can open
	/// one [`rusqlite::Transaction`] from it and thread that transaction through every step instead
	/// of committing piecemeal. Holding the mutex across `.await` points is intentional: only one
	/// `Sync` runs at a time per process, so this lock's blocking behavior mirrors that constraint
	/// rather than fighting it.
	pub fn lock_connection(&self) -> std::sync::MutexGuard<'_, Connection> {
		self.conn.lock().expect("record store mutex poisoned")
	}

	/// Fetches a record by id, regardless of its `deleted`/`corrupted` flags.
	pub fn get_by_id(&self, tx: &Transaction, id: Uuid) -> Result<Option<LocalRecord>, ClientError> {
		tx.query_row(
			"SELECT id, created_at, modified_at, type, big_data, data, dek, deleted, version, corrupted
			 FROM records WHERE id = ?1",
			params![id.to_string()],
			row_to_record,
		)
		.optional()
		.map_err(ClientError::from)
	}

	/// Lists records, optionally filtering out tombstones and corrupted rows, ordered by id.
	pub fn get_all(
		&self, tx: &Transaction, not_deleted: bool, not_corrupted: bool, limit: i64, offset: i64,
	) -> Result<Vec<LocalRecord>, ClientError> {
		let mut stmt = tx.prepare(
			"SELECT id, created_at, modified_at, type, big_data, data, dek, deleted, version, corrupted
			 FROM records
			 WHERE (?1 = 0 OR deleted = 0) AND (?2 = 0 OR corrupted = 0)
			 ORDER BY id
			 LIMIT ?3 OFFSET ?4",
		)?;
		let rows = stmt.query_map(
			params![not_deleted as i64, not_corrupted as i64, limit, offset],
			row_to_record,
		)?;
		rows.collect::<Result<Vec<_>, _>>().map_err(ClientError::from)
	}

	/// Lists every record with `version > since`, the push-candidate set for a `Sync`.
	pub fn get_all_with_version_greater_than(
		&self, tx: &Transaction, since: i32,
	) -> Result<Vec<LocalRecord>, ClientError> {
		let mut stmt = tx.prepare(
			"SELECT id, created_at, modified_at, type, big_data, data, dek, deleted, version, corrupted
			 FROM records WHERE version > ?1 ORDER BY id",
		)?;
		let rows = stmt.query_map(params![since], row_to_record)?;
		rows.collect::<Result<Vec<_>, _>>().map_err(ClientError::from)
	}

	/// Inserts a new record row.
	pub fn insert(&self, tx: &Transaction, record: &LocalRecord) -> Result<(), ClientError> {
		tx.execute(
			"INSERT INTO records (id, created_at, modified_at, type, big_data, data, dek, deleted, version, corrupted)
			 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
			params![
				record.id.to_string(),
				to_epoch(record.created_at),
				to_epoch(record.modified_at),
				record_type_to_int(record.record_type),
				record.big_data as i64,
				record.payload,
				record.dek,
				record.deleted as i64,
				record.version,
				record.corrupted as i64,
			],
		)?;
		Ok(())
	}

	/// Overwrites an existing record row in place, including its id's `type`/`big_data`, which
	/// cannot change after creation but are rewritten idempotently for simplicity.
	pub fn update(&self, tx: &Transaction, record: &LocalRecord) -> Result<(), ClientError> {
		tx.execute(
			"UPDATE records SET created_at = ?2, modified_at = ?3, type = ?4, big_data = ?5, data = ?6,
			 dek = ?7, deleted = ?8, version = ?9, corrupted = ?10 WHERE id = ?1",
			params![
				record.id.to_string(),
				to_epoch(record.created_at),
				to_epoch(record.modified_at),
				record_type_to_int(record.record_type),
				record.big_data as i64,
				record.payload,
				record.dek,
				record.deleted as i64,
				record.version,
				record.corrupted as i64,
			],
		)?;
		Ok(())
	}

	/// Marks a record's `corrupted` flag without touching any other column, used when a decrypt
	/// or integrity check fails on read.
	pub fn mark_corrupted(&self, tx: &Transaction, id: Uuid, corrupted: bool) -> Result<(), ClientError> {
		tx.execute(
			"UPDATE records SET corrupted = ?2 WHERE id = ?1",
			params![id.to_string(), corrupted as i64],
		)?;
		Ok(())
	}

	/// Physically removes a record row. Used only by pull reconciliation once a remote tombstone
	/// has been applied locally — a user-facing delete mutation should tombstone instead (see
	/// [`RecordStore::update`] with `deleted = true`), since the tombstone itself is what needs to
	/// reach the server on the next push.
	pub fn remove(&self, tx: &Transaction, id: Uuid) -> Result<(), ClientError> {
		tx.execute("DELETE FROM records WHERE id = ?1", params![id.to_string()])?;
		Ok(())
	}

	/// Returns whether any unresolved conflict exists. Checked as a precondition at the start of
	/// every local mutation (create/update/delete): mutations are rejected while conflicts remain.
	pub fn conflict_exists(&self, tx: &Transaction) -> Result<bool, ClientError> {
		tx.query_row("SELECT EXISTS(SELECT 1 FROM conflicts)", [], |row| row.get::<_, bool>(0))
			.map_err(ClientError::from)
	}

	/// Records a new conflict for `record_id`, capturing both sides as immutable JSON snapshots.
	pub fn insert_conflict(
		&self, tx: &Transaction, record_id: Uuid, local: &ConflictSnapshot, remote: &ConflictSnapshot,
	) -> Result<i64, ClientError> {
		let local_json = serde_json::to_string(local)
			.map_err(|e| ClientError::Storage(format!("failed to serialize local snapshot: {}", e)))?;
		let remote_json = serde_json::to_string(remote)
			.map_err(|e| ClientError::Storage(format!("failed to serialize remote snapshot: {}", e)))?;
		let now = to_epoch(Utc::now());
		tx.execute(
			"INSERT INTO conflicts (created_at, modified_at, record_id, local, remote) VALUES (?1, ?2, ?3, ?4, ?5)",
			params![now, now, record_id.to_string(), local_json, remote_json],
		)?;
		Ok(tx.last_insert_rowid())
	}

	/// Lists every unresolved conflict.
	pub fn list_conflicts(&self, tx: &Transaction) -> Result<Vec<Conflict>, ClientError> {
		let mut stmt =
			tx.prepare("SELECT id, created_at, modified_at, record_id, local, remote FROM conflicts ORDER BY id")?;
		let rows = stmt.query_map([], row_to_conflict)?;
		rows.collect::<Result<Vec<_>, _>>().map_err(ClientError::from)
	}

	/// Deletes a resolved conflict row.
	pub fn delete_conflict(&self, tx: &Transaction, id: i64) -> Result<(), ClientError> {
		tx.execute("DELETE FROM conflicts WHERE id = ?1", params![id])?;
		Ok(())
	}

	/// Returns the current sync state for `scope` (e.g. the record type name used as a scoping
	/// key, mirroring the single-row-per-stream design), defaulting to zero.
	pub fn get_sync_state(&self, tx: &Transaction, scope: &str) -> Result<SyncState, ClientError> {
		let value = tx
			.query_row("SELECT value FROM sync_state WHERE id = ?1", params![scope], |row| row.get(0))
			.optional()?;
		Ok(SyncState { value: value.unwrap_or(0) })
	}

	/// Upserts the sync state for `scope`.
	pub fn upsert_sync_state(&self, tx: &Transaction, scope: &str, value: i32) -> Result<(), ClientError> {
		tx.execute(
			"INSERT INTO sync_state (id, value) VALUES (?1, ?2) ON CONFLICT(id) DO UPDATE SET value = excluded.value",
			params![scope, value],
		)?;
		Ok(())
	}

	/// Registers the local identity used to unlock this database.
	pub fn insert_user(&self, tx: &Transaction, user: &LocalUser) -> Result<(), ClientError> {
		tx.execute(
			"INSERT INTO users (id, username, password, salt) VALUES (?1, ?2, ?3, ?4)",
			params![user.id.to_string(), user.username, user.password_hash, ""],
		)?;
		Ok(())
	}

	/// Looks up the local identity by username (typically the machine hostname).
	pub fn get_user_by_username(
		&self, tx: &Transaction, username: &str,
	) -> Result<Option<LocalUser>, ClientError> {
		tx.query_row(
			"SELECT id, username, password FROM users WHERE username = ?1",
			params![username],
			|row| {
				let id: String = row.get(0)?;
				Ok(LocalUser {
					id: Uuid::parse_str(&id).map_err(|e| {
						rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
					})?,
					username: row.get(1)?,
					password_hash: row.get(2)?,
				})
			},
		)
		.optional()
		.map_err(ClientError::from)
	}

	/// Records a remote server this client can sync with. `active` marks the server used for the
	/// next `Sync` call; at most one server should be active at a time (see
	/// [`RecordStore::set_active_server`]).
	pub fn insert_server(
		&self, tx: &Transaction, address: &str, login: &str, password: &str, active: bool,
	) -> Result<i64, ClientError> {
		tx.execute(
			"INSERT INTO servers (address, login, password, active) VALUES (?1, ?2, ?3, ?4)",
			params![address, login, password, active as i64],
		)?;
		Ok(tx.last_insert_rowid())
	}

	/// Returns the currently active remote server, if one is configured.
	pub fn get_active_server(&self, tx: &Transaction) -> Result<Option<RemoteServer>, ClientError> {
		tx.query_row(
			"SELECT id, address, login, password, active FROM servers WHERE active = 1 LIMIT 1",
			[],
			|row| {
				Ok(RemoteServer {
					id: row.get(0)?,
					address: row.get(1)?,
					login: row.get(2)?,
					password: row.get(3)?,
					active: row.get::<_, i64>(4)? != 0,
				})
			},
		)
		.optional()
		.map_err(ClientError::from)
	}

	/// Marks `id` as the sole active server, deactivating every other row.
	pub fn set_active_server(&self, tx: &Transaction, id: i64) -> Result<(), ClientError> {
		tx.execute("UPDATE servers SET active = 0", [])?;
		tx.execute("UPDATE servers SET active = 1 WHERE id = ?1", params![id])?;
		Ok(())
	}
}

/// The local identity used to unlock a client database, independent of any server-side account.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalUser {
	/// Locally generated identifier.
	pub id: Uuid,
	/// Typically the machine hostname.
	pub username: String,
	/// Argon2id hash of the unlock passphrase, verified by `keeper-auth-impls`' `password` module.
	pub password_hash: String,
}

/// A remote sync server this client knows how to reach.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteServer {
	/// Row id.
	pub id: i64,
	/// Base URL of the sync server.
	pub address: String,
	/// Login/hostname identifier presented to `Users.Login`.
	pub login: String,
	/// Passphrase presented to `Users.Login`. Stored locally in plaintext, matching the Go
	/// original's `servers` table; protecting this file is left to filesystem permissions.
	pub password: String,
	/// Whether this is the server `Sync` currently targets.
	pub active: bool,
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<LocalRecord> {
	let id: String = row.get(0)?;
	let record_type: i64 = row.get(3)?;
	Ok(LocalRecord {
		id: Uuid::parse_str(&id).map_err(|e| {
			rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
		})?,
		created_at: from_epoch(row.get(1)?),
		modified_at: from_epoch(row.get(2)?),
		record_type: record_type_from_int(record_type).map_err(|_| {
			rusqlite::Error::IntegralValueOutOfRange(3, record_type)
		})?,
		big_data: row.get::<_, i64>(4)? != 0,
		payload: row.get(5)?,
		dek: row.get(6)?,
		deleted: row.get::<_, i64>(7)? != 0,
		version: row.get(8)?,
		corrupted: row.get::<_, i64>(9)? != 0,
	})
}

fn row_to_conflict(row: &rusqlite::Row) -> rusqlite::Result<Conflict> {
	let record_id: String = row.get(3)?;
	let local_json: String = row.get(4)?;
	let remote_json: String = row.get(5)?;
	let from_json_err = |e: serde_json::Error, col| {
		rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
	};
	Ok(Conflict {
		id: row.get(0)?,
		created_at: from_epoch(row.get(1)?),
		modified_at: from_epoch(row.get(2)?),
		record_id: Uuid::parse_str(&record_id).map_err(|e| {
			rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
		})?,
		local: serde_json::from_str(&local_json).map_err(|e| from_json_err(e, 4))?,
		remote: serde_json::from_str(&remote_json).map_err(|e| from_json_err(e, 5))?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use keeper_core::record::{Record, RecordType};

	fn sample(id: Uuid, version: i32) -> LocalRecord {
		let now = Utc::now();
		LocalRecord {
			id,
			record_type: RecordType::Text,
			created_at: from_epoch(to_epoch(now)),
			modified_at: from_epoch(to_epoch(now)),
			version,
			big_data: false,
			payload: b"ciphertext".to_vec(),
			dek: b"wrapped".to_vec(),
			deleted: false,
			corrupted: false,
		}
	}

	#[test]
	fn insert_and_get_by_id_round_trips() {
		let store = RecordStore::open_in_memory().unwrap();
		let id = Uuid::new_v4();
		store
			.with_transaction(|tx| {
				store.insert(tx, &sample(id, 1))?;
				Ok(())
			})
			.unwrap();

		store
			.with_transaction(|tx| {
				let found = store.get_by_id(tx, id)?.expect("record present");
				assert_eq!(found.version, 1);
				Ok(())
			})
			.unwrap();
	}

	#[test]
	fn get_all_with_version_greater_than_filters() {
		let store = RecordStore::open_in_memory().unwrap();
		let a = Uuid::new_v4();
		let b = Uuid::new_v4();
		store
			.with_transaction(|tx| {
				store.insert(tx, &sample(a, 1))?;
				store.insert(tx, &sample(b, 3))?;
				Ok(())
			})
			.unwrap();

		store
			.with_transaction(|tx| {
				let newer = store.get_all_with_version_greater_than(tx, 1)?;
				assert_eq!(newer.len(), 1);
				assert_eq!(newer[0].id, b);
				Ok(())
			})
			.unwrap();
	}

	#[test]
	fn conflict_round_trip_and_gating() {
		let store = RecordStore::open_in_memory().unwrap();
		let record_id = Uuid::new_v4();
		let local = sample(record_id, 2);
		let remote = sample(record_id, 2);

		store
			.with_transaction(|tx| {
				assert!(!store.conflict_exists(tx)?);
				store.insert_conflict(
					tx,
					record_id,
					&ConflictSnapshot::from(&local),
					&ConflictSnapshot::from(&remote),
				)?;
				assert!(store.conflict_exists(tx)?);
				Ok(())
			})
			.unwrap();

		store
			.with_transaction(|tx| {
				let conflicts = store.list_conflicts(tx)?;
				assert_eq!(conflicts.len(), 1);
				store.delete_conflict(tx, conflicts[0].id)?;
				assert!(!store.conflict_exists(tx)?);
				Ok(())
			})
			.unwrap();
	}

	#[test]
	fn sync_state_defaults_to_zero_then_upserts() {
		let store = RecordStore::open_in_memory().unwrap();
		store
			.with_transaction(|tx| {
				assert_eq!(store.get_sync_state(tx, "records")?.value, 0);
				store.upsert_sync_state(tx, "records", 5)?;
				assert_eq!(store.get_sync_state(tx, "records")?.value, 5);
				store.upsert_sync_state(tx, "records", 6)?;
				assert_eq!(store.get_sync_state(tx, "records")?.value, 6);
				Ok(())
			})
			.unwrap();
	}

	#[test]
	fn rollback_on_error_leaves_no_trace() {
		let store = RecordStore::open_in_memory().unwrap();
		let id = Uuid::new_v4();
		let result = store.with_transaction(|tx| {
			store.insert(tx, &sample(id, 1))?;
			Err::<(), _>(ClientError::ConflictPending)
		});
		assert!(result.is_err());

		store
			.with_transaction(|tx| {
				assert!(store.get_by_id(tx, id)?.is_none());
				Ok(())
			})
			.unwrap();
	}

	#[allow(dead_code)]
	fn uses_core_record_type(_: Record) {}
}
