//! Client-side Sync Engine (C7): pushes locally-mutated records, pulls remote changes, and
//! materializes conflicts when both sides touched the same record.
//!
//! Grounded on `internal/cli/app/sync_service.go`'s `SyncService.Sync`/`push`/`pull` and
//! `internal/cli/app/data_manager.go`'s `SolveConflict`/`applyLocal`/`applyRemote`. A single call to
//! [`SyncEngine::sync`] locks the record store once, via [`crate::store::RecordStore::lock_connection`],
//! and threads one [`rusqlite::Transaction`] through the whole push-then-pull algorithm, committing
//! only at the end — exactly like the Go original's single `sql.Tx` spanning both phases.
//! [`SyncEngine::solve_conflict`] is the same shape: one lock, one transaction, one commit.

use rusqlite::Transaction;
use uuid::Uuid;

use keeper_api::types::{Chunk, ChunkType, OperationType, PushOperation, Secret};
use keeper_core::blob::{BlobStore, VARIANT_REMOTE_PENDING};
use keeper_core::record::RecordType as CoreRecordType;

use crate::error::ClientError;
use crate::store::{Conflict, ConflictSnapshot, LocalRecord, RecordStore};
use crate::transport::Transport;

/// Scoping key under which the single client-wide sync counter is stored. Mirrors the Go client's
/// `reflect.TypeOf(core.Record{}).Name()`, which also resolves to one shared counter today.
pub const SYNC_SCOPE: &str = "Record";

/// Controls which phases of [`SyncEngine::sync`] run, and whether conflicting pushes/pulls are
/// forced through anyway.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
	/// Run only the push phase.
	pub push_only: bool,
	/// Run only the pull phase.
	pub pull_only: bool,
	/// Bypass version-conflict and record-conflict checks, accepting the remote or local side
	/// unconditionally depending on the phase.
	pub force: bool,
}

/// Which side to keep when resolving a conflict via [`SyncEngine::solve_conflict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
	/// Keep the client's copy, discarding the server's.
	Local,
	/// Keep the server's copy, discarding the client's.
	Remote,
}

fn wire_record_type(t: CoreRecordType) -> keeper_api::types::RecordType {
	match t {
		CoreRecordType::LoginPassword => keeper_api::types::RecordType::LoginPassword,
		CoreRecordType::Text => keeper_api::types::RecordType::Text,
		CoreRecordType::BankCard => keeper_api::types::RecordType::BankCard,
		CoreRecordType::Binary => keeper_api::types::RecordType::Binary,
	}
}

fn core_record_type(t: i32) -> Result<CoreRecordType, ClientError> {
	match keeper_api::types::RecordType::try_from(t) {
		Ok(keeper_api::types::RecordType::LoginPassword) => Ok(CoreRecordType::LoginPassword),
		Ok(keeper_api::types::RecordType::Text) => Ok(CoreRecordType::Text),
		Ok(keeper_api::types::RecordType::BankCard) => Ok(CoreRecordType::BankCard),
		Ok(keeper_api::types::RecordType::Binary) => Ok(CoreRecordType::Binary),
		_ => Err(ClientError::Storage("server sent an unknown record type".to_string())),
	}
}

fn to_secret(record: &LocalRecord) -> Secret {
	Secret {
		id: record.id.to_string(),
		modified_at: record.modified_at.timestamp(),
		record_type: wire_record_type(record.record_type) as i32,
		dek: record.dek.clone().into(),
		data: record.payload.clone().into(),
		is_big: record.big_data,
		version: record.version,
		deleted: record.deleted,
	}
}

fn from_secret(secret: &Secret) -> Result<LocalRecord, ClientError> {
	Ok(LocalRecord {
		id: Uuid::parse_str(&secret.id)
			.map_err(|e| ClientError::Storage(format!("server sent an invalid record id: {}", e)))?,
		record_type: core_record_type(secret.record_type)?,
		created_at: chrono::Utc::now(),
		modified_at: chrono::DateTime::from_timestamp(secret.modified_at, 0)
			.unwrap_or_else(chrono::Utc::now),
		version: secret.version,
		big_data: secret.is_big,
		payload: secret.data.to_vec(),
		dek: secret.dek.to_vec(),
		deleted: secret.deleted,
		corrupted: false,
	})
}

/// Runs the push/pull algorithm against a [`RecordStore`] and [`Transport`].
pub struct SyncEngine<T: Transport> {
	store: RecordStore,
	transport: T,
	blobs: BlobStore,
}

impl<T: Transport> SyncEngine<T> {
	/// Builds a sync engine over `store`, talking to the server via `transport`, staging binary
	/// bodies under `blobs`.
	pub fn new(store: RecordStore, transport: T, blobs: BlobStore) -> Self {
		Self { store, transport, blobs }
	}

	/// Runs the requested phases of `Sync`: push, then pull, by default; either phase alone when
	/// `push_only`/`pull_only` is set. Locks the store once and runs both phases inside that one
	/// transaction, so a failure partway through (a network error mid-pull, say) rolls back
	/// everything already written this call instead of leaving earlier records committed while a
	/// later step never ran.
	pub async fn sync(&self, options: SyncOptions) -> Result<(), ClientError> {
		log::info!("starting sync process");
		let mut conn = self.store.lock_connection();
		let tx = conn.transaction()?;

		let since = self.store.get_sync_state(&tx, SYNC_SCOPE)?.value;
		log::debug!("current version: {}", since);

		if !options.pull_only {
			self.push(&tx, since, options.force).await?;
		}
		if !options.push_only {
			self.pull(&tx, since, options.force).await?;
		}

		tx.commit()?;
		Ok(())
	}

	async fn push(&self, tx: &Transaction<'_>, since: i32, force: bool) -> Result<(), ClientError> {
		let records = self.store.get_all_with_version_greater_than(tx, since)?;
		if records.is_empty() {
			return Ok(());
		}

		let mut operations = Vec::with_capacity(records.len());
		for record in &records {
			if record.big_data {
				self.append_push_file(&mut operations, record)?;
			} else {
				operations.push(PushOperation {
					op_type: OperationType::Default as i32,
					secret: Some(to_secret(record)),
					id: String::new(),
					buffer: Default::default(),
				});
			}
		}

		self.transport.push(since, force, operations).await?;
		Ok(())
	}

	fn append_push_file(
		&self, operations: &mut Vec<PushOperation>, record: &LocalRecord,
	) -> Result<(), ClientError> {
		operations.push(PushOperation {
			op_type: OperationType::Begin as i32,
			secret: Some(Secret {
				id: record.id.to_string(),
				modified_at: record.modified_at.timestamp(),
				version: record.version,
				..Default::default()
			}),
			id: String::new(),
			buffer: Default::default(),
		});

		const CHUNK_SIZE: usize = 1024 * 1024;
		let body = self.blobs.read(record.id, record.version, None)?;
		for chunk in body.chunks(CHUNK_SIZE) {
			operations.push(PushOperation {
				op_type: OperationType::Chunk as i32,
				secret: None,
				id: record.id.to_string(),
				buffer: chunk.to_vec().into(),
			});
		}

		operations.push(PushOperation {
			op_type: OperationType::End as i32,
			secret: Some(to_secret(record)),
			id: String::new(),
			buffer: Default::default(),
		});
		Ok(())
	}

	async fn pull(&self, tx: &Transaction<'_>, since: i32, force: bool) -> Result<(), ClientError> {
		log::info!("starting receiving secrets from server");
		let response = self.transport.pull(since).await?;

		let mut has_conflict = false;
		for secret in &response.secrets {
			let id = Uuid::parse_str(&secret.id)
				.map_err(|e| ClientError::Storage(format!("server sent an invalid record id: {}", e)))?;

			if secret.is_big && !secret.deleted {
				self.fetch_remote_body(&secret.id, secret.version).await?;
			}

			let existing = self.store.get_by_id(tx, id)?;
			match existing {
				Some(local) => {
					if !force && local.is_changed_vs(since) && local.modified_at != secret_modified_at(secret) {
						log::warn!("detected conflict for secret {}", secret.id);
						has_conflict = true;
						self.materialize_conflict(tx, &local, secret)?;
						continue;
					}
					if secret.deleted {
						self.apply_delete(tx, &local)?;
					} else {
						self.apply_update(tx, &local, secret)?;
					}
				},
				None => {
					if secret.deleted {
						continue;
					}
					self.apply_create(tx, secret)?;
				},
			}
		}

		if has_conflict {
			let count = self.store.list_conflicts(tx)?.len();
			log::warn!("detected conflict. count {}", count);
			return Ok(());
		}

		self.store.upsert_sync_state(tx, SYNC_SCOPE, response.version)?;
		log::info!("secrets received successfully");
		Ok(())
	}

	async fn fetch_remote_body(&self, id: &str, version: i32) -> Result<(), ClientError> {
		let chunks = self.transport.pull_stream(id, version).await?;
		let record_id = Uuid::parse_str(id)
			.map_err(|e| ClientError::Storage(format!("server sent an invalid record id: {}", e)))?;
		self.blobs.remove(record_id, version, Some(VARIANT_REMOTE_PENDING))?;
		for chunk in &chunks {
			match ChunkType::try_from(chunk.chunk_type) {
				Ok(ChunkType::FilePart) => {
					self.blobs.append(record_id, version, Some(VARIANT_REMOTE_PENDING), &chunk.buffer)?;
				},
				Ok(ChunkType::ErrData) => continue,
				_ => {},
			}
		}
		Ok(())
	}

	fn materialize_conflict(
		&self, tx: &Transaction<'_>, local: &LocalRecord, secret: &Secret,
	) -> Result<(), ClientError> {
		// The remote body, if any, is already staged under `VARIANT_REMOTE_PENDING` by
		// `fetch_remote_body`; it stays there until `solve_conflict` promotes or discards it.
		let remote = from_secret(secret)?;
		self.store.insert_conflict(
			tx,
			local.id,
			&ConflictSnapshot::from(local),
			&ConflictSnapshot::from(&remote),
		)?;
		Ok(())
	}

	fn apply_update(
		&self, tx: &Transaction<'_>, local: &LocalRecord, secret: &Secret,
	) -> Result<(), ClientError> {
		if secret.is_big && local.version < secret.version {
			self.blobs.promote_variant(local.id, secret.version, VARIANT_REMOTE_PENDING)?;
			if local.big_data {
				self.blobs.remove(local.id, local.version, None)?;
			}
		}
		let mut updated = local.clone();
		updated.deleted = secret.deleted;
		updated.modified_at = secret_modified_at(secret);
		updated.dek = secret.dek.to_vec();
		updated.payload = secret.data.to_vec();
		updated.version = secret.version;
		updated.big_data = secret.is_big;
		self.store.update(tx, &updated)?;
		Ok(())
	}

	fn apply_delete(&self, tx: &Transaction<'_>, local: &LocalRecord) -> Result<(), ClientError> {
		if local.big_data {
			self.blobs.remove(local.id, local.version, None)?;
		}
		self.store.remove(tx, local.id)?;
		Ok(())
	}

	fn apply_create(&self, tx: &Transaction<'_>, secret: &Secret) -> Result<(), ClientError> {
		let record = from_secret(secret)?;
		if record.big_data {
			self.blobs.remove(record.id, record.version, None)?;
			self.blobs.promote_variant(record.id, record.version, VARIANT_REMOTE_PENDING)?;
		}
		self.store.insert(tx, &record)?;
		Ok(())
	}

	/// Resolves an outstanding conflict by keeping either the local or remote side. Locks the store
	/// once and runs the lookup, resolution, and conflict deletion inside one transaction, the same
	/// shape as [`SyncEngine::sync`].
	///
	/// Preserves the Go original's asymmetry: choosing [`Resolution::Local`] when the remote side
	/// is `big_data` only discards the staged remote blob and does not touch the record's version,
	/// since the stored local copy is already current; choosing [`Resolution::Remote`] always
	/// bumps the record's version (`remote.version + 1`) so the next push carries the adopted
	/// content forward as a new local mutation.
	pub fn solve_conflict(
		&self, conflict_id: i64, record_id: Uuid, resolution: Resolution,
	) -> Result<(), ClientError> {
		let mut conn = self.store.lock_connection();
		let tx = conn.transaction()?;

		let conflict = self
			.store
			.list_conflicts(&tx)?
			.into_iter()
			.find(|c| c.id == conflict_id)
			.ok_or_else(|| ClientError::Storage(format!("no such conflict: {}", conflict_id)))?;

		match resolution {
			Resolution::Local => self.apply_local_resolution(&tx, &conflict)?,
			Resolution::Remote => self.apply_remote_resolution(&tx, &conflict)?,
		}

		self.store.delete_conflict(&tx, conflict_id)?;
		tx.commit()?;
		let _ = record_id;
		Ok(())
	}

	fn apply_local_resolution(&self, tx: &Transaction<'_>, conflict: &Conflict) -> Result<(), ClientError> {
		if conflict.remote.big_data {
			self.blobs.remove(conflict.record_id, conflict.remote.version, Some(VARIANT_REMOTE_PENDING))?;
			return Ok(());
		}
		let mut local = self
			.store
			.get_by_id(tx, conflict.record_id)?
			.ok_or_else(|| ClientError::Storage("conflicting record vanished locally".to_string()))?;
		local.version = conflict.remote.version + 1;
		self.store.update(tx, &local)?;
		Ok(())
	}

	fn apply_remote_resolution(&self, tx: &Transaction<'_>, conflict: &Conflict) -> Result<(), ClientError> {
		if conflict.local.big_data {
			self.blobs.remove(conflict.record_id, conflict.local.version, None)?;
		}
		if conflict.remote.big_data {
			self.blobs.promote_variant(conflict.record_id, conflict.remote.version, VARIANT_REMOTE_PENDING)?;
		}
		let remote = &conflict.remote;
		let updated = LocalRecord {
			id: conflict.record_id,
			record_type: remote.record_type,
			created_at: remote.modified_at,
			modified_at: remote.modified_at,
			version: remote.version + 1,
			big_data: remote.big_data,
			payload: remote.payload.clone(),
			dek: remote.dek.clone(),
			deleted: remote.deleted,
			corrupted: false,
		};
		self.store.update(tx, &updated)?;
		Ok(())
	}
}

fn secret_modified_at(secret: &Secret) -> chrono::DateTime<chrono::Utc> {
	chrono::DateTime::from_timestamp(secret.modified_at, 0).unwrap_or_else(chrono::Utc::now)
}

impl LocalRecord {
	fn is_changed_vs(&self, baseline: i32) -> bool {
		self.version > baseline
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use keeper_api::types::{HealthCheckResponse, LoginResponse, PullResponse, PushResponse, RegisterResponse};
	use std::sync::Mutex;

	#[derive(Default)]
	struct FakeTransport {
		pull_responses: Mutex<Vec<PullResponse>>,
		pushed: Mutex<Vec<PushOperation>>,
	}

	#[async_trait]
	impl Transport for FakeTransport {
		async fn push(
			&self, _client_version: i32, _force: bool, operations: Vec<PushOperation>,
		) -> Result<PushResponse, ClientError> {
			self.pushed.lock().unwrap().extend(operations);
			Ok(PushResponse { success: true })
		}

		async fn pull(&self, _since: i32) -> Result<PullResponse, ClientError> {
			Ok(self.pull_responses.lock().unwrap().pop().unwrap_or_default())
		}

		async fn pull_stream(&self, _id: &str, _version: i32) -> Result<Vec<Chunk>, ClientError> {
			Ok(Vec::new())
		}

		async fn health_check(&self) -> Result<HealthCheckResponse, ClientError> {
			Ok(HealthCheckResponse { state: 1 })
		}

		async fn login(&self, _login: &str, _password: &str) -> Result<LoginResponse, ClientError> {
			Ok(LoginResponse::default())
		}

		async fn register(&self, _login: &str, _password: &str) -> Result<RegisterResponse, ClientError> {
			Ok(RegisterResponse::default())
		}
	}

	fn engine_with(transport: FakeTransport) -> SyncEngine<FakeTransport> {
		let store = RecordStore::open_in_memory().unwrap();
		let blobs = BlobStore::new(std::env::temp_dir().join(format!("keeper-sync-test-{}", Uuid::new_v4())))
			.unwrap();
		SyncEngine::new(store, transport, blobs)
	}

	#[tokio::test]
	async fn pull_with_no_records_advances_nothing() {
		let engine = engine_with(FakeTransport::default());
		engine.sync(SyncOptions { pull_only: true, ..Default::default() }).await.unwrap();
		let state =
			engine.store.with_transaction(|tx| engine.store.get_sync_state(tx, SYNC_SCOPE)).unwrap();
		assert_eq!(state.value, 0);
	}

	#[tokio::test]
	async fn pull_creates_new_local_record() {
		let transport = FakeTransport::default();
		let secret = Secret {
			id: Uuid::new_v4().to_string(),
			modified_at: 1_700_000_000,
			record_type: keeper_api::types::RecordType::Text as i32,
			dek: b"wrapped".to_vec().into(),
			data: b"ciphertext".to_vec().into(),
			is_big: false,
			version: 3,
			deleted: false,
		};
		transport
			.pull_responses
			.lock()
			.unwrap()
			.push(PullResponse { secrets: vec![secret.clone()], version: 3 });

		let engine = engine_with(transport);
		engine.sync(SyncOptions { pull_only: true, ..Default::default() }).await.unwrap();

		let id = Uuid::parse_str(&secret.id).unwrap();
		let stored = engine.store.with_transaction(|tx| engine.store.get_by_id(tx, id)).unwrap();
		assert_eq!(stored.unwrap().version, 3);

		let state =
			engine.store.with_transaction(|tx| engine.store.get_sync_state(tx, SYNC_SCOPE)).unwrap();
		assert_eq!(state.value, 3);
	}

	#[tokio::test]
	async fn push_sends_unsynced_records_and_none_when_clean() {
		let transport = FakeTransport::default();
		let engine = engine_with(transport);
		let id = Uuid::new_v4();
		let now = chrono::Utc::now();
		let record = LocalRecord {
			id,
			record_type: CoreRecordType::Text,
			created_at: now,
			modified_at: now,
			version: 1,
			big_data: false,
			payload: b"ciphertext".to_vec(),
			dek: b"wrapped".to_vec(),
			deleted: false,
			corrupted: false,
		};
		engine.store.with_transaction(|tx| engine.store.insert(tx, &record)).unwrap();

		engine.sync(SyncOptions { push_only: true, ..Default::default() }).await.unwrap();
		assert_eq!(engine.transport.pushed.lock().unwrap().len(), 1);
	}

	fn secret_for(id: Uuid, version: i32, modified_at: i64, payload: &[u8]) -> Secret {
		Secret {
			id: id.to_string(),
			modified_at,
			record_type: keeper_api::types::RecordType::Text as i32,
			dek: b"wrapped".to_vec().into(),
			data: payload.to_vec().into(),
			is_big: false,
			version,
			deleted: false,
		}
	}

	/// Mirrors the two-client-edit scenario: both sides changed the same record since the last
	/// synced version, so the pull must materialize a conflict instead of overwriting local state.
	#[tokio::test]
	async fn pull_detects_conflict_when_both_sides_changed_since_last_sync() {
		let transport = FakeTransport::default();
		let id = Uuid::new_v4();
		let local_modified = chrono::DateTime::from_timestamp(1_700_000_100, 0).unwrap();
		let remote_secret = secret_for(id, 2, 1_700_000_200, b"new-A");
		transport
			.pull_responses
			.lock()
			.unwrap()
			.push(PullResponse { secrets: vec![remote_secret.clone()], version: 2 });

		let engine = engine_with(transport);
		engine
			.store
			.with_transaction(|tx| engine.store.upsert_sync_state(tx, SYNC_SCOPE, 1))
			.unwrap();
		let local = LocalRecord {
			id,
			record_type: CoreRecordType::Text,
			created_at: local_modified,
			modified_at: local_modified,
			version: 2,
			big_data: false,
			payload: b"new-B".to_vec(),
			dek: b"wrapped".to_vec(),
			deleted: false,
			corrupted: false,
		};
		engine.store.with_transaction(|tx| engine.store.insert(tx, &local)).unwrap();

		engine.sync(SyncOptions { pull_only: true, ..Default::default() }).await.unwrap();

		let conflicts =
			engine.store.with_transaction(|tx| engine.store.list_conflicts(tx)).unwrap();
		assert_eq!(conflicts.len(), 1);
		assert_eq!(conflicts[0].local.payload, b"new-B");
		assert_eq!(conflicts[0].remote.payload, b"new-A");

		// A conflicting pull must not advance the sync counter, since the push that would carry
		// the resolution forward hasn't happened yet.
		let state =
			engine.store.with_transaction(|tx| engine.store.get_sync_state(tx, SYNC_SCOPE)).unwrap();
		assert_eq!(state.value, 1);

		// Mutations are gated while the conflict is outstanding.
		assert!(matches!(
			crate::mutate::delete(&engine.store, &engine.blobs, id),
			Err(ClientError::ConflictPending)
		));
	}

	/// Resolving in favor of the remote side adopts its content and bumps the version so the next
	/// push carries it forward as a new local mutation.
	#[tokio::test]
	async fn solve_conflict_remote_adopts_remote_content() {
		let transport = FakeTransport::default();
		let id = Uuid::new_v4();
		let now = chrono::Utc::now();
		let local = LocalRecord {
			id,
			record_type: CoreRecordType::Text,
			created_at: now,
			modified_at: now,
			version: 2,
			big_data: false,
			payload: b"new-B".to_vec(),
			dek: b"wrapped".to_vec(),
			deleted: false,
			corrupted: false,
		};
		let remote = LocalRecord { payload: b"new-A".to_vec(), version: 2, ..local.clone() };

		let engine = engine_with(transport);
		engine.store.with_transaction(|tx| engine.store.insert(tx, &local)).unwrap();
		let conflict_id = engine
			.store
			.with_transaction(|tx| {
				engine.store.insert_conflict(
					tx,
					id,
					&ConflictSnapshot::from(&local),
					&ConflictSnapshot::from(&remote),
				)
			})
			.unwrap();

		engine.solve_conflict(conflict_id, id, Resolution::Remote).unwrap();

		let stored = engine.store.with_transaction(|tx| engine.store.get_by_id(tx, id)).unwrap().unwrap();
		assert_eq!(stored.payload, b"new-A");
		assert_eq!(stored.version, 3);
		let conflicts =
			engine.store.with_transaction(|tx| engine.store.list_conflicts(tx)).unwrap();
		assert!(conflicts.is_empty());
	}

	/// Mirrors the delete-propagation scenario: a remote tombstone for a record the client still
	/// has removes the local row outright rather than leaving a deleted-but-present record.
	#[tokio::test]
	async fn pull_removes_local_record_on_remote_tombstone() {
		let transport = FakeTransport::default();
		let id = Uuid::new_v4();
		let mut tombstone = secret_for(id, 2, 1_700_000_200, b"");
		tombstone.deleted = true;
		transport
			.pull_responses
			.lock()
			.unwrap()
			.push(PullResponse { secrets: vec![tombstone], version: 2 });

		let engine = engine_with(transport);
		let now = chrono::Utc::now();
		let local = LocalRecord {
			id,
			record_type: CoreRecordType::Text,
			created_at: now,
			modified_at: now,
			version: 1,
			big_data: false,
			payload: b"still-here".to_vec(),
			dek: b"wrapped".to_vec(),
			deleted: false,
			corrupted: false,
		};
		engine.store.with_transaction(|tx| engine.store.insert(tx, &local)).unwrap();

		engine.sync(SyncOptions { pull_only: true, ..Default::default() }).await.unwrap();

		let stored = engine.store.with_transaction(|tx| engine.store.get_by_id(tx, id)).unwrap();
		assert!(stored.is_none());
	}
}
