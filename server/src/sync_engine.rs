//! The Sync Engine, server half (C8): applies a `Push` stream under one freshly allocated
//! version, and serves `Pull`/`PullStream`/`HealthCheck` reads.
//!
//! Grounded on `internal/server/usecase/sync.go`'s `SyncService` (`ValidateVersion`, `Push`,
//! `Poll`) and `internal/server/interfaces/sync.go`'s per-`OperationType` dispatch
//! (`toDefault`/`toBeginFile`/`toChunk`/`toEndFile`). The Go original streams operations off a
//! gRPC `stream.Recv()` one at a time inside the same database transaction; this transport reads
//! a whole HTTP/1.1 request body before dispatch is possible, so the operations are decoded and
//! assembled into a batch up front and handed to [`SecretStore::apply_push`] as one atomic write,
//! which preserves the "single version bump per push" invariant without needing a live stream.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use keeper_api::error::ApiError;
use keeper_api::store::{SecretStore, StoredSecret};
use keeper_api::types::{
	Chunk, ChunkType, HealthCheckResponse, OperationType, PullResponse, PushOperation, PushResponse,
	RecordType as WireRecordType, Secret, ServerState,
};
use keeper_core::blob::BlobStore;
use keeper_core::record::{MAX_BINARY_BYTES, RecordType};

const STREAM_CHUNK_SIZE: usize = 1024 * 1024;

/// Private staging version for an in-flight `Begin`/`Chunk`/`End` upload: committed versions
/// always start at `1`, so `-1` can never collide with a real row.
const STAGING_VERSION: i32 = -1;

fn wire_to_core_record_type(wire: i32) -> Result<RecordType, ApiError> {
	match WireRecordType::try_from(wire).unwrap_or(WireRecordType::Unknown) {
		WireRecordType::LoginPassword => Ok(RecordType::LoginPassword),
		WireRecordType::Text => Ok(RecordType::Text),
		WireRecordType::BankCard => Ok(RecordType::BankCard),
		WireRecordType::Binary => Ok(RecordType::Binary),
		WireRecordType::Unknown => {
			Err(ApiError::InvalidRequestError("missing or unknown record type".to_string()))
		},
	}
}

fn core_to_wire_record_type(core: RecordType) -> WireRecordType {
	match core {
		RecordType::LoginPassword => WireRecordType::LoginPassword,
		RecordType::Text => WireRecordType::Text,
		RecordType::BankCard => WireRecordType::BankCard,
		RecordType::Binary => WireRecordType::Binary,
	}
}

fn parse_id(id: &str) -> Result<Uuid, ApiError> {
	Uuid::parse_str(id).map_err(|e| ApiError::InvalidRequestError(format!("malformed record id: {}", e)))
}

fn stored_to_secret(stored: &StoredSecret) -> Secret {
	Secret {
		id: stored.id.to_string(),
		modified_at: stored.modified_at.timestamp(),
		record_type: core_to_wire_record_type(stored.record_type) as i32,
		dek: stored.dek.clone().into(),
		data: if stored.big_data { Default::default() } else { stored.payload.clone().into() },
		is_big: stored.big_data,
		version: stored.version,
		deleted: stored.deleted,
	}
}

fn secret_to_stored(secret: &Secret, payload: Vec<u8>, big_data: bool) -> Result<StoredSecret, ApiError> {
	if payload.len() as u64 > MAX_BINARY_BYTES {
		return Err(ApiError::FileTooLargeError(format!(
			"record {} exceeds the maximum allowed size of {} bytes",
			secret.id, MAX_BINARY_BYTES
		)));
	}
	let modified_at: DateTime<Utc> = DateTime::from_timestamp(secret.modified_at, 0)
		.ok_or_else(|| ApiError::InvalidRequestError("malformed modified_at timestamp".to_string()))?;
	Ok(StoredSecret {
		id: parse_id(&secret.id)?,
		record_type: wire_to_core_record_type(secret.record_type)?,
		created_at: Utc::now(),
		modified_at,
		// Overwritten uniformly by `apply_push`; the value here is never read.
		version: 0,
		big_data,
		payload,
		dek: secret.dek.to_vec(),
		deleted: secret.deleted,
	})
}

/// Server-side half of the sync protocol (C8), backed by whichever [`SecretStore`] the process
/// was configured with. `big_data` bodies never touch `store`: they live in `blobs`, addressed
/// by `(id, version)` exactly as on the client, so `StoredSecret::payload` stays empty for them.
pub(crate) struct SyncEngine {
	store: Arc<dyn SecretStore>,
	blobs: BlobStore,
}

impl SyncEngine {
	pub(crate) fn new(store: Arc<dyn SecretStore>, blobs: BlobStore) -> Self {
		Self { store, blobs }
	}

	/// Rejects a push whose `client_version` is behind the server's current `sync_state`,
	/// mirroring `SyncService.ValidateVersion`. Only called when `force` is unset.
	async fn validate_version(&self, user: &str, client_version: i32) -> Result<(), ApiError> {
		let current = self.store.current_version(user).await?;
		if current > client_version {
			return Err(ApiError::VersionConflictError(format!(
				"server is at version {} but client pushed from {}",
				current, client_version
			)));
		}
		Ok(())
	}

	/// Applies every operation in `operations` as one atomic batch, mirroring `SyncService.Push`'s
	/// single `new_version = state.value + 1` bump per stream.
	///
	/// `Begin`/`Chunk` bytes for a `big_data` record are staged into the blob store under
	/// [`STAGING_VERSION`] as they arrive rather than buffered in memory, mirroring the Go
	/// original's `startUploadFile`/`writeChunk` writing straight to disk. Unlike the original
	/// (which already knows the final version before the first byte arrives, since it bumps
	/// `sync_state` at the top of one long-lived transaction), this transport only learns
	/// `new_version` after [`SecretStore::apply_push`] commits, so staged blobs are renamed into
	/// their real `(id, new_version)` slot afterward, and any stale prior-version blob is removed.
	pub(crate) async fn push(
		&self, user: &str, client_version: i32, force: bool, operations: Vec<PushOperation>,
	) -> Result<PushResponse, ApiError> {
		if !force {
			self.validate_version(user, client_version).await?;
		}

		let mut writes = Vec::with_capacity(operations.len());
		let mut uploads_started: HashMap<Uuid, u64> = HashMap::new();
		let mut prior_versions: HashMap<Uuid, i32> = HashMap::new();
		let mut pending_blobs: Vec<Uuid> = Vec::new();

		for op in operations {
			match OperationType::try_from(op.op_type).unwrap_or(OperationType::Unknown) {
				OperationType::Default => {
					let secret = op.secret.ok_or_else(|| {
						ApiError::InvalidRequestError("Default operation missing secret".to_string())
					})?;
					let payload = secret.data.to_vec();
					writes.push(secret_to_stored(&secret, payload, false)?);
				},
				OperationType::Begin => {
					let secret = op.secret.ok_or_else(|| {
						ApiError::InvalidRequestError("Begin operation missing secret".to_string())
					})?;
					let id = parse_id(&secret.id)?;
					if let Some(existing) = self.store.get(user, id).await? {
						prior_versions.insert(id, existing.version);
					}
					self.blobs.write(id, STAGING_VERSION, None, &[])?;
					uploads_started.insert(id, 0);
				},
				OperationType::Chunk => {
					let id = parse_id(&op.id)?;
					let written = uploads_started.get_mut(&id).ok_or_else(|| {
						ApiError::InvalidRequestError(format!(
							"Chunk operation for {} with no preceding Begin",
							op.id
						))
					})?;
					if *written + op.buffer.len() as u64 > MAX_BINARY_BYTES {
						return Err(ApiError::FileTooLargeError(format!(
							"record {} exceeds the maximum allowed size of {} bytes",
							op.id, MAX_BINARY_BYTES
						)));
					}
					self.blobs.append(id, STAGING_VERSION, None, &op.buffer)?;
					*written += op.buffer.len() as u64;
				},
				OperationType::End => {
					let secret = op.secret.ok_or_else(|| {
						ApiError::InvalidRequestError("End operation missing secret".to_string())
					})?;
					let id = parse_id(&secret.id)?;
					uploads_started.remove(&id).ok_or_else(|| {
						ApiError::InvalidRequestError(format!(
							"End operation for {} with no preceding Begin",
							secret.id
						))
					})?;
					writes.push(secret_to_stored(&secret, Vec::new(), true)?);
					pending_blobs.push(id);
				},
				OperationType::Unknown => {
					return Err(ApiError::InvalidRequestError("unknown push operation type".to_string()));
				},
			}
		}

		let expected_prior_version = if force { None } else { Some(client_version) };
		let new_version = self.store.apply_push(user, expected_prior_version, writes).await?;

		for id in pending_blobs {
			self.blobs.rename(id, STAGING_VERSION, new_version)?;
			if let Some(&prior_version) = prior_versions.get(&id) {
				if prior_version != new_version {
					self.blobs.remove(id, prior_version, None)?;
				}
			}
		}

		Ok(PushResponse { success: true })
	}

	/// Serves the unary `Pull` RPC, mirroring `SyncService.Poll`.
	pub(crate) async fn pull(&self, user: &str, since: i32) -> Result<PullResponse, ApiError> {
		let rows = self.store.list_since(user, since).await?;
		let version = self.store.current_version(user).await?;
		Ok(PullResponse { secrets: rows.iter().map(stored_to_secret).collect(), version })
	}

	/// Serves `PullStream`, chunking the stored payload into 1 MiB frames, mirroring the Go
	/// original's `shared.MB`-sized read buffer.
	pub(crate) async fn pull_stream(
		&self, user: &str, id: &str, version: i32,
	) -> Result<Vec<Chunk>, ApiError> {
		let uuid = parse_id(id)?;
		let stored = self
			.store
			.get(user, uuid)
			.await?
			.ok_or_else(|| ApiError::NoSuchRecordError(format!("no such record: {}", id)))?;
		if stored.version != version {
			return Err(ApiError::NoSuchRecordError(format!(
				"record {} is no longer at version {}",
				id, version
			)));
		}

		let body = if stored.big_data { self.blobs.read(uuid, version, None)? } else { stored.payload };

		let mut chunks: Vec<Chunk> = body
			.chunks(STREAM_CHUNK_SIZE)
			.map(|part| Chunk {
				id: id.to_string(),
				chunk_type: ChunkType::FilePart as i32,
				buffer: part.to_vec().into(),
			})
			.collect();
		chunks.push(Chunk { id: id.to_string(), chunk_type: ChunkType::EndData as i32, buffer: Default::default() });
		Ok(chunks)
	}

	/// Serves the auxiliary `HealthCheck` RPC.
	pub(crate) async fn health_check(&self) -> HealthCheckResponse {
		let state = if self.store.health_check().await { ServerState::Healthy } else { ServerState::NotHealthy };
		HealthCheckResponse { state: state as i32 }
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use keeper_impls::in_memory_store::InMemoryBackendImpl;

	fn test_engine() -> SyncEngine {
		let root = std::env::temp_dir().join(format!("keeper-sync-engine-test-{}", Uuid::new_v4()));
		SyncEngine::new(Arc::new(InMemoryBackendImpl::new()), BlobStore::new(root).unwrap())
	}

	fn secret(id: Uuid, modified_at: i64, version: i32) -> Secret {
		Secret {
			id: id.to_string(),
			modified_at,
			record_type: WireRecordType::Text as i32,
			dek: vec![1, 2, 3].into(),
			data: b"hello".to_vec().into(),
			is_big: false,
			version,
			deleted: false,
		}
	}

	#[tokio::test]
	async fn push_then_pull_round_trips() {
		let engine = test_engine();
		let id = Uuid::new_v4();
		let op = PushOperation {
			op_type: OperationType::Default as i32,
			secret: Some(secret(id, 1000, 0)),
			id: String::new(),
			buffer: Default::default(),
		};

		let resp = engine.push("alice", 0, false, vec![op]).await.unwrap();
		assert!(resp.success);

		let pulled = engine.pull("alice", 0).await.unwrap();
		assert_eq!(pulled.version, 1);
		assert_eq!(pulled.secrets.len(), 1);
		assert_eq!(pulled.secrets[0].id, id.to_string());
	}

	#[tokio::test]
	async fn push_rejects_stale_version_without_force() {
		let engine = test_engine();
		let id = Uuid::new_v4();
		let op = PushOperation {
			op_type: OperationType::Default as i32,
			secret: Some(secret(id, 1000, 0)),
			id: String::new(),
			buffer: Default::default(),
		};
		engine.push("alice", 0, false, vec![op.clone()]).await.unwrap();

		let err = engine.push("alice", 0, false, vec![op]).await.unwrap_err();
		assert!(matches!(err, ApiError::VersionConflictError(_)));
	}

	#[tokio::test]
	async fn begin_chunk_end_assembles_big_data() {
		let engine = test_engine();
		let id = Uuid::new_v4();
		let ops = vec![
			PushOperation {
				op_type: OperationType::Begin as i32,
				secret: Some(Secret { id: id.to_string(), ..Default::default() }),
				id: String::new(),
				buffer: Default::default(),
			},
			PushOperation {
				op_type: OperationType::Chunk as i32,
				secret: None,
				id: id.to_string(),
				buffer: b"part-one-".to_vec().into(),
			},
			PushOperation {
				op_type: OperationType::Chunk as i32,
				secret: None,
				id: id.to_string(),
				buffer: b"part-two".to_vec().into(),
			},
			PushOperation {
				op_type: OperationType::End as i32,
				secret: Some(secret(id, 2000, 0)),
				id: String::new(),
				buffer: Default::default(),
			},
		];

		engine.push("alice", 0, false, ops).await.unwrap();
		let pulled = engine.pull("alice", 0).await.unwrap();
		assert_eq!(pulled.secrets.len(), 1);
		assert!(pulled.secrets[0].is_big);

		let chunks = engine.pull_stream("alice", &id.to_string(), 1).await.unwrap();
		let body: Vec<u8> = chunks
			.iter()
			.filter(|c| c.chunk_type == ChunkType::FilePart as i32)
			.flat_map(|c| c.buffer.to_vec())
			.collect();
		assert_eq!(body, b"part-one-part-two");
	}

	#[tokio::test]
	async fn chunk_without_begin_is_rejected() {
		let engine = test_engine();
		let op = PushOperation {
			op_type: OperationType::Chunk as i32,
			secret: None,
			id: Uuid::new_v4().to_string(),
			buffer: b"orphaned".to_vec().into(),
		};
		let err = engine.push("alice", 0, false, vec![op]).await.unwrap_err();
		assert!(matches!(err, ApiError::InvalidRequestError(_)));
	}
}
