//! The server-side storage contract (C4): every backend implementation of the
//! sync server must provide a [`SecretStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keeper_core::record::RecordType;
use uuid::Uuid;

use crate::error::ApiError;

/// A server-side row: the authoritative, encrypted copy of a user's record.
#[derive(Debug, Clone)]
pub struct StoredSecret {
	/// The record's stable identifier.
	pub id: Uuid,
	/// See [`RecordType`].
	pub record_type: RecordType,
	/// Creation time, truncated to the second.
	pub created_at: DateTime<Utc>,
	/// Last modification time, truncated to the second.
	pub modified_at: DateTime<Utc>,
	/// The version this row was committed at.
	pub version: i32,
	/// Whether the payload lives in the blob store rather than in `payload`.
	pub big_data: bool,
	/// Ciphertext payload; empty when `big_data`, since the body lives in the blob store
	/// instead, addressed by `(id, version)` exactly as on the client.
	pub payload: Vec<u8>,
	/// The record's DEK, wrapped under the owner's master key.
	pub dek: Vec<u8>,
	/// Tombstone marker.
	pub deleted: bool,
}

/// An interface that must be implemented by every backend implementation of the
/// sync server's record store.
///
/// `apply_push` is the single write path: every record mutation in a batch
/// commits together, under one freshly allocated version, in one transaction
/// that also advances the per-user `sync_state` row. This mirrors computing
/// `new_version = state.value + 1` exactly once per `Push` stream and applying
/// it uniformly, rather than bumping per record.
#[async_trait]
pub trait SecretStore: Send + Sync {
	/// Fetches a single record for `user`, acquiring a row-level lock for the
	/// remainder of the caller's transaction where the backend supports it.
	async fn get(&self, user: &str, id: Uuid) -> Result<Option<StoredSecret>, ApiError>;

	/// Lists every record for `user` with `version > since`, ordered by
	/// `modified_at` ascending.
	async fn list_since(&self, user: &str, since: i32) -> Result<Vec<StoredSecret>, ApiError>;

	/// Returns the current `sync_state` value for `user` (`0` if the user has
	/// never pushed).
	async fn current_version(&self, user: &str) -> Result<i32, ApiError>;

	/// Atomically applies `writes` for `user` under a freshly allocated version,
	/// then advances `sync_state` to that version.
	///
	/// If `expected_prior_version` is `Some(v)`, the write is rejected with
	/// [`ApiError::VersionConflictError`] unless the user's current `sync_state`
	/// is exactly `v` (the row lock is held for the comparison and the write).
	/// `None` bypasses the check, for the `force` path used after a client has
	/// resolved conflicts locally.
	///
	/// Returns the newly committed version.
	async fn apply_push(
		&self, user: &str, expected_prior_version: Option<i32>, writes: Vec<StoredSecret>,
	) -> Result<i32, ApiError>;

	/// Pings the backend for the `HealthCheck` RPC. Never returns an error: an
	/// unreachable backend is reported as `false`, not a failure.
	async fn health_check(&self) -> bool;
}

/// The `Users` auxiliary surface's storage contract (A6): registers a login and its
/// Argon2id verifier, and looks the verifier back up for `Users.Login`.
///
/// Kept separate from [`SecretStore`] since a backend's secret rows are scoped by an
/// already-authenticated `user` token, while this trait is what resolves a login into one.
#[async_trait]
pub trait UserDirectory: Send + Sync {
	/// Stores `password_hash` (an Argon2id PHC string) under `login`. Fails with
	/// [`ApiError::InvalidRequestError`] if `login` is already registered.
	async fn register(&self, login: &str, password_hash: &str) -> Result<(), ApiError>;

	/// Returns the stored Argon2id verifier for `login`, or `None` if no such login exists.
	async fn password_hash(&self, login: &str) -> Result<Option<String>, ApiError>;
}
