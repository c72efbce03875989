//! Record mutation surface (C7's local half): `create`/`update`/`delete`, each gated by
//! [`RecordStore::conflict_exists`], each re-deriving a fresh DEK via [`keeper_core::record::Record`],
//! each bumping the record's local `version`.
//!
//! Grounded on the original `DataManager`'s `Create*`/`Update*`/`Delete` methods
//! (`internal/cli/app/data_manager.go`), generalized from its per-type struct-of-optional-fields
//! shape to Rust's [`RecordKind`] tagged union: one `create`/`update` rather than one method per
//! record type.

use chrono::Utc;
use uuid::Uuid;

use keeper_core::blob::BlobStore;
use keeper_core::ids::new_record_id;
use keeper_core::keys::MasterKey;
use keeper_core::record::{Record, RecordKind, MAX_BINARY_BYTES};

use crate::error::ClientError;
use crate::store::{LocalRecord, RecordStore};

/// Rejects the mutation with [`ClientError::ConflictPending`] if any conflict row exists,
/// otherwise runs `f`. Every entry point in this module calls this first, inside the same
/// transaction the mutation itself runs in, so a conflict materialized concurrently by a sync
/// cannot race past this check.
fn guard_no_conflicts<F, T>(store: &RecordStore, f: F) -> Result<T, ClientError>
where
	F: FnOnce(&rusqlite::Transaction) -> Result<T, ClientError>,
{
	store.with_transaction(|tx| {
		if store.conflict_exists(tx)? {
			return Err(ClientError::ConflictPending);
		}
		f(tx)
	})
}

/// Creates a new record holding `kind`, returning its generated id.
///
/// `big_data` carries the plaintext body for a binary record whose size exceeds
/// [`keeper_core::record::INLINE_THRESHOLD_BYTES`]; the caller is responsible for having made
/// that inline-vs-blob decision (mirroring the CLI's own `read-binary-file` size check) before
/// calling this. When `big_data` is `Some`, the body is enforced against
/// [`MAX_BINARY_BYTES`] and written to `blobs` under the record's freshly assigned version before
/// the record row is inserted, so a crash between the two never leaves a visible row with a
/// missing blob.
pub fn create(
	store: &RecordStore, blobs: &BlobStore, master_key: &MasterKey, kind: RecordKind,
	big_data: Option<&[u8]>,
) -> Result<Uuid, ClientError> {
	if let Some(body) = big_data {
		if body.len() as u64 > MAX_BINARY_BYTES {
			return Err(ClientError::FileTooLarge);
		}
	}

	let id = new_record_id();
	guard_no_conflicts(store, |tx| {
		let now = Utc::now();
		let (mut record, _dek) = Record::seal(id, &kind, master_key, big_data.is_some(), now)?;
		// A freshly created record is already the first local mutation in its history: it must
		// carry a version greater than the zero-valued sync state so it is selected for the next
		// push (see `RecordStore::get_all_with_version_greater_than`), matching the S1 scenario's
		// `record.version == 1` observed before any sync has run.
		record.version = 1;

		if let Some(body) = big_data {
			let ciphertext = record.encode_blob(master_key, &plaintext_binary(&kind, body)?)?;
			blobs.write(id, record.version, None, &ciphertext)?;
		}
		store.insert(tx, &LocalRecord::from_sealed(record))
	})?;
	Ok(id)
}

/// Replaces the plaintext body of an existing, non-deleted record with `kind`, generating a fresh
/// DEK and bumping its version. `big_data` behaves as in [`create`]; a pre-existing blob body is
/// removed only after the new version's body (if any) has been written, so a crash mid-update
/// never leaves neither version's body on disk.
pub fn update(
	store: &RecordStore, blobs: &BlobStore, master_key: &MasterKey, id: Uuid, kind: RecordKind,
	big_data: Option<&[u8]>,
) -> Result<(), ClientError> {
	if let Some(body) = big_data {
		if body.len() as u64 > MAX_BINARY_BYTES {
			return Err(ClientError::FileTooLarge);
		}
	}

	guard_no_conflicts(store, |tx| {
		let local = store
			.get_by_id(tx, id)?
			.filter(|r| !r.deleted)
			.ok_or_else(|| ClientError::Storage(format!("no such record: {}", id)))?;

		let mut core = local.as_core();
		let previous_version = core.version;
		core.reseal(&kind, master_key, Utc::now())?;
		core.version = previous_version + 1;
		core.big_data = big_data.is_some();

		if let Some(body) = big_data {
			let ciphertext = core.encode_blob(master_key, &plaintext_binary(&kind, body)?)?;
			blobs.write(id, core.version, None, &ciphertext)?;
		}
		if local.big_data {
			blobs.remove(id, previous_version, None)?;
		}

		store.update(tx, &LocalRecord::from_sealed(core))
	})
}

/// Tombstones an existing record: `deleted = true`, version bumped, any blob body removed.
/// Physical row removal is reserved for pull reconciliation once the tombstone has propagated
/// (see [`RecordStore::remove`]).
pub fn delete(store: &RecordStore, blobs: &BlobStore, id: Uuid) -> Result<(), ClientError> {
	guard_no_conflicts(store, |tx| {
		let mut local = store
			.get_by_id(tx, id)?
			.ok_or_else(|| ClientError::Storage(format!("no such record: {}", id)))?;
		if local.deleted {
			return Ok(());
		}
		if local.big_data {
			blobs.remove(id, local.version, None)?;
		}
		local.deleted = true;
		local.version += 1;
		local.modified_at = Utc::now();
		store.update(tx, &local)
	})
}

fn plaintext_binary(
	kind: &RecordKind, body: &[u8],
) -> Result<keeper_core::record::Binary, ClientError> {
	match kind {
		RecordKind::Binary(binary) => {
			let mut binary = binary.clone();
			binary.content = Vec::new();
			binary.size_bytes = body.len() as u64;
			Ok(keeper_core::record::Binary { content: body.to_vec(), ..binary })
		},
		_ => Err(ClientError::Storage("big_data is only valid for Binary records".to_string())),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use keeper_core::keys::derive_master_key;
	use keeper_core::record::{LoginPassword, Text};

	fn setup() -> (RecordStore, BlobStore, MasterKey) {
		let store = RecordStore::open_in_memory().unwrap();
		let blobs =
			BlobStore::new(std::env::temp_dir().join(format!("keeper-mutate-test-{}", Uuid::new_v4())))
				.unwrap();
		(store, blobs, derive_master_key("hunter2"))
	}

	#[test]
	fn create_assigns_version_one() {
		let (store, blobs, key) = setup();
		let kind = RecordKind::LoginPassword(LoginPassword {
			name: "Test".into(),
			login: "Login".into(),
			password: "Pass".into(),
			url: "http:".into(),
		});
		let id = create(&store, &blobs, &key, kind, None).unwrap();

		let record = store.with_transaction(|tx| store.get_by_id(tx, id)).unwrap().unwrap();
		assert_eq!(record.version, 1);
		match record.as_core().decode_inline(&key).unwrap() {
			RecordKind::LoginPassword(lp) => assert_eq!(lp.login, "Login"),
			_ => panic!("wrong kind decoded"),
		}
	}

	#[test]
	fn update_bumps_version_and_rewraps_dek() {
		let (store, blobs, key) = setup();
		let kind = RecordKind::Text(Text { name: "n".into(), content: "v1".into() });
		let id = create(&store, &blobs, &key, kind, None).unwrap();
		let before = store.with_transaction(|tx| store.get_by_id(tx, id)).unwrap().unwrap();

		let kind2 = RecordKind::Text(Text { name: "n".into(), content: "v2".into() });
		update(&store, &blobs, &key, id, kind2, None).unwrap();

		let after = store.with_transaction(|tx| store.get_by_id(tx, id)).unwrap().unwrap();
		assert_eq!(after.version, 2);
		assert_ne!(after.dek, before.dek);
		match after.as_core().decode_inline(&key).unwrap() {
			RecordKind::Text(t) => assert_eq!(t.content, "v2"),
			_ => panic!("wrong kind decoded"),
		}
	}

	#[test]
	fn delete_tombstones_and_bumps_version() {
		let (store, blobs, key) = setup();
		let kind = RecordKind::Text(Text { name: "n".into(), content: "v".into() });
		let id = create(&store, &blobs, &key, kind, None).unwrap();

		delete(&store, &blobs, id).unwrap();

		let after = store.with_transaction(|tx| store.get_by_id(tx, id)).unwrap().unwrap();
		assert!(after.deleted);
		assert_eq!(after.version, 2);
	}

	#[test]
	fn mutation_is_rejected_while_a_conflict_exists() {
		let (store, blobs, key) = setup();
		let kind = RecordKind::Text(Text { name: "n".into(), content: "v".into() });
		let id = create(&store, &blobs, &key, kind, None).unwrap();

		let local = store.with_transaction(|tx| store.get_by_id(tx, id)).unwrap().unwrap();
		store
			.with_transaction(|tx| {
				store.insert_conflict(
					tx,
					id,
					&crate::store::ConflictSnapshot::from(&local),
					&crate::store::ConflictSnapshot::from(&local),
				)?;
				Ok(())
			})
			.unwrap();

		let kind2 = RecordKind::Text(Text { name: "n".into(), content: "v2".into() });
		assert!(matches!(
			update(&store, &blobs, &key, id, kind2, None),
			Err(ClientError::ConflictPending)
		));
		assert!(matches!(delete(&store, &blobs, id), Err(ClientError::ConflictPending)));

		let kind3 = RecordKind::Text(Text { name: "n2".into(), content: "v".into() });
		assert!(matches!(
			create(&store, &blobs, &key, kind3, None),
			Err(ClientError::ConflictPending)
		));
	}

	#[test]
	fn oversized_binary_is_rejected_before_any_write() {
		let (store, blobs, key) = setup();
		let kind = RecordKind::Binary(keeper_core::record::Binary {
			name: "big.bin".into(),
			size_bytes: 0,
			mime_type: "application/octet-stream".into(),
			content: Vec::new(),
		});
		let oversized = vec![0u8; (MAX_BINARY_BYTES + 1) as usize];
		assert!(matches!(
			create(&store, &blobs, &key, kind, Some(&oversized)),
			Err(ClientError::FileTooLarge)
		));
	}
}
