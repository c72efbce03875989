//! Local identity bootstrap (C7 ambient surface): registers and unlocks the one local user that
//! owns a client database, and records which remote server `Sync` currently targets.
//!
//! Grounded on `internal/cli/app/user_service.go`'s `Register`/`Auth`. The Go original hashes the
//! unlock passphrase with a bespoke PBKDF2-like scheme (`shared.Hash`) purely for local
//! authentication, and separately derives the AEAD key via `sha256.Sum256`. This crate unifies the
//! local-authentication hash onto the same Argon2id verifier used server-side (`keeper_auth_impls
//! ::password`) while keeping the AEAD key derivation identical
//! ([`keeper_core::keys::derive_master_key`]): neither change touches wire compatibility, since
//! both are purely local concerns.

use keeper_core::keys::{derive_master_key, MasterKey};

use crate::error::ClientError;
use crate::store::{LocalUser, RecordStore};

/// Registers a new local identity under `username` (typically the machine hostname), storing an
/// Argon2id verifier for `passphrase`. Fails if a local user already exists: a client database
/// holds exactly one local identity, mirroring the Go original's single-row `users` table.
pub fn register(store: &RecordStore, username: &str, passphrase: &str) -> Result<(), ClientError> {
	store.with_transaction(|tx| {
		if store.get_user_by_username(tx, username)?.is_some() {
			return Err(ClientError::Storage(format!("user {} is already registered locally", username)));
		}
		let password_hash = keeper_auth_impls::password::hash_passphrase(passphrase)
			.map_err(ClientError::Storage)?;
		store.insert_user(
			tx,
			&LocalUser { id: uuid::Uuid::new_v4(), username: username.to_string(), password_hash },
		)
	})
}

/// Verifies `passphrase` against the stored local identity for `username` and, on success,
/// returns the master key used to unwrap every record's DEK for the remainder of the session.
pub fn unlock(store: &RecordStore, username: &str, passphrase: &str) -> Result<MasterKey, ClientError> {
	let user = store
		.with_transaction(|tx| store.get_user_by_username(tx, username))?
		.ok_or(ClientError::NotAuthenticated)?;

	let valid = keeper_auth_impls::password::verify_passphrase(passphrase, &user.password_hash)
		.map_err(ClientError::Storage)?;
	if !valid {
		return Err(ClientError::NotAuthenticated);
	}
	Ok(derive_master_key(passphrase))
}

/// Registers a remote server this client can reach, making it the active target for `Sync`.
pub fn add_server(
	store: &RecordStore, address: &str, login: &str, password: &str,
) -> Result<i64, ClientError> {
	store.with_transaction(|tx| {
		let id = store.insert_server(tx, address, login, password, false)?;
		store.set_active_server(tx, id)?;
		Ok(id)
	})
}

/// Returns the server `Sync` currently targets, if one has been configured.
pub fn active_server(store: &RecordStore) -> Result<Option<crate::store::RemoteServer>, ClientError> {
	store.with_transaction(|tx| store.get_active_server(tx))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn register_then_unlock_round_trips() {
		let store = RecordStore::open_in_memory().unwrap();
		register(&store, "laptop", "hunter2").unwrap();

		let key = unlock(&store, "laptop", "hunter2").unwrap();
		assert_eq!(key, derive_master_key("hunter2"));
	}

	#[test]
	fn unlock_with_wrong_passphrase_fails() {
		let store = RecordStore::open_in_memory().unwrap();
		register(&store, "laptop", "hunter2").unwrap();
		assert!(matches!(unlock(&store, "laptop", "wrong"), Err(ClientError::NotAuthenticated)));
	}

	#[test]
	fn double_registration_is_rejected() {
		let store = RecordStore::open_in_memory().unwrap();
		register(&store, "laptop", "hunter2").unwrap();
		assert!(register(&store, "laptop", "hunter3").is_err());
	}

	#[test]
	fn active_server_round_trips() {
		let store = RecordStore::open_in_memory().unwrap();
		assert!(active_server(&store).unwrap().is_none());
		add_server(&store, "https://keeper.example.com", "laptop", "hunter2").unwrap();
		let server = active_server(&store).unwrap().unwrap();
		assert_eq!(server.address, "https://keeper.example.com");
		assert!(server.active);
	}
}
