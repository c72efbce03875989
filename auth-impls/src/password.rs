//! Argon2id passphrase verifier, used by the `Users` auxiliary surface (local client bootstrap
//! and the server's `Login`/`Register` RPCs) to authenticate a passphrase without ever handling
//! the AEAD master key, which is derived separately (`keeper_core::keys::derive_master_key`) and
//! never leaves the client process.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;

/// Hashes `passphrase` with a freshly generated salt, returning a self-describing PHC string
/// suitable for storage in the `password_hash` column.
pub fn hash_passphrase(passphrase: &str) -> Result<String, String> {
	let salt = SaltString::generate(&mut OsRng);
	Argon2::default()
		.hash_password(passphrase.as_bytes(), &salt)
		.map(|hash| hash.to_string())
		.map_err(|e| e.to_string())
}

/// Verifies `passphrase` against a previously stored PHC hash string.
pub fn verify_passphrase(passphrase: &str, stored_hash: &str) -> Result<bool, String> {
	let parsed_hash = PasswordHash::new(stored_hash).map_err(|e| e.to_string())?;
	Ok(Argon2::default().verify_password(passphrase.as_bytes(), &parsed_hash).is_ok())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_correct_passphrase() {
		let hash = hash_passphrase("hunter2").unwrap();
		assert!(verify_passphrase("hunter2", &hash).unwrap());
	}

	#[test]
	fn rejects_wrong_passphrase() {
		let hash = hash_passphrase("hunter2").unwrap();
		assert!(!verify_passphrase("wrong", &hash).unwrap());
	}

	#[test]
	fn hashes_are_salted_distinctly() {
		let a = hash_passphrase("hunter2").unwrap();
		let b = hash_passphrase("hunter2").unwrap();
		assert_ne!(a, b);
	}
}
