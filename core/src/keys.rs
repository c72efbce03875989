//! Master key derivation and per-mutation data-encryption keys (DEKs).
//!
//! The master key is derived as `SHA-256(passphrase)`, never persisted, and used
//! only to wrap/unwrap per-record DEKs. It is distinct from the Argon2id
//! passphrase verifier used for local/remote authentication (see `keeper-auth-impls`),
//! which never touches the master key material.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// A 256-bit data-encryption key, generated fresh for every record mutation.
pub type Dek = [u8; 32];

/// A 256-bit key-encryption key derived from the user's passphrase.
pub type MasterKey = [u8; 32];

/// Derives the master key from a user-supplied passphrase.
///
/// This is a one-way derivation with no stored salt: the same passphrase always
/// derives the same master key, which is required so every client a user logs
/// into can unwrap the same DEKs without a key-exchange step.
pub fn derive_master_key(passphrase: &str) -> MasterKey {
	let mut hasher = Sha256::new();
	hasher.update(passphrase.as_bytes());
	hasher.finalize().into()
}

/// Generates a new random DEK. Called once per mutation; DEKs are never reused
/// across versions of the same record.
pub fn generate_dek() -> Dek {
	let mut dek = [0u8; 32];
	rand::thread_rng().fill_bytes(&mut dek);
	dek
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn derivation_is_deterministic() {
		assert_eq!(derive_master_key("hunter2"), derive_master_key("hunter2"));
		assert_ne!(derive_master_key("hunter2"), derive_master_key("hunter3"));
	}

	#[test]
	fn deks_are_not_reused() {
		let a = generate_dek();
		let b = generate_dek();
		assert_ne!(a, b);
	}
}
