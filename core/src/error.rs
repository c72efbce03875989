use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;

/// Errors surfaced by the cryptographic and storage primitives in this crate.
///
/// Variants mirror the failure classes a caller needs to branch on (see the
/// error handling design this crate implements): authentication, decrypt
/// integrity, storage I/O, and plain internal failures.
#[derive(Debug)]
pub enum VaultError {
	/// The passphrase did not derive a usable master key, or no master key is
	/// available in the current context.
	AuthenticationError(String),

	/// An AEAD tag mismatch or truncated ciphertext was encountered while
	/// decrypting a record or blob. Callers should mark the record `corrupted`.
	DecryptError(String),

	/// The ciphertext or wrapped key was shorter than the format requires.
	FormatError(String),

	/// A blob or database I/O operation failed.
	StorageError(String),

	/// An unspecified internal failure, analogous to `VssError::InternalServerError`.
	Internal(String),
}

impl Display for VaultError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			VaultError::AuthenticationError(message) => {
				write!(f, "authentication failed: {}", message)
			},
			VaultError::DecryptError(message) => write!(f, "decryption failed: {}", message),
			VaultError::FormatError(message) => write!(f, "malformed envelope: {}", message),
			VaultError::StorageError(message) => write!(f, "storage error: {}", message),
			VaultError::Internal(message) => write!(f, "internal error: {}", message),
		}
	}
}

impl Error for VaultError {}

impl From<io::Error> for VaultError {
	fn from(err: io::Error) -> Self {
		VaultError::StorageError(err.to_string())
	}
}
