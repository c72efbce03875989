use std::error::Error;
use std::fmt::{Display, Formatter};

use keeper_api::error::ApiError;
use keeper_core::VaultError;

/// Errors surfaced by the client-side record store and sync engine.
#[derive(Debug)]
pub enum ClientError {
	/// See [`keeper_core::VaultError`].
	Vault(VaultError),
	/// See [`keeper_api::error::ApiError`], produced by the remote transport.
	Api(ApiError),
	/// The local SQLite database returned an error.
	Storage(String),
	/// A mutation was attempted while unresolved conflicts exist.
	ConflictPending,
	/// The server rejected a push because its version was ahead of ours and `force` was unset.
	VersionConflict,
	/// A binary payload exceeded the maximum allowed size.
	FileTooLarge,
	/// No master key is loaded in the current session.
	NotAuthenticated,
}

impl Display for ClientError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			ClientError::Vault(e) => write!(f, "{}", e),
			ClientError::Api(e) => write!(f, "{}", e),
			ClientError::Storage(msg) => write!(f, "local storage error: {}", msg),
			ClientError::ConflictPending => {
				write!(f, "unresolved conflicts exist; resolve them before mutating records")
			},
			ClientError::VersionConflict => {
				write!(f, "pull first, conflict detected")
			},
			ClientError::FileTooLarge => write!(f, "file exceeds the maximum allowed size"),
			ClientError::NotAuthenticated => write!(f, "no master key loaded for this session"),
		}
	}
}

impl Error for ClientError {}

impl From<VaultError> for ClientError {
	fn from(e: VaultError) -> Self {
		ClientError::Vault(e)
	}
}

impl From<ApiError> for ClientError {
	fn from(e: ApiError) -> Self {
		match e {
			ApiError::VersionConflictError(_) => ClientError::VersionConflict,
			ApiError::FileTooLargeError(_) => ClientError::FileTooLarge,
			other => ClientError::Api(other),
		}
	}
}

impl From<rusqlite::Error> for ClientError {
	fn from(e: rusqlite::Error) -> Self {
		ClientError::Storage(e.to_string())
	}
}
