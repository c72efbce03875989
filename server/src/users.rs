//! The `Users` auxiliary surface (A6): thin `Login`/`Register` RPCs backed by the Argon2id
//! verifier in `keeper-auth-impls::password`.
//!
//! Grounded on `internal/server/usecase/user.go`'s `UserService.Login`/`Register`, minus its
//! `authEngine.GenerateToken` call: per the protocol's own Non-goals, token issuance mechanics
//! (JWT signing, expiry policy) are out of scope here and stay a thin pass-through — a real
//! deployment wanting bearer-token auth mints and verifies tokens via a dedicated identity
//! service, which is exactly what [`keeper_auth_impls::jwt::JWTAuthorizer`] already assumes.

use keeper_api::error::ApiError;
use keeper_api::store::UserDirectory;
use keeper_api::types::{LoginResponse, RegisterResponse};
use keeper_auth_impls::password::{hash_passphrase, verify_passphrase};

/// Verifies `login`/`password` against the stored Argon2id hash and mints an opaque session
/// token. The token carries no claims of its own; it exists only because the sync protocol's
/// External Interfaces section names this RPC, not to replace real bearer-token issuance.
pub(crate) async fn login(
	directory: &dyn UserDirectory, login: &str, password: &str,
) -> Result<LoginResponse, ApiError> {
	let hash = directory
		.password_hash(login)
		.await?
		.ok_or_else(|| ApiError::AuthError(format!("no such user: {}", login)))?;
	let valid = verify_passphrase(password, &hash).map_err(ApiError::AuthError)?;
	if !valid {
		return Err(ApiError::AuthError("incorrect password".to_string()));
	}
	Ok(LoginResponse { token: uuid::Uuid::new_v4().to_string() })
}

/// Registers a new login with an Argon2id verifier of `password`, then mints the same kind of
/// opaque session token [`login`] would return.
pub(crate) async fn register(
	directory: &dyn UserDirectory, login: &str, password: &str,
) -> Result<RegisterResponse, ApiError> {
	let hash = hash_passphrase(password).map_err(ApiError::InvalidRequestError)?;
	directory.register(login, &hash).await?;
	Ok(RegisterResponse { token: uuid::Uuid::new_v4().to_string() })
}

#[cfg(test)]
mod tests {
	use super::*;
	use keeper_impls::in_memory_store::InMemoryBackendImpl;

	#[tokio::test]
	async fn register_then_login_round_trips() {
		let store = InMemoryBackendImpl::new();
		register(&store, "alice", "hunter2").await.unwrap();
		let resp = login(&store, "alice", "hunter2").await.unwrap();
		assert!(!resp.token.is_empty());
	}

	#[tokio::test]
	async fn login_with_wrong_password_fails() {
		let store = InMemoryBackendImpl::new();
		register(&store, "alice", "hunter2").await.unwrap();
		assert!(login(&store, "alice", "wrong").await.is_err());
	}

	#[tokio::test]
	async fn double_registration_is_rejected() {
		let store = InMemoryBackendImpl::new();
		register(&store, "alice", "hunter2").await.unwrap();
		assert!(register(&store, "alice", "hunter3").await.is_err());
	}
}
