use keeper_api::error::ApiError;
use keeper_api::store::{SecretStore, StoredSecret, UserDirectory};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct State {
	secrets: BTreeMap<(String, Uuid), StoredSecret>,
	versions: BTreeMap<String, i32>,
	users: BTreeMap<String, String>,
}

/// In-memory implementation of the [`SecretStore`], useful for local/offline-only
/// deployments and tests.
pub struct InMemoryBackendImpl {
	state: Mutex<State>,
}

impl Default for InMemoryBackendImpl {
	fn default() -> Self {
		Self::new()
	}
}

impl InMemoryBackendImpl {
	/// Creates an empty in-memory instance.
	pub fn new() -> Self {
		Self { state: Mutex::new(State::default()) }
	}
}

#[async_trait]
impl SecretStore for InMemoryBackendImpl {
	async fn get(&self, user: &str, id: Uuid) -> Result<Option<StoredSecret>, ApiError> {
		let state = self.state.lock().await;
		Ok(state.secrets.get(&(user.to_string(), id)).cloned())
	}

	async fn list_since(&self, user: &str, since: i32) -> Result<Vec<StoredSecret>, ApiError> {
		let state = self.state.lock().await;
		let mut items: Vec<StoredSecret> = state
			.secrets
			.iter()
			.filter(|((u, _), s)| u == user && s.version > since)
			.map(|(_, s)| s.clone())
			.collect();
		items.sort_by_key(|s| s.modified_at);
		Ok(items)
	}

	async fn current_version(&self, user: &str) -> Result<i32, ApiError> {
		let state = self.state.lock().await;
		Ok(state.versions.get(user).copied().unwrap_or(0))
	}

	async fn apply_push(
		&self, user: &str, expected_prior_version: Option<i32>, writes: Vec<StoredSecret>,
	) -> Result<i32, ApiError> {
		let mut state = self.state.lock().await;
		let current = state.versions.get(user).copied().unwrap_or(0);

		if let Some(expected) = expected_prior_version {
			if expected != current {
				return Err(ApiError::VersionConflictError(format!(
					"expected sync_state {} for user {}, found {}",
					expected, user, current
				)));
			}
		}

		let new_version = current + 1;
		for mut secret in writes {
			secret.version = new_version;
			state.secrets.insert((user.to_string(), secret.id), secret);
		}
		state.versions.insert(user.to_string(), new_version);
		Ok(new_version)
	}

	async fn health_check(&self) -> bool {
		true
	}
}

#[async_trait]
impl UserDirectory for InMemoryBackendImpl {
	async fn register(&self, login: &str, password_hash: &str) -> Result<(), ApiError> {
		let mut state = self.state.lock().await;
		if state.users.contains_key(login) {
			return Err(ApiError::InvalidRequestError(format!("login {} is already registered", login)));
		}
		state.users.insert(login.to_string(), password_hash.to_string());
		Ok(())
	}

	async fn password_hash(&self, login: &str) -> Result<Option<String>, ApiError> {
		let state = self.state.lock().await;
		Ok(state.users.get(login).cloned())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use keeper_api::define_secret_store_tests;

	define_secret_store_tests!(
		InMemorySecretStoreTest,
		InMemoryBackendImpl,
		InMemoryBackendImpl::new()
	);
}
