use crate::error::ApiError;
use crate::store::{SecretStore, StoredSecret};
use chrono::Utc;
use keeper_core::record::RecordType;
use uuid::Uuid;

/// Defines a `SecretStoreTestSuite` instantiation, analogous to the VSS-style
/// `define_kv_store_tests!` macro: call with a unique module name, the store
/// type, and an expression that constructs a fresh instance, and every
/// compliance test below is registered as a `#[tokio::test]`.
#[macro_export]
macro_rules! define_secret_store_tests {
	($test_suite_name:ident, $store_type:path, $create_store_expr:expr) => {
		use $crate::store_tests::SecretStoreTestSuite;
		struct $test_suite_name;

		#[async_trait::async_trait]
		impl SecretStoreTestSuite for $test_suite_name {
			type Store = $store_type;

			async fn create_store() -> Self::Store {
				$create_store_expr
			}
		}

		macro_rules! create_test {
			($test_fn:ident) => {
				#[tokio::test]
				async fn $test_fn() -> Result<(), $crate::error::ApiError> {
					$test_suite_name::$test_fn().await?;
					Ok(())
				}
			};
		}

		create_test!(push_assigns_one_version_to_the_whole_batch);
		create_test!(push_rejects_stale_expected_version);
		create_test!(push_force_ignores_expected_version);
		create_test!(list_since_only_returns_newer_records);
		create_test!(get_returns_none_for_unknown_id);
		create_test!(delete_is_a_tombstone_not_a_removal);
	};
}

fn sample_secret(id: Uuid) -> StoredSecret {
	let now = Utc::now();
	StoredSecret {
		id,
		record_type: RecordType::Text,
		created_at: now,
		modified_at: now,
		version: 0,
		big_data: false,
		payload: b"ciphertext".to_vec(),
		dek: b"wrapped-dek".to_vec(),
		deleted: false,
	}
}

/// Compliance tests that any [`SecretStore`] implementation must pass.
#[allow(missing_docs)]
#[async_trait::async_trait]
pub trait SecretStoreTestSuite {
	/// The store type under test.
	type Store: SecretStore + 'static;

	/// Builds a fresh, empty instance of the store.
	async fn create_store() -> Self::Store;

	async fn push_assigns_one_version_to_the_whole_batch() -> Result<(), ApiError> {
		let store = Self::create_store().await;
		let user = "user-1";
		let a = sample_secret(Uuid::new_v4());
		let b = sample_secret(Uuid::new_v4());

		let new_version = store.apply_push(user, Some(0), vec![a.clone(), b.clone()]).await?;
		assert_eq!(new_version, 1);

		let stored_a = store.get(user, a.id).await?.expect("a present");
		let stored_b = store.get(user, b.id).await?.expect("b present");
		assert_eq!(stored_a.version, 1);
		assert_eq!(stored_b.version, 1);
		assert_eq!(store.current_version(user).await?, 1);
		Ok(())
	}

	async fn push_rejects_stale_expected_version() -> Result<(), ApiError> {
		let store = Self::create_store().await;
		let user = "user-2";
		store.apply_push(user, Some(0), vec![sample_secret(Uuid::new_v4())]).await?;

		let result = store.apply_push(user, Some(0), vec![sample_secret(Uuid::new_v4())]).await;
		assert!(matches!(result, Err(ApiError::VersionConflictError(_))));
		assert_eq!(store.current_version(user).await?, 1);
		Ok(())
	}

	async fn push_force_ignores_expected_version() -> Result<(), ApiError> {
		let store = Self::create_store().await;
		let user = "user-3";
		store.apply_push(user, Some(0), vec![sample_secret(Uuid::new_v4())]).await?;

		let new_version = store.apply_push(user, None, vec![sample_secret(Uuid::new_v4())]).await?;
		assert_eq!(new_version, 2);
		Ok(())
	}

	async fn list_since_only_returns_newer_records() -> Result<(), ApiError> {
		let store = Self::create_store().await;
		let user = "user-4";
		let a = sample_secret(Uuid::new_v4());
		store.apply_push(user, Some(0), vec![a]).await?;

		let b = sample_secret(Uuid::new_v4());
		store.apply_push(user, Some(1), vec![b.clone()]).await?;

		let since_one = store.list_since(user, 1).await?;
		assert_eq!(since_one.len(), 1);
		assert_eq!(since_one[0].id, b.id);

		let since_zero = store.list_since(user, 0).await?;
		assert_eq!(since_zero.len(), 2);
		Ok(())
	}

	async fn get_returns_none_for_unknown_id() -> Result<(), ApiError> {
		let store = Self::create_store().await;
		assert!(store.get("user-5", Uuid::new_v4()).await?.is_none());
		Ok(())
	}

	async fn delete_is_a_tombstone_not_a_removal() -> Result<(), ApiError> {
		let store = Self::create_store().await;
		let user = "user-6";
		let mut secret = sample_secret(Uuid::new_v4());
		store.apply_push(user, Some(0), vec![secret.clone()]).await?;

		secret.deleted = true;
		store.apply_push(user, Some(1), vec![secret.clone()]).await?;

		let fetched = store.get(user, secret.id).await?.expect("tombstone still present");
		assert!(fetched.deleted);
		assert_eq!(fetched.version, 2);
		Ok(())
	}
}
