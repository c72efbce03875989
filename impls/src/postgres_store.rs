use crate::migrations;
use async_trait::async_trait;
use keeper_api::error::ApiError;
use keeper_api::store::{SecretStore, StoredSecret, UserDirectory};
use keeper_core::record::RecordType;
use native_tls::Certificate;
use postgres_native_tls::MakeTlsConnector;
use std::io;
use tokio::sync::Mutex;
use tokio_postgres::{Client, NoTls, Transaction};
use uuid::Uuid;

const GET_SECRET_QUERY: &str = "SELECT id, created_at, modified_at, big_data, secret_type, payload, dek, version, deleted \
	FROM secret WHERE user_id = $1 AND id = $2 FOR UPDATE";
const GET_ALL_SECRET_QUERY: &str = "SELECT id, created_at, modified_at, big_data, secret_type, payload, dek, version, deleted \
	FROM secret WHERE user_id = $1 AND version > $2 ORDER BY modified_at ASC";
const UPSERT_SECRET_QUERY: &str = "INSERT INTO secret (id, user_id, created_at, modified_at, big_data, secret_type, payload, dek, version, deleted) \
	VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
	ON CONFLICT (id) DO UPDATE SET modified_at = EXCLUDED.modified_at, big_data = EXCLUDED.big_data, \
	secret_type = EXCLUDED.secret_type, payload = EXCLUDED.payload, dek = EXCLUDED.dek, \
	version = EXCLUDED.version, deleted = EXCLUDED.deleted";
const GET_SYNC_STATE_QUERY: &str = "SELECT value FROM sync_state WHERE user_id = $1 FOR UPDATE";
const UPSERT_SYNC_STATE_QUERY: &str = "INSERT INTO sync_state (user_id, value) VALUES ($1, $2) \
	ON CONFLICT (user_id) DO UPDATE SET value = EXCLUDED.value";
const RESOLVE_USER_QUERY: &str = "SELECT id FROM users WHERE login = $1";
const INSERT_USER_QUERY: &str =
	"INSERT INTO users (id, login, password_hash, created_at) VALUES ($1, $2, $3, now())";
const GET_PASSWORD_HASH_QUERY: &str = "SELECT password_hash FROM users WHERE login = $1";

fn record_type_to_column(record_type: RecordType) -> &'static str {
	match record_type {
		RecordType::LoginPassword => "login_password",
		RecordType::Text => "text",
		RecordType::BankCard => "bank_card",
		RecordType::Binary => "binary",
	}
}

fn record_type_from_column(column: &str) -> Result<RecordType, ApiError> {
	match column {
		"login_password" => Ok(RecordType::LoginPassword),
		"text" => Ok(RecordType::Text),
		"bank_card" => Ok(RecordType::BankCard),
		"binary" => Ok(RecordType::Binary),
		other => Err(ApiError::InternalServerError(format!("unknown secret_type column value {}", other))),
	}
}

fn row_to_secret(row: &tokio_postgres::Row) -> Result<StoredSecret, ApiError> {
	let secret_type: String = row.get("secret_type");
	Ok(StoredSecret {
		id: row.get("id"),
		record_type: record_type_from_column(&secret_type)?,
		created_at: row.get("created_at"),
		modified_at: row.get("modified_at"),
		version: row.get("version"),
		big_data: row.get("big_data"),
		payload: row.get("payload"),
		dek: row.get("dek"),
		deleted: row.get("deleted"),
	})
}

async fn resolve_user_id(client: &Client, user: &str) -> Result<Uuid, ApiError> {
	let row = client
		.query_opt(RESOLVE_USER_QUERY, &[&user])
		.await
		.map_err(|e| ApiError::InternalServerError(e.to_string()))?
		.ok_or_else(|| ApiError::AuthError(format!("no such user {}", user)))?;
	Ok(row.get(0))
}

async fn get_sync_state(tx: &Transaction<'_>, user_id: Uuid) -> Result<i32, ApiError> {
	let row = tx
		.query_opt(GET_SYNC_STATE_QUERY, &[&user_id])
		.await
		.map_err(|e| ApiError::InternalServerError(e.to_string()))?;
	Ok(row.map(|r| r.get(0)).unwrap_or(0))
}

/// A [PostgreSQL](https://www.postgresql.org/) based backend implementation for the
/// sync server's [`SecretStore`].
///
/// `tokio_postgres::Client::transaction` takes `&mut self`, so the client is kept
/// behind a [`Mutex`] rather than calling it concurrently over a pool; `apply_push`
/// is the only path that needs exclusive access, and it already serializes on the
/// `sync_state` row lock for a given user.
pub struct PostgresBackendImpl {
	client: Mutex<Client>,
}

impl PostgresBackendImpl {
	/// Connects without transport encryption, for trusted local/test deployments.
	pub async fn connect_plaintext(dsn: &str) -> Result<Self, io::Error> {
		let (client, connection) =
			tokio_postgres::connect(dsn, NoTls).await.map_err(|e| io::Error::other(e.to_string()))?;
		tokio::spawn(async move {
			if let Err(e) = connection.await {
				log::error!("postgres connection closed with error: {}", e);
			}
		});
		let backend = Self { client: Mutex::new(client) };
		backend.ensure_schema().await?;
		Ok(backend)
	}

	/// Connects using TLS, verifying the server certificate against `ca_cert_pem`.
	pub async fn connect_tls(dsn: &str, ca_cert_pem: &[u8]) -> Result<Self, io::Error> {
		let cert = Certificate::from_pem(ca_cert_pem).map_err(|e| io::Error::other(e.to_string()))?;
		let connector = native_tls::TlsConnector::builder()
			.add_root_certificate(cert)
			.build()
			.map_err(|e| io::Error::other(e.to_string()))?;
		let connector = MakeTlsConnector::new(connector);
		let (client, connection) =
			tokio_postgres::connect(dsn, connector).await.map_err(|e| io::Error::other(e.to_string()))?;
		tokio::spawn(async move {
			if let Err(e) = connection.await {
				log::error!("postgres connection closed with error: {}", e);
			}
		});
		let backend = Self { client: Mutex::new(client) };
		backend.ensure_schema().await?;
		Ok(backend)
	}

	/// Bootstraps a fresh database by running every migration in order. Existing
	/// databases (those that already have a `keeper_db_version` table) are left
	/// untouched — there is only one migration generation so far.
	async fn ensure_schema(&self) -> Result<(), io::Error> {
		let client = self.client.lock().await;
		if client.query_opt(migrations::GET_VERSION_STMT, &[]).await.is_ok() {
			return Ok(());
		}
		for statement in migrations::MIGRATIONS {
			client.batch_execute(statement).await.map_err(|e| io::Error::other(e.to_string()))?;
		}
		Ok(())
	}
}

#[async_trait]
impl SecretStore for PostgresBackendImpl {
	async fn get(&self, user: &str, id: Uuid) -> Result<Option<StoredSecret>, ApiError> {
		let client = self.client.lock().await;
		let user_id = resolve_user_id(&client, user).await?;
		let row = client
			.query_opt(GET_SECRET_QUERY, &[&user_id, &id])
			.await
			.map_err(|e| ApiError::InternalServerError(e.to_string()))?;
		row.as_ref().map(row_to_secret).transpose()
	}

	async fn list_since(&self, user: &str, since: i32) -> Result<Vec<StoredSecret>, ApiError> {
		let client = self.client.lock().await;
		let user_id = resolve_user_id(&client, user).await?;
		let rows = client
			.query(GET_ALL_SECRET_QUERY, &[&user_id, &since])
			.await
			.map_err(|e| ApiError::InternalServerError(e.to_string()))?;
		rows.iter().map(row_to_secret).collect()
	}

	async fn current_version(&self, user: &str) -> Result<i32, ApiError> {
		let client = self.client.lock().await;
		let user_id = resolve_user_id(&client, user).await?;
		let row = client
			.query_opt("SELECT value FROM sync_state WHERE user_id = $1", &[&user_id])
			.await
			.map_err(|e| ApiError::InternalServerError(e.to_string()))?;
		Ok(row.map(|r| r.get::<_, i32>(0)).unwrap_or(0))
	}

	async fn apply_push(
		&self, user: &str, expected_prior_version: Option<i32>, writes: Vec<StoredSecret>,
	) -> Result<i32, ApiError> {
		let mut client = self.client.lock().await;
		let user_id = resolve_user_id(&client, user).await?;

		// Holding this lock for the whole batch serializes concurrent pushes for the
		// same user on the compare-and-swap below; `FOR UPDATE` additionally fences
		// against any other connection racing the same row.
		let tx = client.transaction().await.map_err(|e| ApiError::InternalServerError(e.to_string()))?;

		let current = get_sync_state(&tx, user_id).await?;
		if let Some(expected) = expected_prior_version {
			if expected != current {
				return Err(ApiError::VersionConflictError(format!(
					"expected sync_state {} for user {}, found {}",
					expected, user, current
				)));
			}
		}
		let new_version = current + 1;

		for secret in writes {
			tx.execute(
				UPSERT_SECRET_QUERY,
				&[
					&secret.id,
					&user_id,
					&secret.created_at,
					&secret.modified_at,
					&secret.big_data,
					&record_type_to_column(secret.record_type),
					&secret.payload,
					&secret.dek,
					&new_version,
					&secret.deleted,
				],
			)
			.await
			.map_err(|e| ApiError::InternalServerError(e.to_string()))?;
		}

		tx.execute(UPSERT_SYNC_STATE_QUERY, &[&user_id, &new_version])
			.await
			.map_err(|e| ApiError::InternalServerError(e.to_string()))?;

		tx.commit().await.map_err(|e| ApiError::InternalServerError(e.to_string()))?;
		Ok(new_version)
	}

	async fn health_check(&self) -> bool {
		let client = self.client.lock().await;
		client.simple_query("SELECT 1").await.is_ok()
	}
}

#[async_trait]
impl UserDirectory for PostgresBackendImpl {
	async fn register(&self, login: &str, password_hash: &str) -> Result<(), ApiError> {
		let client = self.client.lock().await;
		let id = Uuid::new_v4();
		client
			.execute(INSERT_USER_QUERY, &[&id, &login, &password_hash])
			.await
			.map_err(|e| {
				if e.code() == Some(&tokio_postgres::error::SqlState::UNIQUE_VIOLATION) {
					ApiError::InvalidRequestError(format!("login {} is already registered", login))
				} else {
					ApiError::InternalServerError(e.to_string())
				}
			})?;
		Ok(())
	}

	async fn password_hash(&self, login: &str) -> Result<Option<String>, ApiError> {
		let client = self.client.lock().await;
		let row = client
			.query_opt(GET_PASSWORD_HASH_QUERY, &[&login])
			.await
			.map_err(|e| ApiError::InternalServerError(e.to_string()))?;
		Ok(row.map(|r| r.get(0)))
	}
}
