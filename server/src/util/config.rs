use log::LevelFilter;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

const BIND_ADDR_VAR: &str = "KEEPER_BIND_ADDRESS";
const LOG_FILE_VAR: &str = "KEEPER_LOG_FILE";
const LOG_LEVEL_VAR: &str = "KEEPER_LOG_LEVEL";
const AUTH_MODE_VAR: &str = "KEEPER_AUTH_MODE";
const JWT_RSA_PEM_VAR: &str = "KEEPER_JWT_RSA_PEM";
const PSQL_USER_VAR: &str = "KEEPER_PSQL_USERNAME";
const PSQL_PASS_VAR: &str = "KEEPER_PSQL_PASSWORD";
const PSQL_ADDR_VAR: &str = "KEEPER_PSQL_ADDRESS";
const PSQL_KEEPER_DB_VAR: &str = "KEEPER_PSQL_KEEPER_DB";
const PSQL_TLS_VAR: &str = "KEEPER_PSQL_TLS";
const PSQL_CERT_PEM_VAR: &str = "KEEPER_PSQL_CRT_PEM";
const BLOB_ROOT_VAR: &str = "KEEPER_BLOB_ROOT";

// The structure of the toml config file. Any settings specified therein can be overriden by the
// corresponding environment variable.
#[derive(Deserialize, Default)]
struct TomlConfig {
	server_config: Option<ServerConfig>,
	log_config: Option<LogConfig>,
	auth_config: Option<AuthTomlConfig>,
	postgresql_config: Option<PostgreSQLConfig>,
}

#[derive(Deserialize)]
struct ServerConfig {
	bind_address: Option<SocketAddr>,
	blob_root: Option<PathBuf>,
}

#[derive(Deserialize)]
struct AuthTomlConfig {
	mode: Option<String>,
	rsa_pem: Option<String>,
}

#[derive(Deserialize)]
struct PostgreSQLConfig {
	username: Option<String>,
	password: Option<String>,
	address: Option<String>,
	keeper_database: Option<String>,
	tls: Option<TlsConfig>,
}

#[derive(Deserialize)]
struct TlsConfig {
	crt_pem: Option<String>,
}

#[derive(Deserialize)]
struct LogConfig {
	level: Option<String>,
	file: Option<PathBuf>,
}

/// Which [`keeper_api::auth::Authorizer`] the server runs ahead of every request.
pub(crate) enum AuthConfig {
	/// [`keeper_auth_impls::signature::SignatureValidatingAuthorizer`]: the sync protocol's
	/// default, requiring a proof-of-key-knowledge signature on every request.
	Signature,
	/// [`keeper_auth_impls::jwt::JWTAuthorizer`], verifying bearer tokens against `rsa_pem`.
	Jwt { rsa_pem: String },
	/// [`keeper_api::auth::NoopAuthorizer`], for local/offline-only deployments.
	Noop,
}

/// Which [`keeper_api::store::SecretStore`] backend the server persists to.
pub(crate) enum BackendConfig {
	/// An ephemeral in-process backend; state does not survive a restart.
	InMemory,
	/// A PostgreSQL backend, reached over `dsn`, optionally with `ca_cert_pem` for TLS.
	Postgres { dsn: String, ca_cert_pem: Option<String> },
}

// Encapsulates the result of reading both the environment variables and the config file.
pub(crate) struct Configuration {
	pub(crate) bind_address: SocketAddr,
	pub(crate) auth: AuthConfig,
	pub(crate) backend: BackendConfig,
	pub(crate) log_file: PathBuf,
	pub(crate) log_level: LevelFilter,
	/// Root directory for the server-side [`keeper_core::blob::BlobStore`], serving `big_data`
	/// record bodies for `Push`'s `Begin`/`Chunk`/`End` handling and `PullStream`.
	pub(crate) blob_root: PathBuf,
}

#[inline]
fn read_env(env_var: &str) -> Result<Option<String>, String> {
	match std::env::var(env_var) {
		Ok(env) => Ok(Some(env)),
		Err(std::env::VarError::NotPresent) => Ok(None),
		Err(e) => Err(format!("Failed to load the {} environment variable: {}", env_var, e)),
	}
}

#[inline]
fn read_config<T>(env: Option<T>, config: Option<T>) -> Option<T> {
	env.or(config)
}

#[inline]
fn require_config<T: std::fmt::Display>(
	env: Option<T>, config: Option<T>, item: &str, var_name: &str,
) -> Result<T, String> {
	env.or(config).ok_or_else(|| {
		format!(
			"{} must be provided in the configuration file or the environment variable {} must be set.",
			item, var_name
		)
	})
}

pub(crate) fn load_configuration(config_file_path: Option<&str>) -> Result<Configuration, String> {
	let TomlConfig { server_config, log_config, auth_config, postgresql_config } =
		match config_file_path {
			Some(path) => {
				let config_file = std::fs::read_to_string(path)
					.map_err(|e| format!("Failed to read configuration file: {}", e))?;
				toml::from_str(&config_file)
					.map_err(|e| format!("Failed to parse configuration file: {}", e))?
			},
			None => TomlConfig::default(), // All fields are set to `None`
		};

	let (bind_address_config, blob_root_config) = match server_config {
		Some(c) => (c.bind_address, c.blob_root),
		None => (None, None),
	};

	let bind_address_env = read_env(BIND_ADDR_VAR)?
		.map(|addr| {
			addr.parse().map_err(|e| {
				format!("Unable to parse the bind address environment variable: {}", e)
			})
		})
		.transpose()?;
	let bind_address =
		require_config(bind_address_env, bind_address_config, "Server bind address", BIND_ADDR_VAR)?;

	let blob_root_env: Option<PathBuf> = read_env(BLOB_ROOT_VAR)?.map(PathBuf::from);
	let blob_root = read_config(blob_root_env, blob_root_config).unwrap_or_else(|| PathBuf::from("keeper-blobs"));

	let log_level_env: Option<LevelFilter> = read_env(LOG_LEVEL_VAR)?
		.map(|level_str| {
			level_str
				.parse()
				.map_err(|e| format!("Unable to parse the log level environment variable: {}", e))
		})
		.transpose()?;
	let log_level_config: Option<LevelFilter> = log_config
		.as_ref()
		.and_then(|config| config.level.as_ref())
		.map(|level_str| {
			level_str
				.parse()
				.map_err(|e| format!("Unable to parse the log level config variable: {}", e))
		})
		.transpose()?;
	let log_level = log_level_env.or(log_level_config).unwrap_or(LevelFilter::Debug);

	let log_file_env: Option<PathBuf> = read_env(LOG_FILE_VAR)?
		.map(|file_str| {
			file_str
				.parse()
				.map_err(|e| format!("Unable to parse the log file environment variable: {}", e))
		})
		.transpose()?;
	let log_file_config: Option<PathBuf> = log_config.and_then(|config| config.file);
	let log_file = log_file_env.or(log_file_config).unwrap_or(PathBuf::from("keeper-server.log"));

	let auth_mode_env = read_env(AUTH_MODE_VAR)?;
	let rsa_pem_env = read_env(JWT_RSA_PEM_VAR)?;
	let (auth_mode_config, rsa_pem_config) = match auth_config {
		Some(c) => (c.mode, c.rsa_pem),
		None => (None, None),
	};
	let auth_mode = read_config(auth_mode_env, auth_mode_config).unwrap_or_else(|| "signature".to_string());
	let rsa_pem = read_config(rsa_pem_env, rsa_pem_config);
	let auth = match auth_mode.as_str() {
		"signature" => AuthConfig::Signature,
		"noop" => AuthConfig::Noop,
		"jwt" => AuthConfig::Jwt {
			rsa_pem: rsa_pem.ok_or_else(|| {
				format!(
					"auth mode \"jwt\" requires an RSA public key; set {} or [auth_config].rsa_pem",
					JWT_RSA_PEM_VAR
				)
			})?,
		},
		other => return Err(format!("unknown auth mode \"{}\"; expected signature, jwt, or noop", other)),
	};

	let username_env = read_env(PSQL_USER_VAR)?;
	let password_env = read_env(PSQL_PASS_VAR)?;
	let address_env: Option<String> = read_env(PSQL_ADDR_VAR)?;
	let keeper_db_env = read_env(PSQL_KEEPER_DB_VAR)?;
	let tls_config_env = read_env(PSQL_TLS_VAR)?;
	let crt_pem_env = read_env(PSQL_CERT_PEM_VAR)?;

	let (username_config, password_config, address_config, keeper_db_config, tls_config) =
		match postgresql_config {
			Some(c) => (c.username, c.password, c.address, c.keeper_database, c.tls.map(|tls| tls.crt_pem)),
			None => (None, None, None, None, None),
		};

	let address = read_config(address_env, address_config);
	let backend = match address {
		// No PostgreSQL address configured at all: fall back to the ephemeral in-memory
		// backend, suitable for local/offline-only deployments and tests.
		None => BackendConfig::InMemory,
		Some(address) => {
			let username = require_config(
				username_env,
				username_config,
				"PostgreSQL database username",
				PSQL_USER_VAR,
			)?;
			let password = require_config(
				password_env,
				password_config,
				"PostgreSQL database password",
				PSQL_PASS_VAR,
			)?;
			let keeper_db = require_config(
				keeper_db_env,
				keeper_db_config,
				"PostgreSQL keeper database name",
				PSQL_KEEPER_DB_VAR,
			)?;
			let ca_cert_pem =
				crt_pem_env.map(Some).or(tls_config_env.map(|_| None)).or(tls_config).flatten();
			let dsn = format!("postgresql://{}:{}@{}/{}", username, password, address, keeper_db);
			BackendConfig::Postgres { dsn, ca_cert_pem }
		},
	};

	Ok(Configuration { bind_address, auth, backend, log_file, log_level, blob_root })
}
