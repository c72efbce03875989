pub(crate) const DB_VERSION_COLUMN: &str = "db_version";
#[cfg(test)]
pub(crate) const MIGRATION_LOG_COLUMN: &str = "upgrade_from";

pub(crate) const CHECK_DB_STMT: &str = "SELECT 1 FROM pg_database WHERE datname = $1";
pub(crate) const INIT_DB_CMD: &str = "CREATE DATABASE";
#[cfg(test)]
const DROP_DB_CMD: &str = "DROP DATABASE";
pub(crate) const GET_VERSION_STMT: &str = "SELECT db_version FROM keeper_db_version;";
pub(crate) const UPDATE_VERSION_STMT: &str = "UPDATE keeper_db_version SET db_version=$1;";
pub(crate) const LOG_MIGRATION_STMT: &str = "INSERT INTO keeper_db_upgrades VALUES($1);";
#[cfg(test)]
pub(crate) const GET_MIGRATION_LOG_STMT: &str = "SELECT upgrade_from FROM keeper_db_upgrades;";

// APPEND-ONLY list of migration statements
//
// Each statement MUST be applied in-order, and only once per database.
pub(crate) const MIGRATIONS: &[&str] = &[
	"CREATE TABLE keeper_db_version (db_version INTEGER);",
	"INSERT INTO keeper_db_version VALUES(1);",
	// A write-only log of all the migrations performed on this database, useful for debugging and testing
	"CREATE TABLE keeper_db_upgrades (upgrade_from INTEGER);",
	"CREATE TABLE IF NOT EXISTS users (
	    id uuid PRIMARY KEY,
	    login character varying(320) NOT NULL UNIQUE,
	    password_hash character varying(255) NOT NULL,
	    created_at TIMESTAMP WITH TIME ZONE NOT NULL
	);",
	"CREATE TABLE IF NOT EXISTS sync_state (
	    user_id uuid PRIMARY KEY REFERENCES users (id),
	    value INTEGER NOT NULL DEFAULT 0
	);",
	"CREATE TABLE IF NOT EXISTS secret (
	    id uuid PRIMARY KEY,
	    user_id uuid NOT NULL REFERENCES users (id),
	    created_at TIMESTAMP WITH TIME ZONE NOT NULL,
	    modified_at TIMESTAMP WITH TIME ZONE NOT NULL,
	    secret_type character varying(32) NOT NULL,
	    big_data boolean NOT NULL,
	    payload bytea NOT NULL,
	    dek bytea NOT NULL,
	    version INTEGER NOT NULL,
	    deleted boolean NOT NULL DEFAULT false
	);",
	"CREATE INDEX IF NOT EXISTS secret_user_version_idx ON secret (user_id, version);",
];
#[cfg(test)]
const DUMMY_MIGRATION: &str = "SELECT 1 WHERE FALSE;";
