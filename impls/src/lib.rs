//! Hosts [`SecretStore`] implementations for various backends.
//!
//! [`SecretStore`]: keeper_api::store::SecretStore

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(missing_docs)]

mod migrations;
/// An in-memory backend, useful for local/offline-only deployments and tests.
pub mod in_memory_store;
/// Contains [PostgreSQL](https://www.postgresql.org/) based backend implementation.
pub mod postgres_store;
