//! The keeper CLI's client-side runtime: a local Record Store (C3) and a Sync Engine (C7) that
//! pushes/pulls against a sync server over the wire types in `keeper_api`.
//!
//! This crate has no CLI of its own; it is the library a CLI binary wires up to a terminal UI or
//! command parser, mirroring how `internal/cli/app` sits beneath the Go original's Cobra commands.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(missing_docs)]

/// Maps local/API errors onto one client-facing error type.
pub mod error;
/// `create`/`update`/`delete` mutation surface, gated by conflict-pending (C7's local half).
pub mod mutate;
/// The local SQLite-backed Record Store (C3).
pub mod store;
/// The push/pull Sync Engine (C7) and conflict resolution.
pub mod sync;
/// HTTP transport to the sync server (C6 wire types over the teacher's `hyper` stack).
pub mod transport;
/// Local identity bootstrap and remote server bookkeeping.
pub mod user;

pub use error::ClientError;
