//! Hosts the wire protocol types and storage-backend contract shared between the
//! keeper client and server.
//!
//! This crate is transport-agnostic: it defines the `prost` message shapes
//! exchanged over the sync protocol, the error taxonomy those messages map onto,
//! the request authorizer trait run ahead of every RPC, and the `SecretStore`
//! trait that any server-side storage backend must implement.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(missing_docs)]

/// Contains interface for authorizer that is run before every request, and its corresponding implementations.
pub mod auth;
/// Length-delimited framing shared by the client and server halves of the streaming RPCs.
pub mod framing;
/// Implements the error type ([`error::ApiError`]) which is eventually converted to [`ErrorResponse`] and returned to the client.
///
/// [`ErrorResponse`]: types::ErrorResponse
pub mod error;

/// Contains the [`store::SecretStore`] interface which must be implemented by every server-side backend.
pub mod store;

#[cfg(any(test, feature = "_test_utils"))]
/// Shared compliance test suite for [`store::SecretStore`] implementations.
pub mod store_tests;

/// Contains the wire request/response types for the sync protocol.
pub mod types;
