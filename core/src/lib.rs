//! Hosts the cryptographic and storage primitives shared by the keeper client and server.
//!
//! This crate provides the envelope codec (authenticated encryption with optional
//! compression), the record model for the four supported secret kinds, the
//! filesystem blob store used for large payloads, and the version bookkeeping
//! type shared by both sides of synchronization.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(missing_docs)]

pub mod blob;
pub mod codec;
pub mod error;
pub mod ids;
pub mod keys;
pub mod record;
pub mod sync_state;

pub use error::VaultError;
