//! Hosts [`Authorizer`] implementations for the sync server, plus the standalone
//! passphrase verifier used by the CLI's local user bootstrap.
//!
//! [`Authorizer`]: keeper_api::auth::Authorizer

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(missing_docs)]

#[cfg(feature = "jwt")]
pub mod jwt;

#[cfg(feature = "password")]
pub mod password;

#[cfg(feature = "sigs")]
pub mod signature;
