//! Hosts the sync server: the HTTP entrypoint for the Sync Engine (C8) and the `Users`
//! auxiliary surface, backed by whichever [`keeper_api::store::SecretStore`] and
//! [`keeper_api::auth::Authorizer`] the configuration file/environment selects.
//!
//! The protocol is designed to offer a server-side cloud storage solution for an
//! end-to-end encrypted secrets manager: it stores and synchronizes opaque, already-encrypted
//! record blobs across a user's devices without ever seeing their plaintext.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(missing_docs)]

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal::unix::SignalKind;

use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;

use keeper_api::auth::{Authorizer, NoopAuthorizer};
use keeper_api::store::{SecretStore, UserDirectory};
use keeper_auth_impls::jwt::{DecodingKey, JWTAuthorizer};
use keeper_auth_impls::signature::SignatureValidatingAuthorizer;
use keeper_core::blob::BlobStore;
use keeper_impls::in_memory_store::InMemoryBackendImpl;
use keeper_impls::postgres_store::PostgresBackendImpl;

mod sync_engine;
mod sync_service;
mod tracing;
mod users;
mod util;

use sync_engine::SyncEngine;
use sync_service::{SyncService, SyncServiceConfig};
use util::config::{AuthConfig, BackendConfig, Configuration};

fn main() {
	let args: Vec<String> = std::env::args().collect();
	let config_file_path = args.get(1).map(String::as_str);

	// `log_file` is reserved for a future file-based log sink; `util::logger::init` currently
	// only wires up the `log`-to-`tracing` bridge and level filter.
	let Configuration { bind_address, auth, backend, log_file: _, log_level, blob_root } =
		match util::config::load_configuration(config_file_path) {
			Ok(cfg) => cfg,
			Err(e) => {
				eprintln!("Failed to load configuration: {}", e);
				std::process::exit(1);
			},
		};

	util::logger::init(log_level);
	self::tracing::configure_tracer();

	let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
		Ok(runtime) => Arc::new(runtime),
		Err(e) => {
			eprintln!("Failed to setup tokio runtime: {}", e);
			std::process::exit(-1);
		},
	};

	runtime.block_on(async {
		let mut sigterm_stream = match tokio::signal::unix::signal(SignalKind::terminate()) {
			Ok(stream) => stream,
			Err(e) => {
				eprintln!("Failed to register for SIGTERM stream: {}", e);
				std::process::exit(-1);
			},
		};

		let authorizer: Arc<dyn Authorizer> = match auth {
			AuthConfig::Signature => Arc::new(SignatureValidatingAuthorizer),
			AuthConfig::Noop => Arc::new(NoopAuthorizer {}),
			AuthConfig::Jwt { rsa_pem } => {
				let rsa_public_key = match DecodingKey::from_rsa_pem(rsa_pem.as_bytes()) {
					Ok(key) => key,
					Err(e) => {
						eprintln!("Failed to parse RSA public key: {}", e);
						std::process::exit(-1);
					},
				};
				Arc::new(JWTAuthorizer::new(rsa_public_key).await)
			},
		};

		let (store, directory): (Arc<dyn SecretStore>, Arc<dyn UserDirectory>) = match backend {
			BackendConfig::InMemory => {
				let backend = Arc::new(InMemoryBackendImpl::new());
				(backend.clone(), backend)
			},
			BackendConfig::Postgres { dsn, ca_cert_pem } => {
				let backend = match ca_cert_pem {
					Some(pem) => match PostgresBackendImpl::connect_tls(&dsn, pem.as_bytes()).await {
						Ok(backend) => backend,
						Err(e) => {
							eprintln!("Failed to start postgres tls backend: {}", e);
							std::process::exit(-1);
						},
					},
					None => match PostgresBackendImpl::connect_plaintext(&dsn).await {
						Ok(backend) => backend,
						Err(e) => {
							eprintln!("Failed to start postgres plaintext backend: {}", e);
							std::process::exit(-1);
						},
					},
				};
				let backend = Arc::new(backend);
				(backend.clone(), backend)
			},
		};

		let blobs = match BlobStore::new(blob_root) {
			Ok(blobs) => blobs,
			Err(e) => {
				eprintln!("Failed to open blob store: {}", e);
				std::process::exit(-1);
			},
		};
		let engine = Arc::new(SyncEngine::new(store, blobs));
		let service_config = match SyncServiceConfig::new(1024 * 1024 * 1024) {
			Ok(config) => config,
			Err(e) => {
				eprintln!("Invalid service configuration: {}", e);
				std::process::exit(-1);
			},
		};

		let addr: SocketAddr = bind_address;
		let rest_svc_listener = TcpListener::bind(&addr).await.expect("Failed to bind listening port");
		println!("Listening for incoming connections on {}", addr);
		loop {
			tokio::select! {
				res = rest_svc_listener.accept() => {
					match res {
						Ok((stream, _)) => {
							let io_stream = TokioIo::new(stream);
							let sync_service = SyncService::new(
								Arc::clone(&engine),
								Arc::clone(&directory),
								Arc::clone(&authorizer),
								service_config,
							);
							runtime.spawn(async move {
								if let Err(err) = http1::Builder::new().serve_connection(io_stream, sync_service).await {
									eprintln!("Failed to serve connection: {}", err);
								}
							});
						},
						Err(e) => eprintln!("Failed to accept connection: {}", e),
					}
				}
				_ = tokio::signal::ctrl_c() => {
					println!("Received CTRL-C, shutting down..");
					break;
				}
				_ = sigterm_stream.recv() => {
					println!("Received SIGTERM, shutting down..");
					break;
				}
			}
		}
	});
}
