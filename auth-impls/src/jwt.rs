//! Hosts a bearer-token [`Authorizer`] implementation that verifies a JWT signed with an RSA
//! private key held by a separate identity service (the `Users` auxiliary surface), trusting
//! only the corresponding RSA public key baked into the server's configuration.
//!
//! [`Authorizer`]: keeper_api::auth::Authorizer

use async_trait::async_trait;
use keeper_api::auth::{AuthResponse, Authorizer};
use keeper_api::error::ApiError;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::sha2::Sha256;
use rsa::signature::Verifier;
use rsa::{pkcs1v15::Signature, pkcs1v15::VerifyingKey, RsaPublicKey};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

const AUTH_HEADER: &str = "authorization";
const BEARER_PREFIX: &str = "Bearer ";

/// The decoded RSA public key used to verify bearer tokens, loaded once at startup.
///
/// A thin wrapper rather than a bare `RsaPublicKey` so callers don't need to depend on `rsa`
/// directly just to load a PEM file.
pub struct DecodingKey(RsaPublicKey);

impl DecodingKey {
	/// Parses a PKCS#1 RSA public key PEM, as produced by `openssl rsa -pubout` for a matching
	/// private key held by the identity service that mints tokens.
	pub fn from_rsa_pem(pem: &[u8]) -> Result<Self, String> {
		let pem_str = std::str::from_utf8(pem).map_err(|e| e.to_string())?;
		RsaPublicKey::from_pkcs1_pem(pem_str)
			.or_else(|_| RsaPublicKey::from_public_key_pem(pem_str))
			.map(Self)
			.map_err(|e| e.to_string())
	}
}

/// Claims carried by a bearer token: the authenticated user's identity and an expiry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
	/// The user's login/hostname identifier, used as the `user_token` for storage scoping.
	pub sub: String,
	/// Seconds since the Unix epoch after which the token must be rejected.
	pub exp: u64,
}

/// An authorizer that trusts any request carrying a bearer token whose payload decodes to valid
/// [`Claims`] and whose signature verifies against the configured RSA public key.
///
/// Unlike [`SignatureValidatingAuthorizer`](crate::signature::SignatureValidatingAuthorizer),
/// which authenticates every request independently via a proof of key knowledge, this authorizer
/// defers identity verification to whatever issued the token (the `Users.Login`/`Users.Register`
/// auxiliary RPCs backed by [`crate::password`]), and only checks the signature and expiry here.
pub struct JWTAuthorizer {
	verifying_key: VerifyingKey<Sha256>,
}

impl JWTAuthorizer {
	/// Builds an authorizer that verifies tokens against `decoding_key`.
	pub async fn new(decoding_key: DecodingKey) -> Self {
		Self { verifying_key: VerifyingKey::new(decoding_key.0) }
	}
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, ApiError> {
	use base64::Engine;
	base64::engine::general_purpose::URL_SAFE_NO_PAD
		.decode(segment)
		.map_err(|e| ApiError::AuthError(format!("token segment is not valid base64: {}", e)))
}

#[async_trait]
impl Authorizer for JWTAuthorizer {
	async fn verify(&self, headers_map: &HashMap<String, String>) -> Result<AuthResponse, ApiError> {
		let header = headers_map
			.get(AUTH_HEADER)
			.ok_or_else(|| ApiError::AuthError("Authorization header not found.".to_string()))?;
		let token = header
			.strip_prefix(BEARER_PREFIX)
			.ok_or_else(|| ApiError::AuthError("Authorization header is not a bearer token.".to_string()))?;

		let mut parts = token.split('.');
		let (header_b64, payload_b64, sig_b64) =
			match (parts.next(), parts.next(), parts.next(), parts.next()) {
				(Some(h), Some(p), Some(s), None) => (h, p, s),
				_ => return Err(ApiError::AuthError("token is not three dot-separated segments".to_string())),
			};

		let signed_message = format!("{}.{}", header_b64, payload_b64);
		let signature_bytes = decode_segment(sig_b64)?;
		let signature = Signature::try_from(signature_bytes.as_slice())
			.map_err(|e| ApiError::AuthError(format!("malformed signature: {}", e)))?;
		self.verifying_key
			.verify(signed_message.as_bytes(), &signature)
			.map_err(|_| ApiError::AuthError("token signature verification failed".to_string()))?;

		let payload_bytes = decode_segment(payload_b64)?;
		let claims: Claims = serde_json::from_slice(&payload_bytes)
			.map_err(|e| ApiError::AuthError(format!("malformed token claims: {}", e)))?;

		let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
		if claims.exp < now {
			return Err(ApiError::AuthError("token has expired".to_string()));
		}

		Ok(AuthResponse { user_token: claims.sub })
	}
}
