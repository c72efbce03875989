//! Authenticated encryption and optional compression of byte payloads.
//!
//! The wire format produced by [`encode`] is `nonce || ciphertext || tag`, exactly
//! as AES-GCM's `Seal`/`Open` conventions produce when the nonce is prepended to
//! the output by the caller. A 256-bit key is required; both the user's master key
//! and a per-mutation DEK are 32 bytes.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use crate::error::VaultError;

const NONCE_LEN: usize = 12;

/// Encrypts `plaintext` under `key` (must be 32 bytes) using AES-256-GCM with a
/// fresh random nonce, returning `nonce || ciphertext || tag`.
pub fn encode(plaintext: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, VaultError> {
	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
	let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
	let ciphertext = cipher
		.encrypt(&nonce, plaintext)
		.map_err(|e| VaultError::Internal(format!("encryption failed: {}", e)))?;
	let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
	out.extend_from_slice(nonce.as_slice());
	out.extend_from_slice(&ciphertext);
	Ok(out)
}

/// Reverses [`encode`], failing with [`VaultError::DecryptError`] on tag mismatch
/// and [`VaultError::FormatError`] if `data` is shorter than a nonce.
pub fn decode(data: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, VaultError> {
	if data.len() < NONCE_LEN {
		return Err(VaultError::FormatError("ciphertext shorter than nonce".to_string()));
	}
	let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
	let nonce = Nonce::from_slice(nonce_bytes);
	cipher
		.decrypt(nonce, ciphertext)
		.map_err(|_| VaultError::DecryptError("AEAD tag verification failed".to_string()))
}

/// Deflate-compresses `plaintext` and then encrypts it, mirroring the teacher's
/// gzip-then-encrypt decorator (`crypto.NewGzipEncoder(crypto.NewAesEncoder())`). The record
/// model (C5) uses this, not plain [`encode`], for every payload it seals — the record's JSON
/// body and its wrapped DEK alike — since the original wires one shared encoder/decoder pair
/// across both call sites rather than skipping compression for small entries.
pub fn encode_compressed(plaintext: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, VaultError> {
	let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
	encoder.write_all(plaintext)?;
	let compressed = encoder.finish()?;
	encode(&compressed, key)
}

/// Reverses [`encode_compressed`]: decrypts then inflates.
pub fn decode_compressed(data: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, VaultError> {
	let compressed = decode(data, key)?;
	let mut decoder = GzDecoder::new(compressed.as_slice());
	let mut out = Vec::new();
	decoder.read_to_end(&mut out)?;
	Ok(out)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_plain() {
		let key = [7u8; 32];
		let plaintext = b"hunter2".to_vec();
		let ciphertext = encode(&plaintext, &key).unwrap();
		assert_ne!(ciphertext[NONCE_LEN..], plaintext[..]);
		let decoded = decode(&ciphertext, &key).unwrap();
		assert_eq!(decoded, plaintext);
	}

	#[test]
	fn round_trips_compressed() {
		let key = [9u8; 32];
		let plaintext = vec![b'a'; 4096];
		let ciphertext = encode_compressed(&plaintext, &key).unwrap();
		assert!(ciphertext.len() < plaintext.len());
		let decoded = decode_compressed(&ciphertext, &key).unwrap();
		assert_eq!(decoded, plaintext);
	}

	#[test]
	fn rejects_truncated_ciphertext() {
		let key = [1u8; 32];
		assert!(matches!(decode(&[1, 2, 3], &key), Err(VaultError::FormatError(_))));
	}

	#[test]
	fn rejects_tampered_tag() {
		let key = [3u8; 32];
		let mut ciphertext = encode(b"secret", &key).unwrap();
		let last = ciphertext.len() - 1;
		ciphertext[last] ^= 0xFF;
		assert!(matches!(decode(&ciphertext, &key), Err(VaultError::DecryptError(_))));
	}

	#[test]
	fn distinct_nonces_per_call() {
		let key = [5u8; 32];
		let a = encode(b"same", &key).unwrap();
		let b = encode(b"same", &key).unwrap();
		assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
	}
}
