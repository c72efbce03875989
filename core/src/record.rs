//! The record model (C5): a tagged union over the four supported secret kinds,
//! plus the encode/decode operations that tie the model to the envelope codec.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec;
use crate::error::VaultError;
use crate::keys::{Dek, MasterKey};

/// Inline payloads above this size must instead be stored as a blob.
pub const INLINE_THRESHOLD_BYTES: u64 = 1024 * 1024;

/// Maximum size of a binary payload, enforced identically client- and server-side
/// (the smaller of the two source limits, adopted uniformly).
pub const MAX_BINARY_BYTES: u64 = 50 * 1024 * 1024;

/// Discriminates the four kinds of secret a record can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordType {
	/// A login/password pair with an optional URL.
	LoginPassword,
	/// Free-form text.
	Text,
	/// Bank card details.
	BankCard,
	/// An arbitrary file, inline or stored as a blob.
	Binary,
}

/// Plaintext login/password entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginPassword {
	/// Human-readable name for the entry.
	pub name: String,
	/// Login/username.
	pub login: String,
	/// Password.
	pub password: String,
	/// Associated URL, if any.
	pub url: String,
}

/// Plaintext free-form text entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
	/// Human-readable name for the entry.
	pub name: String,
	/// The text content.
	pub content: String,
}

/// Plaintext bank card entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankCard {
	/// Human-readable name for the entry.
	pub name: String,
	/// Card number.
	pub card_number: String,
	/// Expiry, as printed on the card (e.g. "09/27").
	pub expiry: String,
	/// Card verification value.
	pub cvv: String,
	/// Cardholder name.
	pub holder_name: String,
	/// Issuing bank name.
	pub bank_name: String,
	/// Card network (e.g. "visa", "mastercard").
	pub card_type: String,
	/// ISO currency code.
	pub currency: String,
	/// Whether this is the user's primary card.
	pub is_primary: bool,
}

/// Plaintext binary entry. `content` is populated only when the record is not
/// `big_data`; large payloads live in the blob store instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Binary {
	/// Original file name.
	pub name: String,
	/// Size in bytes of the decrypted content.
	pub size_bytes: u64,
	/// MIME type, best-effort.
	pub mime_type: String,
	/// Inline content; empty when the payload is stored as a blob.
	pub content: Vec<u8>,
}

/// A decrypted record body, tagged by kind.
#[derive(Debug, Clone)]
pub enum RecordKind {
	/// See [`LoginPassword`].
	LoginPassword(LoginPassword),
	/// See [`Text`].
	Text(Text),
	/// See [`BankCard`].
	BankCard(BankCard),
	/// See [`Binary`].
	Binary(Binary),
}

impl RecordKind {
	/// Returns the tag for this kind.
	pub fn record_type(&self) -> RecordType {
		match self {
			RecordKind::LoginPassword(_) => RecordType::LoginPassword,
			RecordKind::Text(_) => RecordType::Text,
			RecordKind::BankCard(_) => RecordType::BankCard,
			RecordKind::Binary(_) => RecordType::Binary,
		}
	}

	fn to_plaintext_json(&self) -> Result<Vec<u8>, VaultError> {
		let bytes = match self {
			RecordKind::LoginPassword(v) => serde_json::to_vec(v),
			RecordKind::Text(v) => serde_json::to_vec(v),
			RecordKind::BankCard(v) => serde_json::to_vec(v),
			RecordKind::Binary(v) => serde_json::to_vec(v),
		};
		bytes.map_err(|e| VaultError::Internal(format!("failed to serialize record: {}", e)))
	}

	fn from_plaintext_json(record_type: RecordType, data: &[u8]) -> Result<Self, VaultError> {
		let map_err = |e: serde_json::Error| {
			VaultError::DecryptError(format!("malformed plaintext payload: {}", e))
		};
		Ok(match record_type {
			RecordType::LoginPassword => {
				RecordKind::LoginPassword(serde_json::from_slice(data).map_err(map_err)?)
			},
			RecordType::Text => RecordKind::Text(serde_json::from_slice(data).map_err(map_err)?),
			RecordType::BankCard => {
				RecordKind::BankCard(serde_json::from_slice(data).map_err(map_err)?)
			},
			RecordType::Binary => RecordKind::Binary(serde_json::from_slice(data).map_err(map_err)?),
		})
	}
}

/// The atomic synchronized unit. The cleartext body lives only transiently as a
/// [`RecordKind`]; at rest, `payload` is ciphertext and `dek` is the wrapped
/// per-mutation key.
#[derive(Debug, Clone)]
pub struct Record {
	/// Stable, client-generated identifier.
	pub id: Uuid,
	/// Discriminant for the encrypted `payload`.
	pub record_type: RecordType,
	/// Creation time, truncated to the second.
	pub created_at: DateTime<Utc>,
	/// Last modification time, truncated to the second.
	pub modified_at: DateTime<Utc>,
	/// Monotonically increasing version.
	pub version: i32,
	/// Whether the payload lives in the blob store rather than inline.
	pub big_data: bool,
	/// Ciphertext payload (empty when `big_data`; the blob store holds the body).
	pub payload: Vec<u8>,
	/// The per-mutation DEK, wrapped under the master key.
	pub dek: Vec<u8>,
	/// Tombstone marker.
	pub deleted: bool,
	/// Set when a decrypt or integrity check has previously failed for this record.
	pub corrupted: bool,
}

fn truncate_to_second(ts: DateTime<Utc>) -> DateTime<Utc> {
	DateTime::from_timestamp(ts.timestamp(), 0).unwrap_or(ts)
}

impl Record {
	/// Builds a new record for `kind`, generating a fresh DEK and compress-then-encrypting the
	/// plaintext body under it, mirroring the teacher's shared `GzipEncoder(AesEncoder)` used for
	/// both the payload and the DEK wrap. `big_data` controls whether `payload` is left empty for
	/// the caller to populate the blob store instead.
	pub fn seal(
		id: Uuid, kind: &RecordKind, master_key: &MasterKey, big_data: bool, now: DateTime<Utc>,
	) -> Result<(Record, Dek), VaultError> {
		let dek = crate::keys::generate_dek();
		let plaintext = kind.to_plaintext_json()?;
		let payload = if big_data { Vec::new() } else { codec::encode_compressed(&plaintext, &dek)? };
		let wrapped_dek = codec::encode_compressed(&dek, master_key)?;
		let now = truncate_to_second(now);
		let record = Record {
			id,
			record_type: kind.record_type(),
			created_at: now,
			modified_at: now,
			version: 0,
			big_data,
			payload,
			dek: wrapped_dek,
			deleted: false,
			corrupted: false,
		};
		Ok((record, dek))
	}

	/// Compress-then-re-encrypts `kind` under a freshly generated DEK, bumping `modified_at`.
	/// Every mutation must call this rather than reusing the previous DEK.
	pub fn reseal(
		&mut self, kind: &RecordKind, master_key: &MasterKey, now: DateTime<Utc>,
	) -> Result<Dek, VaultError> {
		let dek = crate::keys::generate_dek();
		let plaintext = kind.to_plaintext_json()?;
		self.payload = if self.big_data { Vec::new() } else { codec::encode_compressed(&plaintext, &dek)? };
		self.dek = codec::encode_compressed(&dek, master_key)?;
		self.modified_at = truncate_to_second(now);
		Ok(dek)
	}

	/// Decrypts then decompresses this record's wrapped DEK under the master key.
	pub fn unwrap_dek(&self, master_key: &MasterKey) -> Result<Dek, VaultError> {
		let raw = codec::decode_compressed(&self.dek, master_key)?;
		raw.try_into().map_err(|_| VaultError::FormatError("DEK has unexpected length".to_string()))
	}

	/// Decrypts and decompresses the inline payload, then deserializes it into a [`RecordKind`].
	/// Must not be called when `big_data` is true; the blob store holds that body.
	pub fn decode_inline(&self, master_key: &MasterKey) -> Result<RecordKind, VaultError> {
		if self.big_data {
			return Err(VaultError::Internal(
				"decode_inline called on a big_data record".to_string(),
			));
		}
		let dek = self.unwrap_dek(master_key)?;
		let plaintext = codec::decode_compressed(&self.payload, &dek)?;
		RecordKind::from_plaintext_json(self.record_type, &plaintext)
	}

	/// Decrypts and decompresses a blob body fetched separately (for `big_data` records), using
	/// this record's DEK.
	pub fn decode_blob(&self, master_key: &MasterKey, ciphertext: &[u8]) -> Result<Binary, VaultError> {
		let dek = self.unwrap_dek(master_key)?;
		let plaintext = codec::decode_compressed(ciphertext, &dek)?;
		match RecordKind::from_plaintext_json(RecordType::Binary, &plaintext)? {
			RecordKind::Binary(binary) => Ok(binary),
			_ => unreachable!("big_data records are always Binary"),
		}
	}

	/// Compresses then encrypts a binary blob body under this record's (already wrapped) DEK,
	/// for writing to the blob store.
	pub fn encode_blob(
		&self, master_key: &MasterKey, binary: &Binary,
	) -> Result<Vec<u8>, VaultError> {
		let dek = self.unwrap_dek(master_key)?;
		let plaintext = RecordKind::Binary(binary.clone()).to_plaintext_json()?;
		codec::encode_compressed(&plaintext, &dek)
	}

	/// Returns whether this record's version is newer than the given baseline,
	/// i.e. whether it has unsynced local changes.
	pub fn is_changed(&self, baseline_version: i32) -> bool {
		self.version > baseline_version
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn now() -> DateTime<Utc> {
		DateTime::from_timestamp(1_700_000_000, 0).unwrap()
	}

	#[test]
	fn seal_and_decode_round_trips() {
		let master_key = [1u8; 32];
		let kind = RecordKind::LoginPassword(LoginPassword {
			name: "example".into(),
			login: "alice".into(),
			password: "hunter2".into(),
			url: "https://example.com".into(),
		});
		let (record, _dek) = Record::seal(Uuid::new_v4(), &kind, &master_key, false, now()).unwrap();
		assert_eq!(record.version, 0);
		assert!(!record.big_data);

		match record.decode_inline(&master_key).unwrap() {
			RecordKind::LoginPassword(lp) => assert_eq!(lp.login, "alice"),
			_ => panic!("wrong kind decoded"),
		}
	}

	#[test]
	fn reseal_generates_a_new_dek() {
		let master_key = [2u8; 32];
		let kind = RecordKind::Text(Text { name: "n".into(), content: "v1".into() });
		let (mut record, dek1) =
			Record::seal(Uuid::new_v4(), &kind, &master_key, false, now()).unwrap();

		let kind2 = RecordKind::Text(Text { name: "n".into(), content: "v2".into() });
		let dek2 = record.reseal(&kind2, &master_key, now()).unwrap();
		assert_ne!(dek1, dek2);

		match record.decode_inline(&master_key).unwrap() {
			RecordKind::Text(t) => assert_eq!(t.content, "v2"),
			_ => panic!("wrong kind decoded"),
		}
	}

	#[test]
	fn wrong_master_key_fails_to_unwrap() {
		let master_key = [3u8; 32];
		let other_key = [4u8; 32];
		let kind = RecordKind::Text(Text { name: "n".into(), content: "v".into() });
		let (record, _) = Record::seal(Uuid::new_v4(), &kind, &master_key, false, now()).unwrap();
		assert!(matches!(record.decode_inline(&other_key), Err(VaultError::DecryptError(_))));
	}

	#[test]
	fn is_changed_reflects_version_advance() {
		let master_key = [5u8; 32];
		let kind = RecordKind::Text(Text { name: "n".into(), content: "v".into() });
		let (mut record, _) = Record::seal(Uuid::new_v4(), &kind, &master_key, false, now()).unwrap();
		assert!(!record.is_changed(0));
		record.version = 2;
		assert!(record.is_changed(0));
		assert!(!record.is_changed(2));
	}
}
