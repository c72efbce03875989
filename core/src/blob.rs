//! Filesystem-backed blob store (C2) for large encrypted payloads.
//!
//! Files are named `{id}_{version}[_{variant}]` under a root directory, matching
//! the naming convention observed in the original file provider: no variant
//! segment for the primary copy, an underscore-joined suffix otherwise. The same
//! implementation roots the client (a user data subdirectory) and the server (a
//! configured directory) since both sides need identical atomicity guarantees.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::VaultError;

/// A namespace suffix used to stage a blob body during conflict resolution,
/// e.g. the remote body fetched ahead of a conflict being resolved.
pub const VARIANT_REMOTE_PENDING: &str = "remote-pending";

/// Filesystem-backed implementation of the blob store contract.
#[derive(Debug, Clone)]
pub struct BlobStore {
	root: PathBuf,
}

impl BlobStore {
	/// Opens (creating if necessary) a blob store rooted at `root`.
	pub fn new(root: impl Into<PathBuf>) -> Result<Self, VaultError> {
		let root = root.into();
		fs::create_dir_all(&root)?;
		Ok(Self { root })
	}

	fn path_for(&self, id: Uuid, version: i32, variant: Option<&str>) -> PathBuf {
		let name = match variant {
			Some(variant) => format!("{}_{}_{}", id, version, variant),
			None => format!("{}_{}", id, version),
		};
		self.root.join(name)
	}

	/// Returns whether a blob exists at `(id, version, variant)`.
	pub fn exists(&self, id: Uuid, version: i32, variant: Option<&str>) -> bool {
		self.path_for(id, version, variant).is_file()
	}

	/// Writes `data` as the full contents of the blob at `(id, version, variant)`,
	/// replacing any existing file. Used both for single-shot writes and as the
	/// sink for chunked uploads that buffer in memory before a final flush.
	pub fn write(
		&self, id: Uuid, version: i32, variant: Option<&str>, data: &[u8],
	) -> Result<(), VaultError> {
		let path = self.path_for(id, version, variant);
		fs::write(&path, data)?;
		Ok(())
	}

	/// Appends `chunk` to the blob at `(id, version, variant)`, creating it if
	/// absent. Used while streaming a `Push`/upload operation chunk by chunk.
	pub fn append(
		&self, id: Uuid, version: i32, variant: Option<&str>, chunk: &[u8],
	) -> Result<(), VaultError> {
		use std::io::Write;
		let path = self.path_for(id, version, variant);
		let mut file = fs::OpenOptions::new().create(true).append(true).open(&path)?;
		file.write_all(chunk)?;
		Ok(())
	}

	/// Reads the entire blob at `(id, version, variant)`.
	pub fn read(&self, id: Uuid, version: i32, variant: Option<&str>) -> Result<Vec<u8>, VaultError> {
		let path = self.path_for(id, version, variant);
		fs::read(&path).map_err(VaultError::from)
	}

	/// Removes the blob at `(id, version, variant)`. Not finding the file is not
	/// an error: reconciliation after a delete or a pull may race a prior removal.
	pub fn remove(&self, id: Uuid, version: i32, variant: Option<&str>) -> Result<(), VaultError> {
		let path = self.path_for(id, version, variant);
		match fs::remove_file(&path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(VaultError::from(e)),
		}
	}

	/// Promotes a staged `variant` copy into the primary slot for `(id, version)`:
	/// copy, fsync, remove source. Used when conflict resolution chooses the side
	/// whose body was staged under a variant.
	pub fn promote_variant(
		&self, id: Uuid, version: i32, variant: &str,
	) -> Result<(), VaultError> {
		let src = self.path_for(id, version, Some(variant));
		let dst = self.path_for(id, version, None);
		copy_and_fsync(&src, &dst)?;
		fs::remove_file(&src)?;
		Ok(())
	}

	/// Renames the primary blob for `id` from `old_version` to `new_version`.
	pub fn rename(&self, id: Uuid, old_version: i32, new_version: i32) -> Result<(), VaultError> {
		let src = self.path_for(id, old_version, None);
		let dst = self.path_for(id, new_version, None);
		fs::rename(&src, &dst)?;
		Ok(())
	}
}

fn copy_and_fsync(src: &Path, dst: &Path) -> Result<(), VaultError> {
	fs::copy(src, dst)?;
	let file = fs::File::open(dst)?;
	file.sync_all()?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn write_read_remove_round_trip() {
		let dir = tempdir();
		let store = BlobStore::new(dir.path()).unwrap();
		let id = Uuid::new_v4();

		store.write(id, 1, None, b"hello").unwrap();
		assert!(store.exists(id, 1, None));
		assert_eq!(store.read(id, 1, None).unwrap(), b"hello");

		store.remove(id, 1, None).unwrap();
		assert!(!store.exists(id, 1, None));
	}

	#[test]
	fn remove_of_missing_file_is_not_an_error() {
		let dir = tempdir();
		let store = BlobStore::new(dir.path()).unwrap();
		store.remove(Uuid::new_v4(), 9, None).unwrap();
	}

	#[test]
	fn append_accumulates_chunks() {
		let dir = tempdir();
		let store = BlobStore::new(dir.path()).unwrap();
		let id = Uuid::new_v4();

		store.append(id, 1, None, b"abc").unwrap();
		store.append(id, 1, None, b"def").unwrap();
		assert_eq!(store.read(id, 1, None).unwrap(), b"abcdef");
	}

	#[test]
	fn promote_variant_moves_into_primary_slot() {
		let dir = tempdir();
		let store = BlobStore::new(dir.path()).unwrap();
		let id = Uuid::new_v4();

		store.write(id, 2, Some(VARIANT_REMOTE_PENDING), b"remote body").unwrap();
		store.promote_variant(id, 2, VARIANT_REMOTE_PENDING).unwrap();

		assert!(store.exists(id, 2, None));
		assert!(!store.exists(id, 2, Some(VARIANT_REMOTE_PENDING)));
		assert_eq!(store.read(id, 2, None).unwrap(), b"remote body");
	}

	fn tempdir() -> TempDir {
		TempDir::new()
	}

	struct TempDir(PathBuf);
	impl TempDir {
		fn new() -> Self {
			let mut path = std::env::temp_dir();
			path.push(format!("keeper-core-blob-test-{}", Uuid::new_v4()));
			fs::create_dir_all(&path).unwrap();
			TempDir(path)
		}
		fn path(&self) -> &Path {
			&self.0
		}
	}
	impl Drop for TempDir {
		fn drop(&mut self) {
			let _ = fs::remove_dir_all(&self.0);
		}
	}
}
