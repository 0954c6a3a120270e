//! File-backed [`TokenStore`] holding one JSON record.

// std
use std::path::{Path, PathBuf};
// self
use crate::{
	_prelude::*,
	auth::TokenState,
	store::{self, StoreError, StoreFuture, TokenStore},
};

/// Persists the token record as `{access_token, refresh_token, expires_at}` JSON.
///
/// Every save rewrites the whole file atomically, so a crash mid-write leaves the previous record
/// intact. Reads go to disk each time, so an operator can drop in a fresh record between runs.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
}
impl FileStore {
	/// Creates a store at the provided path; the file is created on first save.
	pub fn open(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// Location of the record.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_now(&self) -> Result<Option<TokenState>, StoreError> {
		let Some(bytes) = store::read_if_exists(&self.path)? else {
			return Ok(None);
		};

		if bytes.iter().all(u8::is_ascii_whitespace) {
			return Ok(None);
		}

		let de = &mut serde_json::Deserializer::from_slice(&bytes);

		serde_path_to_error::deserialize(de).map(Some).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", self.path.display()),
		})
	}

	fn save_now(&self, state: &TokenState) -> Result<(), StoreError> {
		let serialized = serde_json::to_vec_pretty(state).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize token record: {e}"),
		})?;

		store::write_atomically(&self.path, &serialized)
	}
}
impl TokenStore for FileStore {
	fn load(&self) -> StoreFuture<'_, Option<TokenState>> {
		Box::pin(async move { self.load_now() })
	}

	fn save(&self, state: TokenState) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.save_now(&state) })
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, fs, process};
	// crates.io
	use tokio::runtime::Runtime;
	// self
	use super::*;

	fn temp_path() -> PathBuf {
		let unique = format!(
			"shopee_broker_file_store_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	#[test]
	fn save_and_reload_round_trip() {
		let path = temp_path();
		let store = FileStore::open(&path);
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");
		let expires_at =
			OffsetDateTime::from_unix_timestamp(1_764_986_400).expect("Fixture instant is valid.");
		let state = TokenState::new("access-token", Some("refresh-token".into()), expires_at);

		assert_eq!(rt.block_on(store.load()).expect("Missing file should load."), None);

		rt.block_on(store.save(state.clone())).expect("Failed to save fixture record.");

		let reopened = FileStore::open(&path);
		let fetched = rt
			.block_on(reopened.load())
			.expect("Failed to load fixture record.")
			.expect("File store lost record after reopen.");

		assert_eq!(fetched, state);
		assert!(!PathBuf::from(format!("{}.tmp", path.display())).exists());

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store record {}: {e}", path.display())
		});
	}

	#[test]
	fn corrupt_record_is_a_serialization_error() {
		let path = temp_path();

		fs::write(&path, b"{\"access_token\": 42}").expect("Failed to write corrupt fixture.");

		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");
		let err = rt
			.block_on(FileStore::open(&path).load())
			.expect_err("Corrupt record should not load.");

		assert!(matches!(err, StoreError::Serialization { .. }));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store record {}: {e}", path.display())
		});
	}
}
