//! Dotenv-backed [`TokenStore`] that keeps token lines in an existing `.env` file current.
//!
//! Only the managed keys are rewritten; comments, blank lines, ordering, and every other
//! variable are preserved byte for byte. Missing keys are appended at the end.

// std
use std::path::{Path, PathBuf};
// self
use crate::{
	_prelude::*,
	auth::TokenState,
	store::{self, StoreError, StoreFuture, TokenStore},
};

/// Variable holding the access token.
pub const ACCESS_TOKEN_KEY: &str = "SHOPEE_ACCESS_TOKEN";
/// Variable holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "SHOPEE_REFRESH_TOKEN";
/// Variable holding the access-token expiry as Unix seconds.
pub const EXPIRES_AT_KEY: &str = "SHOPEE_TOKEN_EXPIRES_AT";

/// Persists tokens as quoted `KEY="value"` lines inside a dotenv file.
#[derive(Clone, Debug)]
pub struct EnvFileStore {
	path: PathBuf,
}
impl EnvFileStore {
	/// Creates a store over the dotenv file at `path`.
	pub fn open(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// Location of the dotenv file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_now(&self) -> Result<Option<TokenState>, StoreError> {
		let Some(bytes) = store::read_if_exists(&self.path)? else {
			return Ok(None);
		};
		let text = decode(&self.path, bytes)?;
		let access = lookup(&text, ACCESS_TOKEN_KEY);
		let refresh = lookup(&text, REFRESH_TOKEN_KEY);
		let Some(mut state) = TokenState::seed(access, refresh) else {
			return Ok(None);
		};

		if let Some(raw) = lookup(&text, EXPIRES_AT_KEY) {
			state.expires_at = raw
				.parse::<i64>()
				.ok()
				.and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
				.ok_or_else(|| StoreError::Serialization {
					message: format!(
						"{EXPIRES_AT_KEY} in {} is not a Unix timestamp",
						self.path.display()
					),
				})?;
		}

		Ok(Some(state))
	}

	fn save_now(&self, state: &TokenState) -> Result<(), StoreError> {
		let current = match store::read_if_exists(&self.path)? {
			Some(bytes) => decode(&self.path, bytes)?,
			None => String::new(),
		};
		let refresh = state.refresh_token.as_ref().map(|t| t.expose().to_owned());
		let expires_at = state.expires_at.unix_timestamp().to_string();
		let mut updates = vec![(ACCESS_TOKEN_KEY, Some(state.access_token.expose().to_owned()))];

		updates.push((REFRESH_TOKEN_KEY, refresh));
		updates.push((EXPIRES_AT_KEY, Some(expires_at)));

		let rendered = rewrite(&current, &updates);

		store::write_atomically(&self.path, rendered.as_bytes())
	}
}
impl TokenStore for EnvFileStore {
	fn load(&self) -> StoreFuture<'_, Option<TokenState>> {
		Box::pin(async move { self.load_now() })
	}

	fn save(&self, state: TokenState) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.save_now(&state) })
	}
}

fn decode(path: &Path, bytes: Vec<u8>) -> Result<String, StoreError> {
	String::from_utf8(bytes).map_err(|e| StoreError::Serialization {
		message: format!("{} is not valid UTF-8: {e}", path.display()),
	})
}

/// Splits `line` into key and raw value when it assigns a variable.
fn parse_assignment(line: &str) -> Option<(&str, &str)> {
	let trimmed = line.trim_start();

	if trimmed.starts_with('#') {
		return None;
	}

	let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
	let (key, value) = trimmed.split_once('=')?;

	Some((key.trim(), value.trim()))
}

fn unquote(value: &str) -> &str {
	for quote in ['"', '\''] {
		if let Some(inner) = value.strip_prefix(quote).and_then(|v| v.strip_suffix(quote)) {
			return inner;
		}
	}

	value
}

/// Returns the last non-empty value assigned to `key`.
fn lookup(text: &str, key: &str) -> Option<String> {
	text.lines()
		.filter_map(parse_assignment)
		.filter(|(k, _)| *k == key)
		.map(|(_, v)| unquote(v))
		.filter(|v| !v.is_empty())
		.next_back()
		.map(str::to_owned)
}

/// Rewrites managed keys in place and appends the ones not yet present.
///
/// Keys paired with `None` are left exactly as the file has them.
fn rewrite(text: &str, updates: &[(&str, Option<String>)]) -> String {
	let mut seen = vec![false; updates.len()];
	let mut out = String::with_capacity(text.len() + 128);

	for line in text.lines() {
		let managed = parse_assignment(line).and_then(|(key, _)| {
			updates.iter().position(|(k, value)| *k == key && value.is_some())
		});

		match managed {
			Some(idx) => {
				if let (false, Some(value)) = (seen[idx], &updates[idx].1) {
					seen[idx] = true;

					out.push_str(&render(updates[idx].0, value));
					out.push('\n');
				}
			},
			None => {
				out.push_str(line);
				out.push('\n');
			},
		}
	}

	for (idx, (key, value)) in updates.iter().enumerate() {
		if let (false, Some(value)) = (seen[idx], value) {
			out.push_str(&render(key, value));
			out.push('\n');
		}
	}

	out
}

fn render(key: &str, value: &str) -> String {
	format!("{key}=\"{value}\"")
}
