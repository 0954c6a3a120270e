//! Request path canonicalization.

// self
use crate::{_prelude::*, error::SigningError};

/// Fixed API version prefix every signed path carries.
pub const API_PREFIX: &str = "/api/v2";

/// Returns the canonical form of `path`, prepending [`API_PREFIX`] when it is absent.
///
/// Canonicalization is idempotent: feeding a canonical path back in returns it unchanged.
/// A missing leading `/` is tolerated (`auth/token/get` → `/api/v2/auth/token/get`).
pub fn canonical_path(path: &str) -> Result<Cow<'_, str>, SigningError> {
	if path.is_empty() || path == "/" {
		return Err(SigningError::EmptyPath);
	}
	if has_api_prefix(path) {
		return Ok(Cow::Borrowed(path));
	}

	Ok(if path.starts_with('/') {
		Cow::Owned(format!("{API_PREFIX}{path}"))
	} else {
		Cow::Owned(format!("{API_PREFIX}/{path}"))
	})
}

fn has_api_prefix(path: &str) -> bool {
	path.strip_prefix(API_PREFIX).is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn prefix_is_added_once() {
		assert_eq!(
			canonical_path("/auth/token/get").expect("Path should canonicalize."),
			"/api/v2/auth/token/get"
		);
		assert_eq!(
			canonical_path("auth/token/get").expect("Relative path should canonicalize."),
			"/api/v2/auth/token/get"
		);
		assert!(matches!(
			canonical_path("/api/v2/auth/token/get").expect("Canonical path should pass through."),
			Cow::Borrowed("/api/v2/auth/token/get")
		));
	}

	#[test]
	fn lookalike_prefixes_are_not_mistaken_for_the_version() {
		assert_eq!(
			canonical_path("/api/v2x/item").expect("Lookalike path should canonicalize."),
			"/api/v2/api/v2x/item"
		);
	}

	#[test]
	fn empty_paths_fail_fast() {
		assert_eq!(canonical_path(""), Err(SigningError::EmptyPath));
		assert_eq!(canonical_path("/"), Err(SigningError::EmptyPath));
	}
}
