//! Persisted access/refresh token pair and expiry helpers.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

/// Freshness of a [`TokenState`] relative to an instant and safety margin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token stays valid beyond the safety margin.
	Valid,
	/// Token is still valid but inside the safety margin.
	ExpiringSoon,
	/// Token reached its expiry instant.
	Expired,
}

/// Access/refresh token pair plus absolute expiry, persisted as a small cache record.
///
/// The expiry serializes as Unix epoch seconds so the record matches the
/// `{access_token, refresh_token, expires_at}` layout other tooling reads.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenState {
	/// Access token authorizing shop-scoped calls.
	pub access_token: TokenSecret,
	/// Refresh token used to mint the next access token.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
	/// Absolute expiry instant of the access token.
	#[serde(with = "time::serde::timestamp")]
	pub expires_at: OffsetDateTime,
}
impl TokenState {
	/// Lifetime assumed when the token endpoint omits `expire_in`.
	pub const DEFAULT_LIFETIME: Duration = Duration::hours(4);

	/// Creates a state with an absolute expiry instant.
	pub fn new(
		access_token: impl Into<String>,
		refresh_token: Option<String>,
		expires_at: OffsetDateTime,
	) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: refresh_token.map(TokenSecret::new),
			expires_at,
		}
	}

	/// Creates a state that expires `lifetime` after `issued_at`.
	pub fn issued(
		access_token: impl Into<String>,
		refresh_token: Option<String>,
		issued_at: OffsetDateTime,
		lifetime: Duration,
	) -> Self {
		Self::new(access_token, refresh_token, issued_at + lifetime)
	}

	/// Creates a seed state whose expiry is unknown; it is treated as already expired.
	pub fn seed(access_token: Option<String>, refresh_token: Option<String>) -> Option<Self> {
		if access_token.is_none() && refresh_token.is_none() {
			return None;
		}

		Some(Self::new(access_token.unwrap_or_default(), refresh_token, OffsetDateTime::UNIX_EPOCH))
	}

	/// Computes the freshness status at `instant` using the provided safety margin.
	pub fn status_at(&self, instant: OffsetDateTime, margin: Duration) -> TokenStatus {
		if self.access_token.is_empty() || instant >= self.expires_at {
			return TokenStatus::Expired;
		}
		if instant + margin >= self.expires_at {
			return TokenStatus::ExpiringSoon;
		}

		TokenStatus::Valid
	}

	/// Returns `true` when the access token must be refreshed before use.
	pub fn needs_refresh_at(&self, instant: OffsetDateTime, margin: Duration) -> bool {
		!matches!(self.status_at(instant, margin), TokenStatus::Valid)
	}

	/// Returns the refresh token when it is present and non-empty.
	pub fn usable_refresh_token(&self) -> Option<&TokenSecret> {
		self.refresh_token.as_ref().filter(|secret| !secret.is_empty())
	}
}
impl Debug for TokenState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenState")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
