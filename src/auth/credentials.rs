//! Immutable partner credentials injected into the signer and token manager.

// self
use crate::{
	_prelude::*,
	auth::{PartnerId, ShopId},
	error::ConfigError,
};

/// Partner secret key kept as the exact configured bytes.
///
/// The key is never trimmed, re-encoded, or stripped of its `shpk` prefix; the platform signs
/// with the raw bytes as issued. Formatting implementations redact the value.
#[derive(Clone, PartialEq, Eq)]
pub struct PartnerKey(Vec<u8>);
impl PartnerKey {
	/// Wraps the raw key bytes, rejecting empty keys.
	pub fn new(value: impl Into<Vec<u8>>) -> Result<Self, ConfigError> {
		let bytes = value.into();

		if bytes.is_empty() {
			return Err(ConfigError::EmptyPartnerKey);
		}

		Ok(Self(bytes))
	}

	/// Returns the raw key bytes. Callers must avoid logging them.
	pub fn expose(&self) -> &[u8] {
		&self.0
	}
}
impl TryFrom<String> for PartnerKey {
	type Error = ConfigError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value.into_bytes())
	}
}
impl<'de> Deserialize<'de> for PartnerKey {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;

		Self::try_from(raw).map_err(serde::de::Error::custom)
	}
}
impl Debug for PartnerKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("PartnerKey").field(&"<redacted>").finish()
	}
}

/// Process-wide partner identity plus the shop it acts on.
#[derive(Clone, Debug)]
pub struct Credentials {
	/// Partner (application) identifier.
	pub partner_id: PartnerId,
	/// Partner secret used as the HMAC key.
	pub partner_key: PartnerKey,
	/// Shop the broker manages tokens for.
	pub shop_id: ShopId,
}
impl Credentials {
	/// Builds credentials from already-validated identifiers and raw key bytes.
	pub fn new(
		partner_id: PartnerId,
		partner_key: impl Into<Vec<u8>>,
		shop_id: ShopId,
	) -> Result<Self, ConfigError> {
		Ok(Self { partner_id, partner_key: PartnerKey::new(partner_key)?, shop_id })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn partner_key_keeps_raw_bytes_and_redacts() {
		let key = PartnerKey::new(" shpk0001 ").expect("Non-empty key should be accepted.");

		assert_eq!(key.expose(), b" shpk0001 ");
		assert_eq!(format!("{key:?}"), "PartnerKey(\"<redacted>\")");
		assert!(matches!(PartnerKey::new(""), Err(ConfigError::EmptyPartnerKey)));
	}
}
