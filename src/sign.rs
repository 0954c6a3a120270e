//! HMAC-SHA256 request signing for the two platform endpoint classes.
//!
//! Public/auth endpoints (authorization-code exchange, token refresh, shop authorization links)
//! sign `partner_id ‖ path ‖ timestamp`. Shop-scoped endpoints append the access token and shop
//! id: `partner_id ‖ path ‖ timestamp ‖ access_token ‖ shop_id`. Paths are canonicalized with
//! the `/api/v2` prefix before signing, and the partner key is used as raw bytes.

pub mod path;

pub use path::*;

// crates.io
use hmac::{Hmac, Mac};
use sha2::Sha256;
// self
use crate::{
	_prelude::*,
	auth::{Credentials, PartnerId, ShopId, TokenSecret},
	error::SigningError,
};

type HmacSha256 = Hmac<Sha256>;

/// Selects which base-string layout a signature uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointClass<'a> {
	/// Partner-level endpoints; access token and shop id never enter the signature.
	Public,
	/// Shop-level data endpoints authorized by an access token.
	ShopScoped {
		/// Access token transmitted with the call.
		access_token: &'a str,
		/// Shop the call targets.
		shop_id: ShopId,
	},
}
impl EndpointClass<'_> {
	/// Returns a stable label suitable for logs.
	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::Public => "public",
			Self::ShopScoped { .. } => "shop_scoped",
		}
	}
}

/// Builds the exact string that gets HMAC-signed.
pub fn base_string(
	class: EndpointClass<'_>,
	canonical_path: &str,
	timestamp: i64,
	partner_id: PartnerId,
) -> String {
	match class {
		EndpointClass::Public => format!("{partner_id}{canonical_path}{timestamp}"),
		EndpointClass::ShopScoped { access_token, shop_id } =>
			format!("{partner_id}{canonical_path}{timestamp}{access_token}{shop_id}"),
	}
}

/// Computes the lowercase hex HMAC-SHA256 signature for a request.
///
/// The function is pure. It fails only on caller bugs: an empty key, an empty path, or a
/// shop-scoped class without an access token.
pub fn sign(
	class: EndpointClass<'_>,
	path: &str,
	timestamp: i64,
	partner_id: PartnerId,
	partner_key: &[u8],
) -> Result<String, SigningError> {
	if partner_key.is_empty() {
		return Err(SigningError::EmptyKey);
	}
	if matches!(class, EndpointClass::ShopScoped { access_token, .. } if access_token.is_empty()) {
		return Err(SigningError::EmptyAccessToken);
	}

	let canonical = canonical_path(path)?;
	let base = base_string(class, &canonical, timestamp, partner_id);

	digest_hex(partner_key, base.as_bytes())
}

fn digest_hex(key: &[u8], message: &[u8]) -> Result<String, SigningError> {
	let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SigningError::InvalidKeyLength)?;

	mac.update(message);

	Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Signed parameters for a single outbound call; discard after use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedRequest {
	/// Canonical path the signature covers.
	pub path: String,
	/// Unix timestamp (seconds) the signature covers.
	pub timestamp: i64,
	/// Lowercase hex signature.
	pub sign: String,
	/// Partner identifier transmitted with the call.
	pub partner_id: PartnerId,
	/// Access token for shop-scoped calls.
	pub access_token: Option<TokenSecret>,
	/// Shop identifier for shop-scoped calls.
	pub shop_id: Option<ShopId>,
}
impl SignedRequest {
	/// Query parameters to transmit, in platform order.
	pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
		let mut pairs = vec![
			("partner_id", self.partner_id.to_string()),
			("timestamp", self.timestamp.to_string()),
			("sign", self.sign.clone()),
		];

		if let Some(token) = &self.access_token {
			pairs.push(("access_token", token.expose().to_owned()));
		}
		if let Some(shop_id) = self.shop_id {
			pairs.push(("shop_id", shop_id.to_string()));
		}

		pairs
	}

	/// Returns `true` while the signature timestamp is within `tolerance` of `instant`.
	pub fn is_fresh_at(&self, instant: OffsetDateTime, tolerance: Duration) -> bool {
		(instant.unix_timestamp() - self.timestamp).abs() <= tolerance.whole_seconds()
	}
}

/// Signs requests with injected [`Credentials`].
#[derive(Clone, Debug)]
pub struct Signer {
	credentials: Arc<Credentials>,
}
impl Signer {
	/// Creates a signer over shared credentials.
	pub fn new(credentials: impl Into<Arc<Credentials>>) -> Self {
		Self { credentials: credentials.into() }
	}

	/// Credentials the signer uses.
	pub fn credentials(&self) -> &Credentials {
		&self.credentials
	}

	/// Signs a public/auth-class call.
	pub fn sign_public(&self, path: &str, timestamp: i64) -> Result<SignedRequest, SigningError> {
		let canonical = canonical_path(path)?;
		let sign = sign(
			EndpointClass::Public,
			&canonical,
			timestamp,
			self.credentials.partner_id,
			self.credentials.partner_key.expose(),
		)?;

		Ok(SignedRequest {
			path: canonical.into_owned(),
			timestamp,
			sign,
			partner_id: self.credentials.partner_id,
			access_token: None,
			shop_id: None,
		})
	}

	/// Signs a shop-scoped call for the configured shop.
	pub fn sign_shop(
		&self,
		path: &str,
		timestamp: i64,
		access_token: &TokenSecret,
	) -> Result<SignedRequest, SigningError> {
		let canonical = canonical_path(path)?;
		let shop_id = self.credentials.shop_id;
		let sign = sign(
			EndpointClass::ShopScoped { access_token: access_token.expose(), shop_id },
			&canonical,
			timestamp,
			self.credentials.partner_id,
			self.credentials.partner_key.expose(),
		)?;

		Ok(SignedRequest {
			path: canonical.into_owned(),
			timestamp,
			sign,
			partner_id: self.credentials.partner_id,
			access_token: Some(access_token.clone()),
			shop_id: Some(shop_id),
		})
	}
}
