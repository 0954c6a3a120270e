//! Platform descriptor data structures and helpers shared by all flows.
//!
//! The descriptor carries the base URL, the endpoint paths, and the timing knobs every signed
//! call relies on, so tests and sandbox deployments can swap hosts without touching flows.

/// Builder API for assembling platform descriptors.
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, error::ConfigError, sign};

/// Endpoint paths declared by a platform descriptor, relative to the API version prefix.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformEndpoints {
	/// Refresh-token exchange.
	pub refresh: String,
	/// Authorization-code exchange.
	pub code_exchange: String,
	/// Shop authorization landing page.
	pub shop_authorization: String,
}
impl Default for PlatformEndpoints {
	fn default() -> Self {
		Self {
			refresh: "/auth/access_token/get".into(),
			code_exchange: "/auth/token/get".into(),
			shop_authorization: "/shop/auth_partner".into(),
		}
	}
}

/// Immutable platform descriptor consumed by flows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlatformDescriptor {
	/// Scheme and host every call targets.
	pub base_url: Url,
	/// Endpoint definitions.
	pub endpoints: PlatformEndpoints,
	/// Clock skew the platform accepts on signed timestamps.
	pub timestamp_tolerance: Duration,
	/// Ceiling applied to every HTTP call.
	pub request_timeout: StdDuration,
}
impl PlatformDescriptor {
	/// Production host.
	pub const PRODUCTION: &str = "https://partner.shopeemobile.com";
	/// Sandbox host used by test partner accounts.
	pub const SANDBOX: &str = "https://partner.test-stable.shopeemobile.com";

	/// Creates a new builder seeded with production defaults.
	pub fn builder() -> PlatformDescriptorBuilder {
		PlatformDescriptorBuilder::default()
	}

	/// Resolves a canonical path plus query parameters against the base URL.
	pub fn endpoint_url<'a, I>(&self, canonical_path: &str, query: I) -> Result<Url, ConfigError>
	where
		I: IntoIterator<Item = (&'a str, &'a str)>,
	{
		let mut url = self.base_url.join(canonical_path).map_err(|source| {
			ConfigError::InvalidUrl { value: canonical_path.to_owned(), source }
		})?;

		{
			let mut pairs = url.query_pairs_mut();

			for (k, v) in query {
				pairs.append_pair(k, v);
			}
		}

		// `query_pairs_mut` leaves a dangling `?` when nothing was appended.
		if url.query() == Some("") {
			url.set_query(None);
		}

		Ok(url)
	}

	/// Builds the URL for a signed request, appending the signed parameters after `extra`.
	pub fn signed_url(
		&self,
		signed: &sign::SignedRequest,
		extra: &[(&str, &str)],
	) -> Result<Url, ConfigError> {
		let signed_pairs = signed.query_pairs();
		let query = extra
			.iter()
			.copied()
			.chain(signed_pairs.iter().map(|(k, v)| (*k, v.as_str())));

		self.endpoint_url(&signed.path, query)
	}
}
