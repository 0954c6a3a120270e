//! Out-of-band shop authorization: signed authorization links and code exchange.
//!
//! An operator opens [`TokenManager::authorization_url`] in a browser, approves the app, and lands
//! on the redirect with `?code=..&shop_id=..`. The code is short-lived (minutes) and single-use,
//! so [`TokenManager::exchange_code`] never retries; a failed exchange means restarting the
//! browser step.

// self
use crate::{
	_prelude::*,
	auth::{ShopId, TokenState},
	error::ConfigError,
	flows::{Grant, TokenManager, TokenPhase},
	http::{PlatformHttpClient, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Values carried by the authorization redirect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationCallback {
	/// One-time authorization code.
	pub code: String,
	/// Shop that granted access, when the redirect carried it.
	pub shop_id: Option<ShopId>,
	/// Opaque state echoed back by the platform.
	pub state: Option<String>,
}
impl AuthorizationCallback {
	/// Extracts callback values from the redirect URL.
	pub fn from_url(url: &Url) -> Result<Self, ConfigError> {
		let mut code = None;
		let mut shop_id = None;
		let mut state = None;

		for (key, value) in url.query_pairs() {
			match key.as_ref() {
				"code" if !value.is_empty() => code = Some(value.into_owned()),
				"shop_id" if !value.is_empty() =>
					shop_id = Some(value.parse::<ShopId>().map_err(|e| {
						ConfigError::InvalidValue { name: "shop_id", reason: e.to_string() }
					})?),
				"state" if !value.is_empty() => state = Some(value.into_owned()),
				_ => {},
			}
		}

		Ok(Self { code: code.ok_or(ConfigError::MissingValue { name: "code" })?, shop_id, state })
	}

	/// Accepts either a full redirect URL or a bare code, as operators paste either.
	pub fn parse(input: &str) -> Result<Self, ConfigError> {
		let input = input.trim();

		if input.starts_with("http://") || input.starts_with("https://") {
			let url = Url::parse(input)
				.map_err(|source| ConfigError::InvalidUrl { value: input.to_owned(), source })?;

			return Self::from_url(&url);
		}
		if input.is_empty() {
			return Err(ConfigError::MissingValue { name: "code" });
		}

		Ok(Self { code: input.to_owned(), shop_id: None, state: None })
	}
}

impl<C, M> TokenManager<C, M>
where
	C: ?Sized + PlatformHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds the signed shop authorization link an operator opens in a browser.
	pub fn authorization_url(&self, redirect: &Url, state: Option<&str>) -> Result<Url> {
		let now = OffsetDateTime::now_utc().unix_timestamp();
		let signed = self.signer.sign_public(&self.descriptor.endpoints.shop_authorization, now)?;
		let mut extra = vec![("redirect", redirect.as_str())];

		if let Some(state) = state {
			extra.push(("state", state));
		}

		let signed_pairs = signed.query_pairs();
		let query = signed_pairs.iter().map(|(k, v)| (*k, v.as_str())).chain(extra);

		Ok(self.descriptor.endpoint_url(&signed.path, query)?)
	}

	/// Exchanges a one-time authorization code for the initial token pair.
	///
	/// Success persists the pair and clears any failed state. Failure leaves the manager
	/// untouched; the code is spent either way, so the operator restarts the browser step.
	pub async fn exchange_code(&self, code: &str) -> Result<TokenState> {
		const KIND: FlowKind = FlowKind::AuthorizationCode;

		let span = FlowSpan::new(KIND, "exchange_code");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let code = code.trim();

				if code.is_empty() {
					return Err(Error::from(ConfigError::MissingValue { name: "code" }));
				}

				let mut phase = self.phase.lock().await;
				let state = self.exchange_token(Grant::AuthorizationCode, code, None, 0).await?;

				self.store.save(state.clone()).await?;
				obs::record_token_transition(phase.label(), "valid", "authorization_code");

				*phase = TokenPhase::Active(state.clone());

				Ok(state)
			})
			.await;

		obs::record_flow_result(KIND, &result);

		result
	}

	/// Exchanges the code from a redirect, rejecting callbacks issued for another shop.
	pub async fn exchange_callback(&self, callback: &AuthorizationCallback) -> Result<TokenState> {
		let expected = self.credentials().shop_id;

		if let Some(shop_id) = callback.shop_id.filter(|id| *id != expected) {
			return Err(ConfigError::InvalidValue {
				name: "shop_id",
				reason: format!("callback is for shop {shop_id}, manager serves shop {expected}"),
			}
			.into());
		}

		self.exchange_code(&callback.code).await
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn callback_url_yields_code_shop_and_state() {
		let url = Url::parse("https://ops.example.com/cb?code=abc123&shop_id=1616902621&state=s1")
			.expect("Callback fixture should parse.");
		let callback = AuthorizationCallback::from_url(&url).expect("Callback should parse.");

		assert_eq!(callback.code, "abc123");
		assert_eq!(callback.shop_id.map(ShopId::get), Some(1_616_902_621));
		assert_eq!(callback.state.as_deref(), Some("s1"));
	}

	#[test]
	fn bare_code_and_missing_code_are_handled() {
		let callback = AuthorizationCallback::parse("  abc123 \n").expect("Bare code should parse.");

		assert_eq!(callback.code, "abc123");
		assert_eq!(callback.shop_id, None);
		assert!(matches!(
			AuthorizationCallback::parse("https://ops.example.com/cb?shop_id=1"),
			Err(ConfigError::MissingValue { name: "code" })
		));
		assert!(matches!(
			AuthorizationCallback::parse(""),
			Err(ConfigError::MissingValue { name: "code" })
		));
	}
}
