//! Signed shop-scoped data calls.
//!
//! Every call first goes through [`TokenManager::ensure_access_token`], then signs with the
//! shop-scoped base string and decodes the platform envelope. Application errors become
//! [`PlatformError`]s carrying the platform code, message, and request id; they are never retried
//! and never touch the token state. Transport failures are retried only for GETs.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, PlatformError, TransportError},
	flows::TokenManager,
	http::{HttpMethod, PlatformHttpClient, PlatformRequest, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	platform::PlatformErrorContext,
	sign::SignedRequest,
};

/// Successful platform envelope.
#[derive(Clone, Debug, PartialEq)]
pub struct ShopResponse {
	/// Platform request identifier.
	pub request_id: Option<String>,
	/// Non-fatal warning attached by the platform.
	pub warning: Option<String>,
	/// The `response` member; `null` when absent.
	pub response: serde_json::Value,
}
impl ShopResponse {
	/// Decodes the `response` member into a typed value.
	pub fn decode<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		serde_path_to_error::deserialize(&self.response)
			.map_err(|source| TransportError::MalformedResponse { status: None, source }.into())
	}
}

#[derive(Debug, Deserialize)]
struct Envelope {
	#[serde(default)]
	error: Option<String>,
	#[serde(default)]
	message: Option<String>,
	#[serde(default)]
	request_id: Option<String>,
	#[serde(default)]
	warning: Option<String>,
	#[serde(default)]
	response: serde_json::Value,
}

impl<C, M> TokenManager<C, M>
where
	C: ?Sized + PlatformHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Sends a signed GET to a shop-scoped endpoint.
	///
	/// `path` may omit the `/api/v2` prefix; `query` carries the endpoint's own parameters.
	pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<ShopResponse> {
		self.call_shop(HttpMethod::Get, path, query, None).await
	}

	/// Sends a signed POST with a JSON body to a shop-scoped endpoint.
	pub async fn post<B>(
		&self,
		path: &str,
		query: &[(&str, &str)],
		body: &B,
	) -> Result<ShopResponse>
	where
		B: ?Sized + Serialize,
	{
		let body = serde_json::to_value(body).map_err(ConfigError::SerializeBody)?;

		self.call_shop(HttpMethod::Post, path, query, Some(body)).await
	}

	async fn call_shop(
		&self,
		method: HttpMethod,
		path: &str,
		query: &[(&str, &str)],
		body: Option<serde_json::Value>,
	) -> Result<ShopResponse> {
		const KIND: FlowKind = FlowKind::ShopApi;

		let span = FlowSpan::new(KIND, "call_shop");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let access_token = self.ensure_access_token().await?;
				let retries =
					if method.is_idempotent() { self.retry_policy.max_retries } else { 0 };
				let mut signed: Option<SignedRequest> = None;
				let (status, envelope) = self
					.dispatch::<Envelope, _>(KIND, retries, |now| {
						let current = match signed.take() {
							Some(s) if s.is_fresh_at(now, self.descriptor.timestamp_tolerance) => s,
							_ => self.signer.sign_shop(path, now.unix_timestamp(), &access_token)?,
						};
						let url = self.descriptor.signed_url(&current, query)?;
						let timeout = self.descriptor.request_timeout;
						let request = match (&body, method) {
							(Some(body), HttpMethod::Post) =>
								PlatformRequest::post_json(url, body, timeout)?,
							(None, HttpMethod::Post) =>
								PlatformRequest::post_json(url, &serde_json::json!({}), timeout)?,
							(_, HttpMethod::Get) => PlatformRequest::get(url, timeout),
						};

						signed = Some(current);

						Ok(request)
					})
					.await?;

				self.envelope_into_response(path, status, envelope)
			})
			.await;

		obs::record_flow_result(KIND, &result);

		result
	}

	fn envelope_into_response(
		&self,
		path: &str,
		status: u16,
		envelope: Envelope,
	) -> Result<ShopResponse> {
		if let Some(error) = envelope.error.filter(|e| !e.is_empty()) {
			let message = envelope.message.unwrap_or_default();
			let ctx = PlatformErrorContext::new(path, error.clone())
				.with_http_status(status)
				.with_message(message.clone());

			return Err(PlatformError {
				kind: self.strategy.classify_error(&ctx),
				error,
				message,
				request_id: envelope.request_id,
				status: Some(status),
			}
			.into());
		}

		Ok(ShopResponse {
			request_id: envelope.request_id,
			warning: envelope.warning.filter(|w| !w.is_empty()),
			response: envelope.response,
		})
	}
}
