//! Transport primitives for signed platform calls.
//!
//! The module exposes [`PlatformHttpClient`] alongside the crate-owned [`PlatformRequest`] and
//! [`PlatformResponse`] types so downstream crates can plug in custom HTTP clients without the
//! flows ever touching a concrete HTTP stack. Transport failures are converted into broker
//! errors by a [`TransportErrorMapper`] paired with the client.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
#[cfg(feature = "reqwest")] use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::ConfigError};
#[cfg(feature = "reqwest")] use crate::error::TransportError;

/// Boxed future returned by [`PlatformHttpClient::execute`].
pub type HttpFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + 'a + Send>>;

/// HTTP verbs the platform uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
	/// Read-only, idempotent call.
	Get,
	/// JSON body call.
	Post,
}
impl HttpMethod {
	/// Returns `true` when replaying the call cannot change platform state.
	pub const fn is_idempotent(self) -> bool {
		matches!(self, Self::Get)
	}

	/// Returns the method name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Get => "GET",
			Self::Post => "POST",
		}
	}
}
impl Display for HttpMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Fully signed outbound request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlatformRequest {
	/// HTTP verb.
	pub method: HttpMethod,
	/// Absolute URL including the signed query parameters.
	pub url: Url,
	/// JSON body for POST calls.
	pub body: Option<Vec<u8>>,
	/// Ceiling for the whole call.
	pub timeout: StdDuration,
}
impl PlatformRequest {
	/// Creates a GET request.
	pub fn get(url: Url, timeout: StdDuration) -> Self {
		Self { method: HttpMethod::Get, url, body: None, timeout }
	}

	/// Creates a POST request with a JSON body.
	pub fn post_json<T>(url: Url, body: &T, timeout: StdDuration) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		let body = serde_json::to_vec(body).map_err(ConfigError::SerializeBody)?;

		Ok(Self { method: HttpMethod::Post, url, body: Some(body), timeout })
	}
}

/// Raw platform response handed back to the flows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlatformResponse {
	/// HTTP status code.
	pub status: u16,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
	/// Response body bytes.
	pub body: Vec<u8>,
}

/// Abstraction over HTTP transports capable of executing signed platform calls.
///
/// This is the broker's only dependency on an HTTP stack. Implementations must be
/// `Send + Sync + 'static` so they can be shared across manager clones, and the futures they
/// return must be `Send` so callers can hop executors.
pub trait PlatformHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Executes the request, honoring [`PlatformRequest::timeout`].
	fn execute(
		&self,
		request: PlatformRequest,
	) -> HttpFuture<'_, PlatformResponse, Self::TransportError>;
}

/// Maps transport-specific errors into broker errors.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an error emitted by the transport into a broker error.
	fn map_transport_error(&self, error: E) -> Error;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Platform endpoints answer directly, so a custom client should not follow redirects.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client with the provided default timeout and no redirect following.
	pub fn with_timeout(timeout: StdDuration) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.redirect(reqwest::redirect::Policy::none())
			.build()?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl PlatformHttpClient for ReqwestHttpClient {
	type TransportError = ReqwestError;

	fn execute(
		&self,
		request: PlatformRequest,
	) -> HttpFuture<'_, PlatformResponse, Self::TransportError> {
		let client = self.0.clone();

		Box::pin(async move {
			let builder = match request.method {
				HttpMethod::Get => client.get(request.url),
				HttpMethod::Post => client
					.post(request.url)
					.header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
					.body(request.body.unwrap_or_default()),
			};
			let response = builder.timeout(request.timeout).send().await?;
			let status = response.status().as_u16();
			let retry_after = parse_retry_after(response.headers());
			let body = response.bytes().await?.to_vec();

			Ok(PlatformResponse { status, retry_after, body })
		})
	}
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(&self, error: ReqwestError) -> Error {
		if error.is_builder() {
			ConfigError::from(error).into()
		} else {
			TransportError::from(error).into()
		}
	}
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(secs.into()));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn only_get_is_idempotent() {
		assert!(HttpMethod::Get.is_idempotent());
		assert!(!HttpMethod::Post.is_idempotent());
	}

	#[test]
	fn post_json_serializes_body() {
		let url = Url::parse("https://partner.shopeemobile.com/api/v2/auth/token/get")
			.expect("Fixture URL should parse.");
		let request = PlatformRequest::post_json(
			url,
			&serde_json::json!({ "code": "abc" }),
			StdDuration::from_secs(15),
		)
		.expect("Body should serialize.");

		assert_eq!(request.method, HttpMethod::Post);
		assert_eq!(request.body.as_deref(), Some(br#"{"code":"abc"}"#.as_slice()));
	}

	#[cfg(feature = "reqwest")]
	#[test]
	fn retry_after_seconds_are_parsed() {
		let mut headers = HeaderMap::new();

		headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));

		assert_eq!(parse_retry_after(&headers), Some(Duration::seconds(7)));

		headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));

		assert_eq!(parse_retry_after(&headers), None);
	}
}
