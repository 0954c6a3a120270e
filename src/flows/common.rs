//! Shared helpers for flow implementations (retry policy, token phases, signed dispatch).

// crates.io
use rand::Rng;
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, TokenState},
	error::{TokenError, TransportError},
	flows::TokenManager,
	http::{PlatformHttpClient, PlatformRequest, TransportErrorMapper},
	obs::{self, FlowKind},
	platform::{PlatformErrorContext, PlatformErrorKind},
};

/// Bounded retry schedule for transport failures.
///
/// Platform rejections are never retried; only network-class failures are.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Extra attempts after the first one.
	pub max_retries: u32,
	/// Delay before the first retry; doubles per attempt and gains up to 100% jitter.
	pub base_delay: StdDuration,
}
impl RetryPolicy {
	/// Creates a policy with the provided bound and base delay.
	pub const fn new(max_retries: u32, base_delay: StdDuration) -> Self {
		Self { max_retries, base_delay }
	}

	/// Policy that never retries.
	pub const fn none() -> Self {
		Self::new(0, StdDuration::ZERO)
	}

	/// Jittered delay before retry number `attempt` (zero-based).
	pub fn delay_for(&self, attempt: u32) -> StdDuration {
		let base = self.base_delay.saturating_mul(2_u32.saturating_pow(attempt));
		let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);

		if base_ms == 0 {
			return base;
		}

		let jitter = rand::rng().random_range(0..=base_ms);

		base + StdDuration::from_millis(jitter)
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self::new(1, StdDuration::from_millis(500))
	}
}

/// Internal lifecycle phase guarded by the manager lock.
#[derive(Clone, Debug)]
pub(crate) enum TokenPhase {
	Uninitialized,
	Active(TokenState),
	/// Neither the store nor the seed provided tokens.
	Empty,
	Failed {
		reason: String,
		kind: Option<PlatformErrorKind>,
	},
}
impl TokenPhase {
	pub(crate) fn label(&self) -> &'static str {
		match self {
			Self::Uninitialized => "uninitialized",
			Self::Active(_) => "valid",
			Self::Empty => "unseeded",
			Self::Failed { .. } => "failed",
		}
	}
}

/// Point-in-time view of the manager state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenSnapshot {
	/// Nothing has been loaded yet.
	Uninitialized,
	/// Cached token is usable beyond the refresh margin.
	Valid {
		/// Expiry of the cached access token.
		expires_at: OffsetDateTime,
	},
	/// Cached token is inside the refresh margin or expired; the next call refreshes.
	NeedsRefresh {
		/// Expiry of the cached access token.
		expires_at: OffsetDateTime,
	},
	/// No tokens are available; run the authorization exchange.
	Unseeded,
	/// A refresh failed; the operator must reauthorize or reseed.
	Failed {
		/// Failure that moved the manager into this state.
		reason: String,
	},
}

/// Grants served by the platform token endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Grant {
	RefreshToken,
	AuthorizationCode,
}
impl Grant {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::RefreshToken => "refresh_token",
			Self::AuthorizationCode => "authorization_code",
		}
	}
}

/// Token endpoint payload shared by refresh and code exchange.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenEndpointResponse {
	#[serde(default)]
	access_token: Option<String>,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	expire_in: Option<i64>,
	#[serde(default)]
	error: Option<String>,
	#[serde(default)]
	message: Option<String>,
	#[serde(default)]
	request_id: Option<String>,
}

#[derive(Serialize)]
struct TokenRequestBody<'a> {
	#[serde(skip_serializing_if = "Option::is_none")]
	code: Option<&'a str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	refresh_token: Option<&'a str>,
	shop_id: u64,
	partner_id: u64,
}

impl<C, M> TokenManager<C, M>
where
	C: ?Sized + PlatformHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Sends the request built by `prepare`, retrying network-class failures.
	///
	/// `prepare` runs once per attempt with the current instant so callers can re-sign when a
	/// signature left the timestamp tolerance window.
	pub(crate) async fn dispatch<T, F>(
		&self,
		kind: FlowKind,
		retries: u32,
		mut prepare: F,
	) -> Result<(u16, T)>
	where
		T: DeserializeOwned,
		F: FnMut(OffsetDateTime) -> Result<PlatformRequest>,
	{
		let mut attempt = 0;

		loop {
			let request = prepare(OffsetDateTime::now_utc())?;
			let mut retry_after = None;
			let outcome = match self.http_client.execute(request).await {
				Ok(response) => {
					retry_after = response.retry_after;

					decode_json::<T>(response.status, &response.body)
						.map(|body| (response.status, body))
						.map_err(Error::from)
				},
				Err(e) => Err(self.transport_mapper.map_transport_error(e)),
			};

			match outcome {
				Err(e) if e.is_retryable() && attempt < retries => {
					let delay = self.retry_delay(attempt, retry_after);

					attempt += 1;
					obs::record_retry(kind, attempt, delay, &e);
					tokio::time::sleep(delay).await;
				},
				outcome => return outcome,
			}
		}
	}

	/// Backoff before retry `attempt`, stretched to a server `Retry-After` hint but never past the
	/// request timeout.
	fn retry_delay(&self, attempt: u32, retry_after: Option<Duration>) -> StdDuration {
		let delay = self.retry_policy.delay_for(attempt);
		let hint = retry_after
			.map(|d| d.unsigned_abs().min(self.descriptor.request_timeout))
			.unwrap_or_default();

		delay.max(hint)
	}

	/// Calls a token endpoint and converts the payload into a new [`TokenState`].
	pub(crate) async fn exchange_token(
		&self,
		grant: Grant,
		secret: &str,
		previous_refresh: Option<&TokenSecret>,
		retries: u32,
	) -> Result<TokenState> {
		let credentials = self.signer.credentials();
		let (kind, path) = match grant {
			Grant::RefreshToken => (FlowKind::Refresh, &self.descriptor.endpoints.refresh),
			Grant::AuthorizationCode =>
				(FlowKind::AuthorizationCode, &self.descriptor.endpoints.code_exchange),
		};
		let body = TokenRequestBody {
			code: (grant == Grant::AuthorizationCode).then_some(secret),
			refresh_token: (grant == Grant::RefreshToken).then_some(secret),
			shop_id: credentials.shop_id.get(),
			partner_id: credentials.partner_id.get(),
		};
		let mut signed: Option<crate::sign::SignedRequest> = None;
		let (status, payload) = self
			.dispatch::<TokenEndpointResponse, _>(kind, retries, |now| {
				let current = match signed.take() {
					Some(s) if s.is_fresh_at(now, self.descriptor.timestamp_tolerance) => s,
					_ => self.signer.sign_public(path, now.unix_timestamp())?,
				};
				let url = self.descriptor.signed_url(&current, &[])?;

				signed = Some(current);
				self.refresh_metrics.record_network_call();

				Ok(PlatformRequest::post_json(url, &body, self.descriptor.request_timeout)?)
			})
			.await?;

		self.token_state_from(grant, path, status, payload, previous_refresh)
	}

	fn token_state_from(
		&self,
		grant: Grant,
		path: &str,
		status: u16,
		payload: TokenEndpointResponse,
		previous_refresh: Option<&TokenSecret>,
	) -> Result<TokenState> {
		if let Some(error) = payload.error.filter(|e| !e.is_empty()) {
			let message = payload.message.unwrap_or_default();
			let ctx = PlatformErrorContext::new(path, error.clone())
				.with_http_status(status)
				.with_message(message.clone());

			return Err(TokenError::Rejected {
				grant: grant.as_str(),
				kind: self.strategy.classify_error(&ctx),
				error,
				message,
				request_id: payload.request_id,
			}
			.into());
		}

		let access_token = payload
			.access_token
			.filter(|t| !t.is_empty())
			.ok_or(TokenError::MissingAccessToken { grant: grant.as_str() })?;
		let refresh_token = payload
			.refresh_token
			.filter(|t| !t.is_empty())
			.or_else(|| previous_refresh.map(|t| t.expose().to_owned()));
		let lifetime = payload
			.expire_in
			.filter(|secs| *secs > 0)
			.map(Duration::seconds)
			.unwrap_or(TokenState::DEFAULT_LIFETIME);

		Ok(TokenState::issued(access_token, refresh_token, OffsetDateTime::now_utc(), lifetime))
	}
}

/// Decodes a JSON body, keeping the failing field path for diagnostics.
pub(crate) fn decode_json<T>(status: u16, body: &[u8]) -> Result<T, TransportError>
where
	T: DeserializeOwned,
{
	let de = &mut serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(de)
		.map_err(|source| TransportError::MalformedResponse { status: Some(status), source })
}
