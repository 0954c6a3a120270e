//! Token lifecycle orchestration and signed platform calls.

pub mod authorization;
pub mod common;
pub mod refresh;
pub mod shop_api;

pub use authorization::*;
pub use common::*;
pub use refresh::*;
pub use shop_api::*;

// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenState},
	http::{PlatformHttpClient, TransportErrorMapper},
	platform::{PlatformDescriptor, PlatformStrategy},
	sign::Signer,
	store::TokenStore,
};
#[cfg(feature = "reqwest")]
use crate::{
	config::BrokerConfig,
	http::{ReqwestHttpClient, ReqwestTransportErrorMapper},
	platform::DefaultPlatformStrategy,
};

#[cfg(feature = "reqwest")]
/// Token manager specialized for the crate's default reqwest transport stack.
pub type ReqwestTokenManager = TokenManager<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Owns the access/refresh pair for one shop and signs calls on its behalf.
///
/// The manager holds the HTTP client, token store, platform descriptor, and strategy references
/// so individual flows can focus on protocol logic. All token state sits behind one async mutex:
/// concurrent callers that find the token inside the refresh margin queue on it, the first
/// performs the refresh, and the rest reuse the stored result. Clones share that state.
pub struct TokenManager<C, M>
where
	C: ?Sized + PlatformHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound platform request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Store persisting the token record.
	pub store: Arc<dyn TokenStore>,
	/// Platform descriptor defining host, endpoints, and timing.
	pub descriptor: PlatformDescriptor,
	/// Strategy classifying platform error codes.
	pub strategy: Arc<dyn PlatformStrategy>,
	/// Signer bound to the injected credentials.
	pub signer: Signer,
	/// Safety window before expiry that triggers a refresh.
	pub refresh_margin: Duration,
	/// Transport retry bound for refresh calls and shop GETs.
	pub retry_policy: RetryPolicy,
	/// Shared metrics recorder for refresh flow outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	seed: Option<TokenState>,
	phase: Arc<AsyncMutex<TokenPhase>>,
}
impl<C, M> TokenManager<C, M>
where
	C: ?Sized + PlatformHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Default safety window before expiry.
	pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::seconds(300);

	/// Creates a manager that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		store: Arc<dyn TokenStore>,
		descriptor: PlatformDescriptor,
		strategy: Arc<dyn PlatformStrategy>,
		credentials: Credentials,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			store,
			descriptor,
			strategy,
			signer: Signer::new(credentials),
			refresh_margin: Self::DEFAULT_REFRESH_MARGIN,
			retry_policy: RetryPolicy::default(),
			refresh_metrics: Default::default(),
			seed: None,
			phase: Arc::new(AsyncMutex::new(TokenPhase::Uninitialized)),
		}
	}

	/// Tokens to fall back on when the store is empty at first use.
	///
	/// Seeds carry no reliable expiry, so the first call refreshes them.
	pub fn with_seed(mut self, seed: Option<TokenState>) -> Self {
		self.seed = seed;

		self
	}

	/// Overrides the refresh margin; negative values clamp to zero.
	pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
		self.refresh_margin = if margin.is_negative() { Duration::ZERO } else { margin };

		self
	}

	/// Overrides the transport retry policy.
	pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
		self.retry_policy = policy;

		self
	}

	/// Credentials the manager signs with.
	pub fn credentials(&self) -> &Credentials {
		self.signer.credentials()
	}
}
#[cfg(feature = "reqwest")]
impl TokenManager<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a manager with its own reqwest transport using the descriptor's timeout.
	pub fn new(
		store: Arc<dyn TokenStore>,
		descriptor: PlatformDescriptor,
		strategy: Arc<dyn PlatformStrategy>,
		credentials: Credentials,
	) -> Result<Self> {
		let http_client = ReqwestHttpClient::with_timeout(descriptor.request_timeout)?;

		Ok(Self::with_http_client(
			store,
			descriptor,
			strategy,
			credentials,
			http_client,
			Arc::new(ReqwestTransportErrorMapper),
		))
	}

	/// Wires a manager from deployment configuration: store, seed, host, and margin.
	pub fn from_config(config: &BrokerConfig) -> Result<Self> {
		let manager = Self::new(
			config.token_store(),
			config.descriptor()?,
			Arc::new(DefaultPlatformStrategy),
			config.credentials(),
		)?;

		Ok(manager.with_seed(config.seed_state()).with_refresh_margin(config.refresh_margin()))
	}
}
impl<C, M> Clone for TokenManager<C, M>
where
	C: ?Sized + PlatformHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			store: self.store.clone(),
			descriptor: self.descriptor.clone(),
			strategy: self.strategy.clone(),
			signer: self.signer.clone(),
			refresh_margin: self.refresh_margin,
			retry_policy: self.retry_policy,
			refresh_metrics: self.refresh_metrics.clone(),
			seed: self.seed.clone(),
			phase: self.phase.clone(),
		}
	}
}
impl<C, M> Debug for TokenManager<C, M>
where
	C: ?Sized + PlatformHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("descriptor", &self.descriptor)
			.field("partner_id", &self.credentials().partner_id)
			.field("shop_id", &self.credentials().shop_id)
			.field("refresh_margin", &self.refresh_margin)
			.field("seeded", &self.seed.is_some())
			.finish()
	}
}
