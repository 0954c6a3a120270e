//! Demonstrates plugging a non-reqwest transport into the token manager.
//!
//! 1. Implement [`PlatformHttpClient`] for the transport; it receives fully signed requests.
//! 2. Provide a [`TransportErrorMapper`] that turns the transport's own errors into broker errors.
//! 3. Hand both to [`TokenManager::with_http_client`].

// std
use std::{
	error::Error as StdError,
	fmt::{Display, Formatter, Result as FmtResult},
	sync::Arc,
	time::Duration as StdDuration,
};
// crates.io
use color_eyre::Result;
use url::Url;
// self
use shopee_broker::{
	auth::{Credentials, PartnerId, ShopId, TokenState},
	error::{Error, TransportError},
	flows::{RetryPolicy, TokenManager},
	http::{
		HttpFuture, PlatformHttpClient, PlatformRequest, PlatformResponse, TransportErrorMapper,
	},
	platform::{DefaultPlatformStrategy, PlatformDescriptor},
	store::MemoryStore,
};

type CannedManager = TokenManager<CannedHttpClient, CannedErrorMapper>;

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let credentials = Credentials::new(
		PartnerId::new(2_013_808)?,
		"shpk-demo-partner-key",
		ShopId::new(1_616_902_621)?,
	)?;
	let descriptor = PlatformDescriptor::builder()
		.base_url(Url::parse(PlatformDescriptor::SANDBOX)?)
		.request_timeout(StdDuration::from_secs(5))
		.build()?;
	let seed = TokenState::seed(None, Some("demo-refresh".into()));
	let manager: CannedManager = TokenManager::with_http_client(
		Arc::new(MemoryStore::default()),
		descriptor.clone(),
		Arc::new(DefaultPlatformStrategy),
		credentials.clone(),
		CannedHttpClient::Answer,
		CannedErrorMapper,
	)
	.with_seed(seed.clone());
	let token = manager.ensure_access_token().await?;

	println!("Access token minted by the canned transport: {}.", token.expose());

	let items = manager.get("product/get_item_list", &[("offset", "0")]).await?;

	println!("Shop call answered with {}.", items.response);

	let offline: CannedManager = TokenManager::with_http_client(
		Arc::new(MemoryStore::default()),
		descriptor,
		Arc::new(DefaultPlatformStrategy),
		credentials,
		CannedHttpClient::Unreachable,
		CannedErrorMapper,
	)
	.with_seed(seed)
	.with_retry_policy(RetryPolicy::new(1, StdDuration::from_millis(50)));

	match offline.ensure_access_token().await {
		Ok(_) => println!("Offline transport unexpectedly produced a token."),
		Err(e) => println!(
			"Refresh gave up on the offline transport: {e} (reauthorize: {}).",
			e.requires_reauthorization()
		),
	}

	println!("Manager state afterwards: {:?}.", offline.state_snapshot().await);

	Ok(())
}

#[derive(Debug)]
struct UnreachableHost(String);
impl Display for UnreachableHost {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "no route to {}", self.0)
	}
}
impl StdError for UnreachableHost {}

/// Transport that answers from memory instead of the network.
enum CannedHttpClient {
	Answer,
	Unreachable,
}
impl PlatformHttpClient for CannedHttpClient {
	type TransportError = UnreachableHost;

	fn execute(
		&self,
		request: PlatformRequest,
	) -> HttpFuture<'_, PlatformResponse, Self::TransportError> {
		let host = request.url.host_str().unwrap_or_default().to_owned();
		let body = if request.url.path().starts_with("/api/v2/auth/") {
			r#"{"error":"","access_token":"canned-access","refresh_token":"canned-refresh","expire_in":14400}"#
		} else {
			r#"{"error":"","request_id":"canned","response":{"item":[],"has_next_page":false}}"#
		};
		let reply = match self {
			Self::Answer => Ok(PlatformResponse {
				status: 200,
				retry_after: None,
				body: body.as_bytes().to_vec(),
			}),
			Self::Unreachable => Err(UnreachableHost(host)),
		};

		Box::pin(async move { reply })
	}
}

struct CannedErrorMapper;
impl TransportErrorMapper<UnreachableHost> for CannedErrorMapper {
	fn map_transport_error(&self, error: UnreachableHost) -> Error {
		TransportError::network(error).into()
	}
}
