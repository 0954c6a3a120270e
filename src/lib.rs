//! Shopee Open Platform signing and token lifecycle broker: deterministic HMAC request
//! signatures, single-flight token refresh, and crash-safe token persistence in one crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod obs;
pub mod platform;
pub mod sign;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{Credentials, PartnerId, ShopId, TokenState},
		flows::{RetryPolicy, TokenManager},
		http::{ReqwestHttpClient, ReqwestTransportErrorMapper},
		platform::{DefaultPlatformStrategy, PlatformDescriptor, PlatformStrategy},
		store::{MemoryStore, TokenStore},
	};

	/// Partner identifier shared by integration fixtures.
	pub const TEST_PARTNER_ID: u64 = 2_013_808;
	/// Shop identifier shared by integration fixtures.
	pub const TEST_SHOP_ID: u64 = 1_616_902_621;
	/// Partner key shared by integration fixtures, including the `shpk` prefix.
	pub const TEST_PARTNER_KEY: &str =
		"shpk4d6f636b5061727465724b6579466f72476f6c64656e566563746f7273";

	/// Token manager type alias used by reqwest-backed integration tests.
	pub type ReqwestTestManager = TokenManager<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	/// Builds the credential fixture used across integration tests.
	pub fn test_credentials() -> Credentials {
		Credentials::new(
			PartnerId::new(TEST_PARTNER_ID).expect("Partner fixture should be valid."),
			TEST_PARTNER_KEY,
			ShopId::new(TEST_SHOP_ID).expect("Shop fixture should be valid."),
		)
		.expect("Credential fixture should be valid.")
	}

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Builds a descriptor pointing at the provided mock server base URL.
	pub fn test_descriptor(base_url: &str) -> PlatformDescriptor {
		PlatformDescriptor::builder()
			.base_url(Url::parse(base_url).expect("Mock server base URL should parse."))
			.build()
			.expect("Mock platform descriptor should be valid.")
	}

	/// Constructs a [`TokenManager`] backed by an in-memory store, the default platform
	/// strategy, and the reqwest transport used across integration tests.
	pub fn build_reqwest_test_manager(base_url: &str) -> (ReqwestTestManager, Arc<MemoryStore>) {
		let store = Arc::new(MemoryStore::default());

		(build_reqwest_test_manager_with_store(base_url, store.clone()), store)
	}

	/// Same as [`build_reqwest_test_manager`] but persisting into the provided store.
	pub fn build_reqwest_test_manager_with_store(
		base_url: &str,
		store: Arc<dyn TokenStore>,
	) -> ReqwestTestManager {
		let strategy: Arc<dyn PlatformStrategy> = Arc::new(DefaultPlatformStrategy);

		TokenManager::with_http_client(
			store,
			test_descriptor(base_url),
			strategy,
			test_credentials(),
			test_reqwest_http_client(),
			Arc::new(ReqwestTransportErrorMapper),
		)
		.with_retry_policy(RetryPolicy::new(1, StdDuration::from_millis(10)))
	}

	/// Token state expiring `lifetime` from now with fixed fixture secrets.
	pub fn state_expiring_in(access: &str, refresh: &str, lifetime: Duration) -> TokenState {
		TokenState::new(access, Some(refresh.to_owned()), OffsetDateTime::now_utc() + lifetime)
	}
}

mod _prelude {
	pub use std::{
		borrow::Cow,
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::RwLock;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
