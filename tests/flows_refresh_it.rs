#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use shopee_broker::{
	_preludet::*,
	auth::TokenState,
	error::TokenError,
	flows::TokenSnapshot,
	platform::PlatformErrorKind,
	store::{MemoryStore, TokenStore},
};

const REFRESH_PATH: &str = "/api/v2/auth/access_token/get";

async fn seeded_manager(
	server: &MockServer,
	state: TokenState,
) -> (ReqwestTestManager, Arc<MemoryStore>) {
	let store = Arc::new(MemoryStore::seeded(state));
	let manager = build_reqwest_test_manager_with_store(&server.base_url(), store.clone());

	(manager, store)
}

#[tokio::test]
async fn cached_token_is_reused_without_network() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(REFRESH_PATH);
			then.status(200).json_body(json!({ "access_token": "unexpected" }));
		})
		.await;
	let (manager, store) =
		seeded_manager(&server, state_expiring_in("cached-access", "cached-refresh", Duration::hours(2)))
			.await;

	for _ in 0..3 {
		let token = manager.ensure_access_token().await.expect("Cached token should be returned.");

		assert_eq!(token.expose(), "cached-access");
	}

	mock.assert_calls_async(0).await;

	assert_eq!(store.save_count(), 0);
	assert!(matches!(manager.state_snapshot().await, TokenSnapshot::Valid { .. }));
}

#[tokio::test]
async fn token_inside_margin_refreshes_once_and_persists() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(REFRESH_PATH)
				.query_param("partner_id", TEST_PARTNER_ID.to_string())
				.query_param_exists("timestamp")
				.query_param_exists("sign")
				.json_body(json!({
					"refresh_token": "old-refresh",
					"shop_id": TEST_SHOP_ID,
					"partner_id": TEST_PARTNER_ID,
				}));
			then.status(200).json_body(json!({
				"error": "",
				"message": "",
				"request_id": "req-refresh",
				"access_token": "new-access",
				"refresh_token": "new-refresh",
				"expire_in": 14_400,
			}));
		})
		.await;
	let (manager, store) =
		seeded_manager(&server, state_expiring_in("old-access", "old-refresh", Duration::seconds(120)))
			.await;
	let before = OffsetDateTime::now_utc();
	let token = manager.ensure_access_token().await.expect("Refresh should succeed.");
	let after = OffsetDateTime::now_utc();

	assert_eq!(token.expose(), "new-access");

	let persisted = store.snapshot().expect("Refreshed state should be persisted.");

	assert_eq!(persisted.access_token.expose(), "new-access");
	assert_eq!(persisted.refresh_token.as_ref().map(|t| t.expose()), Some("new-refresh"));
	assert!(persisted.expires_at >= before + Duration::seconds(14_400));
	assert!(persisted.expires_at <= after + Duration::seconds(14_400));
	assert_eq!(store.save_count(), 1);

	let again = manager.ensure_access_token().await.expect("Fresh token should be cached.");

	assert_eq!(again.expose(), "new-access");

	mock.assert_calls_async(1).await;

	assert_eq!(manager.refresh_metrics.attempts(), 1);
	assert_eq!(manager.refresh_metrics.successes(), 1);
	assert_eq!(manager.refresh_metrics.network_calls(), 1);
}

#[tokio::test]
async fn refresh_keeps_previous_refresh_token_and_defaults_lifetime() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(REFRESH_PATH);
			then.status(200).json_body(json!({ "access_token": "new-access" }));
		})
		.await;
	let (manager, store) =
		seeded_manager(&server, state_expiring_in("old-access", "old-refresh", Duration::ZERO)).await;
	let before = OffsetDateTime::now_utc();

	manager.ensure_access_token().await.expect("Refresh should succeed.");
	mock.assert_calls_async(1).await;

	let persisted = store.snapshot().expect("Refreshed state should be persisted.");

	assert_eq!(persisted.refresh_token.as_ref().map(|t| t.expose()), Some("old-refresh"));
	assert!(persisted.expires_at >= before + TokenState::DEFAULT_LIFETIME);
}

#[tokio::test]
async fn concurrent_callers_share_a_single_refresh() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(REFRESH_PATH);
			then.status(200)
				.delay(StdDuration::from_millis(150))
				.json_body(json!({
					"access_token": "shared-access",
					"refresh_token": "shared-refresh",
					"expire_in": 14_400,
				}));
		})
		.await;
	let (manager, store) =
		seeded_manager(&server, state_expiring_in("old-access", "old-refresh", Duration::seconds(10)))
			.await;
	let other = manager.clone();
	let (a, b, c) = tokio::join!(
		manager.ensure_access_token(),
		other.ensure_access_token(),
		manager.ensure_access_token(),
	);

	for token in [a, b, c] {
		assert_eq!(token.expect("Every caller should get the token.").expose(), "shared-access");
	}

	mock.assert_calls_async(1).await;

	assert_eq!(store.save_count(), 1);
	assert_eq!(manager.refresh_metrics.network_calls(), 1);
}

#[tokio::test]
async fn rejected_refresh_is_sticky_until_reseeded() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(REFRESH_PATH);
			then.status(403).json_body(json!({
				"error": "error_expired",
				"message": "Refresh token expired.",
				"request_id": "req-expired",
			}));
		})
		.await;
	let (manager, store) =
		seeded_manager(&server, state_expiring_in("old-access", "old-refresh", Duration::ZERO)).await;
	let err = manager.ensure_access_token().await.expect_err("Rejected refresh should fail.");

	assert!(err.requires_reauthorization());
	assert!(!err.is_signature_failure());
	assert!(matches!(
		&err,
		Error::Token(TokenError::Rejected {
			grant: "refresh_token",
			kind: PlatformErrorKind::Token,
			error,
			request_id: Some(request_id),
			..
		}) if error == "error_expired" && request_id == "req-expired"
	));

	for _ in 0..3 {
		let err = manager.ensure_access_token().await.expect_err("Failed state should persist.");

		assert!(matches!(err, Error::Token(TokenError::ReauthorizationRequired { .. })));
	}

	mock.assert_calls_async(1).await;

	assert!(matches!(manager.state_snapshot().await, TokenSnapshot::Failed { .. }));
	assert_eq!(store.save_count(), 0);
	assert_eq!(manager.refresh_metrics.failures(), 1);

	manager
		.reseed(state_expiring_in("operator-access", "operator-refresh", Duration::hours(4)))
		.await
		.expect("Reseed should persist.");

	let token = manager.ensure_access_token().await.expect("Reseeded token should be usable.");

	assert_eq!(token.expose(), "operator-access");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn response_without_access_token_fails_the_manager() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(REFRESH_PATH);
			then.status(200).json_body(json!({ "error": "", "refresh_token": "r" }));
		})
		.await;
	let (manager, _store) =
		seeded_manager(&server, state_expiring_in("old-access", "old-refresh", Duration::ZERO)).await;
	let err = manager.ensure_access_token().await.expect_err("Missing access token should fail.");

	assert!(matches!(err, Error::Token(TokenError::MissingAccessToken { grant: "refresh_token" })));

	let err = manager.ensure_access_token().await.expect_err("Failed state should persist.");

	assert!(matches!(err, Error::Token(TokenError::ReauthorizationRequired { .. })));

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn gateway_errors_are_retried_once_then_fail() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(REFRESH_PATH);
			then.status(502).body("<html>Bad Gateway</html>");
		})
		.await;
	let (manager, _store) =
		seeded_manager(&server, state_expiring_in("old-access", "old-refresh", Duration::ZERO)).await;
	let err = manager.ensure_access_token().await.expect_err("Gateway errors should surface.");

	assert!(err.requires_reauthorization());
	assert!(!err.is_retryable());
	assert!(matches!(
		&err,
		Error::Token(TokenError::ReauthorizationRequired { reason, kind: None })
			if reason.contains("malformed response")
	));

	mock.assert_calls_async(2).await;

	assert_eq!(manager.refresh_metrics.network_calls(), 2);
	assert!(matches!(manager.state_snapshot().await, TokenSnapshot::Failed { .. }));

	let again = manager.ensure_access_token().await.expect_err("Failed state should persist.");

	assert_eq!(again.to_string(), err.to_string());

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn signature_rejection_stays_recognizable_while_failed() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(REFRESH_PATH);
			then.status(403).json_body(json!({
				"error": "error_sign",
				"message": "Wrong sign.",
				"request_id": "req-sign",
			}));
		})
		.await;
	let (manager, _store) =
		seeded_manager(&server, state_expiring_in("old-access", "old-refresh", Duration::ZERO)).await;
	let err = manager.ensure_access_token().await.expect_err("Bad signature should fail.");

	assert!(err.is_signature_failure());
	assert!(err.requires_reauthorization());
	assert!(!err.to_string().ends_with(".."));

	for _ in 0..2 {
		let err = manager.ensure_access_token().await.expect_err("Failed state should persist.");

		assert!(err.is_signature_failure());
		assert!(err.requires_reauthorization());
		assert!(matches!(
			err,
			Error::Token(TokenError::ReauthorizationRequired {
				kind: Some(PlatformErrorKind::Signature),
				..
			})
		));
	}

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn seed_tokens_refresh_on_first_use() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(REFRESH_PATH).json_body(json!({
				"refresh_token": "seed-refresh",
				"shop_id": TEST_SHOP_ID,
				"partner_id": TEST_PARTNER_ID,
			}));
			then.status(200).json_body(json!({
				"access_token": "minted-access",
				"refresh_token": "minted-refresh",
				"expire_in": 14_400,
			}));
		})
		.await;
	let (manager, store) = build_reqwest_test_manager(&server.base_url());
	let manager =
		manager.with_seed(TokenState::seed(Some("seed-access".into()), Some("seed-refresh".into())));

	assert_eq!(manager.state_snapshot().await, TokenSnapshot::Uninitialized);

	let token = manager.ensure_access_token().await.expect("Seed should refresh.");

	assert_eq!(token.expose(), "minted-access");
	assert_eq!(store.save_count(), 1);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn unseeded_manager_asks_for_authorization() {
	let server = MockServer::start_async().await;
	let (manager, store) = build_reqwest_test_manager(&server.base_url());
	let err = manager.ensure_access_token().await.expect_err("Nothing to refresh with.");

	assert!(matches!(err, Error::Token(TokenError::MissingRefreshToken)));
	assert_eq!(manager.state_snapshot().await, TokenSnapshot::Unseeded);

	store
		.save(state_expiring_in("late-access", "late-refresh", Duration::hours(1)))
		.await
		.expect("Out-of-band save should succeed.");
	manager.reset().await;

	let token = manager.ensure_access_token().await.expect("Reloaded token should be usable.");

	assert_eq!(token.expose(), "late-access");
}

#[tokio::test]
async fn force_refresh_ignores_remaining_lifetime() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(REFRESH_PATH);
			then.status(200).json_body(json!({
				"access_token": "forced-access",
				"refresh_token": "forced-refresh",
				"expire_in": 14_400,
			}));
		})
		.await;
	let (manager, _store) =
		seeded_manager(&server, state_expiring_in("old-access", "old-refresh", Duration::hours(3)))
			.await;
	let state = manager.force_refresh().await.expect("Forced refresh should succeed.");

	assert_eq!(state.access_token.expose(), "forced-access");

	mock.assert_calls_async(1).await;
}
