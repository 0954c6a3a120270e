//! Keeps a shop token warm and issues one signed data call.
//!
//! Reads the deployment from `SHOPEE_*` variables, reuses the cached token when it is outside the
//! refresh margin, refreshes otherwise, then lists the first page of shop items.

// crates.io
use color_eyre::Result;
// self
use shopee_broker::{config::BrokerConfig, flows::ReqwestTokenManager};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = BrokerConfig::from_env()?;
	let manager = ReqwestTokenManager::from_config(&config)?;
	let token = manager.ensure_access_token().await?;

	println!("Access token {} is ready ({:?}).", token.preview(), manager.state_snapshot().await);

	let page = manager
		.get(
			"/api/v2/product/get_item_list",
			&[("offset", "0"), ("page_size", "10"), ("item_status", "NORMAL")],
		)
		.await;

	match page {
		Ok(page) => println!("Request {:?} returned {}.", page.request_id, page.response),
		Err(e) if e.is_signature_failure() =>
			eprintln!("Signature rejected; check the partner key: {e}."),
		Err(e) if e.requires_reauthorization() =>
			eprintln!("Run the authorize_shop demo to reauthorize: {e}."),
		Err(e) => return Err(e.into()),
	}

	println!(
		"Refresh metrics: {} attempts, {} network calls.",
		manager.refresh_metrics.attempts(),
		manager.refresh_metrics.network_calls()
	);

	Ok(())
}
