//! Runs the out-of-band shop authorization.
//!
//! Without arguments the demo prints the signed authorization link for `SHOPEE_REDIRECT_URL`.
//! Pass the redirect URL the browser landed on (or just its `code`) to exchange it for the first
//! token pair, which lands in the configured token cache.

// std
use std::env;
// crates.io
use color_eyre::{Result, eyre::eyre};
// self
use shopee_broker::{
	config::{BrokerConfig, REDIRECT_URL_VAR},
	flows::{AuthorizationCallback, ReqwestTokenManager},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = BrokerConfig::from_env()?;
	let manager = ReqwestTokenManager::from_config(&config)?;

	match env::args().nth(1) {
		None => {
			let redirect = config
				.redirect_url
				.as_ref()
				.ok_or_else(|| eyre!("Set {REDIRECT_URL_VAR} to build the authorization link."))?;
			let url = manager.authorization_url(redirect, None)?;

			println!("Open this link while logged in as the shop owner:\n{url}");
		},
		Some(input) => {
			let callback = AuthorizationCallback::parse(&input)?;
			let state = manager.exchange_callback(&callback).await?;

			println!(
				"Shop {} authorized; access token {} expires at {}.",
				manager.credentials().shop_id,
				state.access_token.preview(),
				state.expires_at
			);
		},
	}

	Ok(())
}
