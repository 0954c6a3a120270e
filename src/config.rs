//! Broker configuration sourced from environment variables or a JSON file.
//!
//! Nothing here is hard-coded: partner identity, shop, seed tokens, host, and cache locations all
//! come from the deployment. Environment variable names follow the `SHOPEE_*` convention used by
//! the surrounding tooling.

// std
use std::{fs, path::PathBuf};
// self
use crate::{
	_prelude::*,
	auth::{Credentials, PartnerId, PartnerKey, ShopId, TokenSecret, TokenState},
	error::ConfigError,
	platform::PlatformDescriptor,
	store::{EnvFileStore, FileStore, MemoryStore, MirroredStore, TokenStore},
};

/// Partner identifier variable.
pub const PARTNER_ID_VAR: &str = "SHOPEE_PARTNER_ID";
/// Partner key variable.
pub const PARTNER_KEY_VAR: &str = "SHOPEE_PARTNER_KEY";
/// Legacy partner key variable accepted when [`PARTNER_KEY_VAR`] is unset.
pub const PARTNER_KEY_ALIAS_VAR: &str = "SHOPEE_API_PARTNER_KEY";
/// Shop identifier variable.
pub const SHOP_ID_VAR: &str = "SHOPEE_SHOP_ID";
/// Seed access token variable.
pub const ACCESS_TOKEN_VAR: &str = "SHOPEE_ACCESS_TOKEN";
/// Seed refresh token variable.
pub const REFRESH_TOKEN_VAR: &str = "SHOPEE_REFRESH_TOKEN";
/// Authorization redirect variable.
pub const REDIRECT_URL_VAR: &str = "SHOPEE_REDIRECT_URL";
/// Base URL override variable.
pub const BASE_URL_VAR: &str = "SHOPEE_BASE_URL";
/// JSON token cache path variable.
pub const TOKEN_CACHE_VAR: &str = "SHOPEE_TOKEN_CACHE";
/// Dotenv file kept in sync with the token record.
pub const ENV_FILE_VAR: &str = "SHOPEE_ENV_FILE";
/// Refresh margin override variable, in seconds.
pub const REFRESH_MARGIN_VAR: &str = "SHOPEE_REFRESH_MARGIN_SECS";

const DEFAULT_REFRESH_MARGIN_SECS: u32 = 300;

/// Deployment configuration for a single partner/shop pair.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrokerConfig {
	/// Partner identifier.
	pub partner_id: PartnerId,
	/// Partner key, kept as configured.
	pub partner_key: PartnerKey,
	/// Shop identifier.
	pub shop_id: ShopId,
	/// Access token used until a persisted record exists.
	#[serde(default)]
	pub access_token: Option<TokenSecret>,
	/// Refresh token used until a persisted record exists.
	#[serde(default)]
	pub refresh_token: Option<TokenSecret>,
	/// Redirect target for the shop authorization link.
	#[serde(default)]
	pub redirect_url: Option<Url>,
	/// Platform host override.
	#[serde(default)]
	pub base_url: Option<Url>,
	/// JSON token cache location.
	#[serde(default)]
	pub token_cache: Option<PathBuf>,
	/// Dotenv file mirrored with the token record.
	#[serde(default)]
	pub env_file: Option<PathBuf>,
	/// Safety window before expiry, in seconds.
	#[serde(default = "default_refresh_margin_secs")]
	pub refresh_margin_secs: u32,
}
impl BrokerConfig {
	/// Reads the configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_vars(std::env::vars())
	}

	/// Reads the configuration from explicit key/value pairs; empty values count as unset.
	pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		let vars = vars
			.into_iter()
			.map(|(k, v)| (k.into(), v.into()))
			.filter(|(_, v)| !v.trim().is_empty())
			.collect::<BTreeMap<String, String>>();
		let get = |name: &str| vars.get(name).map(String::as_str);
		let require = |name: &'static str| get(name).ok_or(ConfigError::MissingValue { name });
		let partner_id = parse_id::<PartnerId>(PARTNER_ID_VAR, require(PARTNER_ID_VAR)?)?;
		let shop_id = parse_id::<ShopId>(SHOP_ID_VAR, require(SHOP_ID_VAR)?)?;
		let partner_key = get(PARTNER_KEY_VAR)
			.or_else(|| get(PARTNER_KEY_ALIAS_VAR))
			.ok_or(ConfigError::MissingValue { name: PARTNER_KEY_VAR })?;
		let partner_key = PartnerKey::new(partner_key)?;
		let refresh_margin_secs = match get(REFRESH_MARGIN_VAR) {
			Some(raw) => raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
				name: REFRESH_MARGIN_VAR,
				reason: format!("{e}"),
			})?,
			None => DEFAULT_REFRESH_MARGIN_SECS,
		};

		Ok(Self {
			partner_id,
			partner_key,
			shop_id,
			access_token: get(ACCESS_TOKEN_VAR).and_then(token_value),
			refresh_token: get(REFRESH_TOKEN_VAR).and_then(token_value),
			redirect_url: get(REDIRECT_URL_VAR).map(|v| parse_url(v.trim())).transpose()?,
			base_url: get(BASE_URL_VAR).map(|v| parse_url(v.trim())).transpose()?,
			token_cache: get(TOKEN_CACHE_VAR).map(PathBuf::from),
			env_file: get(ENV_FILE_VAR).map(PathBuf::from),
			refresh_margin_secs,
		})
	}

	/// Reads the configuration from a JSON file whose fields mirror [`BrokerConfig`].
	pub fn from_json_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
		let path = path.into();
		let bytes = fs::read(&path)
			.map_err(|source| ConfigError::ReadFile { path: path.display().to_string(), source })?;
		let de = &mut serde_json::Deserializer::from_slice(&bytes);

		Ok(serde_path_to_error::deserialize(de)?)
	}

	/// Builds the credentials injected into the signer.
	pub fn credentials(&self) -> Credentials {
		Credentials {
			partner_id: self.partner_id,
			partner_key: self.partner_key.clone(),
			shop_id: self.shop_id,
		}
	}

	/// Seed record used when no persisted record exists; its expiry is unknown.
	pub fn seed_state(&self) -> Option<TokenState> {
		TokenState::seed(
			self.access_token.as_ref().map(|t| t.expose().to_owned()),
			self.refresh_token.as_ref().map(|t| t.expose().to_owned()),
		)
	}

	/// Safety window before expiry.
	pub fn refresh_margin(&self) -> Duration {
		Duration::seconds(self.refresh_margin_secs.into())
	}

	/// Platform descriptor targeting the configured host.
	pub fn descriptor(&self) -> Result<PlatformDescriptor, ConfigError> {
		let builder = PlatformDescriptor::builder();
		let builder = match &self.base_url {
			Some(url) => builder.base_url(url.clone()),
			None => builder,
		};

		builder.build()
	}

	/// Store matching the configured cache locations.
	///
	/// A JSON cache plus a dotenv file yields a [`MirroredStore`] with the JSON cache as primary.
	/// Without either, tokens live in memory only.
	pub fn token_store(&self) -> Arc<dyn TokenStore> {
		match (&self.token_cache, &self.env_file) {
			(Some(cache), Some(env)) => Arc::new(MirroredStore::new(
				Arc::new(FileStore::open(cache)),
				Arc::new(EnvFileStore::open(env)),
			)),
			(Some(cache), None) => Arc::new(FileStore::open(cache)),
			(None, Some(env)) => Arc::new(EnvFileStore::open(env)),
			(None, None) => Arc::new(MemoryStore::default()),
		}
	}
}

fn default_refresh_margin_secs() -> u32 {
	DEFAULT_REFRESH_MARGIN_SECS
}

fn parse_id<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
	T: FromStr,
	T::Err: Display,
{
	raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue { name, reason: e.to_string() })
}

fn parse_url(raw: &str) -> Result<Url, ConfigError> {
	Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { value: raw.to_owned(), source })
}

/// Token values often arrive wrapped in quotes copied from dotenv files.
fn token_value(raw: &str) -> Option<TokenSecret> {
	let value = raw.trim().trim_matches(|c: char| c == '"' || c == '\'');

	(!value.is_empty()).then(|| TokenSecret::new(value))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const KEY: &str = "shpk4d6f636b5061727465724b6579466f72476f6c64656e566563746f7273";

	fn base_vars() -> Vec<(&'static str, &'static str)> {
		vec![(PARTNER_ID_VAR, "2013808"), (PARTNER_KEY_VAR, KEY), (SHOP_ID_VAR, "1616902621")]
	}

	#[test]
	fn minimal_environment_uses_defaults() {
		let config = BrokerConfig::from_vars(base_vars()).expect("Minimal config should load.");

		assert_eq!(config.partner_id.get(), 2_013_808);
		assert_eq!(config.shop_id.get(), 1_616_902_621);
		assert_eq!(config.partner_key.expose(), KEY.as_bytes());
		assert_eq!(config.refresh_margin(), Duration::seconds(300));
		assert!(config.seed_state().is_none());
		assert_eq!(
			config.descriptor().expect("Default descriptor should build.").base_url.as_str(),
			"https://partner.shopeemobile.com/"
		);
	}

	#[test]
	fn partner_key_alias_and_quoted_tokens_are_accepted() {
		let vars = [
			(PARTNER_ID_VAR, "2013808"),
			(PARTNER_KEY_ALIAS_VAR, " shpk-with-space "),
			(SHOP_ID_VAR, "\"1616902621\""),
			(ACCESS_TOKEN_VAR, "\"access\""),
			(REFRESH_TOKEN_VAR, "refresh"),
			(REFRESH_MARGIN_VAR, "120"),
		];
		let config = BrokerConfig::from_vars(vars).expect("Aliased config should load.");
		let seed = config.seed_state().expect("Seed tokens should be present.");

		assert_eq!(config.partner_key.expose(), b" shpk-with-space ");
		assert_eq!(seed.access_token.expose(), "access");
		assert_eq!(seed.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh"));
		assert_eq!(seed.expires_at, OffsetDateTime::UNIX_EPOCH);
		assert_eq!(config.refresh_margin(), Duration::seconds(120));
	}

	#[test]
	fn missing_and_malformed_values_are_reported_by_name() {
		let err = BrokerConfig::from_vars([(PARTNER_ID_VAR, "2013808"), (SHOP_ID_VAR, "1")])
			.expect_err("Missing key should fail.");

		assert!(matches!(err, ConfigError::MissingValue { name: PARTNER_KEY_VAR }));

		let mut vars = base_vars();

		vars[0].1 = "partner";

		let err = BrokerConfig::from_vars(vars).expect_err("Non-numeric partner should fail.");

		assert!(matches!(err, ConfigError::InvalidValue { name: PARTNER_ID_VAR, .. }));

		let mut vars = base_vars();

		vars.push((BASE_URL_VAR, "http://partner.shopeemobile.com"));

		let config = BrokerConfig::from_vars(vars).expect("Insecure URL parses as a URL.");

		assert!(matches!(config.descriptor(), Err(ConfigError::InsecureBaseUrl { .. })));
	}

	#[test]
	fn json_config_reports_field_paths() {
		let path = std::env::temp_dir()
			.join(format!("shopee_broker_config_{}.json", std::process::id()));

		fs::write(&path, br#"{"partner_id": 2013808, "partner_key": "k", "shop_id": "x"}"#)
			.expect("Failed to write config fixture.");

		let err = BrokerConfig::from_json_file(&path).expect_err("String shop id should fail.");

		assert!(matches!(
			&err,
			ConfigError::ParseFile(inner) if inner.path().to_string() == "shop_id"
		));

		fs::write(&path, br#"{"partner_id": 2013808, "partner_key": "k", "shop_id": 7}"#)
			.expect("Failed to write config fixture.");

		let config = BrokerConfig::from_json_file(&path).expect("Valid JSON config should load.");

		assert_eq!(config.shop_id.get(), 7);
		assert_eq!(config.refresh_margin_secs, 300);

		fs::remove_file(&path).expect("Failed to remove config fixture.");
	}
}
