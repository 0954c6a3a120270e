// self
use crate::{
	_prelude::*,
	error::ConfigError,
	platform::{PlatformDescriptor, PlatformEndpoints},
};

/// Builder for [`PlatformDescriptor`] values.
#[derive(Debug, Default)]
pub struct PlatformDescriptorBuilder {
	/// Base URL override; production when unset.
	pub base_url: Option<Url>,
	/// Endpoint path overrides.
	pub endpoints: PlatformEndpoints,
	/// Accepted clock skew; 300 seconds when unset.
	pub timestamp_tolerance: Option<Duration>,
	/// Per-request timeout; 15 seconds when unset.
	pub request_timeout: Option<StdDuration>,
}
impl PlatformDescriptorBuilder {
	/// Sets the base URL.
	pub fn base_url(mut self, url: Url) -> Self {
		self.base_url = Some(url);

		self
	}

	/// Overrides the endpoint paths.
	pub fn endpoints(mut self, endpoints: PlatformEndpoints) -> Self {
		self.endpoints = endpoints;

		self
	}

	/// Overrides the accepted timestamp skew.
	pub fn timestamp_tolerance(mut self, tolerance: Duration) -> Self {
		self.timestamp_tolerance = Some(tolerance);

		self
	}

	/// Overrides the per-request timeout.
	pub fn request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = Some(timeout);

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<PlatformDescriptor, ConfigError> {
		let base_url = match self.base_url {
			Some(url) => url,
			None => Url::parse(PlatformDescriptor::PRODUCTION).map_err(|source| {
				ConfigError::InvalidUrl { value: PlatformDescriptor::PRODUCTION.into(), source }
			})?,
		};
		let descriptor = PlatformDescriptor {
			base_url,
			endpoints: self.endpoints,
			timestamp_tolerance: self.timestamp_tolerance.unwrap_or(Duration::seconds(300)),
			request_timeout: self.request_timeout.unwrap_or(StdDuration::from_secs(15)),
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl PlatformDescriptor {
	fn validate(&self) -> Result<(), ConfigError> {
		validate_base_url(&self.base_url)?;

		for (name, path) in [
			("endpoints.refresh", &self.endpoints.refresh),
			("endpoints.code_exchange", &self.endpoints.code_exchange),
			("endpoints.shop_authorization", &self.endpoints.shop_authorization),
		] {
			if path.trim().is_empty() {
				return Err(ConfigError::InvalidValue { name, reason: "path is empty".into() });
			}
		}

		if self.timestamp_tolerance.is_negative() {
			return Err(ConfigError::InvalidValue {
				name: "timestamp_tolerance",
				reason: "must not be negative".into(),
			});
		}
		if self.request_timeout.is_zero() {
			return Err(ConfigError::InvalidValue {
				name: "request_timeout",
				reason: "must be positive".into(),
			});
		}

		Ok(())
	}
}

fn validate_base_url(url: &Url) -> Result<(), ConfigError> {
	if url.scheme() == "https" || is_loopback(url) {
		Ok(())
	} else {
		Err(ConfigError::InsecureBaseUrl { url: url.to_string() })
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
		Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	}
}
