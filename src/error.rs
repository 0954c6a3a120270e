//! Broker-level error types shared across signing, flows, transports, and stores.

// self
use crate::{_prelude::*, platform::PlatformErrorKind};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Signer received malformed inputs; a caller bug, never retried.
	#[error(transparent)]
	Signing(#[from] SigningError),
	/// Token lifecycle failure that needs operator reauthorization.
	#[error(transparent)]
	Token(#[from] TokenError),
	/// Platform returned an application-level error on a data call.
	#[error(transparent)]
	Platform(#[from] PlatformError),
	/// Transport failure (DNS, TCP, TLS, timeout, garbled body).
	#[error(transparent)]
	Transport(#[from] TransportError),
}
impl Error {
	/// Returns `true` when the failure is transient and the call may be retried.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Transport(err) if err.is_retryable())
	}

	/// Returns `true` when an operator must rerun the authorization flow.
	pub fn requires_reauthorization(&self) -> bool {
		matches!(self, Self::Token(_))
	}

	/// Returns `true` when the platform rejected the request signature itself.
	pub fn is_signature_failure(&self) -> bool {
		match self {
			Self::Signing(_) => true,
			Self::Platform(err) => err.kind == PlatformErrorKind::Signature,
			Self::Token(
				TokenError::Rejected { kind, .. }
				| TokenError::ReauthorizationRequired { kind: Some(kind), .. },
			) => *kind == PlatformErrorKind::Signature,
			_ => false,
		}
	}
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A configured or derived URL cannot be parsed.
	#[error("URL `{value}` is invalid.")]
	InvalidUrl {
		/// Offending input.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Base URL does not use HTTPS and is not a loopback address.
	#[error("The platform base URL must use HTTPS: {url}.")]
	InsecureBaseUrl {
		/// URL that failed validation.
		url: String,
	},
	/// Required configuration value is absent.
	#[error("Missing configuration value `{name}`.")]
	MissingValue {
		/// Variable or field name.
		name: &'static str,
	},
	/// Configuration value is present but unusable.
	#[error("Configuration value `{name}` is invalid: {reason}.")]
	InvalidValue {
		/// Variable or field name.
		name: &'static str,
		/// Human-readable explanation.
		reason: String,
	},
	/// Partner key is empty.
	#[error("Partner key cannot be empty.")]
	EmptyPartnerKey,
	/// Configuration file could not be read.
	#[error("Failed to read configuration file {path}.")]
	ReadFile {
		/// File that failed to load.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Configuration file contents could not be parsed.
	#[error("Failed to parse configuration file.")]
	ParseFile(#[from] serde_path_to_error::Error<serde_json::Error>),
	/// Request payload could not be serialized.
	#[error("Failed to serialize request body.")]
	SerializeBody(#[source] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Malformed inputs handed to the signer.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SigningError {
	/// Partner key is empty.
	#[error("Partner key cannot be empty.")]
	EmptyKey,
	/// Request path is empty.
	#[error("Request path cannot be empty.")]
	EmptyPath,
	/// Shop-scoped signature requested without an access token.
	#[error("Shop-scoped signatures require a non-empty access token.")]
	EmptyAccessToken,
	/// HMAC rejected the key material.
	#[error("Partner key has an unsupported length.")]
	InvalidKeyLength,
}

/// Token lifecycle failures. Every variant requires operator action.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum TokenError {
	/// Neither the store nor the configured seed carries a refresh token.
	#[error("No refresh token is available; run the shop authorization flow.")]
	MissingRefreshToken,
	/// Platform rejected a refresh or authorization-code exchange.
	#[error("Platform rejected the {grant} request with `{error}`: {message}")]
	Rejected {
		/// Grant label (`refresh_token` or `authorization_code`).
		grant: &'static str,
		/// Classification of the platform error code.
		kind: PlatformErrorKind,
		/// Platform error code.
		error: String,
		/// Platform message.
		message: String,
		/// Platform request identifier, when returned.
		request_id: Option<String>,
	},
	/// Token endpoint responded without an access token.
	#[error("Token endpoint response for the {grant} request lacks an access token.")]
	MissingAccessToken {
		/// Grant label (`refresh_token` or `authorization_code`).
		grant: &'static str,
	},
	/// A refresh failed for good; calls keep failing until the operator reauthorizes.
	///
	/// Returned by the refresh that gave up on transport failures and by every call made while
	/// the manager stays failed.
	#[error("Reauthorization required: {reason}")]
	ReauthorizationRequired {
		/// Failure that moved the manager into the failed state.
		reason: String,
		/// Classification of the platform rejection behind the failure, if there was one.
		kind: Option<PlatformErrorKind>,
	},
}

/// Application-level error returned by the platform on a data call.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Platform returned `{error}` ({kind}): {message}")]
pub struct PlatformError {
	/// Classification of the platform error code.
	pub kind: PlatformErrorKind,
	/// Platform error code (e.g., `error_sign`).
	pub error: String,
	/// Platform message.
	pub message: String,
	/// Platform request identifier, when returned.
	pub request_id: Option<String>,
	/// HTTP status code of the response.
	pub status: Option<u16>,
}

/// Transport-level failures (network, IO, malformed bodies).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the platform.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request exceeded its timeout.
	#[error("Request timed out while calling the platform.")]
	Timeout,
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the platform.")]
	Io(#[from] std::io::Error),
	/// Platform responded with a body that could not be decoded.
	#[error("Platform returned a malformed response body.")]
	MalformedResponse {
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Returns `true` for failures worth a bounded retry.
	///
	/// Undecodable bodies only qualify when they came with a 5xx status (gateway pages).
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Network { .. } | Self::Timeout | Self::Io(_) => true,
			Self::MalformedResponse { status, .. } => status.is_some_and(|s| s >= 500),
		}
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn signature_failures_are_distinct_from_token_failures() {
		let signature: Error = PlatformError {
			kind: PlatformErrorKind::Signature,
			error: "error_sign".into(),
			message: "Wrong sign.".into(),
			request_id: None,
			status: Some(403),
		}
		.into();
		let token: Error =
			TokenError::ReauthorizationRequired { reason: "expired".into(), kind: None }.into();

		assert!(signature.is_signature_failure());
		assert!(!signature.requires_reauthorization());
		assert!(token.requires_reauthorization());
		assert!(!token.is_signature_failure());

		let failed_on_sign: Error = TokenError::ReauthorizationRequired {
			reason: "error_sign".into(),
			kind: Some(PlatformErrorKind::Signature),
		}
		.into();

		assert!(failed_on_sign.is_signature_failure());
		assert!(failed_on_sign.requires_reauthorization());
	}

	#[test]
	fn platform_messages_keep_their_own_punctuation() {
		let platform = PlatformError {
			kind: PlatformErrorKind::Signature,
			error: "error_sign".into(),
			message: "Wrong sign.".into(),
			request_id: None,
			status: Some(403),
		};
		let rejected = TokenError::Rejected {
			grant: "refresh_token",
			kind: PlatformErrorKind::Token,
			error: "error_expired".into(),
			message: "Refresh token expired.".into(),
			request_id: None,
		};

		assert!(platform.to_string().ends_with(": Wrong sign."));
		assert!(rejected.to_string().ends_with(": Refresh token expired."));
	}

	#[test]
	fn only_network_class_transport_errors_are_retryable() {
		assert!(Error::from(TransportError::Timeout).is_retryable());

		let source = serde_path_to_error::deserialize::<_, serde_json::Value>(
			&mut serde_json::Deserializer::from_str("<html>"),
		)
		.expect_err("HTML body should not parse as JSON.");

		assert!(!Error::from(TransportError::MalformedResponse { status: Some(200), source })
			.is_retryable());
		assert!(!Error::from(SigningError::EmptyPath).is_retryable());
	}
}
