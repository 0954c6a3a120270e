//! Platform strategy hooks that classify application-level error codes.
//!
//! Implementations map the platform's `error` / `message` pair onto [`PlatformErrorKind`] so flows
//! can tell a broken signature apart from an expired token without touching any HTTP client type.

// self
use crate::_prelude::*;

/// Strategy hook that classifies platform error codes.
///
/// Implementors must be `Send + Sync`; the hook works on crate-owned data only.
pub trait PlatformStrategy: Send + Sync {
	/// Maps a platform error response into the broker taxonomy.
	fn classify_error(&self, ctx: &PlatformErrorContext) -> PlatformErrorKind;
}

/// Canonical platform error categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlatformErrorKind {
	/// Request signature was rejected; a configuration bug, not an operational one.
	Signature,
	/// Access or refresh token is invalid, expired, or lacks permission.
	Token,
	/// Partner exceeded the platform's call quota.
	RateLimited,
	/// Platform-side failure that may clear on its own.
	Transient,
	/// Any other application error (bad parameter, missing item...).
	Other,
}
impl PlatformErrorKind {
	/// Returns a stable label suitable for logs and metrics.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Signature => "signature",
			Self::Token => "token",
			Self::RateLimited => "rate_limited",
			Self::Transient => "transient",
			Self::Other => "other",
		}
	}
}
impl Display for PlatformErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Context passed to strategies when classifying platform errors.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlatformErrorContext {
	/// Canonical path of the failing call.
	pub path: String,
	/// HTTP status code, when available.
	pub http_status: Option<u16>,
	/// Platform `error` field.
	pub error: String,
	/// Platform `message` field.
	pub message: String,
}
impl PlatformErrorContext {
	/// Creates a new context for the provided path and error code.
	pub fn new(path: impl Into<String>, error: impl Into<String>) -> Self {
		Self { path: path.into(), error: error.into(), ..Default::default() }
	}

	/// Adds an HTTP status code.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the platform message.
	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = message.into();

		self
	}
}

/// Default strategy based on the platform's published error codes.
///
/// The error code is checked first, then the message text, and finally the HTTP status.
/// Signature failures always win over token hints because `error_sign` responses often mention
/// the access token in their message.
#[derive(Debug, Default)]
pub struct DefaultPlatformStrategy;
impl Display for DefaultPlatformStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("default-platform-strategy")
	}
}
impl PlatformStrategy for DefaultPlatformStrategy {
	fn classify_error(&self, ctx: &PlatformErrorContext) -> PlatformErrorKind {
		classify_code(&ctx.error)
			.or_else(|| classify_message(&ctx.message))
			.unwrap_or_else(|| classify_status(ctx.http_status))
	}
}

fn classify_code(code: &str) -> Option<PlatformErrorKind> {
	let code = code.trim().to_ascii_lowercase();

	match code.as_str() {
		"" => return None,
		"error_sign" | "error_signature" | "invalid_sign" => return Some(PlatformErrorKind::Signature),
		"error_auth" | "error_expired" | "error_token" | "invalid_access_token"
		| "invalid_acceess_token" | "invalid_refresh_token" => return Some(PlatformErrorKind::Token),
		"error_too_many_request" | "error_rate_limit" => return Some(PlatformErrorKind::RateLimited),
		"error_server" | "error_inner" | "error_busy" | "error_timeout" =>
			return Some(PlatformErrorKind::Transient),
		_ => {},
	}

	// Unlisted codes still follow the `error_<topic>` naming; only whole segments count.
	let segments = || code.split(|c: char| !c.is_ascii_alphanumeric());

	if segments().any(|s| s == "sign" || s == "signature") {
		Some(PlatformErrorKind::Signature)
	} else if segments().any(|s| matches!(s, "token" | "auth" | "expired")) {
		Some(PlatformErrorKind::Token)
	} else if segments().any(|s| s == "limit") {
		Some(PlatformErrorKind::RateLimited)
	} else {
		None
	}
}

fn classify_message(message: &str) -> Option<PlatformErrorKind> {
	const PHRASES: &[(&str, PlatformErrorKind)] = &[
		("wrong sign", PlatformErrorKind::Signature),
		("invalid sign", PlatformErrorKind::Signature),
		("sign is invalid", PlatformErrorKind::Signature),
		("invalid access_token", PlatformErrorKind::Token),
		("invalid refresh_token", PlatformErrorKind::Token),
		("access_token expired", PlatformErrorKind::Token),
		("access_token has expired", PlatformErrorKind::Token),
		("refresh_token expired", PlatformErrorKind::Token),
		("too many requests", PlatformErrorKind::RateLimited),
		("system busy", PlatformErrorKind::Transient),
		("system error", PlatformErrorKind::Transient),
	];

	let message = message.to_ascii_lowercase();

	PHRASES.iter().find(|(phrase, _)| message.contains(*phrase)).map(|(_, kind)| *kind)
}

fn classify_status(status: Option<u16>) -> PlatformErrorKind {
	match status {
		Some(401 | 403) => PlatformErrorKind::Token,
		Some(429) => PlatformErrorKind::RateLimited,
		Some(code) if code >= 500 => PlatformErrorKind::Transient,
		_ => PlatformErrorKind::Other,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn classify(error: &str, message: &str) -> PlatformErrorKind {
		DefaultPlatformStrategy
			.classify_error(&PlatformErrorContext::new("/api/v2/x", error).with_message(message))
	}

	#[test]
	fn signature_errors_are_not_token_errors() {
		assert_eq!(classify("error_sign", "Wrong sign, access_token mismatch."), PlatformErrorKind::Signature);
		assert_eq!(classify("error_auth", "Invalid access_token."), PlatformErrorKind::Token);
		assert_eq!(classify("invalid_access_token", ""), PlatformErrorKind::Token);
		assert_eq!(classify("error_expired", ""), PlatformErrorKind::Token);
	}

	#[test]
	fn quota_and_server_errors_have_their_own_kinds() {
		assert_eq!(classify("error_too_many_request", ""), PlatformErrorKind::RateLimited);
		assert_eq!(classify("error_server", "System busy."), PlatformErrorKind::Transient);
		assert_eq!(classify("error_not_found", "Item not found."), PlatformErrorKind::Other);
	}

	#[test]
	fn loose_words_in_messages_do_not_classify() {
		assert_eq!(
			classify("error_param", "Assignment design for this shop is incomplete."),
			PlatformErrorKind::Other
		);
		assert_eq!(classify("error_param", "Access denied for the partner."), PlatformErrorKind::Other);
		assert_eq!(classify("error_param", "Wrong sign."), PlatformErrorKind::Signature);
		assert_eq!(classify("error_design", ""), PlatformErrorKind::Other);
		assert_eq!(classify("error_refresh_token_invalid", ""), PlatformErrorKind::Token);
	}

	#[test]
	fn status_is_the_last_resort() {
		let ctx = PlatformErrorContext::new("/api/v2/x", "error_unknown").with_http_status(503);

		assert_eq!(DefaultPlatformStrategy.classify_error(&ctx), PlatformErrorKind::Transient);
	}
}
