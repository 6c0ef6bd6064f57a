use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, E2eError>;

#[derive(Debug, Error)]
pub enum E2eError {
	#[error("browser launch failed: {0}")]
	BrowserLaunch(String),

	#[error("navigation failed: {url}")]
	Navigation {
		url: String,
		#[source]
		source: Box<E2eError>,
	},

	#[error("timeout after {ms}ms waiting for: {condition}")]
	Timeout { ms: u64, condition: String },

	#[error("expected {expectation}: {message}")]
	Assertion { expectation: String, message: String },

	/// The human never finished the out-of-band step within the budget.
	#[error("manual step not completed after {waited_secs}s (last url: {url})")]
	HandoffNotCompleted { waited_secs: u64, url: String },

	/// The page looked finished, but the explicit re-check disagreed.
	#[error("login appeared to complete but verification failed at {url}: {reason}")]
	VerificationFailed { url: String, reason: String },

	#[error("auth state at {path}: {message}")]
	AuthState { path: PathBuf, message: String },

	#[error("invalid configuration: {0}")]
	Config(String),

	#[error("javascript evaluation failed: {0}")]
	JsEval(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Url(#[from] url::ParseError),

	#[error(transparent)]
	Playwright(#[from] playwright_rs::Error),
}

/// Stable classification used in run reports and JSON output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	BrowserLaunchFailed,
	NavigationFailed,
	Timeout,
	AssertionFailed,
	HandoffNotCompleted,
	VerificationFailed,
	AuthStateError,
	InvalidConfig,
	JsEvalFailed,
	IoError,
	InternalError,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			ErrorCode::BrowserLaunchFailed => "BROWSER_LAUNCH_FAILED",
			ErrorCode::NavigationFailed => "NAVIGATION_FAILED",
			ErrorCode::Timeout => "TIMEOUT",
			ErrorCode::AssertionFailed => "ASSERTION_FAILED",
			ErrorCode::HandoffNotCompleted => "HANDOFF_NOT_COMPLETED",
			ErrorCode::VerificationFailed => "VERIFICATION_FAILED",
			ErrorCode::AuthStateError => "AUTH_STATE_ERROR",
			ErrorCode::InvalidConfig => "INVALID_CONFIG",
			ErrorCode::JsEvalFailed => "JS_EVAL_FAILED",
			ErrorCode::IoError => "IO_ERROR",
			ErrorCode::InternalError => "INTERNAL_ERROR",
		};
		f.write_str(s)
	}
}

impl E2eError {
	pub fn assertion(expectation: impl Into<String>, message: impl Into<String>) -> Self {
		E2eError::Assertion {
			expectation: expectation.into(),
			message: message.into(),
		}
	}

	pub fn navigation(url: impl Into<String>, source: E2eError) -> Self {
		E2eError::Navigation {
			url: url.into(),
			source: Box::new(source),
		}
	}

	pub fn code(&self) -> ErrorCode {
		match self {
			E2eError::BrowserLaunch(_) => ErrorCode::BrowserLaunchFailed,
			E2eError::Navigation { .. } => ErrorCode::NavigationFailed,
			E2eError::Timeout { .. } => ErrorCode::Timeout,
			E2eError::Assertion { .. } => ErrorCode::AssertionFailed,
			E2eError::HandoffNotCompleted { .. } => ErrorCode::HandoffNotCompleted,
			E2eError::VerificationFailed { .. } => ErrorCode::VerificationFailed,
			E2eError::AuthState { .. } => ErrorCode::AuthStateError,
			E2eError::Config(_) => ErrorCode::InvalidConfig,
			E2eError::JsEval(_) => ErrorCode::JsEvalFailed,
			E2eError::Io(_) => ErrorCode::IoError,
			E2eError::Json(_) | E2eError::Url(_) => ErrorCode::InternalError,
			E2eError::Playwright(err) => classify_engine_error(&err.to_string()),
		}
	}
}

/// Map an engine error message onto a code.
///
/// The engine reports timeouts and navigation problems only through message
/// text, so this is a best-effort match.
fn classify_engine_error(msg: &str) -> ErrorCode {
	if msg.contains("Timeout") || msg.contains("timeout") {
		ErrorCode::Timeout
	} else if msg.contains("navigat") {
		ErrorCode::NavigationFailed
	} else if msg.contains("Failed to launch") {
		ErrorCode::BrowserLaunchFailed
	} else {
		ErrorCode::InternalError
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn verification_and_handoff_have_distinct_codes_and_messages() {
		let never = E2eError::HandoffNotCompleted {
			waited_secs: 300,
			url: "https://site/login".into(),
		};
		let unverified = E2eError::VerificationFailed {
			url: "https://site/login".into(),
			reason: "still on login path".into(),
		};

		assert_ne!(never.code(), unverified.code());
		assert!(never.to_string().contains("not completed"));
		assert!(unverified.to_string().contains("appeared to complete"));
	}

	#[test]
	fn navigation_keeps_source() {
		let err = E2eError::navigation("https://site/home", E2eError::Timeout { ms: 100, condition: "load".into() });
		assert_eq!(err.code(), ErrorCode::NavigationFailed);
		let source = std::error::Error::source(&err).map(|s| s.to_string()).unwrap_or_default();
		assert!(source.contains("100ms"));
	}

	#[test]
	fn engine_messages_are_classified() {
		assert_eq!(classify_engine_error("Timeout 30000ms exceeded"), ErrorCode::Timeout);
		assert_eq!(classify_engine_error("net::ERR_ABORTED while navigating"), ErrorCode::NavigationFailed);
		assert_eq!(classify_engine_error("something else"), ErrorCode::InternalError);
	}

	#[test]
	fn error_code_display_matches_serde() {
		let json = serde_json::to_string(&ErrorCode::VerificationFailed).unwrap();
		assert_eq!(json, format!("\"{}\"", ErrorCode::VerificationFailed));
	}
}
