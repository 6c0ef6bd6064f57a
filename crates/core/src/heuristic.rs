//! Deciding whether the post-login view is showing.
//!
//! Two rules, evaluated from scratch on every call:
//!
//! * enough primary markers plus corroborating secondary markers, or
//! * at least one primary marker while the URL is on the site host and off
//!   every login/auth path.
//!
//! Evaluation only reads page state.

use std::time::Duration;

use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::config::HeuristicConfig;
use crate::probe::ProbeList;
use crate::session::BrowserSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CompletionReason {
	/// Primary and secondary marker counts met their thresholds.
	Markers,
	/// A primary marker is visible and the URL left the login paths.
	LeftLoginPage,
	/// The URL differs from the one captured when waiting began.
	UrlChanged,
}

impl std::fmt::Display for CompletionReason {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			CompletionReason::Markers => write!(f, "post-login markers visible"),
			CompletionReason::LeftLoginPage => write!(f, "left login page"),
			CompletionReason::UrlChanged => write!(f, "url changed"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
	pub primary_visible: usize,
	pub secondary_visible: usize,
	pub url: String,
	pub reason: Option<CompletionReason>,
}

impl Evaluation {
	pub fn is_complete(&self) -> bool {
		self.reason.is_some()
	}
}

#[derive(Debug, Clone)]
pub struct SuccessRules {
	primary: ProbeList,
	secondary: ProbeList,
	host: String,
	thresholds: HeuristicConfig,
}

impl SuccessRules {
	pub fn new(primary: ProbeList, secondary: ProbeList, host: impl Into<String>, thresholds: HeuristicConfig) -> Self {
		Self {
			primary,
			secondary,
			host: host.into(),
			thresholds,
		}
	}

	/// Markers of the campaign dashboard that appears after SMS login.
	pub fn campaign(host: impl Into<String>, thresholds: HeuristicConfig) -> Self {
		let timeout = Duration::from_millis(thresholds.marker_timeout_ms);
		let primary = ProbeList::from_selectors(
			[
				("tab-code-heading", r#"text="ENTER TAB CODE HERE""#),
				("programs", r#"text="PROGRAMS""#),
				("tabs-available", r#"text="TABS AVAILABLE""#),
			],
			timeout,
		);
		let secondary = ProbeList::from_selectors(
			[
				("tab-code-input", r#"input[placeholder*="ENTER TAB CODE"]"#),
				("enter-button", r#"button:has-text("ENTER")"#),
				("explore-programs", r#"text="Explore the programs below""#),
			],
			timeout,
		);
		Self::new(primary, secondary, host, thresholds)
	}

	pub fn primary(&self) -> &ProbeList {
		&self.primary
	}

	pub fn secondary(&self) -> &ProbeList {
		&self.secondary
	}

	pub fn host(&self) -> &str {
		&self.host
	}

	/// Whether the URL path matches any login/auth pattern.
	///
	/// Unparseable URLs are matched as raw strings.
	pub fn is_login_url(&self, url: &str) -> bool {
		let haystack = match Url::parse(url) {
			Ok(parsed) => parsed.path().to_string(),
			Err(_) => url.to_string(),
		};
		self.thresholds
			.login_path_patterns
			.iter()
			.any(|pattern| haystack.contains(pattern.as_str()))
	}

	pub fn is_on_site(&self, url: &str) -> bool {
		Url::parse(url)
			.ok()
			.and_then(|parsed| parsed.host_str().map(|h| h.eq_ignore_ascii_case(&self.host)))
			.unwrap_or(false)
	}

	pub fn left_login_page(&self, url: &str) -> bool {
		self.is_on_site(url) && !self.is_login_url(url)
	}

	/// The decision itself, given marker counts and a URL.
	pub fn decide(&self, primary_visible: usize, secondary_visible: usize, url: &str) -> Option<CompletionReason> {
		let t = &self.thresholds;
		if primary_visible >= t.min_primary && secondary_visible >= t.min_secondary {
			return Some(CompletionReason::Markers);
		}
		if primary_visible >= t.fallback_min_primary && self.left_login_page(url) {
			return Some(CompletionReason::LeftLoginPage);
		}
		None
	}

	/// Count visible markers and decide against `url`.
	pub async fn evaluate_at(&self, session: &dyn BrowserSession, url: &str) -> Evaluation {
		let primary_visible = self.primary.count_visible(session).await;
		let secondary_visible = self.secondary.count_visible(session).await;
		let reason = self.decide(primary_visible, secondary_visible, url);
		debug!(primary_visible, secondary_visible, url, ?reason, "evaluated success markers");
		Evaluation {
			primary_visible,
			secondary_visible,
			url: url.to_string(),
			reason,
		}
	}

	pub async fn evaluate(&self, session: &dyn BrowserSession) -> Evaluation {
		let url = session.url();
		self.evaluate_at(session, &url).await
	}

	pub async fn is_action_complete(&self, session: &dyn BrowserSession) -> bool {
		self.evaluate(session).await.is_complete()
	}
}
