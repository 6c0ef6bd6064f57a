//! Final re-check after a manual login.
//!
//! A completed handoff only says the page *looked* finished at one instant.
//! Before anything is persisted, [`verify_login`] re-checks the URL and waits
//! for a primary marker. Its [`VerifiedLogin`] token is the only way to reach
//! [`crate::auth_state::export_verified`].

use std::time::Duration;

use tracing::{info, warn};

use crate::error::{E2eError, Result};
use crate::heuristic::SuccessRules;
use crate::session::{BrowserSession, LoadState};

/// Wait per primary marker during verification.
pub const MARKER_WAIT: Duration = Duration::from_secs(2);

/// Proof that the session passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedLogin {
	url: String,
	marker: String,
}

impl VerifiedLogin {
	pub fn url(&self) -> &str {
		&self.url
	}

	pub fn marker(&self) -> &str {
		&self.marker
	}
}

pub async fn verify_login(session: &dyn BrowserSession, rules: &SuccessRules, marker_wait: Duration) -> Result<VerifiedLogin> {
	let url = session.url();
	if rules.is_login_url(&url) {
		return Err(E2eError::VerificationFailed {
			url,
			reason: "still on a login path".into(),
		});
	}

	if let Err(err) = session.wait_for_load_state(LoadState::NetworkIdle).await {
		warn!(error = %err, "load state wait failed during verification");
	}

	for probe in rules.primary().iter() {
		match session.wait_for_visible(&probe.selector, marker_wait).await {
			Ok(true) => {
				info!(marker = %probe.name, url = %url, "login verified");
				return Ok(VerifiedLogin {
					url,
					marker: probe.name.clone(),
				});
			}
			Ok(false) => {}
			Err(err) => warn!(marker = %probe.name, error = %err, "marker query failed during verification"),
		}
	}

	Err(E2eError::VerificationFailed {
		url,
		reason: format!("none of {} primary markers became visible", rules.primary().len()),
	})
}
