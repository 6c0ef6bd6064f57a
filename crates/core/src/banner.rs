//! Cookie-consent banner dismissal.
//!
//! The banner shows up under several markups and can come back after
//! client-side navigation, so this runs once per page load and once per
//! handoff poll tick. It never fails.

use std::time::Duration;

use tracing::{debug, info};

use crate::config::BannerConfig;
use crate::probe::{Probe, ProbeList};
use crate::session::BrowserSession;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dismissal {
	Dismissed { probe: String },
	NotPresent,
}

impl Dismissal {
	pub fn dismissed(&self) -> bool {
		matches!(self, Dismissal::Dismissed { .. })
	}
}

#[derive(Debug, Clone)]
pub struct BannerDismisser {
	probes: ProbeList,
	settle: Duration,
}

impl BannerDismisser {
	pub fn new(probes: ProbeList, settle: Duration) -> Self {
		Self { probes, settle }
	}

	/// Accept controls seen on the campaign site, most specific first.
	pub fn cookie_consent(config: &BannerConfig) -> Self {
		let timeout = Duration::from_millis(config.probe_timeout_ms);
		let probes = ProbeList::new(vec![
			Probe::new("exact-upper", r#"button:text-is("ACCEPT COOKIES")"#, timeout),
			Probe::new("exact-title", r#"button:text-is("Accept Cookies")"#, timeout),
			Probe::new("text-upper", r#"button:has-text("ACCEPT COOKIES")"#, timeout),
			Probe::new("text-any-case", r#"button:has-text("accept cookies")"#, timeout),
			Probe::new("class-cookie", r#"button[class*="cookie"]"#, timeout),
			Probe::new("test-id", r#"[data-testid="accept-cookies"]"#, timeout),
			Probe::new("accept-class", ".cookie-accept", timeout),
			Probe::new("id-cookie", r#"button[id*="cookie"]"#, timeout),
		]);
		Self::new(probes, Duration::from_millis(config.settle_ms))
	}

	pub fn probes(&self) -> &ProbeList {
		&self.probes
	}

	/// Click the first visible accept control.
	///
	/// A candidate whose click fails (detached mid-query, covered) is skipped
	/// like an invisible one.
	pub async fn dismiss_if_present(&self, session: &dyn BrowserSession) -> Dismissal {
		for probe in self.probes.iter() {
			if !probe.is_visible(session).await {
				continue;
			}
			match session.click(&probe.selector).await {
				Ok(()) => {
					info!(probe = %probe.name, "dismissed cookie banner");
					session.pause(self.settle).await;
					return Dismissal::Dismissed { probe: probe.name.clone() };
				}
				Err(err) => {
					debug!(probe = %probe.name, error = %err, "cookie banner click failed, trying next candidate");
				}
			}
		}
		debug!("no cookie banner present");
		Dismissal::NotPresent
	}
}
