//! Ordered, named element probes.
//!
//! A probe is one way of finding something on the page (a selector plus a
//! short timeout). A [`ProbeList`] is evaluated in order; query failures are
//! swallowed and count as "not visible".

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::session::BrowserSession;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Probe {
	pub name: String,
	pub selector: String,
	pub timeout_ms: u64,
}

impl Probe {
	pub fn new(name: impl Into<String>, selector: impl Into<String>, timeout: Duration) -> Self {
		Self {
			name: name.into(),
			selector: selector.into(),
			timeout_ms: timeout.as_millis() as u64,
		}
	}

	pub fn timeout(&self) -> Duration {
		Duration::from_millis(self.timeout_ms)
	}

	/// Bounded visibility check. Never fails.
	pub async fn is_visible(&self, session: &dyn BrowserSession) -> bool {
		match session.is_visible_within(&self.selector, self.timeout()).await {
			Ok(visible) => visible,
			Err(err) => {
				debug!(probe = %self.name, selector = %self.selector, error = %err, "probe query failed, treating as not visible");
				false
			}
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeList {
	probes: Vec<Probe>,
}

impl ProbeList {
	pub fn new(probes: Vec<Probe>) -> Self {
		Self { probes }
	}

	/// Build from `(name, selector)` pairs sharing one timeout.
	pub fn from_selectors<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>, timeout: Duration) -> Self {
		Self {
			probes: pairs
				.into_iter()
				.map(|(name, selector)| Probe::new(name, selector, timeout))
				.collect(),
		}
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		let ms = timeout.as_millis() as u64;
		for probe in &mut self.probes {
			probe.timeout_ms = ms;
		}
		self
	}

	pub fn iter(&self) -> impl Iterator<Item = &Probe> {
		self.probes.iter()
	}

	pub fn len(&self) -> usize {
		self.probes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.probes.is_empty()
	}

	/// First probe whose element is visible; later probes are not queried.
	pub async fn first_visible(&self, session: &dyn BrowserSession) -> Option<&Probe> {
		for probe in &self.probes {
			if probe.is_visible(session).await {
				return Some(probe);
			}
		}
		None
	}

	/// Names of every probe whose element is visible.
	pub async fn visible(&self, session: &dyn BrowserSession) -> Vec<&str> {
		let mut names = Vec::new();
		for probe in &self.probes {
			if probe.is_visible(session).await {
				names.push(probe.name.as_str());
			}
		}
		names
	}

	pub async fn count_visible(&self, session: &dyn BrowserSession) -> usize {
		self.visible(session).await.len()
	}
}
