//! Browser session abstraction.
//!
//! Everything in this crate takes a [`BrowserSession`] explicitly instead of
//! reaching for a shared page handle. [`crate::engine::PlaywrightSession`] is
//! the real implementation; tests use the scripted session in
//! [`crate::testing`].
//!
//! Selectors use Playwright's selector syntax (`text="PROGRAMS"`,
//! `button:has-text("LOGIN")`, CSS). Element queries act on the first match.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::Result;

/// Delay between attempts in the polling helpers.
pub const QUERY_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
	Load,
	DomContentLoaded,
	#[default]
	NetworkIdle,
}

#[async_trait]
pub trait BrowserSession: Send + Sync {
	async fn goto(&self, url: &str) -> Result<()>;

	/// Current page URL. Never blocks.
	fn url(&self) -> String;

	async fn wait_for_load_state(&self, state: LoadState) -> Result<()>;

	/// Snapshot visibility of the first match; absent elements are not visible.
	async fn is_visible(&self, selector: &str) -> Result<bool>;

	async fn is_enabled(&self, selector: &str) -> Result<bool>;

	async fn count(&self, selector: &str) -> Result<usize>;

	async fn text(&self, selector: &str) -> Result<Option<String>>;

	async fn input_value(&self, selector: &str) -> Result<String>;

	async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>>;

	async fn click(&self, selector: &str) -> Result<()>;

	async fn fill(&self, selector: &str, value: &str) -> Result<()>;

	async fn clear(&self, selector: &str) -> Result<()>;

	async fn press(&self, selector: &str, key: &str) -> Result<()>;

	/// Evaluate a JavaScript expression and return its value as a string.
	async fn evaluate(&self, expression: &str) -> Result<String>;

	async fn screenshot(&self, path: &Path, full_page: bool) -> Result<()>;

	/// Opaque authentication state (cookies and per-origin storage).
	async fn storage_state(&self) -> Result<serde_json::Value>;

	async fn restore_storage_state(&self, state: &serde_json::Value) -> Result<()>;

	async fn close(&self) -> Result<()> {
		Ok(())
	}

	async fn pause(&self, duration: Duration) {
		tokio::time::sleep(duration).await;
	}

	/// Visibility check bounded by `timeout`; a query still pending when the
	/// timeout fires counts as not visible.
	async fn is_visible_within(&self, selector: &str, timeout: Duration) -> Result<bool> {
		match tokio::time::timeout(timeout, self.is_visible(selector)).await {
			Ok(result) => result,
			Err(_) => Ok(false),
		}
	}

	async fn is_enabled_within(&self, selector: &str, timeout: Duration) -> Result<bool> {
		match tokio::time::timeout(timeout, self.is_enabled(selector)).await {
			Ok(result) => result,
			Err(_) => Ok(false),
		}
	}

	/// Poll until the selector is visible. `Ok(false)` once `timeout` elapses.
	async fn wait_for_visible(&self, selector: &str, timeout: Duration) -> Result<bool> {
		let deadline = Instant::now() + timeout;
		loop {
			if self.is_visible(selector).await? {
				return Ok(true);
			}
			if Instant::now() >= deadline {
				return Ok(false);
			}
			tokio::time::sleep(QUERY_POLL_INTERVAL).await;
		}
	}

	/// Poll until the current URL satisfies `predicate`.
	async fn wait_for_url(&self, predicate: &(dyn for<'u> Fn(&'u str) -> bool + Send + Sync), timeout: Duration) -> Result<bool> {
		let deadline = Instant::now() + timeout;
		loop {
			if predicate(&self.url()) {
				return Ok(true);
			}
			if Instant::now() >= deadline {
				return Ok(false);
			}
			tokio::time::sleep(QUERY_POLL_INTERVAL).await;
		}
	}
}

/// Opens one isolated browser session per scenario.
#[async_trait]
pub trait SessionFactory: Send + Sync {
	async fn open(&self, scenario: &str) -> Result<Arc<dyn BrowserSession>>;
}
