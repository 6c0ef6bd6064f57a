//! [`BrowserSession`] over `playwright-rs`.
//!
//! One Playwright driver, one Chromium instance, one context and one page per
//! session. Element queries go through `locator(..).first()` so a selector
//! matching several nodes behaves like a single-element query.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use playwright_rs::api::LaunchOptions;
use playwright_rs::protocol::{Browser, BrowserContext, Locator, Origin as OriginState, Page, Playwright, ScreenshotOptions, StorageState};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{E2eError, Result};
use crate::session::{BrowserSession, LoadState, QUERY_POLL_INTERVAL, SessionFactory};

/// Extra wait after `readyState == "complete"` standing in for network idle.
const NETWORK_IDLE_SETTLE: Duration = Duration::from_millis(500);

const READY_STATE_JS: &str = "document.readyState";

/// Writes one origin's local storage; cookies go through the context instead.
const RESTORE_LOCAL_STORAGE_JS: &str = r#"(() => {
	const entries = __ENTRIES__;
	for (const item of entries) localStorage.setItem(item.name, item.value);
	return String(entries.length);
})()"#;

pub struct PlaywrightSession {
	// Dropping the driver shuts the browser down, so it lives as long as the page.
	_playwright: Playwright,
	browser: Browser,
	context: BrowserContext,
	page: Page,
	timeout: Duration,
}

impl PlaywrightSession {
	pub async fn launch(headless: bool, timeout: Duration) -> Result<Self> {
		let playwright = Playwright::launch()
			.await
			.map_err(|e| E2eError::BrowserLaunch(format!("playwright driver: {e}")))?;
		let browser = playwright
			.chromium()
			.launch_with_options(LaunchOptions::new().headless(headless))
			.await
			.map_err(|e| E2eError::BrowserLaunch(format!("chromium: {e}")))?;
		let context = browser.new_context().await?;
		let page = context.new_page().await?;
		info!(headless, "browser session opened");
		Ok(Self {
			_playwright: playwright,
			browser,
			context,
			page,
			timeout,
		})
	}

	async fn first(&self, selector: &str) -> Locator {
		self.page.locator(selector).await.first()
	}

	async fn ready_state(&self) -> Result<String> {
		let state = self.page.evaluate_value(READY_STATE_JS).await?;
		Ok(state.trim_matches('"').to_string())
	}

	async fn restore_local_storage(&self, origin: &OriginState) -> Result<()> {
		if origin.local_storage.is_empty() {
			return Ok(());
		}
		self.goto(&origin.origin).await?;
		let js = RESTORE_LOCAL_STORAGE_JS.replace("__ENTRIES__", &serde_json::to_string(&origin.local_storage)?);
		let applied = self
			.page
			.evaluate_value(&js)
			.await
			.map_err(|e| E2eError::JsEval(format!("restore local storage for {}: {e}", origin.origin)))?;
		debug!(origin = %origin.origin, applied = %applied, "restored local storage");
		Ok(())
	}
}

/// Parse a saved blob into the engine's own storage-state type.
fn parse_storage_state(state: &Value) -> Result<StorageState> {
	serde_json::from_value(state.clone()).map_err(|e| E2eError::AuthState {
		path: PathBuf::from("storageState"),
		message: format!("not a browser storage state: {e}"),
	})
}

#[async_trait]
impl BrowserSession for PlaywrightSession {
	async fn goto(&self, url: &str) -> Result<()> {
		debug!(url, "navigating");
		self.page
			.goto(url, None)
			.await
			.map_err(|e| E2eError::navigation(url, e.into()))?;
		Ok(())
	}

	fn url(&self) -> String {
		self.page.url()
	}

	/// `NetworkIdle` has no direct equivalent here; it is a complete document
	/// plus a short settle.
	async fn wait_for_load_state(&self, state: LoadState) -> Result<()> {
		let deadline = Instant::now() + self.timeout;
		loop {
			let ready = self.ready_state().await?;
			let reached = match state {
				LoadState::DomContentLoaded => ready == "interactive" || ready == "complete",
				LoadState::Load | LoadState::NetworkIdle => ready == "complete",
			};
			if reached {
				break;
			}
			if Instant::now() >= deadline {
				return Err(E2eError::Timeout {
					ms: self.timeout.as_millis() as u64,
					condition: format!("load state {state:?} (readyState {ready})"),
				});
			}
			tokio::time::sleep(QUERY_POLL_INTERVAL).await;
		}
		if state == LoadState::NetworkIdle {
			tokio::time::sleep(NETWORK_IDLE_SETTLE).await;
		}
		Ok(())
	}

	async fn is_visible(&self, selector: &str) -> Result<bool> {
		Ok(self.first(selector).await.is_visible().await?)
	}

	async fn is_enabled(&self, selector: &str) -> Result<bool> {
		Ok(self.first(selector).await.is_enabled().await?)
	}

	async fn count(&self, selector: &str) -> Result<usize> {
		Ok(self.page.locator(selector).await.count().await?)
	}

	async fn text(&self, selector: &str) -> Result<Option<String>> {
		Ok(self.first(selector).await.text_content().await?)
	}

	async fn input_value(&self, selector: &str) -> Result<String> {
		Ok(self.first(selector).await.input_value(None).await?)
	}

	async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
		Ok(self.first(selector).await.get_attribute(name).await?)
	}

	async fn click(&self, selector: &str) -> Result<()> {
		Ok(self.first(selector).await.click(None).await?)
	}

	async fn fill(&self, selector: &str, value: &str) -> Result<()> {
		Ok(self.first(selector).await.fill(value, None).await?)
	}

	async fn clear(&self, selector: &str) -> Result<()> {
		Ok(self.first(selector).await.clear(None).await?)
	}

	async fn press(&self, selector: &str, key: &str) -> Result<()> {
		Ok(self.first(selector).await.press(key, None).await?)
	}

	async fn evaluate(&self, expression: &str) -> Result<String> {
		self.page
			.evaluate_value(expression)
			.await
			.map_err(|e| E2eError::JsEval(e.to_string()))
	}

	async fn screenshot(&self, path: &Path, full_page: bool) -> Result<()> {
		if let Some(parent) = path.parent() {
			if !parent.as_os_str().is_empty() {
				std::fs::create_dir_all(parent)?;
			}
		}
		let options = ScreenshotOptions::builder().full_page(full_page).build();
		self.page.screenshot_to_file(path, Some(options)).await?;
		Ok(())
	}

	/// Context-wide snapshot from the engine, HttpOnly cookies included.
	async fn storage_state(&self) -> Result<Value> {
		let state = self.context.storage_state().await?;
		debug!(cookies = state.cookies.len(), origins = state.origins.len(), "captured storage state");
		Ok(serde_json::to_value(&state)?)
	}

	/// Cookies are added to the context with all their attributes; local
	/// storage is written from each origin.
	async fn restore_storage_state(&self, state: &Value) -> Result<()> {
		let state = parse_storage_state(state)?;
		if !state.cookies.is_empty() {
			debug!(cookies = state.cookies.len(), "adding cookies to context");
			self.context.add_cookies(&state.cookies).await?;
		}
		for origin in &state.origins {
			self.restore_local_storage(origin).await?;
		}
		Ok(())
	}

	async fn close(&self) -> Result<()> {
		if let Err(err) = self.context.close().await {
			warn!(error = %err, "closing browser context failed");
		}
		self.browser.close().await?;
		debug!("browser session closed");
		Ok(())
	}
}

/// Launches a fresh Chromium per scenario.
#[derive(Debug, Clone)]
pub struct PlaywrightLauncher {
	pub headless: bool,
	pub timeout: Duration,
}

#[async_trait]
impl SessionFactory for PlaywrightLauncher {
	async fn open(&self, scenario: &str) -> Result<Arc<dyn BrowserSession>> {
		debug!(scenario, headless = self.headless, "launching browser");
		let session = PlaywrightSession::launch(self.headless, self.timeout).await?;
		Ok(Arc::new(session) as Arc<dyn BrowserSession>)
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn saved_state_keeps_cookie_attributes() {
		let saved = json!({
			"cookies": [{
				"name": "sid",
				"value": "s3cr3t",
				"domain": ".campaigns.example.com",
				"path": "/",
				"expires": 1_900_000_000.0,
				"httpOnly": true,
				"secure": true,
				"sameSite": "Lax"
			}],
			"origins": [
				{"origin": "https://campaigns.example.com", "localStorage": [{"name": "token", "value": "t"}]}
			]
		});

		let state = parse_storage_state(&saved).unwrap();
		assert_eq!(state.cookies.len(), 1);
		assert_eq!(state.origins[0].local_storage.len(), 1);

		let cookie = serde_json::to_value(&state.cookies[0]).unwrap();
		assert_eq!(cookie["httpOnly"], true);
		assert_eq!(cookie["secure"], true);
		assert_eq!(cookie["domain"], ".campaigns.example.com");
		assert_eq!(cookie["expires"], 1_900_000_000.0);
	}

	#[test]
	fn foreign_blob_is_an_auth_state_error() {
		let err = parse_storage_state(&json!({"cookies": "nope"})).unwrap_err();
		assert_eq!(err.code(), crate::error::ErrorCode::AuthStateError);
	}

	#[test]
	fn local_storage_script_embeds_entries() {
		let entries = serde_json::to_string(&json!([{"name": "token", "value": "t"}])).unwrap();
		let js = RESTORE_LOCAL_STORAGE_JS.replace("__ENTRIES__", &entries);
		assert!(js.contains(r#"const entries = [{"name":"token","value":"t"}];"#));
	}
}
