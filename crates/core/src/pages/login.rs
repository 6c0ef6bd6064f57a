//! Login form.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::SuiteConfig;
use crate::error::Result;
use crate::expect;
use crate::session::{BrowserSession, LoadState, QUERY_POLL_INTERVAL};

pub const PHONE_INPUT: &str = r#"input[name="phone_number"][placeholder="Enter your phone number to login"]"#;
/// Looser match used when the placeholder text differs (other locales).
pub const PHONE_INPUT_BY_NAME: &str = r#"input[name="phone_number"]"#;
pub const LOGIN_BUTTON: &str = r#"button[type="submit"]:has-text("LOGIN")"#;

/// The site has used several markups for field errors.
pub const ERROR_MESSAGES: [&str; 4] = [".error-message", r#"[data-testid="error"]"#, ".field-error", ".validation-error"];

const CLEAR_PAUSE: Duration = Duration::from_millis(100);

const CLEAR_PHONE_JS: &str = r#"(() => {
	const input = document.querySelector('input[name="phone_number"]');
	if (!input) return 'missing';
	input.value = '';
	input.dispatchEvent(new Event('input', { bubbles: true }));
	input.dispatchEvent(new Event('change', { bubbles: true }));
	return 'cleared';
})()"#;

pub struct LoginPage<'a> {
	session: &'a dyn BrowserSession,
	config: &'a SuiteConfig,
}

impl<'a> LoginPage<'a> {
	pub fn new(session: &'a dyn BrowserSession, config: &'a SuiteConfig) -> Self {
		Self { session, config }
	}

	pub async fn navigate(&self) -> Result<()> {
		self.session.goto(&self.config.localized("/login")?).await?;
		self.session.wait_for_load_state(LoadState::NetworkIdle).await
	}

	/// Replace whatever is in the phone field with `value`.
	pub async fn fill_phone(&self, value: &str) -> Result<()> {
		self.force_clear_phone().await?;
		self.session.fill(PHONE_INPUT, value).await
	}

	pub async fn clear_phone(&self) -> Result<()> {
		self.session.clear(PHONE_INPUT).await
	}

	/// Clear the phone field even when browser autofill keeps putting the
	/// number back. Falls back to setting the value from script.
	pub async fn force_clear_phone(&self) -> Result<()> {
		self.session.clear(PHONE_INPUT).await?;
		self.session.pause(CLEAR_PAUSE).await;

		self.session.press(PHONE_INPUT, "Control+a").await?;
		self.session.press(PHONE_INPUT, "Delete").await?;
		self.session.pause(CLEAR_PAUSE).await;

		self.session.clear(PHONE_INPUT).await?;

		let remaining = self.phone_value().await?;
		if !remaining.trim().is_empty() {
			warn!(value = %remaining, "phone field still filled after clearing, resetting from script");
			let outcome = self.session.evaluate(CLEAR_PHONE_JS).await?;
			debug!(%outcome, "script clear");
		}
		Ok(())
	}

	pub async fn click_phone(&self) -> Result<()> {
		self.session.click(PHONE_INPUT).await
	}

	/// Click the page background to blur the field.
	pub async fn click_outside(&self) -> Result<()> {
		self.session.click("body").await
	}

	pub async fn press_tab(&self) -> Result<()> {
		self.session.press(PHONE_INPUT, "Tab").await
	}

	/// A stuck query counts as disabled.
	pub async fn is_login_button_enabled(&self) -> Result<bool> {
		self.session
			.is_enabled_within(LOGIN_BUTTON, self.config.default_timeout())
			.await
	}

	pub async fn phone_value(&self) -> Result<String> {
		self.session.input_value(PHONE_INPUT).await
	}

	/// Text of the first visible error element.
	pub async fn error_message(&self) -> Result<Option<String>> {
		for selector in ERROR_MESSAGES {
			if self.session.is_visible(selector).await? {
				return self.session.text(selector).await;
			}
		}
		Ok(None)
	}

	/// Poll for a visible error until `timeout`.
	pub async fn wait_for_error(&self, timeout: Duration) -> Result<Option<String>> {
		let deadline = Instant::now() + timeout;
		loop {
			if let Some(text) = self.error_message().await? {
				return Ok(Some(text));
			}
			if Instant::now() >= deadline {
				return Ok(None);
			}
			tokio::time::sleep(QUERY_POLL_INTERVAL).await;
		}
	}

	pub async fn is_error_visible(&self) -> Result<bool> {
		for selector in ERROR_MESSAGES {
			if self.session.is_visible(selector).await? {
				return Ok(true);
			}
		}
		Ok(false)
	}

	/// Wait for the login button to enable, then click it.
	pub async fn submit(&self) -> Result<()> {
		expect::expect_visible(self.session, LOGIN_BUTTON, self.config.default_timeout()).await?;
		expect::expect_enabled(self.session, LOGIN_BUTTON, self.config.default_timeout()).await?;
		self.session.click(LOGIN_BUTTON).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::FakeSession;

	#[tokio::test(start_paused = true)]
	async fn fill_replaces_autofilled_value() {
		let session = FakeSession::new("https://site/login");
		session.set_value(PHONE_INPUT, "6470000000");
		let config = SuiteConfig::default();
		let page = LoginPage::new(&session, &config);

		page.fill_phone("1234").await.unwrap();

		assert_eq!(page.phone_value().await.unwrap(), "1234");
		assert!(session.evaluations().is_empty());
		assert!(
			session
				.presses()
				.contains(&(PHONE_INPUT.to_string(), "Delete".to_string()))
		);
	}

	#[tokio::test(start_paused = true)]
	async fn stubborn_value_falls_back_to_script() {
		let session = FakeSession::new("https://site/login");
		let config = SuiteConfig::default();
		// Autofill puts the number straight back after every clear.
		session.on_fill(PHONE_INPUT, |value| {
			if value.is_empty() {
				vec![crate::testing::Mutation::SetValue(PHONE_INPUT.into(), "647".into())]
			} else {
				Vec::new()
			}
		});

		LoginPage::new(&session, &config).force_clear_phone().await.unwrap();
		assert_eq!(session.evaluations(), vec![CLEAR_PHONE_JS.to_string()]);
	}

	#[tokio::test]
	async fn error_message_picks_first_visible_markup() {
		let session = FakeSession::new("https://site/login");
		session.show(".field-error");
		session.set_text(".field-error", "Please enter a valid phone number");
		session.set_text(".error-message", "hidden text");
		let config = SuiteConfig::default();
		let page = LoginPage::new(&session, &config);

		assert!(page.is_error_visible().await.unwrap());
		assert_eq!(
			page.error_message().await.unwrap().as_deref(),
			Some("Please enter a valid phone number")
		);
	}

	#[tokio::test(start_paused = true)]
	async fn focus_blur_and_button_state() {
		let session = FakeSession::new("https://site/login");
		let config = SuiteConfig::default();
		let page = LoginPage::new(&session, &config);

		page.click_phone().await.unwrap();
		page.click_outside().await.unwrap();
		assert_eq!(session.clicks(), vec![PHONE_INPUT.to_string(), "body".to_string()]);

		assert!(page.is_login_button_enabled().await.unwrap());
		session.disable(LOGIN_BUTTON);
		assert!(!page.is_login_button_enabled().await.unwrap());

		session.hang_queries(LOGIN_BUTTON);
		let started = Instant::now();
		assert!(!page.is_login_button_enabled().await.unwrap());
		assert_eq!(started.elapsed(), config.default_timeout());
	}

	#[tokio::test]
	async fn navigate_uses_locale() {
		let session = FakeSession::new("about:blank");
		let config = SuiteConfig::default();
		LoginPage::new(&session, &config).navigate().await.unwrap();
		assert_eq!(
			session.visits(),
			vec!["https://campaigns.monsterenergyloyalty.com/login?locale=en-CA".to_string()]
		);
	}
}
