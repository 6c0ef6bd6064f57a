//! Post-login dashboard.

use crate::config::SuiteConfig;
use crate::error::Result;
use crate::session::{BrowserSession, LoadState};

pub const OSHEAGA_BUTTON: &str = r#"button[title="Osheaga"], button[aria-label*="Osheaga"]"#;
pub const COLLECT_AND_REDEEM: &str = "text=COLLECT AND REDEEM";
pub const OSHEAGA_URL_PATTERN: &str = "(?i)osheaga|rewards";

pub struct HomePage<'a> {
	session: &'a dyn BrowserSession,
	config: &'a SuiteConfig,
}

impl<'a> HomePage<'a> {
	pub fn new(session: &'a dyn BrowserSession, config: &'a SuiteConfig) -> Self {
		Self { session, config }
	}

	/// Open `/home`, optionally tagged with the navigation `source`.
	pub async fn open(&self, source: Option<&str>) -> Result<()> {
		let path = match source {
			Some(source) => format!("/home?source={source}"),
			None => "/home".to_string(),
		};
		self.session.goto(&self.config.localized(&path)?).await?;
		self.session.wait_for_load_state(LoadState::NetworkIdle).await
	}

	pub async fn open_osheaga(&self) -> Result<()> {
		self.session.click(OSHEAGA_BUTTON).await
	}
}
