//! Suite configuration.
//!
//! Loaded from an optional JSON file; every field has a default so an empty
//! object (or a missing file) yields a usable configuration against the live
//! campaign site. Command line flags override individual fields afterwards.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{E2eError, Result};

pub const DEFAULT_BASE_URL: &str = "https://campaigns.monsterenergyloyalty.com";
pub const DEFAULT_LOCALE: &str = "en-CA";
pub const DEFAULT_AUTH_STATE_PATH: &str = "playwright/.auth/user.json";
pub const DEFAULT_ARTIFACTS_DIR: &str = "playwright/results";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SuiteConfig {
	pub base_url: String,
	pub locale: String,
	/// Number typed into the login form; the SMS for it goes to a human.
	pub phone_number: String,
	pub auth_state_path: PathBuf,
	pub artifacts_dir: PathBuf,
	pub headless: bool,
	pub default_timeout_ms: u64,
	pub handoff: HandoffConfig,
	pub heuristic: HeuristicConfig,
	pub banner: BannerConfig,
}

impl Default for SuiteConfig {
	fn default() -> Self {
		Self {
			base_url: DEFAULT_BASE_URL.to_string(),
			locale: DEFAULT_LOCALE.to_string(),
			phone_number: "6478852216".to_string(),
			auth_state_path: PathBuf::from(DEFAULT_AUTH_STATE_PATH),
			artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
			headless: false,
			default_timeout_ms: 5_000,
			handoff: HandoffConfig::default(),
			heuristic: HeuristicConfig::default(),
			banner: BannerConfig::default(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HandoffConfig {
	pub budget_secs: u64,
	pub interval_secs: u64,
	/// Fail the login scenario when the human never finishes, instead of
	/// finishing without saving auth state.
	pub require_completion: bool,
}

impl Default for HandoffConfig {
	fn default() -> Self {
		Self {
			budget_secs: 300,
			interval_secs: 5,
			require_completion: false,
		}
	}
}

impl HandoffConfig {
	pub fn budget(&self) -> Duration {
		Duration::from_secs(self.budget_secs)
	}

	pub fn interval(&self) -> Duration {
		Duration::from_secs(self.interval_secs)
	}
}

/// Thresholds for deciding that the post-login view is showing.
///
/// Tuned against one site's markup; treat them as knobs, not constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HeuristicConfig {
	pub min_primary: usize,
	pub min_secondary: usize,
	pub fallback_min_primary: usize,
	pub marker_timeout_ms: u64,
	pub login_path_patterns: Vec<String>,
}

impl Default for HeuristicConfig {
	fn default() -> Self {
		Self {
			min_primary: 2,
			min_secondary: 1,
			fallback_min_primary: 1,
			marker_timeout_ms: 1_000,
			login_path_patterns: vec!["/login".to_string(), "/auth".to_string()],
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BannerConfig {
	pub probe_timeout_ms: u64,
	pub settle_ms: u64,
}

impl Default for BannerConfig {
	fn default() -> Self {
		Self {
			probe_timeout_ms: 2_000,
			settle_ms: 1_000,
		}
	}
}

impl SuiteConfig {
	/// Load from a JSON file. A missing file yields the defaults.
	pub fn load(path: &Path) -> Result<Self> {
		if !path.exists() {
			debug!(path = %path.display(), "config file not found, using defaults");
			return Ok(Self::default());
		}

		let content = std::fs::read_to_string(path)?;
		let config: SuiteConfig =
			serde_json::from_str(&content).map_err(|e| E2eError::Config(format!("{}: {e}", path.display())))?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<()> {
		let base = Url::parse(&self.base_url).map_err(|e| E2eError::Config(format!("baseUrl {:?}: {e}", self.base_url)))?;
		if base.host_str().is_none() {
			return Err(E2eError::Config(format!("baseUrl {:?} has no host", self.base_url)));
		}
		if self.handoff.budget_secs == 0 {
			return Err(E2eError::Config("handoff.budgetSecs must be positive".into()));
		}
		if self.handoff.interval_secs == 0 {
			return Err(E2eError::Config("handoff.intervalSecs must be positive".into()));
		}
		Ok(())
	}

	/// Host of the campaign site, used to tell "navigated elsewhere on the
	/// site" apart from "left for a third party".
	pub fn host(&self) -> Result<String> {
		let base = Url::parse(&self.base_url)?;
		base.host_str()
			.map(str::to_string)
			.ok_or_else(|| E2eError::Config(format!("baseUrl {:?} has no host", self.base_url)))
	}

	/// Join a site path such as `/login?locale=en-CA` onto the base URL.
	pub fn url(&self, path: &str) -> Result<String> {
		let base = Url::parse(&self.base_url)?;
		Ok(base.join(path)?.to_string())
	}

	/// Site path with the configured locale appended.
	pub fn localized(&self, path: &str) -> Result<String> {
		let sep = if path.contains('?') { '&' } else { '?' };
		self.url(&format!("{path}{sep}locale={}", self.locale))
	}

	pub fn default_timeout(&self) -> Duration {
		Duration::from_millis(self.default_timeout_ms)
	}

	pub fn artifact_path(&self, filename: &str) -> PathBuf {
		self.artifacts_dir.join(filename)
	}
}
