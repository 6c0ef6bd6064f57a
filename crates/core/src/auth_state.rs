//! Saved authentication state.
//!
//! The blob is whatever the session reports (Playwright's `storageState`
//! shape: `cookies` plus `origins[].localStorage`). It is written once per
//! verified login, atomically, and restored by later runs to skip the SMS
//! step.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{E2eError, Result};
use crate::session::BrowserSession;
use crate::verify::VerifiedLogin;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthState(serde_json::Value);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSummary {
	pub cookies: usize,
	pub origins: usize,
}

impl AuthState {
	pub fn from_value(value: serde_json::Value) -> Self {
		Self(value)
	}

	pub fn as_value(&self) -> &serde_json::Value {
		&self.0
	}

	pub async fn capture(session: &dyn BrowserSession) -> Result<Self> {
		Ok(Self(session.storage_state().await?))
	}

	pub async fn restore(&self, session: &dyn BrowserSession) -> Result<()> {
		session.restore_storage_state(&self.0).await
	}

	pub fn summary(&self) -> AuthSummary {
		let len = |key: &str| self.0.get(key).and_then(|v| v.as_array()).map_or(0, Vec::len);
		AuthSummary {
			cookies: len("cookies"),
			origins: len("origins"),
		}
	}

	/// Write via a temp file in the destination directory, then rename.
	pub fn save(&self, path: &Path) -> Result<()> {
		let dir = match path.parent() {
			Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
			_ => PathBuf::from("."),
		};
		std::fs::create_dir_all(&dir)?;

		let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
		serde_json::to_writer_pretty(&mut tmp, &self.0)?;
		tmp.write_all(b"\n")?;
		tmp.as_file().sync_all()?;
		tmp.persist(path).map_err(|e| E2eError::AuthState {
			path: path.to_path_buf(),
			message: e.error.to_string(),
		})?;
		Ok(())
	}

	pub fn load(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path).map_err(|e| E2eError::AuthState {
			path: path.to_path_buf(),
			message: e.to_string(),
		})?;
		let value: serde_json::Value = serde_json::from_str(&content).map_err(|e| E2eError::AuthState {
			path: path.to_path_buf(),
			message: format!("not valid JSON: {e}"),
		})?;
		if !value.is_object() {
			return Err(E2eError::AuthState {
				path: path.to_path_buf(),
				message: "expected a JSON object".into(),
			});
		}
		Ok(Self(value))
	}
}

/// Capture and persist auth state for a session that passed verification.
pub async fn export_verified(session: &dyn BrowserSession, verified: &VerifiedLogin, path: &Path) -> Result<AuthSummary> {
	let state = AuthState::capture(session).await?;
	state.save(path)?;
	let summary = state.summary();
	info!(
		path = %path.display(),
		cookies = summary.cookies,
		origins = summary.origins,
		verified_by = verified.marker(),
		"saved authentication state"
	);
	Ok(summary)
}
