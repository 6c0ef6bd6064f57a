//! Retrying assertions.
//!
//! Each `expect_*` re-reads the page every [`QUERY_POLL_INTERVAL`] until the
//! condition holds or the timeout elapses, then fails with
//! [`E2eError::Assertion`] describing the last thing it saw. Query errors in
//! between are treated as "not yet".

use std::future::Future;
use std::time::Duration;

use regex_lite::Regex;
use tokio::time::Instant;
use tracing::trace;

use crate::error::{E2eError, Result};
use crate::session::{BrowserSession, QUERY_POLL_INTERVAL};

/// What a single attempt observed.
struct Observed {
	ok: bool,
	actual: String,
}

async fn retry<F, Fut>(expectation: String, timeout: Duration, mut attempt: F) -> Result<()>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<Observed>>,
{
	let deadline = Instant::now() + timeout;
	loop {
		let actual = match attempt().await {
			Ok(Observed { ok: true, .. }) => return Ok(()),
			Ok(Observed { actual, .. }) => actual,
			Err(err) => format!("error: {err}"),
		};
		if Instant::now() >= deadline {
			return Err(E2eError::assertion(
				expectation,
				format!("still {actual} after {}ms", timeout.as_millis()),
			));
		}
		trace!(%expectation, %actual, "retrying assertion");
		tokio::time::sleep(QUERY_POLL_INTERVAL).await;
	}
}

fn state(ok: bool, yes: &str, no: &str) -> Observed {
	Observed {
		ok,
		actual: if ok { yes } else { no }.to_string(),
	}
}

pub async fn expect_visible(session: &dyn BrowserSession, selector: &str, timeout: Duration) -> Result<()> {
	retry(format!("{selector} to be visible"), timeout, move || async move {
		let visible = session.is_visible(selector).await?;
		Ok(state(visible, "visible", "hidden"))
	})
	.await
}

pub async fn expect_hidden(session: &dyn BrowserSession, selector: &str, timeout: Duration) -> Result<()> {
	retry(format!("{selector} to be hidden"), timeout, move || async move {
		let visible = session.is_visible(selector).await?;
		Ok(state(!visible, "hidden", "visible"))
	})
	.await
}

pub async fn expect_enabled(session: &dyn BrowserSession, selector: &str, timeout: Duration) -> Result<()> {
	retry(format!("{selector} to be enabled"), timeout, move || async move {
		let enabled = session.is_enabled(selector).await?;
		Ok(state(enabled, "enabled", "disabled"))
	})
	.await
}

pub async fn expect_disabled(session: &dyn BrowserSession, selector: &str, timeout: Duration) -> Result<()> {
	retry(format!("{selector} to be disabled"), timeout, move || async move {
		let enabled = session.is_enabled(selector).await?;
		Ok(state(!enabled, "disabled", "enabled"))
	})
	.await
}

/// Text content of the first match, trimmed, must equal `expected`.
pub async fn expect_text(session: &dyn BrowserSession, selector: &str, expected: &str, timeout: Duration) -> Result<()> {
	retry(format!("{selector} to have text {expected:?}"), timeout, move || async move {
		let text = session.text(selector).await?.unwrap_or_default();
		let text = text.trim();
		Ok(Observed {
			ok: text == expected,
			actual: format!("{text:?}"),
		})
	})
	.await
}

pub async fn expect_value(session: &dyn BrowserSession, selector: &str, expected: &str, timeout: Duration) -> Result<()> {
	retry(format!("{selector} to have value {expected:?}"), timeout, move || async move {
		let value = session.input_value(selector).await?;
		Ok(Observed {
			ok: value == expected,
			actual: format!("{value:?}"),
		})
	})
	.await
}

fn compile(pattern: &str) -> Result<Regex> {
	Regex::new(pattern).map_err(|e| E2eError::Config(format!("bad url pattern {pattern:?}: {e}")))
}

pub async fn expect_url_matches(session: &dyn BrowserSession, pattern: &str, timeout: Duration) -> Result<()> {
	let re = &compile(pattern)?;
	retry(format!("url to match /{pattern}/"), timeout, move || async move {
		let url = session.url();
		Ok(Observed {
			ok: re.is_match(&url),
			actual: url,
		})
	})
	.await
}

pub async fn expect_url_not_matches(session: &dyn BrowserSession, pattern: &str, timeout: Duration) -> Result<()> {
	let re = &compile(pattern)?;
	retry(format!("url not to match /{pattern}/"), timeout, move || async move {
		let url = session.url();
		Ok(Observed {
			ok: !re.is_match(&url),
			actual: url,
		})
	})
	.await
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ErrorCode;
	use crate::testing::{FakeSession, Mutation};

	const WAIT: Duration = Duration::from_secs(2);

	#[tokio::test(start_paused = true)]
	async fn visible_waits_for_late_element() {
		let session = FakeSession::new("https://site/home");
		session.schedule(Duration::from_millis(700), Mutation::Show("#late".into()));
		expect_visible(&session, "#late", WAIT).await.unwrap();
	}

	#[tokio::test(start_paused = true)]
	async fn failure_reports_last_observation() {
		let session = FakeSession::new("https://site/home");
		let err = expect_visible(&session, "#never", WAIT).await.unwrap_err();
		assert_eq!(err.code(), ErrorCode::AssertionFailed);
		let msg = err.to_string();
		assert!(msg.contains("#never to be visible"), "{msg}");
		assert!(msg.contains("still hidden after 2000ms"), "{msg}");
	}

	#[tokio::test(start_paused = true)]
	async fn hidden_waits_for_element_to_go() {
		let session = FakeSession::new("https://site/login");
		session.show(".error-message");
		session.schedule(Duration::from_millis(500), Mutation::Hide(".error-message".into()));
		expect_hidden(&session, ".error-message", WAIT).await.unwrap();
		expect_hidden(&session, "#never-shown", WAIT).await.unwrap();

		session.show("#banner");
		let err = expect_hidden(&session, "#banner", WAIT).await.unwrap_err();
		assert!(err.to_string().contains("still visible"), "{err}");
	}

	#[tokio::test(start_paused = true)]
	async fn enabled_and_disabled() {
		let session = FakeSession::new("https://site/login");
		session.disable("#submit");
		expect_disabled(&session, "#submit", WAIT).await.unwrap();
		assert!(expect_enabled(&session, "#submit", WAIT).await.is_err());
	}

	#[tokio::test(start_paused = true)]
	async fn text_is_trimmed_before_compare() {
		let session = FakeSession::new("https://site/rewards");
		session.set_text("#cart", "  3 \n");
		expect_text(&session, "#cart", "3", WAIT).await.unwrap();
		let err = expect_text(&session, "#cart", "4", WAIT).await.unwrap_err();
		assert!(err.to_string().contains("\"3\""));
	}

	#[tokio::test(start_paused = true)]
	async fn url_patterns_are_case_insensitive_when_asked() {
		let session = FakeSession::new("https://site/Rewards?source=sidebar");
		expect_url_matches(&session, "(?i)osheaga|rewards", WAIT).await.unwrap();
		expect_url_not_matches(&session, r".*/login.*", WAIT).await.unwrap();
	}

	#[tokio::test(start_paused = true)]
	async fn query_errors_are_retried_until_timeout() {
		let session = FakeSession::new("https://site/home");
		session.show("#flaky");
		session.fail_queries("#flaky");
		let err = expect_visible(&session, "#flaky", WAIT).await.unwrap_err();
		assert!(err.to_string().contains("error:"));
	}

	#[tokio::test]
	async fn bad_pattern_is_config_error() {
		let session = FakeSession::new("https://site/home");
		let err = expect_url_matches(&session, "(", WAIT).await.unwrap_err();
		assert_eq!(err.code(), ErrorCode::InvalidConfig);
	}
}
