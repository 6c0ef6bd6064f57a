//! Rewards catalogue and cart badge.

use tracing::debug;

use crate::config::SuiteConfig;
use crate::error::Result;
use crate::session::{BrowserSession, LoadState};

pub const CART_COUNT: &str = "button.items-center.justify-center.rounded-full span.text-primary";

/// `REDEEM` button inside the card titled `reward`.
pub fn redeem_button(reward: &str) -> String {
	format!(r#"div:has-text("{reward}") button:has-text("REDEEM")"#)
}

/// Leading digits of the badge text; no digits counts as an empty cart.
pub fn parse_cart_count(text: &str) -> u32 {
	let digits: String = text.trim().chars().take_while(char::is_ascii_digit).collect();
	digits.parse().unwrap_or(0)
}

pub struct RewardsPage<'a> {
	session: &'a dyn BrowserSession,
	config: &'a SuiteConfig,
}

impl<'a> RewardsPage<'a> {
	pub fn new(session: &'a dyn BrowserSession, config: &'a SuiteConfig) -> Self {
		Self { session, config }
	}

	pub async fn open(&self) -> Result<()> {
		self.session
			.goto(&self.config.localized("/rewards?source=sidebar")?)
			.await?;
		self.session.wait_for_load_state(LoadState::NetworkIdle).await
	}

	pub async fn cart_count(&self) -> Result<u32> {
		let text = self.session.text(CART_COUNT).await?.unwrap_or_default();
		let count = parse_cart_count(&text);
		debug!(raw = %text, count, "read cart count");
		Ok(count)
	}

	pub async fn redeem(&self, reward: &str) -> Result<()> {
		self.session.click(&redeem_button(reward)).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cart_count_parsing() {
		assert_eq!(parse_cart_count(" 2 "), 2);
		assert_eq!(parse_cart_count(""), 0);
		assert_eq!(parse_cart_count("9+"), 9);
		assert_eq!(parse_cart_count("cart"), 0);
	}

	#[test]
	fn redeem_selector_scopes_to_card() {
		assert_eq!(
			redeem_button("Sullivan King"),
			r#"div:has-text("Sullivan King") button:has-text("REDEEM")"#
		);
	}
}
