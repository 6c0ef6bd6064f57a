//! Scenarios that start from the saved auth state.

use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use crate::auth_state::AuthState;
use crate::banner::BannerDismisser;
use crate::error::{E2eError, Result};
use crate::expect::{expect_enabled, expect_text, expect_url_matches, expect_visible};
use crate::harness::ScenarioContext;
use crate::heuristic::SuccessRules;
use crate::pages::home::{COLLECT_AND_REDEEM, OSHEAGA_BUTTON, OSHEAGA_URL_PATTERN};
use crate::pages::login::{LOGIN_BUTTON, PHONE_INPUT_BY_NAME};
use crate::pages::rewards::{CART_COUNT, redeem_button};
use crate::pages::{HomePage, RewardsPage};
use crate::verify::{MARKER_WAIT, verify_login};

const LEAVE_LOGIN_TIMEOUT: Duration = Duration::from_secs(20);
const PHONE_INPUT_TIMEOUT: Duration = Duration::from_secs(5);

pub const SULLIVAN_KING: &str = "Sullivan King";

fn off_login_path(url: &str) -> bool {
	Url::parse(url).map(|u| !u.path().contains("/login")).unwrap_or(false)
}

/// Restore the saved auth state and open the dashboard, logging in by phone
/// when the site still bounces to `/login`.
pub async fn ensure_logged_in(ctx: &ScenarioContext) -> Result<()> {
	let session = ctx.session();
	let config = ctx.config();

	match AuthState::load(&config.auth_state_path) {
		Ok(state) => state.restore(session).await?,
		Err(err) => warn!(error = %err, "no usable auth state, continuing without it"),
	}

	HomePage::new(session, config).open(None).await?;
	BannerDismisser::cookie_consent(&config.banner)
		.dismiss_if_present(session)
		.await;

	let url = session.url();
	if off_login_path(&url) {
		debug!(%url, "already logged in");
		return Ok(());
	}

	info!(%url, "redirected to login, signing in with phone number");
	expect_visible(session, PHONE_INPUT_BY_NAME, PHONE_INPUT_TIMEOUT).await?;
	let placeholder = session.attribute(PHONE_INPUT_BY_NAME, "placeholder").await?;
	let value = session.input_value(PHONE_INPUT_BY_NAME).await?;
	debug!(?placeholder, %value, "login input state");

	session.fill(PHONE_INPUT_BY_NAME, &config.phone_number).await?;
	expect_visible(session, LOGIN_BUTTON, ctx.timeout()).await?;
	expect_enabled(session, LOGIN_BUTTON, ctx.timeout()).await?;
	session.click(LOGIN_BUTTON).await?;

	if session.wait_for_url(&off_login_path, LEAVE_LOGIN_TIMEOUT).await? {
		Ok(())
	} else {
		Err(E2eError::Timeout {
			ms: LEAVE_LOGIN_TIMEOUT.as_millis() as u64,
			condition: format!("url to leave /login (still {})", session.url()),
		})
	}
}

pub async fn dashboard_markers(ctx: &ScenarioContext) -> Result<()> {
	ctx.step("log in", ensure_logged_in(ctx)).await?;
	let rules = SuccessRules::campaign(ctx.config().host()?, ctx.config().heuristic.clone());
	ctx.step("dashboard markers visible", async {
		let verified = verify_login(ctx.session(), &rules, MARKER_WAIT).await?;
		info!(marker = verified.marker(), "dashboard is showing");
		Ok(())
	})
	.await
}

pub async fn osheaga_sidebar(ctx: &ScenarioContext) -> Result<()> {
	let session = ctx.session();
	ctx.step("log in", ensure_logged_in(ctx)).await?;
	ctx.step("open home from sidebar", HomePage::new(session, ctx.config()).open(Some("sidebar")))
		.await?;

	ctx.step("click Osheaga", async {
		expect_visible(session, OSHEAGA_BUTTON, ctx.timeout()).await?;
		HomePage::new(session, ctx.config()).open_osheaga().await
	})
	.await?;

	ctx.step("Osheaga page shown", async {
		expect_url_matches(session, OSHEAGA_URL_PATTERN, ctx.timeout()).await?;
		expect_visible(session, COLLECT_AND_REDEEM, ctx.timeout()).await
	})
	.await
}

pub async fn redeem_sullivan_king(ctx: &ScenarioContext) -> Result<()> {
	let session = ctx.session();
	let rewards = RewardsPage::new(session, ctx.config());
	ctx.step("log in", ensure_logged_in(ctx)).await?;
	ctx.step("open rewards", rewards.open()).await?;

	let before = ctx
		.step("read cart count", async {
			expect_visible(session, CART_COUNT, ctx.timeout()).await?;
			rewards.cart_count().await
		})
		.await?;

	ctx.step("redeem", async {
		expect_visible(session, &redeem_button(SULLIVAN_KING), ctx.timeout()).await?;
		rewards.redeem(SULLIVAN_KING).await
	})
	.await?;

	let expected = (before + 1).to_string();
	ctx.step("cart count increased", expect_text(session, CART_COUNT, &expected, ctx.timeout()))
		.await
}
