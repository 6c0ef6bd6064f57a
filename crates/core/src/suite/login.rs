//! Login scenarios.
//!
//! `login/manual-sms` automates the phone step, hands the SMS step to a human
//! and saves the auth state once the login checks out. `setup/auth-state`
//! checks that a saved state still opens the dashboard.

use std::time::Duration;

use tracing::{info, warn};

use crate::auth_state::{AuthState, export_verified};
use crate::error::Result;
use crate::handoff::ManualHandoff;
use crate::harness::ScenarioContext;
use crate::heuristic::SuccessRules;
use crate::pages::{HomePage, LoginPage};
use crate::verify::{MARKER_WAIT, verify_login};

pub const FINAL_SCREENSHOT: &str = "final-login-result.png";

const HANDOFF_MESSAGE: &str = "Waiting for you to manually enter verification code and complete login...";
const VALIDATION_SETTLE: Duration = Duration::from_secs(1);
const CODE_FORM_SETTLE: Duration = Duration::from_secs(3);

fn print_operator_steps() {
	let rule = "=".repeat(60);
	eprintln!();
	eprintln!("{rule}");
	eprintln!("Now it's your turn!");
	eprintln!("Please do the following in the browser:");
	eprintln!("   1. Receive and check SMS verification code");
	eprintln!("   2. Enter verification code on the webpage");
	eprintln!("   3. Click confirm/verify button");
	eprintln!("   4. Complete the login process");
	eprintln!("{rule}");
}

pub async fn manual_sms(ctx: &ScenarioContext) -> Result<()> {
	let session = ctx.session();
	let config = ctx.config();
	let handoff = ManualHandoff::from_config(config)?;
	let page = LoginPage::new(session, config);

	ctx.step("open login page", page.navigate()).await?;
	ctx.step("dismiss cookie banner", async {
		handoff.banner().dismiss_if_present(session).await;
		Ok(())
	})
	.await?;

	ctx.step("fill phone number", async {
		page.fill_phone(&config.phone_number).await?;
		info!(phone = %config.phone_number, "filled phone number");
		session.pause(VALIDATION_SETTLE).await;
		handoff.banner().dismiss_if_present(session).await;
		Ok(())
	})
	.await?;

	ctx.step("submit phone number", page.submit()).await?;
	session.pause(CODE_FORM_SETTLE).await;

	print_operator_steps();
	let outcome = handoff
		.await_completion(session, config.handoff.budget(), HANDOFF_MESSAGE)
		.await;

	let screenshot = config.artifact_path(FINAL_SCREENSHOT);
	ctx.step("final screenshot", session.screenshot(&screenshot, true)).await?;
	info!(url = %session.url(), path = %screenshot.display(), "captured final login state");

	if !outcome.completed() {
		if config.handoff.require_completion {
			outcome.require_completed()?;
		}
		warn!(url = outcome.url(), "login status unclear, manual step may not have finished; auth state not saved");
		return Ok(());
	}

	let verified = ctx
		.step("verify login", verify_login(session, handoff.rules(), MARKER_WAIT))
		.await?;
	ctx.step(
		"export auth state",
		async { export_verified(session, &verified, &config.auth_state_path).await.map(|_| ()) },
	)
	.await
}

pub async fn saved_auth_state(ctx: &ScenarioContext) -> Result<()> {
	let session = ctx.session();
	let config = ctx.config();

	let state = ctx
		.step("load auth state", async { AuthState::load(&config.auth_state_path) })
		.await?;
	let summary = state.summary();
	info!(cookies = summary.cookies, origins = summary.origins, "loaded auth state");

	ctx.step("restore auth state", state.restore(session)).await?;
	ctx.step("open dashboard", HomePage::new(session, config).open(None))
		.await?;

	let rules = SuccessRules::campaign(config.host()?, config.heuristic.clone());
	ctx.step("verify dashboard", async {
		verify_login(session, &rules, MARKER_WAIT).await.map(|_| ())
	})
	.await
}
