//! Phone number validation on the login form.

use std::time::Duration;

use crate::banner::BannerDismisser;
use crate::data::{INVALID_PHONE_MESSAGE, INVALID_PHONE_NUMBERS, PhoneCase, VALID_PHONE_NUMBER};
use crate::error::{E2eError, Result};
use crate::expect::{expect_disabled, expect_hidden, expect_value};
use crate::harness::ScenarioContext;
use crate::pages::LoginPage;
use crate::pages::login::{ERROR_MESSAGES, LOGIN_BUTTON, PHONE_INPUT};

/// Time for client-side validation to react to a blur.
const VALIDATION_SETTLE: Duration = Duration::from_millis(500);

async fn open_form(ctx: &ScenarioContext) -> Result<()> {
	let page = LoginPage::new(ctx.session(), ctx.config());
	ctx.step("open login page", page.navigate()).await?;
	BannerDismisser::cookie_consent(&ctx.config().banner)
		.dismiss_if_present(ctx.session())
		.await;
	Ok(())
}

async fn rejects(ctx: &ScenarioContext, case: &PhoneCase) -> Result<()> {
	open_form(ctx).await?;
	let page = LoginPage::new(ctx.session(), ctx.config());

	ctx.step(&format!("enter {}", case.description), async {
		page.click_phone().await?;
		page.fill_phone(case.input).await?;
		page.click_outside().await
	})
	.await?;

	ctx.step("validation message shown", async {
		match page.wait_for_error(ctx.timeout()).await? {
			Some(text) if text.contains(INVALID_PHONE_MESSAGE) => Ok(()),
			Some(text) => Err(E2eError::assertion(
				format!("error {INVALID_PHONE_MESSAGE:?} for input {:?}", case.input),
				format!("got {text:?}"),
			)),
			None => Err(E2eError::assertion(
				format!("error {INVALID_PHONE_MESSAGE:?} for input {:?}", case.input),
				"no error message visible",
			)),
		}
	})
	.await?;

	ctx.step("login button disabled", expect_disabled(ctx.session(), LOGIN_BUTTON, ctx.timeout()))
		.await
}

pub async fn invalid_short(ctx: &ScenarioContext) -> Result<()> {
	rejects(ctx, &INVALID_PHONE_NUMBERS[0]).await
}

pub async fn invalid_alpha(ctx: &ScenarioContext) -> Result<()> {
	rejects(ctx, &INVALID_PHONE_NUMBERS[1]).await
}

pub async fn invalid_special(ctx: &ScenarioContext) -> Result<()> {
	rejects(ctx, &INVALID_PHONE_NUMBERS[2]).await
}

pub async fn valid(ctx: &ScenarioContext) -> Result<()> {
	open_form(ctx).await?;
	let page = LoginPage::new(ctx.session(), ctx.config());

	ctx.step(&format!("enter {}", VALID_PHONE_NUMBER.description), async {
		page.fill_phone(VALID_PHONE_NUMBER.input).await?;
		page.press_tab().await?;
		ctx.session().pause(VALIDATION_SETTLE).await;
		Ok(())
	})
	.await?;

	ctx.step("no validation message", async {
		for selector in ERROR_MESSAGES {
			expect_hidden(ctx.session(), selector, VALIDATION_SETTLE).await?;
		}
		Ok(())
	})
	.await?;

	ctx.step("login button enabled", async {
		if page.is_login_button_enabled().await? {
			Ok(())
		} else {
			Err(E2eError::assertion(
				format!("login button enabled for input {:?}", VALID_PHONE_NUMBER.input),
				"still disabled",
			))
		}
	})
	.await
}

pub async fn clear(ctx: &ScenarioContext) -> Result<()> {
	open_form(ctx).await?;
	let page = LoginPage::new(ctx.session(), ctx.config());

	ctx.step("fill then clear", async {
		page.fill_phone(VALID_PHONE_NUMBER.input).await?;
		page.force_clear_phone().await
	})
	.await?;

	ctx.step("phone field empty", expect_value(ctx.session(), PHONE_INPUT, "", ctx.timeout()))
		.await
}
