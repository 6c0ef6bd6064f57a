//! The campaign site scenarios.

pub mod login;
pub mod phone;
pub mod protected;

use std::time::Duration;

use crate::error::Result;
use crate::harness::{BoxFut, Project, Registry, Scenario, ScenarioContext};

macro_rules! scenario_fn {
	($name:ident => $path:path) => {
		fn $name(ctx: &ScenarioContext) -> BoxFut<'_, Result<()>> {
			Box::pin($path(ctx))
		}
	};
}

scenario_fn!(manual_sms => login::manual_sms);
scenario_fn!(saved_auth_state => login::saved_auth_state);
scenario_fn!(phone_invalid_short => phone::invalid_short);
scenario_fn!(phone_invalid_alpha => phone::invalid_alpha);
scenario_fn!(phone_invalid_special => phone::invalid_special);
scenario_fn!(phone_valid => phone::valid);
scenario_fn!(phone_clear => phone::clear);
scenario_fn!(dashboard_markers => protected::dashboard_markers);
scenario_fn!(osheaga_sidebar => protected::osheaga_sidebar);
scenario_fn!(redeem_sullivan_king => protected::redeem_sullivan_king);

/// The scenario `loyalty-e2e login` runs.
pub const MANUAL_LOGIN: &str = "login/manual-sms";

const FORM_TIMEOUT: Duration = Duration::from_secs(60);
const PROTECTED_TIMEOUT: Duration = Duration::from_secs(90);

/// Every scenario, in run order within each project.
pub fn registry() -> Registry {
	let mut registry = Registry::new();
	registry
		.register(Scenario {
			name: "setup/auth-state",
			project: Project::Setup,
			description: "saved auth state still opens the dashboard",
			timeout: PROTECTED_TIMEOUT,
			manual: false,
			run: saved_auth_state,
		})
		.register(Scenario {
			name: MANUAL_LOGIN,
			project: Project::Login,
			description: "fill phone, wait for a human to enter the SMS code, save auth state",
			timeout: Duration::from_secs(420),
			manual: true,
			run: manual_sms,
		})
		.register(Scenario {
			name: "phone/invalid-short",
			project: Project::Other,
			description: "4 digits are rejected",
			timeout: FORM_TIMEOUT,
			manual: false,
			run: phone_invalid_short,
		})
		.register(Scenario {
			name: "phone/invalid-alpha",
			project: Project::Other,
			description: "letters are rejected",
			timeout: FORM_TIMEOUT,
			manual: false,
			run: phone_invalid_alpha,
		})
		.register(Scenario {
			name: "phone/invalid-special",
			project: Project::Other,
			description: "symbols are rejected",
			timeout: FORM_TIMEOUT,
			manual: false,
			run: phone_invalid_special,
		})
		.register(Scenario {
			name: "phone/valid",
			project: Project::Other,
			description: "10 digits enable the login button",
			timeout: FORM_TIMEOUT,
			manual: false,
			run: phone_valid,
		})
		.register(Scenario {
			name: "phone/clear",
			project: Project::Other,
			description: "the phone field can be emptied",
			timeout: FORM_TIMEOUT,
			manual: false,
			run: phone_clear,
		})
		.register(Scenario {
			name: "dashboard/markers",
			project: Project::Protected,
			description: "dashboard markers show after restoring auth",
			timeout: PROTECTED_TIMEOUT,
			manual: false,
			run: dashboard_markers,
		})
		.register(Scenario {
			name: "osheaga/sidebar",
			project: Project::Protected,
			description: "sidebar Osheaga button opens the rewards page",
			timeout: PROTECTED_TIMEOUT,
			manual: false,
			run: osheaga_sidebar,
		})
		.register(Scenario {
			name: "rewards/redeem-sullivan-king",
			project: Project::Protected,
			description: "redeeming Sullivan King adds one item to the cart",
			timeout: PROTECTED_TIMEOUT,
			manual: false,
			run: redeem_sullivan_king,
		});
	registry
}

#[cfg(test)]
mod tests {
	use std::path::Path;
	use std::sync::Arc;

	use serde_json::json;

	use super::*;
	use crate::auth_state::AuthState;
	use crate::config::SuiteConfig;
	use crate::data::INVALID_PHONE_MESSAGE;
	use crate::harness::{Runner, Selection, Status};
	use crate::pages::home::{COLLECT_AND_REDEEM, OSHEAGA_BUTTON};
	use crate::pages::login::{LOGIN_BUTTON, PHONE_INPUT, PHONE_INPUT_BY_NAME};
	use crate::pages::rewards::{CART_COUNT, redeem_button};
	use crate::session::BrowserSession;
	use crate::testing::{FakeFactory, FakeSession, Mutation};

	const SITE: &str = "https://campaigns.monsterenergyloyalty.com";
	const PRIMARY: &str = r#"text="PROGRAMS""#;

	fn config(dir: &Path) -> SuiteConfig {
		SuiteConfig {
			auth_state_path: dir.join(".auth/user.json"),
			artifacts_dir: dir.join("results"),
			..SuiteConfig::default()
		}
	}

	/// Login form whose validation accepts exactly ten digits.
	fn login_form() -> FakeSession {
		let session = FakeSession::new("about:blank");
		session.show(PHONE_INPUT);
		session.show(PHONE_INPUT_BY_NAME);
		session.show(LOGIN_BUTTON);
		session.disable(LOGIN_BUTTON);
		session.set_text(".error-message", INVALID_PHONE_MESSAGE);
		session.on_fill(PHONE_INPUT, |value| {
			let valid = value.len() == 10 && value.chars().all(|c| c.is_ascii_digit());
			if value.is_empty() {
				vec![Mutation::Hide(".error-message".into()), Mutation::Disable(LOGIN_BUTTON.into())]
			} else if valid {
				vec![Mutation::Hide(".error-message".into()), Mutation::Enable(LOGIN_BUTTON.into())]
			} else {
				vec![Mutation::Show(".error-message".into()), Mutation::Disable(LOGIN_BUTTON.into())]
			}
		});
		session
	}

	/// Dashboard reachable directly; auth is assumed restored.
	fn dashboard() -> FakeSession {
		let session = FakeSession::new("about:blank");
		session.on_goto("/home", Mutation::Show(PRIMARY.into()));
		session.on_goto("/home", Mutation::Show(OSHEAGA_BUTTON.into()));
		session.on_click(OSHEAGA_BUTTON, Mutation::Navigate(format!("{SITE}/osheaga?locale=en-CA")));
		session.on_click(OSHEAGA_BUTTON, Mutation::Show(COLLECT_AND_REDEEM.into()));
		session.on_goto("/rewards", Mutation::Show(CART_COUNT.into()));
		session.on_goto("/rewards", Mutation::Show(redeem_button("Sullivan King")));
		session.set_text(CART_COUNT, "2");
		session.on_click(&redeem_button("Sullivan King"), Mutation::SetText(CART_COUNT.into(), "3".into()));
		session
	}

	async fn run(config: SuiteConfig, names: &[&str], site: fn() -> FakeSession) -> (crate::harness::RunReport, Arc<FakeFactory>) {
		let factory = Arc::new(FakeFactory::new(move |_| Arc::new(site())));
		let registry = registry();
		let selection = Selection {
			names: names.iter().map(|n| n.to_string()).collect(),
			..Selection::default()
		};
		let (selected, _) = registry.select(&selection);
		let runner = Runner::new(factory.clone(), Arc::new(config));
		(runner.run(&selected, &[]).await, factory)
	}

	#[test]
	fn registry_is_consistent() {
		let registry = registry();
		assert_eq!(registry.len(), 10);
		let manual: Vec<_> = registry.iter().filter(|s| s.manual).map(|s| s.name).collect();
		assert_eq!(manual, vec!["login/manual-sms"]);
		assert!(registry.iter().all(|s| s.name.contains('/')));
	}

	#[tokio::test(start_paused = true)]
	async fn phone_validation_scenarios_pass_against_form() {
		let dir = tempfile::tempdir().unwrap();
		let (report, factory) = run(config(dir.path()), &["phone"], login_form).await;

		assert_eq!(report.total, 5, "{report:?}");
		assert!(report.success(), "{report:#?}");
		let session = factory.session_for("phone/clear").unwrap();
		assert_eq!(session.snapshot().values.get(PHONE_INPUT).map(String::as_str), Some(""));
		let session = factory.session_for("phone/invalid-short").unwrap();
		assert_eq!(session.clicks(), vec![PHONE_INPUT.to_string(), "body".to_string()]);
	}

	#[tokio::test(start_paused = true)]
	async fn valid_number_fails_while_login_button_stays_disabled() {
		fn stuck() -> FakeSession {
			let session = FakeSession::new("about:blank");
			session.show(PHONE_INPUT);
			session.show(LOGIN_BUTTON);
			session.disable(LOGIN_BUTTON);
			session
		}
		let dir = tempfile::tempdir().unwrap();
		let (report, _) = run(config(dir.path()), &["phone/valid"], stuck).await;

		let scenario = &report.scenarios[0];
		assert_eq!(scenario.status, Status::Failed);
		assert!(scenario.error.as_deref().unwrap().contains("still disabled"), "{scenario:?}");
	}

	#[tokio::test(start_paused = true)]
	async fn invalid_input_fails_when_form_accepts_everything() {
		fn lenient() -> FakeSession {
			let session = FakeSession::new("about:blank");
			session.show(PHONE_INPUT);
			session.show(LOGIN_BUTTON);
			session
		}
		let dir = tempfile::tempdir().unwrap();
		let (report, factory) = run(config(dir.path()), &["phone/invalid-short"], lenient).await;

		assert_eq!(report.failed, 1);
		let scenario = &report.scenarios[0];
		assert_eq!(scenario.status, Status::Failed);
		assert!(scenario.error.as_deref().unwrap().contains("no error message visible"));
		assert_eq!(factory.session_for("phone/invalid-short").unwrap().screenshots().len(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn manual_login_saves_auth_after_human_finishes() {
		fn site() -> FakeSession {
			let session = login_form();
			session.set_storage(json!({
				"cookies": [{"name": "sid", "value": "x", "domain": "campaigns.monsterenergyloyalty.com", "path": "/"}],
				"origins": []
			}));
			// The human finishes well into the wait.
			session.schedule(Duration::from_secs(100), Mutation::Navigate(format!("{SITE}/home?locale=en-CA")));
			session.schedule(Duration::from_secs(100), Mutation::Show(PRIMARY.into()));
			session
		}
		let dir = tempfile::tempdir().unwrap();
		let config = config(dir.path());
		let auth_path = config.auth_state_path.clone();

		let (report, factory) = run(config, &["login/manual-sms"], site).await;

		assert!(report.success(), "{report:#?}");
		let saved = AuthState::load(&auth_path).unwrap();
		assert_eq!(saved.summary().cookies, 1);

		let session = factory.session_for("login/manual-sms").unwrap();
		assert!(session.clicks().contains(&LOGIN_BUTTON.to_string()));
		assert!(session.screenshots()[0].ends_with("final-login-result.png"));
	}

	#[tokio::test(start_paused = true)]
	async fn manual_login_timeout_saves_nothing() {
		let dir = tempfile::tempdir().unwrap();
		let mut config = config(dir.path());
		config.handoff.budget_secs = 20;
		let auth_path = config.auth_state_path.clone();

		let (report, _) = run(config, &["login/manual-sms"], login_form).await;

		assert!(report.success(), "{report:#?}");
		assert!(!auth_path.exists());
	}

	#[tokio::test(start_paused = true)]
	async fn manual_login_timeout_fails_when_completion_required() {
		let dir = tempfile::tempdir().unwrap();
		let mut config = config(dir.path());
		config.handoff.budget_secs = 20;
		config.handoff.require_completion = true;

		let (report, factory) = run(config, &["login/manual-sms"], login_form).await;

		assert_eq!(report.scenarios[0].error_code, Some(crate::error::ErrorCode::HandoffNotCompleted));
		// Final screenshot first, then the failure capture.
		assert_eq!(factory.session_for("login/manual-sms").unwrap().screenshots().len(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn manual_login_with_unverifiable_page_fails_hard() {
		fn site() -> FakeSession {
			let session = login_form();
			// URL moves but no dashboard marker ever appears.
			session.schedule(Duration::from_secs(100), Mutation::Navigate(format!("{SITE}/login/verify")));
			session
		}
		let dir = tempfile::tempdir().unwrap();
		let config = config(dir.path());
		let auth_path = config.auth_state_path.clone();

		let (report, _) = run(config, &["login/manual-sms"], site).await;

		assert_eq!(report.scenarios[0].error_code, Some(crate::error::ErrorCode::VerificationFailed));
		assert!(!auth_path.exists());
	}

	#[tokio::test(start_paused = true)]
	async fn protected_scenarios_pass_with_saved_auth() {
		let dir = tempfile::tempdir().unwrap();
		let config = config(dir.path());
		AuthState::from_value(json!({"cookies": [], "origins": []}))
			.save(&config.auth_state_path)
			.unwrap();

		let (report, factory) = run(config, &["dashboard", "osheaga", "rewards"], dashboard).await;

		assert_eq!(report.passed, 3, "{report:#?}");
		let session = factory.session_for("osheaga/sidebar").unwrap();
		assert!(session.restored_state().is_some());
		assert!(session.url().contains("/osheaga"));
	}

	#[tokio::test(start_paused = true)]
	async fn ensure_logged_in_falls_back_to_phone_login() {
		fn site() -> FakeSession {
			let session = FakeSession::new("about:blank");
			let home = format!("{SITE}/home?locale=en-CA");
			session.redirect(&home, &format!("{SITE}/login?locale=en-CA"));
			session.show(PHONE_INPUT_BY_NAME);
			session.show(LOGIN_BUTTON);
			session.on_click(LOGIN_BUTTON, Mutation::Navigate(home));
			session.on_click(LOGIN_BUTTON, Mutation::Show(PRIMARY.into()));
			session
		}
		let dir = tempfile::tempdir().unwrap();
		let (report, factory) = run(config(dir.path()), &["dashboard/markers"], site).await;

		assert!(report.success(), "{report:#?}");
		let session = factory.session_for("dashboard/markers").unwrap();
		assert_eq!(
			session.snapshot().values.get(PHONE_INPUT_BY_NAME).map(String::as_str),
			Some("6478852216")
		);
	}
}
