//! Scenario registry and runner.
//!
//! A [`Scenario`] is a named async function over a [`ScenarioContext`]. The
//! [`Runner`] opens a fresh browser session per scenario, enforces the
//! per-scenario timeout, grabs a screenshot when something fails and folds
//! everything into a [`RunReport`].

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::SuiteConfig;
use crate::error::{E2eError, ErrorCode, Result};
use crate::session::{BrowserSession, SessionFactory};

/// Boxed scenario future. Scenarios run on the caller's task, so no `Send`.
pub type BoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Extra time a manual scenario gets beyond the configured handoff budget.
pub const MANUAL_SLACK: Duration = Duration::from_secs(120);

pub type ScenarioFn = for<'a> fn(&'a ScenarioContext) -> BoxFut<'a, Result<()>>;

/// Scenario grouping. Each project has its own session setup expectations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Project {
	/// Prepares shared state for other projects.
	Setup,
	/// Logs in from scratch; needs a human for the SMS code.
	Login,
	/// Starts from the saved auth state.
	Protected,
	/// Everything else; no auth needed.
	Other,
}

impl Project {
	pub const ALL: [Project; 4] = [Project::Setup, Project::Login, Project::Protected, Project::Other];

	pub fn as_str(self) -> &'static str {
		match self {
			Project::Setup => "setup",
			Project::Login => "login",
			Project::Protected => "protected",
			Project::Other => "other",
		}
	}
}

impl std::fmt::Display for Project {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Project {
	type Err = E2eError;

	fn from_str(s: &str) -> Result<Self> {
		match s.to_ascii_lowercase().as_str() {
			"setup" => Ok(Project::Setup),
			"login" | "login-tests" => Ok(Project::Login),
			"protected" | "protected-tests" => Ok(Project::Protected),
			"other" | "other-e2e-tests" => Ok(Project::Other),
			other => Err(E2eError::Config(format!(
				"unknown project {other:?} (expected setup, login, protected or other)"
			))),
		}
	}
}

#[derive(Clone)]
pub struct Scenario {
	pub name: &'static str,
	pub project: Project,
	pub description: &'static str,
	pub timeout: Duration,
	/// Needs a human at the browser; never selected implicitly.
	pub manual: bool,
	pub run: ScenarioFn,
}

impl std::fmt::Debug for Scenario {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Scenario")
			.field("name", &self.name)
			.field("project", &self.project)
			.field("timeout", &self.timeout)
			.field("manual", &self.manual)
			.finish()
	}
}

/// Which scenarios a run should include.
#[derive(Debug, Clone, Default)]
pub struct Selection {
	pub projects: Vec<Project>,
	/// Exact names or `group` prefixes (`phone` selects `phone/valid`).
	pub names: Vec<String>,
	pub include_manual: bool,
}

impl Selection {
	fn name_matches(&self, name: &str) -> Option<bool> {
		if self.names.is_empty() {
			return None;
		}
		Some(self.names.iter().any(|n| {
			n == name || name.strip_prefix(n.as_str()).is_some_and(|rest| rest.starts_with('/'))
		}))
	}

	/// Whether `scenario` runs. Manual scenarios need `include_manual` or an
	/// exact name.
	pub fn includes(&self, scenario: &Scenario) -> bool {
		if !self.projects.is_empty() && !self.projects.contains(&scenario.project) {
			return false;
		}
		match self.name_matches(scenario.name) {
			Some(false) => false,
			Some(true) => !scenario.manual || self.include_manual || self.names.iter().any(|n| n == scenario.name),
			None => !scenario.manual || self.include_manual,
		}
	}
}

#[derive(Debug, Default)]
pub struct Registry {
	scenarios: Vec<Scenario>,
}

impl Registry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, scenario: Scenario) -> &mut Self {
		debug_assert!(self.find(scenario.name).is_none(), "duplicate scenario {}", scenario.name);
		self.scenarios.push(scenario);
		self
	}

	pub fn iter(&self) -> impl Iterator<Item = &Scenario> {
		self.scenarios.iter()
	}

	pub fn len(&self) -> usize {
		self.scenarios.len()
	}

	pub fn is_empty(&self) -> bool {
		self.scenarios.is_empty()
	}

	pub fn find(&self, name: &str) -> Option<&Scenario> {
		self.scenarios.iter().find(|s| s.name == name)
	}

	/// Split into `(selected, skipped)`, keeping registration order. Setup
	/// scenarios sort first so later projects see their output.
	pub fn select(&self, selection: &Selection) -> (Vec<&Scenario>, Vec<&Scenario>) {
		let (mut selected, skipped): (Vec<&Scenario>, Vec<&Scenario>) =
			self.scenarios.iter().partition(|s| selection.includes(s));
		selected.sort_by_key(|s| s.project != Project::Setup);
		(selected, skipped)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
	Passed,
	Failed,
	Skipped,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
	pub name: String,
	pub status: Status,
	pub duration_ms: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

/// Collects named steps for one scenario.
#[derive(Debug, Default)]
pub struct StepRecorder {
	steps: Mutex<Vec<StepReport>>,
}

impl StepRecorder {
	pub async fn step<T, F>(&self, name: &str, fut: F) -> Result<T>
	where
		F: Future<Output = Result<T>>,
	{
		let started = Instant::now();
		let result = fut.instrument(info_span!("step", name)).await;
		let duration_ms = started.elapsed().as_millis() as u64;
		let (status, error) = match &result {
			Ok(_) => {
				debug!(step = name, duration_ms, "step passed");
				(Status::Passed, None)
			}
			Err(err) => {
				warn!(step = name, duration_ms, error = %err, "step failed");
				(Status::Failed, Some(err.to_string()))
			}
		};
		self.steps.lock().push(StepReport {
			name: name.to_string(),
			status,
			duration_ms,
			error,
		});
		result
	}

	pub fn take(&self) -> Vec<StepReport> {
		std::mem::take(&mut *self.steps.lock())
	}
}

/// Everything a scenario body gets to work with.
pub struct ScenarioContext {
	session: Arc<dyn BrowserSession>,
	config: Arc<SuiteConfig>,
	steps: StepRecorder,
}

impl ScenarioContext {
	pub fn new(session: Arc<dyn BrowserSession>, config: Arc<SuiteConfig>) -> Self {
		Self {
			session,
			config,
			steps: StepRecorder::default(),
		}
	}

	pub fn session(&self) -> &dyn BrowserSession {
		self.session.as_ref()
	}

	pub fn config(&self) -> &SuiteConfig {
		&self.config
	}

	/// Timeout for individual expectations.
	pub fn timeout(&self) -> Duration {
		self.config.default_timeout()
	}

	pub async fn step<T, F>(&self, name: &str, fut: F) -> Result<T>
	where
		F: Future<Output = Result<T>>,
	{
		self.steps.step(name, fut).await
	}

	pub fn into_steps(self) -> Vec<StepReport> {
		self.steps.take()
	}
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioReport {
	pub name: String,
	pub project: Project,
	pub status: Status,
	pub duration_ms: u64,
	pub steps: Vec<StepReport>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error_code: Option<ErrorCode>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub screenshot: Option<PathBuf>,
}

impl ScenarioReport {
	fn skipped(scenario: &Scenario) -> Self {
		Self {
			name: scenario.name.to_string(),
			project: scenario.project,
			status: Status::Skipped,
			duration_ms: 0,
			steps: Vec::new(),
			error: None,
			error_code: None,
			screenshot: None,
		}
	}
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
	pub total: usize,
	pub passed: usize,
	pub failed: usize,
	pub skipped: usize,
	pub duration_ms: u64,
	pub scenarios: Vec<ScenarioReport>,
}

impl RunReport {
	pub fn success(&self) -> bool {
		self.failed == 0
	}

	fn from_reports(scenarios: Vec<ScenarioReport>, duration_ms: u64) -> Self {
		let count = |status| scenarios.iter().filter(|s| s.status == status).count();
		Self {
			total: scenarios.len(),
			passed: count(Status::Passed),
			failed: count(Status::Failed),
			skipped: count(Status::Skipped),
			duration_ms,
			scenarios,
		}
	}
}

pub struct Runner {
	factory: Arc<dyn SessionFactory>,
	config: Arc<SuiteConfig>,
}

impl Runner {
	pub fn new(factory: Arc<dyn SessionFactory>, config: Arc<SuiteConfig>) -> Self {
		Self { factory, config }
	}

	/// Run `selected` in order; `skipped` only shows up in the report.
	pub async fn run(&self, selected: &[&Scenario], skipped: &[&Scenario]) -> RunReport {
		let started = Instant::now();
		info!(selected = selected.len(), skipped = skipped.len(), "starting run");

		let mut reports = Vec::with_capacity(selected.len() + skipped.len());
		for scenario in selected {
			reports.push(self.run_one(scenario).await);
		}
		reports.extend(skipped.iter().map(|s| ScenarioReport::skipped(s)));

		let report = RunReport::from_reports(reports, started.elapsed().as_millis() as u64);
		info!(
			passed = report.passed,
			failed = report.failed,
			skipped = report.skipped,
			duration_ms = report.duration_ms,
			"run finished"
		);
		report
	}

	pub async fn run_one(&self, scenario: &Scenario) -> ScenarioReport {
		let span = info_span!("scenario", name = scenario.name, project = %scenario.project);
		self.run_in_span(scenario).instrument(span).await
	}

	/// Manual scenarios always outlive the handoff budget.
	fn timeout_for(&self, scenario: &Scenario) -> Duration {
		if scenario.manual {
			scenario.timeout.max(self.config.handoff.budget() + MANUAL_SLACK)
		} else {
			scenario.timeout
		}
	}

	async fn run_in_span(&self, scenario: &Scenario) -> ScenarioReport {
		let started = Instant::now();
		let timeout = self.timeout_for(scenario);
		info!(timeout_secs = timeout.as_secs(), "scenario started");

		let session = match self.factory.open(scenario.name).await {
			Ok(session) => session,
			Err(err) => {
				error!(error = %err, "could not open browser session");
				return ScenarioReport {
					name: scenario.name.to_string(),
					project: scenario.project,
					status: Status::Failed,
					duration_ms: started.elapsed().as_millis() as u64,
					steps: Vec::new(),
					error_code: Some(err.code()),
					error: Some(err.to_string()),
					screenshot: None,
				};
			}
		};

		let ctx = ScenarioContext::new(Arc::clone(&session), Arc::clone(&self.config));
		let result = match tokio::time::timeout(timeout, (scenario.run)(&ctx)).await {
			Ok(result) => result,
			Err(_) => Err(E2eError::Timeout {
				ms: timeout.as_millis() as u64,
				condition: format!("scenario {}", scenario.name),
			}),
		};

		let screenshot = match &result {
			Ok(()) => None,
			Err(_) => capture_failure_screenshot(session.as_ref(), &self.config.artifacts_dir, scenario.name).await,
		};

		if let Err(err) = session.close().await {
			warn!(error = %err, "closing browser session failed");
		}

		let duration_ms = started.elapsed().as_millis() as u64;
		let steps = ctx.into_steps();
		match result {
			Ok(()) => {
				info!(duration_ms, "scenario passed");
				ScenarioReport {
					name: scenario.name.to_string(),
					project: scenario.project,
					status: Status::Passed,
					duration_ms,
					steps,
					error: None,
					error_code: None,
					screenshot,
				}
			}
			Err(err) => {
				error!(duration_ms, error = %err, "scenario failed");
				ScenarioReport {
					name: scenario.name.to_string(),
					project: scenario.project,
					status: Status::Failed,
					duration_ms,
					steps,
					error_code: Some(err.code()),
					error: Some(err.to_string()),
					screenshot,
				}
			}
		}
	}
}

/// Turn a scenario name into something safe for a filename.
fn artifact_stem(name: &str) -> String {
	name.chars()
		.map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
		.collect()
}

/// Full-page screenshot for a failed scenario. Failures here are logged, not
/// returned, so the scenario's own error stays the reported one.
pub async fn capture_failure_screenshot(session: &dyn BrowserSession, dir: &Path, scenario: &str) -> Option<PathBuf> {
	if let Err(err) = std::fs::create_dir_all(dir) {
		warn!(dir = %dir.display(), error = %err, "could not create artifacts directory");
		return None;
	}
	let timestamp = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis())
		.unwrap_or(0);
	let path = dir.join(format!("{}-{timestamp}-failure.png", artifact_stem(scenario)));
	match session.screenshot(&path, true).await {
		Ok(()) => {
			info!(path = %path.display(), "saved failure screenshot");
			Some(path)
		}
		Err(err) => {
			warn!(error = %err, "failure screenshot could not be captured");
			None
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{FakeFactory, FakeSession};

	fn passing(_: &ScenarioContext) -> BoxFut<'_, Result<()>> {
		Box::pin(async { Ok(()) })
	}

	fn failing(ctx: &ScenarioContext) -> BoxFut<'_, Result<()>> {
		Box::pin(async move {
			ctx.step("first", async { Ok(()) }).await?;
			ctx.step("second", async { Err(E2eError::assertion("thing", "nope")) }).await
		})
	}

	fn hanging(_: &ScenarioContext) -> BoxFut<'_, Result<()>> {
		Box::pin(std::future::pending::<Result<()>>())
	}

	fn scenario(name: &'static str, project: Project, run: ScenarioFn) -> Scenario {
		Scenario {
			name,
			project,
			description: "",
			timeout: Duration::from_secs(30),
			manual: false,
			run,
		}
	}

	fn runner(dir: &Path) -> (Runner, Arc<FakeFactory>) {
		let factory = Arc::new(FakeFactory::new(|_| Arc::new(FakeSession::new("https://site/home"))));
		let config = SuiteConfig {
			artifacts_dir: dir.to_path_buf(),
			..SuiteConfig::default()
		};
		(Runner::new(factory.clone(), Arc::new(config)), factory)
	}

	#[tokio::test]
	async fn failure_is_reported_with_steps_and_screenshot() {
		let dir = tempfile::tempdir().unwrap();
		let (runner, factory) = runner(dir.path());

		let report = runner.run_one(&scenario("group/fails", Project::Other, failing)).await;

		assert_eq!(report.status, Status::Failed);
		assert_eq!(report.error_code, Some(ErrorCode::AssertionFailed));
		assert_eq!(report.steps.len(), 2);
		assert_eq!(report.steps[1].status, Status::Failed);

		let session = factory.session_for("group/fails").unwrap();
		let shots = session.screenshots();
		assert_eq!(shots.len(), 1);
		assert!(shots[0].starts_with(dir.path()));
		assert!(shots[0].file_name().unwrap().to_string_lossy().starts_with("group_fails-"));
		assert!(session.is_closed());
	}

	#[tokio::test(start_paused = true)]
	async fn scenario_timeout_becomes_timeout_error() {
		let dir = tempfile::tempdir().unwrap();
		let (runner, _) = runner(dir.path());

		let report = runner.run_one(&scenario("slow", Project::Other, hanging)).await;
		assert_eq!(report.error_code, Some(ErrorCode::Timeout));
		assert!(report.error.unwrap().contains("scenario slow"));
	}

	#[tokio::test]
	async fn run_counts_each_status() {
		let dir = tempfile::tempdir().unwrap();
		let (runner, factory) = runner(dir.path());
		let ok = scenario("a/ok", Project::Other, passing);
		let bad = scenario("a/bad", Project::Other, failing);
		let manual = Scenario {
			manual: true,
			..scenario("login/manual", Project::Login, passing)
		};

		let report = runner.run(&[&ok, &bad], &[&manual]).await;
		assert_eq!((report.total, report.passed, report.failed, report.skipped), (3, 1, 1, 1));
		assert!(!report.success());
		assert!(factory.session_for("a/ok").unwrap().screenshots().is_empty());
	}

	#[test]
	fn selection_rules() {
		let mut registry = Registry::new();
		registry
			.register(scenario("phone/valid", Project::Other, passing))
			.register(scenario("phone/clear", Project::Other, passing))
			.register(scenario("osheaga/sidebar", Project::Protected, passing))
			.register(Scenario {
				manual: true,
				..scenario("login/manual-sms", Project::Login, passing)
			})
			.register(scenario("setup/auth-state", Project::Setup, passing));

		let names = |sel: &Selection| registry.select(sel).0.iter().map(|s| s.name).collect::<Vec<_>>();

		assert_eq!(
			names(&Selection::default()),
			vec!["setup/auth-state", "phone/valid", "phone/clear", "osheaga/sidebar"]
		);
		assert_eq!(
			names(&Selection {
				names: vec!["phone".into()],
				..Selection::default()
			}),
			vec!["phone/valid", "phone/clear"]
		);
		assert_eq!(
			names(&Selection {
				names: vec!["login/manual-sms".into()],
				..Selection::default()
			}),
			vec!["login/manual-sms"]
		);
		assert_eq!(
			names(&Selection {
				projects: vec![Project::Login],
				..Selection::default()
			}),
			Vec::<&str>::new()
		);
		assert_eq!(
			names(&Selection {
				projects: vec![Project::Login],
				include_manual: true,
				..Selection::default()
			}),
			vec!["login/manual-sms"]
		);
	}

	#[test]
	fn manual_timeout_covers_handoff_budget() {
		let dir = tempfile::tempdir().unwrap();
		let (runner, _) = runner(dir.path());
		let manual = Scenario {
			manual: true,
			..scenario("login/manual", Project::Login, passing)
		};
		assert_eq!(runner.timeout_for(&manual), Duration::from_secs(300) + MANUAL_SLACK);
		assert_eq!(runner.timeout_for(&scenario("x", Project::Other, passing)), Duration::from_secs(30));
	}

	#[test]
	fn project_parses_config_names() {
		assert_eq!("protected-tests".parse::<Project>().unwrap(), Project::Protected);
		assert_eq!("Other".parse::<Project>().unwrap(), Project::Other);
		assert!("firefox".parse::<Project>().is_err());
	}
}
