//! Human and machine output for run reports, listings and errors.
//!
//! Text goes to stdout with `colored` markers; `-f json` prints one JSON
//! envelope per command:
//!
//! ```json
//! { "ok": true, "command": "run", "data": { ... } }
//! { "ok": false, "command": "run", "error": { "code": "INVALID_CONFIG", "message": "..." } }
//! ```


use std::fmt::Write as _;
use std::path::Path;

use colored::Colorize;
use loyalty_e2e::{AuthSummary, E2eError, ErrorCode, Registry, RunReport, Scenario, ScenarioReport, Status};
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text
	#[default]
	Text,
	/// JSON envelope
	Json,
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OutputFormat::Text => write!(f, "text"),
			OutputFormat::Json => write!(f, "json"),
		}
	}
}

#[derive(Debug, Serialize)]
pub struct Envelope<'a, T: Serialize> {
	pub ok: bool,
	pub command: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<ErrorBody>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
	pub code: ErrorCode,
	pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioListing<'a> {
	pub name: &'a str,
	pub project: &'a str,
	pub description: &'a str,
	pub timeout_secs: u64,
	pub manual: bool,
}

impl<'a> From<&'a Scenario> for ScenarioListing<'a> {
	fn from(s: &'a Scenario) -> Self {
		Self {
			name: s.name,
			project: s.project.as_str(),
			description: s.description,
			timeout_secs: s.timeout.as_secs(),
			manual: s.manual,
		}
	}
}

#[derive(Debug, Serialize)]
pub struct AuthListing<'a> {
	pub path: &'a Path,
	#[serde(flatten)]
	pub summary: AuthSummary,
}

pub fn to_json<T: Serialize>(command: &str, data: T) -> serde_json::Result<String> {
	serde_json::to_string_pretty(&Envelope {
		ok: true,
		command,
		data: Some(data),
		error: None,
	})
}

fn marker(status: Status) -> colored::ColoredString {
	match status {
		Status::Passed => "✓".green(),
		Status::Failed => "✗".red(),
		Status::Skipped => "-".dimmed(),
	}
}

fn render_scenario(out: &mut String, report: &ScenarioReport) {
	let _ = writeln!(
		out,
		"{} {} {} {}",
		marker(report.status),
		report.name.bold(),
		format!("[{}]", report.project).dimmed(),
		format!("({}ms)", report.duration_ms).dimmed(),
	);
	if report.status != Status::Failed {
		return;
	}
	for step in report.steps.iter().filter(|s| s.status == Status::Failed) {
		let _ = writeln!(out, "    {} {}", "step:".dimmed(), step.name);
	}
	if let Some(error) = &report.error {
		let code = report.error_code.map(|c| c.to_string()).unwrap_or_default();
		let _ = writeln!(out, "    {} {}", code.red(), error);
	}
	if let Some(path) = &report.screenshot {
		let _ = writeln!(out, "    {} {}", "screenshot:".dimmed(), path.display());
	}
}

pub fn render_run(report: &RunReport) -> String {
	let mut out = String::new();
	for scenario in &report.scenarios {
		render_scenario(&mut out, scenario);
	}
	let _ = writeln!(out);
	let summary = format!(
		"{} passed, {} failed, {} skipped in {:.1}s",
		report.passed,
		report.failed,
		report.skipped,
		report.duration_ms as f64 / 1000.0
	);
	let _ = writeln!(out, "{}", if report.success() { summary.green() } else { summary.red() });
	out
}

pub fn render_list(registry: &Registry) -> String {
	let mut out = String::new();
	let width = registry.iter().map(|s| s.name.len()).max().unwrap_or(0);
	for scenario in registry.iter() {
		let manual = if scenario.manual { " manual".yellow().to_string() } else { String::new() };
		let _ = writeln!(
			out,
			"{}  {:9}  {:>4}s{}  {}",
			format!("{:width$}", scenario.name).cyan(),
			scenario.project.as_str(),
			scenario.timeout.as_secs(),
			manual,
			scenario.description.dimmed(),
		);
	}
	out
}

pub fn render_auth(path: &Path, summary: &AuthSummary) -> String {
	format!(
		"{}\n  cookies: {}\n  origins: {}\n",
		path.display().to_string().bold(),
		summary.cookies,
		summary.origins
	)
}

/// Error code for anything that reaches `main`; non-suite errors are internal.
pub fn error_code(err: &anyhow::Error) -> ErrorCode {
	err.chain()
		.find_map(|cause| cause.downcast_ref::<E2eError>())
		.map_or(ErrorCode::InternalError, E2eError::code)
}

/// Report a fatal error: always to stderr, plus an envelope on stdout in JSON mode.
pub fn print_error(command: &str, err: &anyhow::Error, format: OutputFormat) {
	let code = error_code(err);
	eprintln!("{} {:#}", format!("error[{code}]:").red().bold(), err);
	if format == OutputFormat::Json {
		let envelope: Envelope<'_, ()> = Envelope {
			ok: false,
			command,
			data: None,
			error: Some(ErrorBody {
				code,
				message: format!("{err:#}"),
			}),
		};
		if let Ok(json) = serde_json::to_string_pretty(&envelope) {
			println!("{json}");
		}
	}
}
