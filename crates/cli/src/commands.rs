//! Command handlers.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use loyalty_e2e::{AuthState, PlaywrightLauncher, RunReport, Runner, Selection, SessionFactory, SuiteConfig, suite};
use tracing::info;

use crate::cli::{AuthAction, Cli, Commands, LoginArgs, RunArgs};
use crate::output::{self, AuthListing, OutputFormat, ScenarioListing};

pub fn command_name(command: &Commands) -> &'static str {
	match command {
		Commands::Run(_) => "run",
		Commands::Login(_) => "login",
		Commands::List => "list",
		Commands::Auth { .. } => "auth show",
	}
}

/// Run the parsed command. `Ok(false)` means it ran but a scenario failed.
pub async fn dispatch(cli: &Cli) -> Result<bool> {
	let format = cli.format;
	match &cli.command {
		Commands::List => {
			list(format)?;
			Ok(true)
		}
		Commands::Auth {
			action: AuthAction::Show { file },
		} => {
			let config = load_config(cli)?;
			auth_show(file.as_deref().unwrap_or(&config.auth_state_path), format)?;
			Ok(true)
		}
		Commands::Run(args) => {
			let config = load_config(cli)?;
			let factory = launcher(&config);
			let report = run_selection(config, &run_selection_for(args), factory).await?;
			print_report(&report, "run", format)?;
			Ok(report.success())
		}
		Commands::Login(args) => {
			let config = login_config(load_config(cli)?, args);
			let factory = launcher(&config);
			let report = run_selection(config, &login_selection(), factory).await?;
			print_report(&report, "login", format)?;
			Ok(report.success())
		}
	}
}

/// Config file first, then command line overrides, then validation.
pub fn load_config(cli: &Cli) -> Result<SuiteConfig> {
	let mut config =
		SuiteConfig::load(&cli.config).with_context(|| format!("loading {}", cli.config.display()))?;
	cli.overrides.apply(&mut config);
	config.validate().context("configuration after command line overrides")?;
	Ok(config)
}

fn launcher(config: &SuiteConfig) -> Arc<dyn SessionFactory> {
	Arc::new(PlaywrightLauncher {
		headless: config.headless,
		timeout: config.default_timeout(),
	})
}

pub fn run_selection_for(args: &RunArgs) -> Selection {
	Selection {
		projects: args.projects.clone(),
		names: args.scenarios.clone(),
		include_manual: args.include_manual,
	}
}

pub fn login_selection() -> Selection {
	Selection {
		names: vec![suite::MANUAL_LOGIN.to_string()],
		include_manual: true,
		..Selection::default()
	}
}

/// A human has to see the browser to type the SMS code.
pub fn login_config(mut config: SuiteConfig, args: &LoginArgs) -> SuiteConfig {
	config.headless = false;
	config.handoff.require_completion |= args.require_completion;
	config
}

pub async fn run_selection(config: SuiteConfig, selection: &Selection, factory: Arc<dyn SessionFactory>) -> Result<RunReport> {
	let registry = suite::registry();
	let (selected, skipped) = registry.select(selection);
	if selected.is_empty() {
		bail!(
			"no scenario matches (projects: {:?}, names: {:?}); see `loyalty-e2e list`",
			selection.projects,
			selection.names
		);
	}
	info!(
		scenarios = ?selected.iter().map(|s| s.name).collect::<Vec<_>>(),
		headless = config.headless,
		"running scenarios"
	);
	let runner = Runner::new(factory, Arc::new(config));
	Ok(runner.run(&selected, &skipped).await)
}

fn print_report(report: &RunReport, command: &str, format: OutputFormat) -> Result<()> {
	match format {
		OutputFormat::Text => print!("{}", output::render_run(report)),
		OutputFormat::Json => println!("{}", output::to_json(command, report)?),
	}
	Ok(())
}

fn list(format: OutputFormat) -> Result<()> {
	let registry = suite::registry();
	match format {
		OutputFormat::Text => print!("{}", output::render_list(&registry)),
		OutputFormat::Json => {
			let listing: Vec<ScenarioListing<'_>> = registry.iter().map(ScenarioListing::from).collect();
			println!("{}", output::to_json("list", listing)?);
		}
	}
	Ok(())
}

fn auth_show(path: &Path, format: OutputFormat) -> Result<()> {
	let summary = AuthState::load(path)?.summary();
	match format {
		OutputFormat::Text => print!("{}", output::render_auth(path, &summary)),
		OutputFormat::Json => println!("{}", output::to_json("auth show", AuthListing { path, summary })?),
	}
	Ok(())
}
