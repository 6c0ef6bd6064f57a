use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use loyalty_e2e::{Project, SuiteConfig};

use crate::output::OutputFormat;
use crate::styles::cli_styles;


#[derive(Parser, Debug)]
#[command(name = "loyalty-e2e")]
#[command(about = "End-to-end flows for the Monster Energy loyalty campaign site")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: text (default) or json
	#[arg(short = 'f', long, global = true, value_enum, default_value = "text")]
	pub format: OutputFormat,

	/// Suite configuration file (JSON); missing file means defaults
	#[arg(long, global = true, value_name = "FILE", default_value = "loyalty-e2e.json")]
	pub config: PathBuf,

	#[command(flatten)]
	pub overrides: Overrides,

	#[command(subcommand)]
	pub command: Commands,
}

/// Flags that win over values from the config file.
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
	/// Site root, e.g. a staging host
	#[arg(long, global = true, value_name = "URL")]
	pub base_url: Option<String>,

	/// Run the browser without a window
	#[arg(long, global = true, conflicts_with = "headed")]
	pub headless: bool,

	/// Run the browser with a window
	#[arg(long, global = true)]
	pub headed: bool,

	/// Phone number typed into the login form
	#[arg(long, global = true, value_name = "NUMBER")]
	pub phone: Option<String>,

	/// Where the saved login lives
	#[arg(long, global = true, value_name = "FILE")]
	pub auth_state: Option<PathBuf>,

	/// Directory for screenshots
	#[arg(long, global = true, value_name = "DIR")]
	pub artifacts_dir: Option<PathBuf>,

	/// Seconds to wait for the human during manual login
	#[arg(long, global = true, value_name = "SECS")]
	pub budget_secs: Option<u64>,
}

impl Overrides {
	pub fn apply(&self, config: &mut SuiteConfig) {
		if let Some(url) = &self.base_url {
			config.base_url = url.clone();
		}
		if self.headless {
			config.headless = true;
		}
		if self.headed {
			config.headless = false;
		}
		if let Some(phone) = &self.phone {
			config.phone_number = phone.clone();
		}
		if let Some(path) = &self.auth_state {
			config.auth_state_path = path.clone();
		}
		if let Some(dir) = &self.artifacts_dir {
			config.artifacts_dir = dir.clone();
		}
		if let Some(secs) = self.budget_secs {
			config.handoff.budget_secs = secs;
		}
	}
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Run registered scenarios
	#[command(after_help = "Examples:\n  loyalty-e2e run --project other\n  loyalty-e2e run --scenario phone\n  loyalty-e2e run --include-manual")]
	Run(RunArgs),

	/// Log in by phone with a human entering the SMS code, then save auth state
	Login(LoginArgs),

	/// List registered scenarios
	List,

	/// Inspect saved auth state
	Auth {
		#[command(subcommand)]
		action: AuthAction,
	},
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
	/// Only scenarios of this project (setup, login, protected, other)
	#[arg(long = "project", value_name = "PROJECT", value_parser = parse_project)]
	pub projects: Vec<Project>,

	/// Only this scenario, or every scenario in a group (`phone`)
	#[arg(long = "scenario", value_name = "NAME")]
	pub scenarios: Vec<String>,

	/// Also run scenarios that wait for a human
	#[arg(long)]
	pub include_manual: bool,
}

#[derive(Args, Debug, Default)]
pub struct LoginArgs {
	/// Fail instead of finishing unsaved when nobody completes the SMS step
	#[arg(long)]
	pub require_completion: bool,
}

#[derive(Subcommand, Debug)]
pub enum AuthAction {
	/// Summarise a saved auth state (defaults to the configured path)
	Show {
		#[arg(value_name = "FILE")]
		file: Option<PathBuf>,
	},
}

fn parse_project(s: &str) -> Result<Project, String> {
	s.parse().map_err(|e: loyalty_e2e::E2eError| e.to_string())
}
