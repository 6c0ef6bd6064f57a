mod cli;
mod commands;
mod output;
mod styles;

use clap::Parser;
use cli::Cli;
use loyalty_e2e::logging;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let command = commands::command_name(&cli.command);
	match commands::dispatch(&cli).await {
		Ok(true) => {}
		// The report already says what failed.
		Ok(false) => std::process::exit(1),
		Err(err) => {
			output::print_error(command, &err, cli.format);
			std::process::exit(1);
		}
	}
}
