use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

pub fn init_logging(verbosity: u8) {
	// 0 = warnings only, engine silenced
	// 1 (-v) = info for the suite, warn for the engine
	// 2+ (-vv) = debug for everything
	let filter = filter_for(verbosity);

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	// A second init (tests, embedding) keeps the first subscriber.
	let _ = tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.try_init();
}

fn filter_for(verbosity: u8) -> &'static str {
	match verbosity {
		0 => "warn,playwright_rs=off",
		1 => "warn,loyalty_e2e=info,loyalty_e2e_cli=info,playwright_rs=warn",
		_ => "debug",
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn verbosity_levels_map_to_filters() {
		assert!(filter_for(0).contains("playwright_rs=off"));
		assert!(filter_for(1).contains("loyalty_e2e=info"));
		assert_eq!(filter_for(2), "debug");
		assert_eq!(filter_for(7), "debug");
	}

	#[test]
	fn filters_parse() {
		for v in 0..3 {
			assert!(EnvFilter::try_new(filter_for(v)).is_ok());
		}
	}
}
