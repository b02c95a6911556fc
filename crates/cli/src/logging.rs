//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise `verbose` picks the level
/// (0 info, 1 debug, 2+ trace) for the `wa` targets.
pub fn init_logging(verbose: u8) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
	let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init();
}

fn default_directive(verbose: u8) -> String {
	let level = match verbose {
		0 => "info",
		1 => "debug",
		_ => "trace",
	};
	format!("warn,wa={level},tower_http={level}")
}
