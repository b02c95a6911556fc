use clap::Parser;
use tracing::error;
use wa_cli::cli::Cli;
use wa_cli::{commands, logging};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(err) = commands::dispatch(cli).await {
		error!(target = "wa", error = %err, "command failed");
		std::process::exit(1);
	}
}
