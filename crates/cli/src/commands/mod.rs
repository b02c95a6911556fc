mod creds;
mod serve;

use crate::cli::{Cli, Commands, CredsAction};
use crate::config::ServerConfig;
use crate::error::Result;

pub async fn dispatch(cli: Cli) -> Result<()> {
	let config = ServerConfig::load(cli.config.as_deref())?;

	match cli.command {
		Commands::Serve(args) => serve::run(config, args).await?,
		Commands::Creds {
			action: CredsAction::Clear { mode },
		} => creds::clear(&config, mode)?,
	}

	Ok(())
}
