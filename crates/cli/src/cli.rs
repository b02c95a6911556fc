use std::path::PathBuf;

use clap::{Parser, Subcommand};
use wa_protocol::LoginMode;

#[derive(Parser, Debug)]
#[command(name = "wa")]
#[command(about = "QR and pairing-code messaging sessions over HTTP")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v debug, -vv trace)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// JSON config file (defaults to ./wa.json when present)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Run the HTTP gateway
	Serve(ServeArgs),

	/// Manage stored session credentials
	Creds {
		#[command(subcommand)]
		action: CredsAction,
	},
}

#[derive(clap::Args, Debug, Default)]
pub struct ServeArgs {
	/// Address to bind
	#[arg(long)]
	pub host: Option<String>,

	/// Port to bind (overrides PORT)
	#[arg(short, long)]
	pub port: Option<u16>,

	/// Directory holding session_qr/ and session_pairing/
	#[arg(long, value_name = "DIR")]
	pub session_root: Option<PathBuf>,

	/// WebSocket URL of the protocol bridge
	#[arg(long, value_name = "URL")]
	pub bridge_url: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum CredsAction {
	/// Delete the stored credentials of one mode
	Clear {
		#[arg(value_parser = parse_mode)]
		mode: LoginMode,
	},
}

fn parse_mode(raw: &str) -> Result<LoginMode, String> {
	raw.parse().map_err(|_| format!("unknown mode {raw:?} (expected qr or pairing)"))
}
