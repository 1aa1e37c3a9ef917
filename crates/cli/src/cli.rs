
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ytc_protocol::site::RELAY_PORT;

/// Root CLI for ytc.
#[derive(Parser, Debug)]
#[command(name = "ytc")]
#[command(about = "Control a browser video tab from AI tools through the ytc extension")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Append logs to this file instead of stderr
	#[arg(long, global = true, value_name = "PATH")]
	pub log_file: Option<PathBuf>,

	/// Host the relay binds to
	#[arg(long, global = true, default_value = "127.0.0.1")]
	pub host: String,

	/// Port the relay binds to
	#[arg(long, global = true, env = "PORT", default_value_t = RELAY_PORT)]
	pub port: u16,

	/// Upper bound for one command round-trip to the extension
	#[arg(long, global = true, value_name = "MS", default_value_t = 30_000)]
	pub command_timeout_ms: u64,

	#[command(subcommand)]
	pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
	/// Run the relay and serve MCP tools on stdio (default)
	Serve,
	/// Run only the relay, without the MCP stdio server
	Relay,
}

impl Cli {
	pub fn subcommand(&self) -> Commands {
		self.command.unwrap_or(Commands::Serve)
	}
}
