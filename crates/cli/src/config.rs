//! Runtime configuration resolved from the command line and environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Cli;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
	pub host: String,
	pub port: u16,
	/// Bound for one command round-trip.
	pub command_timeout: Duration,
	pub log_file: Option<PathBuf>,
	pub verbosity: u8,
}

impl From<&Cli> for RelayConfig {
	fn from(cli: &Cli) -> Self {
		Self {
			host: cli.host.clone(),
			port: cli.port,
			// zero would fail every command immediately
			command_timeout: Duration::from_millis(cli.command_timeout_ms.max(1)),
			log_file: cli.log_file.clone(),
			verbosity: cli.verbose,
		}
	}
}

#[cfg(test)]
mod tests {
	use clap::Parser;

	use super::*;

	#[test]
	fn config_from_cli_flags() {
		let cli = Cli::try_parse_from(["ytc", "--port", "3100", "--command-timeout-ms", "2500", "-v"]).unwrap();
		let config = RelayConfig::from(&cli);
		assert_eq!(config.port, 3100);
		assert_eq!(config.command_timeout, Duration::from_millis(2500));
		assert_eq!(config.verbosity, 1);
		assert!(config.log_file.is_none());
	}

	#[test]
	fn zero_timeout_is_clamped() {
		let cli = Cli::try_parse_from(["ytc", "--command-timeout-ms", "0"]).unwrap();
		assert_eq!(RelayConfig::from(&cli).command_timeout, Duration::from_millis(1));
	}
}
