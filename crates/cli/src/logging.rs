use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

fn default_filter(verbosity: u8) -> &'static str {
	// stdout carries MCP traffic, so logs never go there
	// 0 = warnings only
	// 1 (-v) = info for ytc
	// 2+ (-vv) = debug for everything
	match verbosity {
		0 => "warn",
		1 => "warn,ytc=info,ytc_cli=info",
		_ => "debug",
	}
}

pub fn open_log_file(path: &Path) -> io::Result<File> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		std::fs::create_dir_all(parent)?;
	}
	OpenOptions::new().create(true).append(true).open(path)
}

pub fn init_logging(verbosity: u8, log_file: Option<&Path>) -> io::Result<()> {
	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

	let builder = tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_target(true)
		.with_level(true);

	match log_file {
		Some(path) => {
			let file = open_log_file(path)?;
			builder.with_writer(Mutex::new(file)).with_ansi(false).init();
		}
		None => {
			let stderr = io::stderr.with_max_level(tracing::Level::TRACE);
			builder.with_writer(stderr).compact().init();
		}
	}
	Ok(())
}
