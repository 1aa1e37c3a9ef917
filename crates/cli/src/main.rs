use clap::Parser;
use ytc_cli::{cli::Cli, commands, logging};

#[tokio::main(flavor = "current_thread")]
async fn main() {
	let cli = Cli::parse();

	if let Err(err) = logging::init_logging(cli.verbose, cli.log_file.as_deref()) {
		eprintln!("Failed to open log file: {err}");
		std::process::exit(1);
	}

	if let Err(err) = commands::dispatch(cli).await {
		tracing::error!(target = "ytc", error = %err, "fatal");
		eprintln!("Error: {err:#}");
		std::process::exit(1);
	}
}
