use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::bridge::ExtensionBridge;
use crate::cli::{Cli, Commands};
use crate::config::RelayConfig;
use crate::mcp;
use crate::relay;
use crate::session::SessionManager;
use crate::tools::ToolDispatcher;

pub async fn dispatch(cli: Cli) -> Result<()> {
	let config = RelayConfig::from(&cli);
	match cli.subcommand() {
		Commands::Serve => serve(&config).await,
		Commands::Relay => relay_only(&config).await,
	}
}

/// Relay in the background, MCP on stdio in the foreground. Returns when
/// the MCP client closes stdin.
async fn serve(config: &RelayConfig) -> Result<()> {
	let sessions = Arc::new(SessionManager::new());
	let listener = relay::bind_relay(&config.host, config.port).await?;

	let relay_task = {
		let sessions = sessions.clone();
		tokio::spawn(async move {
			if let Err(err) = relay::serve_relay(listener, sessions).await {
				warn!(target = "ytc", error = %err, "relay stopped");
			}
		})
	};

	let bridge = Arc::new(ExtensionBridge::new(sessions, config.command_timeout));
	let result = mcp::serve_stdio(ToolDispatcher::new(bridge)).await;

	relay_task.abort();
	info!(target = "ytc", "shutting down");
	result
}

async fn relay_only(config: &RelayConfig) -> Result<()> {
	let sessions = Arc::new(SessionManager::new());
	relay::run_relay_server(&config.host, config.port, sessions).await
}
