//! MCP server exposing the tool surface on stdio.

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use rmcp::schemars::JsonSchema;
use rmcp::{ErrorData as McpError, ServerHandler, ServiceExt, tool, tool_handler, tool_router};
use serde::Deserialize;
use tracing::info;

use crate::tools::{ToolDispatcher, ToolOutcome};

pub const SERVER_NAME: &str = "youtube-controller-mcp";

/// Input for `search_youtube`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchInput {
	/// The search query for YouTube
	pub query: Option<String>,
}

/// Input for `seek_video`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SeekInput {
	/// The time in seconds to seek to
	pub time: Option<f64>,
}

/// Input for `play_video_id`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct PlayVideoIdInput {
	/// The ID of the YouTube video to play
	#[serde(rename = "videoId")]
	pub video_id: Option<String>,
}

pub fn into_call_result(outcome: ToolOutcome) -> CallToolResult {
	let content = vec![Content::text(outcome.text)];
	let mut result = if outcome.is_error {
		CallToolResult::error(content)
	} else {
		CallToolResult::success(content)
	};
	result.structured_content = serde_json::to_value(&outcome.structured).ok();
	result
}

#[derive(Clone)]
pub struct YoutubeMcp {
	tools: ToolDispatcher,
	tool_router: ToolRouter<Self>,
}

#[tool_router]
impl YoutubeMcp {
	pub fn new(tools: ToolDispatcher) -> Self {
		Self {
			tools,
			tool_router: Self::tool_router(),
		}
	}

	#[tool(description = "Search YouTube and get search results with video titles and IDs")]
	async fn search_youtube(&self, Parameters(input): Parameters<SearchInput>) -> Result<CallToolResult, McpError> {
		Ok(into_call_result(self.tools.search_youtube(input.query.as_deref()).await))
	}

	#[tool(description = "Play the current YouTube video")]
	async fn play_video(&self) -> Result<CallToolResult, McpError> {
		Ok(into_call_result(self.tools.play_video().await))
	}

	#[tool(description = "Pause the current YouTube video")]
	async fn pause_video(&self) -> Result<CallToolResult, McpError> {
		Ok(into_call_result(self.tools.pause_video().await))
	}

	#[tool(description = "Get the current state of the YouTube video (playing status, time, title, etc.)")]
	async fn get_video_state(&self) -> Result<CallToolResult, McpError> {
		Ok(into_call_result(self.tools.get_video_state().await))
	}

	#[tool(description = "Seek to a specific time in the current YouTube video")]
	async fn seek_video(&self, Parameters(input): Parameters<SeekInput>) -> Result<CallToolResult, McpError> {
		Ok(into_call_result(self.tools.seek_video(input.time).await))
	}

	#[tool(description = "Toggle play/pause on the current YouTube video")]
	async fn toggle_playback(&self) -> Result<CallToolResult, McpError> {
		Ok(into_call_result(self.tools.toggle_playback().await))
	}

	#[tool(description = "Skip to the next video in the YouTube playlist")]
	async fn next_video(&self) -> Result<CallToolResult, McpError> {
		Ok(into_call_result(self.tools.next_video().await))
	}

	#[tool(description = "Open YouTube in a new browser tab")]
	async fn open_youtube(&self) -> Result<CallToolResult, McpError> {
		Ok(into_call_result(self.tools.open_youtube().await))
	}

	#[tool(description = "Play a YouTube video by ID")]
	async fn play_video_id(&self, Parameters(input): Parameters<PlayVideoIdInput>) -> Result<CallToolResult, McpError> {
		Ok(into_call_result(self.tools.play_video_id(input.video_id.as_deref()).await))
	}
}

#[tool_handler]
impl ServerHandler for YoutubeMcp {
	fn get_info(&self) -> ServerInfo {
		let mut info = ServerInfo {
			instructions: Some(
				"Controls YouTube in the user's browser through the ytc extension. Tools fail with \
				 'Extension not connected' until the browser extension has connected to this server."
					.into(),
			),
			capabilities: ServerCapabilities::builder().enable_tools().build(),
			..Default::default()
		};
		info.server_info.name = SERVER_NAME.into();
		info.server_info.version = env!("CARGO_PKG_VERSION").into();
		info
	}
}

/// Serves MCP on stdin/stdout until the client disconnects.
pub async fn serve_stdio(tools: ToolDispatcher) -> anyhow::Result<()> {
	let service = YoutubeMcp::new(tools)
		.serve((tokio::io::stdin(), tokio::io::stdout()))
		.await?;
	info!(target = "ytc", "MCP server started");
	service.waiting().await?;
	info!(target = "ytc", "MCP client disconnected");
	Ok(())
}
