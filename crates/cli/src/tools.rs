//! Tool surface exposed to AI clients.
//!
//! Each operation validates its own arguments, short-circuits when no
//! controller is attached, then routes one [`Command`] through the
//! [`ExtensionBridge`] and shapes the reply into a [`ToolOutcome`].

use std::sync::Arc;

use serde_json::json;
use tracing::info;
use ytc_protocol::{Command, Response};

use crate::bridge::ExtensionBridge;
use crate::error::RelayError;

const NOT_CONNECTED_TEXT: &str = "Error: Browser extension not connected. Please open browser first.";
const NOT_CONNECTED_ERROR: &str = "Extension not connected";

/// Uniform result of one tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
	/// Human-readable status line.
	pub text: String,
	/// Mirrors `!structured.success`.
	pub is_error: bool,
	pub structured: Response,
}

impl ToolOutcome {
	fn from_response(response: Response, status: impl FnOnce(&Response) -> String) -> Self {
		let text = if response.success {
			status(&response)
		} else {
			format!("Error: {}", response.error.as_deref().unwrap_or("Unknown error"))
		};
		Self {
			text,
			is_error: !response.success,
			structured: response,
		}
	}

	/// Renders the whole reply as JSON. A failed reply still carries its data.
	fn from_json(response: Response, pretty: bool) -> Self {
		let text = response_json(&response, pretty);
		Self {
			text,
			is_error: !response.success,
			structured: response,
		}
	}

	fn not_connected() -> Self {
		Self {
			text: NOT_CONNECTED_TEXT.to_string(),
			is_error: true,
			structured: Response::failure(NOT_CONNECTED_ERROR),
		}
	}

	fn rejected(err: RelayError) -> Self {
		let message = err.to_string();
		Self {
			text: format!("Error: {message}"),
			is_error: true,
			structured: Response::failure(message),
		}
	}
}

fn response_json(response: &Response, pretty: bool) -> String {
	let encoded = if pretty {
		serde_json::to_string_pretty(response)
	} else {
		serde_json::to_string(response)
	};
	encoded.unwrap_or_else(|_| json!({"success": response.success}).to_string())
}

#[derive(Clone)]
pub struct ToolDispatcher {
	bridge: Arc<ExtensionBridge>,
}

impl ToolDispatcher {
	pub fn new(bridge: Arc<ExtensionBridge>) -> Self {
		Self { bridge }
	}

	async fn exchange(&self, command: Command) -> Option<Response> {
		if !self.bridge.is_connected() {
			return None;
		}
		Some(self.bridge.send_command(command).await)
	}

	async fn route(&self, command: Command, status: impl FnOnce(&Response) -> String) -> ToolOutcome {
		match self.exchange(command).await {
			Some(response) => ToolOutcome::from_response(response, status),
			None => ToolOutcome::not_connected(),
		}
	}

	async fn route_json(&self, command: Command, pretty: bool) -> ToolOutcome {
		match self.exchange(command).await {
			Some(response) => ToolOutcome::from_json(response, pretty),
			None => ToolOutcome::not_connected(),
		}
	}

	pub async fn search_youtube(&self, query: Option<&str>) -> ToolOutcome {
		let query = match query.map(str::trim) {
			Some(q) if !q.is_empty() => q.to_string(),
			_ => return ToolOutcome::rejected(RelayError::MissingArgument("query")),
		};
		info!(target = "ytc", query = %query, "searching");
		let outcome = self.route_json(Command::search(query), false).await;
		info!(target = "ytc", success = outcome.structured.success, "search finished");
		outcome
	}

	pub async fn play_video(&self) -> ToolOutcome {
		info!(target = "ytc", "playing video");
		self.route(Command::play(), |_| "Video playing".to_string()).await
	}

	pub async fn pause_video(&self) -> ToolOutcome {
		info!(target = "ytc", "pausing video");
		self.route(Command::pause(), |_| "Video paused".to_string()).await
	}

	pub async fn toggle_playback(&self) -> ToolOutcome {
		info!(target = "ytc", "toggling playback");
		self.route(Command::toggle(), |_| "Playback toggled".to_string()).await
	}

	pub async fn next_video(&self) -> ToolOutcome {
		info!(target = "ytc", "skipping to next video");
		self.route(Command::next(), |_| "Skipped to next video".to_string()).await
	}

	pub async fn seek_video(&self, time: Option<f64>) -> ToolOutcome {
		let time = match time {
			Some(t) if t.is_finite() => t,
			_ => return ToolOutcome::rejected(RelayError::MissingArgument("time")),
		};
		info!(target = "ytc", time, "seeking");
		self.route(Command::seek(time), move |_| format!("Seeked to {time}s"))
			.await
	}

	pub async fn get_video_state(&self) -> ToolOutcome {
		info!(target = "ytc", "getting video state");
		self.route_json(Command::get_state(), true).await
	}

	pub async fn open_youtube(&self) -> ToolOutcome {
		info!(target = "ytc", "opening site");
		self.route(Command::open(), |_| "YouTube opened".to_string()).await
	}

	pub async fn play_video_id(&self, video_id: Option<&str>) -> ToolOutcome {
		let video_id = match video_id.map(str::trim) {
			Some(id) if !id.is_empty() => id.to_string(),
			_ => return ToolOutcome::rejected(RelayError::MissingArgument("videoId")),
		};
		info!(target = "ytc", video_id = %video_id, "playing video by id");
		self.route(Command::play_by_id(video_id), |_| "Video playing".to_string())
			.await
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use tokio::sync::mpsc;
	use ytc_protocol::{Action, ServerFrame};

	use super::*;
	use crate::session::{ControllerHandle, SessionManager};

	fn dispatcher() -> (ToolDispatcher, Arc<SessionManager>) {
		let sessions = Arc::new(SessionManager::new());
		let bridge = Arc::new(ExtensionBridge::new(sessions.clone(), Duration::from_secs(5)));
		(ToolDispatcher::new(bridge), sessions)
	}

	fn attach(sessions: &SessionManager) -> (ControllerHandle, mpsc::UnboundedReceiver<ServerFrame>) {
		let (handle, mut rx) = sessions.new_handle();
		sessions.on_connect(handle.clone());
		let _ = rx.try_recv();
		(handle, rx)
	}

	/// Answers every command with `reply(command)`.
	fn spawn_controller(
		handle: ControllerHandle,
		mut rx: mpsc::UnboundedReceiver<ServerFrame>,
		reply: impl Fn(&Command) -> Response + Send + 'static,
	) -> tokio::task::JoinHandle<Vec<Command>> {
		tokio::spawn(async move {
			let mut seen = Vec::new();
			loop {
				tokio::select! {
					frame = rx.recv() => match frame {
						Some(ServerFrame::Command { ack, command }) => {
							handle.resolve_ack(ack, reply(&command));
							seen.push(command);
						}
						Some(_) => {}
						None => break,
					},
					_ = handle.closed() => break,
				}
			}
			seen
		})
	}

	#[tokio::test]
	async fn missing_arguments_fail_before_any_send() {
		let (tools, sessions) = dispatcher();
		let (_handle, mut rx) = attach(&sessions);

		let seek = tools.seek_video(None).await;
		assert!(seek.is_error);
		assert_eq!(seek.structured.error.as_deref(), Some("Missing required parameter: time"));

		let nan = tools.seek_video(Some(f64::NAN)).await;
		assert!(nan.is_error);

		for query in [None, Some(""), Some("   ")] {
			let search = tools.search_youtube(query).await;
			assert!(search.is_error);
			assert_eq!(search.structured.error.as_deref(), Some("Missing required parameter: query"));
		}

		let by_id = tools.play_video_id(None).await;
		assert!(by_id.is_error);
		assert_eq!(by_id.structured.error.as_deref(), Some("Missing required parameter: videoId"));

		assert!(rx.try_recv().is_err(), "no command frame may be emitted");
	}

	#[tokio::test]
	async fn not_connected_short_circuits() {
		let (tools, _) = dispatcher();
		let outcome = tools.play_video().await;
		assert!(outcome.is_error);
		assert_eq!(outcome.text, NOT_CONNECTED_TEXT);
		assert_eq!(outcome.structured, Response::failure("Extension not connected"));
	}

	#[tokio::test]
	async fn play_round_trip_wraps_state() {
		let (tools, sessions) = dispatcher();
		let (handle, rx) = attach(&sessions);
		let controller = spawn_controller(handle, rx, |_| {
			Response::ok(json!({"isPlaying": true, "title": "Song"}))
		});

		let outcome = tools.play_video().await;
		assert!(!outcome.is_error);
		assert_eq!(outcome.text, "Video playing");
		assert!(outcome.structured.success);
		assert_eq!(outcome.structured.data.as_ref().unwrap()["isPlaying"], json!(true));

		sessions.current().unwrap().disconnect();
		let seen = controller.await.unwrap();
		assert_eq!(seen, vec![Command::play()]);
	}

	#[tokio::test]
	async fn remote_failure_sets_error_flag() {
		let (tools, sessions) = dispatcher();
		let (handle, rx) = attach(&sessions);
		let _controller = spawn_controller(handle, rx, |_| Response::failure("No YouTube tab found"));

		let outcome = tools.pause_video().await;
		assert!(outcome.is_error);
		assert_eq!(outcome.text, "Error: No YouTube tab found");
	}

	#[tokio::test]
	async fn failed_search_keeps_its_json() {
		let (tools, sessions) = dispatcher();
		let (handle, rx) = attach(&sessions);
		let _controller = spawn_controller(handle, rx, |command| match command.action {
			Action::Search => Response {
				success: false,
				data: Some(json!([])),
				error: None,
			},
			_ => Response::failure("No YouTube tab found"),
		});

		let search = tools.search_youtube(Some("nothing")).await;
		assert!(search.is_error);
		assert_eq!(search.text, r#"{"success":false,"data":[]}"#);
		assert_eq!(search.structured.data, Some(json!([])));

		let state = tools.get_video_state().await;
		assert!(state.is_error);
		let rendered: serde_json::Value = serde_json::from_str(&state.text).unwrap();
		assert_eq!(rendered, json!({"success": false, "error": "No YouTube tab found"}));
	}

	#[tokio::test]
	async fn json_tools_short_circuit_when_not_connected() {
		let (tools, _) = dispatcher();
		let search = tools.search_youtube(Some("lofi")).await;
		assert!(search.is_error);
		assert_eq!(search.text, NOT_CONNECTED_TEXT);
		assert_eq!(tools.get_video_state().await.text, NOT_CONNECTED_TEXT);
	}

	#[tokio::test]
	async fn arguments_are_forwarded() {
		let (tools, sessions) = dispatcher();
		let (handle, rx) = attach(&sessions);
		let controller = spawn_controller(handle, rx, |command| match command.action {
			Action::Search => Response::ok(json!([{"title": "Lofi", "videoId": "abc"}])),
			_ => Response::ok(json!(null)),
		});

		let seek = tools.seek_video(Some(90.0)).await;
		assert_eq!(seek.text, "Seeked to 90s");

		let search = tools.search_youtube(Some(" lofi beats ")).await;
		assert!(!search.is_error);
		assert!(search.text.contains("\"videoId\":\"abc\""));

		let by_id = tools.play_video_id(Some("abc")).await;
		assert_eq!(by_id.text, "Video playing");

		sessions.current().unwrap().disconnect();
		let seen = controller.await.unwrap();
		assert_eq!(
			seen,
			vec![Command::seek(90.0), Command::search("lofi beats"), Command::play_by_id("abc")]
		);
	}
}
