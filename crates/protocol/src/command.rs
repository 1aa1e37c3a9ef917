//! Commands routed from the relay to the controller and their replies.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Action understood by the extension's command executor.
///
/// The set is closed. Any other string received on the wire is kept as
/// [`Action::Other`] so the executor can reply with an "unknown action"
/// failure instead of dropping the frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
	Play,
	Pause,
	Toggle,
	Next,
	Seek,
	Search,
	GetState,
	Open,
	PlayById,
	/// Action name outside the closed set.
	Other(String),
}

impl Action {
	pub fn as_str(&self) -> &str {
		match self {
			Action::Play => "play",
			Action::Pause => "pause",
			Action::Toggle => "toggle",
			Action::Next => "next",
			Action::Seek => "seek",
			Action::Search => "search",
			Action::GetState => "get_state",
			Action::Open => "open",
			Action::PlayById => "play_by_id",
			Action::Other(name) => name,
		}
	}

	/// Actions that do not need an existing target tab.
	pub fn creates_own_target(&self) -> bool {
		matches!(self, Action::Open | Action::Search)
	}
}

impl From<String> for Action {
	fn from(value: String) -> Self {
		match value.as_str() {
			"play" => Action::Play,
			"pause" => Action::Pause,
			"toggle" => Action::Toggle,
			"next" => Action::Next,
			"seek" => Action::Seek,
			"search" => Action::Search,
			"get_state" => Action::GetState,
			"open" => Action::Open,
			"play_by_id" => Action::PlayById,
			_ => Action::Other(value),
		}
	}
}

impl From<Action> for String {
	fn from(action: Action) -> Self {
		match action {
			Action::Other(name) => name,
			known => known.as_str().to_string(),
		}
	}
}

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Optional argument bag carried by a [`Command`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandArgs {
	/// Seek target in seconds.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub time: Option<f64>,
	/// Search query text.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub query: Option<String>,
	/// Video id for `play_by_id`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub video_id: Option<String>,
}

impl CommandArgs {
	pub fn is_empty(&self) -> bool {
		self.time.is_none() && self.query.is_none() && self.video_id.is_none()
	}
}

/// One action issued to the controller. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
	pub action: Action,
	#[serde(default, skip_serializing_if = "CommandArgs::is_empty")]
	pub args: CommandArgs,
}

impl Command {
	pub fn new(action: Action) -> Self {
		Self {
			action,
			args: CommandArgs::default(),
		}
	}

	pub fn play() -> Self {
		Self::new(Action::Play)
	}

	pub fn pause() -> Self {
		Self::new(Action::Pause)
	}

	pub fn toggle() -> Self {
		Self::new(Action::Toggle)
	}

	pub fn next() -> Self {
		Self::new(Action::Next)
	}

	pub fn get_state() -> Self {
		Self::new(Action::GetState)
	}

	pub fn open() -> Self {
		Self::new(Action::Open)
	}

	pub fn seek(time: f64) -> Self {
		Self {
			action: Action::Seek,
			args: CommandArgs {
				time: Some(time),
				..Default::default()
			},
		}
	}

	pub fn search(query: impl Into<String>) -> Self {
		Self {
			action: Action::Search,
			args: CommandArgs {
				query: Some(query.into()),
				..Default::default()
			},
		}
	}

	pub fn play_by_id(video_id: impl Into<String>) -> Self {
		Self {
			action: Action::PlayById,
			args: CommandArgs {
				video_id: Some(video_id.into()),
				..Default::default()
			},
		}
	}
}

/// Exactly one reply per [`Command`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
	pub success: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl Response {
	pub fn ok(data: Value) -> Self {
		Self {
			success: true,
			data: Some(data),
			error: None,
		}
	}

	pub fn failure(error: impl Into<String>) -> Self {
		Self {
			success: false,
			data: None,
			error: Some(error.into()),
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn known_actions_use_snake_case_names() {
		let encoded = serde_json::to_value(Command::play_by_id("abc")).unwrap();
		assert_eq!(encoded, json!({"action": "play_by_id", "args": {"videoId": "abc"}}));

		let decoded: Command = serde_json::from_value(json!({"action": "get_state"})).unwrap();
		assert_eq!(decoded.action, Action::GetState);
		assert!(decoded.args.is_empty());
	}

	#[test]
	fn unknown_action_survives_decoding() {
		let decoded: Command = serde_json::from_value(json!({"action": "rewind"})).unwrap();
		assert_eq!(decoded.action, Action::Other("rewind".into()));
		assert_eq!(decoded.action.to_string(), "rewind");
	}

	#[test]
	fn args_without_values_are_omitted() {
		let encoded = serde_json::to_string(&Command::pause()).unwrap();
		assert_eq!(encoded, r#"{"action":"pause"}"#);
	}

	#[test]
	fn only_open_and_search_create_their_own_target() {
		assert!(Action::Open.creates_own_target());
		assert!(Action::Search.creates_own_target());
		assert!(!Action::PlayById.creates_own_target());
		assert!(!Action::Play.creates_own_target());
	}

	#[test]
	fn failure_response_has_no_data() {
		let encoded = serde_json::to_value(Response::failure("nope")).unwrap();
		assert_eq!(encoded, json!({"success": false, "error": "nope"}));
	}
}
