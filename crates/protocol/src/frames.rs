//! Frames exchanged on the controller WebSocket.
//!
//! Every frame is a JSON text message of the shape `{"event": ..., "data": ...}`.
//! The exchange is:
//!
//! 1. Extension connects to the relay's `/extension` endpoint
//! 2. Relay sends [`ServerFrame::Role`] assigning the controller role
//! 3. Relay sends [`ServerFrame::Command`] tagged with an acknowledgment id
//! 4. Extension answers each command with exactly one [`ClientFrame::Ack`]
//!    carrying the same id
//! 5. Extension may push [`ClientFrame::VideoStateUpdate`] at any time
//!
//! The `ack` id belongs to the connection: it is allocated by the relay's
//! connection handle per emitted command and echoed back verbatim.

use serde::{Deserialize, Serialize};

use crate::command::{Command, Response};
use crate::surface::VideoState;

/// Role assigned to a connection on accept. Only one role exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
	Controller,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
	pub role: Role,
}

impl RoleAssignment {
	pub fn controller() -> Self {
		Self {
			role: Role::Controller,
		}
	}
}

/// Frame sent from the relay to the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerFrame {
	/// Pushed once right after the connection is adopted.
	Role(RoleAssignment),
	/// A command awaiting one [`ClientFrame::Ack`] with the same `ack`.
	Command { ack: u64, command: Command },
}

/// Frame sent from the controller to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientFrame {
	/// Reply to the command emitted with the same `ack`.
	Ack { ack: u64, response: Response },
	/// Latest playback state of the selected tab.
	VideoStateUpdate(VideoState),
	/// Diagnostic line from the extension.
	Log { level: String, message: String },
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn role_frame_wire_shape() {
		let frame = ServerFrame::Role(RoleAssignment::controller());
		assert_eq!(
			serde_json::to_value(&frame).unwrap(),
			json!({"event": "role", "data": {"role": "CONTROLLER"}})
		);
	}

	#[test]
	fn command_frame_carries_ack_id() {
		let frame = ServerFrame::Command {
			ack: 7,
			command: Command::seek(42.5),
		};
		assert_eq!(
			serde_json::to_value(&frame).unwrap(),
			json!({
				"event": "command",
				"data": {"ack": 7, "command": {"action": "seek", "args": {"time": 42.5}}}
			})
		);
	}

	#[test]
	fn ack_frame_decodes_response() {
		let raw = r#"{"event":"ack","data":{"ack":3,"response":{"success":true,"data":{"isPlaying":true}}}}"#;
		let frame: ClientFrame = serde_json::from_str(raw).unwrap();
		match frame {
			ClientFrame::Ack { ack, response } => {
				assert_eq!(ack, 3);
				assert!(response.success);
				assert_eq!(response.data, Some(json!({"isPlaying": true})));
			}
			other => panic!("unexpected frame: {other:?}"),
		}
	}

	#[test]
	fn unknown_event_is_rejected() {
		let raw = r#"{"event":"hello","data":{}}"#;
		assert!(serde_json::from_str::<ClientFrame>(raw).is_err());
	}
}
