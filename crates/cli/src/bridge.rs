//! Command correlation over the controller session.
//!
//! Every command is matched to its reply through the connection's own ack
//! id (see [`ControllerHandle::emit_with_ack`](crate::session::ControllerHandle::emit_with_ack)).
//! The round-trip is bounded: a command sent to a session that dies or stops
//! answering resolves with a failure instead of hanging.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use ytc_protocol::{Command, Response};

use crate::error::{RelayError, Result};
use crate::session::SessionManager;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ExtensionBridge {
	sessions: Arc<SessionManager>,
	command_timeout: Duration,
}

impl ExtensionBridge {
	pub fn new(sessions: Arc<SessionManager>, command_timeout: Duration) -> Self {
		Self {
			sessions,
			command_timeout,
		}
	}

	pub fn is_connected(&self) -> bool {
		self.sessions.is_connected()
	}

	/// Sends `command` and waits for its single reply. Relay-side failures
	/// are folded into a failed [`Response`].
	pub async fn send_command(&self, command: Command) -> Response {
		match self.try_send_command(command).await {
			Ok(response) => response,
			Err(err) => Response::failure(err.to_string()),
		}
	}

	pub async fn try_send_command(&self, command: Command) -> Result<Response> {
		let handle = self.sessions.current().ok_or(RelayError::NotConnected)?;
		let action = command.action.to_string();

		let mut pending = handle.emit_with_ack(command)?;
		let ack = pending.ack();
		debug!(target = "ytc", handle = handle.id(), ack, action = %action, "command sent");

		let outcome = tokio::time::timeout(self.command_timeout, pending.wait()).await;
		match outcome {
			Ok(Ok(response)) => {
				debug!(target = "ytc", ack, success = response.success, "command answered");
				Ok(response)
			}
			Ok(Err(err)) => {
				warn!(target = "ytc", ack, action = %action, "controller went away before answering");
				Err(err)
			}
			Err(_) => {
				let ms = self.command_timeout.as_millis() as u64;
				warn!(target = "ytc", ack, action = %action, ms, "command timed out");
				Err(RelayError::Timeout { ms, action })
			}
		}
	}
}
