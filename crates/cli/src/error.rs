use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelayError>;

/// Message returned to callers when no controller session exists.
pub const NOT_CONNECTED_MESSAGE: &str = "Extension not connected. Please open browser first.";

#[derive(Debug, Error)]
pub enum RelayError {
	/// No controller session exists. Surfaced immediately, never retried.
	#[error("{}", NOT_CONNECTED_MESSAGE)]
	NotConnected,

	/// The session ended after the command was sent but before it was answered.
	#[error("Extension disconnected before responding")]
	Disconnected,

	#[error("Timed out after {ms}ms waiting for {action} response")]
	Timeout { ms: u64, action: String },

	/// A required tool argument was absent or unusable.
	#[error("Missing required parameter: {0}")]
	MissingArgument(&'static str),

	#[error("Failed to decode controller frame: {0}")]
	Frame(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn messages_are_user_facing() {
		assert_eq!(RelayError::NotConnected.to_string(), NOT_CONNECTED_MESSAGE);
		assert_eq!(
			RelayError::Timeout {
				ms: 500,
				action: "search".into()
			}
			.to_string(),
			"Timed out after 500ms waiting for search response"
		);
		assert_eq!(
			RelayError::MissingArgument("query").to_string(),
			"Missing required parameter: query"
		);
	}
}
