//! Site URLs and shared timing constants.

use url::form_urlencoded;

pub const BASE_URL: &str = "https://www.youtube.com";
pub const SEARCH_URL_PREFIX: &str = "https://www.youtube.com/results?search_query=";
pub const WATCH_URL: &str = "https://www.youtube.com/watch";

const SITE_DOMAIN: &str = "youtube.com";
const WATCH_MARKER: &str = "youtube.com/watch";

/// Relay listen port used by both sides unless overridden.
pub const RELAY_PORT: u16 = 3000;
/// WebSocket path the controller connects to.
pub const RELAY_PATH: &str = "/extension";
/// Close code sent to a controller that a newer connection replaced. The
/// extension does not reconnect after it.
pub const SUPERSEDED_CLOSE_CODE: u16 = 4001;
pub const SUPERSEDED_CLOSE_REASON: &str = "superseded";

pub const RECONNECTION_DELAY_MS: u32 = 1000;
pub const RECONNECTION_ATTEMPTS: u32 = 5;
pub const VIDEO_STATE_UPDATE_INTERVAL_MS: u32 = 1000;
pub const TAB_LOAD_DELAY_MS: u32 = 1000;
pub const TAB_LOAD_TIMEOUT_MS: u32 = 10_000;

pub fn is_site_url(url: &str) -> bool {
	url.contains(SITE_DOMAIN)
}

pub fn is_watch_url(url: &str) -> bool {
	url.contains(WATCH_MARKER)
}

/// Results page URL for `query`, form-encoded.
pub fn search_url(query: &str) -> String {
	let encoded: String = form_urlencoded::byte_serialize(query.as_bytes()).collect();
	format!("{SEARCH_URL_PREFIX}{encoded}")
}

pub fn watch_url(video_id: &str) -> String {
	let encoded: String = form_urlencoded::byte_serialize(video_id.as_bytes()).collect();
	format!("{WATCH_URL}?v={encoded}")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn search_url_encodes_query() {
		assert_eq!(
			search_url("lofi beats"),
			"https://www.youtube.com/results?search_query=lofi+beats"
		);
		assert_eq!(
			search_url("a&b=c"),
			"https://www.youtube.com/results?search_query=a%26b%3Dc"
		);
	}

	#[test]
	fn watch_url_from_id() {
		assert_eq!(watch_url("dQw4w9WgXcQ"), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
		assert!(is_watch_url(&watch_url("x")));
	}
}
