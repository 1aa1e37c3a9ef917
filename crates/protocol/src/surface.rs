//! Page-side types: tabs, playback state, search results, and the messages
//! the extension forwards into a tab.

use serde::{Deserialize, Serialize};

use crate::site;

/// A browser tab as reported by the host. Re-queried for every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
	pub id: i32,
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub url: String,
	/// Tab is currently producing audio.
	#[serde(default)]
	pub audible: bool,
}

impl TabInfo {
	/// Tab belongs to the controlled site.
	pub fn is_site_tab(&self) -> bool {
		site::is_site_url(&self.url)
	}

	/// Tab is on a watch (playback) page.
	pub fn is_watching_video(&self) -> bool {
		site::is_watch_url(&self.url)
	}
}

/// Playback snapshot reported by a tab.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoState {
	pub is_playing: bool,
	pub current_time: f64,
	pub duration: f64,
	pub title: String,
	pub thumbnail: String,
	pub channel: String,
	pub video_id: String,
	pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
	pub title: String,
	pub video_id: String,
}

/// Scraped results page. `success: false` with no data means the tab was
/// not on a results page or the results never rendered in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
	pub success: bool,
	#[serde(default)]
	pub data: Vec<SearchResultItem>,
}

impl SearchResults {
	pub fn empty() -> Self {
		Self::default()
	}
}

/// Player sub-action carried by [`SurfaceMessage::ControlPlayback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackAction {
	Play,
	Pause,
	Toggle,
	Next,
}

/// Message forwarded from the extension background into a tab.
///
/// The page runtime answers each with its own payload, or `null` when it
/// could not act. It never throws across this boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SurfaceMessage {
	GetVideoState,
	ControlPlayback { action: PlaybackAction },
	#[serde(rename = "SEEK_TO")]
	Seek { time: f64 },
	GetSearchResult { query: String },
	DoSearchAction { query: String },
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn tab(url: &str) -> TabInfo {
		TabInfo {
			id: 1,
			title: String::new(),
			url: url.to_string(),
			audible: false,
		}
	}

	#[test]
	fn watch_detection_requires_site_watch_path() {
		assert!(tab("https://www.youtube.com/watch?v=abc").is_watching_video());
		assert!(!tab("https://www.youtube.com/results?search_query=x").is_watching_video());
		assert!(!tab("https://example.com/watch?v=abc").is_watching_video());
	}

	#[test]
	fn site_tab_detection() {
		assert!(tab("https://www.youtube.com/").is_site_tab());
		assert!(tab("https://music.youtube.com/watch?v=1").is_site_tab());
		assert!(!tab("about:blank").is_site_tab());
	}

	#[test]
	fn surface_messages_match_page_contract() {
		assert_eq!(
			serde_json::to_value(SurfaceMessage::GetVideoState).unwrap(),
			json!({"type": "GET_VIDEO_STATE"})
		);
		assert_eq!(
			serde_json::to_value(SurfaceMessage::ControlPlayback {
				action: PlaybackAction::Toggle
			})
			.unwrap(),
			json!({"type": "CONTROL_PLAYBACK", "payload": {"action": "TOGGLE"}})
		);
		assert_eq!(
			serde_json::to_value(SurfaceMessage::Seek { time: 12.0 }).unwrap(),
			json!({"type": "SEEK_TO", "payload": {"time": 12.0}})
		);
		assert_eq!(
			serde_json::to_value(SurfaceMessage::DoSearchAction {
				query: "lofi".into()
			})
			.unwrap(),
			json!({"type": "DO_SEARCH_ACTION", "payload": {"query": "lofi"}})
		);
	}

	#[test]
	fn search_results_tolerate_missing_data() {
		let parsed: SearchResults = serde_json::from_value(json!({"success": false})).unwrap();
		assert_eq!(parsed, SearchResults::empty());
	}

	#[test]
	fn video_state_uses_camel_case() {
		let state: VideoState = serde_json::from_value(json!({
			"isPlaying": true,
			"currentTime": 1.5,
			"duration": 200.0,
			"title": "t",
			"thumbnail": "",
			"channel": "c",
			"videoId": "v",
			"url": "u"
		}))
		.unwrap();
		assert!(state.is_playing);
		assert_eq!(state.video_id, "v");
	}
}
