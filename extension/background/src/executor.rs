//! Turns one routed [`Command`] into an effect on a browser tab.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use ytc_protocol::site::{self, TAB_LOAD_DELAY_MS, TAB_LOAD_TIMEOUT_MS};
use ytc_protocol::{Action, Command, PlaybackAction, Response, SearchResults, SurfaceMessage, TabInfo};

use crate::selector::select_target;

/// A failure reported by the browser API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HostError(pub String);

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("No YouTube tab found")]
    NoTargetSurface,

    /// Names the argument the way the user sees it, e.g. `Time`.
    #[error("{0} parameter required")]
    MissingArgument(&'static str),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Browser operations the executor needs. Implemented over `chrome.tabs`
/// in the extension and in memory for tests.
#[async_trait(?Send)]
pub trait TabHost {
    /// Every open tab, in host order.
    async fn query_tabs(&self) -> Result<Vec<TabInfo>, HostError>;

    /// Opens a tab at `url` and returns its id.
    async fn create_tab(&self, url: &str) -> Result<i32, HostError>;

    async fn navigate_tab(&self, tab: i32, url: &str) -> Result<(), HostError>;

    async fn activate_tab(&self, tab: i32) -> Result<(), HostError>;

    /// Delivers `message` to the page runtime of `tab`. The page answers with
    /// its own payload, or `null` when it could not act.
    async fn send_to_tab(&self, tab: i32, message: &SurfaceMessage) -> Result<Value, HostError>;

    /// Resolves `true` once `tab` finished loading, `false` if `bound` elapsed first.
    async fn wait_for_load(&self, tab: i32, bound: Duration) -> Result<bool, HostError>;

    async fn sleep(&self, duration: Duration);

    fn log(&self, _line: &str) {}
}

fn millis(ms: u32) -> Duration {
    Duration::from_millis(u64::from(ms))
}

pub struct Executor<H> {
    host: H,
}

impl<H: TabHost> Executor<H> {
    pub fn new(host: H) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Runs `command` and always produces exactly one reply.
    pub async fn handle(&self, command: Command) -> Response {
        let action = command.action.to_string();
        match self.execute(command).await {
            Ok(response) => response,
            Err(err) => {
                self.host.log(&format!("{action} failed: {err}"));
                Response::failure(err.to_string())
            }
        }
    }

    async fn site_tabs(&self) -> Result<Vec<TabInfo>, HostError> {
        let tabs = self.host.query_tabs().await?;
        Ok(tabs.into_iter().filter(TabInfo::is_site_tab).collect())
    }

    /// Target tab for the current command, re-resolved every time.
    pub async fn resolve_target(&self) -> Result<Option<TabInfo>, HostError> {
        let tabs = self.site_tabs().await?;
        Ok(select_target(&tabs).cloned())
    }

    pub async fn execute(&self, command: Command) -> Result<Response, ExecError> {
        let Command { action, args } = command;

        if action.creates_own_target() {
            return match action {
                Action::Open => {
                    self.host.create_tab(site::BASE_URL).await?;
                    Ok(Response::ok(json!({ "message": "opened" })))
                }
                _ => {
                    let query = args
                        .query
                        .filter(|q| !q.trim().is_empty())
                        .ok_or(ExecError::MissingArgument("Query"))?;
                    self.search(&query).await
                }
            };
        }

        let tab = self.resolve_target().await?.ok_or(ExecError::NoTargetSurface)?.id;

        match action {
            Action::Play => self.playback(tab, PlaybackAction::Play).await,
            Action::Pause => self.playback(tab, PlaybackAction::Pause).await,
            Action::Toggle => self.playback(tab, PlaybackAction::Toggle).await,
            Action::Next => self.playback(tab, PlaybackAction::Next).await,
            Action::Seek => {
                let time = args.time.ok_or(ExecError::MissingArgument("Time"))?;
                self.forward(tab, SurfaceMessage::Seek { time }).await
            }
            Action::GetState => self.forward(tab, SurfaceMessage::GetVideoState).await,
            Action::PlayById => {
                let video_id = args
                    .video_id
                    .filter(|id| !id.is_empty())
                    .ok_or(ExecError::MissingArgument("Video ID"))?;
                self.play_by_id(&video_id).await
            }
            other => Err(ExecError::UnknownAction(other.to_string())),
        }
    }

    async fn playback(&self, tab: i32, action: PlaybackAction) -> Result<Response, ExecError> {
        self.forward(tab, SurfaceMessage::ControlPlayback { action }).await
    }

    async fn forward(&self, tab: i32, message: SurfaceMessage) -> Result<Response, ExecError> {
        let state = self.host.send_to_tab(tab, &message).await?;
        Ok(Response::ok(state))
    }

    async fn play_by_id(&self, video_id: &str) -> Result<Response, ExecError> {
        let url = site::watch_url(video_id);
        let tabs = self.site_tabs().await?;

        let tab = match tabs.first() {
            Some(tab) => {
                self.host.navigate_tab(tab.id, &url).await?;
                tab.id
            }
            None => self.host.create_tab(&url).await?,
        };
        self.host.activate_tab(tab).await?;
        self.host.sleep(millis(TAB_LOAD_DELAY_MS)).await;

        Ok(Response::ok(json!([])))
    }

    /// Reuses the first site tab through the page's own search box, or opens
    /// the results page directly. Then waits for the load, lets results render,
    /// and asks the page to scrape them.
    pub async fn search(&self, query: &str) -> Result<Response, ExecError> {
        let tabs = self.site_tabs().await?;

        let tab = match tabs.first() {
            Some(tab) => {
                self.host
                    .send_to_tab(
                        tab.id,
                        &SurfaceMessage::DoSearchAction {
                            query: query.to_string(),
                        },
                    )
                    .await?;
                // the page submits the search on its next tick
                self.host.sleep(millis(TAB_LOAD_DELAY_MS)).await;
                tab.id
            }
            None => self.host.create_tab(&site::search_url(query)).await?,
        };

        if !self.host.wait_for_load(tab, millis(TAB_LOAD_TIMEOUT_MS)).await? {
            self.host.log(&format!("tab {tab} still loading after {TAB_LOAD_TIMEOUT_MS}ms, scraping anyway"));
        }
        self.host.sleep(millis(TAB_LOAD_DELAY_MS)).await;

        let raw = self
            .host
            .send_to_tab(
                tab,
                &SurfaceMessage::GetSearchResult {
                    query: query.to_string(),
                },
            )
            .await?;
        let results: SearchResults = serde_json::from_value(raw).unwrap_or_else(|_| SearchResults::empty());

        Ok(Response {
            success: results.success,
            data: Some(serde_json::to_value(&results.data).unwrap_or_else(|_| json!([]))),
            error: None,
        })
    }
}
