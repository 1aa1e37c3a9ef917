pub mod executor;
pub mod selector;

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use js_sys::{Array, Object, Promise, Reflect};
use serde::Serialize;
use serde_json::{json, Value};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{CloseEvent, ErrorEvent, MessageEvent, WebSocket};
use ytc_protocol::site::{
    RECONNECTION_ATTEMPTS, RECONNECTION_DELAY_MS, RELAY_PATH, RELAY_PORT, SUPERSEDED_CLOSE_CODE,
    VIDEO_STATE_UPDATE_INTERVAL_MS,
};
use ytc_protocol::{ClientFrame, ServerFrame, SurfaceMessage, TabInfo, VideoState};

use crate::executor::{Executor, HostError, TabHost};
use crate::selector::select_target;

const LOG_LIMIT: usize = 40;
const LOAD_POLL_MS: u32 = 250;

thread_local! {
    static LOG: RefCell<Vec<String>> = RefCell::new(Vec::new());
    static WS: RefCell<Option<Rc<WebSocket>>> = RefCell::new(None);
    static ATTEMPTS: Cell<u32> = Cell::new(0);
}

fn relay_url() -> String {
    format!("ws://127.0.0.1:{RELAY_PORT}{RELAY_PATH}")
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    set_status("connecting", "ytc (connecting)", [160, 160, 160, 255]);

    if let Err(err) = connect() {
        set_status("error", &stringify_js_error(err.clone()), [200, 40, 40, 255]);
        push_log(&format!("connect failed: {}", stringify_js_error(err)));
        schedule_reconnect();
    }

    wasm_bindgen_futures::spawn_local(state_pump());
}

fn connect() -> Result<(), JsValue> {
    let ws = Rc::new(WebSocket::new(&relay_url())?);
    WS.with(|w| *w.borrow_mut() = Some(ws.clone()));

    {
        let ws_inner = ws.clone();
        let onmessage = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            let ws_clone = ws_inner.clone();
            wasm_bindgen_futures::spawn_local(async move {
                if let Err(err) = handle_message(event, ws_clone).await {
                    push_log(&format!("bad frame: {}", stringify_js_error(err)));
                }
            });
        });
        ws.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
        onmessage.forget();
    }

    {
        let onopen = Closure::<dyn FnMut()>::new(|| {
            ATTEMPTS.with(|a| a.set(0));
            set_status("connected", "ytc connected", [30, 170, 80, 255]);
            push_log("connected");
        });
        ws.set_onopen(Some(onopen.as_ref().unchecked_ref()));
        onopen.forget();

        let onerror = Closure::<dyn FnMut(ErrorEvent)>::new(|e: ErrorEvent| {
            set_status("error", &e.message(), [200, 40, 40, 255]);
        });
        ws.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        onerror.forget();

        let closing = Rc::downgrade(&ws);
        let onclose = Closure::<dyn FnMut(CloseEvent)>::new(move |event: CloseEvent| {
            let retry = should_reconnect(event.code());
            if retry {
                set_status("disconnected", "relay disconnected", [120, 120, 120, 255]);
                push_log("disconnected");
            } else {
                set_status("disconnected", "replaced by another browser", [120, 120, 120, 255]);
                push_log("replaced by a newer controller, not reconnecting");
            }
            // a stale socket closing must not tear down its replacement
            let is_current = WS.with(|w| {
                let mut slot = w.borrow_mut();
                let current = match (slot.as_ref(), closing.upgrade()) {
                    (Some(active), Some(this)) => Rc::ptr_eq(active, &this),
                    _ => false,
                };
                if current {
                    *slot = None;
                }
                current
            });
            if is_current && retry {
                schedule_reconnect();
            }
        });
        ws.set_onclose(Some(onclose.as_ref().unchecked_ref()));
        onclose.forget();
    }

    Ok(())
}

/// The relay closes a replaced controller with [`SUPERSEDED_CLOSE_CODE`].
/// Reconnecting then would evict the connection that replaced it.
fn should_reconnect(close_code: u16) -> bool {
    close_code != SUPERSEDED_CLOSE_CODE
}

fn schedule_reconnect() {
    let attempt = ATTEMPTS.with(|a| {
        let next = a.get() + 1;
        a.set(next);
        next
    });
    if attempt > RECONNECTION_ATTEMPTS {
        set_status("error", "relay unreachable", [200, 40, 40, 255]);
        push_log(&format!("giving up after {RECONNECTION_ATTEMPTS} attempts"));
        return;
    }

    push_log(&format!("reconnecting ({attempt}/{RECONNECTION_ATTEMPTS})"));
    wasm_bindgen_futures::spawn_local(async move {
        sleep_ms(RECONNECTION_DELAY_MS).await;
        if let Err(err) = connect() {
            push_log(&format!("connect failed: {}", stringify_js_error(err)));
            schedule_reconnect();
        }
    });
}

async fn handle_message(event: MessageEvent, ws: Rc<WebSocket>) -> Result<(), JsValue> {
    let text = event.data().as_string().ok_or("no text")?;
    let frame: ServerFrame = serde_json::from_str(&text).map_err(|e| JsValue::from_str(&e.to_string()))?;

    match frame {
        ServerFrame::Role(assignment) => {
            push_log(&format!("role: {:?}", assignment.role));
        }
        ServerFrame::Command { ack, command } => {
            push_log(&format!("command: {}", command.action));
            let response = Executor::new(ChromeTabs).handle(command).await;
            send_json(&ws, &ClientFrame::Ack { ack, response })?;
        }
    }
    Ok(())
}

/// Passes a message through only when it differs from the previous one.
#[derive(Default)]
struct RepeatFilter {
    last: Option<String>,
}

impl RepeatFilter {
    fn is_new(&mut self, message: &str) -> bool {
        if self.last.as_deref() == Some(message) {
            return false;
        }
        self.last = Some(message.to_string());
        true
    }

    fn reset(&mut self) {
        self.last = None;
    }
}

/// Pushes the selected tab's playback state while connected.
async fn state_pump() {
    let mut failures = RepeatFilter::default();
    loop {
        sleep_ms(VIDEO_STATE_UPDATE_INTERVAL_MS).await;

        let Some(ws) = open_socket() else {
            continue;
        };
        match current_video_state().await {
            Ok(Some(state)) => {
                failures.reset();
                let _ = send_json(&ws, &ClientFrame::VideoStateUpdate(state));
            }
            Ok(None) => failures.reset(),
            Err(err) => {
                // a tab without a content script fails every tick
                let line = format!("state update failed: {err}");
                if failures.is_new(&line) {
                    push_log(&line);
                }
            }
        }
    }
}

async fn current_video_state() -> Result<Option<VideoState>, HostError> {
    let host = ChromeTabs;
    let tabs: Vec<TabInfo> = host.query_tabs().await?.into_iter().filter(TabInfo::is_site_tab).collect();
    let Some(tab) = select_target(&tabs) else {
        return Ok(None);
    };

    let raw = host.send_to_tab(tab.id, &SurfaceMessage::GetVideoState).await?;
    if raw.is_null() {
        return Ok(None);
    }
    serde_json::from_value(raw)
        .map(Some)
        .map_err(|e| HostError::new(e.to_string()))
}

fn open_socket() -> Option<Rc<WebSocket>> {
    WS.with(|w| w.borrow().clone())
        .filter(|ws| ws.ready_state() == WebSocket::OPEN)
}

/// `chrome.tabs` as a [`TabHost`].
pub struct ChromeTabs;

#[async_trait(?Send)]
impl TabHost for ChromeTabs {
    async fn query_tabs(&self) -> Result<Vec<TabInfo>, HostError> {
        let query = to_js(&json!({}))?;
        let tabs = JsFuture::from(tabs_query(&query)).await.map_err(host_error)?;
        let tabs = Array::from(&tabs);

        let mut out = Vec::with_capacity(tabs.length() as usize);
        for tab in tabs.iter() {
            // tabs without an id (devtools windows) cannot be targeted
            if let Ok(info) = serde_wasm_bindgen::from_value::<TabInfo>(tab) {
                out.push(info);
            }
        }
        Ok(out)
    }

    async fn create_tab(&self, url: &str) -> Result<i32, HostError> {
        let props = to_js(&json!({ "url": url }))?;
        let tab = JsFuture::from(tabs_create(&props)).await.map_err(host_error)?;
        tab_id(&tab)
    }

    async fn navigate_tab(&self, tab: i32, url: &str) -> Result<(), HostError> {
        let props = to_js(&json!({ "url": url }))?;
        JsFuture::from(tabs_update(tab, &props)).await.map_err(host_error)?;
        Ok(())
    }

    async fn activate_tab(&self, tab: i32) -> Result<(), HostError> {
        let props = to_js(&json!({ "active": true }))?;
        JsFuture::from(tabs_update(tab, &props)).await.map_err(host_error)?;
        Ok(())
    }

    async fn send_to_tab(&self, tab: i32, message: &SurfaceMessage) -> Result<Value, HostError> {
        let message = to_js(message)?;
        let reply = JsFuture::from(tabs_send_message(tab, &message)).await.map_err(host_error)?;
        if reply.is_undefined() || reply.is_null() {
            return Ok(Value::Null);
        }
        serde_wasm_bindgen::from_value(reply).map_err(|e| HostError::new(e.to_string()))
    }

    async fn wait_for_load(&self, tab: i32, bound: Duration) -> Result<bool, HostError> {
        let deadline = js_sys::Date::now() + bound.as_millis() as f64;
        loop {
            let info = JsFuture::from(tabs_get(tab)).await.map_err(host_error)?;
            let status = Reflect::get(&info, &JsValue::from_str("status"))
                .ok()
                .and_then(|v| v.as_string());
            if status.as_deref() == Some("complete") {
                return Ok(true);
            }
            if js_sys::Date::now() >= deadline {
                return Ok(false);
            }
            sleep_ms(LOAD_POLL_MS).await;
        }
    }

    async fn sleep(&self, duration: Duration) {
        sleep_ms(u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)).await;
    }

    fn log(&self, line: &str) {
        push_log(line);
    }
}

fn tab_id(tab: &JsValue) -> Result<i32, HostError> {
    Reflect::get(tab, &JsValue::from_str("id"))
        .ok()
        .and_then(|v| v.as_f64())
        .map(|id| id as i32)
        .ok_or_else(|| HostError::new("no tab id"))
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, HostError> {
    // plain objects, not ES maps, for the chrome APIs
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    value.serialize(&serializer).map_err(|e| HostError::new(e.to_string()))
}

fn host_error(err: JsValue) -> HostError {
    HostError::new(stringify_js_error(err))
}

async fn sleep_ms(ms: u32) {
    let promise = Promise::new(&mut |resolve, _| {
        set_timeout(&resolve, ms as i32);
    });
    let _ = JsFuture::from(promise).await;
}

fn send_json<T: Serialize>(ws: &WebSocket, value: &T) -> Result<(), JsValue> {
    ws.send_with_str(&serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))?)
}

fn stringify_js_error(err: JsValue) -> String {
    err.as_string()
        .or_else(|| js_sys::JSON::stringify(&err).ok()?.as_string())
        .unwrap_or_else(|| format!("{:?}", err))
}

fn set_status(status: &str, title: &str, rgba: [u8; 4]) {
    let text = match status {
        "connected" => "ON",
        "error" => "ERR",
        "disconnected" => "OFF",
        _ => "...",
    };

    let color = Array::new();
    for c in rgba {
        color.push(&JsValue::from_f64(c as f64));
    }

    let text_obj = Object::new();
    let _ = Reflect::set(&text_obj, &JsValue::from_str("text"), &JsValue::from_str(text));
    action_set_badge_text(&text_obj);

    let color_obj = Object::new();
    let _ = Reflect::set(&color_obj, &JsValue::from_str("color"), &color);
    action_set_badge_background_color(&color_obj);

    let title_obj = Object::new();
    let _ = Reflect::set(&title_obj, &JsValue::from_str("title"), &JsValue::from_str(title));
    action_set_title(&title_obj);

    persist_state(status, title);
}

/// Keeps the newest [`LOG_LIMIT`] lines in storage and mirrors each line to
/// the relay when connected.
fn push_log(line: &str) {
    LOG.with(|log| {
        let mut vec = log.borrow_mut();
        vec.push(line.to_string());
        if vec.len() > LOG_LIMIT {
            let excess = vec.len() - LOG_LIMIT;
            vec.drain(0..excess);
        }
        persist_log(&vec);
    });

    if let Some(ws) = open_socket() {
        let frame = ClientFrame::Log {
            level: "info".into(),
            message: line.to_string(),
        };
        let _ = send_json(&ws, &frame);
    }
}

fn persist_state(status: &str, message: &str) {
    let obj = Object::new();
    let state = Object::new();
    let _ = Reflect::set(&state, &JsValue::from_str("status"), &JsValue::from_str(status));
    let _ = Reflect::set(&state, &JsValue::from_str("message"), &JsValue::from_str(message));
    let _ = Reflect::set(&obj, &JsValue::from_str("ytc_state"), &state);
    let _ = storage_local_set(&obj);
}

fn persist_log(lines: &[String]) {
    let array = Array::new();
    for line in lines {
        array.push(&JsValue::from_str(line));
    }
    let obj = Object::new();
    let _ = Reflect::set(&obj, &JsValue::from_str("ytc_log"), &array);
    let _ = storage_local_set(&obj);
}

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_name = setTimeout)]
    fn set_timeout(callback: &js_sys::Function, ms: i32) -> JsValue;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = query)]
    fn tabs_query(query: &JsValue) -> Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = create)]
    fn tabs_create(props: &JsValue) -> Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = update)]
    fn tabs_update(tab_id: i32, props: &JsValue) -> Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = get)]
    fn tabs_get(tab_id: i32) -> Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = sendMessage)]
    fn tabs_send_message(tab_id: i32, message: &JsValue) -> Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "action"], js_name = setBadgeText)]
    fn action_set_badge_text(details: &JsValue);

    #[wasm_bindgen(js_namespace = ["chrome", "action"], js_name = setBadgeBackgroundColor)]
    fn action_set_badge_background_color(details: &JsValue);

    #[wasm_bindgen(js_namespace = ["chrome", "action"], js_name = setTitle)]
    fn action_set_title(details: &JsValue);

    #[wasm_bindgen(js_namespace = ["chrome", "storage", "local"], js_name = set)]
    fn storage_local_set(items: &JsValue) -> Promise;
}
