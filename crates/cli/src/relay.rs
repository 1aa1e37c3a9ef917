use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};
use ytc_protocol::{ClientFrame, ServerFrame};
use ytc_protocol::site::{RELAY_PATH, SUPERSEDED_CLOSE_CODE, SUPERSEDED_CLOSE_REASON};

use crate::error::RelayError;
use crate::session::{ControllerHandle, SessionManager};

type SharedState = Arc<SessionManager>;

/// Binds the relay listener. Failing here is the one fatal transport fault.
pub async fn bind_relay(host: &str, port: u16) -> Result<TcpListener> {
	let addr: SocketAddr = format!("{host}:{port}")
		.parse()
		.with_context(|| format!("Invalid host/port combination: {host}:{port}"))?;

	TcpListener::bind(addr)
		.await
		.with_context(|| format!("Failed to bind relay server to {addr}"))
}

pub fn relay_router(sessions: SharedState) -> Router {
	Router::new()
		.route("/", get(|| async { "OK" }))
		.route(
			RELAY_PATH,
			get(
				|ws: WebSocketUpgrade, State(sessions): State<SharedState>| async move {
					ws.on_upgrade(|socket| handle_controller_socket(socket, sessions))
				},
			),
		)
		.with_state(sessions)
}

pub async fn serve_relay(listener: TcpListener, sessions: SharedState) -> Result<()> {
	let addr = listener.local_addr().context("Reading relay address")?;
	info!(target = "ytc", %addr, path = RELAY_PATH, "relay listening");

	axum::serve(listener, relay_router(sessions).into_make_service())
		.await
		.context("Relay server error")
}

pub async fn run_relay_server(host: &str, port: u16, sessions: SharedState) -> Result<()> {
	let listener = bind_relay(host, port).await?;
	serve_relay(listener, sessions).await
}

async fn handle_controller_socket(socket: WebSocket, sessions: SharedState) {
	let (handle, rx) = sessions.new_handle();
	let (mut ws_tx, mut ws_rx) = socket.split();

	let writer = {
		let handle = handle.clone();
		tokio::spawn(async move {
			write_frames(&mut ws_tx, rx, &handle).await;
			let _ = ws_tx.send(Message::Close(close_frame(&handle))).await;
		})
	};

	sessions.on_connect(handle.clone());

	loop {
		tokio::select! {
			msg = ws_rx.next() => match msg {
				Some(Ok(Message::Text(text))) => {
					if let Err(err) = handle_controller_message(&sessions, &handle, text.as_str()) {
						warn!(target = "ytc", handle = handle.id(), error = %err, "failed handling controller message");
					}
				}
				Some(Ok(Message::Close(_))) | None => break,
				Some(Ok(_)) => {}
				Some(Err(err)) => {
					warn!(target = "ytc", handle = handle.id(), error = %err, "controller websocket error");
					break;
				}
			},
			_ = handle.closed() => {
				debug!(target = "ytc", handle = handle.id(), "connection superseded, closing");
				break;
			}
		}
	}

	handle.disconnect();
	sessions.on_disconnect(handle.id());
	if tokio::time::timeout(std::time::Duration::from_secs(1), writer).await.is_err() {
		debug!(target = "ytc", handle = handle.id(), "writer did not finish closing");
	}
}

/// A replaced controller gets a distinct close code so it stays down
/// instead of reconnecting and evicting its replacement.
fn close_frame(handle: &ControllerHandle) -> Option<CloseFrame> {
	handle.is_superseded().then(|| CloseFrame {
		code: SUPERSEDED_CLOSE_CODE,
		reason: SUPERSEDED_CLOSE_REASON.into(),
	})
}

async fn write_frames<S>(ws_tx: &mut S, rx: mpsc::UnboundedReceiver<ServerFrame>, handle: &ControllerHandle)
where
	S: futures::Sink<Message> + Unpin,
{
	let mut frames = UnboundedReceiverStream::new(rx);
	loop {
		tokio::select! {
			frame = frames.next() => {
				let Some(frame) = frame else { break };
				let text = match serde_json::to_string(&frame) {
					Ok(text) => text,
					Err(err) => {
						warn!(target = "ytc", error = %err, "failed to encode frame");
						continue;
					}
				};
				if ws_tx.send(Message::Text(text.into())).await.is_err() {
					break;
				}
			}
			_ = handle.closed() => break,
		}
	}
}

fn handle_controller_message(sessions: &SessionManager, handle: &ControllerHandle, raw: &str) -> Result<(), RelayError> {
	let frame: ClientFrame = serde_json::from_str(raw)?;

	match frame {
		ClientFrame::Ack { ack, response } => {
			if !handle.resolve_ack(ack, response) {
				warn!(target = "ytc", handle = handle.id(), ack, "received ack with unknown id from controller");
			}
		}
		ClientFrame::VideoStateUpdate(state) => {
			if !sessions.on_state_push(handle.id(), state) {
				debug!(target = "ytc", handle = handle.id(), "ignoring state from superseded controller");
			}
		}
		ClientFrame::Log { level, message } => {
			debug!(target = "ytc", level = %level, message = %message, "extension log");
		}
	}

	Ok(())
}
