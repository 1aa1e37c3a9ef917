//! Controller session ownership.
//!
//! At most one controller connection is authoritative at a time. The
//! [`SessionManager`] owns the reference to it and the latest playback
//! snapshot it pushed; every mutation goes through the connect, disconnect
//! and state-push hooks. A [`ControllerHandle`] is the relay's end of one
//! accepted connection, including that connection's acknowledgment table.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};
use ytc_protocol::{Command, Response, RoleAssignment, ServerFrame, VideoState};

use crate::error::{RelayError, Result};

pub type HandleId = u64;

#[derive(Default)]
struct AckTable {
	next_ack: u64,
	pending: HashMap<u64, oneshot::Sender<Response>>,
}

struct HandleInner {
	id: HandleId,
	outbound: mpsc::UnboundedSender<ServerFrame>,
	acks: Mutex<AckTable>,
	closed: watch::Sender<bool>,
	superseded: AtomicBool,
}

/// Relay end of one controller connection.
///
/// Cloning is cheap and every clone refers to the same connection.
#[derive(Clone)]
pub struct ControllerHandle {
	inner: Arc<HandleInner>,
}

impl std::fmt::Debug for ControllerHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ControllerHandle")
			.field("id", &self.inner.id)
			.field("connected", &self.is_connected())
			.finish()
	}
}

impl ControllerHandle {
	/// Creates a handle plus the receiver the socket writer drains.
	pub fn new(id: HandleId) -> (Self, mpsc::UnboundedReceiver<ServerFrame>) {
		let (outbound, rx) = mpsc::unbounded_channel();
		let (closed, _) = watch::channel(false);
		let handle = Self {
			inner: Arc::new(HandleInner {
				id,
				outbound,
				acks: Mutex::new(AckTable::default()),
				closed,
				superseded: AtomicBool::new(false),
			}),
		};
		(handle, rx)
	}

	pub fn id(&self) -> HandleId {
		self.inner.id
	}

	pub fn is_connected(&self) -> bool {
		!*self.inner.closed.borrow() && !self.inner.outbound.is_closed()
	}

	/// Queues a frame that expects no reply.
	pub fn emit(&self, frame: ServerFrame) -> Result<()> {
		if !self.is_connected() {
			return Err(RelayError::Disconnected);
		}
		self.inner
			.outbound
			.send(frame)
			.map_err(|_| RelayError::Disconnected)
	}

	/// Queues a command and registers the acknowledgment it must be answered with.
	pub fn emit_with_ack(&self, command: Command) -> Result<PendingAck> {
		let (tx, rx) = oneshot::channel();
		let ack = {
			let mut table = self.inner.acks.lock();
			if !self.is_connected() {
				return Err(RelayError::Disconnected);
			}
			table.next_ack += 1;
			let ack = table.next_ack;
			table.pending.insert(ack, tx);
			ack
		};

		if self
			.inner
			.outbound
			.send(ServerFrame::Command { ack, command })
			.is_err()
		{
			self.inner.acks.lock().pending.remove(&ack);
			return Err(RelayError::Disconnected);
		}

		Ok(PendingAck {
			ack,
			rx,
			handle: self.clone(),
		})
	}

	/// Delivers an inbound acknowledgment. Returns false for unknown or expired ids.
	pub fn resolve_ack(&self, ack: u64, response: Response) -> bool {
		let sender = self.inner.acks.lock().pending.remove(&ack);
		match sender {
			Some(sender) => sender.send(response).is_ok(),
			None => false,
		}
	}

	/// Terminates the connection. Outstanding acknowledgments resolve as
	/// disconnected right away.
	pub fn disconnect(&self) {
		let dropped = {
			let mut table = self.inner.acks.lock();
			self.inner.closed.send_replace(true);
			let count = table.pending.len();
			table.pending.clear();
			count
		};
		if dropped > 0 {
			debug!(target = "ytc", handle = self.inner.id, dropped, "dropped pending acks on disconnect");
		}
	}

	/// Terminates the connection because a newer one took its place.
	pub fn supersede(&self) {
		self.inner.superseded.store(true, Ordering::Release);
		self.disconnect();
	}

	/// Whether the connection ended through [`supersede`](Self::supersede).
	pub fn is_superseded(&self) -> bool {
		self.inner.superseded.load(Ordering::Acquire)
	}

	/// Resolves once [`disconnect`](Self::disconnect) has been called.
	pub async fn closed(&self) {
		let mut rx = self.inner.closed.subscribe();
		let _ = rx.wait_for(|closed| *closed).await;
	}

	pub fn pending_acks(&self) -> usize {
		self.inner.acks.lock().pending.len()
	}

	fn same_connection(&self, other: &ControllerHandle) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}
}

/// Reply slot for one emitted command. Dropping it forgets the ack id.
pub struct PendingAck {
	ack: u64,
	rx: oneshot::Receiver<Response>,
	handle: ControllerHandle,
}

impl PendingAck {
	pub fn ack(&self) -> u64 {
		self.ack
	}

	/// Waits for the acknowledgment, or for the connection to be torn down.
	pub async fn wait(&mut self) -> Result<Response> {
		(&mut self.rx).await.map_err(|_| RelayError::Disconnected)
	}
}

impl Drop for PendingAck {
	fn drop(&mut self) {
		self.handle.inner.acks.lock().pending.remove(&self.ack);
	}
}

#[derive(Default)]
struct SessionSlot {
	current: Option<ControllerHandle>,
	latest_state: Option<VideoState>,
	next_id: HandleId,
}

/// Process-wide owner of the single controller session.
#[derive(Default)]
pub struct SessionManager {
	slot: Mutex<SessionSlot>,
}

impl SessionManager {
	pub fn new() -> Self {
		Self::default()
	}

	/// Allocates a handle for a freshly accepted connection.
	pub fn new_handle(&self) -> (ControllerHandle, mpsc::UnboundedReceiver<ServerFrame>) {
		let id = {
			let mut slot = self.slot.lock();
			slot.next_id += 1;
			slot.next_id
		};
		ControllerHandle::new(id)
	}

	/// Adopts `handle` as the session. The newest connection always wins: a
	/// live predecessor is terminated first. Returns the replaced handle.
	pub fn on_connect(&self, handle: ControllerHandle) -> Option<ControllerHandle> {
		let previous = {
			let mut slot = self.slot.lock();
			slot.latest_state = None;
			slot.current.replace(handle.clone())
		};

		if let Some(old) = &previous {
			if old.is_connected() {
				warn!(target = "ytc", old = old.id(), new = handle.id(), "replacing existing controller connection");
			}
			old.supersede();
		}

		info!(target = "ytc", handle = handle.id(), "controller connected");
		if let Err(err) = handle.emit(ServerFrame::Role(RoleAssignment::controller())) {
			warn!(target = "ytc", handle = handle.id(), error = %err, "failed to send role assignment");
		}

		previous
	}

	/// Clears the session if `id` is the current one. Stale ids are ignored.
	pub fn on_disconnect(&self, id: HandleId) -> bool {
		let mut slot = self.slot.lock();
		match &slot.current {
			Some(current) if current.id() == id => {
				slot.current = None;
				slot.latest_state = None;
				info!(target = "ytc", handle = id, "controller disconnected");
				true
			}
			_ => {
				debug!(target = "ytc", handle = id, "ignoring disconnect of superseded controller");
				false
			}
		}
	}

	/// Stores a state snapshot pushed by the current session.
	pub fn on_state_push(&self, id: HandleId, state: VideoState) -> bool {
		let mut slot = self.slot.lock();
		match &slot.current {
			Some(current) if current.id() == id => {
				debug!(target = "ytc", title = %state.title, playing = state.is_playing, "video state updated");
				slot.latest_state = Some(state);
				true
			}
			_ => false,
		}
	}

	/// The live session, if any. A handle that lost its connection is
	/// released here rather than returned.
	pub fn current(&self) -> Option<ControllerHandle> {
		let mut slot = self.slot.lock();
		let live = slot.current.as_ref().is_some_and(ControllerHandle::is_connected);
		if !live && slot.current.is_some() {
			slot.current = None;
			slot.latest_state = None;
		}
		slot.current.clone()
	}

	pub fn is_connected(&self) -> bool {
		self.current().is_some()
	}

	pub fn is_current(&self, handle: &ControllerHandle) -> bool {
		self.slot
			.lock()
			.current
			.as_ref()
			.is_some_and(|current| current.same_connection(handle))
	}

	pub fn video_state(&self) -> Option<VideoState> {
		self.slot.lock().latest_state.clone()
	}
}

#[cfg(test)]
mod tests {
	use ytc_protocol::Role;

	use super::*;

	fn connect(manager: &SessionManager) -> (ControllerHandle, mpsc::UnboundedReceiver<ServerFrame>) {
		let (handle, rx) = manager.new_handle();
		manager.on_connect(handle.clone());
		(handle, rx)
	}

	fn sample_state(title: &str) -> VideoState {
		VideoState {
			title: title.to_string(),
			is_playing: true,
			..Default::default()
		}
	}

	#[test]
	fn newest_connection_wins_and_terminates_predecessors() {
		let manager = SessionManager::new();
		let mut handles: Vec<ControllerHandle> = Vec::new();
		let mut receivers = Vec::new();
		for _ in 0..4 {
			let (handle, rx) = connect(&manager);
			receivers.push(rx);

			let current = manager.current().expect("session after connect");
			assert_eq!(current.id(), handle.id());
			assert!(handle.is_connected());
			for earlier in &handles {
				assert!(!earlier.is_connected());
				assert!(!manager.is_current(earlier));
			}
			handles.push(handle);
		}
	}

	#[test]
	fn replaced_handle_is_marked_superseded() {
		let manager = SessionManager::new();
		let (first, _rx1) = connect(&manager);
		assert!(!first.is_superseded());

		let (second, _rx2) = connect(&manager);
		assert!(first.is_superseded());
		assert!(!second.is_superseded());

		second.disconnect();
		assert!(!second.is_superseded());
	}

	#[test]
	fn role_assignment_is_pushed_on_connect() {
		let manager = SessionManager::new();
		let (_handle, mut rx) = connect(&manager);
		match rx.try_recv().expect("role frame") {
			ServerFrame::Role(assignment) => assert_eq!(assignment.role, Role::Controller),
			other => panic!("unexpected frame: {other:?}"),
		}
	}

	#[test]
	fn stale_disconnect_keeps_current_session() {
		let manager = SessionManager::new();
		let (first, _rx1) = connect(&manager);
		let (second, _rx2) = connect(&manager);

		assert!(!manager.on_disconnect(first.id()));
		assert_eq!(manager.current().map(|h| h.id()), Some(second.id()));

		assert!(manager.on_disconnect(second.id()));
		assert!(manager.current().is_none());
		assert!(!manager.is_connected());
	}

	#[test]
	fn state_push_is_stored_until_session_ends() {
		let manager = SessionManager::new();
		let (handle, _rx) = connect(&manager);

		assert!(manager.on_state_push(handle.id(), sample_state("first")));
		assert!(manager.on_state_push(handle.id(), sample_state("second")));
		assert_eq!(manager.video_state().map(|s| s.title), Some("second".into()));

		manager.on_disconnect(handle.id());
		assert!(manager.video_state().is_none());
	}

	#[test]
	fn state_push_from_superseded_handle_is_ignored() {
		let manager = SessionManager::new();
		let (old, _rx1) = connect(&manager);
		let (_new, _rx2) = connect(&manager);

		assert!(!manager.on_state_push(old.id(), sample_state("stale")));
		assert!(manager.video_state().is_none());
	}

	#[test]
	fn dead_handle_is_never_reported_as_current() {
		let manager = SessionManager::new();
		let (handle, rx) = connect(&manager);
		assert!(manager.is_connected());

		drop(rx);
		assert!(!handle.is_connected());
		assert!(manager.current().is_none());
	}

	#[tokio::test]
	async fn disconnect_resolves_pending_acks() {
		let (handle, _rx) = ControllerHandle::new(1);
		let mut pending = handle.emit_with_ack(Command::play()).unwrap();
		assert_eq!(handle.pending_acks(), 1);

		handle.disconnect();
		assert!(matches!(pending.wait().await, Err(RelayError::Disconnected)));
		assert_eq!(handle.pending_acks(), 0);
		assert!(handle.emit_with_ack(Command::pause()).is_err());
	}

	#[tokio::test]
	async fn ack_ids_are_allocated_per_connection() {
		let (handle, mut rx) = ControllerHandle::new(1);
		let first = handle.emit_with_ack(Command::play()).unwrap();
		let second = handle.emit_with_ack(Command::pause()).unwrap();
		assert_ne!(first.ack(), second.ack());

		let acks: Vec<u64> = std::iter::from_fn(|| rx.try_recv().ok())
			.filter_map(|frame| match frame {
				ServerFrame::Command { ack, .. } => Some(ack),
				_ => None,
			})
			.collect();
		assert_eq!(acks, vec![first.ack(), second.ack()]);

		drop(first);
		assert_eq!(handle.pending_acks(), 1);
		assert!(!handle.resolve_ack(acks[0], Response::ok(serde_json::Value::Null)));
	}
}
