//! Wire types for the ytc relay protocol.
//!
//! This crate contains the serde-serializable types exchanged between the
//! relay process (`ytc`) and the browser extension that acts as the single
//! controller. Both sides depend on it so the shapes can never drift.
//!
//! # Main Types
//!
//! - [`Command`] / [`Response`] - one action routed to the extension and its single reply
//! - [`ServerFrame`] / [`ClientFrame`] - JSON frames on the controller WebSocket
//! - [`SurfaceMessage`] - messages the extension forwards to a page (tab)
//! - [`TabInfo`] - a browser tab as seen by the extension's tab selector

pub mod command;
pub mod frames;
pub mod site;
pub mod surface;

pub use command::*;
pub use frames::*;
pub use surface::*;
