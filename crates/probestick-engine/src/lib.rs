//! ProbeStick session engine
//!
//! This crate drives one protocol session with a ProbeStick scanner: it
//! reassembles the inbound fragment stream, routes decoded messages, tracks
//! the single active operation through its timeout tiers, and surfaces
//! everything to the application as a queue of typed [`EngineEvent`]s.
//!
//! The engine is sans-IO. The host owns the transport's threading and the
//! timer wheel, and marshals everything onto one logical thread of control:
//!
//! - inbound bytes go to [`Engine::handle_rx`]
//! - the host sleeps until [`Engine::poll_timeout`] and then calls
//!   [`Engine::handle_timeout`]
//! - commands are issued through the `start_*` calls, which enforce the
//!   one-active-operation rule
//! - events are drained with [`Engine::poll_event`]
//!
//! No call blocks; all waiting is expressed as a pending deadline.
//!
//! # Example
//!
//! ```rust,ignore
//! use probestick_engine::{Engine, EngineEvent};
//! use std::time::Instant;
//!
//! let mut engine = Engine::new(link);
//! let request_id = engine.start_wifi_scan(None, Instant::now())?;
//!
//! // On every transport delivery:
//! engine.handle_rx(&fragment, Instant::now());
//! while let Some(event) = engine.poll_event() {
//!     match event {
//!         EngineEvent::WifiScanFinished { networks, .. } => { /* ... */ }
//!         _ => {}
//!     }
//! }
//! ```

mod engine;
mod error;
mod events;
mod operation;
mod transport;

pub use engine::*;
pub use error::*;
pub use events::*;
pub use operation::*;
pub use transport::*;
