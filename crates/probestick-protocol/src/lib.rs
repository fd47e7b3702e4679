//! ProbeStick companion protocol
//!
//! This crate provides types and utilities for talking to ProbeStick scanner
//! firmware over its JSON protocol. The transport delivers opaque byte
//! fragments with a small payload budget and no framing of its own, so the
//! protocol layer is responsible for both directions:
//!
//! - **Commands** (host → device): compact JSON objects tagged with a `cmd`
//!   field, rejected before sending if they exceed the transport budget.
//! - **Responses** (device → host): JSON objects tagged with a `type` field,
//!   reassembled from the fragment stream by [`FrameCodec`] and decoded into
//!   the [`Response`] enum.
//! - **Chunked transfers**: large Wi-Fi scan results arrive as numbered,
//!   CRC-protected parts correlated by request id and are reassembled by
//!   [`ChunkAssembler`].
//!
//! # Example
//!
//! ```rust,ignore
//! use probestick_protocol::{Command, FrameCodec, Response};
//!
//! // Build a command
//! let cmd = Command::Status;
//! let payload = cmd.encode()?;
//!
//! // Reassemble and parse responses
//! let mut codec = FrameCodec::new();
//! codec.push(received_fragment);
//! while let Some(json) = codec.decode() {
//!     let response = Response::decode(&json)?;
//! }
//! ```

mod chunk;
mod commands;
mod constants;
mod error;
mod frame;
mod responses;
mod types;

pub use chunk::*;
pub use commands::*;
pub use constants::*;
pub use error::*;
pub use frame::*;
pub use responses::*;
pub use types::*;
