//! Satori protocol client for Parley.
//!
//! Satori is a cross-platform chat protocol: a WebSocket at `/v1/events`
//! carries typed events, and HTTP RPCs under `/v1/` perform actions.
//! [`SatoriClient`] implements both `EventSource` and `MessageSender`.

pub mod client;
pub mod protocol;

pub use client::SatoriClient;
pub use protocol::Signal;
