//! Meeting session transport
//!
//! One WebSocket at a time to the session endpoint: binary PCM upstream,
//! JSON events downstream, with ping/pong liveness detection and a
//! disconnect-then-connect reconnect contract.

mod client;

pub use client::{session_url, WsClient, WsConfig, WsEvent};
