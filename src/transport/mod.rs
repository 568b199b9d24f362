//! Gateway transports.
//!
//! - `websocket` - the file gateway over WebSocket, admission before upgrade
//!
//! Sessions are tracked in a `RwLock`-guarded store; each connection's
//! authorization context is immutable, so nothing else is shared between
//! connections except the token validator's key cache.

pub mod websocket;

pub use websocket::WebSocketTransport;
