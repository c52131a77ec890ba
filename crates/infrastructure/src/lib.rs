//! 基础设施层实现。
//!
//! 提供基于 WebSocket 的中继连接以及断线重连策略，实现应用层定义的 `RelayConnection`。

pub mod retry;
pub mod websocket;

pub use retry::{Backoff, ReconnectPolicy};
pub use websocket::WebSocketRelayConnection;
