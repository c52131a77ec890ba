//! 应用层实现。
//!
//! 这里提供聊天客户端用例：协议适配器、中继连接抽象，以及时钟等外部依赖的抽象。

pub mod chat_client;
pub mod clock;
pub mod connection;
pub mod memory_connection;

#[cfg(test)]
mod chat_client_tests;

pub use chat_client::ChatClient;
pub use clock::{Clock, SystemClock};
pub use connection::{InboundReceiver, InboundSender, RelayConnection, TransportError};
pub use memory_connection::MemoryRelayConnection;
