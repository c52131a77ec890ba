//! 房间聊天客户端核心领域模型
//!
//! 包含消息、房间会话状态机、消息日志以及中继协议事件。

pub mod display;
pub mod errors;
pub mod events;
pub mod message;
pub mod message_log;
pub mod session;

// 重新导出常用类型
pub use display::*;
pub use errors::*;
pub use events::*;
pub use message::*;
pub use message_log::*;
pub use session::*;
