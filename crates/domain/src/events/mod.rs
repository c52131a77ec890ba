//! 中继协议事件
//!
//! 客户端与中继服务之间交换的结构化事件，以及它们在线路上的 JSON 编码。

pub mod relay_event;

pub use relay_event::*;
