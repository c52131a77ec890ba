//! 中继连接抽象
//!
//! 每个客户端持有一个连接实例，跨多次加入/离开复用，直到显式释放。
//! 所有方法都不阻塞调用方，底层 I/O 由具体实现自行调度。

use domain::{InboundEvent, OutboundEvent, RelayEventName};
use thiserror::Error;
use tokio::sync::mpsc;

/// 入站事件接收端
pub type InboundReceiver = mpsc::UnboundedReceiver<InboundEvent>;
/// 入站事件发送端（由传输层持有）
pub type InboundSender = mpsc::UnboundedSender<InboundEvent>;

/// 传输层错误
///
/// 仅在传输实现内部和日志中出现，不会返回给 [`crate::ChatClient`] 的调用方。
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("codec error: {0}")]
    Codec(String),
    #[error("connection closed")]
    Closed,
}

impl TransportError {
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect(message.into())
    }

    pub fn send(message: impl Into<String>) -> Self {
        Self::Send(message.into())
    }
}

/// 与中继服务之间的持久双向连接
#[cfg_attr(test, mockall::automock)]
pub trait RelayConnection: Send {
    /// 建立连接；已连接时不做任何事
    fn connect(&mut self);

    /// 发送事件，尽力而为，不等待确认；未连接时静默丢弃
    fn emit(&self, event: OutboundEvent);

    /// 为事件注册唯一的监听通道，重复注册会覆盖之前的通道
    fn on(&mut self, event: RelayEventName) -> InboundReceiver;

    /// 注销事件监听
    fn off(&mut self, event: RelayEventName);

    /// 断开连接，之后的 `emit` 为空操作，直到再次 `connect`
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;
}
