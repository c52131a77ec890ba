//! 房间聊天协议适配器
//!
//! 把用户意图（加入、发送、离开）翻译为中继事件，把入站中继事件翻译为消息日志的变更。
//! 所有状态只在单一事件分发上下文中修改：一次调用执行完毕后才处理下一次。

use std::sync::Arc;

use domain::{
    ChatMessage, DomainError, DomainResult, InboundEvent, MessageLog, OutboundEvent,
    RelayEventName, RoomSession,
};
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::connection::{InboundReceiver, RelayConnection};

/// 聊天客户端
///
/// 持有唯一的中继连接和当前会话。展示层通过只读访问器渲染状态，
/// 通过 `join` / `send` / `leave` 提交用户意图。
pub struct ChatClient<C: RelayConnection> {
    connection: C,
    session: RoomSession,
    inbound: Option<InboundReceiver>,
    clock: Arc<dyn Clock>,
}

impl<C: RelayConnection> ChatClient<C> {
    pub fn new(connection: C, clock: Arc<dyn Clock>) -> Self {
        Self {
            connection,
            session: RoomSession::new(),
            inbound: None,
            clock,
        }
    }

    /// 使用系统时钟创建
    pub fn with_system_clock(connection: C) -> Self {
        Self::new(connection, Arc::new(SystemClock))
    }

    pub fn session(&self) -> &RoomSession {
        &self.session
    }

    pub fn messages(&self) -> &MessageLog {
        self.session.messages()
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// 取回底层连接，用于退出前等待传输收尾
    pub fn into_connection(self) -> C {
        self.connection
    }

    /// 是否已注册入站消息监听
    pub fn is_listening(&self) -> bool {
        self.inbound.is_some()
    }

    /// 编辑房间ID（表单输入），仅未加入阶段可用
    pub fn set_room_id(&mut self, room_id: impl Into<String>) -> DomainResult<()> {
        self.session.set_room_id(room_id)
    }

    /// 编辑用户名（表单输入），仅未加入阶段可用
    pub fn set_username(&mut self, username: impl Into<String>) -> DomainResult<()> {
        self.session.set_username(username)
    }

    /// 加入房间
    ///
    /// 校验失败时不修改会话，也不产生任何网络事件。
    pub fn join(&mut self, room_id: &str, username: &str) -> DomainResult<()> {
        self.session.join(room_id, username)?;

        self.connection.connect();
        if self.inbound.is_none() {
            self.inbound = Some(self.connection.on(RelayEventName::ReceiveMessage));
        }
        self.connection.emit(OutboundEvent::join_room(room_id));

        info!(room = %room_id, username = %username, "已加入房间");
        Ok(())
    }

    /// 使用已编辑的表单字段加入房间
    pub fn join_current(&mut self) -> DomainResult<()> {
        let room_id = self.session.room_id().to_string();
        let username = self.session.username().to_string();
        self.join(&room_id, &username)
    }

    /// 发送消息并立即追加到本地日志
    pub fn send(&mut self, text: &str) -> DomainResult<ChatMessage> {
        if !self.session.is_joined() {
            return Err(DomainError::invalid_phase("send", self.session.phase()));
        }

        let message = ChatMessage::new(
            self.session.room_id(),
            text,
            self.session.username(),
            self.clock.now(),
        )?;

        self.connection
            .emit(OutboundEvent::SendMessage(message.clone()));
        self.session.append(message.clone());

        debug!(room = %message.room(), "消息已发送");
        Ok(message)
    }

    /// 离开房间并释放连接
    pub fn leave(&mut self) -> DomainResult<()> {
        let room_id = self.session.room_id().to_string();
        let username = self.session.username().to_string();
        self.session.leave()?;

        self.connection.emit(OutboundEvent::leave_room(room_id.as_str()));
        self.connection.off(RelayEventName::ReceiveMessage);
        self.inbound = None;
        self.connection.disconnect();

        info!(room = %room_id, username = %username, "已离开房间");
        Ok(())
    }

    /// 应用一个入站事件，返回日志是否增长
    ///
    /// 只在已加入房间时生效。去重依据的是应用时刻的会话用户名。
    pub fn apply_inbound(&mut self, event: InboundEvent) -> bool {
        match event {
            InboundEvent::ReceiveMessage(payload) => {
                if !self.session.is_joined() {
                    debug!("未加入房间，丢弃入站消息");
                    return false;
                }
                if !payload.has_text() {
                    debug!("忽略空消息");
                    return false;
                }
                if payload.author() == self.session.username() {
                    debug!(username = %payload.author(), "忽略自己消息的回显");
                    return false;
                }

                let received_at = self.clock.now();
                match payload.into_chat_message(self.session.room_id(), received_at) {
                    Some(message) => {
                        debug!(room = %message.room(), username = %message.username(), "收到消息");
                        self.session.append(message);
                        true
                    }
                    None => false,
                }
            }
        }
    }

    /// 处理所有已排队的入站事件，不等待，返回追加的条数
    pub fn process_pending(&mut self) -> usize {
        let mut appended = 0;
        while let Some(event) = self.try_next_inbound() {
            if self.apply_inbound(event) {
                appended += 1;
            }
        }
        appended
    }

    /// 等待下一个入站事件
    ///
    /// 未注册监听或通道已关闭时返回 `None`。
    pub async fn next_inbound(&mut self) -> Option<InboundEvent> {
        self.inbound.as_mut()?.recv().await
    }

    fn try_next_inbound(&mut self) -> Option<InboundEvent> {
        self.inbound.as_mut()?.try_recv().ok()
    }
}
