//! 聊天消息
//!
//! 消息创建后不可变。会话内以 `time` 作为显示标识，同一发送者在同一毫秒内
//! 发出的两条消息会得到相同的标识。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};

/// 房间内的一条文本消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    room: String,
    message: String,
    username: String,
    time: DateTime<Utc>,
}

/// 消息相对于本地用户的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrigin {
    /// 本地用户自己发出
    Own,
    /// 房间内其他成员发出
    Peer,
}

impl ChatMessage {
    /// 创建新消息，`message` 不能为空
    pub fn new(
        room: impl Into<String>,
        message: impl Into<String>,
        username: impl Into<String>,
        time: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let message = message.into();
        if message.is_empty() {
            return Err(DomainError::validation_error("message", "消息内容不能为空"));
        }

        Ok(Self {
            room: room.into(),
            message,
            username: username.into(),
            time,
        })
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// 显示标识（毫秒时间戳）
    pub fn display_key(&self) -> i64 {
        self.time.timestamp_millis()
    }

    /// 判断消息是否由 `local_username` 发出
    pub fn origin(&self, local_username: &str) -> MessageOrigin {
        if self.username == local_username {
            MessageOrigin::Own
        } else {
            MessageOrigin::Peer
        }
    }
}
