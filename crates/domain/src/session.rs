//! 房间会话状态机
//!
//! 一个客户端同一时刻只持有一个会话。身份（用户名）与房间绑定在一起：
//! 未加入阶段修改任意一个都会清空消息日志；加入后两者不可修改，直到 `leave`。
//!
//! ```text
//! Unjoined --join--> Joined --leave--> Unjoined
//! ```

use std::fmt;

use crate::errors::{DomainError, DomainResult};
use crate::message::ChatMessage;
use crate::message_log::MessageLog;

/// 没有房间时展示的标签
pub const NO_ROOM_LABEL: &str = "No Room";

/// 会话阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Unjoined,
    Joined,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Unjoined => f.write_str("unjoined"),
            SessionPhase::Joined => f.write_str("joined"),
        }
    }
}

/// 客户端的房间会话
#[derive(Debug, Clone, Default)]
pub struct RoomSession {
    room_id: String,
    username: String,
    phase: SessionPhase,
    log: MessageLog,
}

impl RoomSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_joined(&self) -> bool {
        self.phase == SessionPhase::Joined
    }

    /// 当前会话的消息日志
    pub fn messages(&self) -> &MessageLog {
        &self.log
    }

    /// 房间标签，未填写房间时为 [`NO_ROOM_LABEL`]
    pub fn room_label(&self) -> &str {
        if self.room_id.is_empty() {
            NO_ROOM_LABEL
        } else {
            &self.room_id
        }
    }

    /// 修改房间ID（仅未加入阶段）
    pub fn set_room_id(&mut self, room_id: impl Into<String>) -> DomainResult<()> {
        self.ensure_phase("set_room_id", SessionPhase::Unjoined)?;
        let room_id = room_id.into();
        self.rebind(room_id, self.username.clone());
        Ok(())
    }

    /// 修改用户名（仅未加入阶段）
    pub fn set_username(&mut self, username: impl Into<String>) -> DomainResult<()> {
        self.ensure_phase("set_username", SessionPhase::Unjoined)?;
        let username = username.into();
        self.rebind(self.room_id.clone(), username);
        Ok(())
    }

    /// 校验并进入 `Joined`
    ///
    /// 任一字段为空时返回校验错误，会话保持原样。
    pub fn join(&mut self, room_id: &str, username: &str) -> DomainResult<()> {
        self.ensure_phase("join", SessionPhase::Unjoined)?;
        if room_id.is_empty() {
            return Err(DomainError::validation_error("room_id", "房间ID不能为空"));
        }
        if username.is_empty() {
            return Err(DomainError::validation_error("username", "用户名不能为空"));
        }

        self.rebind(room_id.to_string(), username.to_string());
        self.phase = SessionPhase::Joined;
        Ok(())
    }

    /// 离开房间，清空身份并回到 `Unjoined`，返回离开的房间ID
    pub fn leave(&mut self) -> DomainResult<String> {
        self.ensure_phase("leave", SessionPhase::Joined)?;
        let room_id = std::mem::take(&mut self.room_id);
        self.username.clear();
        self.log.reset();
        self.phase = SessionPhase::Unjoined;
        Ok(room_id)
    }

    /// 追加一条消息到日志末尾
    pub fn append(&mut self, message: ChatMessage) {
        self.log.append(message);
    }

    /// (room_id, username) 变化时重置日志
    fn rebind(&mut self, room_id: String, username: String) {
        if room_id != self.room_id || username != self.username {
            self.log.reset();
            self.phase = SessionPhase::Unjoined;
        }
        self.room_id = room_id;
        self.username = username;
    }

    fn ensure_phase(&self, operation: &'static str, expected: SessionPhase) -> DomainResult<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(DomainError::invalid_phase(operation, self.phase))
        }
    }
}
