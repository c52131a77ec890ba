//! 中继事件及其线路格式
//!
//! 每个事件编码为一个 JSON 文本帧：`{"event": "<name>", "data": {...}}`。

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::message::ChatMessage;

/// 中继事件名称
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayEventName {
    JoinRoom,
    LeaveRoom,
    SendMessage,
    ReceiveMessage,
}

impl RelayEventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayEventName::JoinRoom => "join_room",
            RelayEventName::LeaveRoom => "leave_room",
            RelayEventName::SendMessage => "send_message",
            RelayEventName::ReceiveMessage => "receive_message",
        }
    }
}

impl fmt::Display for RelayEventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 仅携带房间ID的载荷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomPayload {
    pub room: String,
}

impl RoomPayload {
    pub fn new(room: impl Into<String>) -> Self {
        Self { room: room.into() }
    }
}

/// 入站消息载荷
///
/// 中继转发的内容不受本端控制，所有字段都可能缺失。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InboundMessage {
    pub room: Option<String>,
    pub message: Option<String>,
    pub username: Option<String>,
    #[serde(deserialize_with = "lenient_time")]
    pub time: Option<DateTime<Utc>>,
}

/// 线路上出现过的时间写法
#[derive(Deserialize)]
#[serde(untagged)]
enum WireTime {
    Millis(i64),
    Text(String),
    Other(serde::de::IgnoredAny),
}

/// 接受 RFC 3339 字符串或毫秒时间戳，其他写法视为缺失
fn lenient_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let time = match Option::<WireTime>::deserialize(deserializer)? {
        Some(WireTime::Millis(millis)) => Utc.timestamp_millis_opt(millis).single(),
        Some(WireTime::Text(text)) => DateTime::parse_from_rfc3339(&text)
            .ok()
            .map(|time| time.with_timezone(&Utc)),
        Some(WireTime::Other(_)) | None => None,
    };
    Ok(time)
}

impl InboundMessage {
    /// 发送者用户名，缺失时视为空字符串
    pub fn author(&self) -> &str {
        self.username.as_deref().unwrap_or_default()
    }

    /// 是否携带非空消息文本
    pub fn has_text(&self) -> bool {
        self.message.as_deref().is_some_and(|text| !text.is_empty())
    }

    /// 转换为 [`ChatMessage`]
    ///
    /// 缺失的房间使用 `current_room`，缺失的时间使用 `received_at`。
    /// 没有消息文本时返回 `None`。
    pub fn into_chat_message(
        self,
        current_room: &str,
        received_at: DateTime<Utc>,
    ) -> Option<ChatMessage> {
        let room = self.room.unwrap_or_else(|| current_room.to_string());
        let username = self.username.unwrap_or_default();
        let time = self.time.unwrap_or(received_at);
        ChatMessage::new(room, self.message?, username, time).ok()
    }
}

impl From<&ChatMessage> for InboundMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            room: Some(message.room().to_string()),
            message: Some(message.message().to_string()),
            username: Some(message.username().to_string()),
            time: Some(message.time()),
        }
    }
}

/// 客户端发往中继的事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// 加入房间广播组
    JoinRoom(RoomPayload),
    /// 离开房间广播组
    LeaveRoom(RoomPayload),
    /// 向房间其他成员广播消息
    SendMessage(ChatMessage),
}

impl OutboundEvent {
    pub fn join_room(room: impl Into<String>) -> Self {
        Self::JoinRoom(RoomPayload::new(room))
    }

    pub fn leave_room(room: impl Into<String>) -> Self {
        Self::LeaveRoom(RoomPayload::new(room))
    }

    pub fn name(&self) -> RelayEventName {
        match self {
            OutboundEvent::JoinRoom(_) => RelayEventName::JoinRoom,
            OutboundEvent::LeaveRoom(_) => RelayEventName::LeaveRoom,
            OutboundEvent::SendMessage(_) => RelayEventName::SendMessage,
        }
    }

    /// 事件所属房间
    pub fn room(&self) -> &str {
        match self {
            OutboundEvent::JoinRoom(payload) | OutboundEvent::LeaveRoom(payload) => &payload.room,
            OutboundEvent::SendMessage(message) => message.room(),
        }
    }

    /// 序列化为JSON字符串
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// 从JSON字符串反序列化
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// 中继发往客户端的事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InboundEvent {
    /// 其他成员发送的消息
    ReceiveMessage(InboundMessage),
}

impl InboundEvent {
    pub fn name(&self) -> RelayEventName {
        match self {
            InboundEvent::ReceiveMessage(_) => RelayEventName::ReceiveMessage,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
