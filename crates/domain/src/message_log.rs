//! 会话内的有序消息日志
//!
//! 仅追加；插入顺序即显示顺序，不按时间戳重新排序。没有容量上限。

use crate::message::ChatMessage;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageLog {
    entries: Vec<ChatMessage>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加到末尾，不会修改已有条目
    pub fn append(&mut self, message: ChatMessage) {
        self.entries.push(message);
    }

    /// 清空日志
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChatMessage> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[ChatMessage] {
        &self.entries
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a MessageLog {
    type Item = &'a ChatMessage;
    type IntoIter = std::slice::Iter<'a, ChatMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
