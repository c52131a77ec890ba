//! 时钟抽象
//!
//! 消息时间戳和入站缺省时间都从这里取，测试中可以替换为固定时钟。

use chrono::{DateTime, Utc};

/// 当前时间的来源
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
