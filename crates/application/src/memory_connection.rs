// 进程内回环连接，记录发出的事件并允许注入入站事件
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use domain::{InboundEvent, OutboundEvent, RelayEventName};
use tokio::sync::mpsc;

use crate::connection::{InboundReceiver, InboundSender, RelayConnection};

#[derive(Default)]
struct MemoryState {
    connected: bool,
    connect_count: usize,
    emitted: Vec<OutboundEvent>,
    listeners: HashMap<RelayEventName, InboundSender>,
}

/// 克隆出的句柄共享同一份状态
#[derive(Clone, Default)]
pub struct MemoryRelayConnection {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRelayConnection {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 已发出的事件（按顺序）
    pub fn emitted(&self) -> Vec<OutboundEvent> {
        self.state().emitted.clone()
    }

    /// 清空已记录的事件
    pub fn take_emitted(&self) -> Vec<OutboundEvent> {
        std::mem::take(&mut self.state().emitted)
    }

    /// `connect` 实际建立连接的次数
    pub fn connect_count(&self) -> usize {
        self.state().connect_count
    }

    pub fn has_listener(&self, event: RelayEventName) -> bool {
        self.state().listeners.contains_key(&event)
    }

    /// 模拟中继投递一个入站事件，没有监听者或未连接时返回 `false`
    pub fn deliver(&self, event: InboundEvent) -> bool {
        let mut state = self.state();
        if !state.connected {
            return false;
        }
        let name = event.name();
        let Some(sender) = state.listeners.get(&name) else {
            return false;
        };
        if sender.send(event).is_ok() {
            return true;
        }
        state.listeners.remove(&name);
        false
    }
}

impl RelayConnection for MemoryRelayConnection {
    fn connect(&mut self) {
        let mut state = self.state();
        if !state.connected {
            state.connected = true;
            state.connect_count += 1;
        }
    }

    fn emit(&self, event: OutboundEvent) {
        let mut state = self.state();
        if state.connected {
            state.emitted.push(event);
        } else {
            tracing::debug!(event = %event.name(), "emit while disconnected, dropped");
        }
    }

    fn on(&mut self, event: RelayEventName) -> InboundReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state().listeners.insert(event, tx);
        rx
    }

    fn off(&mut self, event: RelayEventName) {
        self.state().listeners.remove(&event);
    }

    fn disconnect(&mut self) {
        self.state().connected = false;
    }

    fn is_connected(&self) -> bool {
        self.state().connected
    }
}
