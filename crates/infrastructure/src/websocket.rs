//! WebSocket 中继连接
//!
//! 连接的 I/O 在后台任务中运行，`RelayConnection` 的方法只与通道交互，不阻塞调用方。
//! 发送端按顺序排队；连接建立前排队的事件会在连接建立后发出。
//! 断线重连后会先补发最近一次 join_room，再继续发送排队的事件。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use application::{InboundReceiver, InboundSender, RelayConnection, TransportError};
use config::RelayConfig;
use domain::{InboundEvent, OutboundEvent, RelayEventName};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::retry::ReconnectPolicy;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Listeners = Arc<Mutex<HashMap<RelayEventName, InboundSender>>>;

/// 基于 tokio-tungstenite 的中继连接
pub struct WebSocketRelayConnection {
    endpoint: String,
    policy: ReconnectPolicy,
    listeners: Listeners,
    link: Option<Link>,
    closing: Option<JoinHandle<()>>,
}

/// 一次 `connect` 到 `disconnect` 之间的后台任务句柄
struct Link {
    outbound: mpsc::UnboundedSender<OutboundEvent>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

enum LinkEnd {
    Shutdown,
    Lost(TransportError),
}

impl WebSocketRelayConnection {
    pub fn new(endpoint: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self {
            endpoint: endpoint.into(),
            policy,
            listeners: Arc::new(Mutex::new(HashMap::new())),
            link: None,
            closing: None,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.websocket_url(), ReconnectPolicy::from(&config.reconnect))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 等待最近一次断开的后台任务发完排队事件并退出
    ///
    /// 超过 `limit` 返回 `false`；没有正在关闭的任务时立即返回 `true`。
    pub async fn wait_closed(&mut self, limit: Duration) -> bool {
        let Some(task) = self.closing.take() else {
            return true;
        };
        tokio::time::timeout(limit, task).await.is_ok()
    }
}

impl RelayConnection for WebSocketRelayConnection {
    fn connect(&mut self) {
        if self.is_connected() {
            return;
        }

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_transport(
            self.endpoint.clone(),
            outbound_rx,
            self.listeners.clone(),
            self.policy.clone(),
            shutdown.clone(),
        ));

        debug!(endpoint = %self.endpoint, "启动中继连接任务");
        self.link = Some(Link {
            outbound,
            shutdown,
            task,
        });
    }

    fn emit(&self, event: OutboundEvent) {
        let name = event.name();
        match &self.link {
            Some(link) => {
                if link.outbound.send(event).is_err() {
                    debug!(event = %name, "connection task gone, event dropped");
                }
            }
            None => debug!(event = %name, "emit while disconnected, dropped"),
        }
    }

    fn on(&mut self, event: RelayEventName) -> InboundReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.listeners).insert(event, tx);
        rx
    }

    fn off(&mut self, event: RelayEventName) {
        lock(&self.listeners).remove(&event);
    }

    fn disconnect(&mut self) {
        if let Some(link) = self.link.take() {
            link.shutdown.cancel();
            self.closing = Some(link.task);
            debug!(endpoint = %self.endpoint, "释放中继连接");
        }
    }

    fn is_connected(&self) -> bool {
        self.link
            .as_ref()
            .is_some_and(|link| !link.outbound.is_closed())
    }
}

impl Drop for WebSocketRelayConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn lock(listeners: &Listeners) -> MutexGuard<'_, HashMap<RelayEventName, InboundSender>> {
    listeners
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn run_transport(
    endpoint: String,
    mut outbound: mpsc::UnboundedReceiver<OutboundEvent>,
    listeners: Listeners,
    policy: ReconnectPolicy,
    shutdown: CancellationToken,
) {
    let mut attempt = 0u32;
    let mut membership: Option<OutboundEvent> = None;
    loop {
        let connected = tokio::select! {
            _ = shutdown.cancelled() => return,
            result = connect_async(endpoint.as_str()) => result,
        };

        match connected {
            Ok((ws, _response)) => {
                attempt = 0;
                info!(endpoint = %endpoint, "已连接到中继服务");
                match pump(ws, &mut outbound, &mut membership, &listeners, &shutdown).await {
                    LinkEnd::Shutdown => {
                        info!(endpoint = %endpoint, "中继连接已关闭");
                        return;
                    }
                    LinkEnd::Lost(err) => {
                        warn!(endpoint = %endpoint, error = %err, "中继连接中断");
                    }
                }
            }
            Err(err) => {
                let err = TransportError::connect(err.to_string());
                warn!(endpoint = %endpoint, error = %err, attempt, "连接中继服务失败");
            }
        }

        attempt += 1;
        let Some(delay) = policy.delay_for(attempt) else {
            warn!(endpoint = %endpoint, attempts = attempt - 1, "放弃重连");
            return;
        };
        debug!(endpoint = %endpoint, attempt, delay_ms = delay.as_millis() as u64, "等待重连");
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// 在一条已建立的连接上收发，直到关闭或中断
async fn pump(
    ws: WsStream,
    outbound: &mut mpsc::UnboundedReceiver<OutboundEvent>,
    membership: &mut Option<OutboundEvent>,
    listeners: &Listeners,
    shutdown: &CancellationToken,
) -> LinkEnd {
    let (mut sink, mut stream) = ws.split();

    // 新连接上中继不认识本端所在的房间
    if let Some(join) = membership.as_ref() {
        match send_event(&mut sink, join).await {
            Ok(()) => info!(room = %join.room(), "重连后重新加入房间"),
            Err(err) => return LinkEnd::Lost(err),
        }
    }

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                // 先发完已排队的事件（例如 leave_room）再关闭
                while let Ok(event) = outbound.try_recv() {
                    if let Err(err) = send_event(&mut sink, &event).await {
                        warn!(error = %err, "关闭前发送失败");
                        break;
                    }
                }
                let _ = sink.send(Message::Close(None)).await;
                return LinkEnd::Shutdown;
            }
            event = outbound.recv() => match event {
                Some(event) => {
                    remember_membership(membership, &event);
                    match send_event(&mut sink, &event).await {
                        Ok(()) => {}
                        Err(TransportError::Codec(err)) => {
                            warn!(event = %event.name(), error = %err, "事件序列化失败");
                        }
                        Err(err) => return LinkEnd::Lost(err),
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    return LinkEnd::Shutdown;
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => dispatch(text.as_str(), listeners),
                Some(Ok(Message::Close(_))) | None => return LinkEnd::Lost(TransportError::Closed),
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(error = %err, "读取中继帧失败");
                    return LinkEnd::Lost(TransportError::Closed);
                }
            },
        }
    }
}

/// 记录本端当前所在的房间，重连时据此补发 join_room
fn remember_membership(membership: &mut Option<OutboundEvent>, event: &OutboundEvent) {
    match event {
        OutboundEvent::JoinRoom(_) => *membership = Some(event.clone()),
        OutboundEvent::LeaveRoom(_) => *membership = None,
        OutboundEvent::SendMessage(_) => {}
    }
}

async fn send_event<S>(sink: &mut S, event: &OutboundEvent) -> Result<(), TransportError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let json = event
        .to_json()
        .map_err(|err| TransportError::Codec(err.to_string()))?;
    sink.send(Message::text(json))
        .await
        .map_err(|err| TransportError::send(err.to_string()))?;
    debug!(event = %event.name(), room = %event.room(), "已发送中继事件");
    Ok(())
}

/// 把入站帧交给对应事件的监听通道
fn dispatch(text: &str, listeners: &Listeners) {
    let event = match InboundEvent::from_json(text) {
        Ok(event) => event,
        Err(err) => {
            debug!(error = %err, "忽略无法解析的中继帧");
            return;
        }
    };

    let name = event.name();
    let mut listeners = lock(listeners);
    let Some(sender) = listeners.get(&name) else {
        debug!(event = %name, "没有监听者，丢弃事件");
        return;
    };
    if sender.send(event).is_err() {
        listeners.remove(&name);
    }
}
