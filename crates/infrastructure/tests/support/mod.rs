// 进程内的测试中继：把 send_message 转发为房间内其他连接的 receive_message
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use domain::{InboundEvent, InboundMessage, OutboundEvent};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::{net::TcpListener, sync::mpsc};

#[derive(Default)]
struct RelayState {
    next_id: usize,
    peers: HashMap<usize, Peer>,
    received: Vec<Value>,
}

struct Peer {
    room: Option<String>,
    tx: mpsc::UnboundedSender<Message>,
}

#[derive(Clone)]
pub struct TestRelay {
    state: Arc<Mutex<RelayState>>,
    echo_to_sender: bool,
}

impl TestRelay {
    /// 启动中继，返回 WebSocket 地址
    pub async fn spawn(echo_to_sender: bool) -> (String, TestRelay) {
        let relay = TestRelay {
            state: Arc::new(Mutex::new(RelayState::default())),
            echo_to_sender,
        };

        let app = Router::new()
            .route("/ws", get(ws_handler))
            .with_state(relay.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (format!("ws://{addr}/ws"), relay)
    }

    /// 房间内的连接数
    pub fn members(&self, room: &str) -> usize {
        let state = self.state.lock().unwrap();
        state
            .peers
            .values()
            .filter(|peer| peer.room.as_deref() == Some(room))
            .count()
    }

    /// 中继收到的所有帧
    pub fn received(&self) -> Vec<Value> {
        self.state.lock().unwrap().received.clone()
    }

    pub fn received_events(&self) -> Vec<String> {
        self.received()
            .iter()
            .filter_map(|frame| frame["event"].as_str().map(str::to_string))
            .collect()
    }

    /// 直接向房间内所有连接推送原始文本帧
    pub fn push_raw(&self, room: &str, text: &str) {
        let state = self.state.lock().unwrap();
        for peer in state.peers.values() {
            if peer.room.as_deref() == Some(room) {
                let _ = peer.tx.send(Message::Text(text.into()));
            }
        }
    }

    /// 从服务端关闭所有连接
    pub fn kick_all(&self) {
        let state = self.state.lock().unwrap();
        for peer in state.peers.values() {
            let _ = peer.tx.send(Message::Close(None));
        }
    }

    /// 累计接受过的连接数
    pub fn accepted(&self) -> usize {
        self.state.lock().unwrap().next_id
    }

    /// 收到的某类事件的帧数
    pub fn count_events(&self, event: &str) -> usize {
        self.received_events().iter().filter(|e| *e == event).count()
    }

    /// 轮询等待条件成立
    pub async fn wait_until(&self, what: &str, cond: impl Fn(&TestRelay) -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        while !cond(self) {
            if tokio::time::Instant::now() > deadline {
                panic!("timed out waiting for {what}");
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn serve(self, socket: WebSocket) {
        let (mut sink, mut stream) = socket.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        let id = {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let id = state.next_id;
            state.peers.insert(id, Peer { room: None, tx });
            id
        };

        let writer = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if sink.send(message).await.is_err() || closing {
                    break;
                }
            }
        });

        while let Some(Ok(message)) = stream.next().await {
            if let Message::Text(text) = message {
                self.handle(id, text.as_str());
            }
        }

        self.state.lock().unwrap().peers.remove(&id);
        writer.abort();
    }

    fn handle(&self, id: usize, text: &str) {
        let Ok(frame) = serde_json::from_str::<Value>(text) else {
            return;
        };
        let mut state = self.state.lock().unwrap();

        match OutboundEvent::from_json(text) {
            Ok(OutboundEvent::JoinRoom(payload)) => {
                if let Some(peer) = state.peers.get_mut(&id) {
                    peer.room = Some(payload.room);
                }
            }
            Ok(OutboundEvent::LeaveRoom(_)) => {
                if let Some(peer) = state.peers.get_mut(&id) {
                    peer.room = None;
                }
            }
            Ok(OutboundEvent::SendMessage(message)) => {
                let out = InboundEvent::ReceiveMessage(InboundMessage::from(&message))
                    .to_json()
                    .unwrap();
                for (peer_id, peer) in &state.peers {
                    let same_room = peer.room.as_deref() == Some(message.room());
                    if same_room && (*peer_id != id || self.echo_to_sender) {
                        let _ = peer.tx.send(Message::Text(out.clone().into()));
                    }
                }
            }
            Err(_) => {}
        }

        state.received.push(frame);
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(relay): State<TestRelay>) -> Response {
    ws.on_upgrade(move |socket| relay.serve(socket))
}
