//! 聊天客户端入口
//!
//! 从标准输入读取命令，通过 WebSocket 中继与房间内其他成员交换消息。

mod command;

use std::time::Duration;

use application::{ChatClient, RelayConnection};
use chrono::Local;
use command::Command;
use config::ClientConfig;
use domain::{format_timestamp, ChatMessage, DomainError, MessageOrigin};
use infrastructure::WebSocketRelayConnection;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// 退出时等待 leave_room 发出的上限
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

const HELP: &str = "\
/room <id>            设置房间ID
/user <name>          设置用户名
/join [<room> <user>] 加入房间
/leave                离开房间（切换账号）
/quit                 退出
其他输入直接作为消息发送";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::load()?;

    // 初始化日志，RUST_LOG 优先于配置
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log.filter.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let connection = WebSocketRelayConnection::from_config(&config.relay);
    tracing::info!(relay = %connection.endpoint(), "聊天客户端启动");

    let mut client = ChatClient::with_system_clock(connection);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Room: {}", client.session().room_label());
    println!("{HELP}");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match Command::parse(&line) {
                    Command::Quit => break,
                    command => handle(&mut client, command),
                }
            }
            Some(event) = client.next_inbound() => {
                if client.apply_inbound(event) {
                    if let Some(message) = client.messages().last() {
                        print_message(message, client.session().username());
                    }
                }
            }
        }
    }

    if client.session().is_joined() {
        client.leave()?;
    }
    let mut connection = client.into_connection();
    if !connection.wait_closed(SHUTDOWN_GRACE).await {
        tracing::warn!(relay = %connection.endpoint(), "中继连接未能在限定时间内关闭");
    }

    Ok(())
}

fn handle<C: RelayConnection>(client: &mut ChatClient<C>, command: Command) {
    let announce = matches!(command, Command::Join(_) | Command::Leave);
    let result = match command {
        Command::Room(room_id) => client.set_room_id(room_id),
        Command::User(username) => client.set_username(username),
        Command::Join(Some((room_id, username))) => client.join(&room_id, &username),
        Command::Join(None) => client.join_current(),
        Command::Leave => client.leave(),
        Command::Say(text) => client
            .send(&text)
            .map(|message| print_message(&message, message.username())),
        Command::Help => {
            println!("{HELP}");
            Ok(())
        }
        Command::Unknown(name) => {
            println!("unknown command: /{name}");
            Ok(())
        }
        Command::Quit => Ok(()),
    };

    match result {
        Ok(()) => {
            let session = client.session();
            let phase = if session.is_joined() { "joined" } else { "not joined" };
            tracing::debug!(room = %session.room_label(), phase, "会话状态");
            if announce {
                println!("Room: {}", session.room_label());
            }
        }
        Err(err) => println!("{}", prompt_for(&err)),
    }
}

/// 面向用户的错误提示
fn prompt_for(err: &DomainError) -> String {
    match err {
        DomainError::ValidationError { field, .. } if field == "message" => {
            "Message field is missing!!".to_string()
        }
        DomainError::ValidationError { .. } => "Invalid Username/Room ID!!".to_string(),
        DomainError::InvalidPhase { .. } => err.to_string(),
    }
}

fn print_message(message: &ChatMessage, local_username: &str) {
    let time = format_timestamp(&message.time().with_timezone(&Local));
    match message.origin(local_username) {
        MessageOrigin::Own => println!("{:>40}  [{time}]", message.message()),
        MessageOrigin::Peer => println!("[{time}] {}: {}", message.username(), message.message()),
    }
}
