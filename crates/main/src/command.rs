//! 标准输入命令解析

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 编辑房间ID
    Room(String),
    /// 编辑用户名
    User(String),
    /// 加入房间；未给出参数时使用已编辑的字段
    Join(Option<(String, String)>),
    /// 离开房间（切换账号）
    Leave,
    Help,
    Quit,
    /// 发送消息
    Say(String),
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        let Some(rest) = line.strip_prefix('/') else {
            return Command::Say(line.to_string());
        };

        let (name, args) = split_word(rest);
        match name {
            "room" => Command::Room(args.to_string()),
            "user" => Command::User(args.to_string()),
            "join" => match split_word(args) {
                ("", _) => Command::Join(None),
                (room, username) => Command::Join(Some((room.to_string(), username.to_string()))),
            },
            "leave" => Command::Leave,
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => Command::Unknown(other.to_string()),
        }
    }
}

/// 拆出第一个词，其余部分去掉首尾空白后原样返回
fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (text, ""),
    }
}
