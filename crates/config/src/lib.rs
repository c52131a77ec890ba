//! 客户端配置
//!
//! 加载顺序：默认值 -> 可选配置文件（`CHAT_CONFIG_FILE`）-> `API_URL`
//! -> `CHAT_*` 环境变量（`__` 分隔嵌套字段，如 `CHAT_RELAY__BASE_URL`）。

use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// 指定配置文件路径的环境变量
pub const CONFIG_FILE_ENV: &str = "CHAT_CONFIG_FILE";
/// 中继服务基础地址的环境变量
pub const API_URL_ENV: &str = "API_URL";
/// 其余配置项的环境变量前缀
pub const ENV_PREFIX: &str = "CHAT_";

/// 客户端全局配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct ClientConfig {
    /// 中继连接配置
    #[validate(nested)]
    pub relay: RelayConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 中继连接配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RelayConfig {
    /// 中继服务基础地址（http/https/ws/wss）
    #[validate(url)]
    pub base_url: String,
    /// WebSocket 路径
    #[serde(default = "default_path")]
    pub path: String,
    /// 断线重连配置
    #[serde(default)]
    #[validate(nested)]
    pub reconnect: ReconnectConfig,
}

/// 断线重连配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_backoff"))]
pub struct ReconnectConfig {
    /// 最大重连次数，0 表示不重连
    pub max_attempts: u32,
    /// 首次重连等待（毫秒），之后指数增长
    #[validate(range(min = 1))]
    pub base_delay_ms: u64,
    /// 单次等待上限（毫秒）
    #[validate(range(min = 1))]
    pub max_delay_ms: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` 指令，`RUST_LOG` 优先
    pub filter: String,
}

fn default_path() -> String {
    "/ws".to_string()
}

fn validate_backoff(config: &ReconnectConfig) -> Result<(), ValidationError> {
    if config.max_delay_ms < config.base_delay_ms {
        return Err(ValidationError::new("max_delay_below_base_delay"));
    }
    Ok(())
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            path: default_path(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl RelayConfig {
    /// WebSocket 连接地址
    ///
    /// `http` 映射为 `ws`，`https` 映射为 `wss`，其余保持不变。
    pub fn websocket_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };

        if self.path.is_empty() {
            base
        } else if self.path.starts_with('/') {
            format!("{base}{}", self.path)
        } else {
            format!("{base}/{}", self.path)
        }
    }
}

impl ClientConfig {
    /// 从环境加载配置
    pub fn load() -> Result<Self, ConfigError> {
        let mut fig = Figment::new().merge(Serialized::defaults(ClientConfig::default()));
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            if path.ends_with(".yml") || path.ends_with(".yaml") {
                fig = fig.merge(Yaml::file(path));
            } else if path.ends_with(".json") {
                fig = fig.merge(Json::file(path));
            } else {
                fig = fig.merge(Toml::file(path));
            }
        }
        fig = fig
            .merge(Env::raw().only(&[API_URL_ENV]).map(|_| "relay.base_url".into()))
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["CONFIG_FILE"]).split("__"));

        Self::extract(fig)
    }

    /// 从 TOML 字符串解析，缺失字段取默认值
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let fig = Figment::new()
            .merge(Serialized::defaults(ClientConfig::default()))
            .merge(Toml::string(s));
        Self::extract(fig)
    }

    fn extract(fig: Figment) -> Result<Self, ConfigError> {
        let cfg: ClientConfig = fig.extract().map_err(Box::new)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("配置加载失败: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("配置校验失败: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}
