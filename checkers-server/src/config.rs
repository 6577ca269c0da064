//! 服务端配置
//!
//! 从 TOML 文件加载，缺省字段使用默认值，命令行参数可覆盖部分字段。

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use protocol::{
    validate_board_size, DEFAULT_BOARD_SIZE, DEFAULT_PORT, HEARTBEAT_TIMEOUT_SECS,
    MAX_CONNECTIONS, RECONNECT_TIMEOUT_SECS,
};

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}

/// 服务端配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口（0 表示由系统分配）
    pub port: u16,
    /// 新对局的默认棋盘边长
    pub board_size: usize,
    /// 最大并发连接数
    pub max_connections: usize,
    /// 断线后保留座位的时间（秒）
    pub reconnect_timeout_secs: u64,
    /// 无消息超时时间（秒）
    pub heartbeat_timeout_secs: u64,
    /// 存档配置
    pub storage: StorageConfig,
}

/// 存档配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// 是否启用存档
    pub enabled: bool,
    /// 每步棋后自动保存
    pub autosave: bool,
    /// 存档目录，缺省为系统数据目录下的 checkers/games
    pub saves_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            board_size: DEFAULT_BOARD_SIZE,
            max_connections: MAX_CONNECTIONS,
            reconnect_timeout_secs: RECONNECT_TIMEOUT_SECS,
            heartbeat_timeout_secs: HEARTBEAT_TIMEOUT_SECS,
            storage: StorageConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            autosave: true,
            saves_dir: None,
        }
    }
}

impl ServerConfig {
    /// 从 TOML 文件加载配置
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// 加载配置，文件不存在时使用默认值
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            warn!("Config file '{}' not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// 解析 TOML 字符串
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_board_size(self.board_size)
            .map_err(|e| ConfigError::Validation(format!("board_size: {}", e)))?;

        if self.max_connections == 0 {
            return Err(ConfigError::Validation(
                "max_connections must be > 0".into(),
            ));
        }
        if self.heartbeat_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "heartbeat_timeout_secs must be > 0".into(),
            ));
        }
        if self.bind_addr().is_err() {
            return Err(ConfigError::Validation(format!(
                "invalid listen address {}:{}",
                self.host, self.port
            )));
        }

        Ok(())
    }

    /// 监听地址
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    pub fn reconnect_timeout(&self) -> Duration {
        Duration::from_secs(self.reconnect_timeout_secs)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }
}
