//! 跳棋对局服务端
//!
//! 包含:
//! - 配置加载
//! - 网络层（接受循环与 hub 任务）
//! - 房间系统与玩家管理
//! - 对局存档

pub mod config;
pub mod network;
pub mod player;
pub mod room;
pub mod server;
pub mod storage;

pub use config::{ConfigError, ServerConfig, StorageConfig};
pub use network::{run_hub, HubEvent, Server};
pub use player::{Player, PlayerManager, PlayerStatus};
pub use room::{Room, RoomManager};
pub use server::{ConnectionId, MessageHandler, ServerState};
pub use storage::{SavedGameInfo, StorageManager};
