//! 协议常量定义

use std::time::Duration;

/// 协议版本号
pub const PROTOCOL_VERSION: u8 = 1;

/// 默认棋盘边长
pub const DEFAULT_BOARD_SIZE: usize = 8;

/// 每方初始占据的行数
pub const STARTING_ROWS: usize = 3;

/// 最小棋盘边长（双方开局区域不重叠）
pub const MIN_BOARD_SIZE: usize = 2 * STARTING_ROWS;

/// 最大棋盘边长（坐标用 u8 表示）
pub const MAX_BOARD_SIZE: usize = 20;

/// 昵称最大长度
pub const MAX_NICKNAME_LEN: usize = 20;

/// 访问码长度
pub const ACCESS_CODE_LEN: usize = 8;

/// 消息帧最大大小
pub const MAX_FRAME_SIZE: usize = 65536;

/// 服务端最大连接数
pub const MAX_CONNECTIONS: usize = 100;

/// 服务端默认端口
pub const DEFAULT_PORT: u16 = 9527;

/// 服务端心跳超时（秒）- 超过此时间无消息则断开
pub const HEARTBEAT_TIMEOUT_SECS: u64 = 30;

/// 连接超时（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// 断线重连超时（秒）
pub const RECONNECT_TIMEOUT_SECS: u64 = 60;

/// 心跳超时 Duration
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(HEARTBEAT_TIMEOUT_SECS);

/// 连接超时 Duration
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(CONNECT_TIMEOUT_SECS);

/// 断线重连超时 Duration
pub const RECONNECT_TIMEOUT: Duration = Duration::from_secs(RECONNECT_TIMEOUT_SECS);
