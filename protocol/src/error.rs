//! 错误类型定义

use thiserror::Error;

use crate::piece::Position;

/// 跳棋规则错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckersError {
    /// 走法不合规则（格式正确但不允许）
    #[error("Illegal move: from {from} to {to}")]
    IllegalMove { from: Position, to: Position },

    /// 坐标越界（输入本身不合法）
    #[error("Position {pos} is outside a {size}x{size} board")]
    OutOfBounds { pos: Position, size: usize },

    /// 无效的棋盘尺寸
    #[error("Invalid board size: {size} (must be even and within {min}..={max})")]
    InvalidBoardSize { size: usize, min: usize, max: usize },

    /// 无效的格子取值
    #[error("Invalid cell value: {value}")]
    InvalidCell { value: i64 },

    /// 棋盘数据损坏
    #[error("Malformed board: {reason}")]
    MalformedBoard { reason: String },

    /// 对局状态损坏（如胜负与棋子数不符）
    #[error("Malformed game state: {reason}")]
    MalformedState { reason: String },

    /// 游戏已结束
    #[error("Game is already over")]
    GameOver,
}

/// 协议错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化错误（bincode）
    #[error("Bincode serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// JSON 序列化错误
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// 协议版本不匹配
    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u8, actual: u8 },

    /// 帧大小超限
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// 连接超时
    #[error("Connection timeout")]
    ConnectionTimeout,

    /// 连接已关闭
    #[error("Connection closed")]
    ConnectionClosed,

    /// 昵称为空
    #[error("Nickname is empty")]
    NicknameEmpty,

    /// 昵称过长
    #[error("Nickname too long: {len} chars (max: {max})")]
    NicknameTooLong { len: usize, max: usize },

    /// 昵称已被占用
    #[error("Nickname is already occupied")]
    NicknameOccupied,

    /// 跳棋规则错误
    #[error("Checkers error: {0}")]
    Checkers(#[from] CheckersError),
}

/// 协议操作结果类型
pub type Result<T> = std::result::Result<T, ProtocolError>;
