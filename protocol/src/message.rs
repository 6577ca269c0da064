//! 消息类型定义

use serde::{Deserialize, Serialize};

use crate::board::GameState;
use crate::error::CheckersError;
use crate::piece::{Position, Side};

/// 玩家 ID
pub type PlayerId = u64;

/// 对局访问码
pub type AccessCode = String;

/// 会话令牌，登录时下发，重连时校验
pub type SessionToken = u64;

/// 在对局中的座位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Seat {
    /// 执子一方
    Player(Side),
    /// 观战
    Spectator,
}

/// 对局状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomState {
    /// 等待对手加入
    Waiting,
    /// 对局进行中
    Playing,
    /// 对局结束
    Finished,
}

/// 对局信息（用于列表）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameInfo {
    pub access_code: AccessCode,
    pub board_size: usize,
    pub red_player: Option<String>,
    pub black_player: Option<String>,
    pub spectators: usize,
    pub state: RoomState,
}

/// 客户端发送给服务端的消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    // === 身份认证 ===
    /// 登录
    Login { nickname: String },
    /// 断线重连（需携带登录时下发的令牌）
    Reconnect {
        player_id: PlayerId,
        token: SessionToken,
        access_code: AccessCode,
    },

    // === 对局管理 ===
    /// 创建对局（尺寸缺省使用服务端配置）
    CreateGame {
        board_size: Option<usize>,
        preferred_side: Option<Side>,
    },
    /// 按访问码加入对局，座位已满时作为观战者加入
    JoinGame { access_code: AccessCode },
    /// 离开当前对局
    LeaveGame,
    /// 获取等待中的对局列表
    ListGames,

    // === 游戏操作 ===
    /// 走棋
    MakeMove { from: Position, to: Position },
    /// 请求当前对局状态
    RequestState,

    // === 心跳 ===
    /// 心跳请求
    Ping,
}

/// 服务端发送给客户端的消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    // === 身份认证 ===
    /// 登录成功
    LoginSuccess {
        player_id: PlayerId,
        token: SessionToken,
    },
    /// 重连成功
    ReconnectSuccess {
        access_code: AccessCode,
        seat: Seat,
        state: GameState,
    },

    // === 对局事件 ===
    /// 对局创建成功
    GameCreated {
        access_code: AccessCode,
        your_side: Side,
        state: GameState,
    },
    /// 加入对局成功
    GameJoined {
        access_code: AccessCode,
        seat: Seat,
        state: GameState,
    },
    /// 对局列表
    GameList { games: Vec<GameInfo> },
    /// 对手加入
    OpponentJoined { nickname: String },
    /// 对局内在线人数变化
    ConnectCount { count: usize },
    /// 对局开始
    GameStarted {
        state: GameState,
        red_player: String,
        black_player: String,
    },

    // === 游戏事件 ===
    /// 走棋完成（广播给对局内所有成员）
    MoveMade {
        from: Position,
        to: Position,
        captured: Option<Position>,
        crowned: bool,
        state: GameState,
    },
    /// 对局结束
    GameOver { winner: Option<Side> },
    /// 当前对局状态
    StateSnapshot { state: GameState },

    // === 断线重连 ===
    /// 对手断线
    OpponentDisconnected { timeout_secs: u32 },
    /// 对手重连
    OpponentReconnected,

    // === 心跳 ===
    /// 心跳响应
    Pong,

    // === 错误 ===
    /// 错误消息
    Error { code: ErrorCode, message: String },
}

impl ServerMessage {
    /// 构造错误消息
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code,
            message: message.into(),
        }
    }
}

/// 错误码定义
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    // === 对局相关 (1xx) ===
    /// 对局不存在
    GameNotFound = 100,
    /// 存档损坏
    CorruptSave = 101,
    /// 不在对局中
    NotInGame = 103,
    /// 已在对局中
    AlreadyInGame = 104,
    /// 观战者不能走棋
    NotAPlayer = 105,

    // === 走棋相关 (2xx) ===
    /// 不是你的回合
    NotYourTurn = 200,
    /// 非法走法
    IllegalMove = 201,
    /// 坐标越界
    OutOfBounds = 202,
    /// 对局未开始
    GameNotStarted = 203,
    /// 对局已结束
    GameAlreadyOver = 204,
    /// 无效棋盘尺寸
    InvalidBoardSize = 205,

    // === 玩家相关 (3xx) ===
    /// 无效昵称
    InvalidNickname = 300,
    /// 玩家不存在
    PlayerNotFound = 301,
    /// 昵称已被占用
    NicknameOccupied = 302,
    /// 未登录
    NotLoggedIn = 303,
    /// 连接已登录
    AlreadyLoggedIn = 304,

    // === 系统相关 (5xx) ===
    /// 内部错误
    InternalError = 500,
    /// 超时
    Timeout = 501,
}

impl From<&CheckersError> for ErrorCode {
    fn from(err: &CheckersError) -> Self {
        match err {
            CheckersError::IllegalMove { .. } => ErrorCode::IllegalMove,
            CheckersError::OutOfBounds { .. } => ErrorCode::OutOfBounds,
            CheckersError::InvalidBoardSize { .. } => ErrorCode::InvalidBoardSize,
            CheckersError::GameOver => ErrorCode::GameAlreadyOver,
            CheckersError::InvalidCell { .. }
            | CheckersError::MalformedBoard { .. }
            | CheckersError::MalformedState { .. } => ErrorCode::CorruptSave,
        }
    }
}

impl From<CheckersError> for ServerMessage {
    fn from(err: CheckersError) -> Self {
        ServerMessage::error(ErrorCode::from(&err), err.to_string())
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serialize() {
        let msg = ClientMessage::MakeMove {
            from: Position::new(5, 1),
            to: Position::new(4, 2),
        };
        let bytes = bincode::serialize(&msg).unwrap();
        let decoded: ClientMessage = bincode::deserialize(&bytes).unwrap();

        match decoded {
            ClientMessage::MakeMove { from, to } => {
                assert_eq!(from, Position::new(5, 1));
                assert_eq!(to, Position::new(4, 2));
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_move_made_carries_state() {
        let mut state = GameState::initial();
        let mv = state
            .apply_move(Position::new(5, 1), Position::new(4, 2))
            .unwrap();
        let msg = ServerMessage::MoveMade {
            from: mv.from,
            to: mv.to,
            captured: mv.captured_at(),
            crowned: mv.crowned,
            state: state.clone(),
        };

        let bytes = bincode::serialize(&msg).unwrap();
        match bincode::deserialize(&bytes).unwrap() {
            ServerMessage::MoveMade {
                state: decoded,
                captured,
                ..
            } => {
                assert_eq!(decoded, state);
                assert_eq!(captured, None);
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_checkers_error_to_message() {
        let err = CheckersError::IllegalMove {
            from: Position::new(0, 0),
            to: Position::new(1, 1),
        };
        match ServerMessage::from(err) {
            ServerMessage::Error { code, message } => {
                assert_eq!(code, ErrorCode::IllegalMove);
                assert_eq!(message, "Illegal move: from (0, 0) to (1, 1)");
            }
            _ => panic!("Wrong message type"),
        }

        assert_eq!(ErrorCode::from(&CheckersError::GameOver), ErrorCode::GameAlreadyOver);
    }
}
