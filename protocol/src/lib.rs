//! 跳棋共享协议库
//!
//! 包含:
//! - 格子、棋盘、位置等核心数据结构
//! - 走法验证、升王和胜负判定
//! - 消息类型定义 (ClientMessage, ServerMessage)
//! - 传输层抽象 (Connector, Connection, Listener traits)
//! - 帧编解码
//! - 对局快照与文本图示

mod board;
mod constants;
mod diagram;
mod error;
mod message;
mod moves;
mod piece;
mod snapshot;
mod transport;

pub use board::{validate_board_size, Board, GameState};
pub use constants::*;
pub use diagram::{Diagram, INITIAL_DIAGRAM};
pub use error::{CheckersError, ProtocolError, Result};
pub use message::{
    AccessCode, ClientMessage, ErrorCode, GameInfo, PlayerId, RoomState, Seat, ServerMessage,
    SessionToken,
};
pub use moves::{Move, MoveKind, Rules};
pub use piece::{Cell, Position, Rank, Side};
pub use snapshot::{GameSnapshot, SNAPSHOT_VERSION};
pub use transport::{
    decode_header, encode_frame, encode_header, Connection, Connector, FrameReader, FrameWriter,
    Listener, TcpConnection, TcpConnector, TcpListener, HEADER_SIZE,
};
