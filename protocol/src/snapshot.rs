//! 对局快照
//!
//! 以 JSON 保存一局的完整状态（棋盘、走子方、胜者），用于服务端存档与恢复。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::board::{Board, GameState};
use crate::error::CheckersError;
use crate::message::AccessCode;
use crate::piece::Side;

/// 快照格式版本
pub const SNAPSHOT_VERSION: &str = "1.0";

/// 对局快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    /// 格式版本
    pub version: String,
    /// 对局访问码
    pub access_code: AccessCode,
    /// 棋盘（二维整数数组）
    pub board: Board,
    /// 走子方
    pub turn: Side,
    /// 胜者
    pub winner: Option<Side>,
    /// 保存时间
    pub saved_at: DateTime<Utc>,
}

impl GameSnapshot {
    /// 从对局状态生成快照
    pub fn capture(access_code: &str, state: &GameState) -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            access_code: access_code.to_string(),
            board: state.board().clone(),
            turn: state.turn(),
            winner: state.winner(),
            saved_at: Utc::now(),
        }
    }

    /// 恢复为对局状态
    ///
    /// 记录的胜者必须与棋盘上的棋子数一致，否则视为损坏。
    pub fn restore(&self) -> Result<GameState, CheckersError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(CheckersError::MalformedState {
                reason: format!("unsupported snapshot version {}", self.version),
            });
        }

        let state = GameState::from_board(self.board.clone(), self.turn);
        if state.winner() != self.winner {
            return Err(CheckersError::MalformedState {
                reason: format!(
                    "recorded winner {:?} does not match board ({:?})",
                    self.winner,
                    state.winner()
                ),
            });
        }

        Ok(state)
    }

    /// 转换为 JSON 字符串
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// 从 JSON 字符串解析
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
