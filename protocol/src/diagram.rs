//! 棋盘文本图示
//!
//! 格式：`<棋盘> [走子方]`
//!
//! 棋盘按行从上到下，以 `/` 分隔，每个字符表示一个格子：
//! `.` 空，`r` 红兵，`R` 红王，`b` 黑兵，`B` 黑王。
//! 走子方为 `r` 或 `b`，省略时为红方。
//!
//! 示例（8×8 开局）：
//! `b.b.b.b./.b.b.b.b/b.b.b.b./......../......../.r.r.r.r/r.r.r.r./.r.r.r.r r`

use crate::board::{validate_board_size, Board, GameState};
use crate::error::CheckersError;
use crate::piece::{Cell, Position, Side};

/// 8×8 开局图示
pub const INITIAL_DIAGRAM: &str =
    "b.b.b.b./.b.b.b.b/b.b.b.b./......../......../.r.r.r.r/r.r.r.r./.r.r.r.r r";

/// 图示格式处理
pub struct Diagram;

impl Diagram {
    /// 解析图示为对局状态（胜负由棋子数计算）
    pub fn parse(diagram: &str) -> Result<GameState, CheckersError> {
        let mut parts = diagram.split_whitespace();
        let board_str = parts.next().ok_or_else(|| malformed("empty diagram"))?;
        let board = Self::parse_board(board_str)?;

        let turn = match parts.next() {
            None => Side::Red,
            Some("r") => Side::Red,
            Some("b") => Side::Black,
            Some(other) => return Err(malformed(format!("unknown side '{}'", other))),
        };

        if parts.next().is_some() {
            return Err(malformed("trailing fields"));
        }

        Ok(GameState::from_board(board, turn))
    }

    /// 解析棋盘部分
    pub fn parse_board(board_str: &str) -> Result<Board, CheckersError> {
        let rows: Vec<&str> = board_str.split('/').collect();
        let size = rows.len();
        validate_board_size(size)?;

        let mut board = Board::generate(size)?;
        for (row, line) in rows.iter().enumerate() {
            let count = line.chars().count();
            if count != size {
                return Err(malformed(format!(
                    "row {} has {} cells, expected {}",
                    row, count, size
                )));
            }

            for (col, c) in line.chars().enumerate() {
                let cell = Cell::from_char(c)
                    .ok_or_else(|| malformed(format!("unknown piece '{}'", c)))?;
                board.set(Position::new(row as u8, col as u8), cell)?;
            }
        }

        Ok(board)
    }

    /// 生成对局状态的图示
    pub fn to_string(state: &GameState) -> String {
        format!(
            "{} {}",
            Self::board_to_string(state.board()),
            state.turn().to_char()
        )
    }

    /// 生成棋盘部分
    pub fn board_to_string(board: &Board) -> String {
        board
            .rows()
            .iter()
            .map(|row| row.iter().map(Cell::to_char).collect::<String>())
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn malformed(reason: impl Into<String>) -> CheckersError {
    CheckersError::MalformedBoard {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_diagram_matches_initial_state() {
        let state = Diagram::parse(INITIAL_DIAGRAM).unwrap();
        assert_eq!(state, GameState::initial());
        assert_eq!(Diagram::to_string(&GameState::initial()), INITIAL_DIAGRAM);
    }

    #[test]
    fn test_parse_small_board() {
        let state = Diagram::parse("R...../.b..../....../....../....../...... b").unwrap();
        assert_eq!(state.board().size(), 6);
        assert_eq!(state.turn(), Side::Black);
        assert_eq!(state.board().get(Position::new(0, 0)), Some(Cell::RedKing));
        assert_eq!(state.board().get(Position::new(1, 1)), Some(Cell::BlackMan));
        assert_eq!(state.winner(), None);
    }

    #[test]
    fn test_side_defaults_to_red() {
        let state = Diagram::parse("r...../....../....../....../....../......").unwrap();
        assert_eq!(state.turn(), Side::Red);
        assert_eq!(state.winner(), Some(Side::Red));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Diagram::parse("").is_err());
        assert!(Diagram::parse("r....../....../....../....../....../......").is_err());
        assert!(Diagram::parse("r...../....../....../....../......").is_err());
        assert!(Diagram::parse("x...../....../....../....../....../......").is_err());
        assert!(Diagram::parse("r...../....../....../....../....../...... w").is_err());
        assert!(Diagram::parse("r...../....../....../....../....../...... r x").is_err());
        // 过小的棋盘
        assert!(matches!(
            Diagram::parse("r./.."),
            Err(CheckersError::InvalidBoardSize { .. })
        ));
    }

    #[test]
    fn test_roundtrip_after_moves() {
        let mut state = GameState::initial();
        state
            .apply_move(Position::new(5, 1), Position::new(4, 2))
            .unwrap();
        let text = Diagram::to_string(&state);
        assert!(text.ends_with(" b"));
        assert_eq!(Diagram::parse(&text).unwrap(), state);
    }
}
