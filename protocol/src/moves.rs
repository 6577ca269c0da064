//! 走法验证

use serde::{Deserialize, Serialize};

use crate::board::GameState;
use crate::piece::{Cell, Position, Rank};

/// 已执行的走法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    /// 起始位置
    pub from: Position,
    /// 目标位置
    pub to: Position,
    /// 被跳吃的棋子（如果有）
    pub captured: Option<Cell>,
    /// 本步是否升王
    pub crowned: bool,
}

impl Move {
    /// 被吃棋子所在的格子
    pub fn captured_at(&self) -> Option<Position> {
        self.captured.map(|_| self.from.midpoint(self.to))
    }

    pub fn is_jump(&self) -> bool {
        self.captured.is_some()
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sep = if self.is_jump() { 'x' } else { '-' };
        write!(f, "{} {} {}", self.from, sep, self.to)?;
        if self.crowned {
            write!(f, " K")?;
        }
        Ok(())
    }
}

/// 走法类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    /// 斜走一格
    Step,
    /// 斜跳两格，吃掉中间的对方棋子
    Jump { captured: Position },
}

/// 规则判定（纯函数，不修改状态）
pub struct Rules;

impl Rules {
    /// 是否可以选中：格子上有当前走子方的棋子（不区分兵和王）
    pub fn can_select(state: &GameState, pos: Position) -> bool {
        state
            .board()
            .get(pos)
            .is_some_and(|cell| cell.belongs_to(state.turn()))
    }

    /// 走法是否合法
    pub fn can_move(state: &GameState, from: Position, to: Position) -> bool {
        Self::classify(state, from, to).is_some()
    }

    /// 判定走法类型，不合法返回 None
    ///
    /// 兵只能沿前进方向斜走，王四个斜方向均可；走一格落点须为空，
    /// 跳两格时中间须为对方棋子。不支持连跳。
    pub fn classify(state: &GameState, from: Position, to: Position) -> Option<MoveKind> {
        if !Self::can_select(state, from) {
            return None;
        }

        let board = state.board();
        if board.get(to) != Some(Cell::Empty) {
            return None;
        }

        let piece = board.get(from)?;
        let (dr, dc) = from.delta(to);
        let distance = dr.abs();
        if distance != dc.abs() || !(1..=2).contains(&distance) {
            return None;
        }

        if piece.rank() == Some(Rank::Man) && dr.signum() != state.turn().forward() {
            return None;
        }

        if distance == 1 {
            return Some(MoveKind::Step);
        }

        let captured = from.midpoint(to);
        let opponent = state.turn().opponent();
        if board.get(captured)?.belongs_to(opponent) {
            Some(MoveKind::Jump { captured })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;
    use crate::error::CheckersError;
    use crate::piece::Side;

    fn pos(row: u8, col: u8) -> Position {
        Position::new(row, col)
    }

    fn state_with(pieces: &[(Position, Cell)], turn: Side) -> GameState {
        let mut board = Board::empty();
        for &(p, cell) in pieces {
            board.set(p, cell).unwrap();
        }
        GameState::from_board(board, turn)
    }

    #[test]
    fn test_can_select_own_piece_only() {
        let state = GameState::initial();
        assert!(state.can_select(pos(5, 1)));
        assert!(!state.can_select(pos(2, 2)));
        assert!(!state.can_select(pos(4, 4)));
        assert!(!state.can_select(pos(30, 30)));
    }

    #[test]
    fn test_man_steps_forward_only() {
        let state = state_with(
            &[(pos(4, 4), Cell::RedMan), (pos(0, 0), Cell::BlackMan)],
            Side::Red,
        );
        assert_eq!(Rules::classify(&state, pos(4, 4), pos(3, 3)), Some(MoveKind::Step));
        assert_eq!(Rules::classify(&state, pos(4, 4), pos(3, 5)), Some(MoveKind::Step));
        assert_eq!(Rules::classify(&state, pos(4, 4), pos(5, 5)), None);
        assert_eq!(Rules::classify(&state, pos(4, 4), pos(5, 3)), None);
    }

    #[test]
    fn test_black_man_moves_down() {
        let state = state_with(
            &[(pos(2, 2), Cell::BlackMan), (pos(7, 7), Cell::RedMan)],
            Side::Black,
        );
        assert!(state.can_move(pos(2, 2), pos(3, 3)));
        assert!(!state.can_move(pos(2, 2), pos(1, 1)));
    }

    #[test]
    fn test_king_moves_any_diagonal() {
        let state = state_with(
            &[(pos(4, 4), Cell::RedKing), (pos(0, 0), Cell::BlackMan)],
            Side::Red,
        );
        for to in [pos(3, 3), pos(3, 5), pos(5, 3), pos(5, 5)] {
            assert!(state.can_move(pos(4, 4), to), "king should reach {}", to);
        }
    }

    #[test]
    fn test_non_diagonal_and_long_moves_rejected() {
        let state = state_with(
            &[(pos(4, 4), Cell::RedKing), (pos(0, 0), Cell::BlackMan)],
            Side::Red,
        );
        assert!(!state.can_move(pos(4, 4), pos(3, 4)));
        assert!(!state.can_move(pos(4, 4), pos(4, 5)));
        assert!(!state.can_move(pos(4, 4), pos(1, 1)));
        assert!(!state.can_move(pos(4, 4), pos(4, 4)));
    }

    #[test]
    fn test_jump_requires_opponent_in_between() {
        let state = state_with(
            &[
                (pos(4, 4), Cell::RedMan),
                (pos(3, 3), Cell::BlackMan),
                (pos(3, 5), Cell::RedMan),
            ],
            Side::Red,
        );
        assert_eq!(
            Rules::classify(&state, pos(4, 4), pos(2, 2)),
            Some(MoveKind::Jump {
                captured: pos(3, 3)
            })
        );
        // 不能跳过己方棋子
        assert_eq!(Rules::classify(&state, pos(4, 4), pos(2, 6)), None);
        // 不能跳过空格
        assert_eq!(Rules::classify(&state, pos(3, 5), pos(1, 7)), None);
    }

    #[test]
    fn test_jump_onto_occupied_square_rejected() {
        let state = state_with(
            &[
                (pos(4, 4), Cell::RedMan),
                (pos(3, 3), Cell::BlackMan),
                (pos(2, 2), Cell::BlackMan),
            ],
            Side::Red,
        );
        assert!(!state.can_move(pos(4, 4), pos(2, 2)));
    }

    #[test]
    fn test_not_your_turn() {
        let state = GameState::initial();
        assert!(!state.can_move(pos(2, 2), pos(3, 3)));
    }

    #[test]
    fn test_select_ignores_game_over() {
        // 选中只看归属；结束后的走棋由 apply_move 拒绝
        let mut state = state_with(&[(pos(4, 4), Cell::RedKing)], Side::Red);
        assert!(state.is_over());
        assert!(state.can_select(pos(4, 4)));
        assert!(matches!(
            state.apply_move(pos(4, 4), pos(3, 3)),
            Err(CheckersError::GameOver)
        ));
    }

    #[test]
    fn test_back_rank_blocked_at_start() {
        let state = GameState::initial();
        assert!(state.can_move(pos(5, 3), pos(4, 2)));
        assert!(state.can_move(pos(5, 3), pos(4, 4)));
        for to in [pos(6, 0), pos(6, 2), pos(5, 1)] {
            assert!(!state.can_move(pos(7, 1), to));
        }
    }

    #[test]
    fn test_move_display() {
        let mv = Move {
            from: pos(4, 4),
            to: pos(2, 2),
            captured: Some(Cell::BlackMan),
            crowned: false,
        };
        assert_eq!(mv.to_string(), "(4, 4) x (2, 2)");
        assert_eq!(mv.captured_at(), Some(pos(3, 3)));

        let mv = Move {
            from: pos(1, 1),
            to: pos(0, 0),
            captured: None,
            crowned: true,
        };
        assert_eq!(mv.to_string(), "(1, 1) - (0, 0) K");
        assert_eq!(mv.captured_at(), None);
    }
}
