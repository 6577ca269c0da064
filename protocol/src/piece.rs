//! 棋子与坐标定义

use serde::{Deserialize, Serialize};

use crate::error::CheckersError;

/// 阵营
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// 红方（先手，在下方，向行号减小方向前进）
    Red,
    /// 黑方（后手，在上方，向行号增大方向前进）
    Black,
}

impl Side {
    /// 获取对方阵营
    pub fn opponent(&self) -> Side {
        match self {
            Side::Red => Side::Black,
            Side::Black => Side::Red,
        }
    }

    /// 普通棋子的前进方向（行号增量）
    pub fn forward(&self) -> i16 {
        match self {
            Side::Red => -1,
            Side::Black => 1,
        }
    }

    /// 升王所在的行：沿前进方向的最后一行
    pub fn crowning_row(&self, size: usize) -> usize {
        match self {
            Side::Red => 0,
            Side::Black => size.saturating_sub(1),
        }
    }

    /// 获取图示字符
    pub fn to_char(&self) -> char {
        match self {
            Side::Red => 'r',
            Side::Black => 'b',
        }
    }

    /// 从图示字符解析
    pub fn from_char(c: char) -> Option<Side> {
        match c {
            'r' | 'R' => Some(Side::Red),
            'b' | 'B' => Some(Side::Black),
            _ => None,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Red => write!(f, "red"),
            Side::Black => write!(f, "black"),
        }
    }
}

/// 棋子等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rank {
    /// 兵：只能斜向前进
    Man,
    /// 王：四个斜方向均可
    King,
}

/// 格子内容
///
/// 规范整数表示：空 0，红兵 1，红王 2，黑兵 -1，黑王 -2。
/// 符号表示阵营，绝对值表示等级。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Cell {
    #[default]
    Empty,
    RedMan,
    RedKing,
    BlackMan,
    BlackKing,
}

impl Cell {
    /// 由阵营和等级构造棋子
    pub fn piece(side: Side, rank: Rank) -> Cell {
        match (side, rank) {
            (Side::Red, Rank::Man) => Cell::RedMan,
            (Side::Red, Rank::King) => Cell::RedKing,
            (Side::Black, Rank::Man) => Cell::BlackMan,
            (Side::Black, Rank::King) => Cell::BlackKing,
        }
    }

    /// 规范整数值
    pub fn value(&self) -> i8 {
        match self {
            Cell::Empty => 0,
            Cell::RedMan => 1,
            Cell::RedKing => 2,
            Cell::BlackMan => -1,
            Cell::BlackKing => -2,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Cell::Empty
    }

    /// 棋子所属阵营，空格返回 None
    pub fn side(&self) -> Option<Side> {
        match self {
            Cell::Empty => None,
            Cell::RedMan | Cell::RedKing => Some(Side::Red),
            Cell::BlackMan | Cell::BlackKing => Some(Side::Black),
        }
    }

    /// 棋子等级，空格返回 None
    pub fn rank(&self) -> Option<Rank> {
        match self {
            Cell::Empty => None,
            Cell::RedMan | Cell::BlackMan => Some(Rank::Man),
            Cell::RedKing | Cell::BlackKing => Some(Rank::King),
        }
    }

    /// 是否属于指定阵营
    pub fn belongs_to(&self, side: Side) -> bool {
        self.side() == Some(side)
    }

    /// 升王后的格子；王和空格保持不变
    pub fn crowned(&self) -> Cell {
        match self {
            Cell::RedMan => Cell::RedKing,
            Cell::BlackMan => Cell::BlackKing,
            other => *other,
        }
    }

    /// 获取图示字符（红方小写兵、大写王，黑方同理）
    pub fn to_char(&self) -> char {
        match self {
            Cell::Empty => '.',
            Cell::RedMan => 'r',
            Cell::RedKing => 'R',
            Cell::BlackMan => 'b',
            Cell::BlackKing => 'B',
        }
    }

    /// 从图示字符解析
    pub fn from_char(c: char) -> Option<Cell> {
        match c {
            '.' => Some(Cell::Empty),
            'r' => Some(Cell::RedMan),
            'R' => Some(Cell::RedKing),
            'b' => Some(Cell::BlackMan),
            'B' => Some(Cell::BlackKing),
            _ => None,
        }
    }
}

impl From<Cell> for i8 {
    fn from(cell: Cell) -> i8 {
        cell.value()
    }
}

impl TryFrom<i8> for Cell {
    type Error = CheckersError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Cell::Empty),
            1 => Ok(Cell::RedMan),
            2 => Ok(Cell::RedKing),
            -1 => Ok(Cell::BlackMan),
            -2 => Ok(Cell::BlackKing),
            other => Err(CheckersError::InvalidCell {
                value: other.into(),
            }),
        }
    }
}

/// 棋盘位置
///
/// 坐标范围取决于棋盘尺寸，因此构造时不做边界检查，由 [`crate::Board::contains`] 判定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// 行（0 为最上方）
    pub row: u8,
    /// 列
    pub col: u8,
}

impl Position {
    /// 创建新位置
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    /// 到目标位置的 (行增量, 列增量)
    pub fn delta(&self, to: Position) -> (i16, i16) {
        (
            to.row as i16 - self.row as i16,
            to.col as i16 - self.col as i16,
        )
    }

    /// 两点连线的中点；跳吃时即被吃棋子所在格
    pub fn midpoint(&self, other: Position) -> Position {
        Position::new(
            ((self.row as u16 + other.row as u16) / 2) as u8,
            ((self.col as u16 + other.col as u16) / 2) as u8,
        )
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_canonical_values() {
        assert_eq!(Cell::Empty.value(), 0);
        assert_eq!(Cell::RedMan.value(), 1);
        assert_eq!(Cell::RedKing.value(), 2);
        assert_eq!(Cell::BlackMan.value(), -1);
        assert_eq!(Cell::BlackKing.value(), -2);

        for value in -2i8..=2 {
            let cell = Cell::try_from(value).unwrap();
            assert_eq!(i8::from(cell), value);
        }
    }

    #[test]
    fn test_cell_rejects_unknown_value() {
        assert_eq!(
            Cell::try_from(3i8),
            Err(CheckersError::InvalidCell { value: 3 })
        );
        assert!(Cell::try_from(-3i8).is_err());
    }

    #[test]
    fn test_cell_side_and_rank() {
        assert_eq!(Cell::RedKing.side(), Some(Side::Red));
        assert_eq!(Cell::BlackMan.side(), Some(Side::Black));
        assert_eq!(Cell::Empty.side(), None);
        assert_eq!(Cell::BlackKing.rank(), Some(Rank::King));
        assert_eq!(Cell::RedMan.rank(), Some(Rank::Man));
        assert_eq!(Cell::piece(Side::Black, Rank::King), Cell::BlackKing);
    }

    #[test]
    fn test_crowned_is_idempotent() {
        assert_eq!(Cell::RedMan.crowned(), Cell::RedKing);
        assert_eq!(Cell::RedKing.crowned(), Cell::RedKing);
        assert_eq!(Cell::BlackMan.crowned().crowned(), Cell::BlackKing);
        assert_eq!(Cell::Empty.crowned(), Cell::Empty);
    }

    #[test]
    fn test_cell_char_roundtrip() {
        for cell in [
            Cell::Empty,
            Cell::RedMan,
            Cell::RedKing,
            Cell::BlackMan,
            Cell::BlackKing,
        ] {
            assert_eq!(Cell::from_char(cell.to_char()), Some(cell));
        }
        assert_eq!(Cell::from_char('x'), None);
    }

    #[test]
    fn test_side_direction() {
        assert_eq!(Side::Red.forward(), -1);
        assert_eq!(Side::Black.forward(), 1);
        assert_eq!(Side::Red.crowning_row(8), 0);
        assert_eq!(Side::Black.crowning_row(8), 7);
        assert_eq!(Side::Red.opponent(), Side::Black);
    }

    #[test]
    fn test_position_helpers() {
        let from = Position::new(4, 4);
        let to = Position::new(2, 2);
        assert_eq!(from.delta(to), (-2, -2));
        assert_eq!(from.midpoint(to), Position::new(3, 3));
    }

    #[test]
    fn test_cell_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Cell::BlackKing).unwrap(), "-2");
        let cell: Cell = serde_json::from_str("1").unwrap();
        assert_eq!(cell, Cell::RedMan);
        assert!(serde_json::from_str::<Cell>("7").is_err());
    }
}
