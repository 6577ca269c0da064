//! 棋盘与对局状态

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_BOARD_SIZE, MAX_BOARD_SIZE, MIN_BOARD_SIZE, STARTING_ROWS};
use crate::error::CheckersError;
use crate::moves::{Move, MoveKind, Rules};
use crate::piece::{Cell, Position, Rank, Side};

/// 检查棋盘尺寸：必须为偶数且在允许范围内
pub fn validate_board_size(size: usize) -> Result<(), CheckersError> {
    if size % 2 != 0 || !(MIN_BOARD_SIZE..=MAX_BOARD_SIZE).contains(&size) {
        return Err(CheckersError::InvalidBoardSize {
            size,
            min: MIN_BOARD_SIZE,
            max: MAX_BOARD_SIZE,
        });
    }
    Ok(())
}

/// 棋盘
///
/// N×N 网格，索引为 row * N + col。序列化为二维整数数组（见 [`Cell`]）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<Cell>>", into = "Vec<Vec<Cell>>")]
pub struct Board {
    size: usize,
    cells: Vec<Cell>,
}

impl Board {
    /// 创建指定尺寸的空棋盘
    pub fn generate(size: usize) -> Result<Self, CheckersError> {
        validate_board_size(size)?;
        Ok(Self {
            size,
            cells: vec![Cell::Empty; size * size],
        })
    }

    /// 创建默认尺寸的空棋盘
    pub fn empty() -> Self {
        Self {
            size: DEFAULT_BOARD_SIZE,
            cells: vec![Cell::Empty; DEFAULT_BOARD_SIZE * DEFAULT_BOARD_SIZE],
        }
    }

    /// 创建指定尺寸的开局棋盘
    pub fn initial(size: usize) -> Result<Self, CheckersError> {
        let mut board = Self::generate(size)?;
        board.place_starting_pieces();
        Ok(board)
    }

    /// 默认尺寸的开局棋盘
    pub fn standard() -> Self {
        let mut board = Self::empty();
        board.place_starting_pieces();
        board
    }

    /// 摆放开局棋子
    ///
    /// 上方三行放黑兵，下方三行放红兵，只占 (row + col) 为偶数的格子：
    /// 偶数行用偶数列，奇数行用奇数列。棋盘边长不小于 [`MIN_BOARD_SIZE`]，
    /// 两片区域不会重叠。
    pub fn place_starting_pieces(&mut self) {
        let n = self.size;
        for row in 0..n {
            let cell = if row < STARTING_ROWS {
                Cell::BlackMan
            } else if row + STARTING_ROWS >= n {
                Cell::RedMan
            } else {
                continue;
            };

            for col in (row % 2..n).step_by(2) {
                self.cells[row * n + col] = cell;
            }
        }
    }

    /// 棋盘边长
    pub fn size(&self) -> usize {
        self.size
    }

    /// 位置是否在棋盘内
    pub fn contains(&self, pos: Position) -> bool {
        (pos.row as usize) < self.size && (pos.col as usize) < self.size
    }

    fn index(&self, pos: Position) -> Option<usize> {
        if self.contains(pos) {
            Some(pos.row as usize * self.size + pos.col as usize)
        } else {
            None
        }
    }

    fn out_of_bounds(&self, pos: Position) -> CheckersError {
        CheckersError::OutOfBounds {
            pos,
            size: self.size,
        }
    }

    /// 获取指定位置的格子，越界返回 None
    pub fn get(&self, pos: Position) -> Option<Cell> {
        self.index(pos).map(|i| self.cells[i])
    }

    /// 设置指定位置的格子
    pub fn set(&mut self, pos: Position, cell: Cell) -> Result<(), CheckersError> {
        let i = self.index(pos).ok_or_else(|| self.out_of_bounds(pos))?;
        self.cells[i] = cell;
        Ok(())
    }

    /// 取出指定位置的格子并清空（不检查规则）
    pub fn take(&mut self, pos: Position) -> Result<Cell, CheckersError> {
        let i = self.index(pos).ok_or_else(|| self.out_of_bounds(pos))?;
        Ok(std::mem::take(&mut self.cells[i]))
    }

    /// 遍历所有格子（按行优先）
    pub fn cells(&self) -> impl Iterator<Item = (Position, Cell)> + '_ {
        let size = self.size;
        self.cells.iter().enumerate().map(move |(i, &cell)| {
            (Position::new((i / size) as u8, (i % size) as u8), cell)
        })
    }

    /// 统计指定阵营的棋子数（兵和王都计入）
    pub fn count(&self, side: Side) -> usize {
        self.cells.iter().filter(|cell| cell.belongs_to(side)).count()
    }

    /// 按行拆分
    pub fn rows(&self) -> Vec<Vec<Cell>> {
        self.cells.chunks(self.size).map(|row| row.to_vec()).collect()
    }

    /// 升王：到达前进方向最后一行的兵变为王
    ///
    /// 红兵在第 0 行升王，黑兵在第 N-1 行升王。重复调用无副作用。
    /// 返回本次升王的位置。
    pub fn crown_kings(&mut self) -> Vec<Position> {
        let n = self.size;
        let mut crowned = Vec::new();

        for side in [Side::Red, Side::Black] {
            let row = side.crowning_row(n);
            let man = Cell::piece(side, Rank::Man);
            for col in 0..n {
                let i = row * n + col;
                if self.cells[i] == man {
                    self.cells[i] = man.crowned();
                    crowned.push(Position::new(row as u8, col as u8));
                }
            }
        }

        crowned
    }

    /// 判定胜负
    ///
    /// 一方棋子全部被吃则另一方获胜；双方都无棋子时视为无胜者。
    pub fn check_winner(&self) -> Option<Side> {
        let red = self.count(Side::Red);
        let black = self.count(Side::Black);

        match (red, black) {
            (0, 0) => None,
            (0, _) => Some(Side::Black),
            (_, 0) => Some(Side::Red),
            _ => None,
        }
    }

    /// 转换为 JSON 字符串（二维整数数组）
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// 从 JSON 字符串解析
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::standard()
    }
}

impl From<Board> for Vec<Vec<Cell>> {
    fn from(board: Board) -> Self {
        board.rows()
    }
}

impl TryFrom<Vec<Vec<Cell>>> for Board {
    type Error = CheckersError;

    fn try_from(rows: Vec<Vec<Cell>>) -> Result<Self, Self::Error> {
        let size = rows.len();
        validate_board_size(size)?;

        let mut cells = Vec::with_capacity(size * size);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != size {
                return Err(CheckersError::MalformedBoard {
                    reason: format!("row {} has {} cells, expected {}", i, row.len(), size),
                });
            }
            cells.extend(row);
        }

        Ok(Self { size, cells })
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in self.cells.chunks(self.size) {
            let line: String = row.iter().map(Cell::to_char).collect();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// 完整的对局状态（棋盘、走子方、胜者）
///
/// 所有对棋盘的修改都必须经过 [`GameState::apply_move`]。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    board: Board,
    turn: Side,
    winner: Option<Side>,
}

impl GameState {
    /// 创建指定尺寸的新对局（红方先走）
    pub fn new(size: usize) -> Result<Self, CheckersError> {
        Ok(Self::from_board(Board::initial(size)?, Side::Red))
    }

    /// 默认尺寸的新对局
    pub fn initial() -> Self {
        Self::from_board(Board::standard(), Side::Red)
    }

    /// 从棋盘创建状态，胜负由棋子数重新计算
    pub fn from_board(board: Board, turn: Side) -> Self {
        let winner = board.check_winner();
        Self {
            board,
            turn,
            winner,
        }
    }

    /// 当前棋盘（只读）
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// 当前走子方
    pub fn turn(&self) -> Side {
        self.turn
    }

    /// 胜者
    pub fn winner(&self) -> Option<Side> {
        self.winner
    }

    /// 对局是否已结束
    pub fn is_over(&self) -> bool {
        self.winner.is_some()
    }

    /// 是否可以选中该位置的棋子
    pub fn can_select(&self, pos: Position) -> bool {
        Rules::can_select(self, pos)
    }

    /// 走法是否合法
    pub fn can_move(&self, from: Position, to: Position) -> bool {
        Rules::can_move(self, from, to)
    }

    /// 执行走法
    ///
    /// 失败时棋盘保持不变。成功后依次：移动棋子、移除被跳吃的棋子、升王、判定胜负；
    /// 未分胜负则交换走子方，已分胜负则走子方不变、对局结束。
    pub fn apply_move(&mut self, from: Position, to: Position) -> Result<Move, CheckersError> {
        if self.is_over() {
            return Err(CheckersError::GameOver);
        }
        for pos in [from, to] {
            if !self.board.contains(pos) {
                return Err(self.board.out_of_bounds(pos));
            }
        }

        let kind = Rules::classify(self, from, to)
            .ok_or(CheckersError::IllegalMove { from, to })?;

        let piece = self.board.take(from)?;
        self.board.set(to, piece)?;

        let captured = match kind {
            MoveKind::Jump { captured } => Some(self.board.take(captured)?),
            MoveKind::Step => None,
        };

        let crowned = self.board.crown_kings().contains(&to);

        self.winner = self.board.check_winner();
        if self.winner.is_none() {
            self.turn = self.turn.opponent();
        }

        Ok(Move {
            from,
            to,
            captured,
            crowned,
        })
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::initial()
    }
}
