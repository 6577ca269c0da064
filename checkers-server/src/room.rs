//! 对局房间
//!
//! 每个房间由访问码标识，包含两个座位、若干观战者和一份 [`GameState`]。

use std::collections::HashMap;
use std::time::Instant;

use rand::distributions::Alphanumeric;
use rand::Rng;

use protocol::{
    AccessCode, CheckersError, GameInfo, GameState, Move, PlayerId, Position, RoomState, Seat,
    Side, ACCESS_CODE_LEN,
};

/// 房间
pub struct Room {
    pub access_code: AccessCode,
    pub state: RoomState,
    /// 红方玩家 ID
    pub red_player: Option<PlayerId>,
    /// 黑方玩家 ID
    pub black_player: Option<PlayerId>,
    /// 观战者
    pub spectators: Vec<PlayerId>,
    /// 对局状态
    pub game: GameState,
    /// 创建时间
    pub created_at: Instant,
}

impl Room {
    /// 创建新房间（开局棋盘）
    pub fn new(access_code: AccessCode, game: GameState) -> Self {
        let state = if game.is_over() {
            RoomState::Finished
        } else {
            RoomState::Waiting
        };

        Self {
            access_code,
            state,
            red_player: None,
            black_player: None,
            spectators: Vec::new(),
            game,
            created_at: Instant::now(),
        }
    }

    /// 获取房间信息（用于列表展示）
    pub fn info(&self, red_name: Option<String>, black_name: Option<String>) -> GameInfo {
        GameInfo {
            access_code: self.access_code.clone(),
            board_size: self.game.board().size(),
            red_player: red_name,
            black_player: black_name,
            spectators: self.spectators.len(),
            state: self.state,
        }
    }

    /// 两个座位是否都有人
    pub fn is_full(&self) -> bool {
        self.red_player.is_some() && self.black_player.is_some()
    }

    /// 房间内是否没有任何成员
    pub fn is_empty(&self) -> bool {
        self.red_player.is_none() && self.black_player.is_none() && self.spectators.is_empty()
    }

    /// 玩家的座位
    pub fn seat_of(&self, player_id: PlayerId) -> Option<Seat> {
        if self.red_player == Some(player_id) {
            Some(Seat::Player(Side::Red))
        } else if self.black_player == Some(player_id) {
            Some(Seat::Player(Side::Black))
        } else if self.spectators.contains(&player_id) {
            Some(Seat::Spectator)
        } else {
            None
        }
    }

    pub fn is_member(&self, player_id: PlayerId) -> bool {
        self.seat_of(player_id).is_some()
    }

    /// 获取指定阵营的玩家 ID
    pub fn get_player_id(&self, side: Side) -> Option<PlayerId> {
        match side {
            Side::Red => self.red_player,
            Side::Black => self.black_player,
        }
    }

    /// 获取对手 ID（观战者没有对手）
    pub fn get_opponent_id(&self, player_id: PlayerId) -> Option<PlayerId> {
        match self.seat_of(player_id)? {
            Seat::Player(side) => self.get_player_id(side.opponent()),
            Seat::Spectator => None,
        }
    }

    /// 所有成员（座位在前，观战者在后）
    pub fn members(&self) -> Vec<PlayerId> {
        self.red_player
            .into_iter()
            .chain(self.black_player)
            .chain(self.spectators.iter().copied())
            .collect()
    }

    /// 让玩家坐下，优先使用偏好的阵营；座位已满返回 None
    pub fn add_player(&mut self, player_id: PlayerId, preferred_side: Option<Side>) -> Option<Side> {
        if let Some(side) = preferred_side {
            if self.get_player_id(side).is_none() {
                self.set_seat(side, Some(player_id));
                return Some(side);
            }
        }

        let side = [Side::Red, Side::Black]
            .into_iter()
            .find(|&side| self.get_player_id(side).is_none())?;
        self.set_seat(side, Some(player_id));
        Some(side)
    }

    fn set_seat(&mut self, side: Side, player_id: Option<PlayerId>) {
        match side {
            Side::Red => self.red_player = player_id,
            Side::Black => self.black_player = player_id,
        }
    }

    /// 加入房间：有空座位则坐下，否则观战
    pub fn join(&mut self, player_id: PlayerId) -> Seat {
        if let Some(seat) = self.seat_of(player_id) {
            return seat;
        }

        match self.add_player(player_id, None) {
            Some(side) => Seat::Player(side),
            None => {
                self.spectators.push(player_id);
                Seat::Spectator
            }
        }
    }

    /// 移除成员；对局进行中空出座位时回到等待状态
    pub fn remove_member(&mut self, player_id: PlayerId) -> Option<Seat> {
        let seat = self.seat_of(player_id)?;
        match seat {
            Seat::Player(side) => {
                self.set_seat(side, None);
                if self.state == RoomState::Playing {
                    self.state = RoomState::Waiting;
                }
            }
            Seat::Spectator => self.spectators.retain(|&id| id != player_id),
        }
        Some(seat)
    }

    /// 双方就座后开始（或继续）对局，返回是否状态发生变化
    pub fn try_start(&mut self) -> bool {
        if self.state == RoomState::Waiting && self.is_full() && !self.game.is_over() {
            self.state = RoomState::Playing;
            true
        } else {
            false
        }
    }

    /// 执行走棋，分出胜负后房间进入结束状态
    pub fn make_move(&mut self, from: Position, to: Position) -> Result<Move, CheckersError> {
        let mv = self.game.apply_move(from, to)?;
        if self.game.is_over() {
            self.state = RoomState::Finished;
        }
        Ok(mv)
    }
}

/// 生成随机访问码
pub fn generate_access_code() -> AccessCode {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ACCESS_CODE_LEN)
        .map(char::from)
        .collect()
}

/// 访问码格式检查（也保证可以安全地用作文件名）
pub fn is_valid_access_code(code: &str) -> bool {
    code.len() == ACCESS_CODE_LEN && code.chars().all(|c| c.is_ascii_alphanumeric())
}

/// 房间管理器
pub struct RoomManager {
    rooms: HashMap<AccessCode, Room>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
        }
    }

    /// 创建指定尺寸的新房间，返回访问码
    pub fn create(&mut self, board_size: usize) -> Result<AccessCode, CheckersError> {
        let game = GameState::new(board_size)?;

        let mut code = generate_access_code();
        while self.rooms.contains_key(&code) {
            code = generate_access_code();
        }

        self.rooms.insert(code.clone(), Room::new(code.clone(), game));
        Ok(code)
    }

    /// 放入已有对局（从存档恢复）
    pub fn restore(&mut self, access_code: AccessCode, game: GameState) -> &mut Room {
        self.rooms
            .entry(access_code.clone())
            .or_insert_with(|| Room::new(access_code, game))
    }

    pub fn get(&self, access_code: &str) -> Option<&Room> {
        self.rooms.get(access_code)
    }

    pub fn get_mut(&mut self, access_code: &str) -> Option<&mut Room> {
        self.rooms.get_mut(access_code)
    }

    pub fn contains(&self, access_code: &str) -> bool {
        self.rooms.contains_key(access_code)
    }

    pub fn remove(&mut self, access_code: &str) -> Option<Room> {
        self.rooms.remove(access_code)
    }

    /// 获取可加入的房间列表（等待对手的房间，按创建时间排序）
    pub fn list_joinable(&self) -> Vec<&Room> {
        let mut rooms: Vec<&Room> = self
            .rooms
            .values()
            .filter(|r| r.state == RoomState::Waiting)
            .collect();
        rooms.sort_by_key(|r| r.created_at);
        rooms
    }

    pub fn count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}
