//! 服务器主逻辑
//!
//! [`ServerState`] 只由 hub 任务持有（见 [`crate::network`]），所有客户端消息在那里
//! 逐条串行处理，所以这里的处理函数都是同步的。

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

use protocol::{
    AccessCode, ClientMessage, Diagram, ErrorCode, GameInfo, GameSnapshot, PlayerId, Position,
    ProtocolError, RoomState, Seat, ServerMessage, SessionToken, Side, DEFAULT_BOARD_SIZE,
    RECONNECT_TIMEOUT,
};

use crate::config::ServerConfig;
use crate::player::{PlayerManager, PlayerStatus};
use crate::room::{is_valid_access_code, RoomManager};
use crate::storage::StorageManager;

/// 连接 ID（每个 TCP 连接唯一）
pub type ConnectionId = u64;

/// 服务器状态
pub struct ServerState {
    pub players: PlayerManager,
    pub rooms: RoomManager,
    /// 存档（禁用时为 None）
    pub storage: Option<StorageManager>,
    /// 连接 ID -> 消息发送通道
    pub connections: HashMap<ConnectionId, mpsc::Sender<ServerMessage>>,
    /// 断线玩家的超时时间
    pub disconnect_timeouts: HashMap<PlayerId, Instant>,
    /// 新对局的默认棋盘边长
    pub board_size: usize,
    /// 断线保留座位时间
    pub reconnect_timeout: Duration,
    /// 每步棋后自动保存
    pub autosave: bool,
}

impl ServerState {
    pub fn new(config: &ServerConfig) -> anyhow::Result<Self> {
        let storage = if config.storage.enabled {
            let storage = StorageManager::new(config.storage.saves_dir.clone())?;
            info!("Game saves in {:?}", storage.saves_directory());
            Some(storage)
        } else {
            None
        };

        Ok(Self {
            storage,
            board_size: config.board_size,
            reconnect_timeout: config.reconnect_timeout(),
            autosave: config.storage.autosave,
            ..Self::in_memory()
        })
    }

    /// 不带存档的状态
    pub fn in_memory() -> Self {
        Self {
            players: PlayerManager::new(),
            rooms: RoomManager::new(),
            storage: None,
            connections: HashMap::new(),
            disconnect_timeouts: HashMap::new(),
            board_size: DEFAULT_BOARD_SIZE,
            reconnect_timeout: RECONNECT_TIMEOUT,
            autosave: false,
        }
    }

    /// 登记新连接
    pub fn register_connection(&mut self, conn_id: ConnectionId, tx: mpsc::Sender<ServerMessage>) {
        self.connections.insert(conn_id, tx);
    }

    /// 发送消息给连接
    ///
    /// 不等待，通道已满时丢弃消息。
    pub fn send_to_connection(&self, conn_id: ConnectionId, msg: ServerMessage) {
        if let Some(tx) = self.connections.get(&conn_id) {
            match tx.try_send(msg) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!("Outbound queue full for connection {}, dropping message", conn_id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Connection {} already closed", conn_id);
                }
            }
        }
    }

    /// 发送消息给玩家（断线中的玩家收不到）
    pub fn send_to_player(&self, player_id: PlayerId, msg: ServerMessage) {
        if let Some(conn_id) = self.players.get(player_id).and_then(|p| p.connection) {
            self.send_to_connection(conn_id, msg);
        }
    }

    /// 广播消息给对局内所有成员（双方和观战者）
    pub fn broadcast_to_room(&self, access_code: &str, msg: ServerMessage) {
        if let Some(room) = self.rooms.get(access_code) {
            for player_id in room.members() {
                self.send_to_player(player_id, msg.clone());
            }
        }
    }

    /// 对局内当前在线的成员数
    pub fn connected_count(&self, access_code: &str) -> usize {
        self.rooms
            .get(access_code)
            .map(|room| {
                room.members()
                    .into_iter()
                    .filter(|&id| self.players.is_connected(id))
                    .count()
            })
            .unwrap_or(0)
    }

    /// 保存对局快照，失败只记录日志
    fn save_room(&self, access_code: &str) {
        let (Some(storage), Some(room)) = (&self.storage, self.rooms.get(access_code)) else {
            return;
        };

        let snapshot = GameSnapshot::capture(access_code, &room.game);
        if let Err(e) = storage.save(&snapshot) {
            error!("Failed to save game {}: {:#}", access_code, e);
        }
    }

    /// 从存档恢复对局
    fn restore_room(&mut self, access_code: &str) -> Result<(), ServerMessage> {
        let not_found = || ServerMessage::error(ErrorCode::GameNotFound, "对局不存在");

        if !is_valid_access_code(access_code) {
            return Err(not_found());
        }
        let Some(storage) = &self.storage else {
            return Err(not_found());
        };

        let snapshot = match storage.load(access_code) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return Err(not_found()),
            Err(e) => {
                warn!("Failed to load game {}: {:#}", access_code, e);
                return Err(ServerMessage::error(ErrorCode::CorruptSave, "存档损坏"));
            }
        };

        if snapshot.access_code != access_code {
            warn!(
                "Save for {} carries access code {}",
                access_code, snapshot.access_code
            );
            return Err(ServerMessage::error(ErrorCode::CorruptSave, "存档损坏"));
        }

        let game = snapshot.restore().map_err(|e| {
            warn!("Rejected save {}: {}", access_code, e);
            ServerMessage::from(e)
        })?;

        info!("Restored game {} from storage", access_code);
        self.rooms.restore(access_code.to_string(), game);
        Ok(())
    }
}

/// 待发送的消息（按加入顺序发送）
enum Outgoing {
    ToPlayer(PlayerId, ServerMessage),
    ToRoom(AccessCode, ServerMessage),
    /// 在发送时统计在线人数并广播 ConnectCount
    ConnectCount(AccessCode),
}

/// 待发送的消息
struct PendingMessages {
    queue: Vec<Outgoing>,
}

impl PendingMessages {
    fn new() -> Self {
        Self { queue: Vec::new() }
    }

    fn send(&mut self, player_id: PlayerId, msg: ServerMessage) {
        self.queue.push(Outgoing::ToPlayer(player_id, msg));
    }

    fn broadcast(&mut self, access_code: &str, msg: ServerMessage) {
        self.queue
            .push(Outgoing::ToRoom(access_code.to_string(), msg));
    }

    fn connect_count(&mut self, access_code: &str) {
        self.queue
            .push(Outgoing::ConnectCount(access_code.to_string()));
    }

    fn flush(self, state: &ServerState) {
        for outgoing in self.queue {
            match outgoing {
                Outgoing::ToPlayer(player_id, msg) => state.send_to_player(player_id, msg),
                Outgoing::ToRoom(code, msg) => state.broadcast_to_room(&code, msg),
                Outgoing::ConnectCount(code) => {
                    let count = state.connected_count(&code);
                    state.broadcast_to_room(&code, ServerMessage::ConnectCount { count });
                }
            }
        }
    }
}

/// 消息处理器
pub struct MessageHandler;

impl MessageHandler {
    /// 处理客户端消息
    ///
    /// 直接回复会先于其它通知发给该连接；返回值即该回复。
    pub fn handle(
        state: &mut ServerState,
        conn_id: ConnectionId,
        msg: ClientMessage,
    ) -> Option<ServerMessage> {
        let mut pending = PendingMessages::new();
        let player_id = state.players.find_by_connection(conn_id);

        let result = match (msg, player_id) {
            (ClientMessage::Ping, _) => Some(ServerMessage::Pong),
            (ClientMessage::ListGames, _) => Self::handle_list_games(state),
            (ClientMessage::Login { nickname }, None) => {
                Self::handle_login(state, conn_id, nickname)
            }
            (
                ClientMessage::Reconnect {
                    player_id,
                    token,
                    access_code,
                },
                None,
            ) => Self::handle_reconnect(
                state,
                &mut pending,
                conn_id,
                player_id,
                token,
                access_code,
            ),
            (ClientMessage::Login { .. } | ClientMessage::Reconnect { .. }, Some(_)) => Some(
                ServerMessage::error(ErrorCode::AlreadyLoggedIn, "已登录"),
            ),
            (_, None) => Some(ServerMessage::error(ErrorCode::NotLoggedIn, "请先登录")),
            (
                ClientMessage::CreateGame {
                    board_size,
                    preferred_side,
                },
                Some(player_id),
            ) => Self::handle_create_game(state, &mut pending, player_id, board_size, preferred_side),
            (ClientMessage::JoinGame { access_code }, Some(player_id)) => {
                Self::handle_join_game(state, &mut pending, player_id, access_code)
            }
            (ClientMessage::LeaveGame, Some(player_id)) => {
                Self::handle_leave_game(state, &mut pending, player_id)
            }
            (ClientMessage::MakeMove { from, to }, Some(player_id)) => {
                Self::handle_make_move(state, &mut pending, player_id, from, to)
            }
            (ClientMessage::RequestState, Some(player_id)) => {
                Self::handle_request_state(state, player_id)
            }
        };

        if let Some(reply) = &result {
            state.send_to_connection(conn_id, reply.clone());
        }
        pending.flush(state);

        result
    }

    /// 玩家当前所在对局（断线中的不算）
    fn current_game(state: &ServerState, player_id: PlayerId) -> Result<AccessCode, ServerMessage> {
        match state.players.get(player_id).map(|p| &p.status) {
            Some(PlayerStatus::InGame(code)) => Ok(code.clone()),
            _ => Err(ServerMessage::error(ErrorCode::NotInGame, "不在对局中")),
        }
    }

    fn ensure_not_in_game(state: &ServerState, player_id: PlayerId) -> Result<(), ServerMessage> {
        match state.players.get(player_id).map(|p| &p.status) {
            Some(PlayerStatus::Online) => Ok(()),
            Some(_) => Err(ServerMessage::error(ErrorCode::AlreadyInGame, "已在对局中")),
            None => Err(ServerMessage::error(ErrorCode::PlayerNotFound, "玩家不存在")),
        }
    }

    fn nickname(state: &ServerState, player_id: Option<PlayerId>) -> Option<String> {
        player_id.and_then(|id| state.players.get_nickname(id).map(|s| s.to_string()))
    }

    /// 处理登录
    fn handle_login(
        state: &mut ServerState,
        conn_id: ConnectionId,
        nickname: String,
    ) -> Option<ServerMessage> {
        match state.players.login(nickname, conn_id) {
            Ok(player_id) => {
                info!(
                    "Player {} logged in on connection {} ({} online)",
                    player_id,
                    conn_id,
                    state.players.online_count()
                );
                let token = state.players.get(player_id)?.token;
                Some(ServerMessage::LoginSuccess { player_id, token })
            }
            Err(e @ ProtocolError::NicknameOccupied) => Some(ServerMessage::error(
                ErrorCode::NicknameOccupied,
                e.to_string(),
            )),
            Err(e) => Some(ServerMessage::error(
                ErrorCode::InvalidNickname,
                e.to_string(),
            )),
        }
    }

    /// 处理重连
    fn handle_reconnect(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        conn_id: ConnectionId,
        player_id: PlayerId,
        token: SessionToken,
        access_code: AccessCode,
    ) -> Option<ServerMessage> {
        let status = match state.players.get(player_id) {
            Some(player) if player.token == token => player.status.clone(),
            _ => {
                return Some(ServerMessage::error(ErrorCode::PlayerNotFound, "玩家不存在"));
            }
        };

        if status != PlayerStatus::Disconnected(access_code.clone()) {
            return Some(ServerMessage::error(ErrorCode::NotInGame, "不在该对局中"));
        }

        let (seat, game, opponent_id) = match state.rooms.get(&access_code) {
            Some(room) => (
                room.seat_of(player_id)?,
                room.game.clone(),
                room.get_opponent_id(player_id),
            ),
            None => {
                return Some(ServerMessage::error(ErrorCode::GameNotFound, "对局不存在"));
            }
        };

        state.players.reconnect(player_id, token, conn_id);
        state.disconnect_timeouts.remove(&player_id);
        info!("Player {} reconnected to game {}", player_id, access_code);

        if let Some(opponent_id) = opponent_id {
            pending.send(opponent_id, ServerMessage::OpponentReconnected);
        }
        pending.connect_count(&access_code);

        Some(ServerMessage::ReconnectSuccess {
            access_code,
            seat,
            state: game,
        })
    }

    /// 处理创建对局
    fn handle_create_game(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        player_id: PlayerId,
        board_size: Option<usize>,
        preferred_side: Option<Side>,
    ) -> Option<ServerMessage> {
        if let Err(reply) = Self::ensure_not_in_game(state, player_id) {
            return Some(reply);
        }

        let size = board_size.unwrap_or(state.board_size);
        let access_code = match state.rooms.create(size) {
            Ok(code) => code,
            Err(e) => return Some(e.into()),
        };

        let room = state.rooms.get_mut(&access_code)?;
        let your_side = room.add_player(player_id, preferred_side)?;
        let game = room.game.clone();

        state
            .players
            .set_status(player_id, PlayerStatus::InGame(access_code.clone()));
        state.save_room(&access_code);
        info!(
            "Player {} created game {} ({}x{}, {} rooms open)",
            player_id,
            access_code,
            size,
            size,
            state.rooms.count()
        );

        pending.connect_count(&access_code);

        Some(ServerMessage::GameCreated {
            access_code,
            your_side,
            state: game,
        })
    }

    /// 处理加入对局
    fn handle_join_game(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        player_id: PlayerId,
        access_code: AccessCode,
    ) -> Option<ServerMessage> {
        if let Err(reply) = Self::ensure_not_in_game(state, player_id) {
            return Some(reply);
        }

        if !state.rooms.contains(&access_code) {
            if let Err(reply) = state.restore_room(&access_code) {
                return Some(reply);
            }
        }

        let room = state.rooms.get_mut(&access_code)?;
        let seat = room.join(player_id);
        let started = room.try_start();
        let game = room.game.clone();
        let opponent_id = room.get_opponent_id(player_id);
        let (red_id, black_id) = (room.red_player, room.black_player);

        state
            .players
            .set_status(player_id, PlayerStatus::InGame(access_code.clone()));
        info!("Player {} joined game {} as {:?}", player_id, access_code, seat);

        if let Some(opponent_id) = opponent_id {
            let nickname = Self::nickname(state, Some(player_id)).unwrap_or_default();
            pending.send(opponent_id, ServerMessage::OpponentJoined { nickname });
        }
        pending.connect_count(&access_code);

        if started {
            pending.broadcast(
                &access_code,
                ServerMessage::GameStarted {
                    state: game.clone(),
                    red_player: Self::nickname(state, red_id).unwrap_or_default(),
                    black_player: Self::nickname(state, black_id).unwrap_or_default(),
                },
            );
        }

        Some(ServerMessage::GameJoined {
            access_code,
            seat,
            state: game,
        })
    }

    /// 处理离开对局
    fn handle_leave_game(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        player_id: PlayerId,
    ) -> Option<ServerMessage> {
        let access_code = match Self::current_game(state, player_id) {
            Ok(code) => code,
            Err(reply) => return Some(reply),
        };

        state.players.set_status(player_id, PlayerStatus::Online);
        Self::vacate(state, pending, player_id, &access_code);
        info!("Player {} left game {}", player_id, access_code);

        None
    }

    /// 将玩家移出房间，房间空了则销毁（存档保留）
    fn vacate(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        player_id: PlayerId,
        access_code: &str,
    ) {
        let Some(room) = state.rooms.get_mut(access_code) else {
            return;
        };
        room.remove_member(player_id);

        if room.is_empty() {
            state.rooms.remove(access_code);
            debug!("Game {} closed", access_code);
        } else {
            pending.connect_count(access_code);
        }
    }

    /// 处理对局列表：内存中等待对手的房间，加上未加载的未完结存档
    fn handle_list_games(state: &ServerState) -> Option<ServerMessage> {
        let mut games: Vec<GameInfo> = state
            .rooms
            .list_joinable()
            .iter()
            .map(|r| {
                r.info(
                    Self::nickname(state, r.red_player),
                    Self::nickname(state, r.black_player),
                )
            })
            .collect();

        if let Some(storage) = &state.storage {
            match storage.list() {
                Ok(saved) => games.extend(
                    saved
                        .into_iter()
                        .filter(|g| g.winner.is_none() && !state.rooms.contains(&g.access_code))
                        .map(|g| GameInfo {
                            access_code: g.access_code,
                            board_size: g.board_size,
                            red_player: None,
                            black_player: None,
                            spectators: 0,
                            state: RoomState::Waiting,
                        }),
                ),
                Err(e) => warn!("Failed to list saved games: {:#}", e),
            }
        }

        Some(ServerMessage::GameList { games })
    }

    /// 处理走棋
    fn handle_make_move(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        player_id: PlayerId,
        from: Position,
        to: Position,
    ) -> Option<ServerMessage> {
        let access_code = match Self::current_game(state, player_id) {
            Ok(code) => code,
            Err(reply) => return Some(reply),
        };
        let Some(room) = state.rooms.get_mut(&access_code) else {
            return Some(ServerMessage::error(ErrorCode::GameNotFound, "对局不存在"));
        };

        let side = match room.seat_of(player_id) {
            Some(Seat::Player(side)) => side,
            Some(Seat::Spectator) => {
                return Some(ServerMessage::error(ErrorCode::NotAPlayer, "观战者不能走棋"));
            }
            None => return Some(ServerMessage::error(ErrorCode::NotInGame, "不在对局中")),
        };

        match room.state {
            RoomState::Playing => {}
            RoomState::Waiting => {
                return Some(ServerMessage::error(ErrorCode::GameNotStarted, "对局未开始"));
            }
            RoomState::Finished => {
                return Some(ServerMessage::error(ErrorCode::GameAlreadyOver, "对局已结束"));
            }
        }

        if room.game.turn() != side {
            return Some(ServerMessage::error(ErrorCode::NotYourTurn, "不是你的回合"));
        }

        let mv = match room.make_move(from, to) {
            Ok(mv) => mv,
            Err(e) => {
                debug!("Rejected move {} -> {} in {}: {}", from, to, access_code, e);
                return Some(e.into());
            }
        };
        let game = room.game.clone();
        debug!(
            "Game {}: {} played {} -> {}",
            access_code,
            side,
            mv,
            Diagram::to_string(&game)
        );

        // 先落盘再广播
        if state.autosave {
            state.save_room(&access_code);
        }

        pending.broadcast(
            &access_code,
            ServerMessage::MoveMade {
                from: mv.from,
                to: mv.to,
                captured: mv.captured_at(),
                crowned: mv.crowned,
                state: game.clone(),
            },
        );

        if game.is_over() {
            info!(
                "Game {} over, winner: {:?}, final board {}",
                access_code,
                game.winner(),
                Diagram::board_to_string(game.board())
            );
            pending.broadcast(
                &access_code,
                ServerMessage::GameOver {
                    winner: game.winner(),
                },
            );
        }

        None
    }

    /// 处理状态请求
    fn handle_request_state(state: &ServerState, player_id: PlayerId) -> Option<ServerMessage> {
        let access_code = match Self::current_game(state, player_id) {
            Ok(code) => code,
            Err(reply) => return Some(reply),
        };

        let room = state.rooms.get(&access_code)?;
        Some(ServerMessage::StateSnapshot {
            state: room.game.clone(),
        })
    }

    /// 处理连接断开
    pub fn handle_disconnect(state: &mut ServerState, conn_id: ConnectionId) {
        let mut pending = PendingMessages::new();
        state.connections.remove(&conn_id);

        let Some(player_id) = state.players.find_by_connection(conn_id) else {
            debug!("Connection {} closed before login", conn_id);
            return;
        };

        match state.players.disconnect(player_id) {
            Some(access_code) => {
                state
                    .disconnect_timeouts
                    .insert(player_id, Instant::now() + state.reconnect_timeout);
                info!(
                    "Player {} disconnected from game {}, holding seat for {:?}",
                    player_id, access_code, state.reconnect_timeout
                );

                if let Some(opponent_id) = state
                    .rooms
                    .get(&access_code)
                    .and_then(|room| room.get_opponent_id(player_id))
                {
                    pending.send(
                        opponent_id,
                        ServerMessage::OpponentDisconnected {
                            timeout_secs: state.reconnect_timeout.as_secs() as u32,
                        },
                    );
                }
                pending.connect_count(&access_code);
            }
            None => {
                state.players.remove(player_id);
                info!("Player {} logged out", player_id);
            }
        }

        pending.flush(state);
    }

    /// 检查断线超时：超时玩家让出座位并被移除
    pub fn check_disconnect_timeouts(state: &mut ServerState) {
        let now = Instant::now();
        let timed_out: Vec<PlayerId> = state
            .disconnect_timeouts
            .iter()
            .filter(|&(_, &deadline)| now >= deadline)
            .map(|(&player_id, _)| player_id)
            .collect();

        if timed_out.is_empty() {
            return;
        }

        let mut pending = PendingMessages::new();

        for player_id in timed_out {
            state.disconnect_timeouts.remove(&player_id);

            let access_code = state
                .players
                .get(player_id)
                .and_then(|p| p.access_code().map(|s| s.to_string()));
            if let Some(access_code) = access_code {
                Self::vacate(state, &mut pending, player_id, &access_code);
                info!(
                    "Player {} did not reconnect, seat in {} released",
                    player_id, access_code
                );
            }

            state.players.remove(player_id);
        }

        pending.flush(state);
    }
}
