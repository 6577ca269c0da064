//! 玩家管理

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use protocol::{AccessCode, PlayerId, ProtocolError, SessionToken, MAX_NICKNAME_LEN};

use crate::server::ConnectionId;

/// 玩家状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerStatus {
    /// 在线，未加入对局
    Online,
    /// 在线，在对局中（执子或观战）
    InGame(AccessCode),
    /// 断线中（保留座位等待重连）
    Disconnected(AccessCode),
}

/// 玩家信息
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub nickname: String,
    /// 重连凭证，只发给本人
    pub token: SessionToken,
    pub status: PlayerStatus,
    /// 当前绑定的连接，断线时为 None
    pub connection: Option<ConnectionId>,
}

impl Player {
    pub fn new(id: PlayerId, nickname: String, connection: ConnectionId) -> Self {
        Self {
            id,
            nickname,
            token: rand::random(),
            status: PlayerStatus::Online,
            connection: Some(connection),
        }
    }

    /// 所在对局的访问码（包括断线中的）
    pub fn access_code(&self) -> Option<&str> {
        match &self.status {
            PlayerStatus::InGame(code) | PlayerStatus::Disconnected(code) => Some(code),
            PlayerStatus::Online => None,
        }
    }
}

/// 玩家管理器
pub struct PlayerManager {
    /// 玩家 ID -> 玩家信息
    players: HashMap<PlayerId, Player>,
    /// 昵称 -> 玩家 ID（用于昵称唯一性检查）
    nickname_to_id: HashMap<String, PlayerId>,
    /// 连接 -> 玩家 ID
    connection_to_id: HashMap<ConnectionId, PlayerId>,
    /// ID 生成器
    next_id: AtomicU64,
}

impl PlayerManager {
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
            nickname_to_id: HashMap::new(),
            connection_to_id: HashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn generate_id(&self) -> PlayerId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// 验证昵称
    pub fn validate_nickname(nickname: &str) -> Result<(), ProtocolError> {
        let len = nickname.trim().chars().count();
        if len == 0 {
            return Err(ProtocolError::NicknameEmpty);
        }
        if len > MAX_NICKNAME_LEN {
            return Err(ProtocolError::NicknameTooLong {
                len,
                max: MAX_NICKNAME_LEN,
            });
        }
        Ok(())
    }

    /// 登录玩家并绑定连接
    pub fn login(
        &mut self,
        nickname: String,
        connection: ConnectionId,
    ) -> Result<PlayerId, ProtocolError> {
        Self::validate_nickname(&nickname)?;
        let nickname = nickname.trim().to_string();

        if self.nickname_to_id.contains_key(&nickname) {
            return Err(ProtocolError::NicknameOccupied);
        }

        let id = self.generate_id();
        self.players
            .insert(id, Player::new(id, nickname.clone(), connection));
        self.nickname_to_id.insert(nickname, id);
        self.connection_to_id.insert(connection, id);

        Ok(id)
    }

    /// 连接断开：在对局中的玩家进入断线状态并返回访问码
    pub fn disconnect(&mut self, player_id: PlayerId) -> Option<AccessCode> {
        let player = self.players.get_mut(&player_id)?;
        if let Some(conn) = player.connection.take() {
            self.connection_to_id.remove(&conn);
        }

        match &player.status {
            PlayerStatus::InGame(code) => {
                let code = code.clone();
                player.status = PlayerStatus::Disconnected(code.clone());
                Some(code)
            }
            _ => None,
        }
    }

    /// 断线玩家用新连接重连，令牌不符或不在断线状态返回 None
    pub fn reconnect(
        &mut self,
        player_id: PlayerId,
        token: SessionToken,
        connection: ConnectionId,
    ) -> Option<AccessCode> {
        let player = self.players.get_mut(&player_id)?;
        if player.token != token {
            return None;
        }
        match &player.status {
            PlayerStatus::Disconnected(code) => {
                let code = code.clone();
                player.status = PlayerStatus::InGame(code.clone());
                player.connection = Some(connection);
                self.connection_to_id.insert(connection, player_id);
                Some(code)
            }
            _ => None,
        }
    }

    /// 移除玩家（彻底离线）
    pub fn remove(&mut self, player_id: PlayerId) -> Option<Player> {
        let player = self.players.remove(&player_id)?;
        self.nickname_to_id.remove(&player.nickname);
        if let Some(conn) = player.connection {
            self.connection_to_id.remove(&conn);
        }
        Some(player)
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.get(&player_id)
    }

    /// 根据连接查找玩家
    pub fn find_by_connection(&self, connection: ConnectionId) -> Option<PlayerId> {
        self.connection_to_id.get(&connection).copied()
    }

    /// 设置玩家状态
    pub fn set_status(&mut self, player_id: PlayerId, status: PlayerStatus) {
        if let Some(player) = self.players.get_mut(&player_id) {
            player.status = status;
        }
    }

    pub fn get_nickname(&self, player_id: PlayerId) -> Option<&str> {
        self.players.get(&player_id).map(|p| p.nickname.as_str())
    }

    /// 玩家当前是否有活动连接
    pub fn is_connected(&self, player_id: PlayerId) -> bool {
        self.players
            .get(&player_id)
            .is_some_and(|p| p.connection.is_some())
    }

    pub fn online_count(&self) -> usize {
        self.players.len()
    }
}

impl Default for PlayerManager {
    fn default() -> Self {
        Self::new()
    }
}
