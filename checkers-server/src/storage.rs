//! 对局存档
//!
//! 每个访问码对应一个 JSON 快照文件。

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use protocol::{GameSnapshot, Side};

/// 存储管理器
pub struct StorageManager {
    saves_dir: PathBuf,
}

impl StorageManager {
    /// 创建存储管理器，未指定目录时使用系统数据目录
    pub fn new(saves_dir: Option<PathBuf>) -> Result<Self> {
        let saves_dir = match saves_dir {
            Some(dir) => dir,
            None => default_saves_directory()?,
        };

        if !saves_dir.exists() {
            fs::create_dir_all(&saves_dir)
                .with_context(|| format!("无法创建存储目录: {:?}", saves_dir))?;
        }

        Ok(Self { saves_dir })
    }

    fn path_for(&self, access_code: &str) -> PathBuf {
        self.saves_dir
            .join(format!("{}.json", sanitize_filename(access_code)))
    }

    /// 保存快照（覆盖同一访问码的旧存档）
    pub fn save(&self, snapshot: &GameSnapshot) -> Result<PathBuf> {
        let filepath = self.path_for(&snapshot.access_code);
        let json = snapshot.to_json().context("序列化快照失败")?;

        fs::write(&filepath, json).with_context(|| format!("写入文件失败: {:?}", filepath))?;
        debug!("Saved game {} to {:?}", snapshot.access_code, filepath);

        Ok(filepath)
    }

    /// 加载快照，存档不存在返回 None，损坏返回错误
    pub fn load(&self, access_code: &str) -> Result<Option<GameSnapshot>> {
        let filepath = self.path_for(access_code);

        let content = match fs::read_to_string(&filepath) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("读取文件失败: {:?}", filepath));
            }
        };

        let snapshot = GameSnapshot::from_json(&content)
            .with_context(|| format!("解析快照失败: {:?}", filepath))?;
        Ok(Some(snapshot))
    }

    /// 列出所有存档（按保存时间倒序），跳过损坏的文件
    pub fn list(&self) -> Result<Vec<SavedGameInfo>> {
        let mut games = Vec::new();

        let entries = fs::read_dir(&self.saves_dir)
            .with_context(|| format!("读取存储目录失败: {:?}", self.saves_dir))?;

        for entry in entries {
            let entry = entry.context("读取目录项失败")?;
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            let Some(code) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            match self.load(code) {
                Ok(Some(snapshot)) => games.push(SavedGameInfo {
                    access_code: snapshot.access_code,
                    board_size: snapshot.board.size(),
                    winner: snapshot.winner,
                    saved_at: snapshot.saved_at,
                }),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable save {:?}: {:#}", path, e),
            }
        }

        games.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(games)
    }

    /// 获取存储目录路径
    pub fn saves_directory(&self) -> &Path {
        &self.saves_dir
    }
}

/// 存档信息
#[derive(Debug, Clone)]
pub struct SavedGameInfo {
    pub access_code: String,
    pub board_size: usize,
    pub winner: Option<Side>,
    pub saved_at: DateTime<Utc>,
}

/// 默认存储目录
fn default_saves_directory() -> Result<PathBuf> {
    let app_data_dir = dirs::data_dir().context("无法获取应用数据目录")?;
    Ok(app_data_dir.join("checkers").join("games"))
}

/// 清理文件名中的特殊字符
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{GameState, Position};
    use tempfile::TempDir;

    fn create_test_storage() -> (StorageManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = StorageManager::new(Some(temp_dir.path().to_path_buf())).unwrap();
        (storage, temp_dir)
    }

    #[test]
    fn test_save_and_load() {
        let (storage, _temp_dir) = create_test_storage();

        let mut state = GameState::initial();
        state
            .apply_move(Position::new(5, 1), Position::new(4, 2))
            .unwrap();
        let snapshot = GameSnapshot::capture("Game0001", &state);

        let path = storage.save(&snapshot).unwrap();
        assert!(path.ends_with("Game0001.json"));

        let loaded = storage.load("Game0001").unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.restore().unwrap(), state);
    }

    #[test]
    fn test_load_missing() {
        let (storage, _temp_dir) = create_test_storage();
        assert!(storage.load("Missing1").unwrap().is_none());
    }

    #[test]
    fn test_load_corrupt() {
        let (storage, temp_dir) = create_test_storage();
        fs::write(temp_dir.path().join("Broken01.json"), "{ not json").unwrap();

        assert!(storage.load("Broken01").is_err());
        // 列表跳过损坏的存档
        assert!(storage.list().unwrap().is_empty());
    }

    #[test]
    fn test_list_sorted_by_save_time() {
        let (storage, _temp_dir) = create_test_storage();

        for code in ["Game0001", "Game0002", "Game0003"] {
            storage
                .save(&GameSnapshot::capture(code, &GameState::initial()))
                .unwrap();
        }

        let games = storage.list().unwrap();
        assert_eq!(games.len(), 3);
        for pair in games.windows(2) {
            assert!(pair[0].saved_at >= pair[1].saved_at);
        }
        assert!(games.iter().all(|g| g.board_size == 8 && g.winner.is_none()));

        // 覆盖保存不产生重复条目
        storage
            .save(&GameSnapshot::capture("Game0002", &GameState::initial()))
            .unwrap();
        assert_eq!(storage.list().unwrap().len(), 3);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("abCD1234"), "abCD1234");
        assert_eq!(sanitize_filename("../etc/x"), "___etc_x");
    }

    #[test]
    fn test_creates_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        let storage = StorageManager::new(Some(nested.clone())).unwrap();
        assert_eq!(storage.saves_directory(), nested.as_path());
        assert!(nested.is_dir());
    }
}
