// 存储模块：封装 SQLite 持久化读写，提供患者、会话线程与消息的统一接口。

mod sqlite;

use crate::config::StorageConfig;
use anyhow::{anyhow, Result};
use std::sync::Arc;

pub use sqlite::SqliteStorage;

pub const ROLE_USER: &str = "user";
pub const ROLE_AGENT1: &str = "agent1";
pub const ROLE_AGENT2: &str = "agent2";

#[derive(Debug, Clone)]
pub struct PatientRecord {
    pub id: i64,
    pub name: String,
    pub age: Option<i64>,
    pub notes: Option<String>,
    pub created_at: f64,
    pub updated_at: f64,
}

#[derive(Debug, Clone)]
pub struct PatientUpsert {
    pub id: Option<i64>,
    pub name: String,
    pub age: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChatMessageRecord {
    pub id: i64,
    pub thread_id: i64,
    pub role: String,
    pub content: String,
    pub created_at: f64,
}

#[derive(Debug, Clone)]
pub struct ChatThreadRecord {
    pub id: i64,
    pub patient_id: i64,
    pub created_at: f64,
    pub updated_at: f64,
    pub messages: Vec<ChatMessageRecord>,
}

/// 一次聊天轮次落库后的完整结果：线程 id 与三条新消息。
#[derive(Debug, Clone)]
pub struct ChatTurnRecord {
    pub thread_id: i64,
    pub user: ChatMessageRecord,
    pub agent1: ChatMessageRecord,
    pub agent2: ChatMessageRecord,
}

/// 存储后端抽象，统一封装患者与聊天历史的持久化读写。
pub trait StorageBackend: Send + Sync {
    fn ensure_initialized(&self) -> Result<()>;

    fn list_patients(&self) -> Result<Vec<PatientRecord>>;
    fn get_patient(&self, patient_id: i64) -> Result<Option<PatientRecord>>;
    /// 带 id 时原地更新，id 不存在返回 None；不带 id 时新建。
    fn upsert_patient(&self, input: &PatientUpsert) -> Result<Option<PatientRecord>>;
    /// 显式级联删除：消息、线程、患者在同一事务内清理。
    fn delete_patient(&self, patient_id: i64) -> Result<i64>;

    /// 患者全部线程，按 updated_at 倒序；线程内消息按创建时间正序。
    fn list_patient_history(&self, patient_id: i64) -> Result<Vec<ChatThreadRecord>>;

    /// 在单个事务内完成：选取/新建最近活跃线程，依次写入
    /// user/agent1/agent2 三条消息并推进线程 updated_at。要么全部提交，要么全部回滚。
    fn append_chat_turn(
        &self,
        patient_id: i64,
        user_text: &str,
        agent1_text: &str,
        agent2_text: &str,
    ) -> Result<ChatTurnRecord>;
}

/// 构建存储后端，按配置选择实现，当前仅支持 SQLite。
pub fn build_storage(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>> {
    let backend = config.backend.trim().to_lowercase();
    let backend = if backend.is_empty() {
        "sqlite".to_string()
    } else {
        backend
    };
    match backend.as_str() {
        "sqlite" | "default" => Ok(Arc::new(SqliteStorage::new(
            config.db_path.trim().to_string(),
        ))),
        other => Err(anyhow!("未知存储后端: {other}")),
    }
}
