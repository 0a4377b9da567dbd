// API 请求与响应结构定义。
use crate::storage::{ChatMessageRecord, ChatThreadRecord, ChatTurnRecord, PatientRecord};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct PatientUpsertRequest {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientPayload {
    pub id: i64,
    pub name: String,
    pub age: Option<i64>,
    pub notes: Option<String>,
    pub created_at: f64,
    pub updated_at: f64,
}

impl From<&PatientRecord> for PatientPayload {
    fn from(record: &PatientRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            age: record.age,
            notes: record.notes.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessagePayload {
    pub id: i64,
    pub role: String,
    pub content: String,
    pub created_at: f64,
}

impl From<&ChatMessageRecord> for ChatMessagePayload {
    fn from(record: &ChatMessageRecord) -> Self {
        Self {
            id: record.id,
            role: record.role.clone(),
            content: record.content.clone(),
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatThreadPayload {
    pub id: i64,
    pub patient_id: i64,
    pub created_at: f64,
    pub updated_at: f64,
    pub messages: Vec<ChatMessagePayload>,
}

impl From<&ChatThreadRecord> for ChatThreadPayload {
    fn from(record: &ChatThreadRecord) -> Self {
        Self {
            id: record.id,
            patient_id: record.patient_id,
            created_at: record.created_at,
            updated_at: record.updated_at,
            messages: record.messages.iter().map(ChatMessagePayload::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendChatRequest {
    // 兼容旧前端的 camelCase 字段名。
    #[serde(alias = "patientId")]
    pub patient_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendChatResponse {
    pub thread_id: i64,
    pub user: ChatMessagePayload,
    pub agent1: ChatMessagePayload,
    pub agent2: ChatMessagePayload,
}

impl From<&ChatTurnRecord> for SendChatResponse {
    fn from(record: &ChatTurnRecord) -> Self {
        Self {
            thread_id: record.thread_id,
            user: ChatMessagePayload::from(&record.user),
            agent1: ChatMessagePayload::from(&record.agent1),
            agent2: ChatMessagePayload::from(&record.agent2),
        }
    }
}
