// SQLite 存储实现：患者、线程与消息三张表，写路径全部走事务。
use crate::storage::{
    ChatMessageRecord, ChatThreadRecord, ChatTurnRecord, PatientRecord, PatientUpsert,
    StorageBackend, ROLE_AGENT1, ROLE_AGENT2, ROLE_USER,
};
use anyhow::Result;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct SqliteStorage {
    db_path: PathBuf,
    initialized: AtomicBool,
    init_guard: Mutex<()>,
}

impl SqliteStorage {
    pub fn new(db_path: String) -> Self {
        let path = if db_path.trim().is_empty() {
            PathBuf::from("./data/medichat.db")
        } else {
            PathBuf::from(db_path)
        };
        Self {
            db_path: path,
            initialized: AtomicBool::new(false),
            init_guard: Mutex::new(()),
        }
    }

    fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn open(&self) -> Result<Connection> {
        self.ensure_db_dir()?;
        let conn = Connection::open(&self.db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        // 级联删除依赖外键约束，每个连接都要显式开启。
        conn.pragma_update(None, "foreign_keys", "ON").ok();
        Ok(conn)
    }

    fn now_ts() -> f64 {
        Utc::now().timestamp_millis() as f64 / 1000.0
    }

    fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<PatientRecord> {
        Ok(PatientRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            age: row.get(2)?,
            notes: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn message_from_row(row: &Row<'_>) -> rusqlite::Result<ChatMessageRecord> {
        Ok(ChatMessageRecord {
            id: row.get(0)?,
            thread_id: row.get(1)?,
            role: row.get(2)?,
            content: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn fetch_patient(conn: &Connection, patient_id: i64) -> Result<Option<PatientRecord>> {
        let record = conn
            .query_row(
                "SELECT id, name, age, notes, created_at, updated_at FROM patients WHERE id = ?",
                params![patient_id],
                Self::patient_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn insert_message(
        tx: &Transaction<'_>,
        thread_id: i64,
        role: &str,
        content: &str,
        now: f64,
    ) -> Result<ChatMessageRecord> {
        tx.execute(
            "INSERT INTO chat_messages (thread_id, role, content, created_at) VALUES (?, ?, ?, ?)",
            params![thread_id, role, content, now],
        )?;
        Ok(ChatMessageRecord {
            id: tx.last_insert_rowid(),
            thread_id,
            role: role.to_string(),
            content: content.to_string(),
            created_at: now,
        })
    }
}

impl StorageBackend for SqliteStorage {
    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }
        let _guard = self.init_guard.lock();
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }
        let conn = self.open()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS patients (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              name TEXT NOT NULL,
              age INTEGER,
              notes TEXT,
              created_at REAL NOT NULL,
              updated_at REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_patients_created
              ON patients (created_at);
            CREATE TABLE IF NOT EXISTS chat_threads (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              patient_id INTEGER NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
              created_at REAL NOT NULL,
              updated_at REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_chat_threads_patient
              ON chat_threads (patient_id, updated_at);
            CREATE TABLE IF NOT EXISTS chat_messages (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              thread_id INTEGER NOT NULL REFERENCES chat_threads(id) ON DELETE CASCADE,
              role TEXT NOT NULL,
              content TEXT NOT NULL,
              created_at REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_chat_messages_thread
              ON chat_messages (thread_id, created_at, id);
            "#,
        )?;
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn list_patients(&self) -> Result<Vec<PatientRecord>> {
        self.ensure_initialized()?;
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, age, notes, created_at, updated_at FROM patients
             ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map([], Self::patient_from_row)?;
        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?);
        }
        Ok(patients)
    }

    fn get_patient(&self, patient_id: i64) -> Result<Option<PatientRecord>> {
        self.ensure_initialized()?;
        let conn = self.open()?;
        Self::fetch_patient(&conn, patient_id)
    }

    fn upsert_patient(&self, input: &PatientUpsert) -> Result<Option<PatientRecord>> {
        self.ensure_initialized()?;
        let conn = self.open()?;
        let now = Self::now_ts();
        match input.id {
            Some(patient_id) => {
                let changed = conn.execute(
                    "UPDATE patients SET name = ?, age = ?, notes = ?, updated_at = ? WHERE id = ?",
                    params![input.name, input.age, input.notes, now, patient_id],
                )?;
                if changed == 0 {
                    return Ok(None);
                }
                Self::fetch_patient(&conn, patient_id)
            }
            None => {
                conn.execute(
                    "INSERT INTO patients (name, age, notes, created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?)",
                    params![input.name, input.age, input.notes, now, now],
                )?;
                Self::fetch_patient(&conn, conn.last_insert_rowid())
            }
        }
    }

    fn delete_patient(&self, patient_id: i64) -> Result<i64> {
        self.ensure_initialized()?;
        let mut conn = self.open()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        // 外键已声明 ON DELETE CASCADE，这里仍显式清理，不依赖单一机制。
        tx.execute(
            "DELETE FROM chat_messages WHERE thread_id IN
               (SELECT id FROM chat_threads WHERE patient_id = ?)",
            params![patient_id],
        )?;
        tx.execute(
            "DELETE FROM chat_threads WHERE patient_id = ?",
            params![patient_id],
        )?;
        let removed = tx.execute("DELETE FROM patients WHERE id = ?", params![patient_id])?;
        tx.commit()?;
        Ok(removed as i64)
    }

    fn list_patient_history(&self, patient_id: i64) -> Result<Vec<ChatThreadRecord>> {
        self.ensure_initialized()?;
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, patient_id, created_at, updated_at FROM chat_threads
             WHERE patient_id = ? ORDER BY updated_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![patient_id], |row| {
            Ok(ChatThreadRecord {
                id: row.get(0)?,
                patient_id: row.get(1)?,
                created_at: row.get(2)?,
                updated_at: row.get(3)?,
                messages: Vec::new(),
            })
        })?;
        let mut threads = Vec::new();
        for row in rows {
            threads.push(row?);
        }
        let mut message_stmt = conn.prepare(
            "SELECT id, thread_id, role, content, created_at FROM chat_messages
             WHERE thread_id = ? ORDER BY created_at ASC, id ASC",
        )?;
        for thread in &mut threads {
            let rows = message_stmt.query_map(params![thread.id], Self::message_from_row)?;
            for row in rows {
                thread.messages.push(row?);
            }
        }
        Ok(threads)
    }

    fn append_chat_turn(
        &self,
        patient_id: i64,
        user_text: &str,
        agent1_text: &str,
        agent2_text: &str,
    ) -> Result<ChatTurnRecord> {
        self.ensure_initialized()?;
        let mut conn = self.open()?;
        let now = Self::now_ts();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        // 活跃线程始终按 updated_at 现查，不缓存引用。
        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM chat_threads WHERE patient_id = ?
                 ORDER BY updated_at DESC, id DESC LIMIT 1",
                params![patient_id],
                |row| row.get(0),
            )
            .optional()?;
        let thread_id = match existing {
            Some(thread_id) => {
                tx.execute(
                    "UPDATE chat_threads SET updated_at = ? WHERE id = ?",
                    params![now, thread_id],
                )?;
                thread_id
            }
            None => {
                tx.execute(
                    "INSERT INTO chat_threads (patient_id, created_at, updated_at) VALUES (?, ?, ?)",
                    params![patient_id, now, now],
                )?;
                tx.last_insert_rowid()
            }
        };
        // 三条消息共用同一时间戳，线程内顺序由 (created_at, id) 保证。
        let user = Self::insert_message(&tx, thread_id, ROLE_USER, user_text, now)?;
        let agent1 = Self::insert_message(&tx, thread_id, ROLE_AGENT1, agent1_text, now)?;
        let agent2 = Self::insert_message(&tx, thread_id, ROLE_AGENT2, agent2_text, now)?;
        tx.commit()?;
        Ok(ChatTurnRecord {
            thread_id,
            user,
            agent1,
            agent2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_storage() -> SqliteStorage {
        let db_path = std::env::temp_dir().join(format!(
            "medichat_sqlite_{}.db",
            uuid::Uuid::new_v4().simple()
        ));
        let storage = SqliteStorage::new(db_path.to_string_lossy().to_string());
        storage.ensure_initialized().unwrap();
        storage
    }

    fn new_patient(storage: &SqliteStorage, name: &str) -> PatientRecord {
        storage
            .upsert_patient(&PatientUpsert {
                id: None,
                name: name.to_string(),
                age: Some(42),
                notes: None,
            })
            .unwrap()
            .unwrap()
    }

    #[test]
    fn upsert_creates_then_updates_in_place() {
        let storage = temp_storage();
        let created = new_patient(&storage, "Alice");

        let updated = storage
            .upsert_patient(&PatientUpsert {
                id: Some(created.id),
                name: "Alice Chen".to_string(),
                age: Some(43),
                notes: Some("allergic to penicillin".to_string()),
            })
            .unwrap()
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "Alice Chen");
        assert_eq!(updated.age, Some(43));
        assert!(updated.updated_at >= created.updated_at);

        let all = storage.list_patients().unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn upsert_with_unknown_id_returns_none() {
        let storage = temp_storage();
        let missing = storage
            .upsert_patient(&PatientUpsert {
                id: Some(999),
                name: "Ghost".to_string(),
                age: None,
                notes: None,
            })
            .unwrap();
        assert!(missing.is_none());
        assert!(storage.list_patients().unwrap().is_empty());
    }

    #[test]
    fn chat_turn_creates_thread_lazily_and_reuses_it() {
        let storage = temp_storage();
        let patient = new_patient(&storage, "Bob");
        assert!(storage.list_patient_history(patient.id).unwrap().is_empty());

        let first = storage
            .append_chat_turn(patient.id, "u1", "a1", "a2")
            .unwrap();
        let second = storage
            .append_chat_turn(patient.id, "u2", "b1", "b2")
            .unwrap();
        assert_eq!(first.thread_id, second.thread_id);

        let history = storage.list_patient_history(patient.id).unwrap();
        assert_eq!(history.len(), 1);
        let thread = &history[0];
        assert_eq!(thread.messages.len(), 6);
        let roles: Vec<&str> = thread
            .messages
            .iter()
            .map(|message| message.role.as_str())
            .collect();
        assert_eq!(
            roles,
            vec![
                ROLE_USER,
                ROLE_AGENT1,
                ROLE_AGENT2,
                ROLE_USER,
                ROLE_AGENT1,
                ROLE_AGENT2
            ]
        );
        for pair in thread.messages.windows(2) {
            assert!(pair[0].created_at <= pair[1].created_at);
        }
        assert!(thread.updated_at >= thread.created_at);
    }

    #[test]
    fn chat_turn_targets_most_recently_updated_thread() {
        let storage = temp_storage();
        let patient = new_patient(&storage, "Cora");
        let first = storage
            .append_chat_turn(patient.id, "u1", "a1", "a2")
            .unwrap();

        // 手工插入一条更新时间更晚的线程，轮次必须落到它上面。
        let conn = Connection::open(&storage.db_path).unwrap();
        conn.execute(
            "INSERT INTO chat_threads (patient_id, created_at, updated_at) VALUES (?, ?, ?)",
            params![patient.id, 1.0, SqliteStorage::now_ts() + 3600.0],
        )
        .unwrap();
        let newer_id = conn.last_insert_rowid();

        let turn = storage
            .append_chat_turn(patient.id, "u2", "b1", "b2")
            .unwrap();
        assert_eq!(turn.thread_id, newer_id);
        assert_ne!(turn.thread_id, first.thread_id);

        let history = storage.list_patient_history(patient.id).unwrap();
        assert_eq!(history.len(), 2);
        // 最近更新的线程排在最前。
        assert_eq!(history[0].id, newer_id);
    }

    #[test]
    fn delete_patient_cascades_to_threads_and_messages() {
        let storage = temp_storage();
        let patient = new_patient(&storage, "Dan");
        storage
            .append_chat_turn(patient.id, "u1", "a1", "a2")
            .unwrap();

        let removed = storage.delete_patient(patient.id).unwrap();
        assert_eq!(removed, 1);
        assert!(storage.get_patient(patient.id).unwrap().is_none());

        let conn = Connection::open(&storage.db_path).unwrap();
        let threads: i64 = conn
            .query_row("SELECT COUNT(*) FROM chat_threads", [], |row| row.get(0))
            .unwrap();
        let messages: i64 = conn
            .query_row("SELECT COUNT(*) FROM chat_messages", [], |row| row.get(0))
            .unwrap();
        assert_eq!(threads, 0);
        assert_eq!(messages, 0);
    }

    #[test]
    fn list_patients_orders_newest_first() {
        let storage = temp_storage();
        let first = new_patient(&storage, "Early");
        let second = new_patient(&storage, "Late");
        let all = storage.list_patients().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);
    }
}
