use medichat_server::storage::{PatientUpsert, SqliteStorage, StorageBackend};
use tempfile::TempDir;

fn temp_storage(dir: &TempDir) -> SqliteStorage {
    let db_path = dir.path().join("medichat.db");
    let storage = SqliteStorage::new(db_path.to_string_lossy().to_string());
    storage.ensure_initialized().unwrap();
    storage
}

#[test]
fn upsert_round_trip_with_history() {
    let dir = TempDir::new().unwrap();
    let storage = temp_storage(&dir);

    let created = storage
        .upsert_patient(&PatientUpsert {
            id: None,
            name: "Eve".to_string(),
            age: None,
            notes: Some("first visit".to_string()),
        })
        .unwrap()
        .unwrap();
    assert!(storage.list_patient_history(created.id).unwrap().is_empty());

    storage
        .append_chat_turn(created.id, "sore throat", "reply one", "reply two")
        .unwrap();

    let history = storage.list_patient_history(created.id).unwrap();
    assert_eq!(history.len(), 1);
    let thread = &history[0];
    assert_eq!(thread.patient_id, created.id);
    assert_eq!(thread.messages.len(), 3);
    assert_eq!(thread.messages[0].role, "user");
    assert_eq!(thread.messages[0].content, "sore throat");
    assert_eq!(thread.messages[1].role, "agent1");
    assert_eq!(thread.messages[2].role, "agent2");
}

#[test]
fn upsert_updates_existing_without_duplicating() {
    let dir = TempDir::new().unwrap();
    let storage = temp_storage(&dir);

    let created = storage
        .upsert_patient(&PatientUpsert {
            id: None,
            name: "Frank".to_string(),
            age: Some(50),
            notes: None,
        })
        .unwrap()
        .unwrap();

    let updated = storage
        .upsert_patient(&PatientUpsert {
            id: Some(created.id),
            name: "Frank Miller".to_string(),
            age: Some(51),
            notes: Some("hypertension".to_string()),
        })
        .unwrap()
        .unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.name, "Frank Miller");
    assert_eq!(storage.list_patients().unwrap().len(), 1);

    let unknown = storage
        .upsert_patient(&PatientUpsert {
            id: Some(created.id + 100),
            name: "Nobody".to_string(),
            age: None,
            notes: None,
        })
        .unwrap();
    assert!(unknown.is_none());
    assert_eq!(storage.list_patients().unwrap().len(), 1);
}

#[test]
fn turns_for_different_patients_stay_isolated() {
    let dir = TempDir::new().unwrap();
    let storage = temp_storage(&dir);

    let first = storage
        .upsert_patient(&PatientUpsert {
            id: None,
            name: "Gina".to_string(),
            age: None,
            notes: None,
        })
        .unwrap()
        .unwrap();
    let second = storage
        .upsert_patient(&PatientUpsert {
            id: None,
            name: "Hugo".to_string(),
            age: None,
            notes: None,
        })
        .unwrap()
        .unwrap();

    let turn_a = storage
        .append_chat_turn(first.id, "u", "a1", "a2")
        .unwrap();
    let turn_b = storage
        .append_chat_turn(second.id, "u", "a1", "a2")
        .unwrap();
    assert_ne!(turn_a.thread_id, turn_b.thread_id);

    assert_eq!(storage.list_patient_history(first.id).unwrap().len(), 1);
    assert_eq!(storage.list_patient_history(second.id).unwrap().len(), 1);
}
