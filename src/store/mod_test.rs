use super::*;
use crate::message::MessageStatus;

fn temp_dir() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("voltchat-store-{}", Uuid::new_v4()))
}

// =============================================================
// MemoryStore
// =============================================================

#[test]
fn memory_store_set_get_remove() {
    let store = MemoryStore::new();
    assert_eq!(store.get("k").unwrap(), None);
    store.set("k", "v").unwrap();
    assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    store.remove("k").unwrap();
    assert_eq!(store.get("k").unwrap(), None);
    store.remove("k").unwrap();
}

#[test]
fn memory_store_clones_share_entries() {
    let a = MemoryStore::new();
    let b = a.clone();
    a.set("k", "v").unwrap();
    assert_eq!(b.get("k").unwrap().as_deref(), Some("v"));
}

// =============================================================
// ChatStorage
// =============================================================

#[test]
fn defaults_on_empty_stores() {
    let storage = ChatStorage::in_memory();
    assert_eq!(storage.webhook_url(), "");
    assert!(storage.load_messages().is_empty());
    assert!(storage.streaming_enabled());
}

#[test]
fn session_id_is_stable_until_rotated() {
    let storage = ChatStorage::in_memory();
    let first = storage.session_id();
    assert!(!first.is_empty());
    assert_eq!(storage.session_id(), first);

    let rotated = storage.rotate_session_id();
    assert_ne!(rotated, first);
    assert_eq!(storage.session_id(), rotated);
}

#[test]
fn session_id_lives_in_session_scope() {
    let session = MemoryStore::new();
    let durable = MemoryStore::new();
    let storage = ChatStorage::new(Arc::new(session.clone()), Arc::new(durable.clone()));
    let id = storage.session_id();
    assert_eq!(session.get(SESSION_ID_KEY).unwrap(), Some(id));
    assert_eq!(durable.get(SESSION_ID_KEY).unwrap(), None);
}

#[test]
fn streaming_flag_persists_as_json_bool() {
    let durable = MemoryStore::new();
    let storage = ChatStorage::new(Arc::new(MemoryStore::new()), Arc::new(durable.clone()));
    storage.save_streaming_enabled(false);
    assert_eq!(durable.get(STREAMING_KEY).unwrap().as_deref(), Some("false"));
    assert!(!storage.streaming_enabled());
}

#[test]
fn garbage_streaming_flag_defaults_on() {
    let durable = MemoryStore::new();
    durable.set(STREAMING_KEY, "maybe").unwrap();
    let storage = ChatStorage::new(Arc::new(MemoryStore::new()), Arc::new(durable));
    assert!(storage.streaming_enabled());
}

#[test]
fn malformed_history_falls_back_to_empty() {
    let durable = MemoryStore::new();
    durable.set(MESSAGES_KEY, "{not json").unwrap();
    let storage = ChatStorage::new(Arc::new(MemoryStore::new()), Arc::new(durable));
    assert!(storage.load_messages().is_empty());
}

#[test]
fn history_round_trip_through_store() {
    let storage = ChatStorage::in_memory();
    let mut reply = Message::assistant_placeholder(MessageStatus::Streaming);
    reply.content = "half".into();
    let saved = vec![Message::user("hello"), reply];
    storage.save_messages(&saved);

    let log = storage.load_messages();
    let loaded = log.as_slice();
    assert_eq!(loaded.len(), 2);
    for (a, b) in saved.iter().zip(loaded) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.role, b.role);
        assert_eq!(a.content, b.content);
        assert_eq!(a.timestamp, b.timestamp);
    }
    assert_eq!(loaded[1].status, MessageStatus::Complete);
}

#[test]
fn saving_empty_history_removes_key() {
    let durable = MemoryStore::new();
    let storage = ChatStorage::new(Arc::new(MemoryStore::new()), Arc::new(durable.clone()));
    storage.save_messages(&[Message::user("x")]);
    assert!(durable.get(MESSAGES_KEY).unwrap().is_some());
    storage.save_messages(&[]);
    assert!(durable.get(MESSAGES_KEY).unwrap().is_none());
}

// =============================================================
// FileStore
// =============================================================

#[test]
fn file_store_survives_reopen() {
    let dir = temp_dir();
    {
        let store = FileStore::open(&dir).unwrap();
        store.set(WEBHOOK_URL_KEY, "https://example.test/hook").unwrap();
        store.set("other", "1").unwrap();
        store.remove("other").unwrap();
    }
    let store = FileStore::open(&dir).unwrap();
    assert_eq!(store.get(WEBHOOK_URL_KEY).unwrap().as_deref(), Some("https://example.test/hook"));
    assert_eq!(store.get("other").unwrap(), None);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn file_store_missing_dir_is_empty() {
    let dir = temp_dir();
    let store = FileStore::open(&dir).unwrap();
    assert_eq!(store.get(MESSAGES_KEY).unwrap(), None);
    assert!(!store.path().exists());
}

#[test]
fn file_store_corrupt_file_is_empty() {
    let dir = temp_dir();
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("store.json"), "][").unwrap();
    let store = FileStore::open(&dir).unwrap();
    assert_eq!(store.get(MESSAGES_KEY).unwrap(), None);
    store.set(STREAMING_KEY, "true").unwrap();
    let reopened = FileStore::open(&dir).unwrap();
    assert_eq!(reopened.get(STREAMING_KEY).unwrap().as_deref(), Some("true"));
    let _ = std::fs::remove_dir_all(&dir);
}
