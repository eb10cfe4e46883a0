use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use mangashelf_events::ChangeKind;
use mangashelf_store::{
    CollectionStore, KeyValueStore, KvError, KvResult, Keyed, MemoryKeyValueStore,
    SqliteKeyValueStore, StoreError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Note {
    id: u64,
    title: String,
}

impl Keyed for Note {
    type Draft = String;

    fn id(&self) -> u64 {
        self.id
    }

    fn from_draft(id: u64, title: String) -> Self {
        Self { id, title }
    }
}

fn titles(notes: &[Note]) -> Vec<&str> {
    notes.iter().map(|note| note.title.as_str()).collect()
}

/// Backend that delegates to memory but can be switched to fail writes.
#[derive(Default)]
struct FlakyBackend {
    inner: MemoryKeyValueStore,
    fail_writes: AtomicBool,
    fail_index_writes: AtomicBool,
}

impl FlakyBackend {
    fn check(&self, key: &str, operation: &'static str) -> KvResult<()> {
        let index_write = key.ends_with("Index");
        if self.fail_writes.load(Ordering::SeqCst)
            || (index_write && self.fail_index_writes.load(Ordering::SeqCst))
        {
            return Err(KvError::Unavailable {
                operation,
                reason: "scripted failure",
            });
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FlakyBackend {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> KvResult<()> {
        self.check(key, "set")?;
        self.inner.set(key, value).await
    }

    async fn multi_get(&self, keys: &[String]) -> KvResult<Vec<(String, Option<String>)>> {
        self.inner.multi_get(keys).await
    }

    async fn multi_set(&self, entries: &[(String, String)]) -> KvResult<()> {
        self.check("", "multi_set")?;
        self.inner.multi_set(entries).await
    }

    async fn remove_item(&self, key: &str) -> KvResult<()> {
        self.check(key, "remove_item")?;
        self.inner.remove_item(key).await
    }

    async fn clear(&self) -> KvResult<()> {
        self.inner.clear().await
    }
}

#[tokio::test]
async fn add_update_remove_sequence_matches_collection() -> Result<()> {
    let store: CollectionStore<Note> =
        CollectionStore::open("notes", Arc::new(MemoryKeyValueStore::new())).await?;

    let first = store.add_item("first".into()).await?;
    let second = store.add_item("second".into()).await?;
    let third = store.add_item("third".into()).await?;
    assert_eq!((first.id, second.id, third.id), (1, 2, 3));

    store
        .update_item(Note {
            id: 2,
            title: "second (edited)".into(),
        })
        .await?;
    store.remove_item(1).await?;

    assert_eq!(
        titles(&store.get_collection()),
        vec!["second (edited)", "third"]
    );
    let by_id = store.get_collection_by_id();
    assert_eq!(by_id.len(), 2);
    assert_eq!(by_id["3"].title, "third");

    let fourth = store.add_item("fourth".into()).await?;
    assert_eq!(fourth.id, 4, "ids are never reused");
    Ok(())
}

#[tokio::test]
async fn unknown_ids_are_rejected() -> Result<()> {
    let store: CollectionStore<Note> =
        CollectionStore::open("notes", Arc::new(MemoryKeyValueStore::new())).await?;
    let update = store
        .update_item(Note {
            id: 9,
            title: "ghost".into(),
        })
        .await;
    assert!(matches!(update, Err(StoreError::NotFound { id: 9, .. })));
    assert!(matches!(
        store.remove_item(9).await,
        Err(StoreError::NotFound { id: 9, .. })
    ));
    Ok(())
}

#[tokio::test]
async fn reload_restores_collection_and_skips_corrupt_records() -> Result<()> {
    let backend = Arc::new(MemoryKeyValueStore::with_entries([
        ("notesIndex", r#"{"lastId":4,"collection":["1","2","3"]}"#),
        ("notes-1", r#"{"id":1,"title":"kept"}"#),
        ("notes-2", "{not json"),
        ("notes-4", r#"{"id":4,"title":"unindexed"}"#),
    ]));
    let store: CollectionStore<Note> = CollectionStore::open("notes", backend.clone()).await?;
    assert_eq!(titles(&store.get_collection()), vec!["kept"]);

    let next = store.add_item("next".into()).await?;
    assert_eq!(next.id, 5);

    let reopened: CollectionStore<Note> = CollectionStore::open("notes", backend).await?;
    assert_eq!(titles(&reopened.get_collection()), vec!["kept", "next"]);
    Ok(())
}

#[tokio::test]
async fn corrupt_index_starts_empty() -> Result<()> {
    let backend = Arc::new(MemoryKeyValueStore::with_entries([("notesIndex", "[")]));
    let store: CollectionStore<Note> = CollectionStore::open("notes", backend).await?;
    assert!(store.get_collection().is_empty());
    Ok(())
}

#[tokio::test]
async fn failed_write_leaves_memory_untouched() -> Result<()> {
    let backend = Arc::new(FlakyBackend::default());
    let store: CollectionStore<Note> = CollectionStore::open("notes", backend.clone()).await?;
    store.add_item("stable".into()).await?;
    let mut subscription = store.subscribe();

    backend.fail_writes.store(true, Ordering::SeqCst);
    assert!(matches!(
        store.add_item("lost".into()).await,
        Err(StoreError::Backend { .. })
    ));
    assert!(
        store
            .update_item(Note {
                id: 1,
                title: "changed".into()
            })
            .await
            .is_err()
    );
    assert!(store.remove_item(1).await.is_err());

    assert_eq!(titles(&store.get_collection()), vec!["stable"]);
    assert!(subscription.try_next().is_none(), "no change was announced");
    Ok(())
}

#[tokio::test]
async fn failed_index_write_removes_orphaned_record() -> Result<()> {
    let backend = Arc::new(FlakyBackend::default());
    let store: CollectionStore<Note> = CollectionStore::open("notes", backend.clone()).await?;
    backend.fail_index_writes.store(true, Ordering::SeqCst);

    assert!(store.add_item("orphan".into()).await.is_err());
    assert!(backend.inner.get("notes-1").await?.is_none());

    backend.fail_index_writes.store(false, Ordering::SeqCst);
    let added = store.add_item("retry".into()).await?;
    assert_eq!(added.id, 1, "failed add does not consume an id");
    Ok(())
}

#[tokio::test]
async fn late_subscriber_sees_current_state_and_final_changes() -> Result<()> {
    let store: CollectionStore<Note> =
        CollectionStore::open("notes", Arc::new(MemoryKeyValueStore::new())).await?;
    store.add_item("a".into()).await?;

    let mut subscription = store.subscribe();
    assert_eq!(titles(subscription.current()), vec!["a"]);

    store.add_item("b".into()).await?;
    store.remove_item(1).await?;

    let added = subscription.next().await.expect("added change");
    assert_eq!(added.kind, ChangeKind::Added { id: 2 });
    let removed = subscription.next().await.expect("removed change");
    assert_eq!(removed.kind, ChangeKind::Removed { id: 1 });
    assert_eq!(titles(subscription.current()), vec!["b"]);
    Ok(())
}

#[tokio::test]
async fn modify_and_upsert_are_atomic() -> Result<()> {
    let store: CollectionStore<Note> =
        CollectionStore::open("notes", Arc::new(MemoryKeyValueStore::new())).await?;
    let created = store
        .upsert_where(|note| note.title == "x", "x".into(), |note, _| note)
        .await?;
    let merged = store
        .upsert_where(
            |note| note.title == "x",
            "ignored".into(),
            |mut note, draft| {
                note.title.push_str(&draft[..1]);
                note
            },
        )
        .await?;
    assert_eq!(created.id, merged.id);
    assert_eq!(merged.title, "xi");

    let renamed = store
        .modify(created.id, |mut note| {
            note.title = "renamed".into();
            Ok::<_, StoreError>(note)
        })
        .await?;
    assert_eq!(store.get(created.id), Some(renamed));

    let rejected = store
        .modify(created.id, |_| {
            Err::<Note, StoreError>(StoreError::NotFound {
                collection: "notes".into(),
                id: 0,
            })
        })
        .await;
    assert!(rejected.is_err());
    assert_eq!(store.get(created.id).map(|note| note.title), Some("renamed".into()));
    Ok(())
}

#[tokio::test]
async fn concurrent_adds_receive_distinct_ids() -> Result<()> {
    let store: Arc<CollectionStore<Note>> = Arc::new(
        CollectionStore::open("notes", Arc::new(MemoryKeyValueStore::new())).await?,
    );
    let mut handles = Vec::new();
    for i in 0..16 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move { store.add_item(format!("n{i}")).await }));
    }
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await??.id);
    }
    ids.sort_unstable();
    assert_eq!(ids, (1..=16).collect::<Vec<_>>());
    Ok(())
}

#[tokio::test]
async fn sqlite_backend_round_trips_collection() -> Result<()> {
    let backend = Arc::new(SqliteKeyValueStore::connect("sqlite::memory:").await?);
    let store: CollectionStore<Note> = CollectionStore::open("notes", backend.clone()).await?;
    store.add_item("persisted".into()).await?;
    store.save_collection().await?;

    let reopened: CollectionStore<Note> = CollectionStore::open("notes", backend).await?;
    assert_eq!(titles(&reopened.get_collection()), vec!["persisted"]);
    Ok(())
}
