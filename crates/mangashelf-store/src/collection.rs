//! Indexed collection of JSON entities on top of a [`KeyValueStore`].
//!
//! # Design
//! - One index record (`<name>Index`) holds the last assigned id and the ids
//!   in insertion order; each entity lives under `<name>-<id>`.
//! - Every write persists first and only then mutates memory and notifies
//!   subscribers, so a failed write leaves the in-memory collection untouched.
//! - Writers are serialised through one async mutex; id assignment and
//!   read-modify-write updates therefore never race.
//! - Readers work on the last published snapshot and never wait on writers.

use std::collections::HashMap;
use std::sync::Arc;

use mangashelf_events::{ChangeKind, CollectionFeed, Subscription};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::{KvError, StoreError, StoreResult};
use crate::kv::KeyValueStore;

/// Entity that can live in a [`CollectionStore`].
pub trait Keyed: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Entity payload without its store-assigned identifier.
    type Draft: Send;

    /// Store-assigned identifier.
    fn id(&self) -> u64;

    /// Materialise an entity from a draft and its freshly assigned id.
    fn from_draft(id: u64, draft: Self::Draft) -> Self;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
struct CollectionIndex {
    last_id: u64,
    collection: Vec<String>,
}

struct CollectionState<T> {
    index: CollectionIndex,
    items: Vec<T>,
}

/// Persisted, observable collection of `T`.
pub struct CollectionStore<T: Keyed> {
    name: String,
    backend: Arc<dyn KeyValueStore>,
    state: Mutex<CollectionState<T>>,
    feed: CollectionFeed<T>,
}

impl<T: Keyed> CollectionStore<T> {
    /// Create an empty store. Call [`Self::initialize`] to load persisted
    /// records.
    #[must_use]
    pub fn new(name: impl Into<String>, backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            name: name.into(),
            backend,
            state: Mutex::new(CollectionState {
                index: CollectionIndex::default(),
                items: Vec::new(),
            }),
            feed: CollectionFeed::new(),
        }
    }

    /// Create and initialise a store in one step.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub async fn open(name: impl Into<String>, backend: Arc<dyn KeyValueStore>) -> StoreResult<Self> {
        let store = Self::new(name, backend);
        store.initialize().await?;
        Ok(store)
    }

    /// Collection name used to derive storage keys.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Load the index and every listed entity, replacing the in-memory
    /// collection. Corrupt or missing records are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read. A corrupt index is not
    /// an error; it is treated as empty.
    pub async fn initialize(&self) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let index_key = self.index_key();

        let raw_index = self
            .backend
            .get(&index_key)
            .await
            .map_err(|source| self.backend_error("initialize", source))?;
        let mut index = match raw_index {
            None => CollectionIndex::default(),
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!(collection = %self.name, error = %err, "corrupt collection index ignored");
                CollectionIndex::default()
            }),
        };

        let keys: Vec<String> = index
            .collection
            .iter()
            .map(|id| format!("{}-{id}", self.name))
            .collect();
        let records = self
            .backend
            .multi_get(&keys)
            .await
            .map_err(|source| self.backend_error("initialize", source))?;

        let mut items = Vec::with_capacity(records.len());
        for (key, value) in records {
            let Some(raw) = value else {
                warn!(collection = %self.name, key = %key, "indexed record missing");
                continue;
            };
            match serde_json::from_str::<T>(&raw) {
                Ok(item) => items.push(item),
                Err(err) => {
                    warn!(collection = %self.name, key = %key, error = %err, "corrupt record skipped");
                }
            }
        }

        index.collection = items.iter().map(|item| item.id().to_string()).collect();
        index.last_id = items
            .iter()
            .map(Keyed::id)
            .fold(index.last_id, u64::max);
        info!(collection = %self.name, count = items.len(), "collection loaded");

        state.index = index;
        state.items = items;
        self.feed.publish(ChangeKind::Loaded, state.items.clone());
        Ok(())
    }

    /// Current collection in insertion order.
    #[must_use]
    pub fn get_collection(&self) -> Arc<Vec<T>> {
        self.feed.snapshot()
    }

    /// Current collection keyed by the decimal form of each id.
    #[must_use]
    pub fn get_collection_by_id(&self) -> HashMap<String, T> {
        self.get_collection()
            .iter()
            .map(|item| (item.id().to_string(), item.clone()))
            .collect()
    }

    /// Entity with the given id.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<T> {
        self.get_collection().iter().find(|item| item.id() == id).cloned()
    }

    /// First entity matching `predicate`.
    #[must_use]
    pub fn find<P>(&self, predicate: P) -> Option<T>
    where
        P: Fn(&T) -> bool,
    {
        self.get_collection()
            .iter()
            .find(|item| predicate(item))
            .cloned()
    }

    /// Subscribe to changes. The subscription starts with the current
    /// collection.
    #[must_use]
    pub fn subscribe(&self) -> Subscription<T> {
        self.feed.subscribe()
    }

    /// Persist a new entity built from `draft` with the next id.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity or the index cannot be persisted; the
    /// in-memory collection is left untouched.
    pub async fn add_item(&self, draft: T::Draft) -> StoreResult<T> {
        let mut state = self.state.lock().await;
        self.insert_locked(&mut state, draft).await
    }

    /// Replace an existing entity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no entity has the same id, or a
    /// persistence error.
    pub async fn update_item(&self, item: T) -> StoreResult<T> {
        let mut state = self.state.lock().await;
        let position = self.position(&state, item.id())?;
        self.replace_locked(&mut state, position, item).await
    }

    /// Remove an entity and return it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the id is unknown, or a persistence
    /// error when the index cannot be written.
    pub async fn remove_item(&self, id: u64) -> StoreResult<T> {
        let mut state = self.state.lock().await;
        let position = self.position(&state, id)?;

        let mut index = state.index.clone();
        let id_text = id.to_string();
        index.collection.retain(|entry| *entry != id_text);
        self.persist_index(&index, "remove_item").await?;

        let key = self.entity_key(id);
        if let Err(err) = self.backend.remove_item(&key).await {
            warn!(collection = %self.name, key = %key, error = %err, "orphaned record left behind");
        }

        state.index = index;
        let removed = state.items.remove(position);
        self.feed
            .publish(ChangeKind::Removed { id }, state.items.clone());
        Ok(removed)
    }

    /// Atomically read, transform and persist the entity with `id`.
    ///
    /// The closure receives an owned copy; the stored entity is only replaced
    /// once the copy has been persisted.
    ///
    /// # Errors
    ///
    /// Propagates the closure's error, [`StoreError::NotFound`] for an unknown
    /// id, or a persistence error.
    pub async fn modify<F, E>(&self, id: u64, update: F) -> Result<T, E>
    where
        F: FnOnce(T) -> Result<T, E> + Send,
        E: From<StoreError>,
    {
        let mut state = self.state.lock().await;
        let position = self.position(&state, id)?;
        let updated = update(state.items[position].clone())?;
        if updated.id() != id {
            return Err(StoreError::NotFound {
                collection: self.name.clone(),
                id: updated.id(),
            }
            .into());
        }
        Ok(self.replace_locked(&mut state, position, updated).await?)
    }

    /// Merge `draft` into the first entity matching `matches`, or add it as a
    /// new entity when nothing matches. Lookup and write happen under one lock.
    ///
    /// # Errors
    ///
    /// Returns a persistence error; memory is untouched on failure.
    pub async fn upsert_where<P, M>(&self, matches: P, draft: T::Draft, merge: M) -> StoreResult<T>
    where
        P: Fn(&T) -> bool + Send,
        M: FnOnce(T, T::Draft) -> T + Send,
    {
        let mut state = self.state.lock().await;
        match state.items.iter().position(|item| matches(item)) {
            Some(position) => {
                let merged = merge(state.items[position].clone(), draft);
                self.replace_locked(&mut state, position, merged).await
            }
            None => self.insert_locked(&mut state, draft).await,
        }
    }

    /// Rewrite every entity record in one batch.
    ///
    /// # Errors
    ///
    /// Returns an error if any record cannot be encoded or the batch fails.
    pub async fn save_collection(&self) -> StoreResult<()> {
        let state = self.state.lock().await;
        let entries = state
            .items
            .iter()
            .map(|item| {
                let key = self.entity_key(item.id());
                let raw = encode(item, "save_collection", &key)?;
                Ok((key, raw))
            })
            .collect::<StoreResult<Vec<_>>>()?;
        self.backend
            .multi_set(&entries)
            .await
            .map_err(|source| self.backend_error("save_collection", source))
    }

    async fn insert_locked(&self, state: &mut CollectionState<T>, draft: T::Draft) -> StoreResult<T> {
        let id = state.index.last_id.saturating_add(1);
        let item = T::from_draft(id, draft);
        let key = self.entity_key(id);
        let raw = encode(&item, "add_item", &key)?;

        self.backend
            .set(&key, &raw)
            .await
            .map_err(|source| self.backend_error("add_item", source))?;

        let mut index = state.index.clone();
        index.last_id = id;
        index.collection.push(id.to_string());
        if let Err(err) = self.persist_index(&index, "add_item").await {
            if let Err(cleanup) = self.backend.remove_item(&key).await {
                warn!(collection = %self.name, key = %key, error = %cleanup, "orphaned record left behind");
            }
            return Err(err);
        }

        state.index = index;
        state.items.push(item.clone());
        self.feed.publish(ChangeKind::Added { id }, state.items.clone());
        Ok(item)
    }

    async fn replace_locked(
        &self,
        state: &mut CollectionState<T>,
        position: usize,
        item: T,
    ) -> StoreResult<T> {
        let id = item.id();
        let key = self.entity_key(id);
        let raw = encode(&item, "update_item", &key)?;
        self.backend
            .set(&key, &raw)
            .await
            .map_err(|source| self.backend_error("update_item", source))?;

        state.items[position] = item.clone();
        self.feed
            .publish(ChangeKind::Updated { id }, state.items.clone());
        Ok(item)
    }

    async fn persist_index(&self, index: &CollectionIndex, operation: &'static str) -> StoreResult<()> {
        let key = self.index_key();
        let raw = encode(index, operation, &key)?;
        self.backend
            .set(&key, &raw)
            .await
            .map_err(|source| self.backend_error(operation, source))
    }

    fn position(&self, state: &CollectionState<T>, id: u64) -> StoreResult<usize> {
        state
            .items
            .iter()
            .position(|item| item.id() == id)
            .ok_or_else(|| StoreError::NotFound {
                collection: self.name.clone(),
                id,
            })
    }

    fn backend_error(&self, operation: &'static str, source: KvError) -> StoreError {
        error!(collection = %self.name, operation, error = %source, "collection persistence failed");
        StoreError::Backend {
            operation,
            collection: self.name.clone(),
            source,
        }
    }

    fn index_key(&self) -> String {
        format!("{}Index", self.name)
    }

    fn entity_key(&self, id: u64) -> String {
        format!("{}-{id}", self.name)
    }
}

fn encode<V: Serialize>(value: &V, operation: &'static str, key: &str) -> StoreResult<String> {
    serde_json::to_string(value).map_err(|source| StoreError::Serialize {
        operation,
        key: key.to_string(),
        source,
    })
}
