//! The public engine facade: a persistent, authenticated key/value map
//! backed by a Modified Merkle-Patricia Trie.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, instrument, trace};

use crate::{
    backend::memory::MemoryDb,
    config::Config,
    error::Result,
    mutate,
    store::{BatchOp, Database, NodeStore},
    types::{Hash, NibblePath, Node, NodeRef, EMPTY_ROOT},
    walk::{walk, WalkControl},
};

/// A single operation within a [`Trie::batch`] call.
#[derive(Clone, Debug)]
pub enum Op {
    Put(Vec<u8>),
    Delete,
}

/// A persistent, authenticated key/value map. Reads may run concurrently;
/// writes (`put`/`del`/`batch`) are serialized behind a single-permit
/// semaphore so that mutation of the current root is always linear, matching
/// a single-writer/multiple-reader concurrency model.
pub struct Trie {
    store: NodeStore,
    root: tokio::sync::RwLock<Hash>,
    write_lock: Semaphore,
    config: Config,
}

impl Trie {
    /// Creates a trie over the given backend, starting from the empty root.
    pub fn new(backend: Arc<dyn Database>) -> Self {
        Self::with_config(backend, Config::default())
    }

    pub fn with_config(backend: Arc<dyn Database>, config: Config) -> Self {
        Self {
            store: NodeStore::new(backend),
            root: tokio::sync::RwLock::new(*EMPTY_ROOT),
            write_lock: Semaphore::new(1),
            config,
        }
    }

    /// A trie over the default in-memory backend, starting empty. Handy for
    /// tests and doctests.
    pub fn new_in_memory() -> Self {
        Self::new(Arc::new(MemoryDb::new()))
    }

    pub fn set_checkpoint_mode(&mut self, is_checkpoint: bool) {
        self.config.is_checkpoint = is_checkpoint;
    }

    /// The current root hash. `EMPTY_ROOT` iff the trie holds no keys.
    pub async fn root(&self) -> Hash {
        *self.root.read().await
    }

    #[instrument(level = "debug", skip(self, key), fields(key_len = key.len()))]
    pub async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let root = self.root().await;
        if root == *EMPTY_ROOT {
            return Ok(None);
        }
        let nibble_key = NibblePath::from(key);
        let path = crate::path::find(&self.store, NodeRef::Hash(root), &nibble_key).await?;
        Ok(path.found.and_then(|node| node.terminal_value().map(<[u8]>::to_vec)))
    }

    /// Reads a node's raw encoded bytes straight out of the backend store,
    /// bypassing trie traversal entirely.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_raw(&self, hash: &Hash) -> Result<Option<Vec<u8>>> {
        self.store.get_raw(hash).await
    }

    /// Writes raw encoded bytes straight into the backend store under the
    /// given hash, bypassing trie mutation entirely. The caller is
    /// responsible for `hash` actually being the content hash of `bytes`;
    /// this is an escape hatch for seeding/migrating a store, not part of
    /// ordinary trie mutation.
    #[instrument(level = "debug", skip(self, bytes), fields(bytes_len = bytes.len()))]
    pub async fn put_raw(&self, hash: Hash, bytes: Vec<u8>) -> Result<()> {
        self.store.put_raw(hash, bytes).await
    }

    /// Whether `root` names a root this trie's backend can actually resolve:
    /// either the canonical empty root, or a hash present in the store.
    #[instrument(level = "debug", skip(self))]
    pub async fn check_root(&self, root: Hash) -> Result<bool> {
        if root == *EMPTY_ROOT {
            return Ok(true);
        }
        Ok(self.store.get_raw(&root).await?.is_some())
    }

    /// A facade over the same backends and current root, for a caller that
    /// wants its own independent write lock (e.g. to run a batch concurrently
    /// against the same underlying data without contending on this trie's
    /// semaphore). Mutations made through the copy are not visible through
    /// the original and vice versa, since each tracks its own root.
    pub async fn copy(&self) -> Self {
        Self {
            store: self.store.clone(),
            root: tokio::sync::RwLock::new(self.root().await),
            write_lock: Semaphore::new(1),
            config: self.config.clone(),
        }
    }

    /// Every key/value pair currently in the trie, as an ordered stream of
    /// full (un-nibbled) keys. Collects the whole trie up front via a single
    /// traversal rather than yielding incrementally, since the backend
    /// contract gives no cheaper way to resume a walk mid-stream.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_read_stream(&self) -> Result<impl futures::Stream<Item = (Vec<u8>, Vec<u8>)>> {
        Ok(futures::stream::iter(self.collect_entries().await?))
    }

    async fn collect_entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let root = self.root().await;
        if root == *EMPTY_ROOT {
            return Ok(Vec::new());
        }

        let entries = parking_lot::Mutex::new(Vec::new());
        walk(&self.store, NodeRef::Hash(root), NibblePath::empty(), &|node, prefix| {
            if let Some(value) = node.terminal_value() {
                let mut full_key = prefix.clone();
                if let Node::Leaf(leaf) = node {
                    full_key.push_path(&leaf.key);
                }
                if let Some(bytes) = full_key.to_bytes() {
                    entries.lock().push((bytes, value.to_vec()));
                }
            }
            WalkControl::<()>::Next
        })
        .await?;

        Ok(entries.into_inner())
    }

    #[instrument(level = "debug", skip(self, key, value), fields(key_len = key.len()))]
    pub async fn put(&self, key: &[u8], value: Vec<u8>) -> Result<Hash> {
        let _permit = self.write_lock.acquire().await.expect("write semaphore is never closed");
        trace!("write lock acquired");
        let root = self.root().await;
        let nibble_key = NibblePath::from(key);
        let (new_root, ops) = mutate::put(&self.store, root, &nibble_key, value).await?;
        self.commit(new_root, ops).await?;
        trace!("write lock released");
        Ok(new_root)
    }

    #[instrument(level = "debug", skip(self, key), fields(key_len = key.len()))]
    pub async fn del(&self, key: &[u8]) -> Result<Hash> {
        let _permit = self.write_lock.acquire().await.expect("write semaphore is never closed");
        trace!("write lock acquired");
        let root = self.root().await;
        let nibble_key = NibblePath::from(key);
        let (new_root, ops) = mutate::delete(&self.store, root, &nibble_key).await?;
        self.commit(new_root, ops).await?;
        trace!("write lock released");
        Ok(new_root)
    }

    /// Applies a list of put/delete operations atomically: all node writes
    /// from every op in the list are committed to the backend in a single
    /// batch once the whole list has been folded into a new root.
    #[instrument(level = "debug", skip(self, ops), fields(num_ops = ops.len()))]
    pub async fn batch(&self, ops: Vec<(Vec<u8>, Op)>) -> Result<Hash> {
        let _permit = self.write_lock.acquire().await.expect("write semaphore is never closed");
        trace!("write lock acquired");

        let mut root = self.root().await;
        let mut all_puts = Vec::new();
        for (key, op) in ops {
            let nibble_key = NibblePath::from(&key);
            let (new_root, puts) = match op {
                Op::Put(value) => mutate::put(&self.store, root, &nibble_key, value).await?,
                Op::Delete => mutate::delete(&self.store, root, &nibble_key).await?,
            };
            root = new_root;
            all_puts.extend(puts);
        }

        self.commit(root, all_puts).await?;
        debug!(root = %root, "batch committed");
        trace!("write lock released");
        Ok(root)
    }

    async fn commit(&self, new_root: Hash, puts: Vec<(Hash, Vec<u8>)>) -> Result<()> {
        if !puts.is_empty() {
            let batch_ops = puts.into_iter().map(|(hash, bytes)| BatchOp::Put(hash, bytes)).collect();
            self.store.batch(batch_ops).await?;
        }
        *self.root.write().await = new_root;
        Ok(())
    }
}
