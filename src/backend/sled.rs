use async_trait::async_trait;

use crate::{
    store::{BackendError, BatchOp, Database},
    types::Hash,
};

/// A durable, ordered, batch-capable backend over a `sled::Tree`. `sled`
/// blocks the calling thread on I/O, so every call is dispatched to
/// `spawn_blocking` rather than awaited directly.
pub struct SledDb {
    tree: sled::Tree,
}

impl SledDb {
    pub fn new(tree: sled::Tree) -> Self {
        Self { tree }
    }

    pub fn open(path: impl AsRef<std::path::Path>) -> sled::Result<Self> {
        let db = sled::open(path)?;
        Ok(Self::new(db.open_tree("nodes")?))
    }
}

#[async_trait]
impl Database for SledDb {
    async fn get(&self, hash: &Hash) -> Result<Option<Vec<u8>>, BackendError> {
        let tree = self.tree.clone();
        let key = hash.as_ref().to_vec();
        tokio::task::spawn_blocking(move || tree.get(key))
            .await
            .map_err(|e| Box::new(e) as BackendError)?
            .map(|opt| opt.map(|ivec| ivec.to_vec()))
            .map_err(|e| Box::new(e) as BackendError)
    }

    async fn batch(&self, ops: Vec<BatchOp>) -> Result<(), BackendError> {
        let tree = self.tree.clone();
        tokio::task::spawn_blocking(move || {
            let mut batch = sled::Batch::default();
            for op in ops {
                match op {
                    BatchOp::Put(hash, bytes) => batch.insert(hash.as_ref(), bytes),
                    BatchOp::Delete(hash) => batch.remove(hash.as_ref()),
                }
            }
            tree.apply_batch(batch)
        })
        .await
        .map_err(|e| Box::new(e) as BackendError)?
        .map_err(|e| Box::new(e) as BackendError)
    }
}
