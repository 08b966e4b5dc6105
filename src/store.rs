//! The generic ordered byte-store contract the trie persists nodes onto, and
//! a thin multi-backend reader/writer built on top of it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::{
    error::{Error, Result},
    types::{Hash, Node},
};

/// Boxed so the trait itself stays free of an associated error type — that's
/// what lets `Arc<dyn Database>` be used uniformly across backends with
/// unrelated concrete error types.
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A single write performed as part of a batch.
#[derive(Clone, Debug)]
pub enum BatchOp {
    Put(Hash, Vec<u8>),
    Delete(Hash),
}

/// The backend contract: an ordered, durable byte key/value store keyed by
/// node hash. Implementations are expected to be internally synchronized —
/// the trie itself only ever calls through `&self`.
#[async_trait]
pub trait Database: Send + Sync {
    async fn get(&self, hash: &Hash) -> std::result::Result<Option<Vec<u8>>, BackendError>;

    async fn batch(&self, ops: Vec<BatchOp>) -> std::result::Result<(), BackendError>;
}

/// Reads through a stack of backends (first hit wins) and broadcasts writes
/// to all of them. With a single backend this degenerates to a plain
/// pass-through; the multi-backend shape exists to support a future
/// checkpoint overlay sitting in front of the durable store.
#[derive(Clone)]
pub struct NodeStore {
    backends: Vec<Arc<dyn Database>>,
}

impl NodeStore {
    pub fn new(backend: Arc<dyn Database>) -> Self {
        Self { backends: vec![backend] }
    }

    pub fn with_backends(backends: Vec<Arc<dyn Database>>) -> Self {
        assert!(!backends.is_empty(), "node store needs at least one backend");
        Self { backends }
    }

    pub async fn get_raw(&self, hash: &Hash) -> Result<Option<Vec<u8>>> {
        for backend in &self.backends {
            if let Some(bytes) = backend.get(hash).await.map_err(Error::Backend)? {
                return Ok(Some(bytes));
            }
        }
        Ok(None)
    }

    pub async fn lookup(&self, hash: &Hash) -> Result<Node> {
        let bytes = self.get_raw(hash).await?.ok_or(Error::MissingNode { hash: *hash })?;
        Node::decode(&bytes)
    }

    pub async fn put_raw(&self, hash: Hash, bytes: Vec<u8>) -> Result<()> {
        self.batch(vec![BatchOp::Put(hash, bytes)]).await
    }

    pub async fn batch(&self, ops: Vec<BatchOp>) -> Result<()> {
        trace!(num_ops = ops.len(), "committing node store batch");
        for backend in &self.backends {
            backend.batch(ops.clone()).await.map_err(Error::Backend)?;
        }
        Ok(())
    }
}
