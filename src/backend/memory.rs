use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{
    store::{BackendError, BatchOp, Database},
    types::Hash,
};

/// The reference backend: a `BTreeMap` behind a read-write lock. Used as the
/// default throughout this crate's own tests and doctests, the way the
/// teacher crate tests against an in-memory storage mock.
#[derive(Default)]
pub struct MemoryDb {
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Database for MemoryDb {
    async fn get(&self, hash: &Hash) -> Result<Option<Vec<u8>>, BackendError> {
        Ok(self.map.read().get(hash.as_ref()).cloned())
    }

    async fn batch(&self, ops: Vec<BatchOp>) -> Result<(), BackendError> {
        let mut map = self.map.write();
        for op in ops {
            match op {
                BatchOp::Put(hash, bytes) => {
                    map.insert(hash.as_ref().to_vec(), bytes);
                }
                BatchOp::Delete(hash) => {
                    map.remove(hash.as_ref());
                }
            }
        }
        Ok(())
    }
}
