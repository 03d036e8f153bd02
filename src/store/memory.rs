//! In-process backend for tests and `--ephemeral` runs

use crate::{
    errors::{ArcadeResult, StorageError},
    storage::{KvStore, KvTxn},
};
use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

/// One mutex around an ordered map. Transactions hold the lock for their
/// whole body, so they never conflict.
#[derive(Default)]
pub struct MemoryKv {
    data: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct MemoryTxn<'a> {
    base: &'a BTreeMap<String, Vec<u8>>,
    writes: BTreeMap<String, Vec<u8>>,
}

impl KvTxn for MemoryTxn<'_> {
    fn get_for_update(&mut self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self
            .writes
            .get(key)
            .or_else(|| self.base.get(key))
            .cloned())
    }

    fn put(&mut self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        self.writes.insert(key.to_string(), value);
        Ok(())
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        self.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        Ok(self
            .lock()
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    fn transact<R, F>(&self, mut body: F) -> ArcadeResult<R>
    where
        F: FnMut(&mut dyn KvTxn) -> ArcadeResult<R>,
    {
        let mut data = self.lock();
        let mut txn = MemoryTxn {
            base: &data,
            writes: BTreeMap::new(),
        };
        let result = body(&mut txn)?;
        let writes = txn.writes;
        data.extend(writes);
        Ok(result)
    }
}
