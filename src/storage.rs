//! Key-value storage layer
//!
//! Records are JSON values under string keys. Multi-key updates go through
//! [`KvStore::transact`], which the RocksDB backend runs as an optimistic
//! transaction and retries on write conflicts.

use crate::{
    config::{CompressionType, StorageConfig},
    errors::{ArcadeResult, StorageError},
};
use rocksdb::{
    DBCompressionType, Direction, ErrorKind, IteratorMode, OptimisticTransactionDB, Options,
    Transaction,
};
use std::{path::Path, sync::Arc};
use tracing::{debug, info};

/// Reads and writes inside one atomic unit
pub trait KvTxn {
    /// Read a key and register it for conflict detection
    fn get_for_update(&mut self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    fn put(&mut self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;
}

/// Byte-level store behind the game records
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

    /// Every entry whose key starts with `prefix`, in key order
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError>;

    /// Run `body` atomically. Either every write of a successful body is
    /// applied or none is. `body` may run more than once.
    fn transact<R, F>(&self, body: F) -> ArcadeResult<R>
    where
        F: FnMut(&mut dyn KvTxn) -> ArcadeResult<R>;
}

/// RocksDB backend
#[derive(Clone)]
pub struct RocksStorage {
    db: Arc<OptimisticTransactionDB>,
    max_attempts: u32,
}

impl RocksStorage {
    pub fn open(config: &StorageConfig) -> Result<Self, StorageError> {
        Self::open_at(&config.data_directory, config)
    }

    pub fn open_at<P: AsRef<Path>>(path: P, config: &StorageConfig) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size_mb * 1024 * 1024);
        opts.set_max_write_buffer_number(4);
        opts.set_compression_type(match config.compression_type {
            CompressionType::None => DBCompressionType::None,
            CompressionType::Snappy => DBCompressionType::Snappy,
            CompressionType::Lz4 => DBCompressionType::Lz4,
            CompressionType::Zstd => DBCompressionType::Zstd,
        });

        let path = path.as_ref();
        let db: OptimisticTransactionDB = OptimisticTransactionDB::open(&opts, path)
            .map_err(|e| StorageError::OpenFailed(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "opened RocksDB store");

        Ok(Self {
            db: Arc::new(db),
            max_attempts: config.max_transaction_attempts.max(1),
        })
    }
}

struct RocksTxn<'a, 'db> {
    txn: &'a Transaction<'db, OptimisticTransactionDB>,
}

impl KvTxn for RocksTxn<'_, '_> {
    fn get_for_update(&mut self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.txn
            .get_for_update(key.as_bytes(), true)
            .map_err(|e| StorageError::ReadFailed(e.to_string()))
    }

    fn put(&mut self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        self.txn
            .put(key.as_bytes(), value)
            .map_err(|e| StorageError::WriteFailed(e.to_string()))
    }
}

fn is_conflict(error: &rocksdb::Error) -> bool {
    matches!(error.kind(), ErrorKind::Busy | ErrorKind::TryAgain)
}

impl KvStore for RocksStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.db
            .get(key.as_bytes())
            .map_err(|e| StorageError::ReadFailed(e.to_string()))
    }

    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        self.db
            .put(key.as_bytes(), value)
            .map_err(|e| StorageError::WriteFailed(e.to_string()))
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        let mut entries = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix.as_bytes(), Direction::Forward));
        for item in iter {
            let (key, value) = item.map_err(|e| StorageError::ReadFailed(e.to_string()))?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            entries.push((String::from_utf8_lossy(&key).into_owned(), value.into_vec()));
        }
        Ok(entries)
    }

    fn transact<R, F>(&self, mut body: F) -> ArcadeResult<R>
    where
        F: FnMut(&mut dyn KvTxn) -> ArcadeResult<R>,
    {
        for attempt in 1..=self.max_attempts {
            let txn = self.db.transaction();
            // An early return drops the transaction, which rolls it back.
            let result = body(&mut RocksTxn { txn: &txn })?;
            match txn.commit() {
                Ok(()) => return Ok(result),
                Err(e) if is_conflict(&e) => {
                    debug!(attempt, error = %e, "transaction conflict, retrying");
                }
                Err(e) => return Err(StorageError::WriteFailed(e.to_string()).into()),
            }
        }
        Err(StorageError::Contention {
            attempts: self.max_attempts,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ArcadeError;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, RocksStorage) {
        let dir = TempDir::new().unwrap();
        let storage = RocksStorage::open_at(dir.path(), &StorageConfig::default()).unwrap();
        (dir, storage)
    }

    #[test]
    fn test_prefix_scan_stops_at_prefix_end() {
        let (_dir, storage) = open_temp();
        storage.put("agg:crash:2024-01-01:a", b"1".to_vec()).unwrap();
        storage.put("agg:crash:2024-01-02:b", b"2".to_vec()).unwrap();
        storage.put("agg:mines:2024-01-01:a", b"3".to_vec()).unwrap();

        let crash = storage.scan_prefix("agg:crash:").unwrap();
        assert_eq!(crash.len(), 2);
        assert_eq!(crash[0].0, "agg:crash:2024-01-01:a");

        let day = storage.scan_prefix("agg:crash:2024-01-02:").unwrap();
        assert_eq!(day, vec![("agg:crash:2024-01-02:b".to_string(), b"2".to_vec())]);
    }

    #[test]
    fn test_open_failure_names_the_path() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"occupied").unwrap();

        match RocksStorage::open_at(&file, &StorageConfig::default()) {
            Err(StorageError::OpenFailed(message)) => {
                assert!(message.contains("not-a-dir"))
            }
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("opened a regular file as a database"),
        }
    }

    #[test]
    fn test_failed_body_writes_nothing() {
        let (_dir, storage) = open_temp();
        let result: ArcadeResult<()> = storage.transact(|txn| {
            txn.put("k", b"v".to_vec())?;
            Err(ArcadeError::InvalidInput("abort".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(storage.get("k").unwrap(), None);
    }

    #[test]
    fn test_concurrent_increments_are_serialized() {
        let (_dir, storage) = open_temp();
        let mut config = StorageConfig::default();
        config.max_transaction_attempts = 1_000;
        let storage = RocksStorage {
            max_attempts: config.max_transaction_attempts,
            ..storage
        };

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..25 {
                        storage
                            .transact(|txn| {
                                let current = txn
                                    .get_for_update("counter")?
                                    .map(|b| String::from_utf8_lossy(&b).parse::<u64>().unwrap())
                                    .unwrap_or(0);
                                txn.put("counter", (current + 1).to_string().into_bytes())?;
                                Ok(())
                            })
                            .unwrap();
                    }
                });
            }
        });

        let raw = storage.get("counter").unwrap().unwrap();
        assert_eq!(String::from_utf8(raw).unwrap(), "100");
    }
}
