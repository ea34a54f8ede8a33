// Snapshots live in a single sled tree, one JSON value per record. A missing
// key means the node has never saved that record and starts fresh.

use crate::error::{BlockchainError, Result};
use crate::utils::{deserialize, serialize};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::{Db, Tree};
use std::path::Path;

const SNAPSHOTS_TREE: &str = "snapshots";

pub const LEDGER_KEY: &str = "ledger";
pub const ACCOUNTS_KEY: &str = "accounts";
pub const STAKING_KEY: &str = "staking";
pub const ECONOMICS_KEY: &str = "economics";
pub const FEES_KEY: &str = "fees";
pub const WALLETS_KEY: &str = "wallets";

#[derive(Clone)]
pub struct SnapshotStore {
    db: Db,
    tree: Tree,
}

impl SnapshotStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<SnapshotStore> {
        let db = sled::open(path.as_ref())
            .map_err(|e| BlockchainError::Database(format!("Failed to open database: {e}")))?;
        let tree = db.open_tree(SNAPSHOTS_TREE).map_err(|e| {
            BlockchainError::Database(format!("Failed to open snapshots tree: {e}"))
        })?;
        debug!("Opened snapshot store at {}", path.as_ref().display());
        Ok(SnapshotStore { db, tree })
    }

    /// Store `record` under `key` and flush it to disk
    pub fn save<T: Serialize>(&self, key: &str, record: &T) -> Result<()> {
        let bytes = serialize(record)?;
        self.tree.insert(key, bytes)?;
        self.db.flush()?;
        info!("Saved {key} snapshot");
        Ok(())
    }

    /// Load the record under `key`; `Ok(None)` when it was never saved
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.tree.get(key)? {
            Some(bytes) => {
                let record = deserialize(bytes.as_ref()).map_err(|e| {
                    BlockchainError::Serialization(format!("Malformed {key} snapshot: {e}"))
                })?;
                debug!("Loaded {key} snapshot");
                Ok(Some(record))
            }
            None => {
                info!("No saved {key} snapshot, starting fresh");
                Ok(None)
            }
        }
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.tree.contains_key(key)?)
    }
}
