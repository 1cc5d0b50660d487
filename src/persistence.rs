//! Durable storage for market books, token balances and the admin role.
//!
//! A `MarketBook` (one market and all of its stakes) is the unit of market
//! persistence. The ledger writes the mutated copy through the store before it
//! commits that copy in memory. The vault does the same with the balances a
//! transfer changes, and the admin role with each handover. With `SledStore`
//! all three live in one database and every write is flushed.

use std::collections::HashMap;
use std::path::Path;

use crate::models::{Amount, MarketBook};
use crate::vault::VaultSnapshot;

const MARKETS_TREE: &str = "markets";
const VAULT_TREE: &str = "vault";
const META_TREE: &str = "meta";

const ACCOUNT_PREFIX: &[u8] = b"account/";
const ESCROW_KEY: &[u8] = b"escrow";
const ADMIN_KEY: &[u8] = b"admin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Underlying database failure
    Database(String),
    /// Record could not be encoded or decoded
    Codec(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(msg) => write!(f, "Database error: {}", msg),
            StoreError::Codec(msg) => write!(f, "Codec error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Codec(err.to_string())
    }
}

pub trait MarketStore: Send + Sync {
    fn save(&self, book: &MarketBook) -> Result<(), StoreError>;

    /// Every persisted book, ordered by market id
    fn load_all(&self) -> Result<Vec<MarketBook>, StoreError>;

    fn save_admin(&self, admin: &str) -> Result<(), StoreError>;

    /// The admin recorded by the last handover, if any
    fn load_admin(&self) -> Result<Option<String>, StoreError>;
}

pub trait VaultStore: Send + Sync {
    /// Write the changed account balances and the new escrow total as one
    /// atomic batch
    fn save_balances(&self, balances: &[(&str, Amount)], escrow: Amount) -> Result<(), StoreError>;

    /// `None` when no balance was ever written
    fn load_vault(&self) -> Result<Option<VaultSnapshot>, StoreError>;
}

/// No durability; the in-memory ledger is the only copy
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryStore;

impl MarketStore for MemoryStore {
    fn save(&self, _book: &MarketBook) -> Result<(), StoreError> {
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<MarketBook>, StoreError> {
        Ok(Vec::new())
    }

    fn save_admin(&self, _admin: &str) -> Result<(), StoreError> {
        Ok(())
    }

    fn load_admin(&self) -> Result<Option<String>, StoreError> {
        Ok(None)
    }
}

impl VaultStore for MemoryStore {
    fn save_balances(&self, _balances: &[(&str, Amount)], _escrow: Amount) -> Result<(), StoreError> {
        Ok(())
    }

    fn load_vault(&self) -> Result<Option<VaultSnapshot>, StoreError> {
        Ok(None)
    }
}

/// sled-backed store.
///
/// - `markets`: one bincode record per market keyed by big-endian id
/// - `vault`: `account/<name>` and `escrow` keys, big-endian u64 values
/// - `meta`: the current admin
pub struct SledStore {
    db: sled::Db,
    tree: sled::Tree,
    vault: sled::Tree,
    meta: sled::Tree,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Throwaway database removed on drop
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, StoreError> {
        let tree = db.open_tree(MARKETS_TREE)?;
        let vault = db.open_tree(VAULT_TREE)?;
        let meta = db.open_tree(META_TREE)?;
        Ok(Self { db, tree, vault, meta })
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

fn account_key(account: &str) -> Vec<u8> {
    let mut key = ACCOUNT_PREFIX.to_vec();
    key.extend_from_slice(account.as_bytes());
    key
}

fn decode_amount(bytes: &[u8]) -> Result<Amount, StoreError> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::Codec(format!("expected 8-byte amount, got {} bytes", bytes.len())))?;
    Ok(Amount::from_be_bytes(raw))
}

impl MarketStore for SledStore {
    fn save(&self, book: &MarketBook) -> Result<(), StoreError> {
        let bytes = bincode::serialize(book)?;
        self.tree.insert(book.market.id.to_be_bytes(), bytes)?;
        self.db.flush()?;
        tracing::debug!(market_id = book.market.id, stakes = book.stakes.len(), "market book persisted");
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<MarketBook>, StoreError> {
        let mut books = Vec::new();
        for entry in self.tree.iter() {
            let (_, value) = entry?;
            books.push(bincode::deserialize::<MarketBook>(&value)?);
        }
        Ok(books)
    }

    fn save_admin(&self, admin: &str) -> Result<(), StoreError> {
        self.meta.insert(ADMIN_KEY, admin.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    fn load_admin(&self) -> Result<Option<String>, StoreError> {
        match self.meta.get(ADMIN_KEY)? {
            Some(value) => String::from_utf8(value.to_vec())
                .map(Some)
                .map_err(|e| StoreError::Codec(e.to_string())),
            None => Ok(None),
        }
    }
}

impl VaultStore for SledStore {
    fn save_balances(&self, balances: &[(&str, Amount)], escrow: Amount) -> Result<(), StoreError> {
        let mut batch = sled::Batch::default();
        for (account, balance) in balances {
            batch.insert(account_key(account), &balance.to_be_bytes()[..]);
        }
        batch.insert(ESCROW_KEY, &escrow.to_be_bytes()[..]);
        self.vault.apply_batch(batch)?;
        self.db.flush()?;
        tracing::debug!(accounts = balances.len(), escrow, "vault balances persisted");
        Ok(())
    }

    fn load_vault(&self) -> Result<Option<VaultSnapshot>, StoreError> {
        let escrow = match self.vault.get(ESCROW_KEY)? {
            Some(value) => decode_amount(&value)?,
            None => return Ok(None),
        };

        let mut balances = HashMap::new();
        for entry in self.vault.scan_prefix(ACCOUNT_PREFIX) {
            let (key, value) = entry?;
            let account = String::from_utf8(key[ACCOUNT_PREFIX.len()..].to_vec())
                .map_err(|e| StoreError::Codec(e.to_string()))?;
            balances.insert(account, decode_amount(&value)?);
        }
        Ok(Some(VaultSnapshot { balances, escrow }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Market, MarketStatus, Side, Stake};

    fn sample_book(id: u64) -> MarketBook {
        let market = Market {
            id,
            question: format!("Question {}", id),
            description: "desc".into(),
            creator: "alice".into(),
            deadline: 1_000,
            resolution_date: 2_000,
            yes_pool: 900_000,
            no_pool: 0,
            bounty_pool: 100_000,
            status: MarketStatus::Active,
            correct_answer: None,
            actual_timestamp: None,
            bounty_claimant: None,
            created_at: 10,
            settlement: None,
        };
        MarketBook {
            market,
            stakes: vec![Stake {
                id: 1,
                market_id: id,
                staker: "bob".into(),
                side: Side::Yes,
                amount: 1_000_000,
                pool_contribution: 900_000,
                bounty_contribution: 100_000,
                timestamp_guess: 1_500,
                created_at: 20,
            }],
        }
    }

    #[test]
    fn test_sled_store_saves_and_loads_in_id_order() {
        let store = SledStore::temporary().unwrap();
        store.save(&sample_book(2)).unwrap();
        store.save(&sample_book(1)).unwrap();
        store.save(&sample_book(300)).unwrap();

        let books = store.load_all().unwrap();
        let ids: Vec<u64> = books.iter().map(|b| b.market.id).collect();
        assert_eq!(ids, vec![1, 2, 300]);
        assert_eq!(books[0], sample_book(1));
    }

    #[test]
    fn test_sled_store_overwrites_record() {
        let store = SledStore::temporary().unwrap();
        let mut book = sample_book(1);
        store.save(&book).unwrap();
        book.market.status = MarketStatus::Resolved;
        store.save(&book).unwrap();

        let books = store.load_all().unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].market.status, MarketStatus::Resolved);
    }

    #[test]
    fn test_memory_store_is_empty() {
        let store = MemoryStore;
        store.save(&sample_book(1)).unwrap();
        assert!(store.load_all().unwrap().is_empty());
        assert_eq!(store.load_vault().unwrap(), None);
        assert_eq!(store.load_admin().unwrap(), None);
    }

    #[test]
    fn test_sled_store_vault_balances() {
        let store = SledStore::temporary().unwrap();
        assert_eq!(store.load_vault().unwrap(), None);

        store.save_balances(&[("alice", 700), ("bob", 50)], 0).unwrap();
        store.save_balances(&[("alice", 500)], 200).unwrap();

        let snapshot = store.load_vault().unwrap().unwrap();
        assert_eq!(snapshot.escrow, 200);
        assert_eq!(snapshot.balances.get("alice"), Some(&500));
        assert_eq!(snapshot.balances.get("bob"), Some(&50));
        assert_eq!(snapshot.balances.len(), 2);
    }

    #[test]
    fn test_sled_store_admin_round_trip() {
        let store = SledStore::temporary().unwrap();
        assert_eq!(store.load_admin().unwrap(), None);
        store.save_admin("ops").unwrap();
        assert_eq!(store.load_admin().unwrap(), Some("ops".to_string()));
    }
}
