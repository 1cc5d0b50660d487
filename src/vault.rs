/// Stablecoin Transfer Service
///
/// The market core moves funds only through `TransferService`:
/// - `debit` pulls a stake from the staker into escrow before the stake is recorded
/// - `credit_batch` pays a whole settlement out of escrow, all or nothing
///
/// `TokenVault` is the bundled in-process implementation: per-account
/// balances plus one escrow account holding every staked unit. Every change
/// is written through its `VaultStore` before it is applied in memory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::models::Amount;
use crate::persistence::{MemoryStore, StoreError, VaultStore};

// ============================================================================
// TYPES
// ============================================================================

/// One payment out of escrow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    pub to: String,
    pub amount: Amount,
}

impl Credit {
    pub fn new(to: &str, amount: Amount) -> Self {
        Self { to: to.to_string(), amount }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    InsufficientBalance { account: String, available: Amount, requested: Amount },
    InsufficientEscrow { available: Amount, requested: Amount },
    /// A balance or batch total would exceed `Amount::MAX`
    Overflow,
    /// The transfer provider refused the operation
    Rejected(String),
    /// The new balances could not be persisted; nothing was applied
    Storage(String),
}

impl std::fmt::Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferError::InsufficientBalance { account, available, requested } => {
                write!(f, "Insufficient balance for {}: have {}, need {}", account, available, requested)
            }
            TransferError::InsufficientEscrow { available, requested } => {
                write!(f, "Insufficient escrow: have {}, need {}", available, requested)
            }
            TransferError::Overflow => write!(f, "Amount overflow"),
            TransferError::Rejected(msg) => write!(f, "Transfer rejected: {}", msg),
            TransferError::Storage(msg) => write!(f, "Vault storage error: {}", msg),
        }
    }
}

impl std::error::Error for TransferError {}

impl From<StoreError> for TransferError {
    fn from(err: StoreError) -> Self {
        TransferError::Storage(err.to_string())
    }
}

pub trait TransferService: Send + Sync {
    /// Move `amount` from `from` into escrow
    fn debit(&self, from: &str, amount: Amount) -> Result<(), TransferError>;

    /// Pay every credit out of escrow, or none of them
    fn credit_batch(&self, credits: &[Credit]) -> Result<(), TransferError>;

    fn credit(&self, to: &str, amount: Amount) -> Result<(), TransferError> {
        self.credit_batch(&[Credit::new(to, amount)])
    }
}

// ============================================================================
// TOKEN VAULT
// ============================================================================

#[derive(Debug, Default)]
struct VaultState {
    balances: HashMap<String, Amount>,
    escrow: Amount,
}

/// Serializable copy of every balance and the escrow
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSnapshot {
    pub balances: HashMap<String, Amount>,
    pub escrow: Amount,
}

/// Stablecoin accounts with a single escrow
pub struct TokenVault {
    state: Mutex<VaultState>,
    store: Arc<dyn VaultStore>,
}

impl Default for TokenVault {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenVault {
    /// Vault with no durability
    pub fn new() -> Self {
        Self::from_snapshot(VaultSnapshot::default(), Arc::new(MemoryStore))
    }

    /// Restore balances and escrow from `store`, starting empty if it holds none
    pub fn open(store: Arc<dyn VaultStore>) -> Result<Self, StoreError> {
        let snapshot = store.load_vault()?.unwrap_or_default();
        tracing::info!(accounts = snapshot.balances.len(), escrow = snapshot.escrow, "vault restored from store");
        Ok(Self::from_snapshot(snapshot, store))
    }

    fn from_snapshot(snapshot: VaultSnapshot, store: Arc<dyn VaultStore>) -> Self {
        Self {
            state: Mutex::new(VaultState {
                balances: snapshot.balances,
                escrow: snapshot.escrow,
            }),
            store,
        }
    }

    pub fn snapshot(&self) -> VaultSnapshot {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        VaultSnapshot {
            balances: state.balances.clone(),
            escrow: state.escrow,
        }
    }

    /// Issue new test tokens to an account, returning its new balance
    pub fn mint(&self, to: &str, amount: Amount) -> Result<Amount, TransferError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let current = state.balances.get(to).copied().unwrap_or(0);
        let balance = current.checked_add(amount).ok_or(TransferError::Overflow)?;

        self.store.save_balances(&[(to, balance)], state.escrow)?;
        state.balances.insert(to.to_string(), balance);
        tracing::info!(account = to, amount, "test tokens minted");
        Ok(balance)
    }

    pub fn balance_of(&self, account: &str) -> Amount {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.balances.get(account).copied().unwrap_or(0)
    }

    /// Units currently held for unsettled and unclaimed stakes
    pub fn escrow_balance(&self) -> Amount {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).escrow
    }
}

impl TransferService for TokenVault {
    fn debit(&self, from: &str, amount: Amount) -> Result<(), TransferError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let available = state.balances.get(from).copied().unwrap_or(0);
        if available < amount {
            return Err(TransferError::InsufficientBalance {
                account: from.to_string(),
                available,
                requested: amount,
            });
        }
        let escrow = state.escrow.checked_add(amount).ok_or(TransferError::Overflow)?;
        let balance = available - amount;

        self.store.save_balances(&[(from, balance)], escrow)?;
        state.balances.insert(from.to_string(), balance);
        state.escrow = escrow;
        tracing::debug!(account = from, amount, escrow, "debited into escrow");
        Ok(())
    }

    fn credit_batch(&self, credits: &[Credit]) -> Result<(), TransferError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        // Stage every new balance first so a failure leaves nothing applied
        let mut staged: HashMap<&str, Amount> = HashMap::new();
        let mut total: Amount = 0;
        for credit in credits {
            total = total.checked_add(credit.amount).ok_or(TransferError::Overflow)?;
            let current = match staged.get(credit.to.as_str()) {
                Some(balance) => *balance,
                None => state.balances.get(&credit.to).copied().unwrap_or(0),
            };
            let next = current.checked_add(credit.amount).ok_or(TransferError::Overflow)?;
            staged.insert(credit.to.as_str(), next);
        }

        if total > state.escrow {
            return Err(TransferError::InsufficientEscrow {
                available: state.escrow,
                requested: total,
            });
        }
        let escrow = state.escrow - total;

        let changes: Vec<(&str, Amount)> = staged.into_iter().collect();
        self.store.save_balances(&changes, escrow)?;

        state.escrow = escrow;
        for (account, balance) in changes {
            state.balances.insert(account.to_string(), balance);
        }
        tracing::debug!(credits = credits.len(), total, "credit batch paid from escrow");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::SledStore;

    #[test]
    fn test_mint_and_balance() {
        let vault = TokenVault::new();
        assert_eq!(vault.balance_of("alice"), 0);
        assert_eq!(vault.mint("alice", 500).unwrap(), 500);
        assert_eq!(vault.mint("alice", 250).unwrap(), 750);
        assert_eq!(vault.balance_of("alice"), 750);
    }

    #[test]
    fn test_debit_moves_into_escrow() {
        let vault = TokenVault::new();
        vault.mint("alice", 1_000).unwrap();
        vault.debit("alice", 400).unwrap();
        assert_eq!(vault.balance_of("alice"), 600);
        assert_eq!(vault.escrow_balance(), 400);
    }

    #[test]
    fn test_debit_insufficient_balance() {
        let vault = TokenVault::new();
        vault.mint("alice", 100).unwrap();
        let result = vault.debit("alice", 101);
        assert!(matches!(result, Err(TransferError::InsufficientBalance { available: 100, requested: 101, .. })));
        assert_eq!(vault.balance_of("alice"), 100);
        assert_eq!(vault.escrow_balance(), 0);
    }

    #[test]
    fn test_credit_batch_pays_all() {
        let vault = TokenVault::new();
        vault.mint("alice", 1_000).unwrap();
        vault.debit("alice", 1_000).unwrap();

        vault
            .credit_batch(&[Credit::new("bob", 300), Credit::new("carol", 200), Credit::new("bob", 100)])
            .unwrap();
        assert_eq!(vault.balance_of("bob"), 400);
        assert_eq!(vault.balance_of("carol"), 200);
        assert_eq!(vault.escrow_balance(), 400);
    }

    #[test]
    fn test_credit_batch_is_all_or_nothing() {
        let vault = TokenVault::new();
        vault.mint("alice", 500).unwrap();
        vault.debit("alice", 500).unwrap();

        let result = vault.credit_batch(&[Credit::new("bob", 300), Credit::new("carol", 300)]);
        assert_eq!(result, Err(TransferError::InsufficientEscrow { available: 500, requested: 600 }));
        assert_eq!(vault.balance_of("bob"), 0);
        assert_eq!(vault.balance_of("carol"), 0);
        assert_eq!(vault.escrow_balance(), 500);
    }

    #[test]
    fn test_reopen_restores_balances_and_escrow() {
        let store = Arc::new(SledStore::temporary().unwrap());
        {
            let vault = TokenVault::open(store.clone()).unwrap();
            vault.mint("alice", 700).unwrap();
            vault.debit("alice", 200).unwrap();
            vault.credit_batch(&[Credit::new("bob", 50)]).unwrap();
        }

        let restored = TokenVault::open(store).unwrap();
        assert_eq!(restored.balance_of("alice"), 500);
        assert_eq!(restored.balance_of("bob"), 50);
        assert_eq!(restored.escrow_balance(), 150);
    }

    #[test]
    fn test_failed_write_leaves_balances_untouched() {
        struct ReadOnly;
        impl VaultStore for ReadOnly {
            fn save_balances(&self, _: &[(&str, Amount)], _: Amount) -> Result<(), StoreError> {
                Err(StoreError::Database("read-only".into()))
            }
            fn load_vault(&self) -> Result<Option<VaultSnapshot>, StoreError> {
                Ok(Some(VaultSnapshot {
                    balances: HashMap::from([("alice".to_string(), 100)]),
                    escrow: 0,
                }))
            }
        }

        let vault = TokenVault::open(Arc::new(ReadOnly)).unwrap();
        let result = vault.debit("alice", 40);
        assert!(matches!(result, Err(TransferError::Storage(_))));
        assert_eq!(vault.balance_of("alice"), 100);
        assert_eq!(vault.escrow_balance(), 0);
    }

    #[test]
    fn test_single_credit_refund() {
        let vault = TokenVault::new();
        vault.mint("alice", 50).unwrap();
        vault.debit("alice", 50).unwrap();
        vault.credit("alice", 50).unwrap();
        assert_eq!(vault.balance_of("alice"), 50);
        assert_eq!(vault.escrow_balance(), 0);
    }
}
