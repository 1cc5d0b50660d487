// Application state management

use std::sync::Arc;

use crate::cache::MarketCache;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::market_resolve::{MarketManager, StakeLedger};
use crate::persistence::{MarketStore, MemoryStore, SledStore, VaultStore};
use crate::vault::TokenVault;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: Config,
    pub manager: Arc<MarketManager>,
    pub cache: MarketCache,
    pub vault: Arc<TokenVault>,
    sled: Option<Arc<SledStore>>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, String> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Markets, balances and the admin share one sled database under
    /// `DATA_DIR`, each written through as it changes
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self, String> {
        let sled = match &config.data_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .map_err(|e| format!("Failed to create data dir {}: {}", dir.display(), e))?;
                let store = SledStore::open(dir.join("markets"))
                    .map_err(|e| format!("Failed to open store: {}", e))?;
                tracing::info!(path = %dir.display(), "using sled store");
                Some(Arc::new(store))
            }
            None => {
                tracing::info!("using in-memory store");
                None
            }
        };

        let (market_store, vault_store): (Arc<dyn MarketStore>, Arc<dyn VaultStore>) = match &sled {
            Some(store) => (store.clone(), store.clone()),
            None => (Arc::new(MemoryStore), Arc::new(MemoryStore)),
        };

        let ledger = StakeLedger::open(market_store).map_err(|e| e.to_string())?;
        let vault = Arc::new(TokenVault::open(vault_store).map_err(|e| e.to_string())?);
        let manager = Arc::new(MarketManager::new(
            ledger,
            config.admin_address.clone(),
            vault.clone(),
            clock,
        ));
        let cache = MarketCache::new(manager.clone(), config.cache_max_age_secs);

        tracing::info!(
            admin = %manager.admin(),
            markets = manager.ledger().market_count(),
            escrow = vault.escrow_balance(),
            faucet = config.faucet_enabled,
            "bounty market state initialized"
        );

        Ok(Self { config, manager, cache, vault, sled })
    }

    /// Flush pending sled writes; every change is already written through
    pub fn flush(&self) -> Result<(), String> {
        let Some(store) = &self.sled else {
            return Ok(());
        };
        store.flush().map_err(|e| format!("Failed to flush store: {}", e))?;
        tracing::info!("store flushed to disk");
        Ok(())
    }
}
