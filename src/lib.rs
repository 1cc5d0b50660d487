/// Bounty Prediction Market
/// Exports all modules for use as a library crate

pub mod models;
pub mod clock;
pub mod market_resolve;
pub mod persistence;
pub mod vault;
pub mod events;
pub mod cache;
pub mod display;
pub mod config;
pub mod app_state;
pub mod handlers;
pub mod routes;

// Re-export the market core
pub use market_resolve::{
    calculate_odds, calculate_potential_payout, calculate_total_pool, split_stake,
    AdminRole, MarketError, MarketManager, Odds, SettlementPlan, StakeLedger,
    BOUNTY_FEE_BPS, BPS_DENOMINATOR,
};
pub use models::{
    Amount, Market, MarketBook, MarketId, MarketStatus, SettlementSummary, Side, Stake, StakeId,
    Timestamp, TOKEN_UNIT,
};

// Re-export the collaborators the core is wired with
pub use clock::{Clock, ManualClock, SystemClock};
pub use persistence::{MarketStore, MemoryStore, SledStore, StoreError, VaultStore};
pub use vault::{Credit, TokenVault, TransferError, TransferService, VaultSnapshot};
pub use events::{EventLog, MarketEvent, RecordedEvent};
pub use cache::{CacheStats, MarketCache};
pub use config::Config;
