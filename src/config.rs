// Service configuration, read from the environment (and `.env` when present)

use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:1234";
pub const DEFAULT_ADMIN: &str = "admin";
pub const DEFAULT_CACHE_MAX_AGE_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Identity allowed to verify bounty claims and resolve markets
    pub admin_address: String,
    pub bind_addr: SocketAddr,
    /// sled database directory; in-memory only when unset
    pub data_dir: Option<PathBuf>,
    pub cache_max_age_secs: u64,
    /// Lets the admin mint test tokens through `POST /faucet`
    pub faucet_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            admin_address: DEFAULT_ADMIN.to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 1234)),
            data_dir: None,
            cache_max_age_secs: DEFAULT_CACHE_MAX_AGE_SECS,
            faucet_enabled: false,
        }
    }
}

impl Config {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Result<Self, String> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let admin_address = lookup("ADMIN_ADDRESS")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ADMIN.to_string());

        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| format!("Invalid BIND_ADDR: {}", e))?;

        let data_dir = lookup("DATA_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let cache_max_age_secs = match lookup("CACHE_MAX_AGE_SECS") {
            Some(v) => v
                .parse::<u64>()
                .map_err(|e| format!("Invalid CACHE_MAX_AGE_SECS: {}", e))?,
            None => DEFAULT_CACHE_MAX_AGE_SECS,
        };

        let faucet_enabled = lookup("FAUCET_ENABLED")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(Self {
            admin_address,
            bind_addr,
            data_dir,
            cache_max_age_secs,
            faucet_enabled,
        })
    }
}
