// Application state management

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::address::Address;
use crate::auth::{AuthError, SignedInstruction};
use crate::config::MarketConfig;
use crate::events::MarketEvent;
use crate::market::PredictionMarket;
use crate::oracle::MemoryPriceOracle;
use crate::store::AccountStore;
use crate::token::MemoryTokenLedger;

pub type SharedState = Arc<Mutex<AppState>>;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 1234;

/// Host settings read from `HOST_*` environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub port: u16,
    /// Snapshot file; no persistence when unset
    pub state_path: Option<PathBuf>,
    /// Enables the `/dev/*` endpoints
    pub dev_mode: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT, state_path: None, dev_mode: false }
    }
}

impl HostConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let config = Self {
            port: std::env::var("HOST_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            state_path: std::env::var("HOST_STATE_PATH").ok().map(PathBuf::from),
            dev_mode: std::env::var("HOST_DEV_MODE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        };
        tracing::info!(port = config.port, state_path = ?config.state_path, dev_mode = config.dev_mode, "host config loaded");
        config
    }
}

pub struct AppState {
    pub program: PredictionMarket,
    pub ledger: MemoryTokenLedger,
    pub oracle: MemoryPriceOracle,
    /// Last accepted nonce per signer
    pub nonces: HashMap<Address, u64>,
    pub dev_mode: bool,
    pub state_path: Option<PathBuf>,
}

#[derive(Serialize, Deserialize)]
struct PersistedState {
    accounts: AccountStore,
    events: Vec<MarketEvent>,
    ledger: MemoryTokenLedger,
    oracle: MemoryPriceOracle,
    nonces: HashMap<Address, u64>,
}

impl AppState {
    pub fn new(market_config: MarketConfig, host: &HostConfig) -> Self {
        let mut state = Self {
            program: PredictionMarket::new(market_config),
            ledger: MemoryTokenLedger::new(),
            oracle: MemoryPriceOracle::new(),
            nonces: HashMap::new(),
            dev_mode: host.dev_mode,
            state_path: host.state_path.clone(),
        };

        if state.state_path.is_some() {
            match state.load_from_disk() {
                Ok(()) => tracing::info!(markets = state.program.markets().len(), "loaded persisted state"),
                Err(e) => tracing::info!(reason = %e, "no persisted state, starting fresh"),
            }
        }
        state
    }

    pub fn shared(self) -> SharedState {
        Arc::new(Mutex::new(self))
    }

    /// Replay protection: `nonce` must exceed the last one seen from the signer.
    /// Does not record the nonce.
    pub fn check_nonce(&self, envelope: &SignedInstruction) -> Result<(), AuthError> {
        let last = self.nonces.get(&envelope.signer).copied().unwrap_or(0);
        if envelope.nonce <= last {
            return Err(AuthError::StaleNonce { nonce: envelope.nonce, last });
        }
        Ok(())
    }

    pub fn record_nonce(&mut self, envelope: &SignedInstruction) {
        self.nonces.insert(envelope.signer, envelope.nonce);
    }

    pub fn save_to_disk(&self) -> Result<(), String> {
        let Some(path) = &self.state_path else {
            return Ok(());
        };

        let state = PersistedState {
            accounts: self.program.accounts().clone(),
            events: self.program.events().to_vec(),
            ledger: self.ledger.clone(),
            oracle: self.oracle.clone(),
            nonces: self.nonces.clone(),
        };

        let json = serde_json::to_string_pretty(&state)
            .map_err(|e| format!("Failed to serialize state: {}", e))?;

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| format!("Failed to create state directory: {}", e))?;
        }
        fs::write(path, json).map_err(|e| format!("Failed to write state file: {}", e))?;

        tracing::info!(path = %path.display(), "state saved to disk");
        Ok(())
    }

    fn load_from_disk(&mut self) -> Result<(), String> {
        let path = self.state_path.as_ref().ok_or("No state path configured")?;

        let json = fs::read_to_string(path).map_err(|_| "No state file found")?;
        let state: PersistedState = serde_json::from_str(&json)
            .map_err(|e| format!("Failed to deserialize state: {}", e))?;

        self.program = PredictionMarket::from_parts(self.program.config().clone(), state.accounts, state.events);
        self.ledger = state.ledger;
        self.oracle = state.oracle;
        self.nonces = state.nonces;
        Ok(())
    }
}
