use betchain_types::{Amount, AmountError};
use commonware_cryptography::{
    ed25519::{PrivateKey, PublicKey},
    PrivateKeyExt, Signer,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, str::FromStr};
use thiserror::Error;
use tracing::Level;

/// Configuration for the [crate::Simulator], read from YAML.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub log_level: String,

    /// Subsidy of the first block, in coins.
    pub initial_subsidy: String,
    #[serde(default = "default_halving_interval")]
    pub halving_interval: u64,
    /// Key seed of the block producer.
    pub miner: u64,

    pub accounts: Vec<AccountConfig>,

    #[serde(default = "default_queue_max_backlog")]
    pub queue_max_backlog: usize,
    #[serde(default = "default_queue_max_transactions")]
    pub queue_max_transactions: usize,

    /// Most blocks a single generate request may produce.
    #[serde(default = "default_generate_max_blocks")]
    pub generate_max_blocks: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AccountConfig {
    pub name: String,
    pub seed: u64,
    /// Genesis balance, in coins.
    pub balance: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid log level: {value}")]
    InvalidLogLevel { value: String },
    #[error("{field} must be > 0 (got {value})")]
    InvalidNonZero { field: &'static str, value: u64 },
    #[error("{field} is not a valid amount: {value}")]
    InvalidAmount {
        field: String,
        value: String,
        #[source]
        source: AmountError,
    },
    #[error("account {0} is defined more than once")]
    DuplicateAccount(String),
    #[error("account {0} uses the miner seed")]
    MinerAccount(String),
}

/// A named key the simulator signs placements with.
#[derive(Clone)]
pub struct Wallet {
    pub name: String,
    pub private: PrivateKey,
    pub public: PublicKey,
    pub genesis_balance: u64,
}

impl Wallet {
    pub fn from_seed(name: String, seed: u64, genesis_balance: u64) -> Self {
        let private = PrivateKey::from_seed(seed);
        let public = private.public_key();
        Self {
            name,
            private,
            public,
            genesis_balance,
        }
    }
}

pub struct ValidatedConfig {
    pub port: u16,
    pub log_level: Level,

    pub initial_subsidy: u64,
    pub halving_interval: u64,
    pub miner: PublicKey,
    pub wallets: Vec<Wallet>,

    pub queue_max_backlog: usize,
    pub queue_max_transactions: usize,

    pub generate_max_blocks: u64,
}

fn default_halving_interval() -> u64 {
    150
}

fn default_queue_max_backlog() -> usize {
    64
}

fn default_queue_max_transactions() -> usize {
    100_000
}

fn default_generate_max_blocks() -> u64 {
    100
}

fn parse_amount(field: impl Into<String>, value: &str) -> Result<u64, ConfigError> {
    Amount::from_str(value)
        .map(|amount| amount.units())
        .map_err(|source| ConfigError::InvalidAmount {
            field: field.into(),
            value: value.to_string(),
            source,
        })
}

fn non_zero(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidNonZero { field, value });
    }
    Ok(())
}

impl Config {
    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        non_zero("halving_interval", self.halving_interval)?;
        non_zero("queue_max_backlog", self.queue_max_backlog as u64)?;
        non_zero("queue_max_transactions", self.queue_max_transactions as u64)?;
        non_zero("generate_max_blocks", self.generate_max_blocks)?;

        let log_level =
            Level::from_str(&self.log_level).map_err(|_| ConfigError::InvalidLogLevel {
                value: self.log_level.clone(),
            })?;
        let initial_subsidy = parse_amount("initial_subsidy", &self.initial_subsidy)?;

        let mut names = BTreeSet::new();
        let mut wallets = Vec::with_capacity(self.accounts.len());
        for account in self.accounts {
            if !names.insert(account.name.clone()) {
                return Err(ConfigError::DuplicateAccount(account.name));
            }
            if account.seed == self.miner {
                return Err(ConfigError::MinerAccount(account.name));
            }
            let balance = parse_amount(format!("accounts.{}.balance", account.name), &account.balance)?;
            wallets.push(Wallet::from_seed(account.name, account.seed, balance));
        }

        Ok(ValidatedConfig {
            port: self.port,
            log_level,
            initial_subsidy,
            halving_interval: self.halving_interval,
            miner: PrivateKey::from_seed(self.miner).public_key(),
            wallets,
            queue_max_backlog: self.queue_max_backlog,
            queue_max_transactions: self.queue_max_transactions,
            generate_max_blocks: self.generate_max_blocks,
        })
    }
}
