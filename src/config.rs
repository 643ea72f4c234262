//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (RPC URL, private keys) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::time::Duration;

use alloy::primitives::Address;

use crate::engine::PipelineConfig;
use crate::types::{Amount, CollectionRef, CostEstimate, PipelineError};

/// Label given to the funding source wallet.
pub const FUNDING_LABEL: &str = "main";

const SIMULATED_MODE: &str = "simulated";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub wallets: WalletsConfig,
    pub collection: CollectionConfig,
    pub costs: CostsConfig,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    /// Chain id the RPC endpoint must report (8453 = Base).
    pub chain_id: u64,
    pub rpc_url_env: String,
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WalletsConfig {
    pub funding_key_env: String,
    /// Chain wallets in processing order.
    pub chain: Vec<ChainWalletConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChainWalletConfig {
    pub label: String,
    pub key_env: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectionConfig {
    pub contract: String,
    pub slug: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CostsConfig {
    /// Expected acquisition price, in whole native units.
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    /// Fee margin held on top of the price, in whole native units.
    #[serde(with = "rust_decimal::serde::str")]
    pub gas_buffer: Decimal,
    #[serde(default = "default_transfer_gas_limit")]
    pub transfer_gas_limit: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AcquisitionConfig {
    /// Only `"simulated"` is implemented.
    #[serde(default = "default_acquisition_mode")]
    pub mode: String,
    #[serde(default = "default_simulated_delay")]
    pub simulated_delay_ms: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            mode: default_acquisition_mode(),
            simulated_delay_ms: default_simulated_delay(),
        }
    }
}

fn default_confirmation_timeout() -> u64 {
    180
}

fn default_confirmations() -> u64 {
    1
}

fn default_transfer_gas_limit() -> u64 {
    21_000
}

fn default_acquisition_mode() -> String {
    SIMULATED_MODE.to_string()
}

fn default_simulated_delay() -> u64 {
    2_000
}

/// Private keys resolved from the environment, in chain order.
pub struct WalletKeys {
    pub funding: SecretString,
    pub chain: Vec<(String, SecretString)>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that could never produce a sane run.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.wallets.chain.is_empty() {
            return Err(PipelineError::Configuration(
                "wallets.chain must list at least one wallet".into(),
            ));
        }
        if self.costs.transfer_gas_limit == 0 {
            return Err(PipelineError::Configuration(
                "costs.transfer_gas_limit must be greater than zero".into(),
            ));
        }
        if self.network.confirmation_timeout_secs == 0 {
            return Err(PipelineError::Configuration(
                "network.confirmation_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.network.confirmations == 0 {
            return Err(PipelineError::Configuration(
                "network.confirmations must be at least 1".into(),
            ));
        }
        if self.acquisition.mode != SIMULATED_MODE {
            return Err(PipelineError::Configuration(format!(
                "acquisition.mode {:?} is not supported (expected \"{SIMULATED_MODE}\")",
                self.acquisition.mode
            )));
        }

        let mut envs = HashSet::new();
        envs.insert(self.wallets.funding_key_env.as_str());
        for wallet in &self.wallets.chain {
            if !envs.insert(wallet.key_env.as_str()) {
                return Err(PipelineError::Configuration(format!(
                    "key env {} is used by more than one wallet",
                    wallet.key_env
                )));
            }
        }

        self.collection_ref()?;
        self.cost_estimate()?;
        Ok(())
    }

    pub fn collection_ref(&self) -> Result<CollectionRef, PipelineError> {
        let contract: Address = self.collection.contract.parse().map_err(|_| {
            PipelineError::Configuration(format!(
                "collection.contract is not an address: {}",
                self.collection.contract
            ))
        })?;
        Ok(CollectionRef {
            contract,
            slug: self.collection.slug.clone(),
        })
    }

    pub fn cost_estimate(&self) -> Result<CostEstimate, PipelineError> {
        Ok(CostEstimate {
            price: Amount::from_native(self.costs.price)?,
            gas_buffer: Amount::from_native(self.costs.gas_buffer)?,
        })
    }

    pub fn pipeline_config(&self) -> Result<PipelineConfig, PipelineError> {
        Ok(PipelineConfig {
            target_chain_id: self.network.chain_id,
            cost_estimate: self.cost_estimate()?,
            transfer_gas_limit: self.costs.transfer_gas_limit,
        })
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.network.confirmation_timeout_secs)
    }

    pub fn simulated_delay(&self) -> Duration {
        Duration::from_millis(self.acquisition.simulated_delay_ms)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    pub fn resolve_secret(env_name: &str) -> Result<SecretString> {
        Self::resolve_env(env_name).map(SecretString::new)
    }

    /// Read every wallet's private key from the environment.
    pub fn wallet_keys(&self) -> Result<WalletKeys> {
        let funding = Self::resolve_secret(&self.wallets.funding_key_env)?;
        let chain = self
            .wallets
            .chain
            .iter()
            .map(|w| Ok((w.label.clone(), Self::resolve_secret(&w.key_env)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(WalletKeys { funding, chain })
    }
}
