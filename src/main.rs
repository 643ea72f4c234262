//! SWEEPCHAIN — sequential wallet funding, acquisition and sweep.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! builds the chain client from the configured wallet keys, and walks the
//! wallet chain once. Ctrl+C stops the run between wallets.

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};

use sweepchain::acquisition::simulated::SimulatedAcquisition;
use sweepchain::chain::rpc::{LocalKey, RpcChainClient};
use sweepchain::config::{self, AppConfig};
use sweepchain::engine::Pipeline;
use sweepchain::types::WalletChain;

const BANNER: &str = r#"
 ___ __      __ ___  ___  ___   ___  _  _    _    ___  _  _
/ __|\ \    / /| __|| __|| _ \ / __|| || |  /_\  |_ _|| \| |
\__ \ \ \/\/ / | _| | _| |  _/| (__ | __ | / _ \  | | | .` |
|___/  \_/\_/  |___||___||_|   \___||_||_|/_/ \_\|___||_|\_|

  fund -> acquire -> sweep, one wallet at a time
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let cfg = AppConfig::load(&config_path)?;

    init_logging();

    println!("{BANNER}");
    info!(
        config = %config_path,
        chain_id = cfg.network.chain_id,
        wallets = cfg.wallets.chain.len(),
        collection = %cfg.collection.slug,
        "SWEEPCHAIN starting up"
    );

    // -- Wallets & chain client ------------------------------------------

    let keys = cfg.wallet_keys()?;
    let funding = LocalKey::parse(config::FUNDING_LABEL, &keys.funding)?;
    let chain_keys = keys
        .chain
        .iter()
        .map(|(label, secret)| LocalKey::parse(label, secret))
        .collect::<Result<Vec<_>, _>>()?;

    let wallets = WalletChain::new(
        funding.wallet().clone(),
        chain_keys.iter().map(|k| k.wallet().clone()).collect(),
    )?;
    for (i, wallet) in wallets.iter().enumerate() {
        info!(position = i + 1, wallet = %wallet, "Chain wallet loaded");
    }

    let rpc_url = AppConfig::resolve_env(&cfg.network.rpc_url_env)?;
    let mut signers = vec![funding];
    signers.extend(chain_keys);
    let client = RpcChainClient::connect(
        &rpc_url,
        signers,
        cfg.network.confirmations,
        cfg.confirmation_timeout(),
    )?;

    let acquisition = SimulatedAcquisition::new(cfg.simulated_delay());
    let collection = cfg.collection_ref()?;

    // -- Shutdown wiring -------------------------------------------------

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Shutdown signal received, finishing current wallet");
            let _ = shutdown_tx.send(true);
        }
    });

    // -- Run -------------------------------------------------------------

    let pipeline = Pipeline::new(
        Box::new(client),
        Box::new(acquisition),
        cfg.pipeline_config()?,
    )
    .with_shutdown(shutdown_rx);

    let report = pipeline
        .run(&wallets, &collection)
        .await
        .context("Run aborted before any wallet was processed")?;

    report.log_summary();

    if std::env::var("SWEEPCHAIN_REPORT_JSON").is_ok() {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sweepchain=info"));

    let json_logging = std::env::var("SWEEPCHAIN_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
