//! Settlement ledger server binary
//!
//! Opens the ledger, provisions the pool from config when absent, and parks
//! until shutdown. Transport wiring (the bus consumer loop) is deployed
//! alongside, not here.

use cash_ledger::{Config, Error, PaymentService, SettlementLedger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting CashRail ledger server");

    // Load configuration
    let config = Config::from_env()?;
    let opening_balance = config.pool.opening_balance;

    // Open ledger
    let ledger = SettlementLedger::open(config)?;
    tracing::info!("Ledger opened successfully");

    // Provision the pool out-of-band if this is a fresh data directory
    match ledger.provision_pool(opening_balance) {
        Ok(()) => {}
        Err(Error::PoolAlreadyProvisioned) => {
            tracing::info!(
                balance = %ledger.pool_balance()?,
                "Settlement pool already provisioned"
            );
        }
        Err(e) => return Err(e.into()),
    }

    let _payments = PaymentService::new(ledger.storage(), ledger.metrics().clone());

    tracing::info!("Ledger server ready");
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down ledger server");
    Ok(())
}
