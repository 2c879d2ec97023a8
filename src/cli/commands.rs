//! CLI command implementations

use anyhow::Result;
use dialoguer::Confirm;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::audit::AuditSink;
use crate::authorize::{TransferAuthorizer, TransferOutcome, TransferPolicy};
use crate::config::Config;
use crate::rpc::{MoneroWalletRpc, TransferPriority};
use crate::units;

/// Build the full authorization pipeline from configuration.
fn build_authorizer(config: &Config) -> Result<TransferAuthorizer> {
    let rpc = MoneroWalletRpc::new(
        config.rpc.endpoint.clone(),
        std::time::Duration::from_millis(config.rpc.timeout_ms),
    )?;
    let policy = TransferPolicy::from_config(&config.transfers)?;
    let audit = AuditSink::open(config.audit.log_path.as_deref().map(Path::new));
    Ok(TransferAuthorizer::new(policy, Arc::new(rpc), audit))
}

fn resolve_priority(config: &Config, flag: Option<&str>) -> Result<TransferPriority> {
    match flag {
        Some(s) => Ok(s.parse()?),
        None => Ok(config.transfers.default_priority),
    }
}

/// Submit a transfer for authorization
pub async fn transfer(
    config: &Config,
    destination: &str,
    amount: &str,
    priority: Option<&str>,
    yes: bool,
) -> Result<()> {
    let atomic = units::to_atomic(amount)?;
    let priority = resolve_priority(config, priority)?;
    let authorizer = build_authorizer(config)?;

    info!("Submitting transfer of {} to {}", amount, destination);
    let outcome = authorizer.transfer(destination, &atomic, priority).await?;

    match outcome {
        TransferOutcome::Executed(executed) => {
            println!("Transfer executed:");
            println!("  destination: {}", executed.destination);
            println!("  amount:      {}", units::to_decimal_uint(&executed.amount));
            for hash in &executed.tx_hashes {
                println!("  tx:          {}", hash);
            }
            if let Some(fee) = &executed.fee {
                println!("  fee:         {}", units::to_decimal_uint(fee));
            }
        }
        TransferOutcome::PendingConfirmation { token, preview } => {
            println!("Transfer pending confirmation:");
            println!("  destination: {}", preview.destination);
            if let Some(amount) = &preview.amount {
                println!("  amount:      {}", units::to_decimal_uint(amount));
            }
            match &preview.fee {
                Some(fee) => println!("  est. fee:    {}", units::to_decimal_uint(fee)),
                None => println!("  est. fee:    (unavailable)"),
            }
            println!("  expires:     {}", preview.expires_at);

            let confirmed = yes
                || Confirm::new()
                    .with_prompt("Execute this transfer? This cannot be undone.")
                    .default(false)
                    .interact()?;

            if !confirmed {
                info!("Transfer left unconfirmed; the token expires on its own");
                println!("Not confirmed. Token: {}", token);
                return Ok(());
            }

            let executed = authorizer.confirm(&token).await?;
            println!("Transfer executed:");
            for hash in &executed.tx_hashes {
                println!("  tx: {}", hash);
            }
        }
    }

    Ok(())
}

/// Sweep all unlocked funds to a destination
pub async fn sweep(
    config: &Config,
    destination: &str,
    priority: Option<&str>,
    yes: bool,
) -> Result<()> {
    let priority = resolve_priority(config, priority)?;
    let authorizer = build_authorizer(config)?;

    warn!("Sweep moves the entire unlocked balance to {}", destination);
    let outcome = authorizer.sweep_all(destination, priority).await?;

    match outcome {
        TransferOutcome::Executed(executed) => {
            println!("Sweep executed:");
            println!("  destination: {}", executed.destination);
            println!("  amount:      {}", units::to_decimal_uint(&executed.amount));
            for hash in &executed.tx_hashes {
                println!("  tx:          {}", hash);
            }
        }
        TransferOutcome::PendingConfirmation { token, preview } => {
            println!("Sweep pending confirmation:");
            println!("  destination: {}", preview.destination);
            if let Some(amount) = &preview.amount {
                println!("  unlocked:    {}", units::to_decimal_uint(amount));
            }
            match &preview.fee {
                Some(fee) => println!("  est. fee:    {}", units::to_decimal_uint(fee)),
                None => println!("  est. fee:    (unavailable)"),
            }
            println!("  expires:     {}", preview.expires_at);

            let confirmed = yes
                || Confirm::new()
                    .with_prompt("Sweep ALL unlocked funds? This cannot be undone.")
                    .default(false)
                    .interact()?;

            if !confirmed {
                info!("Sweep left unconfirmed; the token expires on its own");
                println!("Not confirmed. Token: {}", token);
                return Ok(());
            }

            let executed = authorizer.confirm(&token).await?;
            println!("Sweep executed:");
            println!("  amount: {}", units::to_decimal_uint(&executed.amount));
            for hash in &executed.tx_hashes {
                println!("  tx:     {}", hash);
            }
        }
    }

    Ok(())
}

/// Redeem a previously issued confirmation token
pub async fn confirm(config: &Config, token: &str) -> Result<()> {
    let authorizer = build_authorizer(config)?;

    let executed = authorizer.confirm(token).await?;
    println!("Executed:");
    println!("  destination: {}", executed.destination);
    println!("  amount:      {}", units::to_decimal_uint(&executed.amount));
    for hash in &executed.tx_hashes {
        println!("  tx:          {}", hash);
    }

    Ok(())
}

/// Show authorization status and limiter state
pub async fn status(config: &Config) -> Result<()> {
    let authorizer = build_authorizer(config)?;
    let status = authorizer.status().await;

    println!("Transfer authorization status:");
    println!("  enabled:              {}", status.enabled);
    println!("  require_confirmation: {}", status.require_confirmation);
    println!("  sent in last 24h:     {}", status.sent_in_window);
    println!(
        "  daily limit:          {}",
        status.daily_limit.as_deref().unwrap_or("(none)")
    );
    match status.last_success {
        Some(at) => println!("  last transfer:        {}", at),
        None => println!("  last transfer:        (never)"),
    }
    println!("  pending tokens:       {}", status.pending_confirmations);

    Ok(())
}

/// Show configuration with secrets masked
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}
