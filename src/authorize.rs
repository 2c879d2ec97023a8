//! Transfer authorization orchestrator
//!
//! Composes the guard chain, confirmation store, rate limiter, audit sink,
//! and wallet service into the request -> validate -> (confirm | execute) ->
//! record state machine. This is the only module that calls the wallet
//! service for previews and execution.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use num_bigint::BigUint;
use tracing::{debug, info, warn};

use crate::address::{Address, Network};
use crate::audit::{AuditRecord, AuditSink};
use crate::config::TransfersConfig;
use crate::confirm::{ConfirmationStore, IntentKind, PendingIntent};
use crate::error::{Error, Result};
use crate::guard::{
    AllowlistGuard, AmountCeilingGuard, Guard, GuardContext, RateLimitGuard, RateLimiter,
    RemoteAddressGuard,
};
use crate::rpc::{TransferPriority, WalletRpc};
use crate::units;

/// Operator policy consumed by the authorizer. Loading and parsing happen in
/// [`crate::config`]; by the time a policy exists every amount is atomic.
#[derive(Debug, Clone)]
pub struct TransferPolicy {
    /// Master switch. Off means no guard below is even reached.
    pub enabled: bool,

    /// Network every destination must claim and match.
    pub network: Network,

    /// Optional per-transfer ceiling in atomic units.
    pub max_transfer: Option<BigUint>,

    /// Optional rolling 24-hour cumulative ceiling in atomic units.
    pub daily_limit: Option<BigUint>,

    /// Minimum elapsed time between successful transfers.
    pub cooldown: Duration,

    /// Exact-match destination allowlist. None or empty means unrestricted.
    pub allowlist: Option<Vec<String>>,

    /// Defer execution behind a single-use confirmation token.
    pub require_confirmation: bool,
}

impl TransferPolicy {
    /// Convert the serialized config section into an atomic-unit policy.
    pub fn from_config(cfg: &TransfersConfig) -> Result<Self> {
        let max_transfer = cfg
            .max_transfer
            .as_deref()
            .map(units::to_atomic)
            .transpose()?;
        let daily_limit = cfg
            .daily_limit
            .as_deref()
            .map(units::to_atomic)
            .transpose()?;

        Ok(Self {
            enabled: cfg.enabled,
            network: cfg.network,
            max_transfer,
            daily_limit,
            cooldown: Duration::seconds(cfg.cooldown_secs as i64),
            allowlist: if cfg.allowlist.is_empty() {
                None
            } else {
                Some(cfg.allowlist.clone())
            },
            require_confirmation: cfg.require_confirmation,
        })
    }
}

/// Preview returned alongside a confirmation token.
#[derive(Debug, Clone)]
pub struct TransferPreview {
    pub destination: String,

    /// Atomic amount. For sweeps this is a snapshot of the unlocked balance
    /// at preview time, not a promise - the real amount is derived again at
    /// redemption.
    pub amount: Option<BigUint>,

    /// Estimated fee in atomic units; None when the preview call failed.
    pub fee: Option<BigUint>,

    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Receipt for an executed transfer or sweep.
#[derive(Debug, Clone)]
pub struct ExecutedTransfer {
    pub destination: String,

    /// Total atomic amount moved.
    pub amount: BigUint,

    pub tx_hashes: Vec<String>,
    pub tx_key: Option<String>,

    /// Total fee in atomic units, when reported.
    pub fee: Option<BigUint>,
}

/// Outcome of an authorization request.
#[derive(Debug, Clone)]
pub enum TransferOutcome {
    /// Executed immediately.
    Executed(ExecutedTransfer),

    /// Deferred; redeem the token within its TTL to execute.
    PendingConfirmation {
        token: String,
        preview: TransferPreview,
    },
}

/// Point-in-time view for operators.
#[derive(Debug, Clone)]
pub struct AuthorizerStatus {
    pub enabled: bool,
    pub require_confirmation: bool,
    /// Decimal amount sent inside the current rolling window.
    pub sent_in_window: String,
    pub daily_limit: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
    pub pending_confirmations: usize,
}

/// The authorization pipeline.
pub struct TransferAuthorizer {
    policy: TransferPolicy,
    rpc: Arc<dyn WalletRpc>,
    limiter: Arc<RateLimiter>,
    allowlist: AllowlistGuard,
    remote: RemoteAddressGuard,
    ceiling: AmountCeilingGuard,
    limit_guard: RateLimitGuard,
    confirmations: ConfirmationStore,
    audit: AuditSink,
}

impl TransferAuthorizer {
    pub fn new(policy: TransferPolicy, rpc: Arc<dyn WalletRpc>, audit: AuditSink) -> Self {
        let limiter = Arc::new(RateLimiter::new(
            policy.cooldown,
            policy.daily_limit.clone(),
        ));
        Self {
            allowlist: AllowlistGuard::new(policy.allowlist.clone()),
            remote: RemoteAddressGuard::new(Arc::clone(&rpc)),
            ceiling: AmountCeilingGuard::new(policy.max_transfer.clone()),
            limit_guard: RateLimitGuard::new(Arc::clone(&limiter)),
            limiter,
            confirmations: ConfirmationStore::new(),
            policy,
            rpc,
            audit,
        }
    }

    /// Authorize, and unless confirmation is required, execute a transfer.
    pub async fn transfer(
        &self,
        destination: &str,
        amount: &BigUint,
        priority: TransferPriority,
    ) -> Result<TransferOutcome> {
        let now = Utc::now();
        let result = self
            .transfer_inner(destination, amount, priority, now)
            .await;
        self.audit_decision("transfer", Some(destination), Some(amount), &result);
        result
    }

    /// Authorize, and unless confirmation is required, sweep all unlocked
    /// funds to the destination.
    pub async fn sweep_all(
        &self,
        destination: &str,
        priority: TransferPriority,
    ) -> Result<TransferOutcome> {
        let now = Utc::now();
        let result = self.sweep_inner(destination, priority, now).await;
        self.audit_decision("sweep_all", Some(destination), None, &result);
        result
    }

    /// Redeem a confirmation token. The full guard sequence runs again
    /// against current state before anything executes.
    pub async fn confirm(&self, token: &str) -> Result<ExecutedTransfer> {
        let now = Utc::now();

        let intent = match self.consume_intent(token, now) {
            Ok(intent) => intent,
            Err(e) => {
                // nothing known about the intent; the token never resolved
                self.audit
                    .record(&AuditRecord::rejected("confirm", None, None, &e));
                return Err(e);
            }
        };

        // keep the intent's identifying fields for the audit record even
        // when the guard re-run rejects it
        let destination = intent.destination.to_string();
        let amount = match &intent.kind {
            IntentKind::Transfer { amount } => Some(units::to_decimal_uint(amount)),
            IntentKind::SweepAll => None,
        };

        let result = self.execute_intent(intent, now).await;
        match &result {
            Ok(executed) => self.audit.record(&AuditRecord::allowed(
                "confirm",
                Some(executed.destination.clone()),
                Some(units::to_decimal_uint(&executed.amount)),
                "executed",
                true,
            )),
            Err(e) if e.is_rejection() => {
                self.audit.record(&AuditRecord::rejected(
                    "confirm",
                    Some(destination),
                    amount,
                    e,
                ));
            }
            Err(e) => {
                let mut record = AuditRecord::allowed(
                    "confirm",
                    Some(destination),
                    amount,
                    e.reason_tag(),
                    false,
                );
                record.reason = Some(e.to_string());
                self.audit.record(&record);
            }
        }
        result
    }

    /// Current limiter and confirmation state for operator display.
    pub async fn status(&self) -> AuthorizerStatus {
        let now = Utc::now();
        self.confirmations.purge_expired(now);
        AuthorizerStatus {
            enabled: self.policy.enabled,
            require_confirmation: self.policy.require_confirmation,
            sent_in_window: units::to_decimal_uint(&self.limiter.sent_in_window(now).await),
            daily_limit: self.policy.daily_limit.as_ref().map(units::to_decimal_uint),
            last_success: self.limiter.last_success().await,
            pending_confirmations: self.confirmations.pending_count(),
        }
    }

    // Guard ordering is fixed here and nowhere else.
    fn address_guards(&self) -> [&dyn Guard; 2] {
        [&self.allowlist, &self.remote]
    }

    fn amount_guards(&self) -> [&dyn Guard; 2] {
        [&self.ceiling, &self.limit_guard]
    }

    async fn run_guards(&self, guards: &[&dyn Guard], ctx: &GuardContext<'_>) -> Result<()> {
        for guard in guards {
            if let Err(e) = guard.evaluate(ctx).await {
                debug!(guard = guard.name(), error = %e, "guard rejected request");
                return Err(e);
            }
        }
        Ok(())
    }

    async fn check_guards(
        &self,
        address: &Address,
        amount: &BigUint,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let ctx = GuardContext {
            destination: address,
            amount: Some(amount),
            now,
        };
        self.run_guards(&self.address_guards(), &ctx).await?;
        self.run_guards(&self.amount_guards(), &ctx).await
    }

    async fn transfer_inner(
        &self,
        destination: &str,
        amount: &BigUint,
        priority: TransferPriority,
        now: DateTime<Utc>,
    ) -> Result<TransferOutcome> {
        if !self.policy.enabled {
            return Err(Error::TransfersDisabled);
        }

        let address = Address::parse(destination, self.policy.network)?;
        self.check_guards(&address, amount, now).await?;

        if self.policy.require_confirmation {
            // fee preview is best effort; a failed preview drops the estimate
            let fee = match self
                .rpc
                .transfer(address.as_str(), amount, priority, false)
                .await
            {
                Ok(receipt) => receipt.fee,
                Err(e) => {
                    warn!(error = %e, "fee preview failed; omitting estimate");
                    None
                }
            };

            let (token, intent) = self.confirmations.create(
                IntentKind::Transfer {
                    amount: amount.clone(),
                },
                address.clone(),
                priority,
                now,
            );
            info!(
                destination = %address,
                amount = %units::to_decimal_uint(amount),
                expires_at = %intent.expires_at,
                "transfer pending confirmation"
            );
            return Ok(TransferOutcome::PendingConfirmation {
                token,
                preview: TransferPreview {
                    destination: address.to_string(),
                    amount: Some(amount.clone()),
                    fee,
                    created_at: intent.created_at,
                    expires_at: intent.expires_at,
                },
            });
        }

        let executed = self.execute_transfer(&address, amount, priority).await?;
        Ok(TransferOutcome::Executed(executed))
    }

    async fn sweep_inner(
        &self,
        destination: &str,
        priority: TransferPriority,
        now: DateTime<Utc>,
    ) -> Result<TransferOutcome> {
        if !self.policy.enabled {
            return Err(Error::TransfersDisabled);
        }

        let address = Address::parse(destination, self.policy.network)?;

        // address-level guards run before the balance is even queried
        let ctx = GuardContext {
            destination: &address,
            amount: None,
            now,
        };
        self.run_guards(&self.address_guards(), &ctx).await?;

        let balance = self.rpc.unlocked_balance().await?;
        if balance == BigUint::from(0u8) {
            return Err(Error::NoUnlockedBalance);
        }

        let ctx = GuardContext {
            destination: &address,
            amount: Some(&balance),
            now,
        };
        self.run_guards(&self.amount_guards(), &ctx).await?;

        if self.policy.require_confirmation {
            let fee = match self.rpc.sweep_all(address.as_str(), priority, false).await {
                Ok(receipt) => Some(units::sum(receipt.fees.iter())),
                Err(e) => {
                    warn!(error = %e, "sweep fee preview failed; omitting estimate");
                    None
                }
            };

            let (token, intent) =
                self.confirmations
                    .create(IntentKind::SweepAll, address.clone(), priority, now);
            info!(
                destination = %address,
                balance = %units::to_decimal_uint(&balance),
                expires_at = %intent.expires_at,
                "sweep pending confirmation"
            );
            return Ok(TransferOutcome::PendingConfirmation {
                token,
                preview: TransferPreview {
                    destination: address.to_string(),
                    amount: Some(balance),
                    fee,
                    created_at: intent.created_at,
                    expires_at: intent.expires_at,
                },
            });
        }

        let executed = self.execute_sweep(&address, priority).await?;
        Ok(TransferOutcome::Executed(executed))
    }

    fn consume_intent(&self, token: &str, now: DateTime<Utc>) -> Result<PendingIntent> {
        // the master switch applies at redemption too
        if !self.policy.enabled {
            return Err(Error::TransfersDisabled);
        }
        self.confirmations.consume(token, now)
    }

    async fn execute_intent(
        &self,
        intent: PendingIntent,
        now: DateTime<Utc>,
    ) -> Result<ExecutedTransfer> {
        // A preview is not an execution promise: allowlists and limits may
        // have changed since the token was issued, so every check runs again.
        match intent.kind {
            IntentKind::Transfer { amount } => {
                self.check_guards(&intent.destination, &amount, now).await?;
                self.execute_transfer(&intent.destination, &amount, intent.priority)
                    .await
            }
            IntentKind::SweepAll => {
                let ctx = GuardContext {
                    destination: &intent.destination,
                    amount: None,
                    now,
                };
                self.run_guards(&self.address_guards(), &ctx).await?;

                let balance = self.rpc.unlocked_balance().await?;
                if balance == BigUint::from(0u8) {
                    return Err(Error::NoUnlockedBalance);
                }

                let ctx = GuardContext {
                    destination: &intent.destination,
                    amount: Some(&balance),
                    now,
                };
                self.run_guards(&self.amount_guards(), &ctx).await?;

                self.execute_sweep(&intent.destination, intent.priority).await
            }
        }
    }

    async fn execute_transfer(
        &self,
        address: &Address,
        amount: &BigUint,
        priority: TransferPriority,
    ) -> Result<ExecutedTransfer> {
        let receipt = self
            .rpc
            .transfer(address.as_str(), amount, priority, true)
            .await?;

        // only a confirmed success consumes cooldown and window capacity
        self.limiter.record_success(amount, Utc::now()).await;

        info!(
            destination = %address,
            amount = %units::to_decimal_uint(amount),
            tx_hash = receipt.tx_hash.as_deref().unwrap_or("-"),
            "transfer executed"
        );
        Ok(ExecutedTransfer {
            destination: address.to_string(),
            amount: amount.clone(),
            tx_hashes: receipt.tx_hash.into_iter().collect(),
            tx_key: receipt.tx_key,
            fee: receipt.fee,
        })
    }

    async fn execute_sweep(
        &self,
        address: &Address,
        priority: TransferPriority,
    ) -> Result<ExecutedTransfer> {
        let receipt = self
            .rpc
            .sweep_all(address.as_str(), priority, true)
            .await?;

        let swept = units::sum(receipt.amounts.iter());
        self.limiter.record_success(&swept, Utc::now()).await;

        info!(
            destination = %address,
            amount = %units::to_decimal_uint(&swept),
            transactions = receipt.tx_hashes.len(),
            "sweep executed"
        );
        Ok(ExecutedTransfer {
            destination: address.to_string(),
            amount: swept,
            tx_hashes: receipt.tx_hashes,
            tx_key: None,
            fee: Some(units::sum(receipt.fees.iter())),
        })
    }

    fn audit_decision(
        &self,
        operation: &str,
        destination: Option<&str>,
        amount: Option<&BigUint>,
        result: &Result<TransferOutcome>,
    ) {
        let amount_str = amount.map(units::to_decimal_uint);
        let record = match result {
            Ok(TransferOutcome::Executed(executed)) => AuditRecord::allowed(
                operation,
                Some(executed.destination.clone()),
                Some(units::to_decimal_uint(&executed.amount)),
                "executed",
                true,
            ),
            Ok(TransferOutcome::PendingConfirmation { .. }) => AuditRecord::allowed(
                operation,
                destination.map(str::to_string),
                amount_str,
                "pending_confirmation",
                true,
            ),
            Err(e) if e.is_rejection() => AuditRecord::rejected(
                operation,
                destination.map(str::to_string),
                amount_str,
                e,
            ),
            Err(e) => {
                // the guards allowed it; execution is what failed
                let mut record = AuditRecord::allowed(
                    operation,
                    destination.map(str::to_string),
                    amount_str,
                    e.reason_tag(),
                    false,
                );
                record.reason = Some(e.to_string());
                record
            }
        };
        self.audit.record(&record);
    }
}
