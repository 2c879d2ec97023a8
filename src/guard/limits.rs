//! Amount ceiling, cooldown, and rolling-window limits
//!
//! These limits cannot be overridden by the calling agent. The rate limiter
//! owns its state exclusively; checks and `record_success` are serialized
//! behind one lock so a concurrent host cannot race check-then-record.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use num_bigint::BigUint;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::{Guard, GuardContext};
use crate::error::{Error, Result};
use crate::units;

/// Width of the rolling accounting window.
pub const ROLLING_WINDOW_HOURS: i64 = 24;

/// One successful transfer, as counted against the rolling window.
#[derive(Debug, Clone)]
struct HistoryEntry {
    at: DateTime<Utc>,
    amount: BigUint,
}

#[derive(Debug, Default)]
struct LimiterState {
    last_success: Option<DateTime<Utc>>,
    history: Vec<HistoryEntry>,
}

/// Tracks cooldown-since-last-success and a rolling 24-hour cumulative
/// ceiling. In-process only; the window resets on restart.
pub struct RateLimiter {
    cooldown: Duration,
    daily_ceiling: Option<BigUint>,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(cooldown: Duration, daily_ceiling: Option<BigUint>) -> Self {
        Self {
            cooldown,
            daily_ceiling,
            state: Mutex::new(LimiterState::default()),
        }
    }

    /// Evaluate both limits against a proposed amount. Advisory only: nothing
    /// is reserved, and state changes only through [`RateLimiter::record_success`].
    pub async fn check(&self, amount: &BigUint, now: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.lock().await;

        if self.cooldown > Duration::zero() {
            if let Some(last) = state.last_success {
                let ready_at = last + self.cooldown;
                if ready_at > now {
                    let remaining_ms = (ready_at - now).num_milliseconds().max(0) as u64;
                    // ceiling-rounded to whole seconds
                    let remaining_secs = remaining_ms.div_ceil(1000);
                    return Err(Error::CooldownActive { remaining_secs });
                }
            }
        }

        if let Some(ceiling) = &self.daily_ceiling {
            let cutoff = now - Duration::hours(ROLLING_WINDOW_HOURS);
            state.history.retain(|entry| entry.at > cutoff);

            let sent_today = units::sum(state.history.iter().map(|entry| &entry.amount));
            if &sent_today + amount > *ceiling {
                return Err(Error::DailyLimitExceeded {
                    ceiling: units::to_decimal_uint(ceiling),
                    sent_today: units::to_decimal_uint(&sent_today),
                });
            }
        }

        Ok(())
    }

    /// Record one actually-executed transfer. Must be called exactly once per
    /// success, after the wallet service confirms it - never before, never
    /// twice.
    pub async fn record_success(&self, amount: &BigUint, now: DateTime<Utc>) {
        let mut state = self.state.lock().await;
        state.last_success = Some(now);
        state.history.push(HistoryEntry {
            at: now,
            amount: amount.clone(),
        });
        debug!(
            amount = %units::to_decimal_uint(amount),
            entries = state.history.len(),
            "recorded successful transfer"
        );
    }

    /// Total amount recorded inside the current rolling window.
    pub async fn sent_in_window(&self, now: DateTime<Utc>) -> BigUint {
        let mut state = self.state.lock().await;
        let cutoff = now - Duration::hours(ROLLING_WINDOW_HOURS);
        state.history.retain(|entry| entry.at > cutoff);
        units::sum(state.history.iter().map(|entry| &entry.amount))
    }

    /// Timestamp of the most recent recorded success.
    pub async fn last_success(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.last_success
    }
}

/// Guard adapter over a shared [`RateLimiter`].
pub struct RateLimitGuard {
    limiter: Arc<RateLimiter>,
}

impl RateLimitGuard {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

#[async_trait]
impl Guard for RateLimitGuard {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn evaluate(&self, ctx: &GuardContext<'_>) -> Result<()> {
        let amount = ctx
            .amount
            .ok_or_else(|| Error::Internal("rate limit evaluated without an amount".to_string()))?;
        self.limiter.check(amount, ctx.now).await
    }
}

/// Optional per-transfer maximum.
pub struct AmountCeilingGuard {
    max: Option<BigUint>,
}

impl AmountCeilingGuard {
    pub fn new(max: Option<BigUint>) -> Self {
        Self { max }
    }
}

#[async_trait]
impl Guard for AmountCeilingGuard {
    fn name(&self) -> &'static str {
        "amount_ceiling"
    }

    async fn evaluate(&self, ctx: &GuardContext<'_>) -> Result<()> {
        let Some(max) = &self.max else {
            return Ok(());
        };
        let amount = ctx
            .amount
            .ok_or_else(|| Error::Internal("ceiling evaluated without an amount".to_string()))?;

        if amount > max {
            return Err(Error::AmountCeilingExceeded {
                amount: units::to_decimal_uint(amount),
                max: units::to_decimal_uint(max),
            });
        }
        Ok(())
    }
}
