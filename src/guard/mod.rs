//! Authorization guards
//!
//! Each guard is an independent pass/fail check with a typed rejection. The
//! orchestrator evaluates a fixed, ordered sequence and stops at the first
//! failure; the order is a security property and is not configurable.

pub mod allowlist;
pub mod limits;
pub mod remote;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use num_bigint::BigUint;

use crate::address::Address;
use crate::error::Result;

pub use allowlist::AllowlistGuard;
pub use limits::{AmountCeilingGuard, RateLimitGuard, RateLimiter};
pub use remote::RemoteAddressGuard;

/// Inputs shared by every guard evaluation.
pub struct GuardContext<'a> {
    /// Destination that already passed local syntactic validation.
    pub destination: &'a Address,

    /// Proposed atomic amount. None while a sweep amount has not been
    /// derived yet; amount-dependent guards fail closed on it.
    pub amount: Option<&'a BigUint>,

    /// Evaluation instant, injected so tests can replay scenarios.
    pub now: DateTime<Utc>,
}

/// A single authorization check.
#[async_trait]
pub trait Guard: Send + Sync {
    /// Name used in logs and audit records.
    fn name(&self) -> &'static str;

    /// Evaluate the request; an `Err` is a typed, user-actionable rejection.
    async fn evaluate(&self, ctx: &GuardContext<'_>) -> Result<()>;
}
