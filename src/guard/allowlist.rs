//! Destination allowlist enforcement

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::debug;

use super::{Guard, GuardContext};
use crate::error::{Error, Result};

/// Closed-set membership check on validated destinations.
///
/// Deliberately dumb: matching is byte-exact, with no normalization, case
/// folding, or prefix matching. An absent or empty set means no restriction;
/// operators opt in to the closed set.
pub struct AllowlistGuard {
    allowed: Option<HashSet<String>>,
}

impl AllowlistGuard {
    pub fn new(allowed: Option<Vec<String>>) -> Self {
        let allowed = allowed
            .filter(|entries| !entries.is_empty())
            .map(|entries| entries.into_iter().collect());
        Self { allowed }
    }

    /// Whether a closed set is actually configured.
    pub fn is_restricted(&self) -> bool {
        self.allowed.is_some()
    }
}

#[async_trait]
impl Guard for AllowlistGuard {
    fn name(&self) -> &'static str {
        "allowlist"
    }

    async fn evaluate(&self, ctx: &GuardContext<'_>) -> Result<()> {
        let Some(allowed) = &self.allowed else {
            return Ok(());
        };

        if allowed.contains(ctx.destination.as_str()) {
            debug!(destination = %ctx.destination, "destination is allowlisted");
            Ok(())
        } else {
            Err(Error::AddressNotAllowlisted {
                destination: ctx.destination.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Address, Network, STANDARD_LEN};
    use chrono::Utc;

    fn addr(lead: char) -> Address {
        let raw = format!("{}{}", lead, "A".repeat(STANDARD_LEN - 1));
        Address::parse(&raw, Network::Mainnet).unwrap()
    }

    fn ctx(destination: &Address) -> GuardContext<'_> {
        GuardContext {
            destination,
            amount: None,
            now: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_absent_allowlist_is_permissive() {
        let destination = addr('4');
        for guard in [AllowlistGuard::new(None), AllowlistGuard::new(Some(vec![]))] {
            assert!(!guard.is_restricted());
            assert!(guard.evaluate(&ctx(&destination)).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_exact_membership() {
        let member = addr('4');
        let outsider = addr('8');
        let guard = AllowlistGuard::new(Some(vec![member.as_str().to_string()]));
        assert!(guard.is_restricted());

        assert!(guard.evaluate(&ctx(&member)).await.is_ok());
        let err = guard.evaluate(&ctx(&outsider)).await.unwrap_err();
        assert!(matches!(err, Error::AddressNotAllowlisted { .. }));
    }

    #[tokio::test]
    async fn test_no_fuzzy_matching() {
        let member = addr('4');
        // one trailing character cut off the configured entry
        let truncated = member.as_str()[..STANDARD_LEN - 1].to_string();
        let guard = AllowlistGuard::new(Some(vec![truncated]));

        let err = guard.evaluate(&ctx(&member)).await.unwrap_err();
        assert!(matches!(err, Error::AddressNotAllowlisted { .. }));
    }
}
