//! Single-use, time-boxed confirmation tokens
//!
//! A validated transfer that requires confirmation is parked here as a
//! [`PendingIntent`] keyed by an unguessable token. Redemption is an atomic
//! read-and-delete, which is what gives "single-use" its meaning.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use num_bigint::BigUint;
use uuid::Uuid;

use crate::address::Address;
use crate::error::{Error, Result};
use crate::rpc::TransferPriority;

/// How long a pending intent stays redeemable.
pub const CONFIRMATION_TTL_SECS: i64 = 60;

/// What a pending intent will do when redeemed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentKind {
    /// Move a caller-specified atomic amount.
    Transfer { amount: BigUint },

    /// Move all unlocked funds; the amount is derived at redemption time
    /// from a fresh balance query.
    SweepAll,
}

/// A validated, not-yet-executed transfer awaiting confirmation.
#[derive(Debug, Clone)]
pub struct PendingIntent {
    pub kind: IntentKind,
    pub destination: Address,
    pub priority: TransferPriority,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Owns every pending intent, keyed by single-use token.
#[derive(Default)]
pub struct ConfirmationStore {
    pending: DashMap<String, PendingIntent>,
}

impl ConfirmationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park an intent and hand back its token. Tokens are 128-bit values
    /// drawn from the OS random source.
    pub fn create(
        &self,
        kind: IntentKind,
        destination: Address,
        priority: TransferPriority,
        now: DateTime<Utc>,
    ) -> (String, PendingIntent) {
        let token = Uuid::new_v4().simple().to_string();
        let intent = PendingIntent {
            kind,
            destination,
            priority,
            created_at: now,
            expires_at: now + Duration::seconds(CONFIRMATION_TTL_SECS),
        };
        self.pending.insert(token.clone(), intent.clone());
        (token, intent)
    }

    /// Atomic read-and-delete. The delete happens on the expired path too, so
    /// an expired token cannot be probed a second time.
    pub fn consume(&self, token: &str, now: DateTime<Utc>) -> Result<PendingIntent> {
        let (_, intent) = self
            .pending
            .remove(token)
            .ok_or(Error::InvalidConfirmationToken)?;

        if intent.expires_at <= now {
            return Err(Error::ExpiredConfirmationToken);
        }
        Ok(intent)
    }

    /// Drop expired entries. This only bounds memory for abandoned tokens;
    /// `consume` enforces expiry on its own.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, intent| intent.expires_at > now);
        before - self.pending.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Network, STANDARD_LEN};
    use crate::units;
    use chrono::TimeZone;

    fn destination() -> Address {
        Address::parse(&format!("4{}", "A".repeat(STANDARD_LEN - 1)), Network::Mainnet).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn transfer_intent() -> IntentKind {
        IntentKind::Transfer {
            amount: units::to_atomic("0.1").unwrap(),
        }
    }

    #[test]
    fn test_tokens_are_opaque_and_unique() {
        let store = ConfirmationStore::new();
        let (a, _) = store.create(
            transfer_intent(),
            destination(),
            TransferPriority::Default,
            at(0),
        );
        let (b, _) = store.create(
            transfer_intent(),
            destination(),
            TransferPriority::Default,
            at(0),
        );

        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(store.pending_count(), 2);
    }

    #[test]
    fn test_single_use() {
        let store = ConfirmationStore::new();
        let (token, _) = store.create(
            transfer_intent(),
            destination(),
            TransferPriority::Default,
            at(0),
        );

        let intent = store.consume(&token, at(1)).unwrap();
        assert_eq!(intent.kind, transfer_intent());
        assert_eq!(intent.expires_at, at(CONFIRMATION_TTL_SECS));

        // second redemption of the same token fails as unknown
        let err = store.consume(&token, at(2)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfirmationToken));
    }

    #[test]
    fn test_unknown_token() {
        let store = ConfirmationStore::new();
        let err = store.consume("deadbeef", at(0)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfirmationToken));
    }

    #[test]
    fn test_expiry_consumes_the_token() {
        let store = ConfirmationStore::new();
        let (token, _) = store.create(
            transfer_intent(),
            destination(),
            TransferPriority::Default,
            at(0),
        );

        let err = store.consume(&token, at(CONFIRMATION_TTL_SECS)).unwrap_err();
        assert!(matches!(err, Error::ExpiredConfirmationToken));

        // no retry loophole - the expired entry is gone
        let err = store.consume(&token, at(CONFIRMATION_TTL_SECS)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfirmationToken));
    }

    #[test]
    fn test_purge_expired() {
        let store = ConfirmationStore::new();
        store.create(
            transfer_intent(),
            destination(),
            TransferPriority::Default,
            at(0),
        );
        let (live, _) = store.create(
            IntentKind::SweepAll,
            destination(),
            TransferPriority::Default,
            at(30),
        );

        assert_eq!(store.purge_expired(at(CONFIRMATION_TTL_SECS)), 1);
        assert_eq!(store.pending_count(), 1);
        assert!(store.consume(&live, at(CONFIRMATION_TTL_SECS)).is_ok());
    }
}
