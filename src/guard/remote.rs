//! Remote re-validation of the destination via the wallet service
//!
//! The local validator passing is not sufficient on its own: the wallet
//! service is asked to agree before any execute call, and a mismatch between
//! the claimed network and the reported one is a hard rejection.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{Guard, GuardContext};
use crate::error::{Error, Result};
use crate::rpc::WalletRpc;

pub struct RemoteAddressGuard {
    rpc: Arc<dyn WalletRpc>,
}

impl RemoteAddressGuard {
    pub fn new(rpc: Arc<dyn WalletRpc>) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl Guard for RemoteAddressGuard {
    fn name(&self) -> &'static str {
        "remote_address"
    }

    async fn evaluate(&self, ctx: &GuardContext<'_>) -> Result<()> {
        let check = self
            .rpc
            .validate_address(ctx.destination.as_str())
            .await
            .map_err(|e| Error::RemoteValidationFailed(e.to_string()))?;

        if !check.valid {
            return Err(Error::RemoteValidationFailed(
                "wallet service reports the address as invalid".to_string(),
            ));
        }

        let claimed = ctx.destination.network().as_str();
        if check.nettype != claimed {
            return Err(Error::RemoteValidationFailed(format!(
                "network mismatch: claimed {} but wallet service reports {}",
                claimed, check.nettype
            )));
        }

        debug!(destination = %ctx.destination, nettype = %check.nettype, "remote validation passed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Address, Network, STANDARD_LEN};
    use crate::rpc::{AddressCheck, SweepReceipt, TransferPriority, TransferReceipt};
    use chrono::Utc;
    use num_bigint::BigUint;

    struct StubRpc {
        valid: bool,
        nettype: &'static str,
    }

    #[async_trait]
    impl WalletRpc for StubRpc {
        async fn validate_address(&self, _address: &str) -> Result<AddressCheck> {
            Ok(AddressCheck {
                valid: self.valid,
                nettype: self.nettype.to_string(),
            })
        }

        async fn transfer(
            &self,
            _destination: &str,
            _amount: &BigUint,
            _priority: TransferPriority,
            _commit: bool,
        ) -> Result<TransferReceipt> {
            unreachable!("not exercised")
        }

        async fn sweep_all(
            &self,
            _destination: &str,
            _priority: TransferPriority,
            _commit: bool,
        ) -> Result<SweepReceipt> {
            unreachable!("not exercised")
        }

        async fn unlocked_balance(&self) -> Result<BigUint> {
            unreachable!("not exercised")
        }
    }

    fn destination() -> Address {
        Address::parse(&format!("4{}", "A".repeat(STANDARD_LEN - 1)), Network::Mainnet).unwrap()
    }

    async fn run(stub: StubRpc) -> Result<()> {
        let destination = destination();
        let guard = RemoteAddressGuard::new(Arc::new(stub));
        let ctx = GuardContext {
            destination: &destination,
            amount: None,
            now: Utc::now(),
        };
        guard.evaluate(&ctx).await
    }

    #[tokio::test]
    async fn test_agreeing_service_passes() {
        run(StubRpc {
            valid: true,
            nettype: "mainnet",
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_invalid_report_rejects() {
        let err = run(StubRpc {
            valid: false,
            nettype: "mainnet",
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::RemoteValidationFailed(_)));
    }

    #[tokio::test]
    async fn test_nettype_mismatch_rejects() {
        let err = run(StubRpc {
            valid: true,
            nettype: "stagenet",
        })
        .await
        .unwrap_err();
        match err {
            Error::RemoteValidationFailed(msg) => {
                assert!(msg.contains("mainnet"));
                assert!(msg.contains("stagenet"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
