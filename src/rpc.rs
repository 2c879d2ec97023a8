//! Wallet service boundary
//!
//! The orchestrator only ever talks to the [`WalletRpc`] trait; tests swap in
//! a scripted implementation. [`MoneroWalletRpc`] is the production client
//! speaking JSON-RPC 2.0 to a `monero-wallet-rpc` endpoint.

use async_trait::async_trait;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Error, Result};

/// Transaction priority passed through to the wallet service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferPriority {
    #[default]
    Default,
    Unimportant,
    Normal,
    Elevated,
}

impl TransferPriority {
    pub fn as_u32(self) -> u32 {
        match self {
            TransferPriority::Default => 0,
            TransferPriority::Unimportant => 1,
            TransferPriority::Normal => 2,
            TransferPriority::Elevated => 3,
        }
    }
}

impl std::str::FromStr for TransferPriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "default" => Ok(TransferPriority::Default),
            "unimportant" => Ok(TransferPriority::Unimportant),
            "normal" => Ok(TransferPriority::Normal),
            "elevated" => Ok(TransferPriority::Elevated),
            other => Err(Error::Config(format!("unknown priority: {}", other))),
        }
    }
}

/// Wallet service's verdict on a destination.
#[derive(Debug, Clone)]
pub struct AddressCheck {
    pub valid: bool,
    pub nettype: String,
}

/// Receipt from a previewed or committed single-destination transfer.
#[derive(Debug, Clone, Default)]
pub struct TransferReceipt {
    pub tx_hash: Option<String>,
    pub tx_key: Option<String>,
    pub fee: Option<BigUint>,
}

/// Receipt from a previewed or committed sweep of all unlocked funds.
#[derive(Debug, Clone, Default)]
pub struct SweepReceipt {
    pub tx_hashes: Vec<String>,
    pub fees: Vec<BigUint>,
    pub amounts: Vec<BigUint>,
}

/// Capability surface of the external wallet service.
#[async_trait]
pub trait WalletRpc: Send + Sync {
    /// Ask the wallet service whether the address is valid and for which
    /// network.
    async fn validate_address(&self, address: &str) -> Result<AddressCheck>;

    /// Preview (`commit == false`, moves no funds) or execute a transfer.
    async fn transfer(
        &self,
        destination: &str,
        amount: &BigUint,
        priority: TransferPriority,
        commit: bool,
    ) -> Result<TransferReceipt>;

    /// Preview or execute a sweep of all unlocked funds.
    async fn sweep_all(
        &self,
        destination: &str,
        priority: TransferPriority,
        commit: bool,
    ) -> Result<SweepReceipt>;

    /// Currently spendable balance in atomic units.
    async fn unlocked_balance(&self) -> Result<BigUint>;
}

/// Failure modes of one JSON-RPC call. A transport failure on a committing
/// call leaves the outcome unknown; a service-level error means the wallet
/// refused and nothing moved.
enum CallError {
    Transport(String),
    Service(String),
}

impl CallError {
    fn into_error(self, commit: bool) -> Error {
        match (self, commit) {
            (CallError::Transport(reason), true) => Error::RemoteExecutionFailed {
                reason,
                outcome_unknown: true,
            },
            (CallError::Service(reason), true) => Error::RemoteExecutionFailed {
                reason,
                outcome_unknown: false,
            },
            (CallError::Transport(reason), false) | (CallError::Service(reason), false) => {
                Error::Rpc(reason)
            }
        }
    }
}

/// JSON-RPC 2.0 client for `monero-wallet-rpc`.
pub struct MoneroWalletRpc {
    endpoint: String,
    client: reqwest::Client,
}

impl MoneroWalletRpc {
    /// Build a client with a hard request timeout.
    pub fn new(endpoint: impl Into<String>, timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Rpc(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    async fn call(&self, method: &str, params: Value) -> std::result::Result<Value, CallError> {
        debug!(method, "wallet RPC call");
        let body = json!({
            "jsonrpc": "2.0",
            "id": "0",
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| CallError::Transport(format!("{}: {}", method, e)))?;

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| CallError::Transport(format!("{}: {}", method, e)))?;

        if let Some(err) = envelope.get("error") {
            if !err.is_null() {
                return Err(CallError::Service(format!("{}: {}", method, err)));
            }
        }
        envelope
            .get("result")
            .cloned()
            .ok_or_else(|| CallError::Service(format!("{}: response carries no result", method)))
    }
}

fn amount_as_u64(amount: &BigUint) -> Result<u64> {
    u64::try_from(amount)
        .map_err(|_| Error::InvalidAmount("amount exceeds the wallet service range".to_string()))
}

fn u64_list(value: &Value, field: &str) -> Vec<BigUint> {
    value
        .get(field)
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_u64)
                .map(BigUint::from)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl WalletRpc for MoneroWalletRpc {
    async fn validate_address(&self, address: &str) -> Result<AddressCheck> {
        let result = self
            .call("validate_address", json!({ "address": address }))
            .await
            .map_err(|e| e.into_error(false))?;

        Ok(AddressCheck {
            valid: result.get("valid").and_then(Value::as_bool).unwrap_or(false),
            nettype: result
                .get("nettype")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }

    async fn transfer(
        &self,
        destination: &str,
        amount: &BigUint,
        priority: TransferPriority,
        commit: bool,
    ) -> Result<TransferReceipt> {
        let params = json!({
            "destinations": [{ "amount": amount_as_u64(amount)?, "address": destination }],
            "priority": priority.as_u32(),
            "get_tx_key": true,
            "do_not_relay": !commit,
        });

        let result = self
            .call("transfer", params)
            .await
            .map_err(|e| e.into_error(commit))?;

        Ok(TransferReceipt {
            tx_hash: result
                .get("tx_hash")
                .and_then(Value::as_str)
                .map(str::to_string),
            tx_key: result
                .get("tx_key")
                .and_then(Value::as_str)
                .map(str::to_string),
            fee: result.get("fee").and_then(Value::as_u64).map(BigUint::from),
        })
    }

    async fn sweep_all(
        &self,
        destination: &str,
        priority: TransferPriority,
        commit: bool,
    ) -> Result<SweepReceipt> {
        let params = json!({
            "address": destination,
            "priority": priority.as_u32(),
            "get_tx_keys": true,
            "do_not_relay": !commit,
        });

        let result = self
            .call("sweep_all", params)
            .await
            .map_err(|e| e.into_error(commit))?;

        let tx_hashes = result
            .get("tx_hash_list")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(SweepReceipt {
            tx_hashes,
            fees: u64_list(&result, "fee_list"),
            amounts: u64_list(&result, "amount_list"),
        })
    }

    async fn unlocked_balance(&self) -> Result<BigUint> {
        let result = self
            .call("get_balance", json!({ "account_index": 0 }))
            .await
            .map_err(|e| e.into_error(false))?;

        let unlocked = result
            .get("unlocked_balance")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::Rpc("get_balance: missing unlocked_balance".to_string()))?;
        Ok(BigUint::from(unlocked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_mapping() {
        assert_eq!(TransferPriority::Default.as_u32(), 0);
        assert_eq!(TransferPriority::Elevated.as_u32(), 3);
        assert_eq!(
            "normal".parse::<TransferPriority>().unwrap(),
            TransferPriority::Normal
        );
        assert!("urgent".parse::<TransferPriority>().is_err());
    }

    #[test]
    fn test_commit_failures_are_outcome_unknown() {
        let err = CallError::Transport("transfer: timeout".into()).into_error(true);
        assert!(matches!(
            err,
            Error::RemoteExecutionFailed {
                outcome_unknown: true,
                ..
            }
        ));

        // an explicit service refusal means nothing moved
        let err = CallError::Service("transfer: not enough money".into()).into_error(true);
        assert!(matches!(
            err,
            Error::RemoteExecutionFailed {
                outcome_unknown: false,
                ..
            }
        ));

        // preview failures are plain RPC errors
        let err = CallError::Transport("transfer: timeout".into()).into_error(false);
        assert!(matches!(err, Error::Rpc(_)));
    }

    #[test]
    fn test_amount_as_u64_bounds() {
        assert_eq!(amount_as_u64(&BigUint::from(42u8)).unwrap(), 42);
        let too_big = BigUint::from(u64::MAX) + BigUint::from(1u8);
        assert!(amount_as_u64(&too_big).is_err());
    }
}
