//! EVM chain collaborator: stablecoin transfer logs and transfer memos.

pub mod blocks;
mod client;
pub mod contracts;
pub mod memo;

pub use blocks::{BlockLocator, BlockWindow};
pub use client::{connect_read_only, connect_with_wallet, AlloyChain};

use crate::errors::Result;
use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A decoded stablecoin `Transfer` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLog {
    pub from: Address,
    pub to: Address,
    /// Amount in the token's smallest unit
    pub value: U256,
    pub block_number: Option<u64>,
    pub transaction_hash: B256,
}

/// Read-only access to stablecoin transfer history
///
/// Log lists are returned oldest first, the order the node reports them in.
#[async_trait]
pub trait ChainLogs: Send + Sync {
    /// Token decimals, read from the contract on every call
    async fn token_decimals(&self) -> Result<u8>;

    /// Transfers received by `to`, scanned from the block nearest `timestamp`
    /// or from genesis when there is none
    async fn transfer_logs_to(
        &self,
        to: Address,
        timestamp: Option<u64>,
        block_limit: Option<u64>,
    ) -> Result<Vec<TransferLog>>;

    /// Transfers sent by `from`, optionally to `to` and of exactly `amount`
    async fn transfer_logs_from_to(
        &self,
        from: Address,
        to: Option<Address>,
        amount: Option<U256>,
        timestamp: Option<u64>,
        block_limit: Option<u64>,
    ) -> Result<Vec<TransferLog>>;

    /// Memo carried by the call data of `tx_hash`
    async fn decode_memo(&self, tx_hash: B256) -> Result<Option<String>>;
}
