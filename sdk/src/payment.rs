//! Payment collaborator: stablecoin transfers from the connected wallet.

use crate::errors::Result;
use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;

#[async_trait]
pub trait PaymentSender: Send + Sync {
    /// Address of the signing wallet
    fn connected_address(&self) -> Result<Address>;

    /// Transfer `amount` base units to `target`, embedding `memo` in the call data
    async fn send_token(&self, target: Address, amount: U256, memo: &str) -> Result<B256>;

    /// Token balance of the connected wallet, in base units
    async fn balance(&self) -> Result<U256>;

    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256>;
}
