//! alloy-backed chain and payment client.

use super::blocks::{BlockLocator, BlockWindow};
use super::contracts::IERC20;
use super::memo::{decode_memo, encode_transfer_with_memo};
use super::{ChainLogs, TransferLog};
use crate::config::ChainSection;
use crate::errors::{MarketplaceError, Result};
use crate::logging::helpers::log_payment_sent;
use crate::payment::PaymentSender;
use alloy::consensus::Transaction as _;
use alloy::eips::BlockNumberOrTag;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Chain client over an alloy provider
pub struct AlloyChain<P> {
    provider: P,
    token: Address,
    locator: BlockLocator,
    lookback_blocks: u64,
    /// Set when the provider signs with a local wallet
    sender: Option<Address>,
}

/// Read-only client; payments fail with `CollaboratorUnavailable`
pub async fn connect_read_only(
    section: ChainSection,
) -> anyhow::Result<AlloyChain<impl Provider + Clone>> {
    let provider = ProviderBuilder::new().on_builtin(&section.rpc_url).await?;
    info!(rpc = %section.rpc_url, "Chain client connected (read-only)");
    AlloyChain::new(provider, &section, None)
}

/// Client signing with `section.private_key`
pub async fn connect_with_wallet(
    section: ChainSection,
) -> anyhow::Result<AlloyChain<impl Provider + Clone>> {
    let key = section
        .private_key
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("Private key not provided"))?;
    let signer: PrivateKeySigner = key.trim().trim_start_matches("0x").parse()?;
    let address = signer.address();

    let provider = ProviderBuilder::new()
        .with_recommended_fillers()
        .wallet(EthereumWallet::from(signer))
        .on_builtin(&section.rpc_url)
        .await?;

    info!(rpc = %section.rpc_url, wallet = %address, "Chain client connected");
    AlloyChain::new(provider, &section, Some(address))
}

impl<P: Provider + Clone> AlloyChain<P> {
    pub fn new(provider: P, section: &ChainSection, sender: Option<Address>) -> anyhow::Result<Self> {
        Ok(Self {
            provider,
            token: section.token()?,
            locator: BlockLocator::new(section.block_lookup_url.clone())?,
            lookback_blocks: section.lookback_blocks,
            sender,
        })
    }

    async fn window(&self, timestamp: Option<u64>, block_limit: Option<u64>) -> Result<BlockWindow> {
        match timestamp {
            Some(ts) => {
                let nearest = self.locator.nearest_block(ts).await?;
                Ok(BlockWindow::anchored(nearest, self.lookback_blocks, block_limit))
            }
            None => Ok(BlockWindow::unbounded()),
        }
    }

    async fn transfer_logs(
        &self,
        from: Option<Address>,
        to: Option<Address>,
        window: BlockWindow,
    ) -> Result<Vec<TransferLog>> {
        let mut filter = Filter::new()
            .address(self.token)
            .event_signature(IERC20::Transfer::SIGNATURE_HASH)
            .from_block(window.from)
            .to_block(window.to.map_or(BlockNumberOrTag::Latest, BlockNumberOrTag::Number));
        if let Some(from) = from {
            filter = filter.topic1(from.into_word());
        }
        if let Some(to) = to {
            filter = filter.topic2(to.into_word());
        }

        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| MarketplaceError::Chain(format!("get_logs failed: {}", e)))?;

        debug!(
            from_block = window.from,
            to_block = ?window.to,
            count = logs.len(),
            "Fetched transfer logs"
        );

        Ok(logs.iter().filter_map(decode_transfer).collect())
    }
}

fn decode_transfer(log: &Log) -> Option<TransferLog> {
    let decoded = match log.log_decode::<IERC20::Transfer>() {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!("Failed to decode Transfer log: {}", e);
            return None;
        }
    };
    let event = decoded.inner.data;

    Some(TransferLog {
        from: event.from,
        to: event.to,
        value: event.value,
        block_number: log.block_number,
        transaction_hash: log.transaction_hash?,
    })
}

#[async_trait]
impl<P: Provider + Clone + 'static> ChainLogs for AlloyChain<P> {
    async fn token_decimals(&self) -> Result<u8> {
        let decimals = IERC20::new(self.token, self.provider.clone())
            .decimals()
            .call()
            .await
            .map_err(|e| MarketplaceError::Chain(format!("decimals() failed: {}", e)))?;
        Ok(decimals._0)
    }

    async fn transfer_logs_to(
        &self,
        to: Address,
        timestamp: Option<u64>,
        block_limit: Option<u64>,
    ) -> Result<Vec<TransferLog>> {
        let window = self.window(timestamp, block_limit).await?;
        self.transfer_logs(None, Some(to), window).await
    }

    async fn transfer_logs_from_to(
        &self,
        from: Address,
        to: Option<Address>,
        amount: Option<U256>,
        timestamp: Option<u64>,
        block_limit: Option<u64>,
    ) -> Result<Vec<TransferLog>> {
        let window = self.window(timestamp, block_limit).await?;
        let logs = self.transfer_logs(Some(from), to, window).await?;

        Ok(match amount {
            Some(amount) => logs.into_iter().filter(|l| l.value == amount).collect(),
            None => logs,
        })
    }

    async fn decode_memo(&self, tx_hash: B256) -> Result<Option<String>> {
        let tx = self
            .provider
            .get_transaction_by_hash(tx_hash)
            .await
            .map_err(|e| MarketplaceError::Chain(format!("get_transaction failed: {}", e)))?
            .ok_or_else(|| MarketplaceError::not_found("transaction", tx_hash.to_string()))?;

        Ok(decode_memo(tx.input()))
    }
}

#[async_trait]
impl<P: Provider + Clone + 'static> PaymentSender for AlloyChain<P> {
    fn connected_address(&self) -> Result<Address> {
        self.sender
            .ok_or(MarketplaceError::CollaboratorUnavailable("wallet"))
    }

    async fn send_token(&self, target: Address, amount: U256, memo: &str) -> Result<B256> {
        let from = self.connected_address()?;
        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(self.token)
            .with_input(encode_transfer_with_memo(target, amount, memo));

        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| MarketplaceError::Payment(e.to_string()))?;
        let hash = *pending.tx_hash();

        log_payment_sent(&target.to_string(), &amount.to_string(), memo, &hash.to_string());
        Ok(hash)
    }

    async fn balance(&self) -> Result<U256> {
        let owner = self.connected_address()?;
        let balance = IERC20::new(self.token, self.provider.clone())
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| MarketplaceError::Chain(format!("balanceOf() failed: {}", e)))?;
        Ok(balance._0)
    }

    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256> {
        let allowance = IERC20::new(self.token, self.provider.clone())
            .allowance(owner, spender)
            .call()
            .await
            .map_err(|e| MarketplaceError::Chain(format!("allowance() failed: {}", e)))?;
        Ok(allowance._0)
    }
}
