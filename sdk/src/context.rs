//! Collaborator handles shared by every engine operation.

use crate::chain::{connect_read_only, connect_with_wallet, ChainLogs};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::errors::{MarketplaceError, Result};
use crate::ledger::{GraphqlLedger, LedgerQuery, QueryMode};
use crate::payment::PaymentSender;
use crate::upload::Uploader;
use alloy::primitives::{Address, U256};
use std::sync::Arc;
use tracing::info;

/// Initialized collaborators plus configuration
///
/// Built once by the caller and passed by reference to every engine function.
/// The ledger and chain handles are mandatory; payments and uploads are only
/// checked when a submission needs them.
#[derive(Clone)]
pub struct MarketplaceContext {
    ledger: Arc<dyn LedgerQuery>,
    chain: Arc<dyn ChainLogs>,
    payments: Option<Arc<dyn PaymentSender>>,
    uploader: Option<Arc<dyn Uploader>>,
    clock: Arc<dyn Clock>,
    marketplace: Address,
    config: Config,
}

impl MarketplaceContext {
    pub fn builder() -> MarketplaceContextBuilder {
        MarketplaceContextBuilder::default()
    }

    /// GraphQL ledger plus an alloy chain client, signing when a private key is configured
    pub async fn connect(config: Config) -> anyhow::Result<Self> {
        config.validate()?;
        let ledger = Arc::new(GraphqlLedger::new(&config.ledger)?);
        let builder = Self::builder().ledger(ledger);

        let builder = if config.chain.private_key.is_some() {
            let chain = Arc::new(connect_with_wallet(config.chain.clone()).await?);
            builder.chain(chain.clone()).payments(chain)
        } else {
            builder.chain(Arc::new(connect_read_only(config.chain.clone()).await?))
        };

        Ok(builder.config(config).build()?)
    }

    pub fn ledger(&self) -> &dyn LedgerQuery {
        self.ledger.as_ref()
    }

    pub fn chain(&self) -> &dyn ChainLogs {
        self.chain.as_ref()
    }

    pub fn payments(&self) -> Result<&dyn PaymentSender> {
        self.payments
            .as_deref()
            .ok_or(MarketplaceError::CollaboratorUnavailable("payment"))
    }

    pub fn uploader(&self) -> Result<&dyn Uploader> {
        self.uploader
            .as_deref()
            .ok_or(MarketplaceError::CollaboratorUnavailable("upload"))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn marketplace_address(&self) -> Address {
        self.marketplace
    }

    pub fn query_mode(&self) -> QueryMode {
        self.config.ledger.query_mode()
    }

    pub fn now_secs(&self) -> f64 {
        self.clock.now_secs()
    }

    /// Stablecoin balance of the connected wallet, in base units
    pub async fn token_balance(&self) -> Result<U256> {
        self.payments()?.balance().await
    }

    pub async fn token_allowance(&self, owner: Address, spender: Address) -> Result<U256> {
        self.payments()?.allowance(owner, spender).await
    }
}

impl std::fmt::Debug for MarketplaceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketplaceContext")
            .field("payments", &self.payments.is_some())
            .field("uploader", &self.uploader.is_some())
            .field("marketplace", &self.marketplace)
            .field("protocol", &self.config.protocol)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct MarketplaceContextBuilder {
    ledger: Option<Arc<dyn LedgerQuery>>,
    chain: Option<Arc<dyn ChainLogs>>,
    payments: Option<Arc<dyn PaymentSender>>,
    uploader: Option<Arc<dyn Uploader>>,
    clock: Option<Arc<dyn Clock>>,
    config: Option<Config>,
}

impl MarketplaceContextBuilder {
    pub fn ledger(mut self, ledger: Arc<dyn LedgerQuery>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn chain(mut self, chain: Arc<dyn ChainLogs>) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn payments(mut self, payments: Arc<dyn PaymentSender>) -> Self {
        self.payments = Some(payments);
        self
    }

    pub fn uploader(mut self, uploader: Arc<dyn Uploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<MarketplaceContext> {
        let ledger = self
            .ledger
            .ok_or(MarketplaceError::CollaboratorUnavailable("ledger"))?;
        let chain = self
            .chain
            .ok_or(MarketplaceError::CollaboratorUnavailable("chain"))?;
        let config = self.config.unwrap_or_default();
        let marketplace = config
            .chain
            .marketplace()
            .map_err(|e| MarketplaceError::InvalidConfig(format!("marketplace address: {}", e)))?;

        info!(
            protocol = %config.protocol.name,
            version = %config.protocol.version,
            marketplace = %marketplace,
            payments = self.payments.is_some(),
            uploader = self.uploader.is_some(),
            "Marketplace context ready"
        );

        Ok(MarketplaceContext {
            ledger,
            chain,
            payments: self.payments,
            uploader: self.uploader,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            marketplace,
            config,
        })
    }
}
