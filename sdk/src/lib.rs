//! FairAI SDK
//!
//! Operator discovery, fee-distribution validation and request submission for
//! the FairAI inference marketplace. Operators register on an indexed ledger
//! and are paid in a stablecoin on an EVM chain; this crate joins both sources
//! to decide which operators are eligible and dispatches requests to them.
//!
//! # Example
//!
//! ```rust,no_run
//! use fairai_sdk::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     init_logging(&LogConfig::from_section(&config.logging))?;
//!
//!     let ctx = MarketplaceContext::connect(config).await?;
//!
//!     let operators = find_operators_for(&ctx, "solution-tx-id").await?;
//!     for op in &operators {
//!         println!("{} charges {} per image", op.evm_wallet, op.operator_fee);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Submitting also needs a wallet (`PRIVATE_KEY`) and an [`upload::Uploader`]
//! passed through [`MarketplaceContext::builder`].

pub mod chain;
pub mod clock;
pub mod config;
pub mod constants;
pub mod context;
pub mod discovery;
pub mod distribution;
pub mod errors;
pub mod fees;
pub mod ledger;
pub mod logging;
pub mod payment;
pub mod ranking;
pub mod registration;
pub mod retry;
pub mod submit;
pub mod upload;

pub use config::Config;
pub use context::{MarketplaceContext, MarketplaceContextBuilder};
pub use discovery::{
    eligible_registrations, find_available_operators, find_operators_for, get_linked_evm_wallet,
    top_pick, LinkedWallet, OperatorCandidate, SkipReason,
};
pub use distribution::{validate_distribution_fees, DistributionOutcome, InvalidReason};
pub use errors::{ErrorCode, MarketplaceError, Result};
pub use ranking::{count_stamps, rank_by_stamps, StampCounts};
pub use registration::validate_registration_fee;
pub use submit::{
    resolve_conversation_id, start_conversation, submit, OperatorSelection, RequestConfig,
    SubmitReceipt,
};

/// Commonly used items
pub mod prelude {
    pub use crate::chain::{ChainLogs, TransferLog};
    pub use crate::clock::{Clock, FixedClock, SystemClock};
    pub use crate::config::Config;
    pub use crate::context::MarketplaceContext;
    pub use crate::discovery::{find_available_operators, find_operators_for, top_pick, OperatorCandidate};
    pub use crate::distribution::{validate_distribution_fees, DistributionOutcome};
    pub use crate::errors::{MarketplaceError, Result};
    pub use crate::ledger::{LedgerQuery, QueryMode};
    pub use crate::logging::{init_logging, LogConfig};
    pub use crate::payment::PaymentSender;
    pub use crate::submit::{submit, RequestConfig, SubmitReceipt};
    pub use crate::upload::{RequestPayload, Uploader};
}
