//! Registration fee validation.

use crate::constants::REGISTRATION_FEE_UNITS;
use crate::context::MarketplaceContext;
use crate::errors::Result;
use crate::fees::to_base_units;
use alloy::primitives::Address;
use tracing::{debug, info};

/// Whether `operator_evm` paid the registration fee for `registration_tx_id`
///
/// Scans transfers of exactly the registration fee from the operator to the
/// marketplace treasury and returns on the first whose memo is the
/// registration id. With no `timestamp` the scan covers the whole chain.
pub async fn validate_registration_fee(
    ctx: &MarketplaceContext,
    operator_evm: Address,
    registration_tx_id: &str,
    timestamp: Option<u64>,
) -> Result<bool> {
    let chain = ctx.chain();
    let decimals = chain.token_decimals().await?;
    let fee = to_base_units(&REGISTRATION_FEE_UNITS.to_string(), decimals)?;

    let logs = chain
        .transfer_logs_from_to(
            operator_evm,
            Some(ctx.marketplace_address()),
            Some(fee),
            timestamp,
            ctx.config().chain.block_limit,
        )
        .await?;

    debug!(
        operator = %operator_evm,
        registration = %registration_tx_id,
        candidates = logs.len(),
        "Scanning registration fee transfers"
    );

    for log in &logs {
        if chain.decode_memo(log.transaction_hash).await?.as_deref() == Some(registration_tx_id) {
            info!(
                operator = %operator_evm,
                registration = %registration_tx_id,
                tx = %log.transaction_hash,
                "Registration fee found"
            );
            return Ok(true);
        }
    }

    Ok(false)
}
