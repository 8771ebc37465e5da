//! Fixed-point fee arithmetic in the stablecoin's smallest unit.

use crate::constants::{CURATOR_SHARE_PERCENT, MARKETPLACE_SHARE_PERCENT};
use crate::errors::{MarketplaceError, Result};
use alloy::primitives::utils::parse_units;
use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

/// Convert a decimal amount of whole units ("0.5") to base units
pub fn to_base_units(amount: &str, decimals: u8) -> Result<U256> {
    let amount = amount.trim();
    if amount.is_empty() || amount.starts_with('-') {
        return Err(MarketplaceError::InvalidRequest(format!(
            "invalid token amount: {:?}",
            amount
        )));
    }

    parse_units(amount, decimals)
        .map(|parsed| parsed.get_absolute())
        .map_err(|e| MarketplaceError::InvalidRequest(format!("invalid token amount {:?}: {}", amount, e)))
}

/// `n_images * per_unit_fee`
pub fn expected_fee(per_unit_fee: U256, n_images: u32) -> U256 {
    per_unit_fee.saturating_mul(U256::from(n_images))
}

pub fn curator_share(fee: U256) -> U256 {
    percent_of(fee, CURATOR_SHARE_PERCENT)
}

pub fn marketplace_share(fee: U256) -> U256 {
    percent_of(fee, MARKETPLACE_SHARE_PERCENT)
}

fn percent_of(fee: U256, percent: u64) -> U256 {
    fee.saturating_mul(U256::from(percent)) / U256::from(100u64)
}

/// What an operator owes downstream for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub expected: U256,
    pub curator: U256,
    pub marketplace: U256,
}

impl FeeBreakdown {
    pub fn new(per_unit_fee: U256, n_images: u32) -> Self {
        let expected = expected_fee(per_unit_fee, n_images);
        Self {
            expected,
            curator: curator_share(expected),
            marketplace: marketplace_share(expected),
        }
    }
}
