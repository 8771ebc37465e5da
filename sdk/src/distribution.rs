//! Fee distribution validation.
//!
//! An operator paid for a request owes the curator and the marketplace a share
//! of the fee. Validation reconstructs that payment graph from the operator's
//! latest incoming transfer:
//!
//! 1. latest incoming transfer, its memo names the request
//! 2. the request record gives `N-Images` and its own `Unix-Time`
//! 3. one response per image, owned by the operator
//! 4. curator share (when a curator is known), then marketplace share

use crate::constants::{operations, tags};
use crate::context::MarketplaceContext;
use crate::errors::{MarketplaceError, Result};
use crate::fees::FeeBreakdown;
use crate::ledger::records::{protocol_filters, InferenceRequestRecord};
use crate::ledger::{find_by_id, TagFilter, TransactionQuery};
use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Result of a distribution check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DistributionOutcome {
    Valid,
    Invalid { reason: InvalidReason },
    /// The operator itself was paid less than the request's fee
    UpstreamUnderpaid { expected: U256, received: U256 },
}

impl DistributionOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Reason to drop the operator from discovery, if any
    ///
    /// Underpayment is not the operator's fault and yields `None`.
    pub fn discovery_rejection(self) -> Option<InvalidReason> {
        match self {
            Self::Invalid { reason } => Some(reason),
            Self::Valid | Self::UpstreamUnderpaid { .. } => None,
        }
    }

    fn invalid(reason: InvalidReason) -> Self {
        Self::Invalid { reason }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvalidReason {
    IncompleteResponses { expected: u32, found: usize },
    MissingCuratorShare { curator: Address, amount: U256 },
    MissingMarketplaceShare { amount: U256 },
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncompleteResponses { expected, found } => {
                write!(f, "answered {} of {} images", found, expected)
            }
            Self::MissingCuratorShare { curator, amount } => {
                write!(f, "no curator share of {} to {}", amount, curator)
            }
            Self::MissingMarketplaceShare { amount } => {
                write!(f, "no marketplace share of {}", amount)
            }
        }
    }
}

/// Check that `operator_evm` redistributed the fee of the last request it was paid for
///
/// `per_unit_fee` is in base units. The incoming transfer scan is anchored at
/// `request_timestamp`, or starts at genesis when it is `None`. The share scans
/// use the request record's own time when it has one.
pub async fn validate_distribution_fees(
    ctx: &MarketplaceContext,
    operator_evm: Address,
    operator_ledger_address: &str,
    per_unit_fee: U256,
    request_timestamp: Option<u64>,
    curator: Option<Address>,
) -> Result<DistributionOutcome> {
    let chain = ctx.chain();
    let block_limit = ctx.config().chain.block_limit;

    let incoming = chain
        .transfer_logs_to(operator_evm, request_timestamp, block_limit)
        .await?;
    let Some(latest) = incoming.last() else {
        debug!(operator = %operator_evm, "No incoming transfers, nothing to redistribute");
        return Ok(DistributionOutcome::Valid);
    };

    let Some(request_id) = chain.decode_memo(latest.transaction_hash).await? else {
        debug!(
            operator = %operator_evm,
            tx = %latest.transaction_hash,
            "Latest transfer carries no memo"
        );
        return Ok(DistributionOutcome::Valid);
    };

    let request = find_by_id(ctx.ledger(), &request_id)
        .await?
        .map(|node| InferenceRequestRecord::from_node(&node))
        .ok_or_else(|| MarketplaceError::not_found("request", request_id.as_str()))?;

    let fees = FeeBreakdown::new(per_unit_fee, request.n_images);
    if latest.value < fees.expected {
        warn!(
            operator = %operator_evm,
            request = %request_id,
            expected = %fees.expected,
            received = %latest.value,
            "Operator was underpaid upstream"
        );
        return Ok(DistributionOutcome::UpstreamUnderpaid {
            expected: fees.expected,
            received: latest.value,
        });
    }

    let responses = ctx
        .ledger()
        .query(
            &TransactionQuery::new(request.n_images)
                .tags(protocol_filters(
                    &ctx.config().protocol,
                    operations::INFERENCE_RESPONSE,
                ))
                .tag(TagFilter::single(tags::REQUEST_TRANSACTION, request_id.as_str()))
                .owners([operator_ledger_address]),
        )
        .await?;
    if responses.edges.len() != request.n_images as usize {
        return Ok(DistributionOutcome::invalid(InvalidReason::IncompleteResponses {
            expected: request.n_images,
            found: responses.edges.len(),
        }));
    }

    let anchor = request.unix_time.map(|t| t as u64).or(request_timestamp);

    if let Some(curator) = curator {
        let paid = chain
            .transfer_logs_from_to(
                operator_evm,
                Some(curator),
                nonzero(fees.curator),
                anchor,
                block_limit,
            )
            .await?;
        if paid.is_empty() {
            return Ok(DistributionOutcome::invalid(InvalidReason::MissingCuratorShare {
                curator,
                amount: fees.curator,
            }));
        }
    }

    let paid = chain
        .transfer_logs_from_to(
            operator_evm,
            Some(ctx.marketplace_address()),
            nonzero(fees.marketplace),
            anchor,
            block_limit,
        )
        .await?;
    if paid.is_empty() {
        return Ok(DistributionOutcome::invalid(InvalidReason::MissingMarketplaceShare {
            amount: fees.marketplace,
        }));
    }

    info!(
        operator = %operator_evm,
        request = %request_id,
        n_images = request.n_images,
        "Fee distribution verified"
    );
    Ok(DistributionOutcome::Valid)
}

/// A share that truncated to zero matches a transfer of any amount
fn nonzero(amount: U256) -> Option<U256> {
    (!amount.is_zero()).then_some(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_underpaid_passes_discovery_but_is_not_valid() {
        let outcome = DistributionOutcome::UpstreamUnderpaid {
            expected: U256::from(3u64),
            received: U256::from(1u64),
        };
        assert!(!outcome.is_valid());
        assert_eq!(outcome.discovery_rejection(), None);

        let reason = InvalidReason::MissingMarketplaceShare {
            amount: U256::from(1u64),
        };
        let invalid = DistributionOutcome::invalid(reason.clone());
        assert_eq!(invalid.discovery_rejection(), Some(reason));
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_value(DistributionOutcome::invalid(
            InvalidReason::IncompleteResponses {
                expected: 2,
                found: 1,
            },
        ))
        .unwrap();
        assert_eq!(json["outcome"], "invalid");
        assert_eq!(json["reason"]["kind"], "incomplete_responses");
    }

    #[test]
    fn test_zero_share_is_unfiltered() {
        assert_eq!(nonzero(U256::ZERO), None);
        assert_eq!(nonzero(U256::from(7u64)), Some(U256::from(7u64)));
    }

    #[test]
    fn test_reason_display() {
        let reason = InvalidReason::IncompleteResponses {
            expected: 2,
            found: 1,
        };
        assert_eq!(reason.to_string(), "answered 1 of 2 images");
    }
}
