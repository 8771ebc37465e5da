//! Operator discovery.
//!
//! Joins registration, cancellation and liveness-proof records from the ledger
//! with transfer history on the chain:
//!
//! ```text
//! registrations ─┬─ cancellations ─┐
//!                └─ proofs ────────┴─> eligible ─> per candidate:
//!                                      linked wallet, registration fee,
//!                                      fee distribution ─> ranked by stamps
//! ```
//!
//! A candidate that fails any per-candidate step is skipped with a
//! [`SkipReason`]; discovery itself only fails when a shared query fails.

use crate::constants::{operations, tags};
use crate::context::MarketplaceContext;
use crate::distribution::{validate_distribution_fees, InvalidReason};
use crate::errors::{MarketplaceError, Result};
use crate::fees::to_base_units;
use crate::ledger::records::{
    protocol_filters, CancellationRecord, LivenessProof, RegistrationRecord,
};
use crate::ledger::{fetch_transactions, find_by_id, TagFilter, TransactionNode, TransactionQuery};
use crate::logging::helpers::{log_candidate_skipped, log_ledger_query};
use crate::ranking::{count_stamps, rank_by_stamps};
use crate::registration::validate_registration_fee;
use alloy::primitives::{Address, U256};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info, warn};

/// Candidates validated concurrently; output order is unaffected
const CANDIDATE_CONCURRENCY: usize = 4;

/// EVM wallet an operator linked to its ledger identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedWallet {
    pub evm_address: Address,
    pub public_key: Option<String>,
}

/// An eligible, validated operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorCandidate {
    pub registration: RegistrationRecord,
    pub evm_wallet: Address,
    pub evm_public_key: Option<String>,
    pub ledger_wallet: String,
    /// Per-unit fee as registered, in whole units
    pub operator_fee: String,
    /// Per-unit fee in base units
    pub operator_fee_units: U256,
}

/// Why a registration was left out of the result
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoLinkedWallet,
    MissingOperatorFee,
    InvalidOperatorFee(String),
    RegistrationFeeUnpaid,
    Distribution(InvalidReason),
    /// A lookup for this candidate failed
    Lookup(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoLinkedWallet => write!(f, "no linked EVM wallet"),
            Self::MissingOperatorFee => write!(f, "registration has no operator fee"),
            Self::InvalidOperatorFee(fee) => write!(f, "unparsable operator fee {:?}", fee),
            Self::RegistrationFeeUnpaid => write!(f, "registration fee not paid"),
            Self::Distribution(reason) => write!(f, "fee distribution invalid: {}", reason),
            Self::Lookup(e) => write!(f, "lookup failed: {}", e),
        }
    }
}

impl From<MarketplaceError> for SkipReason {
    fn from(e: MarketplaceError) -> Self {
        Self::Lookup(e.to_string())
    }
}

/// Resolve the EVM wallet linked to `owner`; first link record wins
pub async fn get_linked_evm_wallet(
    ctx: &MarketplaceContext,
    owner: &str,
) -> Result<Option<LinkedWallet>> {
    let query = TransactionQuery::new(1)
        .tags(protocol_filters(&ctx.config().protocol, operations::EVM_WALLET_LINK))
        .owners([owner]);
    let Some(link) = ctx.ledger().query(&query).await?.into_nodes().into_iter().next() else {
        return Ok(None);
    };

    let body = ctx.ledger().fetch_data(&link.id).await?;
    let text = String::from_utf8_lossy(&body);
    let text = text.trim();
    if !text.starts_with("0x") {
        debug!(owner = %owner, link = %link.id, "Wallet link body is not an EVM address");
        return Ok(None);
    }

    match text.parse::<Address>() {
        Ok(evm_address) => Ok(Some(LinkedWallet {
            evm_address,
            public_key: link.tag(tags::EVM_PUBLIC_KEY).map(str::to_string),
        })),
        Err(e) => {
            warn!(owner = %owner, link = %link.id, "Malformed linked wallet: {}", e);
            Ok(None)
        }
    }
}

/// Registrations not cancelled by their owner and backed by a fresh liveness proof
pub fn eligible_registrations(
    registrations: &[RegistrationRecord],
    cancellations: &[CancellationRecord],
    proofs: &[LivenessProof],
    now: f64,
    window_secs: u64,
) -> Vec<RegistrationRecord> {
    registrations
        .iter()
        .filter(|reg| !cancellations.iter().any(|c| c.cancels(reg)))
        .filter(|reg| {
            proofs
                .iter()
                .any(|p| p.owner_address == reg.operator_address && p.is_fresh(now, window_secs))
        })
        .cloned()
        .collect()
}

/// Eligible operators for `solution_tx`, least stamped first
pub async fn find_operators_for(
    ctx: &MarketplaceContext,
    solution_tx: &str,
) -> Result<Vec<OperatorCandidate>> {
    let solution = find_by_id(ctx.ledger(), solution_tx)
        .await?
        .ok_or_else(|| MarketplaceError::not_found("solution", solution_tx))?;
    find_available_operators(ctx, &solution).await
}

/// Eligible operators for an already resolved solution record
///
/// Returns an empty list when nothing is registered or nothing survives validation.
pub async fn find_available_operators(
    ctx: &MarketplaceContext,
    solution: &TransactionNode,
) -> Result<Vec<OperatorCandidate>> {
    let protocol = &ctx.config().protocol;
    let page_size = ctx.config().ledger.page_size;
    let mode = ctx.query_mode();

    let registrations: Vec<RegistrationRecord> = fetch_transactions(
        ctx.ledger(),
        &TransactionQuery::new(page_size)
            .tags(protocol_filters(protocol, operations::OPERATOR_REGISTRATION))
            .tag(TagFilter::single(tags::SCRIPT_TRANSACTION, solution.id.as_str())),
        mode,
    )
    .await?
    .iter()
    .map(RegistrationRecord::from_node)
    .collect();
    log_ledger_query("registrations", registrations.len());

    if registrations.is_empty() {
        return Ok(Vec::new());
    }

    let registration_ids = registrations.iter().map(|r| r.ledger_tx_id.as_str());
    let registrants: BTreeSet<&str> = registrations
        .iter()
        .map(|r| r.operator_address.as_str())
        .collect();

    let cancellation_query = TransactionQuery::new(page_size)
        .tags(protocol_filters(protocol, operations::OPERATOR_CANCELLATION))
        .tag(TagFilter::new(tags::REGISTRATION_TRANSACTION, registration_ids));
    let proof_query = TransactionQuery::new(page_size)
        .tags(protocol_filters(protocol, operations::OPERATOR_ACTIVE_PROOF))
        .owners(registrants);

    let (cancellations, proofs) = futures::try_join!(
        fetch_transactions(ctx.ledger(), &cancellation_query, mode),
        fetch_transactions(ctx.ledger(), &proof_query, mode),
    )?;
    log_ledger_query("cancellations", cancellations.len());
    log_ledger_query("proofs", proofs.len());

    let cancellations: Vec<_> = cancellations.iter().map(CancellationRecord::from_node).collect();
    let proofs: Vec<_> = proofs.iter().map(LivenessProof::from_node).collect();

    let eligible = eligible_registrations(
        &registrations,
        &cancellations,
        &proofs,
        ctx.now_secs(),
        protocol.liveness_window_secs,
    );
    debug!(
        registered = registrations.len(),
        eligible = eligible.len(),
        "Filtered registrations"
    );

    if eligible.is_empty() {
        return Ok(Vec::new());
    }

    let decimals = ctx.chain().token_decimals().await?;
    let curator = get_linked_evm_wallet(ctx, solution.owner_address())
        .await?
        .map(|w| w.evm_address);

    let outcomes: Vec<_> = stream::iter(eligible)
        .map(|reg| async move {
            let outcome = resolve_candidate(ctx, &reg, curator, decimals).await;
            (reg, outcome)
        })
        .buffered(CANDIDATE_CONCURRENCY)
        .collect()
        .await;

    let mut candidates: Vec<OperatorCandidate> = outcomes
        .into_iter()
        .filter_map(|(reg, outcome)| match outcome {
            Ok(candidate) => Some(candidate),
            Err(reason) => {
                log_candidate_skipped(&reg.ledger_tx_id, &reg.operator_address, &reason);
                None
            }
        })
        .collect();

    let ids: Vec<String> = candidates
        .iter()
        .map(|c| c.registration.ledger_tx_id.clone())
        .collect();
    if let Some(counts) = count_stamps(ctx, &ids).await? {
        rank_by_stamps(&mut candidates, &counts, |c| c.registration.ledger_tx_id.as_str());
    }

    info!(
        solution = %solution.id,
        operators = candidates.len(),
        "Operator discovery complete"
    );
    Ok(candidates)
}

/// First-ranked candidate
pub fn top_pick(candidates: &[OperatorCandidate]) -> Option<&OperatorCandidate> {
    candidates.first()
}

async fn resolve_candidate(
    ctx: &MarketplaceContext,
    reg: &RegistrationRecord,
    curator: Option<Address>,
    decimals: u8,
) -> std::result::Result<OperatorCandidate, SkipReason> {
    let operator_fee = reg
        .operator_fee
        .clone()
        .ok_or(SkipReason::MissingOperatorFee)?;
    let operator_fee_units = to_base_units(&operator_fee, decimals)
        .map_err(|_| SkipReason::InvalidOperatorFee(operator_fee.clone()))?;
    let registered_at = reg.registration_timestamp.map(|t| t as u64);

    let wallet = get_linked_evm_wallet(ctx, &reg.operator_address)
        .await?
        .ok_or(SkipReason::NoLinkedWallet)?;

    if !validate_registration_fee(ctx, wallet.evm_address, &reg.ledger_tx_id, registered_at)
        .await?
    {
        return Err(SkipReason::RegistrationFeeUnpaid);
    }

    let outcome = validate_distribution_fees(
        ctx,
        wallet.evm_address,
        &reg.operator_address,
        operator_fee_units,
        registered_at,
        curator,
    )
    .await?;
    if let Some(reason) = outcome.discovery_rejection() {
        return Err(SkipReason::Distribution(reason));
    }

    Ok(OperatorCandidate {
        registration: reg.clone(),
        evm_wallet: wallet.evm_address,
        evm_public_key: wallet.public_key,
        ledger_wallet: reg.operator_address.clone(),
        operator_fee,
        operator_fee_units,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg(id: &str, owner: &str) -> RegistrationRecord {
        RegistrationRecord {
            ledger_tx_id: id.to_string(),
            operator_address: owner.to_string(),
            solution_reference: Some("script".to_string()),
            operator_fee: Some("1".to_string()),
            registration_timestamp: Some(1_000.0),
        }
    }

    fn proof(owner: &str, at: f64) -> LivenessProof {
        LivenessProof {
            owner_address: owner.to_string(),
            proof_timestamp: Some(at),
        }
    }

    fn cancel(owner: &str, registration: &str) -> CancellationRecord {
        CancellationRecord {
            ledger_tx_id: format!("cancel-{}", registration),
            owner_address: owner.to_string(),
            registration_tx_id: Some(registration.to_string()),
        }
    }

    #[test]
    fn test_cancelled_registration_excluded_despite_proof() {
        let regs = vec![reg("r1", "op1"), reg("r2", "op2")];
        let eligible = eligible_registrations(
            &regs,
            &[cancel("op1", "r1")],
            &[proof("op1", 9_999.0), proof("op2", 9_999.0)],
            10_000.0,
            1800,
        );

        let ids: Vec<_> = eligible.iter().map(|r| r.ledger_tx_id.as_str()).collect();
        assert_eq!(ids, vec!["r2"]);
    }

    #[test]
    fn test_cancellation_by_someone_else_ignored() {
        let regs = vec![reg("r1", "op1")];
        let eligible = eligible_registrations(
            &regs,
            &[cancel("mallory", "r1")],
            &[proof("op1", 9_999.0)],
            10_000.0,
            1800,
        );
        assert_eq!(eligible.len(), 1);
    }

    #[test]
    fn test_stale_or_missing_proof_excluded() {
        let regs = vec![reg("r1", "op1"), reg("r2", "op2"), reg("r3", "op3")];
        let eligible = eligible_registrations(
            &regs,
            &[],
            &[proof("op1", 10_000.0 - 1800.0), proof("op2", 10_000.0 - 1799.0)],
            10_000.0,
            1800,
        );

        let ids: Vec<_> = eligible.iter().map(|r| r.ledger_tx_id.as_str()).collect();
        assert_eq!(ids, vec!["r2"]);
    }

    #[test]
    fn test_any_fresh_proof_suffices() {
        let regs = vec![reg("r1", "op1")];
        let eligible = eligible_registrations(
            &regs,
            &[],
            &[proof("op1", 1.0), proof("op1", 9_000.0)],
            10_000.0,
            1800,
        );
        assert_eq!(eligible.len(), 1);
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(SkipReason::NoLinkedWallet.to_string(), "no linked EVM wallet");
        let reason: SkipReason = MarketplaceError::Chain("rpc down".into()).into();
        assert_eq!(reason.to_string(), "lookup failed: chain error: rpc down");
    }
}
