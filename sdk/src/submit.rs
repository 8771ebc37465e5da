//! Inference request submission.

use crate::constants::{
    operations, tags, COMMERCIAL_USE_DEFAULT, DERIVATION_DEFAULT, MAX_IMAGES_EXCLUSIVE,
    MIN_IMAGES_EXCLUSIVE, TRANSACTION_ORIGIN_NODE,
};
use crate::config::ProtocolSection;
use crate::context::MarketplaceContext;
use crate::discovery::{find_available_operators, top_pick, OperatorCandidate};
use crate::errors::{MarketplaceError, Result};
use crate::fees::{expected_fee, to_base_units};
use crate::ledger::records::protocol_filters;
use crate::ledger::{find_by_id, Tag, TagFilter, TransactionQuery};
use crate::upload::{publish_capped, RequestPayload};
use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Conversation used when the caller never started one
pub const DEFAULT_CONVERSATION_ID: &str = "1";

/// Optional request settings, each emitted as a tag when set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub asset_names: Option<Vec<String>>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Only honoured strictly between 0 and 10
    pub n_images: Option<u32>,
    pub private_mode: bool,
    pub user_public_key: Option<String>,
    pub encryption_scheme: Option<String>,
}

impl RequestConfig {
    /// `n_images` when inside the accepted bounds
    pub fn bounded_images(&self) -> Option<u32> {
        self.n_images
            .filter(|n| *n > MIN_IMAGES_EXCLUSIVE && *n < MAX_IMAGES_EXCLUSIVE)
    }

    /// Multiplier applied to the per-unit fee
    pub fn fee_multiplier(&self) -> u32 {
        self.bounded_images().unwrap_or(1)
    }
}

/// Operator picked by the caller instead of discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorSelection {
    pub evm_wallet: Address,
    /// Per-unit fee in whole units
    pub operator_fee: String,
    /// Ledger address written to the request's `Operator` tag
    #[serde(default)]
    pub ledger_wallet: Option<String>,
}

impl From<&OperatorCandidate> for OperatorSelection {
    fn from(candidate: &OperatorCandidate) -> Self {
        Self {
            evm_wallet: candidate.evm_wallet,
            operator_fee: candidate.operator_fee.clone(),
            ledger_wallet: Some(candidate.ledger_wallet.clone()),
        }
    }
}

/// Ledger and chain transaction ids of a submitted request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub ledger_tx_id: String,
    pub payment_tx_id: B256,
}

/// Tags of an inference request record
pub fn request_tags(
    protocol: &ProtocolSection,
    solution_tx: &str,
    conversation_id: &str,
    unix_time: f64,
    content_type: &str,
    operator: Option<&str>,
    config: &RequestConfig,
) -> Result<Vec<Tag>> {
    let mut out = vec![
        Tag::new(tags::PROTOCOL_NAME, protocol.name.as_str()),
        Tag::new(tags::PROTOCOL_VERSION, protocol.version.as_str()),
        Tag::new(tags::SCRIPT_TRANSACTION, solution_tx),
        Tag::new(tags::OPERATION_NAME, operations::INFERENCE_REQUEST),
        Tag::new(tags::CONVERSATION_IDENTIFIER, conversation_id),
        Tag::new(tags::UNIX_TIME, unix_time.to_string()),
        Tag::new(tags::CONTENT_TYPE, content_type),
        Tag::new(tags::TRANSACTION_ORIGIN, TRANSACTION_ORIGIN_NODE),
        Tag::new(tags::LICENSE, ""),
        Tag::new(tags::DERIVATION, DERIVATION_DEFAULT),
        Tag::new(tags::COMMERCIAL_USE, COMMERCIAL_USE_DEFAULT),
    ];

    if let Some(operator) = operator {
        out.push(Tag::new(tags::OPERATOR, operator));
    }
    if let Some(names) = &config.asset_names {
        out.push(Tag::new(tags::ASSET_NAMES, serde_json::to_string(names)?));
    }
    if let Some(width) = config.width {
        out.push(Tag::new(tags::WIDTH, width.to_string()));
    }
    if let Some(height) = config.height {
        out.push(Tag::new(tags::HEIGHT, height.to_string()));
    }
    if let Some(n) = config.bounded_images() {
        out.push(Tag::new(tags::N_IMAGES, n.to_string()));
    }
    if config.private_mode {
        out.push(Tag::new(tags::PRIVATE_MODE, "true"));
        if let Some(key) = &config.user_public_key {
            out.push(Tag::new(tags::USER_PUBLIC_KEY, key.as_str()));
        }
        if let Some(scheme) = &config.encryption_scheme {
            out.push(Tag::new(tags::ENCRYPTION_SCHEME, scheme.as_str()));
        }
    }

    Ok(out)
}

/// Identifier of `caller`'s latest conversation on `solution_tx`, or the default
pub async fn resolve_conversation_id(
    ctx: &MarketplaceContext,
    caller: &str,
    solution_tx: &str,
) -> Result<String> {
    let query = TransactionQuery::new(1)
        .tags(protocol_filters(&ctx.config().protocol, operations::CONVERSATION_START))
        .tag(TagFilter::single(tags::SCRIPT_TRANSACTION, solution_tx))
        .owners([caller]);

    let latest = ctx.ledger().query(&query).await?.into_nodes().into_iter().next();
    let id = latest
        .as_ref()
        .and_then(|n| n.tag(tags::CONVERSATION_IDENTIFIER))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(DEFAULT_CONVERSATION_ID);

    debug!(caller = %caller, solution = %solution_tx, conversation = %id, "Resolved conversation");
    Ok(id.to_string())
}

/// Publish a `Conversation Start` record and return its ledger id
pub async fn start_conversation(
    ctx: &MarketplaceContext,
    solution_tx: &str,
    conversation_id: &str,
) -> Result<String> {
    let uploader = ctx.uploader()?;
    let protocol = &ctx.config().protocol;
    let tags = vec![
        Tag::new(tags::PROTOCOL_NAME, protocol.name.as_str()),
        Tag::new(tags::PROTOCOL_VERSION, protocol.version.as_str()),
        Tag::new(tags::OPERATION_NAME, operations::CONVERSATION_START),
        Tag::new(tags::SCRIPT_TRANSACTION, solution_tx),
        Tag::new(tags::UNIX_TIME, ctx.now_secs().to_string()),
        Tag::new(tags::CONVERSATION_IDENTIFIER, conversation_id),
    ];

    let payload = RequestPayload::from(operations::CONVERSATION_START);
    let id = publish_capped(uploader, &payload, &tags, ctx.config().upload.max_payload_bytes)
        .await
        .ok_or(MarketplaceError::PublishFailed)?;

    info!(solution = %solution_tx, conversation = %conversation_id, tx = %id, "Conversation started");
    Ok(id)
}

/// Publish an inference request and pay the operator for it
///
/// Without `operator` the top-ranked discovered operator is used. Fails with
/// `NotFound` for an unknown solution and `NoOperatorsAvailable` when
/// discovery comes back empty. The payment memo is the request's ledger id.
pub async fn submit(
    ctx: &MarketplaceContext,
    payload: RequestPayload,
    solution_tx: &str,
    operator: Option<OperatorSelection>,
    conversation_id: Option<String>,
    config: Option<RequestConfig>,
) -> Result<SubmitReceipt> {
    let payments = ctx.payments()?;
    let uploader = ctx.uploader()?;
    let config = config.unwrap_or_default();

    let caller = payments.connected_address()?;
    let conversation_id = match conversation_id {
        Some(id) => id,
        None => resolve_conversation_id(ctx, &caller.to_string(), solution_tx).await?,
    };

    let solution = find_by_id(ctx.ledger(), solution_tx)
        .await?
        .ok_or_else(|| MarketplaceError::not_found("solution", solution_tx))?;

    let operator = match operator {
        Some(selection) => selection,
        None => {
            let candidates = find_available_operators(ctx, &solution).await?;
            top_pick(&candidates)
                .map(OperatorSelection::from)
                .ok_or_else(|| MarketplaceError::NoOperatorsAvailable(solution_tx.to_string()))?
        }
    };

    let tags = request_tags(
        &ctx.config().protocol,
        solution_tx,
        &conversation_id,
        ctx.now_secs(),
        payload.content_type(),
        operator.ledger_wallet.as_deref(),
        &config,
    )?;

    let ledger_tx_id = publish_capped(uploader, &payload, &tags, ctx.config().upload.max_payload_bytes)
        .await
        .ok_or(MarketplaceError::PublishFailed)?;

    let decimals = ctx.chain().token_decimals().await?;
    let per_unit = to_base_units(&operator.operator_fee, decimals)?;
    let amount = expected_fee(per_unit, config.fee_multiplier());

    let payment_tx_id = payments
        .send_token(operator.evm_wallet, amount, &ledger_tx_id)
        .await?;

    info!(
        solution = %solution_tx,
        operator = %operator.evm_wallet,
        request = %ledger_tx_id,
        payment = %payment_tx_id,
        amount = %amount,
        "Inference request submitted"
    );

    Ok(SubmitReceipt {
        ledger_tx_id,
        payment_tx_id,
    })
}
