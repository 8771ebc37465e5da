//! In-memory collaborators shared by the integration tests.
//!
//! The ledger answers queries from a list of nodes in insertion order, which
//! stands in for the height-descending order of the real service. The chain
//! keeps transfers oldest first, like the node does.

#![allow(dead_code)]

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use fairai_sdk::chain::{ChainLogs, TransferLog};
use fairai_sdk::clock::FixedClock;
use fairai_sdk::config::Config;
use fairai_sdk::constants::{operations, tags};
use fairai_sdk::context::MarketplaceContext;
use fairai_sdk::errors::{MarketplaceError, Result};
use fairai_sdk::ledger::{
    LedgerQuery, Owner, PageInfo, Tag, TransactionEdge, TransactionNode, TransactionPage,
    TransactionQuery,
};
use fairai_sdk::payment::PaymentSender;
use fairai_sdk::upload::{RequestPayload, Uploader};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use tokio::sync::RwLock;

pub const NOW: f64 = 1_700_000_000.0;
pub const SOLUTION: &str = "script-1";
pub const CURATOR_AR: &str = "curator-ar";

/// 1 unit at 6 decimals
pub const UNIT: u64 = 1_000_000;

pub fn marketplace() -> Address {
    fairai_sdk::constants::MARKETPLACE_EVM_ADDRESS.parse().unwrap()
}

pub fn curator_evm() -> Address {
    Address::repeat_byte(0xCC)
}

pub fn node(id: &str, owner: &str, tags: &[(&str, &str)]) -> TransactionNode {
    TransactionNode {
        id: id.to_string(),
        tags: tags.iter().map(|(n, v)| Tag::new(*n, *v)).collect(),
        owner: Owner {
            address: owner.to_string(),
            key: String::new(),
        },
    }
}

/// Node carrying the default protocol tags plus `extra`
pub fn protocol_node(id: &str, owner: &str, operation: &str, extra: &[(&str, &str)]) -> TransactionNode {
    let mut all = vec![
        (tags::PROTOCOL_NAME, "FairAI"),
        (tags::PROTOCOL_VERSION, "2.0-test"),
        (tags::OPERATION_NAME, operation),
    ];
    all.extend_from_slice(extra);
    node(id, owner, &all)
}

// ============================================================================
// Ledger
// ============================================================================

#[derive(Default)]
pub struct MockLedger {
    nodes: Arc<RwLock<Vec<TransactionNode>>>,
    data: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    pub queries: Arc<RwLock<Vec<TransactionQuery>>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, node: TransactionNode) {
        self.nodes.write().await.push(node);
    }

    pub async fn insert_with_data(&self, node: TransactionNode, body: &str) {
        self.data
            .write()
            .await
            .insert(node.id.clone(), body.as_bytes().to_vec());
        self.insert(node).await;
    }

    pub async fn query_count(&self) -> usize {
        self.queries.read().await.len()
    }

    fn matches(node: &TransactionNode, query: &TransactionQuery) -> bool {
        let tags_ok = query
            .tags
            .iter()
            .all(|f| f.values.iter().any(|v| node.has_tag(&f.name, v)));
        let owners_ok = query
            .owners
            .as_ref()
            .map_or(true, |owners| owners.iter().any(|o| *o == node.owner.address));
        let ids_ok = query
            .ids
            .as_ref()
            .map_or(true, |ids| ids.iter().any(|id| *id == node.id));
        tags_ok && owners_ok && ids_ok
    }
}

#[async_trait]
impl LedgerQuery for MockLedger {
    async fn query(&self, query: &TransactionQuery) -> Result<TransactionPage> {
        self.queries.write().await.push(query.clone());

        let nodes = self.nodes.read().await;
        let matching: Vec<_> = nodes
            .iter()
            .filter(|n| Self::matches(n, query))
            .enumerate()
            .collect();

        let start = match &query.after {
            Some(cursor) => matching
                .iter()
                .position(|(i, _)| format!("cursor-{}", i) == *cursor)
                .map_or(matching.len(), |p| p + 1),
            None => 0,
        };
        let end = (start + query.first as usize).min(matching.len());

        Ok(TransactionPage {
            page_info: PageInfo {
                has_next_page: end < matching.len(),
            },
            edges: matching[start..end]
                .iter()
                .map(|(i, n)| TransactionEdge {
                    cursor: format!("cursor-{}", i),
                    node: (*n).clone(),
                })
                .collect(),
        })
    }

    async fn fetch_data(&self, id: &str) -> Result<Vec<u8>> {
        self.data
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| MarketplaceError::not_found("transaction", id))
    }
}

// ============================================================================
// Chain
// ============================================================================

#[derive(Default)]
pub struct MockChain {
    transfers: Arc<RwLock<Vec<TransferLog>>>,
    memos: Arc<RwLock<HashMap<B256, String>>>,
    next_hash: AtomicU8,
    pub log_calls: AtomicUsize,
    pub memo_calls: AtomicUsize,
    /// Timestamp each log scan was anchored at
    pub anchors: Arc<RwLock<Vec<Option<u64>>>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transfer, optionally carrying a memo
    pub async fn transfer(&self, from: Address, to: Address, value: u64, memo: Option<&str>) -> B256 {
        let hash = B256::repeat_byte(self.next_hash.fetch_add(1, Ordering::SeqCst) + 1);
        self.transfers.write().await.push(TransferLog {
            from,
            to,
            value: U256::from(value),
            block_number: Some(1),
            transaction_hash: hash,
        });
        if let Some(memo) = memo {
            self.memos.write().await.insert(hash, memo.to_string());
        }
        hash
    }

    pub fn calls(&self) -> usize {
        self.log_calls.load(Ordering::SeqCst) + self.memo_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainLogs for MockChain {
    async fn token_decimals(&self) -> Result<u8> {
        Ok(6)
    }

    async fn transfer_logs_to(
        &self,
        to: Address,
        timestamp: Option<u64>,
        _block_limit: Option<u64>,
    ) -> Result<Vec<TransferLog>> {
        self.log_calls.fetch_add(1, Ordering::SeqCst);
        self.anchors.write().await.push(timestamp);
        let transfers = self.transfers.read().await;
        Ok(transfers.iter().filter(|t| t.to == to).cloned().collect())
    }

    async fn transfer_logs_from_to(
        &self,
        from: Address,
        to: Option<Address>,
        amount: Option<U256>,
        timestamp: Option<u64>,
        _block_limit: Option<u64>,
    ) -> Result<Vec<TransferLog>> {
        self.log_calls.fetch_add(1, Ordering::SeqCst);
        self.anchors.write().await.push(timestamp);
        let transfers = self.transfers.read().await;
        Ok(transfers
            .iter()
            .filter(|t| t.from == from)
            .filter(|t| to.map_or(true, |to| t.to == to))
            .filter(|t| amount.map_or(true, |a| t.value == a))
            .cloned()
            .collect())
    }

    async fn decode_memo(&self, tx_hash: B256) -> Result<Option<String>> {
        self.memo_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.memos.read().await.get(&tx_hash).cloned())
    }
}

// ============================================================================
// Payments and uploads
// ============================================================================

pub struct MockPayments {
    pub address: Address,
    pub sent: Arc<RwLock<Vec<(Address, U256, String)>>>,
}

impl MockPayments {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            sent: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

#[async_trait]
impl PaymentSender for MockPayments {
    fn connected_address(&self) -> Result<Address> {
        Ok(self.address)
    }

    async fn send_token(&self, target: Address, amount: U256, memo: &str) -> Result<B256> {
        self.sent.write().await.push((target, amount, memo.to_string()));
        Ok(B256::repeat_byte(0xEE))
    }

    async fn balance(&self) -> Result<U256> {
        Ok(U256::from(50 * UNIT))
    }

    async fn allowance(&self, _owner: Address, _spender: Address) -> Result<U256> {
        Ok(U256::ZERO)
    }
}

#[derive(Default)]
pub struct MockUploader {
    pub published: Arc<RwLock<Vec<(RequestPayload, Vec<Tag>)>>>,
}

impl MockUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn last_tag(&self, name: &str) -> Option<String> {
        let published = self.published.read().await;
        let (_, tags) = published.last()?;
        tags.iter().find(|t| t.name == name).map(|t| t.value.clone())
    }
}

#[async_trait]
impl Uploader for MockUploader {
    async fn publish(&self, payload: &RequestPayload, tags: &[Tag]) -> Result<Option<String>> {
        let mut published = self.published.write().await;
        published.push((payload.clone(), tags.to_vec()));
        Ok(Some(format!("upload-{}", published.len())))
    }
}

// ============================================================================
// Scenario
// ============================================================================

/// A marketplace with one solution owned by a curator with a linked wallet
pub struct Market {
    pub ledger: Arc<MockLedger>,
    pub chain: Arc<MockChain>,
    pub payments: Arc<MockPayments>,
    pub uploader: Arc<MockUploader>,
}

impl Market {
    pub async fn new() -> Self {
        let market = Self {
            ledger: Arc::new(MockLedger::new()),
            chain: Arc::new(MockChain::new()),
            payments: Arc::new(MockPayments::new(Address::repeat_byte(0x11))),
            uploader: Arc::new(MockUploader::new()),
        };

        market
            .ledger
            .insert(node(SOLUTION, CURATOR_AR, &[(tags::OPERATION_NAME, "Script Creation")]))
            .await;
        market
            .ledger
            .insert_with_data(
                protocol_node("link-curator", CURATOR_AR, operations::EVM_WALLET_LINK, &[]),
                &curator_evm().to_string(),
            )
            .await;
        market
    }

    pub fn context(&self) -> MarketplaceContext {
        self.context_with(Config::default())
    }

    pub fn context_with(&self, config: Config) -> MarketplaceContext {
        MarketplaceContext::builder()
            .ledger(self.ledger.clone())
            .chain(self.chain.clone())
            .payments(self.payments.clone())
            .uploader(self.uploader.clone())
            .clock(Arc::new(FixedClock(NOW)))
            .config(config)
            .build()
            .unwrap()
    }

    /// Registration, fresh proof, wallet link and paid registration fee for operator `n`
    pub async fn add_operator(&self, n: u8, fee: &str) -> Operator {
        self.add_operator_with_proof(n, fee, NOW - 60.0).await
    }

    pub async fn add_operator_with_proof(&self, n: u8, fee: &str, proof_at: f64) -> Operator {
        self.register(n, fee, proof_at, Some(NOW - 10_000.0)).await
    }

    /// Like `add_operator`, but the registration carries no `Unix-Time`
    pub async fn add_untimed_operator(&self, n: u8, fee: &str) -> Operator {
        self.register(n, fee, NOW - 60.0, None).await
    }

    async fn register(&self, n: u8, fee: &str, proof_at: f64, registered_at: Option<f64>) -> Operator {
        let op = Operator::new(n);

        let registered_at = registered_at.map(|t| t.to_string());
        let mut extra = vec![(tags::SCRIPT_TRANSACTION, SOLUTION), (tags::OPERATOR_FEE, fee)];
        if let Some(at) = &registered_at {
            extra.push((tags::UNIX_TIME, at.as_str()));
        }
        self.ledger
            .insert(protocol_node(
                &op.registration,
                &op.ledger_address,
                operations::OPERATOR_REGISTRATION,
                &extra,
            ))
            .await;
        self.add_proof(&op, proof_at).await;
        self.ledger
            .insert_with_data(
                protocol_node(
                    &format!("link-{}", n),
                    &op.ledger_address,
                    operations::EVM_WALLET_LINK,
                    &[(tags::EVM_PUBLIC_KEY, "pubkey")],
                ),
                &op.evm.to_string(),
            )
            .await;
        self.chain
            .transfer(op.evm, marketplace(), UNIT, Some(&op.registration))
            .await;
        op
    }

    pub async fn add_proof(&self, op: &Operator, at: f64) {
        self.ledger
            .insert(protocol_node(
                &format!("proof-{}-{}", op.ledger_address, at),
                &op.ledger_address,
                operations::OPERATOR_ACTIVE_PROOF,
                &[(tags::UNIX_TIME, at.to_string().as_str())],
            ))
            .await;
    }

    pub async fn cancel(&self, op: &Operator) {
        self.ledger
            .insert(protocol_node(
                &format!("cancel-{}", op.registration),
                &op.ledger_address,
                operations::OPERATOR_CANCELLATION,
                &[(tags::REGISTRATION_TRANSACTION, op.registration.as_str())],
            ))
            .await;
    }

    /// A paid request with `n_images`, answered `responses` times
    pub async fn add_paid_request(&self, op: &Operator, request: &str, n_images: u32, paid: u64, responses: u32) {
        let n = n_images.to_string();
        let at = (NOW - 500.0).to_string();
        self.ledger
            .insert(protocol_node(
                request,
                "requester",
                operations::INFERENCE_REQUEST,
                &[
                    (tags::SCRIPT_TRANSACTION, SOLUTION),
                    (tags::N_IMAGES, n.as_str()),
                    (tags::UNIX_TIME, at.as_str()),
                ],
            ))
            .await;
        for i in 0..responses {
            self.ledger
                .insert(protocol_node(
                    &format!("{}-response-{}", request, i),
                    &op.ledger_address,
                    operations::INFERENCE_RESPONSE,
                    &[(tags::REQUEST_TRANSACTION, request)],
                ))
                .await;
        }
        self.chain
            .transfer(Address::repeat_byte(0x11), op.evm, paid, Some(request))
            .await;
    }

    /// Curator and marketplace shares of `fee` paid by `op`
    pub async fn pay_shares(&self, op: &Operator, fee: u64, curator: bool) {
        if curator {
            self.chain
                .transfer(op.evm, curator_evm(), fee * 20 / 100, None)
                .await;
        }
        self.chain
            .transfer(op.evm, marketplace(), fee * 10 / 100, None)
            .await;
    }

    pub async fn stamp(&self, target: &str, count: usize) {
        for i in 0..count {
            self.ledger
                .insert(node(
                    &format!("stamp-{}-{}", target, i),
                    "fan",
                    &[(tags::PROTOCOL_NAME, "Stamp"), (tags::DATA_SOURCE, target)],
                ))
                .await;
        }
    }
}

#[derive(Debug, Clone)]
pub struct Operator {
    pub registration: String,
    pub ledger_address: String,
    pub evm: Address,
}

impl Operator {
    pub fn new(n: u8) -> Self {
        Self {
            registration: format!("reg-{}", n),
            ledger_address: format!("op-ar-{}", n),
            evm: Address::repeat_byte(0xA0 + n),
        }
    }
}
