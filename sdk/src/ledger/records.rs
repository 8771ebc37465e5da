//! Typed views over the protocol's ledger records.

use super::{TagFilter, TransactionNode};
use crate::config::ProtocolSection;
use crate::constants::tags;
use serde::{Deserialize, Serialize};

/// Protocol name, version and operation filters shared by every FairAI query
pub fn protocol_filters(protocol: &ProtocolSection, operation: &str) -> Vec<TagFilter> {
    vec![
        TagFilter::single(tags::PROTOCOL_NAME, protocol.name.as_str()),
        TagFilter::single(tags::PROTOCOL_VERSION, protocol.version.as_str()),
        TagFilter::single(tags::OPERATION_NAME, operation),
    ]
}

/// Parse a `Unix-Time` tag. Writers emit fractional seconds.
pub fn parse_unix_time(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|t| t.is_finite())
}

/// An operator's registration to serve a solution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub ledger_tx_id: String,
    /// Ledger identity of the operator
    pub operator_address: String,
    pub solution_reference: Option<String>,
    /// Per-unit fee as a decimal string of whole stablecoin units
    pub operator_fee: Option<String>,
    pub registration_timestamp: Option<f64>,
}

impl RegistrationRecord {
    pub fn from_node(node: &TransactionNode) -> Self {
        Self {
            ledger_tx_id: node.id.clone(),
            operator_address: node.owner.address.clone(),
            solution_reference: node.tag(tags::SCRIPT_TRANSACTION).map(str::to_string),
            operator_fee: node.tag(tags::OPERATOR_FEE).map(str::to_string),
            registration_timestamp: node.tag(tags::UNIX_TIME).and_then(parse_unix_time),
        }
    }
}

/// Revokes exactly one registration from the same owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationRecord {
    pub ledger_tx_id: String,
    pub owner_address: String,
    pub registration_tx_id: Option<String>,
}

impl CancellationRecord {
    pub fn from_node(node: &TransactionNode) -> Self {
        Self {
            ledger_tx_id: node.id.clone(),
            owner_address: node.owner.address.clone(),
            registration_tx_id: node.tag(tags::REGISTRATION_TRANSACTION).map(str::to_string),
        }
    }

    pub fn cancels(&self, registration: &RegistrationRecord) -> bool {
        self.owner_address == registration.operator_address
            && self.registration_tx_id.as_deref() == Some(registration.ledger_tx_id.as_str())
    }
}

/// Periodic liveness proof published by an operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivenessProof {
    pub owner_address: String,
    pub proof_timestamp: Option<f64>,
}

impl LivenessProof {
    pub fn from_node(node: &TransactionNode) -> Self {
        Self {
            owner_address: node.owner.address.clone(),
            proof_timestamp: node.tag(tags::UNIX_TIME).and_then(parse_unix_time),
        }
    }

    /// Strictly newer than `now - window`
    pub fn is_fresh(&self, now: f64, window_secs: u64) -> bool {
        self.proof_timestamp
            .map_or(false, |t| t > now - window_secs as f64)
    }
}

/// An inference request published by a requester
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequestRecord {
    pub ledger_tx_id: String,
    pub requester: String,
    pub solution_tx: Option<String>,
    pub operator: Option<String>,
    pub conversation_id: Option<String>,
    pub unix_time: Option<f64>,
    pub content_type: Option<String>,
    /// `N-Images`, 1 when absent or unparsable
    pub n_images: u32,
}

impl InferenceRequestRecord {
    pub fn from_node(node: &TransactionNode) -> Self {
        Self {
            ledger_tx_id: node.id.clone(),
            requester: node.owner.address.clone(),
            solution_tx: node.tag(tags::SCRIPT_TRANSACTION).map(str::to_string),
            operator: node.tag(tags::OPERATOR).map(str::to_string),
            conversation_id: node.tag(tags::CONVERSATION_IDENTIFIER).map(str::to_string),
            unix_time: node.tag(tags::UNIX_TIME).and_then(parse_unix_time),
            content_type: node.tag(tags::CONTENT_TYPE).map(str::to_string),
            n_images: node.tag(tags::N_IMAGES).and_then(parse_image_count).unwrap_or(1),
        }
    }
}

/// Whole image counts, also when written as a float (`"2.0"`)
fn parse_image_count(value: &str) -> Option<u32> {
    let n: f64 = value.trim().parse().ok()?;
    (n.is_finite() && n.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&n)).then_some(n as u32)
}
