//! Protocol constants shared by every record the marketplace reads or writes.

/// Default protocol name carried on every FairAI record
pub const PROTOCOL_NAME: &str = "FairAI";

/// Default protocol version carried on every FairAI record
pub const PROTOCOL_VERSION: &str = "2.0-test";

/// Protocol name used by third-party stamp (endorsement) records
pub const STAMP_PROTOCOL_NAME: &str = "Stamp";

/// Native USDC on Arbitrum One
pub const NATIVE_USDC_ARB: &str = "0xaf88d065e77c8cC2239327C5EDb3A432268e5831";

/// Marketplace treasury receiving registration fees and the marketplace share
pub const MARKETPLACE_EVM_ADDRESS: &str = "0x611dEe04f236BbC45e3a6De266ABe2B2b32eab31";

/// Registration fee in whole stablecoin units
pub const REGISTRATION_FEE_UNITS: u64 = 1;

/// Curator share of the expected fee, in percent
pub const CURATOR_SHARE_PERCENT: u64 = 20;

/// Marketplace share of the expected fee, in percent
pub const MARKETPLACE_SHARE_PERCENT: u64 = 10;

/// An operator is live only with a proof newer than this many seconds
pub const LIVENESS_WINDOW_SECS: u64 = 30 * 60;

/// Page size used by every discovery query
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Request payloads above this size are never published
pub const MAX_PAYLOAD_BYTES: usize = 100 * 1024;

/// Blocks scanned before the block nearest to an anchor timestamp
pub const DEFAULT_LOOKBACK_BLOCKS: u64 = 10;

/// `N-Images` must fall strictly between these bounds to be tagged
pub const MIN_IMAGES_EXCLUSIVE: u32 = 0;
pub const MAX_IMAGES_EXCLUSIVE: u32 = 10;

/// Operation names
pub mod operations {
    pub const OPERATOR_REGISTRATION: &str = "Operator Registration";
    pub const OPERATOR_CANCELLATION: &str = "Operator Cancellation";
    pub const OPERATOR_ACTIVE_PROOF: &str = "Operator Active Proof";
    pub const EVM_WALLET_LINK: &str = "EVM Wallet Link";
    pub const CONVERSATION_START: &str = "Conversation Start";
    pub const INFERENCE_REQUEST: &str = "Inference Request";
    pub const INFERENCE_RESPONSE: &str = "Script Inference Response";
}

/// Tag names
pub mod tags {
    pub const PROTOCOL_NAME: &str = "Protocol-Name";
    pub const PROTOCOL_VERSION: &str = "Protocol-Version";
    pub const OPERATION_NAME: &str = "Operation-Name";
    pub const SCRIPT_TRANSACTION: &str = "Script-Transaction";
    pub const REGISTRATION_TRANSACTION: &str = "Registration-Transaction";
    pub const REQUEST_TRANSACTION: &str = "Request-Transaction";
    pub const OPERATOR_FEE: &str = "Operator-Fee";
    pub const UNIX_TIME: &str = "Unix-Time";
    pub const N_IMAGES: &str = "N-Images";
    pub const DATA_SOURCE: &str = "Data-Source";
    pub const EVM_PUBLIC_KEY: &str = "EVM-Public-Key";
    pub const CONVERSATION_IDENTIFIER: &str = "Conversation-Identifier";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const TRANSACTION_ORIGIN: &str = "Transaction-Origin";
    pub const OPERATOR: &str = "Operator";
    pub const LICENSE: &str = "License";
    pub const DERIVATION: &str = "Derivation";
    pub const COMMERCIAL_USE: &str = "Commercial-Use";
    pub const ASSET_NAMES: &str = "Asset-Names";
    pub const WIDTH: &str = "Width";
    pub const HEIGHT: &str = "Height";
    pub const PRIVATE_MODE: &str = "Private-Mode";
    pub const USER_PUBLIC_KEY: &str = "User-Public-Key";
    pub const ENCRYPTION_SCHEME: &str = "Encryption-Scheme";
}

pub const TRANSACTION_ORIGIN_NODE: &str = "FairAI Node";
pub const DERIVATION_DEFAULT: &str = "Allowed-With-License-Passthrough";
pub const COMMERCIAL_USE_DEFAULT: &str = "Allowed";
