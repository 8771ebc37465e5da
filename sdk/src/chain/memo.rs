//! Memo codec for stablecoin transfers.
//!
//! A memo is the UTF-8 ledger transaction id appended to the ABI-encoded
//! `transfer(address,uint256)` call data:
//!
//! ```text
//! selector (4) | to (32) | amount (32) | memo bytes (n)
//! ```
//!
//! The token contract ignores trailing call data; the memo is read back from
//! the transaction input.

use super::contracts::IERC20;
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;

/// Length of the encoded `transfer` call preceding the memo
pub const TRANSFER_CALL_LEN: usize = 4 + 32 + 32;

/// `transfer(to, amount)` call data with `memo` appended
pub fn encode_transfer_with_memo(to: Address, amount: U256, memo: &str) -> Bytes {
    let mut data = IERC20::transferCall { to, amount }.abi_encode();
    data.extend_from_slice(memo.as_bytes());
    data.into()
}

/// Memo carried by `input`, if any
pub fn decode_memo(input: &[u8]) -> Option<String> {
    let tail = input.get(TRANSFER_CALL_LEN..)?;
    let memo = std::str::from_utf8(tail).ok()?.trim_end_matches('\0');
    if memo.is_empty() {
        None
    } else {
        Some(memo.to_string())
    }
}
