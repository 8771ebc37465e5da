//! Popularity ranking by stamp count.

use crate::constants::{tags, STAMP_PROTOCOL_NAME};
use crate::context::MarketplaceContext;
use crate::errors::Result;
use crate::ledger::{fetch_transactions, TagFilter, TransactionQuery};
use crate::logging::helpers::log_ledger_query;
use std::collections::HashMap;

/// Stamp counts keyed by stamped transaction id
pub type StampCounts = HashMap<String, u64>;

/// Count `Stamp` records per `Data-Source` among `ids`. `None` when nothing was stamped.
pub async fn count_stamps(ctx: &MarketplaceContext, ids: &[String]) -> Result<Option<StampCounts>> {
    if ids.is_empty() {
        return Ok(None);
    }

    let query = TransactionQuery::new(ctx.config().ledger.page_size)
        .tag(TagFilter::single(tags::PROTOCOL_NAME, STAMP_PROTOCOL_NAME))
        .tag(TagFilter::new(tags::DATA_SOURCE, ids.iter().map(String::as_str)));
    let stamps = fetch_transactions(ctx.ledger(), &query, ctx.query_mode()).await?;
    log_ledger_query("stamps", stamps.len());

    if stamps.is_empty() {
        return Ok(None);
    }

    let mut counts = StampCounts::new();
    for source in stamps.iter().filter_map(|n| n.tag(tags::DATA_SOURCE)) {
        *counts.entry(source.to_string()).or_default() += 1;
    }
    Ok(Some(counts))
}

/// Sort ascending by stamp count, least stamped first
///
/// Ids without stamps count as 0 and ties keep their input order.
// NOTE: ascending puts the most stamped operator last, which looks inverted.
// Pinned by test_ascending_and_stable until the intended direction is settled.
pub fn rank_by_stamps<T>(items: &mut [T], counts: &StampCounts, id_of: impl Fn(&T) -> &str) {
    items.sort_by_key(|item| counts.get(id_of(item)).copied().unwrap_or(0));
}
