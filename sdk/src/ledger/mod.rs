//! Indexed-ledger query collaborator.
//!
//! Queries are tag/owner/id filtered pages of transaction edges. The engine
//! speaks to the ledger only through [`LedgerQuery`], so tests can swap in an
//! in-memory ledger.

mod graphql;
pub mod records;

pub use graphql::GraphqlLedger;

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A name/value tag attached to a ledger transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Matches transactions carrying tag `name` with any of `values`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFilter {
    pub name: String,
    pub values: Vec<String>,
}

impl TagFilter {
    pub fn new(name: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn single(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: vec![value.into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub address: String,
    #[serde(default)]
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionNode {
    pub id: String,
    pub tags: Vec<Tag>,
    pub owner: Owner,
}

impl TransactionNode {
    /// Value of the first tag named `name`
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.value.as_str())
    }

    pub fn has_tag(&self, name: &str, value: &str) -> bool {
        self.tags.iter().any(|t| t.name == name && t.value == value)
    }

    pub fn owner_address(&self) -> &str {
        &self.owner.address
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEdge {
    pub cursor: String,
    pub node: TransactionNode,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
}

/// One page of query results, newest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
    pub page_info: PageInfo,
    pub edges: Vec<TransactionEdge>,
}

impl TransactionPage {
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn into_nodes(self) -> Vec<TransactionNode> {
        self.edges.into_iter().map(|e| e.node).collect()
    }
}

/// Filters for a single `transactions(...)` query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionQuery {
    pub tags: Vec<TagFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owners: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    pub first: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

impl TransactionQuery {
    pub fn new(first: u32) -> Self {
        Self {
            tags: Vec::new(),
            owners: None,
            ids: None,
            first,
            after: None,
        }
    }

    pub fn tag(mut self, filter: TagFilter) -> Self {
        self.tags.push(filter);
        self
    }

    pub fn tags(mut self, filters: impl IntoIterator<Item = TagFilter>) -> Self {
        self.tags.extend(filters);
        self
    }

    pub fn owners(mut self, owners: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.owners = Some(owners.into_iter().map(Into::into).collect());
        self
    }

    pub fn ids(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.after = Some(cursor.into());
        self
    }
}

/// How many pages a discovery query follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Only the first page, results past `first` are ignored
    SinglePage,
    /// Follow cursors while `hasNextPage`, up to `max_pages`
    Paginated { max_pages: u32 },
}

impl Default for QueryMode {
    fn default() -> Self {
        Self::SinglePage
    }
}

/// Ledger query service
#[async_trait]
pub trait LedgerQuery: Send + Sync {
    /// Run one page of a query, sorted by block height descending
    async fn query(&self, query: &TransactionQuery) -> Result<TransactionPage>;

    /// Raw data body of a transaction
    async fn fetch_data(&self, id: &str) -> Result<Vec<u8>>;
}

/// Run `query` following cursors according to `mode`
pub async fn fetch_transactions(
    ledger: &dyn LedgerQuery,
    query: &TransactionQuery,
    mode: QueryMode,
) -> Result<Vec<TransactionNode>> {
    let max_pages = match mode {
        QueryMode::SinglePage => 1,
        QueryMode::Paginated { max_pages } => max_pages.max(1),
    };

    let mut nodes = Vec::new();
    let mut current = query.clone();

    for page_no in 1..=max_pages {
        let page = ledger.query(&current).await?;
        let has_next = page.page_info.has_next_page;
        let last_cursor = page.edges.last().map(|e| e.cursor.clone());

        nodes.extend(page.into_nodes());

        match (has_next, last_cursor) {
            (true, Some(cursor)) if page_no < max_pages => current.after = Some(cursor),
            _ => break,
        }
    }

    Ok(nodes)
}

/// Look up a single transaction by id
pub async fn find_by_id(ledger: &dyn LedgerQuery, id: &str) -> Result<Option<TransactionNode>> {
    let page = ledger.query(&TransactionQuery::new(1).ids([id])).await?;
    Ok(page.into_nodes().into_iter().next())
}
