//! GraphQL client for an Arweave-style indexed ledger.

use super::{LedgerQuery, TransactionPage, TransactionQuery};
use crate::config::LedgerSection;
use crate::errors::{MarketplaceError, Result};
use crate::retry::{retry, RetryConfig};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const TRANSACTIONS_QUERY: &str = r#"
query transactions($tags: [TagFilter!], $owners: [String!], $ids: [ID!], $first: Int!, $after: String) {
  transactions(tags: $tags, owners: $owners, ids: $ids, first: $first, after: $after, sort: HEIGHT_DESC) {
    pageInfo {
      hasNextPage
    }
    edges {
      cursor
      node {
        id
        tags {
          name
          value
        }
        owner {
          address
          key
        }
      }
    }
  }
}
"#;

#[derive(Serialize)]
struct GraphqlRequest<'a> {
    query: &'static str,
    variables: &'a TransactionQuery,
}

#[derive(Deserialize)]
struct GraphqlResponse {
    data: Option<TransactionsData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Deserialize)]
struct TransactionsData {
    transactions: TransactionPage,
}

#[derive(Deserialize)]
struct GraphqlError {
    message: String,
}

/// Ledger client over HTTP
pub struct GraphqlLedger {
    http: Client,
    graphql_url: String,
    gateway_url: String,
    retry: RetryConfig,
}

impl GraphqlLedger {
    pub fn new(section: &LedgerSection) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(section.request_timeout_secs))
            .pool_max_idle_per_host(4)
            .build()?;

        Ok(Self {
            http,
            graphql_url: section.graphql_url.clone(),
            gateway_url: normalize_gateway(&section.gateway_url),
            retry: RetryConfig::ledger(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn post_query(&self, query: &TransactionQuery) -> Result<TransactionPage> {
        let response: GraphqlResponse = self
            .http
            .post(&self.graphql_url)
            .json(&GraphqlRequest {
                query: TRANSACTIONS_QUERY,
                variables: query,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        into_page(response)
    }

    async fn get_data(&self, id: &str) -> Result<Vec<u8>> {
        let url = format!("{}{}", self.gateway_url, id);
        let bytes = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl LedgerQuery for GraphqlLedger {
    async fn query(&self, query: &TransactionQuery) -> Result<TransactionPage> {
        let page = retry(&self.retry, || self.post_query(query)).await?;
        debug!(
            results = page.edges.len(),
            has_next_page = page.page_info.has_next_page,
            "GraphQL query returned"
        );
        Ok(page)
    }

    async fn fetch_data(&self, id: &str) -> Result<Vec<u8>> {
        retry(&self.retry, || self.get_data(id)).await
    }
}

fn into_page(response: GraphqlResponse) -> Result<TransactionPage> {
    if !response.errors.is_empty() {
        let messages: Vec<_> = response.errors.into_iter().map(|e| e.message).collect();
        warn!("GraphQL errors: {:?}", messages);
        return Err(MarketplaceError::Ledger(messages.join("; ")));
    }

    response
        .data
        .map(|d| d.transactions)
        .ok_or_else(|| MarketplaceError::Ledger("response carried no data".to_string()))
}

fn normalize_gateway(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}
