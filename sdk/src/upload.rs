//! Upload collaborator: publishes request payloads to the ledger.

use crate::errors::Result;
use crate::ledger::Tag;
use async_trait::async_trait;
use tracing::warn;

/// Body of an inference request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPayload {
    /// Prompt text, published as `text/plain`
    Text(String),
    Binary { bytes: Vec<u8>, content_type: String },
}

impl RequestPayload {
    pub fn content_type(&self) -> &str {
        match self {
            Self::Text(_) => "text/plain",
            Self::Binary { content_type, .. } => content_type,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary { bytes, .. } => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for RequestPayload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for RequestPayload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Ledger upload service
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Publish `payload` with `tags`; `None` when the service accepted nothing
    async fn publish(&self, payload: &RequestPayload, tags: &[Tag]) -> Result<Option<String>>;
}

/// Publish unless `payload` exceeds `max_bytes`. Every failure collapses to `None`.
pub async fn publish_capped(
    uploader: &dyn Uploader,
    payload: &RequestPayload,
    tags: &[Tag],
    max_bytes: usize,
) -> Option<String> {
    if payload.len() > max_bytes {
        warn!(
            size = payload.len(),
            max = max_bytes,
            "Payload too large, not publishing"
        );
        return None;
    }

    match uploader.publish(payload, tags).await {
        Ok(id) => id,
        Err(e) => {
            warn!("Upload failed: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MarketplaceError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingUploader {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Uploader for CountingUploader {
        async fn publish(&self, _payload: &RequestPayload, _tags: &[Tag]) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(MarketplaceError::Ledger("node rejected bundle".into()))
            } else {
                Ok(Some("tx-id".to_string()))
            }
        }
    }

    fn uploader(fail: bool) -> CountingUploader {
        CountingUploader {
            calls: AtomicUsize::new(0),
            fail,
        }
    }

    #[tokio::test]
    async fn test_oversized_payload_never_reaches_uploader() {
        let up = uploader(false);
        let payload = RequestPayload::Text("x".repeat(101));

        assert_eq!(publish_capped(&up, &payload, &[], 100).await, None);
        assert_eq!(up.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_payload_at_cap_is_published() {
        let up = uploader(false);
        let payload = RequestPayload::Binary {
            bytes: vec![0; 100],
            content_type: "image/png".to_string(),
        };

        assert_eq!(
            publish_capped(&up, &payload, &[], 100).await.as_deref(),
            Some("tx-id")
        );
        assert_eq!(payload.content_type(), "image/png");
    }

    #[tokio::test]
    async fn test_upload_error_becomes_none() {
        let up = uploader(true);
        assert_eq!(publish_capped(&up, &"hi".into(), &[], 100).await, None);
        assert_eq!(up.calls.load(Ordering::SeqCst), 1);
    }
}
