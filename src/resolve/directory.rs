//! Provider directory
//!
//! Fetches the list of currently healthy candidate backends from the
//! aggregator's status endpoint. The order of the returned list encodes
//! fallback priority and is never re-sorted.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::client::Transport;

use super::{ResolveError, Result};

/// Directory client for one aggregator backend.
pub struct ProviderDirectory {
    transport: Arc<dyn Transport>,
    base_url: String,
    headers: Vec<(String, String)>,
}

impl ProviderDirectory {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        headers: Vec<(String, String)>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            headers,
        }
    }

    /// Fetch the ordered provider candidate list.
    ///
    /// Fails with [`ResolveError::DirectoryUnavailable`] on transport
    /// error, non-success status, or an explicit error marker in the
    /// body, and with the distinct [`ResolveError::NoProvidersAvailable`]
    /// when the decoded list is empty — callers must not run a fallback
    /// loop of size zero.
    #[instrument(skip(self))]
    pub async fn list_providers(&self) -> Result<Vec<String>> {
        let url = format!("{}/status", self.base_url);
        let resp = self
            .transport
            .request(&url, &self.headers)
            .await
            .map_err(|err| ResolveError::DirectoryUnavailable(err.to_string()))?;

        if !resp.is_success() {
            return Err(ResolveError::DirectoryUnavailable(format!(
                "status endpoint returned {}",
                resp.status
            )));
        }
        if resp.body.contains("\"error\"") {
            return Err(ResolveError::DirectoryUnavailable(
                "status endpoint returned an error marker".into(),
            ));
        }

        let status: StatusResponse = serde_json::from_str(&resp.body)
            .map_err(|err| ResolveError::DirectoryUnavailable(format!("bad status body: {err}")))?;

        if status.providers.is_empty() {
            return Err(ResolveError::NoProvidersAvailable);
        }

        debug!(count = status.providers.len(), "providers available");
        Ok(status.providers)
    }
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    providers: Vec<String>,
}
