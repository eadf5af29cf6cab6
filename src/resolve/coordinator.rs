//! Resolution coordinator
//!
//! The fallback state machine: `Start -> TryProvider(i) -> {Success |
//! TryProvider(i+1)} -> Exhausted`. Providers are tried strictly
//! sequentially — order encodes priority and attempts have network side
//! effects that must not interleave — and the first working provider
//! wins. Failures are folded into a fallback decision and only the last
//! attempt's cause escapes, wrapped in
//! [`ResolveError::ResolutionExhausted`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::client::{HttpMethod, Transport};

use super::aggregate::{Aggregator, ResolvedItem};
use super::crypto::{self, SourceKey};
use super::directory::ProviderDirectory;
use super::query;
use super::types::{
    EncryptedEnvelope, MediaIdentity, PayloadFormat, ResolutionResult, StreamVariant,
    SubtitleTrack,
};
use super::{AttemptError, ResolveError, Result};

/// How the search query travels to the backend.
#[derive(Debug, Clone)]
pub enum QueryMode {
    /// Plain GET with the query as a URL parameter.
    Get,
    /// Encrypted POST form with an app-key verify digest.
    SealedForm { app_key: String },
}

/// Configuration record for one aggregator backend.
///
/// Near-identical backends differ only by this record; there is one
/// resolver implementation, not one per backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Display name, used in diagnostics.
    pub name: String,
    /// API base URL, no trailing slash.
    pub base_url: String,
    /// Origin/Referer the backend expects.
    pub origin: String,
    pub query_mode: QueryMode,
}

/// Resolves one media item into playable streams and subtitles.
///
/// The transport and key are shared read-only across all attempts;
/// nothing here mutates them. A stale key is reported through
/// [`ResolveError::DecryptionFailed`] in the exhaustion cause, never by
/// in-place key state.
pub struct SourceResolver {
    transport: Arc<dyn Transport>,
    config: BackendConfig,
    key: SourceKey,
    headers: Vec<(String, String)>,
}

impl SourceResolver {
    pub fn new(transport: Arc<dyn Transport>, config: BackendConfig, key: SourceKey) -> Self {
        let headers = vec![
            ("Origin".to_string(), config.origin.clone()),
            ("Referer".to_string(), config.origin.clone()),
            ("X-Requested-With".to_string(), "XMLHttpRequest".to_string()),
        ];
        Self {
            transport,
            config,
            key,
            headers,
        }
    }

    /// Directory client for this backend's status endpoint.
    pub fn directory(&self) -> ProviderDirectory {
        ProviderDirectory::new(
            Arc::clone(&self.transport),
            self.config.base_url.clone(),
            self.headers.clone(),
        )
    }

    /// Resolve into a buffered result.
    #[instrument(skip(self, identity), fields(title = %identity.title, backend = %self.config.name))]
    pub async fn resolve(
        &self,
        identity: &MediaIdentity,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> Result<ResolutionResult> {
        let mut result = ResolutionResult::default();
        self.resolve_inner(identity, season, episode, None, false, |item| match item {
            ResolvedItem::Variant(v) => result.variants.push(v),
            ResolvedItem::Subtitle(s) => result.subtitles.push(s),
        })
        .await?;
        Ok(result)
    }

    /// Resolve with incremental delivery through callbacks.
    ///
    /// Produces exactly the same final set as [`Self::resolve`].
    pub async fn resolve_with(
        &self,
        identity: &MediaIdentity,
        season: Option<u32>,
        episode: Option<u32>,
        mut on_variant: impl FnMut(StreamVariant) + Send,
        mut on_subtitle: impl FnMut(SubtitleTrack) + Send,
    ) -> Result<()> {
        self.resolve_inner(identity, season, episode, None, false, |item| match item {
            ResolvedItem::Variant(v) => on_variant(v),
            ResolvedItem::Subtitle(s) => on_subtitle(s),
        })
        .await
    }

    /// Resolve under an overall deadline.
    ///
    /// On expiry, in-flight fetches are abandoned. With `best_effort`
    /// the partial accumulation collected so far is returned; otherwise
    /// the call fails with [`ResolveError::Cancelled`].
    pub async fn resolve_within(
        &self,
        identity: &MediaIdentity,
        season: Option<u32>,
        episode: Option<u32>,
        deadline: Duration,
        best_effort: bool,
    ) -> Result<ResolutionResult> {
        let mut result = ResolutionResult::default();
        let outcome = self
            .resolve_inner(
                identity,
                season,
                episode,
                Some(Instant::now() + deadline),
                best_effort,
                |item| match item {
                    ResolvedItem::Variant(v) => result.variants.push(v),
                    ResolvedItem::Subtitle(s) => result.subtitles.push(s),
                },
            )
            .await;
        match outcome {
            Ok(()) => Ok(result),
            Err(err) => Err(err),
        }
    }

    /// Shared core: drives the fallback loop as a producer and merges
    /// its item stream through a single consumer (dedup by URL), so the
    /// buffered and callback entry points cannot diverge.
    async fn resolve_inner(
        &self,
        identity: &MediaIdentity,
        season: Option<u32>,
        episode: Option<u32>,
        deadline: Option<Instant>,
        best_effort: bool,
        mut sink: impl FnMut(ResolvedItem),
    ) -> Result<()> {
        let query = query::build_query(identity, season, episode)?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let produce = self.run(&query, tx);
        tokio::pin!(produce);

        // Far-future sentinel keeps the select arm simple when no
        // deadline was requested.
        let expiry = deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(86_400));

        let mut outcome: Option<Result<()>> = None;
        let mut seen: HashSet<String> = HashSet::new();

        loop {
            tokio::select! {
                item = rx.recv() => match item {
                    Some(item) => {
                        if seen.insert(item.url().to_string()) {
                            sink(item);
                        }
                    }
                    // Producer finished and dropped its sender.
                    None => break,
                },
                res = &mut produce, if outcome.is_none() => {
                    outcome = Some(res);
                }
                () = tokio::time::sleep_until(expiry), if deadline.is_some() => {
                    if best_effort && !seen.is_empty() {
                        warn!("deadline reached, returning partial results");
                        return Ok(());
                    }
                    return Err(ResolveError::Cancelled);
                }
            }
        }

        outcome.unwrap_or(Ok(()))
    }

    /// The fallback loop proper.
    async fn run(&self, search_query: &str, tx: UnboundedSender<ResolvedItem>) -> Result<()> {
        let providers = self.directory().list_providers().await?;

        let mut last: Option<(String, ResolveError)> = None;
        for (index, provider) in providers.iter().enumerate() {
            match self.attempt(provider, search_query, &tx).await {
                Ok(()) => {
                    info!(provider = %provider, "resolved");
                    return Ok(());
                }
                Err(err) => {
                    if index + 1 < providers.len() {
                        error!(provider = %provider, %err, "attempt failed, falling through");
                    }
                    last = Some((provider.clone(), err));
                }
            }
        }

        match last {
            Some((provider, cause)) => Err(ResolveError::ResolutionExhausted {
                provider,
                cause: Some(Box::new(cause)),
            }),
            // Defensive terminal; the loop above always records a failure
            // for a non-empty provider list.
            None => Err(ResolveError::ResolutionExhausted {
                provider: String::new(),
                cause: None,
            }),
        }
    }

    /// One provider attempt: search -> resolve -> decode -> aggregate.
    async fn attempt(
        &self,
        provider: &str,
        search_query: &str,
        tx: &UnboundedSender<ResolvedItem>,
    ) -> Result<()> {
        let reference = self.search(provider, search_query).await?;
        let envelope = self.fetch_envelope(provider, &reference).await?;
        let source = crypto::decrypt(&envelope, &self.key)?;

        let aggregator = Aggregator::new(self.transport.as_ref(), &self.headers, provider);
        aggregator.aggregate_into(&source, tx).await
    }

    /// Search step: returns the opaque resource reference.
    async fn search(&self, provider: &str, search_query: &str) -> Result<String> {
        let resp = match &self.config.query_mode {
            QueryMode::Get => {
                let url = format!(
                    "{}/search?provider={}&query={}",
                    self.config.base_url,
                    provider,
                    urlencoding::encode(search_query),
                );
                self.transport.request(&url, &self.headers).await?
            }
            QueryMode::SealedForm { app_key } => {
                let url = format!("{}/search?provider={provider}", self.config.base_url);
                let form = query::seal_query(search_query, &self.key, app_key)?;
                self.transport
                    .form_request(&url, HttpMethod::Post, &form, &self.headers)
                    .await?
            }
        };

        if !resp.is_success() {
            return Err(AttemptError::SearchStatus(resp.status).into());
        }

        let body: serde_json::Value = serde_json::from_str(&resp.body)?;
        body.get("url")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| AttemptError::MissingResourceRef.into())
    }

    /// Resolve step: fetches the source payload for a resource reference
    /// and tags its format.
    async fn fetch_envelope(&self, provider: &str, reference: &str) -> Result<EncryptedEnvelope> {
        let url = format!(
            "{}/provider?resourceId={}&provider={}&v={}&h={}",
            self.config.base_url,
            urlencoding::encode(reference),
            provider,
            self.key.version,
            self.key.id,
        );
        let resp = self.transport.request(&url, &self.headers).await?;

        if !resp.is_success() {
            return Err(AttemptError::ResolveStatus(resp.status).into());
        }
        if resp.body.contains("\"error\"") {
            error!(provider = %provider, body = %resp.body, "resolve error marker");
            return Err(AttemptError::ErrorMarker.into());
        }

        let value: serde_json::Value = serde_json::from_str(&resp.body)?;
        let format = if value.get("sources").is_some_and(serde_json::Value::is_string) {
            PayloadFormat::AesEncryptedJson
        } else {
            PayloadFormat::PlainJson
        };

        Ok(EncryptedEnvelope {
            body: resp.body,
            format,
        })
    }
}
