//! Media source-resolution pipeline
//!
//! Resolves one watchable item into playable stream URLs and subtitle
//! tracks:
//! - Query construction against aggregator backends
//! - Provider directory lookup (`/status`)
//! - Ordered, short-circuiting fallback across candidate providers
//! - Encrypted payload decryption (stale-key detection)
//! - Master playlist expansion into per-quality variants
//! - Concurrent aggregation of variants and subtitles

pub mod aggregate;
pub mod coordinator;
pub mod crypto;
pub mod directory;
pub mod playlist;
pub mod query;
pub mod types;

use thiserror::Error;

pub use aggregate::Aggregator;
pub use coordinator::{BackendConfig, QueryMode, SourceResolver};
pub use crypto::SourceKey;
pub use directory::ProviderDirectory;
pub use playlist::expand_variants;
pub use query::build_query;
pub use types::{
    DecryptedSource, MediaIdentity, MediaSource, ResolutionResult, StreamVariant, SubtitleSource,
    SubtitleTrack, TrackEntry,
};

use crate::client::TransportError;

/// Failure of a single provider attempt inside the fallback loop.
///
/// Never surfaced to callers directly; the coordinator converts it into a
/// fallback decision and only the last attempt's cause escapes, wrapped
/// in [`ResolveError::ResolutionExhausted`].
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error("search request failed with status {0}")]
    SearchStatus(u16),

    #[error("search response missing resource reference")]
    MissingResourceRef,

    #[error("resolve request failed with status {0}")]
    ResolveStatus(u16),

    #[error("resolve response contained an error marker")]
    ErrorMarker,

    #[error("resolved payload contained no sources")]
    EmptySources,
}

/// Resolution pipeline errors.
///
/// Only `InvalidIdentity`, `NoProvidersAvailable`, `ResolutionExhausted`
/// and `Cancelled` are terminal for callers; everything else is either
/// recovered locally or folded into the exhaustion cause.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("invalid media identity: {0}")]
    InvalidIdentity(String),

    #[error("provider directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("no providers available")]
    NoProvidersAvailable,

    #[error("provider attempt failed: {0}")]
    Attempt(#[from] AttemptError),

    #[error("decryption failed, source key may be outdated: {0}")]
    DecryptionFailed(String),

    #[error("all providers exhausted, last attempt on '{provider}' failed")]
    ResolutionExhausted {
        provider: String,
        #[source]
        cause: Option<Box<ResolveError>>,
    },

    #[error("malformed adaptive playlist: {0}")]
    PlaylistMalformed(String),

    #[error("resolution cancelled by deadline")]
    Cancelled,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ResolveError>;
