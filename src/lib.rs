//! `sourcery` - Media source resolution pipeline
//!
//! # Features
//!
//! - **Ordered fallback**: sequential, short-circuiting attempts across
//!   the providers a backend's status endpoint reports healthy
//! - **Payload decryption**: salted AES envelope handling with distinct
//!   stale-key signaling
//! - **Playlist expansion**: per-quality variants from master adaptive
//!   playlists, defensive against malformed upstreams
//! - **Concurrent aggregation**: independent variant/subtitle task
//!   groups with partial-failure tolerance
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sourcery::{HttpTransport, MediaIdentity, SourceKey, SourceResolver};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let transport = Arc::new(HttpTransport::new()?);
//!     let resolver = SourceResolver::new(
//!         transport,
//!         sourcery::config::default_backend(),
//!         SourceKey::default(),
//!     );
//!
//!     let identity = MediaIdentity::new("Example", 2020, "tt1234567");
//!     let result = resolver.resolve(&identity, None, None).await?;
//!     println!("{} stream variants", result.variants.len());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod resolve;

pub use client::{HttpMethod, HttpTransport, Transport, TransportError, TransportResponse};
pub use resolve::{
    build_query, expand_variants, Aggregator, BackendConfig, DecryptedSource, MediaIdentity,
    MediaSource, ProviderDirectory, QueryMode, ResolutionResult, ResolveError, SourceKey,
    SourceResolver, StreamVariant, SubtitleSource, SubtitleTrack, TrackEntry,
};

/// Version of sourcery
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
