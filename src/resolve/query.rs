//! Query builder
//!
//! Turns a media identity into the exact payload an aggregator backend
//! expects. The JSON is assembled with `format!` rather than a serializer
//! on purpose: the backends match the query literally, so field order and
//! the empty-string season/episode sentinels must survive bit-for-bit.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::Rng;

use super::crypto::{self, SourceKey};
use super::types::MediaIdentity;
use super::{ResolveError, Result};

/// App version code echoed in sealed query forms.
const APP_VERSION_CODE: &str = "129";

/// Build the search query payload for one media item.
///
/// `season`/`episode` serialize as `""` when absent — backend contract,
/// not a style choice. Fails with [`ResolveError::InvalidIdentity`] when
/// the title or primary id is empty.
pub fn build_query(
    identity: &MediaIdentity,
    season: Option<u32>,
    episode: Option<u32>,
) -> Result<String> {
    if identity.title.trim().is_empty() {
        return Err(ResolveError::InvalidIdentity("empty title".into()));
    }
    if identity.tmdb_id.trim().is_empty() {
        return Err(ResolveError::InvalidIdentity("empty primary id".into()));
    }

    let kind = if season.is_some() { "show" } else { "movie" };
    let season = season.map(|n| n.to_string()).unwrap_or_default();
    let episode = episode.map(|n| n.to_string()).unwrap_or_default();

    Ok(format!(
        r#"{{"title":"{}","releaseYear":{},"tmdbId":"{}","imdbId":"{}","type":"{}","season":"{}","episode":"{}"}}"#,
        identity.title,
        identity.release_year,
        identity.tmdb_id,
        identity.imdb_id.as_deref().unwrap_or(""),
        kind,
        season,
        episode,
    ))
}

/// Seal a query for backends that require the encrypted POST form.
///
/// The form carries a base64 inner body with the hashed app key, an MD5
/// verify digest over the ciphertext, and the encrypted query itself.
pub fn seal_query(query: &str, key: &SourceKey, app_key: &str) -> Result<Vec<(String, String)>> {
    if key.secret.is_empty() {
        return Err(ResolveError::DecryptionFailed(
            "no cipher secret configured for sealed queries".into(),
        ));
    }

    let ciphertext = crypto::encrypt_text(query, &key.secret);
    let verify = crypto::verify_hash(&ciphertext, app_key, &key.secret);
    let inner = serde_json::json!({
        "app_key": crypto::md5_hex(app_key),
        "verify": verify,
        "encrypt_data": ciphertext,
    })
    .to_string();

    Ok(vec![
        ("data".into(), BASE64.encode(inner)),
        ("appid".into(), "27".into()),
        ("platform".into(), "android".into()),
        ("version".into(), APP_VERSION_CODE.into()),
        ("medium".into(), format!("Website&token{}", random_token())),
    ])
}

/// Random 32-char alphanumeric token for form requests.
fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(rand::distributions::Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}
