//! Data model for the resolution pipeline.

use serde::Deserialize;

/// Identity of the media item being resolved. Immutable input.
#[derive(Debug, Clone)]
pub struct MediaIdentity {
    /// Display title.
    pub title: String,
    /// Release year.
    pub release_year: u16,
    /// Primary catalog id (e.g., TMDB).
    pub tmdb_id: String,
    /// Optional external catalog id (e.g., IMDB).
    pub imdb_id: Option<String>,
}

impl MediaIdentity {
    pub fn new(title: impl Into<String>, release_year: u16, tmdb_id: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            release_year,
            tmdb_id: tmdb_id.into(),
            imdb_id: None,
        }
    }

    #[must_use]
    pub fn with_imdb_id(mut self, imdb_id: impl Into<String>) -> Self {
        self.imdb_id = Some(imdb_id.into());
        self
    }
}

/// Wire format of a resolved payload body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    /// Source list is plain JSON.
    PlainJson,
    /// Source list is an AES-encrypted, base64 string.
    AesEncryptedJson,
}

/// Raw response body of a resolve request plus its format tag.
/// Transient, never persisted.
#[derive(Debug, Clone)]
pub struct EncryptedEnvelope {
    pub body: String,
    pub format: PayloadFormat,
}

/// One upstream media URL with optional per-source metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaSource {
    /// Master playlist (or direct stream) URL.
    #[serde(alias = "file")]
    pub url: String,
    /// Quality label reported by the backend, if any.
    #[serde(default)]
    pub quality: Option<String>,
    /// Server name reported by the backend, if any.
    #[serde(default)]
    pub server: Option<String>,
}

/// Subtitle track descriptor as returned by a backend.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackEntry {
    /// Track URL.
    #[serde(alias = "url")]
    pub file: String,
    /// Language label (e.g., `"English"`).
    #[serde(default)]
    pub label: Option<String>,
    /// Track kind (e.g., `"captions"`, `"thumbnails"`).
    #[serde(default)]
    pub kind: Option<String>,
}

/// Decoded source data for one successful provider attempt.
/// Produced once per successful decrypt; immutable afterward.
#[derive(Debug, Clone)]
pub struct DecryptedSource {
    pub sources: Vec<MediaSource>,
    pub tracks: Vec<TrackEntry>,
}

/// One playable stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamVariant {
    /// Playable URL.
    pub url: String,
    /// Human-readable label, `"<provider>: <quality>"`.
    pub label: String,
    /// Ordering rank: 0 for the auto/master variant, explicit qualities
    /// ranked by descending resolution as encountered.
    pub rank: u32,
}

/// Source classification for a subtitle track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleSource {
    /// Fetched from a remote URL.
    Online,
}

/// One subtitle track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleTrack {
    pub url: String,
    /// Language tag or label; `"und"` when the backend omits it.
    pub language: String,
    pub source: SubtitleSource,
}

/// Result of one resolution call, owned by the caller once returned.
///
/// The auto variant, when present, is always at index 0. Ordering of the
/// remaining variants is completion order, not quality order.
#[derive(Debug, Clone, Default)]
pub struct ResolutionResult {
    pub variants: Vec<StreamVariant>,
    pub subtitles: Vec<SubtitleTrack>,
}

impl ResolutionResult {
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty() && self.subtitles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_builder() {
        let identity = MediaIdentity::new("Example", 2020, "12345").with_imdb_id("tt1234567");
        assert_eq!(identity.title, "Example");
        assert_eq!(identity.release_year, 2020);
        assert_eq!(identity.imdb_id.as_deref(), Some("tt1234567"));
    }

    #[test]
    fn media_source_accepts_file_alias() {
        let source: MediaSource =
            serde_json::from_str(r#"{"file":"https://cdn.example/master.m3u8"}"#).unwrap();
        assert_eq!(source.url, "https://cdn.example/master.m3u8");
        assert!(source.quality.is_none());
    }

    #[test]
    fn track_entry_tolerates_missing_metadata() {
        let track: TrackEntry = serde_json::from_str(r#"{"file":"https://cdn.example/en.vtt"}"#).unwrap();
        assert!(track.label.is_none());
        assert!(track.kind.is_none());
    }
}
