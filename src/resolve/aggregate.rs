//! Aggregator
//!
//! Fans out from one decoded source payload to the final result set:
//! seeds the auto/master variant, then runs two independent concurrent
//! groups — per-quality playlist expansion and subtitle conversion.
//! Per-item failures are recovered locally and never abort the call or
//! cancel sibling work; the aggregate returns whatever subset succeeded.

use futures::future::join_all;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use crate::client::Transport;

use super::playlist::expand_variants;
use super::types::{
    DecryptedSource, MediaSource, ResolutionResult, StreamVariant, SubtitleSource, SubtitleTrack,
    TrackEntry,
};
use super::{AttemptError, Result};

/// One item produced during aggregation, delivered incrementally.
#[derive(Debug, Clone)]
pub enum ResolvedItem {
    Variant(StreamVariant),
    Subtitle(SubtitleTrack),
}

impl ResolvedItem {
    /// URL used for per-call dedup.
    pub fn url(&self) -> &str {
        match self {
            Self::Variant(v) => &v.url,
            Self::Subtitle(s) => &s.url,
        }
    }
}

/// Aggregates one provider's decoded sources into variants + subtitles.
pub struct Aggregator<'a> {
    transport: &'a dyn Transport,
    headers: &'a [(String, String)],
    /// Label prefix for emitted variants, the winning provider's name.
    label: &'a str,
}

impl<'a> Aggregator<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        headers: &'a [(String, String)],
        label: &'a str,
    ) -> Self {
        Self {
            transport,
            headers,
            label,
        }
    }

    /// Buffered aggregation: collect everything into one result.
    ///
    /// The auto variant is always index 0; ordering beyond that is
    /// completion order and must not be read as quality-sorted.
    pub async fn aggregate(&self, source: &DecryptedSource) -> Result<ResolutionResult> {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let produce = async {
            let outcome = self.aggregate_into(source, &tx).await;
            drop(tx);
            outcome
        };
        let collect = async {
            let mut result = ResolutionResult::default();
            let mut seen: Vec<String> = Vec::new();
            while let Some(item) = rx.recv().await {
                if seen.iter().any(|url| url == item.url()) {
                    continue;
                }
                seen.push(item.url().to_string());
                match item {
                    ResolvedItem::Variant(v) => result.variants.push(v),
                    ResolvedItem::Subtitle(s) => result.subtitles.push(s),
                }
            }
            result
        };

        let (outcome, result) = tokio::join!(produce, collect);
        outcome?;
        Ok(result)
    }

    /// Streaming aggregation: send items into `tx` as they are produced.
    ///
    /// The two task groups (variant expansion, subtitle conversion) run
    /// concurrently and independently; a failed playlist fetch in one
    /// group never cancels the other or its siblings.
    pub(crate) async fn aggregate_into(
        &self,
        source: &DecryptedSource,
        tx: &UnboundedSender<ResolvedItem>,
    ) -> Result<()> {
        let master = source
            .sources
            .first()
            .ok_or(AttemptError::EmptySources)?;

        // Auto variant first, before any fan-out.
        let _ = tx.send(ResolvedItem::Variant(StreamVariant {
            url: master.url.clone(),
            label: format!("{}: Auto", self.label),
            rank: 0,
        }));

        let expand_group = async {
            join_all(
                source
                    .sources
                    .iter()
                    .map(|media| self.expand_one(media, tx)),
            )
            .await;
        };
        let subtitle_group = async {
            for track in &source.tracks {
                if let Some(subtitle) = subtitle_from_track(track) {
                    let _ = tx.send(ResolvedItem::Subtitle(subtitle));
                }
            }
        };

        tokio::join!(expand_group, subtitle_group);
        Ok(())
    }

    /// Fetch one master playlist and emit its per-quality variants.
    /// Fails softly: this source contributes zero extra variants.
    async fn expand_one(&self, media: &MediaSource, tx: &UnboundedSender<ResolvedItem>) {
        let resp = match self.transport.request(&media.url, self.headers).await {
            Ok(resp) if resp.is_success() => resp,
            Ok(resp) => {
                warn!(url = %media.url, status = resp.status, "playlist fetch failed");
                return;
            }
            Err(err) => {
                warn!(url = %media.url, %err, "playlist fetch failed");
                return;
            }
        };

        match expand_variants(&resp.body, &media.url, self.label) {
            Ok(variants) => {
                for variant in variants {
                    let _ = tx.send(ResolvedItem::Variant(variant));
                }
            }
            Err(err) => {
                warn!(url = %media.url, %err, "playlist expansion failed");
            }
        }
    }
}

/// Convert one backend track descriptor into a subtitle track.
///
/// Permissive by choice: entries with missing metadata are kept with the
/// language falling back to `"und"`; only thumbnail tracks are dropped.
fn subtitle_from_track(track: &TrackEntry) -> Option<SubtitleTrack> {
    if track.kind.as_deref() == Some("thumbnails") {
        return None;
    }
    if track.file.is_empty() {
        return None;
    }

    Some(SubtitleTrack {
        url: track.file.clone(),
        language: track.label.clone().unwrap_or_else(|| "und".to_string()),
        source: SubtitleSource::Online,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thumbnails_are_dropped() {
        let track = TrackEntry {
            file: "https://cdn.example/thumbs.vtt".into(),
            label: None,
            kind: Some("thumbnails".into()),
        };
        assert!(subtitle_from_track(&track).is_none());
    }

    #[test]
    fn missing_label_falls_back_to_und() {
        let track = TrackEntry {
            file: "https://cdn.example/sub.vtt".into(),
            label: None,
            kind: Some("captions".into()),
        };
        let subtitle = subtitle_from_track(&track).unwrap();
        assert_eq!(subtitle.language, "und");
        assert_eq!(subtitle.source, SubtitleSource::Online);
    }

    #[test]
    fn labeled_caption_converts() {
        let track = TrackEntry {
            file: "https://cdn.example/en.vtt".into(),
            label: Some("English".into()),
            kind: Some("captions".into()),
        };
        let subtitle = subtitle_from_track(&track).unwrap();
        assert_eq!(subtitle.language, "English");
    }
}
