//! Variant expander
//!
//! Expands a master adaptive playlist into per-quality stream variants.
//! Resource lines and `RESOLUTION=` declarations are paired positionally
//! (the Nth declaration describes the Nth resource); when the two
//! subsequences differ in length, expansion stops at the shorter one
//! instead of indexing out of range — malformed upstream playlists are
//! common.

use tracing::warn;

use super::types::StreamVariant;
use super::{ResolveError, Result};

/// Expand a master playlist body into labeled per-quality variants.
///
/// Labels are `"<prefix>: <height>p"`. Ranks start at 1 (0 is reserved
/// for the auto variant) and follow descending resolution among the
/// heights encountered; the returned order is appearance order. Relative
/// resource lines are resolved against `master_url`.
///
/// Fails with [`ResolveError::PlaylistMalformed`] when the body is not a
/// playlist at all; callers recover locally and keep the auto variant.
pub fn expand_variants(
    master_body: &str,
    master_url: &str,
    label_prefix: &str,
) -> Result<Vec<StreamVariant>> {
    if !master_body.contains("#EXTM3U") {
        return Err(ResolveError::PlaylistMalformed(
            "missing #EXTM3U header".into(),
        ));
    }

    let urls: Vec<&str> = master_body
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#') && line.contains(".m3u8"))
        .collect();

    let heights: Vec<u32> = master_body
        .lines()
        .filter(|line| line.contains("RESOLUTION="))
        .filter_map(parse_height)
        .collect();

    let paired = urls.len().min(heights.len());
    if paired < urls.len() || paired < heights.len() {
        warn!(
            urls = urls.len(),
            resolutions = heights.len(),
            "playlist subsequences differ in length, truncating"
        );
    }

    let mut ranked: Vec<u32> = heights[..paired].to_vec();
    ranked.sort_unstable_by(|a, b| b.cmp(a));
    ranked.dedup();

    let variants = urls
        .iter()
        .zip(&heights)
        .take(paired)
        .filter_map(|(line, height)| {
            let url = resolve_resource(master_url, line)?;
            let rank = ranked.iter().position(|h| h == height).map_or(1, |i| i + 1);
            Some(StreamVariant {
                url,
                label: format!("{label_prefix}: {height}p"),
                rank: rank as u32,
            })
        })
        .collect();

    Ok(variants)
}

/// Resolve one resource line, joining relative URIs against the master
/// playlist URL. Unresolvable lines are dropped with a warning.
fn resolve_resource(master_url: &str, line: &str) -> Option<String> {
    if line.starts_with("http://") || line.starts_with("https://") {
        return Some(line.to_string());
    }
    match url::Url::parse(master_url).and_then(|base| base.join(line)) {
        Ok(resolved) => Some(resolved.into()),
        Err(err) => {
            warn!(%line, %err, "unresolvable resource line");
            None
        }
    }
}

/// Vertical pixel component of the first `RESOLUTION=WxH` attribute.
fn parse_height(line: &str) -> Option<u32> {
    let rest = &line[line.find("RESOLUTION=")? + "RESOLUTION=".len()..];
    let value = rest.split(',').next()?;
    value.split('x').nth(1)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER_URL: &str = "https://cdn.example/hls/master.m3u8";

    const MASTER: &str = "#EXTM3U\n\
        #EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\n\
        https://cdn.example/360.m3u8\n\
        #EXT-X-STREAM-INF:BANDWIDTH=1400000,RESOLUTION=1280x720,CODECS=\"avc1.4d401f\"\n\
        https://cdn.example/720.m3u8\n\
        #EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1920x1080\n\
        https://cdn.example/1080.m3u8\n";

    #[test]
    fn three_pairs_expand_in_appearance_order() {
        let variants = expand_variants(MASTER, MASTER_URL, "VidCloud").unwrap();
        assert_eq!(variants.len(), 3);
        assert_eq!(variants[0].label, "VidCloud: 360p");
        assert_eq!(variants[1].label, "VidCloud: 720p");
        assert_eq!(variants[2].label, "VidCloud: 1080p");
        assert_eq!(variants[0].url, "https://cdn.example/360.m3u8");
    }

    #[test]
    fn ranks_follow_descending_resolution() {
        let variants = expand_variants(MASTER, MASTER_URL, "VidCloud").unwrap();
        // 1080p is rank 1, 720p rank 2, 360p rank 3; order stays appearance order.
        assert_eq!(variants[2].rank, 1);
        assert_eq!(variants[1].rank, 2);
        assert_eq!(variants[0].rank, 3);
    }

    #[test]
    fn mismatched_subsequences_truncate_to_shorter() {
        let body = "#EXTM3U\n\
            #EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\n\
            https://cdn.example/360.m3u8\n\
            #EXT-X-STREAM-INF:BANDWIDTH=1400000,RESOLUTION=1280x720\n\
            https://cdn.example/720.m3u8\n\
            https://cdn.example/extra.m3u8\n";
        let variants = expand_variants(body, MASTER_URL, "X").unwrap();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[1].label, "X: 720p");
    }

    #[test]
    fn codecs_attribute_does_not_pollute_height() {
        let body = "#EXTM3U\n\
            #EXT-X-STREAM-INF:RESOLUTION=1280x720,CODECS=\"avc1,mp4a\"\n\
            https://cdn.example/720.m3u8\n";
        let variants = expand_variants(body, MASTER_URL, "X").unwrap();
        assert_eq!(variants[0].label, "X: 720p");
    }

    #[test]
    fn relative_resource_lines_resolve_against_master() {
        let body = "#EXTM3U\n\
            #EXT-X-STREAM-INF:RESOLUTION=1280x720\n\
            720/index.m3u8\n";
        let variants = expand_variants(body, MASTER_URL, "X").unwrap();
        assert_eq!(variants[0].url, "https://cdn.example/hls/720/index.m3u8");
    }

    #[test]
    fn non_playlist_body_is_malformed() {
        let err = expand_variants("<html>not found</html>", MASTER_URL, "X").unwrap_err();
        assert!(matches!(err, ResolveError::PlaylistMalformed(_)));
    }

    #[test]
    fn media_playlist_without_variants_expands_to_nothing() {
        let body = "#EXTM3U\n#EXTINF:4.0,\nseg0.ts\n#EXT-X-ENDLIST\n";
        let variants = expand_variants(body, MASTER_URL, "X").unwrap();
        assert!(variants.is_empty());
    }
}
