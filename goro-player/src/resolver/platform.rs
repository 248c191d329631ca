//! Embedded platform clients
//!
//! Two platform shapes are supported:
//! - [`TrackDownloader`]: needs a session/connect step, then hands out a
//!   download stream for a link.
//! - [`MediaCatalog`]: exposes per-link metadata listing the available
//!   formats; the resolver picks one and asks the catalog to stream it.
//!
//! Implementations map their own failures onto [`ResolveError`]. Rate limiting
//! and other "try again later" conditions should be reported as
//! [`ResolveError::ProviderTransientError`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ResolveError;
use crate::voice::ByteStream;

/// Connect-then-download platform (SoundCloud style)
#[async_trait]
pub trait TrackDownloader: Send + Sync {
    /// Establish (or refresh) the client session; called before every download
    async fn connect(&self) -> Result<(), ResolveError>;

    async fn download(&self, link: &str) -> Result<ByteStream, ResolveError>;
}

/// Metadata-driven platform (YouTube style)
#[async_trait]
pub trait MediaCatalog: Send + Sync {
    async fn fetch_info(&self, link: &str) -> Result<MediaInfo, ResolveError>;

    async fn open_stream(&self, info: &MediaInfo, format: &MediaFormat) -> Result<ByteStream, ResolveError>;
}

/// Metadata for one catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub title: String,
    pub length_secs: Option<u64>,
    pub formats: Vec<MediaFormat>,
}

/// One downloadable rendition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFormat {
    /// Catalog-specific format identifier
    pub id: String,
    pub mime_type: Option<String>,
    /// Present only for renditions carrying audio
    pub audio_codec: Option<String>,
    /// Kilobits per second
    pub audio_bitrate: Option<u32>,
}

/// Pick the highest-bitrate format that carries an audio codec
///
/// Formats without a bitrate rank as zero. On ties the earlier format wins.
pub fn select_audio_format(formats: &[MediaFormat]) -> Option<&MediaFormat> {
    formats
        .iter()
        .filter(|f| f.audio_codec.is_some())
        .fold(None, |best: Option<&MediaFormat>, current| match best {
            Some(b) if current.audio_bitrate.unwrap_or(0) <= b.audio_bitrate.unwrap_or(0) => Some(b),
            _ => Some(current),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(id: &str, codec: Option<&str>, bitrate: Option<u32>) -> MediaFormat {
        MediaFormat {
            id: id.to_string(),
            mime_type: None,
            audio_codec: codec.map(str::to_string),
            audio_bitrate: bitrate,
        }
    }

    #[test]
    fn test_selects_highest_bitrate_audio_format() {
        let formats = vec![
            format("video-only", None, Some(999)),
            format("low", Some("opus"), Some(48)),
            format("high", Some("opus"), Some(160)),
            format("mid", Some("mp4a"), Some(128)),
        ];

        assert_eq!(select_audio_format(&formats).unwrap().id, "high");
    }

    #[test]
    fn test_video_only_formats_yield_nothing() {
        let formats = vec![format("v1", None, Some(128)), format("v2", None, None)];
        assert!(select_audio_format(&formats).is_none());
        assert!(select_audio_format(&[]).is_none());
    }

    #[test]
    fn test_tie_keeps_first_and_missing_bitrate_ranks_lowest() {
        let formats = vec![
            format("unknown", Some("opus"), None),
            format("first", Some("opus"), Some(128)),
            format("second", Some("mp4a"), Some(128)),
        ];

        assert_eq!(select_audio_format(&formats).unwrap().id, "first");
    }
}
