//! Track source resolver
//!
//! Turns a user-submitted link into something a player can stream:
//!
//! | Kind          | Steps                                                  | Retried |
//! |---------------|--------------------------------------------------------|---------|
//! | SoundCloud    | connect, download                                      | no      |
//! | YouTube       | fetch metadata + select best audio format, open stream | yes (metadata + selection) |
//! | Direct file   | HTTP GET, stream body                                  | configurable (default no) |
//! | Unsupported   | fails immediately                                      | no      |
//!
//! The resolver never touches queue or session state.

pub mod direct;
pub mod platform;
pub mod retry;

use async_trait::async_trait;
use goro_common::config::ResolverConfig;
use goro_common::human_time::{duration_label, UNKNOWN_DURATION};
use goro_common::types::{TrackRequest, UserId};
use reqwest::Url;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use direct::DirectFileClient;
pub use platform::{select_audio_format, MediaCatalog, MediaFormat, MediaInfo, TrackDownloader};
pub use retry::RetryPolicy;

use crate::voice::AudioSource;

/// Resolver errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// No provider pattern matches the link
    #[error("Unsupported link: {0}")]
    UnsupportedLink(String),

    /// Metadata was available but no rendition carries audio
    #[error("No audio format available for {0}")]
    NoAudioFormat(String),

    /// Transport returned a non-success response (or none at all)
    #[error("Fetch failed: {reason}")]
    FetchFailed { status: Option<u16>, reason: String },

    /// Upstream failure expected to clear on retry (rate limiting etc.)
    #[error("Transient provider error: {0}")]
    ProviderTransientError(String),

    /// The link is recognized but no client for its platform is configured
    #[error("No client configured for {0} links")]
    ProviderUnavailable(ProviderKind),
}

impl ResolveError {
    /// Whether a retry policy may try again after this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ResolveError::ProviderTransientError(_)
                | ResolveError::NoAudioFormat(_)
                | ResolveError::FetchFailed { .. }
        )
    }

    /// Stable machine-readable tag
    pub fn error_tag(&self) -> &'static str {
        match self {
            ResolveError::UnsupportedLink(_) => "unsupported_link",
            ResolveError::NoAudioFormat(_) => "no_audio_format",
            ResolveError::FetchFailed { .. } => "fetch_failed",
            ResolveError::ProviderTransientError(_) => "provider_transient_error",
            ResolveError::ProviderUnavailable(_) => "provider_unavailable",
        }
    }
}

/// Provider classification of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    SoundCloud,
    YouTube,
    DirectFile,
    Unsupported,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::SoundCloud => write!(f, "SoundCloud"),
            ProviderKind::YouTube => write!(f, "YouTube"),
            ProviderKind::DirectFile => write!(f, "direct file"),
            ProviderKind::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// Classify a link by host, falling back to file extension
///
/// Only absolute http(s) URLs are considered. Extensions are compared
/// case-insensitively against the URL path, ignoring query and fragment.
pub fn classify(link: &str, direct_extensions: &[String]) -> ProviderKind {
    let Ok(url) = Url::parse(link.trim()) else {
        return ProviderKind::Unsupported;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return ProviderKind::Unsupported;
    }

    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let on_domain = |domain: &str| host == domain || host.ends_with(&format!(".{}", domain));

    if on_domain("soundcloud.com") {
        return ProviderKind::SoundCloud;
    }
    if on_domain("youtube.com") || on_domain("youtu.be") {
        return ProviderKind::YouTube;
    }

    let path = url.path().to_ascii_lowercase();
    let is_direct = direct_extensions
        .iter()
        .any(|ext| path.ends_with(&format!(".{}", ext.trim_start_matches('.').to_ascii_lowercase())));

    if is_direct {
        ProviderKind::DirectFile
    } else {
        ProviderKind::Unsupported
    }
}

/// Anything that can turn a link into a playable source
///
/// The playback engine depends on this seam rather than on [`SourceResolver`]
/// directly.
#[async_trait]
pub trait TrackSource: Send + Sync {
    async fn resolve(&self, link: &str) -> Result<AudioSource, ResolveError>;
}

/// Resolver backed by the configured platform clients
pub struct SourceResolver {
    config: ResolverConfig,
    direct: DirectFileClient,
    downloader: Option<Arc<dyn TrackDownloader>>,
    catalog: Option<Arc<dyn MediaCatalog>>,
    catalog_retry: RetryPolicy,
    direct_retry: RetryPolicy,
}

impl SourceResolver {
    /// Create a resolver handling direct links only; attach platform clients
    /// with [`with_downloader`](Self::with_downloader) and
    /// [`with_catalog`](Self::with_catalog).
    pub fn new(config: ResolverConfig) -> crate::Result<Self> {
        let direct = DirectFileClient::new(&config)
            .map_err(|e| crate::Error::Http(format!("Failed to build HTTP client: {}", e)))?;

        let catalog_retry = RetryPolicy::new(
            config.catalog_max_attempts,
            Duration::from_millis(config.catalog_backoff_ms),
        );
        let direct_retry = RetryPolicy::new(
            config.direct_max_attempts,
            Duration::from_millis(config.direct_backoff_ms),
        );

        Ok(Self {
            config,
            direct,
            downloader: None,
            catalog: None,
            catalog_retry,
            direct_retry,
        })
    }

    pub fn with_downloader(mut self, downloader: Arc<dyn TrackDownloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn MediaCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn classify(&self, link: &str) -> ProviderKind {
        classify(link, &self.config.direct_extensions)
    }

    /// Build the queue entry for a link
    ///
    /// Catalog links take title and length from metadata (single attempt).
    /// Everything else, and any metadata failure, falls back to a title derived
    /// from the link. Only unclassifiable links are rejected.
    pub async fn describe(&self, link: &str, requested_by: UserId) -> Result<TrackRequest, ResolveError> {
        let kind = self.classify(link);
        if kind == ProviderKind::Unsupported {
            return Err(ResolveError::UnsupportedLink(link.to_string()));
        }

        if let (ProviderKind::YouTube, Some(catalog)) = (kind, &self.catalog) {
            match catalog.fetch_info(link).await {
                Ok(info) => {
                    let label = info
                        .length_secs
                        .map(duration_label)
                        .unwrap_or_else(|| UNKNOWN_DURATION.to_string());
                    return Ok(TrackRequest::new(link, info.title, label, requested_by));
                }
                Err(e) => warn!(link = %link, "Metadata lookup failed, using link as title: {}", e),
            }
        }

        Ok(TrackRequest::new(link, title_from_link(link), UNKNOWN_DURATION, requested_by))
    }

    async fn resolve_soundcloud(&self, link: &str) -> Result<AudioSource, ResolveError> {
        let downloader = self
            .downloader
            .as_ref()
            .ok_or(ResolveError::ProviderUnavailable(ProviderKind::SoundCloud))?;

        downloader.connect().await?;
        let stream = downloader.download(link).await?;
        Ok(AudioSource::stream(link, stream))
    }

    async fn resolve_youtube(&self, link: &str) -> Result<AudioSource, ResolveError> {
        let catalog = self
            .catalog
            .as_ref()
            .ok_or(ResolveError::ProviderUnavailable(ProviderKind::YouTube))?;

        let (info, format) = self
            .catalog_retry
            .run("catalog metadata", |attempt| async move {
                debug!(link = %link, attempt, "Fetching catalog metadata");
                let info = catalog.fetch_info(link).await?;
                let format = select_audio_format(&info.formats)
                    .cloned()
                    .ok_or_else(|| ResolveError::NoAudioFormat(link.to_string()))?;
                Ok((info, format))
            })
            .await?;

        debug!(
            link = %link,
            format = %format.id,
            bitrate = ?format.audio_bitrate,
            "Selected audio format"
        );

        let stream = catalog.open_stream(&info, &format).await?;
        Ok(AudioSource::stream(link, stream))
    }

    async fn resolve_direct(&self, link: &str) -> Result<AudioSource, ResolveError> {
        self.direct_retry
            .run("direct fetch", |_| self.direct.fetch(link))
            .await
    }
}

#[async_trait]
impl TrackSource for SourceResolver {
    async fn resolve(&self, link: &str) -> Result<AudioSource, ResolveError> {
        let kind = self.classify(link);
        info!(link = %link, provider = %kind, "Resolving track source");

        match kind {
            ProviderKind::SoundCloud => self.resolve_soundcloud(link).await,
            ProviderKind::YouTube => self.resolve_youtube(link).await,
            ProviderKind::DirectFile => self.resolve_direct(link).await,
            ProviderKind::Unsupported => Err(ResolveError::UnsupportedLink(link.to_string())),
        }
    }
}

/// Last non-empty path segment, or the whole link
fn title_from_link(link: &str) -> String {
    Url::parse(link)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(str::to_string))
        })
        .unwrap_or_else(|| link.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extensions() -> Vec<String> {
        ResolverConfig::default().direct_extensions
    }

    #[test]
    fn test_classify_platform_hosts() {
        let ext = extensions();
        assert_eq!(classify("https://soundcloud.com/artist/track", &ext), ProviderKind::SoundCloud);
        assert_eq!(classify("https://m.soundcloud.com/artist/track", &ext), ProviderKind::SoundCloud);
        assert_eq!(classify("https://www.youtube.com/watch?v=abc", &ext), ProviderKind::YouTube);
        assert_eq!(classify("https://music.youtube.com/watch?v=abc", &ext), ProviderKind::YouTube);
        assert_eq!(classify("https://youtu.be/abc", &ext), ProviderKind::YouTube);
    }

    #[test]
    fn test_classify_direct_files_by_extension() {
        let ext = extensions();
        assert_eq!(classify("https://cdn.example.com/a/song.mp3", &ext), ProviderKind::DirectFile);
        assert_eq!(classify("https://cdn.example.com/SONG.FLAC", &ext), ProviderKind::DirectFile);
        assert_eq!(classify("https://cdn.example.com/clip.webm?sig=1#t=3", &ext), ProviderKind::DirectFile);
    }

    #[test]
    fn test_classify_rejects_everything_else() {
        let ext = extensions();
        assert_eq!(classify("https://example.com/page.html", &ext), ProviderKind::Unsupported);
        assert_eq!(classify("ftp://example.com/song.mp3", &ext), ProviderKind::Unsupported);
        assert_eq!(classify("not a link", &ext), ProviderKind::Unsupported);
        // Look-alike host must not match
        assert_eq!(classify("https://notyoutube.com/watch", &ext), ProviderKind::Unsupported);
    }

    #[test]
    fn test_only_transient_classes_are_retryable() {
        assert!(ResolveError::ProviderTransientError("429".into()).is_retryable());
        assert!(ResolveError::NoAudioFormat("x".into()).is_retryable());
        assert!(ResolveError::FetchFailed { status: Some(503), reason: "busy".into() }.is_retryable());
        assert!(!ResolveError::UnsupportedLink("x".into()).is_retryable());
        assert!(!ResolveError::ProviderUnavailable(ProviderKind::YouTube).is_retryable());
    }

    #[test]
    fn test_title_from_link() {
        assert_eq!(title_from_link("https://cdn.example.com/music/song.mp3"), "song.mp3");
        assert_eq!(title_from_link("https://soundcloud.com/artist/track/"), "track");
        assert_eq!(title_from_link("garbage"), "garbage");
    }
}
