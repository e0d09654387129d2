//! Content sources
//!
//! A [`ContentSource`] turns a [`ContentRef`] into bytes, optionally a byte range
//! of them. The controller only consults a source on a cache miss, and never for
//! inline (community) content.

use crate::error::PlaybackFault;
use async_trait::async_trait;
use bytes::Bytes;
use cadence_core::{ByteRange, ContentRef};
use std::io::SeekFrom;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

/// Fetches song content by reference
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch the whole content, or `range` of it
    async fn fetch(
        &self,
        content: &ContentRef,
        range: Option<ByteRange>,
    ) -> Result<Bytes, PlaybackFault>;
}

fn unsupported_ref(content: &ContentRef) -> PlaybackFault {
    let kind = match content {
        ContentRef::Url(_) => "url",
        ContentRef::File(_) => "file",
        ContentRef::Inline(_) => "inline",
    };
    PlaybackFault::NetworkFailure(format!("No content source configured for {kind} references"))
}

/// Reads local files with `tokio::fs`
///
/// Range reads seek to the start offset and read only the requested length.
#[derive(Debug, Clone, Default)]
pub struct FileContentSource;

impl FileContentSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContentSource for FileContentSource {
    async fn fetch(
        &self,
        content: &ContentRef,
        range: Option<ByteRange>,
    ) -> Result<Bytes, PlaybackFault> {
        let ContentRef::File(path) = content else {
            return Err(unsupported_ref(content));
        };

        let io_fault = |err: std::io::Error| {
            PlaybackFault::NetworkFailure(format!("{}: {}", path.display(), err))
        };

        let mut file = tokio::fs::File::open(path).await.map_err(io_fault)?;
        let mut buffer = Vec::new();

        match range {
            None => {
                file.read_to_end(&mut buffer).await.map_err(io_fault)?;
            }
            Some(range) => {
                file.seek(SeekFrom::Start(range.start))
                    .await
                    .map_err(io_fault)?;
                match range.len() {
                    Some(len) => {
                        file.take(len)
                            .read_to_end(&mut buffer)
                            .await
                            .map_err(io_fault)?;
                    }
                    None => {
                        file.read_to_end(&mut buffer).await.map_err(io_fault)?;
                    }
                }
            }
        }

        debug!(path = %path.display(), ?range, bytes = buffer.len(), "Read file content");
        Ok(Bytes::from(buffer))
    }
}

/// Fetches URLs over HTTP with `Range` support
#[cfg(feature = "http")]
#[derive(Debug, Clone, Default)]
pub struct HttpContentSource {
    http: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpContentSource {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl ContentSource for HttpContentSource {
    async fn fetch(
        &self,
        content: &ContentRef,
        range: Option<ByteRange>,
    ) -> Result<Bytes, PlaybackFault> {
        let ContentRef::Url(url) = content else {
            return Err(unsupported_ref(content));
        };

        debug!(url = %url, ?range, "Fetching remote content");

        let mut request = self.http.get(url);
        if let Some(range) = range {
            request = request.header(reqwest::header::RANGE, range.to_header_value());
        }

        let response = request
            .send()
            .await
            .map_err(|err| PlaybackFault::NetworkFailure(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlaybackFault::NetworkFailure(format!(
                "{url} returned HTTP {}",
                status.as_u16()
            )));
        }

        let partial = status == reqwest::StatusCode::PARTIAL_CONTENT;
        let body = response
            .bytes()
            .await
            .map_err(|err| PlaybackFault::NetworkFailure(err.to_string()))?;

        // Servers that ignore Range send the full body
        Ok(match range {
            Some(range) if !partial => range.slice(&body),
            _ => body,
        })
    }
}

/// Dispatches each reference kind to the matching source
///
/// Inline references are answered directly from the reference itself.
#[derive(Clone, Default)]
pub struct SourceRouter {
    files: Option<Arc<dyn ContentSource>>,
    urls: Option<Arc<dyn ContentSource>>,
}

impl SourceRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files(mut self, source: Arc<dyn ContentSource>) -> Self {
        self.files = Some(source);
        self
    }

    pub fn with_urls(mut self, source: Arc<dyn ContentSource>) -> Self {
        self.urls = Some(source);
        self
    }

    /// Router for local files, plus HTTP when the `http` feature is on
    pub fn with_defaults() -> Self {
        Self::new()
            .with_files(Arc::new(FileContentSource::new()))
            .with_default_urls()
    }

    #[cfg(feature = "http")]
    fn with_default_urls(self) -> Self {
        self.with_urls(Arc::new(HttpContentSource::default()))
    }

    #[cfg(not(feature = "http"))]
    fn with_default_urls(self) -> Self {
        self
    }
}

impl std::fmt::Debug for SourceRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRouter")
            .field("files", &self.files.is_some())
            .field("urls", &self.urls.is_some())
            .finish()
    }
}

#[async_trait]
impl ContentSource for SourceRouter {
    async fn fetch(
        &self,
        content: &ContentRef,
        range: Option<ByteRange>,
    ) -> Result<Bytes, PlaybackFault> {
        let source = match content {
            ContentRef::Inline(bytes) => {
                return Ok(range.map_or_else(|| bytes.clone(), |range| range.slice(bytes)));
            }
            ContentRef::File(_) => self.files.as_ref(),
            ContentRef::Url(_) => self.urls.as_ref(),
        };

        match source {
            Some(source) => source.fetch(content, range).await,
            None => Err(unsupported_ref(content)),
        }
    }
}
