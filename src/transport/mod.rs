//! The consumed transport contracts: a buffered fetch, an incremental
//! body stream with explicit abort, and metadata re-resolution. The
//! streaming engine drives these; it never owns a socket itself.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::common::errors::StreamError;
use crate::common::http::HttpClient;
use crate::common::types::AudioContainer;

/// A half-open byte range; `end == None` requests through end-of-resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    pub fn header_value(&self) -> String {
        match self.end {
            // HTTP ranges are inclusive of their end byte.
            Some(end) => format!("bytes={}-{}", self.start, end.saturating_sub(1)),
            None => format!("bytes={}-", self.start),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub headers: Vec<(String, String)>,
    pub range: Option<ByteRange>,
}

/// A buffered response. HTTP status >= 400 arrives here as a value the
/// engine can branch on, never as an error.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        self.status < 400
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// An incrementally-readable body plus the status it arrived with.
pub struct StreamResponse {
    pub status: u16,
    pub body: Box<dyn BodyStream>,
}

/// Pull-based body handle. Dropping it aborts the underlying connection;
/// `abort` exists for making that explicit mid-read.
#[async_trait]
pub trait BodyStream: Send {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError>;
    fn abort(&mut self);
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &str, opts: FetchOptions) -> Result<FetchResponse, StreamError>;

    async fn fetch_stream(
        &self,
        url: &str,
        opts: FetchOptions,
    ) -> Result<StreamResponse, StreamError>;
}

/// The signature-protection fields of a resolved format, when present.
#[derive(Debug, Clone)]
pub struct SignatureCipher {
    /// The obfuscated signature token.
    pub signature: String,
    /// Query-parameter name the deciphered signature must be written to.
    pub sp: Option<String>,
    /// URL of the player script that defines the transform.
    pub script_url: String,
}

/// What format selection hands the streaming engine for one quality index.
#[derive(Debug, Clone)]
pub struct ResolvedFormat {
    pub url: String,
    pub container: AudioContainer,
    pub codec: String,
    pub content_length: Option<u64>,
    pub duration_secs: Option<u64>,
    pub live: bool,
    pub cipher: Option<SignatureCipher>,
}

/// Metadata re-resolution, re-run on every retry so expired URLs are
/// replaced. Service-specific DTO mapping lives behind this seam.
#[async_trait]
pub trait FormatResolver: Send + Sync {
    async fn resolve_format(
        &self,
        media_url: &str,
        quality: u32,
    ) -> Result<ResolvedFormat, StreamError>;
}

/// Production transport over reqwest, following redirects and surfacing
/// status codes as values.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, StreamError> {
        Ok(Self {
            client: HttpClient::new()?,
        })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn request(&self, url: &str, opts: &FetchOptions) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .get(url)
            .header("User-Agent", HttpClient::random_user_agent())
            .header("Accept", "*/*")
            .header("Accept-Encoding", "identity")
            .timeout(Duration::from_secs(15));

        for (name, value) in &opts.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(range) = &opts.range {
            req = req.header("Range", range.header_value());
        }
        req
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str, opts: FetchOptions) -> Result<FetchResponse, StreamError> {
        let res = self.request(url, &opts).send().await?;

        let status = res.status().as_u16();
        let headers = res
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.to_string(), v.to_str().ok()?.to_string())))
            .collect();
        let body = res.bytes().await?;

        Ok(FetchResponse {
            status,
            headers,
            body,
        })
    }

    async fn fetch_stream(
        &self,
        url: &str,
        opts: FetchOptions,
    ) -> Result<StreamResponse, StreamError> {
        let res = self.request(url, &opts).send().await?;
        let status = res.status().as_u16();

        Ok(StreamResponse {
            status,
            body: Box::new(ReqwestBody {
                inner: Some(res),
            }),
        })
    }
}

struct ReqwestBody {
    inner: Option<reqwest::Response>,
}

#[async_trait]
impl BodyStream for ReqwestBody {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
        match self.inner.as_mut() {
            Some(res) => Ok(res.chunk().await?),
            None => Ok(None),
        }
    }

    fn abort(&mut self) {
        // Dropping the response tears down the connection.
        self.inner = None;
    }
}
