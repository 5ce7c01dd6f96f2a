use crate::util::validate_url;
use futures::StreamExt;
use pulldown_cmark::{html, Event, Options, Parser};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://r.jina.ai";

const MAX_CONTENT_SIZE: usize = 5 * 1024 * 1024; // 5MB
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_RETRIES: u32 = 3;

/// Selectors sent as `X-Target-Selector`, most specific first.
const TARGET_SELECTORS: &str =
    "article, .entry-content, .post-content, .article-content, .post-body, main .content, main";

/// Anything shorter than this after the selector pass is retried without it.
const MIN_CONTENT_LEN: usize = 200;

/// Marker that ends the proxy's metadata preamble.
const MARKDOWN_MARKER: &str = "Markdown Content:";

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Request timed out after 20s")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Invalid UTF-8 in response")]
    InvalidUtf8,
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Insecure base URL: HTTPS required (except localhost for testing)")]
    InsecureBaseUrl,
    #[error("No readable content")]
    Empty,
}

impl ContentError {
    fn is_retryable(&self) -> bool {
        match self {
            ContentError::Timeout | ContentError::Network(_) => true,
            ContentError::HttpStatus(status) => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Full-text client for a jina-style reader proxy (`<base>/<article url>`).
///
/// The proxy answers with markdown; [`FullTextFetcher::fetch`] returns it
/// converted to HTML, ready to be stored as an entry's mobilized body.
#[derive(Clone)]
pub struct FullTextFetcher {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    retry_delay: Duration,
}

impl FullTextFetcher {
    /// Build a fetcher. `base_url` must be HTTPS unless it points at
    /// localhost.
    pub fn new(
        client: reqwest::Client,
        base_url: Option<&str>,
        api_key: Option<SecretString>,
    ) -> Result<Self, ContentError> {
        let base = base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/');
        if !base.starts_with("https://") {
            let is_localhost =
                base.starts_with("http://127.0.0.1") || base.starts_with("http://localhost");
            if !is_localhost {
                tracing::error!(base_url = %base, "Rejecting non-HTTPS reader proxy");
                return Err(ContentError::InsecureBaseUrl);
            }
            tracing::warn!(base_url = %base, "Using non-HTTPS reader proxy (localhost only)");
        }
        if base != DEFAULT_BASE_URL {
            tracing::info!(base_url = %base, "Using custom reader proxy");
        }

        Ok(Self {
            client,
            base_url: base.to_string(),
            api_key,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// First backoff delay; doubles on every retry.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Fetch the article behind `url` and return it as HTML.
    pub async fn fetch(&self, url: &str) -> Result<String, ContentError> {
        let parsed = validate_url(url).map_err(|_| ContentError::InvalidUrl)?;
        let proxy_url = format!("{}/{}", self.base_url, parsed.as_str());

        let mut markdown = self.fetch_with_retry(&proxy_url, true).await?;
        if markdown.len() < MIN_CONTENT_LEN {
            tracing::debug!(
                content_len = markdown.len(),
                "Target selector returned minimal content, retrying without selector"
            );
            markdown = self.fetch_with_retry(&proxy_url, false).await?;
        }

        let body = strip_preamble(&markdown).trim();
        if body.is_empty() {
            return Err(ContentError::Empty);
        }
        Ok(markdown_to_html(body))
    }

    async fn fetch_with_retry(
        &self,
        proxy_url: &str,
        use_selector: bool,
    ) -> Result<String, ContentError> {
        let mut retry = 0;
        loop {
            match self.fetch_once(proxy_url, use_selector).await {
                Ok(content) => return Ok(content),
                Err(e) if e.is_retryable() && retry < MAX_RETRIES => {
                    let delay = self.retry_delay * (1u32 << retry);
                    tracing::debug!(
                        error = %e,
                        retry = retry + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying full-text fetch after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, proxy_url: &str, use_selector: bool) -> Result<String, ContentError> {
        let mut request = self.client.get(proxy_url);
        if use_selector {
            request = request.header("X-Target-Selector", TARGET_SELECTORS);
        }

        // The key only ever goes to the official proxy hosts
        let is_official =
            proxy_url.starts_with("https://r.jina.ai/") || proxy_url.starts_with("https://api.jina.ai/");
        if let Some(key) = &self.api_key {
            if is_official {
                request = request.header("Authorization", format!("Bearer {}", key.expose_secret()));
            } else {
                tracing::debug!("Skipping API key for custom reader proxy");
            }
        }

        let response = tokio::time::timeout(REQUEST_TIMEOUT, request.send())
            .await
            .map_err(|_| ContentError::Timeout)?
            .map_err(ContentError::Network)?;

        if !response.status().is_success() {
            return Err(ContentError::HttpStatus(response.status().as_u16()));
        }

        read_limited_text(response, MAX_CONTENT_SIZE).await
    }
}

/// Drop the `Title:` / `URL Source:` header the proxy prepends.
fn strip_preamble(content: &str) -> &str {
    match content.find(MARKDOWN_MARKER) {
        Some(idx) => &content[idx + MARKDOWN_MARKER.len()..],
        None => content,
    }
}

/// Markdown to HTML. Raw HTML in the markdown is escaped, not passed through.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

async fn read_limited_text(
    response: reqwest::Response,
    limit: usize,
) -> Result<String, ContentError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ContentError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ContentError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ContentError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    String::from_utf8(bytes).map_err(|_| ContentError::InvalidUtf8)
}
