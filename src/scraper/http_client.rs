use crate::config::ScraperConfig;
use anyhow::{Context, Result};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::error::FetchError;

/// Single-attempt HTTP client for the detail pages.
pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .gzip(true);

        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let inner = builder.build().context("Failed to build HTTP client")?;
        Ok(Self { inner })
    }

    /// Fetch a URL as text. No retries: any non-2xx status is an error.
    pub async fn get_text(&self, url: &Url) -> Result<String, FetchError> {
        debug!("GET {}", url);

        let resp = self
            .inner
            .get(url.clone())
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        check_status(url, resp.status())?;

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = resp.bytes().await.map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })?;

        Ok(decode_body(&body, content_type.as_deref()))
    }
}

// ── Charset ───────────────────────────────────────────────────────────────────

/// Decode a page body. The header charset wins, then a `<meta>` charset in the
/// first KiB, then UTF-8 if the bytes are valid UTF-8, else windows-1252.
pub fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(|ct| charset_param(ct.as_bytes()))
        .or_else(|| meta_charset(&body[..body.len().min(1024)]))
        .unwrap_or_else(|| {
            if std::str::from_utf8(body).is_ok() {
                UTF_8
            } else {
                WINDOWS_1252
            }
        });

    let (text, _, _) = encoding.decode(body);
    text.into_owned()
}

/// `charset=` value from a `Content-Type`-style string.
fn charset_param(s: &[u8]) -> Option<&'static Encoding> {
    let lower = s.to_ascii_lowercase();
    let at = find(&lower, b"charset=")? + b"charset=".len();
    let label: Vec<u8> = lower[at..]
        .iter()
        .copied()
        .skip_while(|b| *b == b'"' || *b == b'\'' || *b == b' ')
        .take_while(|b| !matches!(b, b'"' | b'\'' | b';' | b' ' | b'>' | b'/'))
        .collect();
    Encoding::for_label(&label)
}

/// Handles `<meta charset="...">` and the `http-equiv` Content-Type form.
fn meta_charset(head: &[u8]) -> Option<&'static Encoding> {
    let lower = head.to_ascii_lowercase();
    let mut rest = &lower[..];
    while let Some(start) = find(rest, b"<meta") {
        let tag = &rest[start..];
        let end = tag.iter().position(|b| *b == b'>').unwrap_or(tag.len());
        if let Some(enc) = charset_param(&tag[..end]) {
            return Some(enc);
        }
        rest = &tag[end..];
    }
    None
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// `{base}/detalhes.php?papel={ticker}`, with the ticker query-encoded.
pub fn detail_url(base_url: &str, ticker: &str) -> Result<Url, FetchError> {
    let endpoint = format!("{}/detalhes.php", base_url.trim_end_matches('/'));
    Url::parse_with_params(&endpoint, &[("papel", ticker)]).map_err(|source| FetchError::Url {
        ticker: ticker.to_string(),
        source,
    })
}

pub fn check_status(url: &Url, status: StatusCode) -> Result<(), FetchError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(FetchError::Status {
            url: url.to_string(),
            status,
        })
    }
}
