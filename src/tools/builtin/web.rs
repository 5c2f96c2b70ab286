//! External web research: search API and page fetch.

use std::time::Duration;

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

use crate::error::CapabilityError;

/// Default search endpoint.
pub const DEFAULT_SEARCH_URL: &str = "https://api.tavily.com/search";

/// Longest page text returned by a fetch.
const MAX_FETCH_CHARS: usize = 8000;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

const USER_AGENT: &str = "Mozilla/5.0 (compatible; DataroomReview/0.1)";

/// Web search and fetch over HTTP.
pub struct WebResearch {
    http: reqwest::Client,
    search_url: String,
    api_key: Option<SecretString>,
}

impl WebResearch {
    pub fn new(api_key: Option<SecretString>) -> Self {
        Self {
            http: reqwest::Client::new(),
            search_url: DEFAULT_SEARCH_URL.to_string(),
            api_key,
        }
    }

    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }

    /// Search the web. Results carry title, URL, snippet and source domain.
    pub async fn search(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<serde_json::Value, CapabilityError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CapabilityError::InvalidParameters(
                "Please provide a search query".to_string(),
            ));
        }
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            CapabilityError::NotAuthorized("SEARCH_API_KEY is not configured".to_string())
        })?;

        let response = self
            .http
            .post(&self.search_url)
            .bearer_auth(api_key.expose_secret())
            .timeout(SEARCH_TIMEOUT)
            .json(&json!({
                "query": query,
                "max_results": max_results,
                "search_depth": "advanced",
            }))
            .send()
            .await
            .map_err(|e| self.http_error(&self.search_url, e))?;

        if !response.status().is_success() {
            return Err(CapabilityError::Http {
                url: self.search_url.clone(),
                reason: format!("status {}", response.status()),
            });
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| self.http_error(&self.search_url, e))?;

        let results: Vec<serde_json::Value> = payload
            .get("results")
            .and_then(|v| v.as_array())
            .map(|rows| rows.iter().map(normalize_search_row).collect())
            .unwrap_or_default();

        tracing::debug!(query, results = results.len(), "Web search complete");
        Ok(json!({ "query": query, "results": results }))
    }

    /// Fetch a page and return its visible text, truncated.
    pub async fn fetch(&self, url: &str) -> Result<serde_json::Value, CapabilityError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(CapabilityError::InvalidParameters(
                "Please provide a URL to fetch".to_string(),
            ));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(CapabilityError::InvalidParameters(format!(
                "URL must start with http:// or https://: {}",
                url
            )));
        }

        let response = self
            .http
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| self.http_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CapabilityError::Http {
                url: url.to_string(),
                reason: format!("status {}", status),
            });
        }

        let body = response.text().await.map_err(|e| self.http_error(url, e))?;
        let (text, truncated) = extract_text(&body, MAX_FETCH_CHARS);

        Ok(json!({
            "url": url,
            "content": text,
            "truncated": truncated,
        }))
    }

    fn http_error(&self, url: &str, e: reqwest::Error) -> CapabilityError {
        let reason = if e.is_timeout() {
            "request timed out".to_string()
        } else {
            e.to_string()
        };
        CapabilityError::Http {
            url: url.to_string(),
            reason,
        }
    }
}

fn normalize_search_row(row: &serde_json::Value) -> serde_json::Value {
    let field = |key: &str| row.get(key).and_then(|v| v.as_str());
    json!({
        "title": field("title").unwrap_or("Untitled"),
        "url": field("url").unwrap_or("N/A"),
        "snippet": field("snippet").or_else(|| field("content")).unwrap_or("No snippet available"),
        "source": field("domain").unwrap_or("Unknown"),
    })
}

/// Strip scripts, styles and tags, collapse whitespace, and cut at
/// `max_chars` with a visible marker.
pub fn extract_text(html: &str, max_chars: usize) -> (String, bool) {
    let script_re = Regex::new(r"(?is)<script[^>]*>.*?</script>").ok();
    let style_re = Regex::new(r"(?is)<style[^>]*>.*?</style>").ok();
    let tag_re = Regex::new(r"(?s)<[^>]+>").ok();

    let mut text = html.to_string();
    for re in [script_re, style_re, tag_re].iter().flatten() {
        text = re.replace_all(&text, " ").into_owned();
    }

    let lines: Vec<String> = text
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect();
    let text = lines.join("\n");

    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (
            format!(
                "{}\n\n[Content truncated at {} characters]",
                &text[..idx],
                max_chars
            ),
            true,
        ),
        None => (text, false),
    }
}
