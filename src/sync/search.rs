use crate::error::WarnCode;
use crate::sync::config::SearchConfig;
use crate::sync::warn;
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde_json::Value;
use std::thread;
use std::time::Duration;

/// Stored in place of a link when a lookup yields nothing usable.
pub const NOT_FOUND: &str = "N";

const STAGE: &str = "search";

/// A web search that returns the first result link.
pub trait LinkSearch {
    /// `Ok(None)` means the search ran and found nothing.
    fn first_link(&self, query: &str) -> Result<Option<String>>;

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Blocking delay between external calls.
pub trait Pause {
    fn pause(&mut self, duration: Duration);
}

pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&mut self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

/// Resolves a query to a link or [`NOT_FOUND`]; never fails.
pub trait Lookup {
    fn lookup(&mut self, query: &str) -> String;
}

pub struct GoogleSearch {
    client: Client,
    endpoint: String,
    api_key: String,
    engine_id: String,
    country: String,
    language: String,
}

impl GoogleSearch {
    pub fn new(cfg: &SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("failed to build search http client")?;
        Ok(Self {
            client,
            endpoint: cfg.endpoint.trim().to_string(),
            api_key: cfg.api_key.trim().to_string(),
            engine_id: cfg.search_engine_id.trim().to_string(),
            country: cfg.country.clone(),
            language: cfg.language.clone(),
        })
    }
}

impl LinkSearch for GoogleSearch {
    fn first_link(&self, query: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("gl", self.country.as_str()),
                ("hl", self.language.as_str()),
            ])
            .send()
            .context("search request failed")?;
        if !response.status().is_success() {
            anyhow::bail!("search returned status {}", response.status());
        }
        let json: Value = response.json().context("search response is not json")?;
        extract_first_link(&json)
    }

    fn is_enabled(&self) -> bool {
        !self.api_key.is_empty() && !self.engine_id.is_empty()
    }
}

/// Stand-in used when no search credentials are configured.
pub struct DisabledSearch;

impl LinkSearch for DisabledSearch {
    fn first_link(&self, _query: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

pub fn extract_first_link(json: &Value) -> Result<Option<String>> {
    let Some(first) = json
        .get("items")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
    else {
        return Ok(None);
    };
    let link = first
        .get("link")
        .and_then(Value::as_str)
        .context("search result is missing `link`")?;
    Ok(Some(link.to_string()))
}

/// Sequential search client that waits `delay` after every call.
pub struct RateLimitedClient<S, P = ThreadPause> {
    search: S,
    pause: P,
    delay: Duration,
    retries: u32,
    backoff: Duration,
    pub calls: usize,
    pub failures: usize,
    pub skipped: usize,
}

impl<S: LinkSearch> RateLimitedClient<S, ThreadPause> {
    pub fn from_config(search: S, cfg: &SearchConfig) -> Self {
        Self::new(
            search,
            ThreadPause,
            Duration::from_millis(cfg.rate_limit_delay_ms),
            cfg.retries,
            Duration::from_millis(cfg.retry_backoff_ms),
        )
    }
}

impl<S: LinkSearch, P: Pause> RateLimitedClient<S, P> {
    pub fn new(search: S, pause: P, delay: Duration, retries: u32, backoff: Duration) -> Self {
        Self {
            search,
            pause,
            delay,
            retries,
            backoff,
            calls: 0,
            failures: 0,
            skipped: 0,
        }
    }
}

impl<S: LinkSearch, P: Pause> Lookup for RateLimitedClient<S, P> {
    fn lookup(&mut self, query: &str) -> String {
        if !self.search.is_enabled() {
            if self.skipped == 0 {
                warn::emit(
                    WarnCode::W005SearchDisabled,
                    STAGE,
                    query,
                    "search credentials not configured; links stored as not found",
                    "",
                );
            }
            self.skipped += 1;
            return NOT_FOUND.to_string();
        }

        let mut attempt = 0u32;
        loop {
            self.calls += 1;
            let outcome = self.search.first_link(query);
            self.pause.pause(self.delay);
            match outcome {
                Ok(Some(link)) => return link,
                Ok(None) => return NOT_FOUND.to_string(),
                Err(_) if attempt < self.retries => {
                    attempt += 1;
                    self.pause.pause(self.backoff * attempt);
                }
                Err(err) => {
                    self.failures += 1;
                    warn::emit(
                        WarnCode::W004SearchFailed,
                        STAGE,
                        query,
                        "lookup failed; storing not found",
                        &format!("{err:#}"),
                    );
                    return NOT_FOUND.to_string();
                }
            }
        }
    }
}
