//! Blocking HTTP client for stats.nba.com
//!
//! Supports an on-disk response cache for offline runs and reduced load.

use super::{is_retryable, with_retry, StatsResponse, StatsSource};
use crate::{ApiConfig, HoopsError, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ORIGIN, REFERER, USER_AGENT};
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Client for the stats API
pub struct StatsClient {
    client: reqwest::blocking::Client,
    base_url: String,
    max_retries: u32,
    backoff: Duration,
    request_delay: Duration,
    last_request: Cell<Option<Instant>>,
    /// Optional cache directory for raw responses
    cache_dir: Option<PathBuf>,
    /// If true, only use cache (no network requests)
    offline_only: bool,
}

impl StatsClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(REFERER, HeaderValue::from_static("https://www.nba.com/"));
        headers.insert(ORIGIN, HeaderValue::from_static("https://www.nba.com"));
        headers.insert("x-nba-stats-origin", HeaderValue::from_static("stats"));
        headers.insert("x-nba-stats-token", HeaderValue::from_static("true"));

        let client = reqwest::blocking::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let mut stats_client = StatsClient {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            backoff: Duration::from_secs_f64(config.backoff_secs.max(0.0)),
            request_delay: Duration::from_millis(config.request_delay_ms),
            last_request: Cell::new(None),
            cache_dir: None,
            offline_only: false,
        };
        if let Some(dir) = &config.cache_dir {
            stats_client = stats_client.with_cache(dir);
        }
        Ok(stats_client)
    }

    /// Create client with a cache directory
    pub fn with_cache<P: AsRef<Path>>(mut self, cache_dir: P) -> Self {
        self.cache_dir = Some(cache_dir.as_ref().to_path_buf());
        self
    }

    /// Set offline-only mode (no network requests, cache must exist)
    pub fn offline_only(mut self, offline: bool) -> Self {
        self.offline_only = offline;
        self
    }

    /// Cache file for an endpoint and its parameters
    fn cache_path(&self, endpoint: &str, params: &[(&str, String)]) -> Option<PathBuf> {
        self.cache_dir.as_ref().map(|dir| {
            let mut filename = endpoint.to_string();
            for (key, value) in params {
                filename.push('_');
                filename.push_str(key);
                filename.push('-');
                filename.extend(value.chars().map(|c| {
                    if c.is_ascii_alphanumeric() || c == '-' {
                        c
                    } else {
                        '_'
                    }
                }));
            }
            dir.join(filename + ".json")
        })
    }

    fn load_from_cache(&self, endpoint: &str, params: &[(&str, String)]) -> Option<String> {
        let path = self.cache_path(endpoint, params)?;
        if path.exists() {
            log::debug!("Loading from cache: {}", path.display());
            std::fs::read_to_string(&path).ok()
        } else {
            None
        }
    }

    fn save_to_cache(&self, endpoint: &str, params: &[(&str, String)], body: &str) -> Result<()> {
        if let Some(path) = self.cache_path(endpoint, params) {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, body)?;
            log::debug!("Saved to cache: {}", path.display());
        }
        Ok(())
    }

    /// Keep consecutive requests at least `request_delay` apart
    fn throttle(&self) {
        if let Some(last) = self.last_request.get() {
            let elapsed = last.elapsed();
            if elapsed < self.request_delay {
                std::thread::sleep(self.request_delay - elapsed);
            }
        }
        self.last_request.set(Some(Instant::now()));
    }

    fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<String> {
        self.throttle();
        let url = format!("{}/{}", self.base_url, endpoint);
        log::debug!("GET {} {:?}", url, params);

        let response = self.client.get(&url).query(params).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(HoopsError::Api {
                endpoint: endpoint.to_string(),
                status: Some(status.as_u16()),
                message: format!("HTTP {}", status),
            });
        }
        Ok(response.text()?)
    }
}

impl StatsSource for StatsClient {
    fn fetch(&self, endpoint: &str, params: &[(&str, String)]) -> Result<StatsResponse> {
        if let Some(body) = self.load_from_cache(endpoint, params) {
            return StatsResponse::parse(endpoint, &body);
        }

        if self.offline_only {
            return Err(HoopsError::Api {
                endpoint: endpoint.to_string(),
                status: None,
                message: "no cached response (offline mode)".to_string(),
            });
        }

        let body = with_retry(
            || self.get(endpoint, params),
            self.max_retries,
            self.backoff,
            is_retryable,
        )?;
        let response = StatsResponse::parse(endpoint, &body)?;

        if let Err(e) = self.save_to_cache(endpoint, params, &body) {
            log::warn!("Failed to cache {}: {}", endpoint, e);
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_client(dir: &Path) -> StatsClient {
        StatsClient::new(&ApiConfig::default())
            .unwrap()
            .with_cache(dir)
            .offline_only(true)
    }

    #[test]
    fn test_cache_path_is_filesystem_safe() {
        let client = offline_client(Path::new("cache"));
        let path = client
            .cache_path("scoreboardv2", &[("GameDate", "2024-10-22".to_string())])
            .unwrap();
        assert_eq!(path, Path::new("cache/scoreboardv2_GameDate-2024-10-22.json"));

        let path = client
            .cache_path("leaguegamefinder", &[("SeasonNullable", "2024-25".to_string())])
            .unwrap();
        assert!(path.ends_with("leaguegamefinder_SeasonNullable-2024-25.json"));
    }

    #[test]
    fn test_offline_reads_cache() {
        let dir = std::env::temp_dir().join(format!("hoops-cache-{}", std::process::id()));
        let client = offline_client(&dir);
        let params = [("GameID", "0022400061".to_string())];

        assert!(client.fetch("boxscoretraditionalv2", &params).is_err());

        let body = r#"{"resultSets": [{"name": "PlayerStats", "headers": ["PLAYER_ID"], "rowSet": [[1]]}]}"#;
        client
            .save_to_cache("boxscoretraditionalv2", &params, body)
            .unwrap();
        let response = client.fetch("boxscoretraditionalv2", &params).unwrap();
        assert_eq!(response.set("PlayerStats").unwrap().len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
