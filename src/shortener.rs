//! Client for the clck.ru link shortener.
use std::time::Duration;

use log::{debug, warn};
use reqwest::Client;

use crate::{Config, Result, UtmError};

#[derive(Debug, Clone)]
pub struct ClckShortener {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl ClckShortener {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        Ok(ClckShortener {
            client: Client::builder().build()?,
            endpoint: endpoint.to_string(),
            timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        ClckShortener::new(&config.shortener_url, config.request_timeout())
    }

    /// Returns the short form of `url`.
    ///
    /// The service answers in plain text; an empty body or one mentioning
    /// `error` counts as a failure.
    pub async fn shorten(&self, url: &str) -> Result<String> {
        let url = url.trim();
        if url.is_empty() {
            return Err(UtmError::validation("Generate a link first"));
        }

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("url", url)])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UtmError::Timeout {
                        endpoint: self.endpoint.clone(),
                        seconds: self.timeout.as_secs(),
                    }
                } else {
                    UtmError::Http(e)
                }
            })?;

        let status = response.status();
        let body = response.text().await?;
        let short = body.trim();
        if !status.is_success() || short.is_empty() || short.contains("error") {
            warn!("Shortener refused {} ({}): {}", url, status, short);
            return Err(UtmError::ShortenFailed {
                message: if short.is_empty() {
                    format!("empty response ({})", status)
                } else {
                    short.to_string()
                },
            });
        }

        debug!("Shortened {} -> {}", url, short);
        Ok(short.to_string())
    }
}
