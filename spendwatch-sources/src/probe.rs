//! Reachability probes
//!
//! A probe is a cheap "is this feed up" check. Timeouts are applied by the
//! caller so every probe in a round shares one budget.

use async_trait::async_trait;
use spendwatch_core::{ConfigError, SourceError, SourceKind};

#[async_trait]
pub trait SourceProbe: Send + Sync {
    fn source(&self) -> SourceKind;

    /// `Ok(())` when the feed answered with a non-server-error status.
    async fn probe(&self) -> Result<(), SourceError>;
}

/// `HEAD` request against a feed's base URL.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    source: SourceKind,
    url: String,
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(source: SourceKind, url: impl Into<String>) -> Self {
        Self {
            source,
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SourceProbe for HttpProbe {
    fn source(&self) -> SourceKind {
        self.source
    }

    async fn probe(&self) -> Result<(), SourceError> {
        let response =
            self.client
                .head(&self.url)
                .send()
                .await
                .map_err(|e| SourceError::Transport {
                    feed: self.source,
                    reason: e.to_string(),
                })?;

        // Some feeds reject HEAD with 405; that still proves reachability.
        let status = response.status();
        if status.is_server_error() {
            return Err(SourceError::Transport {
                feed: self.source,
                reason: format!("unexpected status {}", status),
            });
        }
        Ok(())
    }
}

/// Whether a not-yet-published dataset (a future election cycle, a new
/// fiscal year) has become available upstream.
#[async_trait]
pub trait DatasetAvailability: Send + Sync {
    async fn is_available(&self) -> Result<bool, SourceError>;
}

/// Checks a dataset URL: success means published, 404 means not yet.
#[derive(Debug, Clone)]
pub struct HttpDatasetAvailability {
    feed: SourceKind,
    url: String,
    client: reqwest::Client,
}

impl HttpDatasetAvailability {
    pub fn new(feed: SourceKind, url: impl Into<String>) -> Self {
        Self {
            feed,
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl DatasetAvailability for HttpDatasetAvailability {
    async fn is_available(&self) -> Result<bool, SourceError> {
        let response =
            self.client
                .head(&self.url)
                .send()
                .await
                .map_err(|e| SourceError::Transport {
                    feed: self.feed,
                    reason: e.to_string(),
                })?;

        let status = response.status();
        if status.is_success() {
            Ok(true)
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Ok(false)
        } else {
            Err(SourceError::Transport {
                feed: self.feed,
                reason: format!("unexpected status {}", status),
            })
        }
    }
}

/// Parse `source=url` pairs separated by commas into HTTP probes.
///
/// # Errors
///
/// Returns `InvalidValue` for a pair without `=`, an unknown source name, or
/// an empty URL.
pub fn parse_probe_urls(raw: &str) -> Result<Vec<HttpProbe>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, url) = pair.split_once('=').ok_or_else(|| ConfigError::InvalidValue {
                field: "probe_urls".to_string(),
                value: pair.to_string(),
                reason: "expected source=url".to_string(),
            })?;

            let source: SourceKind =
                name.trim()
                    .parse()
                    .map_err(|reason: String| ConfigError::InvalidValue {
                        field: "probe_urls".to_string(),
                        value: name.to_string(),
                        reason,
                    })?;

            let url = url.trim();
            if url.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "probe_urls".to_string(),
                    value: pair.to_string(),
                    reason: "empty url".to_string(),
                });
            }
            Ok(HttpProbe::new(source, url))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_urls() {
        let probes = parse_probe_urls(
            "chamber=https://dadosabertos.camara.leg.br/api/v2, senate = https://legis.senado.leg.br/dadosabertos",
        )
        .unwrap();
        assert_eq!(probes.len(), 2);
        assert_eq!(probes[0].source(), SourceKind::Chamber);
        assert_eq!(probes[1].source(), SourceKind::Senate);
        assert_eq!(probes[1].url(), "https://legis.senado.leg.br/dadosabertos");
    }

    #[test]
    fn test_parse_probe_urls_rejects_bad_pairs() {
        assert!(parse_probe_urls("chamber").is_err());
        assert!(parse_probe_urls("nowhere=https://x").is_err());
        assert!(parse_probe_urls("chamber=").is_err());
        assert!(parse_probe_urls("").unwrap().is_empty());
    }
}
