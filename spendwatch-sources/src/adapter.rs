//! Source adapter contract
//!
//! An adapter integrates one upstream feed. It declares the field groups it
//! owns and turns a fetch for one identity into normalized records. "No data"
//! is `Ok(vec![])`, never an error.

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use spendwatch_core::{
    new_refresh_id, FieldGroup, NormalizedRecord, ParseError, RefreshId, SourceError, SourceKind,
    TrackedIdentity,
};
use std::time::Duration;

/// Per-round fetch parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchParams {
    /// Reference year for year-scoped feeds; `None` means the current year.
    pub year: Option<i32>,
    /// Refresh round this fetch belongs to, for log correlation.
    pub refresh_id: RefreshId,
}

impl FetchParams {
    pub fn new(refresh_id: RefreshId) -> Self {
        Self {
            year: None,
            refresh_id,
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    /// The reference year, defaulting to the current one.
    pub fn effective_year(&self) -> i32 {
        self.year.unwrap_or_else(|| Utc::now().year())
    }
}

impl Default for FetchParams {
    fn default() -> Self {
        Self::new(new_refresh_id())
    }
}

/// One upstream data feed.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// The feed this adapter talks to.
    fn source(&self) -> SourceKind;

    /// Field groups this adapter is authoritative for.
    fn owned_fields(&self) -> &[FieldGroup];

    /// Fetch and normalize everything this feed knows about `identity`.
    async fn fetch(
        &self,
        identity: &TrackedIdentity,
        params: &FetchParams,
    ) -> Result<Vec<NormalizedRecord>, SourceError>;
}

/// Parse function turning a feed's JSON payload into records.
pub type PayloadParser =
    fn(&serde_json::Value, &TrackedIdentity) -> Result<Vec<NormalizedRecord>, ParseError>;

/// Adapter for feeds that answer a single JSON GET per identity.
///
/// The URL template may contain `{id}`, `{year}` and `{region}`. A 404 is
/// treated as "no data".
pub struct HttpJsonAdapter {
    source: SourceKind,
    owned: Vec<FieldGroup>,
    client: reqwest::Client,
    url_template: String,
    parser: PayloadParser,
    timeout: Duration,
}

impl HttpJsonAdapter {
    pub fn new(
        source: SourceKind,
        owned: Vec<FieldGroup>,
        url_template: impl Into<String>,
        parser: PayloadParser,
    ) -> Self {
        Self {
            source,
            owned,
            client: reqwest::Client::new(),
            url_template: url_template.into(),
            parser,
            timeout: Duration::from_secs(30),
        }
    }

    /// Share a pooled client between adapters.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn render_url(&self, identity: &TrackedIdentity, params: &FetchParams) -> String {
        self.url_template
            .replace("{id}", &identity.id)
            .replace("{year}", &params.effective_year().to_string())
            .replace("{region}", &identity.region)
    }

    fn request_error(&self, e: reqwest::Error) -> SourceError {
        if e.is_timeout() {
            SourceError::Timeout {
                feed: self.source,
                after_ms: self.timeout.as_millis() as u64,
            }
        } else {
            SourceError::Transport {
                feed: self.source,
                reason: e.to_string(),
            }
        }
    }
}

impl std::fmt::Debug for HttpJsonAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpJsonAdapter")
            .field("source", &self.source)
            .field("owned", &self.owned)
            .field("url_template", &self.url_template)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl SourceAdapter for HttpJsonAdapter {
    fn source(&self) -> SourceKind {
        self.source
    }

    fn owned_fields(&self) -> &[FieldGroup] {
        &self.owned
    }

    async fn fetch(
        &self,
        identity: &TrackedIdentity,
        params: &FetchParams,
    ) -> Result<Vec<NormalizedRecord>, SourceError> {
        let url = self.render_url(identity, params);
        tracing::debug!(source = %self.source, url = %url, refresh_id = %params.refresh_id, "fetching");

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(SourceError::Transport {
                feed: self.source,
                reason: format!("unexpected status {}", status),
            });
        }

        let payload: serde_json::Value = response.json().await.map_err(|e| {
            if e.is_decode() {
                SourceError::Parse(ParseError::UnexpectedShape {
                    expected: "JSON document".to_string(),
                    found: e.to_string(),
                })
            } else {
                self.request_error(e)
            }
        })?;

        Ok((self.parser)(&payload, identity)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spendwatch_core::JurisdictionTier;

    fn no_records(
        _payload: &serde_json::Value,
        _identity: &TrackedIdentity,
    ) -> Result<Vec<NormalizedRecord>, ParseError> {
        Ok(Vec::new())
    }

    #[test]
    fn test_render_url_substitutes_placeholders() {
        let adapter = HttpJsonAdapter::new(
            SourceKind::Chamber,
            vec![FieldGroup::Spending],
            "https://example.test/deputados/{id}/despesas?ano={year}&uf={region}",
            no_records,
        );
        let identity = TrackedIdentity::new("204554", "Ana", JurisdictionTier::FederalDeputy)
            .with_region("PE");
        let params = FetchParams::default().with_year(2023);

        assert_eq!(
            adapter.render_url(&identity, &params),
            "https://example.test/deputados/204554/despesas?ano=2023&uf=PE"
        );
        assert_eq!(adapter.owned_fields(), &[FieldGroup::Spending]);
        assert_eq!(adapter.source(), SourceKind::Chamber);
    }

    #[test]
    fn test_effective_year_defaults_to_current() {
        assert_eq!(FetchParams::default().effective_year(), Utc::now().year());
        assert_eq!(FetchParams::default().with_year(2019).effective_year(), 2019);
    }
}
