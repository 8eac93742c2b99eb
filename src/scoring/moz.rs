// HTTP client for the Moz Links API (v2 `url_metrics`).
//
// One POST per domain with HTTP Basic credentials. Moz reports unknown
// spam scores as -1; those become missing rather than a spotless 0.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::metrics::{DomainMetrics, DomainMetricsProvider};

/// Public Moz Links API endpoint.
pub const DEFAULT_MOZ_API_URL: &str = "https://lsapi.seomoz.com/v2/url_metrics";

/// One entry of the `results` array.
#[derive(Debug, Clone, Deserialize)]
pub struct MozUrlMetrics {
    pub domain_authority: Option<f64>,
    pub page_authority: Option<f64>,
    pub spam_score: Option<f64>,
    pub root_domains_to_root_domain: Option<u64>,
    pub external_pages_to_root_domain: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MozResponse {
    #[serde(default)]
    pub results: Vec<MozUrlMetrics>,
}

impl From<MozUrlMetrics> for DomainMetrics {
    fn from(m: MozUrlMetrics) -> Self {
        DomainMetrics {
            domain_authority: m.domain_authority,
            page_authority: m.page_authority,
            spam_score: m.spam_score.filter(|&s| s >= 0.0),
            root_domains_linking: m.root_domains_to_root_domain,
            external_links: m.external_pages_to_root_domain,
            // Registration age comes from RDAP
            domain_age_years: None,
        }
    }
}

/// Client for the Moz Links API.
pub struct MozClient {
    client: reqwest::Client,
    api_url: String,
    authorization: String,
}

impl MozClient {
    pub fn new(api_url: &str, access_id: &str, secret_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("keystone/0.1 (topical-authority)")
            .build()
            .context("Failed to build HTTP client")?;

        let credentials = STANDARD.encode(format!("{access_id}:{secret_key}"));

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            authorization: format!("Basic {credentials}"),
        })
    }
}

#[async_trait]
impl DomainMetricsProvider for MozClient {
    async fn get_domain_metrics(&self, domain: &str) -> Result<Option<DomainMetrics>> {
        let response = self
            .client
            .post(&self.api_url)
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .json(&json!({ "targets": [domain] }))
            .send()
            .await
            .context("Moz API request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            anyhow::bail!("Moz API returned {}: {}", status, snippet);
        }

        let parsed = response
            .json::<MozResponse>()
            .await
            .context("Failed to parse Moz response")?;

        debug!(domain, results = parsed.results.len(), "Moz url_metrics response");

        Ok(parsed.results.into_iter().next().map(DomainMetrics::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_moz_response() {
        let body = r#"{
            "results": [{
                "page": "example.com/",
                "domain_authority": 93,
                "page_authority": 88,
                "spam_score": 1,
                "root_domains_to_root_domain": 5287,
                "external_pages_to_root_domain": 120034
            }]
        }"#;
        let parsed: MozResponse = serde_json::from_str(body).unwrap();
        let metrics = DomainMetrics::from(parsed.results.into_iter().next().unwrap());
        assert_eq!(metrics.domain_authority, Some(93.0));
        assert_eq!(metrics.spam_score, Some(1.0));
        assert_eq!(metrics.root_domains_linking, Some(5287));
        assert_eq!(metrics.external_links, Some(120034));
        assert_eq!(metrics.domain_age_years, None);
    }

    #[test]
    fn test_unknown_spam_score_is_missing() {
        let parsed: MozResponse =
            serde_json::from_str(r#"{"results": [{"domain_authority": 12, "spam_score": -1}]}"#).unwrap();
        let metrics = DomainMetrics::from(parsed.results.into_iter().next().unwrap());
        assert_eq!(metrics.spam_score, None);
    }

    #[test]
    fn test_empty_results() {
        let parsed: MozResponse = serde_json::from_str(r#"{"results": []}"#).unwrap();
        assert!(parsed.results.is_empty());
    }

    #[test]
    fn test_authorization_header_is_basic() {
        let client = MozClient::new(DEFAULT_MOZ_API_URL, "id", "secret").unwrap();
        // base64("id:secret")
        assert_eq!(client.authorization, "Basic aWQ6c2VjcmV0");
    }
}
