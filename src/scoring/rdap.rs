// RDAP lookup for domain registration age.
//
// rdap.org redirects to the authoritative registry's RDAP server. The
// "registration" event of the domain object dates the domain; nothing else
// in the response is used. Unknown domains (404) are "no data", not errors.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use super::domain::DomainStructure;
use super::metrics::{DomainMetrics, DomainMetricsProvider};

/// Public RDAP bootstrap redirector.
pub const DEFAULT_RDAP_URL: &str = "https://rdap.org";

const DAYS_PER_YEAR: f64 = 365.25;

#[derive(Debug, Clone, Deserialize)]
pub struct RdapResponse {
    #[serde(default)]
    pub events: Vec<RdapEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RdapEvent {
    #[serde(rename = "eventAction")]
    pub event_action: String,
    #[serde(rename = "eventDate")]
    pub event_date: String,
}

impl RdapResponse {
    /// Date of the first parseable "registration" event.
    pub fn registration_date(&self) -> Option<DateTime<Utc>> {
        self.events
            .iter()
            .filter(|e| e.event_action.eq_ignore_ascii_case("registration"))
            .find_map(|e| DateTime::parse_from_rfc3339(&e.event_date).ok())
            .map(|d| d.with_timezone(&Utc))
    }
}

/// Fractional years between `registered` and `now`, counted in whole days.
/// Never negative.
pub fn age_in_years(registered: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let days = (now - registered).num_days().max(0);
    days as f64 / DAYS_PER_YEAR
}

/// Domain age provider backed by RDAP. Fills only `domain_age_years`.
pub struct RdapClient {
    client: reqwest::Client,
    base_url: String,
}

impl RdapClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("keystone/0.1 (topical-authority)")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl DomainMetricsProvider for RdapClient {
    async fn get_domain_metrics(&self, domain: &str) -> Result<Option<DomainMetrics>> {
        // Registries only know registrable names, not subdomains
        let registrable = DomainStructure::parse(domain).registrable_domain();
        let url = format!("{}/domain/{}", self.base_url, registrable);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/rdap+json")
            .send()
            .await
            .context("RDAP request failed")?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(domain = %registrable, "RDAP has no record for domain");
            return Ok(None);
        }
        if !response.status().is_success() {
            anyhow::bail!("RDAP returned {} for {}", response.status(), registrable);
        }

        let parsed = response
            .json::<RdapResponse>()
            .await
            .context("Failed to parse RDAP response")?;

        let Some(registered) = parsed.registration_date() else {
            debug!(domain = %registrable, events = parsed.events.len(), "RDAP response has no registration date");
            return Ok(None);
        };
        let age = age_in_years(registered, Utc::now());
        debug!(domain = %registrable, registered = %registered, age_years = age, "RDAP registration date");

        Ok(Some(DomainMetrics {
            domain_age_years: Some(age),
            ..DomainMetrics::default()
        }))
    }
}
