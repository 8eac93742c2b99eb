// Domain structure: the subdomain / registrable name / public suffix split
// of the analyzed host, plus a coarse category for its TLD.
//
// The suffix list covers only the two-label registry suffixes
// that show up in practice. Anything else is treated as a single-label
// suffix, which is right for every gTLD and most ccTLDs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Two-label public suffixes recognized when splitting a host.
const MULTI_LABEL_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "gov.uk", "me.uk", "com.au", "net.au", "org.au", "co.jp", "co.nz", "com.br",
    "co.in", "com.cn", "co.za",
];

const GENERIC_TLDS: &[&str] = &["com", "net", "org", "info", "biz"];
const COUNTRY_CODE_TLDS: &[&str] = &["uk", "de", "fr", "jp", "cn", "in", "br", "au"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TldCategory {
    Generic,
    CountryCode,
    Other,
}

impl TldCategory {
    /// Category of a public suffix, decided by its last label, so `co.uk`
    /// counts as a country code.
    pub fn of_suffix(suffix: &str) -> Self {
        let tld = suffix.rsplit('.').next().unwrap_or(suffix);
        if GENERIC_TLDS.contains(&tld) {
            TldCategory::Generic
        } else if COUNTRY_CODE_TLDS.contains(&tld) {
            TldCategory::CountryCode
        } else {
            TldCategory::Other
        }
    }
}

impl fmt::Display for TldCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TldCategory::Generic => "generic",
            TldCategory::CountryCode => "country_code",
            TldCategory::Other => "other",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainStructure {
    /// Labels left of the registrable name; empty for an apex host
    pub subdomain: String,
    pub domain: String,
    pub suffix: String,
    pub is_subdomain: bool,
    pub tld_category: TldCategory,
}

impl DomainStructure {
    /// Split a normalized host (see `normalize_domain`).
    ///
    /// A single-label host has no suffix and no subdomain.
    pub fn parse(host: &str) -> Self {
        let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();

        let suffix_len = match labels.len() {
            0 | 1 => 0,
            n if n >= 3 && MULTI_LABEL_SUFFIXES.contains(&labels[n - 2..].join(".").as_str()) => 2,
            _ => 1,
        };
        let split = labels.len() - suffix_len;

        let suffix = labels[split..].join(".");
        let domain = split.checked_sub(1).map(|i| labels[i]).unwrap_or("").to_string();
        let subdomain = labels[..split.saturating_sub(1)].join(".");

        Self {
            is_subdomain: !subdomain.is_empty(),
            tld_category: TldCategory::of_suffix(&suffix),
            subdomain,
            domain,
            suffix,
        }
    }

    /// `domain.suffix`, the name a registry knows about.
    pub fn registrable_domain(&self) -> String {
        if self.suffix.is_empty() {
            self.domain.clone()
        } else {
            format!("{}.{}", self.domain, self.suffix)
        }
    }
}
