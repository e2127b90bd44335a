//! Collaborators that talk to the outside world.
//!
//! The engine only sees the traits; [`HttpSource`] and [`IpApiGeo`] are the
//! production implementations.

use std::time::Duration;

use serde_json::Value;

use crate::error::IkamonError;
use crate::model::{NameRecord, RawSnapshot};

/// Default per-request timeout for monitor and geo requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Public geolocation endpoint, queried as `{base}/{ip}`.
pub const IP_API_BASE: &str = "http://ip-api.com/json";

/// Fetches the cumulative traffic snapshot of a monitor.
pub trait SnapshotProvider: Send + Sync {
    fn fetch_snapshot(&self, target: &str) -> Result<RawSnapshot, IkamonError>;
}

/// Fetches the address -> alias records of a monitor.
pub trait NameProvider: Send + Sync {
    fn fetch_names(&self, target: &str) -> Result<Vec<NameRecord>, IkamonError>;
}

/// Resolves an IP address to an ISO country code.
pub trait GeoProvider: Send + Sync {
    fn country_code(&self, ip: &str) -> Result<String, IkamonError>;
}

/// URL of the snapshot endpoint for `target`.
pub fn snapshot_url(target: &str) -> String {
    format!("http://{target}")
}

/// URL of the name endpoint for `target`.
///
/// A target given with a trailing slash would produce `//dns`; the first
/// doubled slash is collapsed.
pub fn names_url(target: &str) -> String {
    format!("http://{}", format!("{target}/dns").replacen("//", "/", 1))
}

/// Check a user-supplied `host:port` target and return it trimmed.
pub fn validate_target(target: &str) -> Result<String, IkamonError> {
    let trimmed = target.trim();
    let invalid = |detail: &str| IkamonError::InvalidTarget {
        target: target.to_string(),
        detail: detail.to_string(),
    };
    if trimmed.is_empty() {
        return Err(invalid("target is empty"));
    }
    if trimmed.contains("://") {
        return Err(invalid("give host:port without a scheme"));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(invalid("target contains whitespace"));
    }
    Ok(trimmed.to_string())
}

/// Monitor client over blocking HTTP.
#[derive(Clone)]
pub struct HttpSource {
    client: reqwest::blocking::Client,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self, IkamonError> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, IkamonError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| IkamonError::Unreachable(format!("{url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(IkamonError::Unreachable(format!("{url}: HTTP {status}")));
        }
        Ok(response)
    }
}

impl SnapshotProvider for HttpSource {
    fn fetch_snapshot(&self, target: &str) -> Result<RawSnapshot, IkamonError> {
        let url = snapshot_url(target);
        self.get(&url)?
            .json::<RawSnapshot>()
            .map_err(|e| IkamonError::Decode(format!("{url}: {e}")))
    }
}

impl NameProvider for HttpSource {
    fn fetch_names(&self, target: &str) -> Result<Vec<NameRecord>, IkamonError> {
        let url = names_url(target);
        self.get(&url)?
            .json::<Vec<NameRecord>>()
            .map_err(|e| IkamonError::Decode(format!("{url}: {e}")))
    }
}

/// Country lookups against ip-api.com (or a compatible endpoint).
pub struct IpApiGeo {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl IpApiGeo {
    pub fn new(timeout: Duration) -> Result<Self, IkamonError> {
        Self::with_base_url(IP_API_BASE, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, IkamonError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl GeoProvider for IpApiGeo {
    fn country_code(&self, ip: &str) -> Result<String, IkamonError> {
        let url = format!("{}/{ip}", self.base_url);
        let body: Value = self
            .client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| IkamonError::Http(e.to_string()))?
            .json()
            .map_err(|e| IkamonError::Decode(e.to_string()))?;
        country_from_body(&body).ok_or_else(|| IkamonError::Lookup(format!("no country code for {ip}")))
    }
}

fn country_from_body(body: &Value) -> Option<String> {
    body.get("countryCode")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

fn build_client(timeout: Duration) -> Result<reqwest::blocking::Client, IkamonError> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(concat!("ikamon/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| IkamonError::Http(format!("build client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_url_prefixes_scheme() {
        assert_eq!(snapshot_url("localhost:18080"), "http://localhost:18080");
    }

    #[test]
    fn names_url_appends_dns() {
        assert_eq!(names_url("localhost:18080"), "http://localhost:18080/dns");
    }

    #[test]
    fn names_url_collapses_first_double_slash() {
        assert_eq!(names_url("localhost:18080/"), "http://localhost:18080/dns");
        assert_eq!(names_url("host/a//"), "http://host/a//dns");
    }

    #[test]
    fn validate_accepts_host_port() {
        assert_eq!(validate_target("  10.0.0.1:9000 ").unwrap(), "10.0.0.1:9000");
        assert_eq!(validate_target("monitor.lan").unwrap(), "monitor.lan");
    }

    #[test]
    fn validate_rejects_bad_targets() {
        assert!(matches!(validate_target(""), Err(IkamonError::InvalidTarget { .. })));
        assert!(validate_target("   ").is_err());
        assert!(validate_target("http://host:1").is_err());
        assert!(validate_target("host :1").is_err());
    }

    #[test]
    fn country_code_extracted() {
        let body: Value = serde_json::json!({"status": "success", "countryCode": "NL"});
        assert_eq!(country_from_body(&body), Some("NL".to_string()));
    }

    #[test]
    fn failed_lookup_has_no_code() {
        let body: Value = serde_json::json!({"status": "fail", "message": "private range"});
        assert_eq!(country_from_body(&body), None);
        let body: Value = serde_json::json!({"countryCode": ""});
        assert_eq!(country_from_body(&body), None);
    }
}
