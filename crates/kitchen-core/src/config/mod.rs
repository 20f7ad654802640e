//! Client configuration for the hosted backend.
//!
//! The project URL and anon key are public values that ship with the client.
//! They come either from explicit values (a CLI profile) or from the
//! environment, using the same variable names the web build reads.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::{normalize_auth_url, normalize_project_url};
use crate::util::normalize_text_option;
use crate::{Error, Result};

pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "SUPABASE_ANON_KEY";
pub const ENV_WEB_SUPABASE_URL: &str = "VITE_SUPABASE_URL";
pub const ENV_WEB_SUPABASE_ANON_KEY: &str = "VITE_SUPABASE_ANON_KEY";
pub const ENV_STORAGE_BUCKET: &str = "KITCHEN_STORAGE_BUCKET";
pub const ENV_POLL_INTERVAL_SECS: &str = "KITCHEN_POLL_INTERVAL_SECS";

/// Bucket item images are uploaded to.
pub const DEFAULT_STORAGE_BUCKET: &str = "items";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Resolved connection settings for one Supabase project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Project base URL, without a trailing slash.
    pub supabase_url: String,
    /// Public anon key sent as `apikey` on every request.
    pub supabase_anon_key: String,
    /// Object storage bucket for item images.
    #[serde(default = "default_bucket")]
    pub storage_bucket: String,
    /// Seconds between change-feed polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_bucket() -> String {
    DEFAULT_STORAGE_BUCKET.to_string()
}

const fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

impl ClientConfig {
    /// Validate and normalize explicit values.
    pub fn new(supabase_url: impl AsRef<str>, supabase_anon_key: impl Into<String>) -> Result<Self> {
        let supabase_url = normalize_project_url(supabase_url.as_ref())?;
        let supabase_anon_key = normalize_text_option(Some(supabase_anon_key.into()))
            .ok_or_else(|| Error::Config("Supabase anon key must not be empty".to_string()))?;

        Ok(Self {
            supabase_url,
            supabase_anon_key,
            storage_bucket: default_bucket(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        })
    }

    #[must_use]
    pub fn with_storage_bucket(mut self, bucket: impl Into<String>) -> Self {
        if let Some(bucket) = normalize_text_option(Some(bucket.into())) {
            self.storage_bucket = bucket;
        }
        self
    }

    #[must_use]
    pub fn with_poll_interval_secs(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs.max(1);
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Returns `Ok(None)` when neither the URL nor the key is set.
    /// Returns an error when only one of them is provided.
    pub fn from_env() -> Result<Option<Self>> {
        parse_config(|key| env::var(key).ok())
    }

    #[must_use]
    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.supabase_url)
    }

    #[must_use]
    pub fn storage_url(&self) -> String {
        format!("{}/storage/v1", self.supabase_url)
    }

    pub fn auth_url(&self) -> Result<String> {
        Ok(normalize_auth_url(&self.supabase_url)?)
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<ClientConfig>> {
    let first_of = |keys: &[&str]| {
        keys.iter()
            .find_map(|&key| normalize_text_option(lookup(key)))
    };

    let url = first_of(&[ENV_SUPABASE_URL, ENV_WEB_SUPABASE_URL]);
    let anon_key = first_of(&[ENV_SUPABASE_ANON_KEY, ENV_WEB_SUPABASE_ANON_KEY]);

    let (url, anon_key) = match (url, anon_key) {
        (None, None) => return Ok(None),
        (Some(url), Some(anon_key)) => (url, anon_key),
        (Some(_), None) => {
            return Err(Error::Config(format!(
                "Supabase configuration is incomplete. Missing: {ENV_SUPABASE_ANON_KEY}"
            )))
        }
        (None, Some(_)) => {
            return Err(Error::Config(format!(
                "Supabase configuration is incomplete. Missing: {ENV_SUPABASE_URL}"
            )))
        }
    };

    let mut config = ClientConfig::new(url, anon_key)?;
    if let Some(bucket) = first_of(&[ENV_STORAGE_BUCKET]) {
        config = config.with_storage_bucket(bucket);
    }
    if let Some(raw) = first_of(&[ENV_POLL_INTERVAL_SECS]) {
        let secs = raw.parse::<u64>().map_err(|_| {
            Error::Config(format!(
                "{ENV_POLL_INTERVAL_SECS} must be a whole number of seconds, got '{raw}'"
            ))
        })?;
        config = config.with_poll_interval_secs(secs);
    }

    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn parse_from_map(map: &HashMap<&str, &str>) -> Result<Option<ClientConfig>> {
        parse_config(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn parse_config_none_returns_none() {
        assert!(parse_from_map(&HashMap::new()).unwrap().is_none());
    }

    #[test]
    fn parse_config_rejects_partial_values() {
        let map = HashMap::from([(ENV_SUPABASE_URL, "https://demo.supabase.co")]);
        match parse_from_map(&map).unwrap_err() {
            Error::Config(message) => assert!(message.contains(ENV_SUPABASE_ANON_KEY)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_config_accepts_web_build_names() {
        let map = HashMap::from([
            (ENV_WEB_SUPABASE_URL, "https://demo.supabase.co/"),
            (ENV_WEB_SUPABASE_ANON_KEY, " anon "),
        ]);
        let config = parse_from_map(&map).unwrap().unwrap();
        assert_eq!(
            config,
            ClientConfig {
                supabase_url: "https://demo.supabase.co".to_string(),
                supabase_anon_key: "anon".to_string(),
                storage_bucket: "items".to_string(),
                poll_interval_secs: 5,
            }
        );
    }

    #[test]
    fn parse_config_reads_optional_overrides() {
        let map = HashMap::from([
            (ENV_SUPABASE_URL, "https://demo.supabase.co"),
            (ENV_SUPABASE_ANON_KEY, "anon"),
            (ENV_STORAGE_BUCKET, "kitchen-images"),
            (ENV_POLL_INTERVAL_SECS, "0"),
        ]);
        let config = parse_from_map(&map).unwrap().unwrap();
        assert_eq!(config.storage_bucket, "kitchen-images");
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn parse_config_rejects_bad_poll_interval() {
        let map = HashMap::from([
            (ENV_SUPABASE_URL, "https://demo.supabase.co"),
            (ENV_SUPABASE_ANON_KEY, "anon"),
            (ENV_POLL_INTERVAL_SECS, "soon"),
        ]);
        assert!(matches!(parse_from_map(&map), Err(Error::Config(_))));
    }

    #[test]
    fn endpoints_derive_from_project_url() {
        let config = ClientConfig::new("https://demo.supabase.co", "anon").unwrap();
        assert_eq!(config.rest_url(), "https://demo.supabase.co/rest/v1");
        assert_eq!(config.storage_url(), "https://demo.supabase.co/storage/v1");
        assert_eq!(config.auth_url().unwrap(), "https://demo.supabase.co/auth/v1");
    }
}
