use std::time::Duration;

use crate::errors::ClientError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

const ENV_BASE_URL: &str = "PROGRESS_STREAM_BASE_URL";
const ENV_TIMEOUT_SECS: &str = "PROGRESS_STREAM_TIMEOUT_SECS";
const ENV_CONNECT_TIMEOUT_SECS: &str = "PROGRESS_STREAM_CONNECT_TIMEOUT_SECS";
const ENV_SIMULATED_DELAY_MS: &str = "PROGRESS_STREAM_SIMULATED_DELAY_MS";

/// Endpoint paths relative to the base URL. `{jd_id}` is substituted for
/// evaluation calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    pub evaluation: String,
    pub polish: String,
    pub ingest: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            evaluation: "/api/jd/{jd_id}/evaluate-resume".to_string(),
            polish: "/api/jd/polish-text/stream".to_string(),
            ingest: "/api/resumes/upload-stream".to_string(),
        }
    }
}

/// Configuration for [`StreamClient`](super::StreamClient).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server root, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Whole-exchange timeout applied per request. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    /// Spacing between replayed entries when the evaluation endpoint answers
    /// with a whole JSON document.
    pub simulated_delay: Option<Duration>,
    pub endpoints: Endpoints,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
            connect_timeout: None,
            simulated_delay: None,
            endpoints: Endpoints::default(),
        }
    }

    /// Builds a config from `PROGRESS_STREAM_*` environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ClientError> {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let base_url = read(ENV_BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut config = Self::new(base_url);
        if let Some(raw) = read(ENV_TIMEOUT_SECS) {
            config.timeout = Some(Duration::from_secs(parse_number(ENV_TIMEOUT_SECS, &raw)?));
        }
        if let Some(raw) = read(ENV_CONNECT_TIMEOUT_SECS) {
            config.connect_timeout =
                Some(Duration::from_secs(parse_number(ENV_CONNECT_TIMEOUT_SECS, &raw)?));
        }
        if let Some(raw) = read(ENV_SIMULATED_DELAY_MS) {
            config.simulated_delay =
                Some(Duration::from_millis(parse_number(ENV_SIMULATED_DELAY_MS, &raw)?));
        }
        config.validate()?;
        Ok(config)
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn simulated_delay(mut self, delay: Duration) -> Self {
        self.simulated_delay = Some(delay);
        self
    }

    /// Overrides the endpoint paths (for proxies or test servers).
    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(ClientError::Config("base_url must not be empty".into()));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "base_url must start with http:// or https://, got `{base}`"
            )));
        }
        Ok(())
    }

    pub(crate) fn evaluation_url(&self, jd_id: u64) -> String {
        self.url(&self.endpoints.evaluation.replace("{jd_id}", &jd_id.to_string()))
    }

    pub(crate) fn polish_url(&self) -> String {
        self.url(&self.endpoints.polish)
    }

    pub(crate) fn ingest_url(&self) -> String {
        self.url(&self.endpoints.ingest)
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn parse_number(key: &str, raw: &str) -> Result<u64, ClientError> {
    raw.parse::<u64>()
        .map_err(|e| ClientError::Config(format!("{key} must be a non-negative integer: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = ClientConfig::from_lookup(lookup(&[])).expect("config");
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.timeout, None);
        assert_eq!(config.polish_url(), "http://localhost:8000/api/jd/polish-text/stream");
    }

    #[test]
    fn reads_overrides_from_env() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_BASE_URL, "https://hr.example.com/"),
            (ENV_TIMEOUT_SECS, "90"),
            (ENV_CONNECT_TIMEOUT_SECS, " 5 "),
            (ENV_SIMULATED_DELAY_MS, "250"),
        ]))
        .expect("config");
        assert_eq!(config.timeout, Some(Duration::from_secs(90)));
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.simulated_delay, Some(Duration::from_millis(250)));
        assert_eq!(
            config.evaluation_url(7),
            "https://hr.example.com/api/jd/7/evaluate-resume"
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[(ENV_TIMEOUT_SECS, "soon")])),
            Err(ClientError::Config(message)) if message.contains(ENV_TIMEOUT_SECS)
        ));
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[(ENV_BASE_URL, "localhost:8000")])),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn custom_endpoints_are_joined_once() {
        let config = ClientConfig::new("http://127.0.0.1:9000").endpoints(Endpoints {
            evaluation: "v2/jd/{jd_id}/evaluate".into(),
            polish: "/v2/polish".into(),
            ingest: "/v2/upload".into(),
        });
        assert_eq!(config.evaluation_url(3), "http://127.0.0.1:9000/v2/jd/3/evaluate");
        assert_eq!(config.ingest_url(), "http://127.0.0.1:9000/v2/upload");
    }
}
