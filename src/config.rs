use std::env;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        let api_url = env::var("INSIGHTS_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        let timeout_secs = env::var("INSIGHTS_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::new(api_url, timeout_secs)
    }

    pub fn new(api_url: impl Into<String>, timeout_secs: u64) -> Self {
        let api_url: String = api_url.into();
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            timeout_secs,
        }
    }

    /// Same settings with a different backend location.
    pub fn with_api_url(self, api_url: impl Into<String>) -> Self {
        Self::new(api_url, self.timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS)
    }
}
