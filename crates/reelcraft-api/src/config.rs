//! HTTP server settings.

use std::str::FromStr;
use std::time::Duration;

const MB: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// Per client IP.
    pub rate_limit_rps: u32,
    /// Reel assembly runs inside the request, so this is generous.
    pub request_timeout: Duration,
    /// Upper bound on multipart video uploads.
    pub max_body_size: usize,
    pub environment: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            cors_origins: vec!["*".into()],
            rate_limit_rps: 10,
            request_timeout: Duration::from_secs(900),
            max_body_size: 512 * MB,
            environment: "development".into(),
        }
    }
}

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|raw| raw.trim().parse().ok())
}

fn origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect()
}

impl ApiConfig {
    /// Overlay `API_HOST`, `API_PORT`, `CORS_ORIGINS`, `RATE_LIMIT_RPS`,
    /// `REQUEST_TIMEOUT` (seconds), `MAX_BODY_SIZE` (bytes) and `ENVIRONMENT`
    /// on the defaults. Unparseable values fall back silently.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(host) = std::env::var("API_HOST") {
            config.host = host;
        }
        if let Some(port) = parsed("API_PORT") {
            config.port = port;
        }
        if let Ok(raw) = std::env::var("CORS_ORIGINS") {
            let list = origins(&raw);
            if !list.is_empty() {
                config.cors_origins = list;
            }
        }
        if let Some(rps) = parsed::<u32>("RATE_LIMIT_RPS").filter(|&r| r > 0) {
            config.rate_limit_rps = rps;
        }
        if let Some(secs) = parsed("REQUEST_TIMEOUT") {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(bytes) = parsed("MAX_BODY_SIZE") {
            config.max_body_size = bytes;
        }
        if let Ok(env) = std::env::var("ENVIRONMENT") {
            config.environment = env;
        }
        config
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.request_timeout, Duration::from_secs(900));
        assert!(!config.is_production());
    }

    #[test]
    fn test_origins_drop_blanks() {
        assert_eq!(
            origins("https://a.test, ,https://b.test,"),
            ["https://a.test", "https://b.test"]
        );
    }
}
