use std::env;
use std::time::Duration;

/// Default overall timeout for an upstream fetch.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default timeout for establishing the upstream connection.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default redirect limit handed to the HTTP client.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Outbound HTTP client settings.
///
/// Built once at startup and handed to the fetcher; never mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpConfig {
    /// Overall request timeout (connect + headers + body)
    pub timeout: Duration,
    /// Connection establishment timeout
    pub connect_timeout: Duration,
    /// Maximum redirects followed by the client
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub http: HttpConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every variable is optional; an unset variable takes its default, a set
    /// but unparsable one is an error.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|e| format!("invalid PORT: {e}"))?;

        let timeout = secs_from_env("UPSTREAM_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        let connect_timeout =
            secs_from_env("UPSTREAM_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?;

        let max_redirects = match env::var("UPSTREAM_MAX_REDIRECTS") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| format!("invalid UPSTREAM_MAX_REDIRECTS: {e}"))?,
            Err(_) => DEFAULT_MAX_REDIRECTS,
        };

        Ok(Config {
            host,
            port,
            http: HttpConfig {
                timeout,
                connect_timeout,
                max_redirects,
            },
        })
    }

    /// `host:port` string suitable for `TcpListener::bind`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read a positive number of seconds from `key`, falling back to `default`.
fn secs_from_env(key: &str, default: u64) -> Result<Duration, Box<dyn std::error::Error>> {
    let secs = match env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|e| format!("invalid {key}: {e}"))?,
        Err(_) => default,
    };

    if secs == 0 {
        return Err(format!("{key} must be greater than zero").into());
    }

    Ok(Duration::from_secs(secs))
}
