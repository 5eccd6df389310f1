//! API server configuration.

/// Listen address and where to find the resolver config.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Listen address (e.g., "0.0.0.0").
    pub host: String,
    pub port: u16,
    /// Path to the resolver TOML file. Defaults apply when unset.
    pub config_path: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl ApiConfig {
    /// Load config from `VQ_HOST`, `VQ_PORT`, and `VQ_CONFIG`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("VQ_HOST").unwrap_or(defaults.host),
            port: lookup("VQ_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            config_path: lookup("VQ_CONFIG").filter(|p| !p.is_empty()),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            config_path: None,
        }
    }
}
