use std::env;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub geoip_base_url: String,
    pub weather_base_url: String,
    pub upstream_timeout_secs: u64,
    pub trust_cf_connecting_ip: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            geoip_base_url: "https://freegeoip.app".to_string(),
            weather_base_url: "https://www.metaweather.com".to_string(),
            upstream_timeout_secs: 10,
            trust_cf_connecting_ip: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source. Empty values count as unset.
    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|s| !s.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT", get("PORT"), defaults.port)?,
            geoip_base_url: get("GEOIP_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.geoip_base_url),
            weather_base_url: get("WEATHER_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.weather_base_url),
            upstream_timeout_secs: parse_var(
                "UPSTREAM_TIMEOUT_SECS",
                get("UPSTREAM_TIMEOUT_SECS"),
                defaults.upstream_timeout_secs,
            )?,
            trust_cf_connecting_ip: parse_var(
                "TRUST_CF_CONNECTING_IP",
                get("TRUST_CF_CONNECTING_IP"),
                defaults.trust_cf_connecting_ip,
            )?,
        })
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

fn parse_var<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
    }
}
