use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct AzureImageConfig {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub api_version: String,
    pub deployment: String,
    pub size: String,
    pub quality: String,
}

/// Rate-limit budget of the image service: in-flight requests per batch.
pub const MAX_IMAGE_WORKERS: usize = 3;
pub const MAX_IMAGE_RETRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct FanOutConfig {
    pub workers: usize,
    pub timeout: Option<Duration>,
    pub retries: u32,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self { workers: MAX_IMAGE_WORKERS, timeout: Some(Duration::from_secs(120)), retries: 0 }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub max_body_bytes: usize,
    pub openai: OpenAiConfig,
    pub azure: AzureImageConfig,
    pub fanout: FanOutConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let string_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let timeout_secs: u64 = parse_or(&get, "IMAGE_TIMEOUT_SECS", 120)?;
        let workers: usize = parse_or(&get, "IMAGE_WORKERS", MAX_IMAGE_WORKERS)?;
        if !(1..=MAX_IMAGE_WORKERS).contains(&workers) {
            return Err(ConfigError::Invalid { key: "IMAGE_WORKERS", value: workers.to_string() });
        }
        let retries: u32 = parse_or(&get, "IMAGE_RETRIES", 0)?;
        if retries > MAX_IMAGE_RETRIES {
            return Err(ConfigError::Invalid { key: "IMAGE_RETRIES", value: retries.to_string() });
        }

        Ok(Self {
            port: parse_or(&get, "PORT", 8080)?,
            max_body_bytes: parse_or(&get, "MAX_BODY_BYTES", 16 * 1024 * 1024)?,
            openai: OpenAiConfig {
                api_key: get("OPENAI_API_KEY"),
                base_url: string_or("OPENAI_API_BASE", "https://api.openai.com/v1"),
                model: string_or("OPENAI_VISION_MODEL", "gpt-4o"),
                max_tokens: parse_or(&get, "OPENAI_MAX_TOKENS", 1000)?,
            },
            azure: AzureImageConfig {
                api_key: get("AZURE_OPENAI_API_KEY"),
                endpoint: get("AZURE_OPENAI_ENDPOINT"),
                api_version: string_or("AZURE_OPENAI_API_VERSION", "2024-02-01"),
                deployment: string_or("AZURE_OPENAI_IMAGE_DEPLOYMENT", "dall-e-3"),
                size: string_or("IMAGE_SIZE", "1024x1024"),
                quality: string_or("IMAGE_QUALITY", "standard"),
            },
            fanout: FanOutConfig {
                workers,
                // 0 disables the per-style timeout
                timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
                retries,
            },
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.fanout.workers, 3);
        assert_eq!(config.fanout.retries, 0);
        assert_eq!(config.fanout.timeout, Some(Duration::from_secs(120)));
        assert_eq!(config.openai.model, "gpt-4o");
        assert_eq!(config.azure.deployment, "dall-e-3");
        assert!(config.openai.api_key.is_none());
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = config_from(&[("OPENAI_API_KEY", "  "), ("PORT", "")]).unwrap();
        assert!(config.openai.api_key.is_none());
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("IMAGE_WORKERS", "2"),
            ("IMAGE_TIMEOUT_SECS", "0"),
            ("IMAGE_RETRIES", "2"),
            ("AZURE_OPENAI_ENDPOINT", "https://example.openai.azure.com"),
        ])
        .unwrap();
        assert_eq!(config.fanout.workers, 2);
        assert_eq!(config.fanout.timeout, None);
        assert_eq!(config.fanout.retries, 2);
        assert_eq!(config.azure.endpoint.as_deref(), Some("https://example.openai.azure.com"));
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
        assert!(config_from(&[("IMAGE_WORKERS", "0")]).is_err());
    }

    #[test]
    fn worker_budget_and_retries_are_capped() {
        let err = config_from(&[("IMAGE_WORKERS", "4")]).unwrap_err();
        assert!(err.to_string().contains("IMAGE_WORKERS"));

        let err = config_from(&[("IMAGE_RETRIES", "4294967295")]).unwrap_err();
        assert!(err.to_string().contains("IMAGE_RETRIES"));
        assert!(config_from(&[("IMAGE_RETRIES", "1000000")]).is_err());

        let config = config_from(&[("IMAGE_RETRIES", "3")]).unwrap();
        assert_eq!(config.fanout.retries, MAX_IMAGE_RETRIES);
    }
}
