use crate::food::config::{parse_bool, FoodConfig};
#[cfg(test)]
use std::collections::HashMap;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024; // 10MB
pub const DEFAULT_MAX_CONCURRENT_SCANS: usize = 4;

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_url: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn from_lookup(provider: &str, lookup: Lookup) -> Result<Self, String> {
        let prefix = provider.to_uppercase();

        let api_key = match provider {
            "gemini" => lookup("GOOGLE_API_KEY").or_else(|| lookup("GEMINI_API_KEY")),
            _ => lookup(&format!("{}_API_KEY", prefix)),
        };

        let model = lookup(&format!("{}_MODEL", prefix)).unwrap_or_else(|| match provider {
            "gemini" => "gemini-1.5-flash".to_string(),
            _ => String::new(),
        });

        let api_url = lookup(&format!("{}_API_URL", prefix)).unwrap_or_else(|| match provider {
            "gemini" => "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            _ => String::new(),
        });

        let temperature: f32 = parse_var(lookup, &format!("{}_TEMPERATURE", prefix), 0.4)?;
        let timeout_secs: u64 = parse_var(lookup, &format!("{}_TIMEOUT_SECS", prefix), 60)?;

        Ok(Self {
            api_key,
            model,
            api_url,
            temperature,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gemini: ProviderConfig,
    pub food: FoodConfig,
    /// When false the hosted model is never configured and Gemini scans report an error.
    pub gemini_enabled: bool,
    pub max_upload_bytes: usize,
    pub max_concurrent_scans: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(&env_var)
    }

    pub fn from_lookup(lookup: Lookup) -> Result<Self, String> {
        let gemini_enabled = match lookup("GEMINI_ENABLED") {
            Some(value) => parse_bool(&value)
                .ok_or_else(|| format!("GEMINI_ENABLED must be true or false, got '{}'", value))?,
            None => true,
        };

        let max_upload_bytes = parse_var(lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;

        let max_concurrent_scans = parse_var(lookup, "MAX_CONCURRENT_SCANS", DEFAULT_MAX_CONCURRENT_SCANS)?;
        if max_concurrent_scans == 0 {
            return Err("MAX_CONCURRENT_SCANS must be at least 1".to_string());
        }

        Ok(Self {
            gemini: ProviderConfig::from_lookup("gemini", lookup)?,
            food: FoodConfig::from_lookup(lookup)?,
            gemini_enabled,
            max_upload_bytes,
            max_concurrent_scans,
        })
    }
}

/// Reads a configuration value by name. Blank values count as unset.
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

pub(crate) fn env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Parses `key` when it is set, falling back to `default` only when it is not.
pub(crate) fn parse_var<T>(lookup: Lookup, key: &str, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| format!("{} has an invalid value '{}': {}", key, value, e)),
        None => Ok(default),
    }
}

#[cfg(test)]
pub(crate) fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}
