use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::yandexgpt::provider::non_blank;

pub const FOLDER_ID_ENV: &str = "YG_FOLDER_ID";
pub const API_KEY_ENV: &str = "YG_API_KEY";
pub const IAM_TOKEN_ENV: &str = "YG_IAM_TOKEN";
pub const CONFIG_ENV: &str = "YG_CONFIG";

/// Default credentials handed to client configs by the caller.
///
/// Clients never read the environment themselves; the binaries resolve this
/// once at startup from flags, environment and profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub folder_id: Option<String>,
    pub api_key: Option<String>,
    pub iam_token: Option<String>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            folder_id: env_value(FOLDER_ID_ENV),
            api_key: env_value(API_KEY_ENV),
            iam_token: env_value(IAM_TOKEN_ENV),
        }
    }

    pub fn from_profile(profile: &ProfileConfig) -> Self {
        Self {
            folder_id: profile.folder_id.clone(),
            api_key: profile.api_key.clone(),
            iam_token: profile.iam_token.clone(),
        }
    }

    /// Drops blank values so they do not shadow a later source.
    pub fn without_blanks(self) -> Self {
        Self {
            folder_id: non_blank(self.folder_id),
            api_key: non_blank(self.api_key),
            iam_token: non_blank(self.iam_token),
        }
    }

    /// Field-wise fallback: values already set here win.
    pub fn or(self, other: Settings) -> Self {
        Self {
            folder_id: self.folder_id.or(other.folder_id),
            api_key: self.api_key.or(other.api_key),
            iam_token: self.iam_token.or(other.iam_token),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub folder_id: Option<String>,
    pub api_key: Option<String>,
    pub iam_token: Option<String>,
    pub model: Option<String>,
    pub system: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub timeout: Option<u64>,
    pub sleep_ms: Option<u64>,
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    profiles: Option<HashMap<String, ProfileConfig>>,
}

pub fn load_profile(name: &str) -> Result<ProfileConfig, String> {
    let path = config_path()?;
    let profiles = read_profiles(&path)?;
    profiles.get(name).cloned().ok_or_else(|| {
        format!(
            "Profile '{}' not found in config file '{}'.",
            name,
            path.display()
        )
    })
}

/// Loads the profile only when one was requested.
pub fn load_optional_profile(name: Option<&str>) -> Result<ProfileConfig, String> {
    match name {
        Some(name) => load_profile(name),
        None => Ok(ProfileConfig::default()),
    }
}

/// Parses the config file and checks the requested profile, or all of them.
pub fn validate_config(profile: Option<&str>) -> Result<PathBuf, String> {
    let path = config_path()?;
    let profiles = read_profiles(&path)?;

    let checked: Vec<(&String, &ProfileConfig)> = match profile {
        Some(name) => {
            let (key, value) = profiles.get_key_value(name).ok_or_else(|| {
                format!(
                    "Profile '{}' not found in config file '{}'.",
                    name,
                    path.display()
                )
            })?;
            vec![(key, value)]
        }
        None => profiles.iter().collect(),
    };

    for (name, config) in checked {
        validate_profile(config).map_err(|err| format!("Profile '{name}': {err}"))?;
    }
    Ok(path)
}

pub fn validate_profile(profile: &ProfileConfig) -> Result<(), String> {
    if let Some(temperature) = profile.temperature {
        check_temperature(temperature)?;
    }
    if profile.max_tokens == Some(0) {
        return Err("max_tokens must be greater than zero".to_string());
    }
    if profile.timeout == Some(0) {
        return Err("timeout must be greater than zero".to_string());
    }
    if profile
        .folder_id
        .as_deref()
        .is_some_and(|value| value.trim().is_empty())
    {
        return Err("folder_id is empty".to_string());
    }
    Ok(())
}

pub fn check_temperature(temperature: f64) -> Result<(), String> {
    if (0.0..=1.0).contains(&temperature) {
        Ok(())
    } else {
        Err(format!("temperature {temperature} is outside 0..=1"))
    }
}

fn read_profiles(path: &Path) -> Result<HashMap<String, ProfileConfig>, String> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read config file '{}': {err}", path.display()))?;
    parse_profiles(&raw, path)
}

fn parse_profiles(raw: &str, path: &Path) -> Result<HashMap<String, ProfileConfig>, String> {
    let config: ConfigFile = toml::from_str(raw)
        .map_err(|err| format!("Failed to parse config file '{}': {err}", path.display()))?;

    config.profiles.ok_or_else(|| {
        format!(
            "Config file '{}' does not contain a [profiles] section.",
            path.display()
        )
    })
}

pub fn config_path() -> Result<PathBuf, String> {
    if let Some(path) = env_value(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }
    if let Some(xdg) = env_value("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg).join("yagpt").join("config.toml"));
    }

    let home = env_value("HOME").ok_or_else(|| {
        format!("Cannot resolve config path: set {CONFIG_ENV} or HOME/XDG_CONFIG_HOME.")
    })?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("yagpt")
        .join("config.toml"))
}

/// Trimmed, non-empty value of an environment variable.
pub fn env_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn env_parsed<T: FromStr>(key: &str) -> Result<Option<T>, String> {
    env_value(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| format!("Invalid {key} '{raw}'."))
        })
        .transpose()
}
