use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use serde::Deserialize;
use url::Url;

const DEFAULT_CONFIG_FILE: &str = "scanner.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub debounce_ms: u64,
    pub min_auto_submit_len: usize,
    pub user_store_path: PathBuf,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080/api".into(),
            request_timeout_secs: 15,
            debounce_ms: 300,
            min_auto_submit_len: 4,
            user_store_path: default_user_store_path(),
            log_level: "info".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    debounce_ms: Option<u64>,
    min_auto_submit_len: Option<usize>,
    user_store_path: Option<PathBuf>,
    log_level: Option<String>,
}

fn default_user_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shipment-scanner")
        .join("user.json")
}

/// Defaults, then the TOML file, then environment overrides. An explicitly requested
/// config file must exist; the implicit `scanner.toml` is optional.
pub fn load_settings(explicit_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let file_cfg = match explicit_path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file '{}'", path.display()))?;
            Some(parse_file_settings(&raw, path)?)
        }
        None => match fs::read_to_string(DEFAULT_CONFIG_FILE) {
            Ok(raw) => Some(parse_file_settings(&raw, Path::new(DEFAULT_CONFIG_FILE))?),
            Err(_) => None,
        },
    };
    if let Some(file_cfg) = file_cfg {
        apply_file_settings(&mut settings, file_cfg);
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    validate(&settings)?;
    Ok(settings)
}

fn parse_file_settings(raw: &str, path: &Path) -> anyhow::Result<FileSettings> {
    toml::from_str(raw).with_context(|| format!("invalid config file '{}'", path.display()))
}

fn apply_file_settings(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.api_base_url {
        settings.api_base_url = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = file_cfg.debounce_ms {
        settings.debounce_ms = v;
    }
    if let Some(v) = file_cfg.min_auto_submit_len {
        settings.min_auto_submit_len = v;
    }
    if let Some(v) = file_cfg.user_store_path {
        settings.user_store_path = v;
    }
    if let Some(v) = file_cfg.log_level {
        settings.log_level = v;
    }
}

pub(crate) fn apply_env_overrides<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("SCANNER_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = lookup("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }

    if let Some(v) = lookup("APP__DEBOUNCE_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.debounce_ms = parsed;
        }
    }

    if let Some(v) = lookup("APP__MIN_AUTO_SUBMIT_LEN") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.min_auto_submit_len = parsed;
        }
    }

    if let Some(v) = lookup("APP__USER_STORE_PATH") {
        settings.user_store_path = PathBuf::from(v);
    }

    if let Some(v) = lookup("APP__LOG_LEVEL") {
        settings.log_level = v;
    }
}

fn validate(settings: &Settings) -> anyhow::Result<()> {
    let url = Url::parse(settings.api_base_url.trim())
        .with_context(|| format!("invalid api_base_url '{}'", settings.api_base_url))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("api_base_url must use http or https, got '{}'", url.scheme());
    }
    if settings.request_timeout_secs == 0 {
        bail!("request_timeout_secs must be greater than zero");
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
