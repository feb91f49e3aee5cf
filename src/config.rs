use std::env;
use std::path::PathBuf;

use crate::knowledge::store::StoredSettings;
use crate::utils::gemini::DEFAULT_ENDPOINT;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const MODEL_ENV: &str = "KB_SEARCH_MODEL";
pub const DATA_DIR_ENV: &str = "KB_SEARCH_DATA_DIR";
pub const ENDPOINT_ENV: &str = "KB_SEARCH_GEMINI_ENDPOINT";

/// Values given on the command line, before falling back to env and stored settings.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub data_dir: Option<PathBuf>,
}

/// Effective settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
}

impl Settings {
    /// Resolves settings with precedence: command line > environment > stored > default.
    pub fn resolve(cli: &CliOverrides, stored: &StoredSettings) -> Self {
        Self::resolve_with(cli, stored, |name| env::var(name).ok())
    }

    fn resolve_with(
        cli: &CliOverrides,
        stored: &StoredSettings,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let non_empty = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = non_empty(cli.api_key.clone())
            .or_else(|| non_empty(lookup(API_KEY_ENV)))
            .or_else(|| non_empty(stored.api_key.clone()));
        let model = non_empty(cli.model.clone())
            .or_else(|| non_empty(lookup(MODEL_ENV)))
            .or_else(|| non_empty(stored.model.clone()))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let endpoint =
            non_empty(lookup(ENDPOINT_ENV)).unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        Self {
            api_key,
            model,
            endpoint,
        }
    }
}

/// Directory holding `documents.json` and `settings.json`.
pub fn data_dir(cli: &CliOverrides) -> PathBuf {
    if let Some(dir) = &cli.data_dir {
        return dir.clone();
    }
    if let Some(dir) = env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kb-search")
}

/// Shows the first and last four characters of a key, masking the rest.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 8), tail)
}
