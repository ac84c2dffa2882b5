use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Mock,
    Gemini,
}

impl ProviderKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "mock" => Some(ProviderKind::Mock),
            "gemini" => Some(ProviderKind::Gemini),
            _ => None,
        }
    }
}

/// Settings for the narrative report call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NarrativeConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub temperature: f32,
    pub thinking_budget: u32,
    /// Language the report should be written in
    pub language: String,
    /// Environment variable holding the API credential
    pub api_key_env: String,
    /// Generative Language API root
    pub base_url: String,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Mock,
            model: "gemini-3-pro-preview".to_string(),
            temperature: 0.6,
            thinking_budget: 2000,
            language: "es".to_string(),
            api_key_env: "API_KEY".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }
}

impl NarrativeConfig {
    /// Defaults overlaid with `SDGSCORE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("SDGSCORE_PROVIDER") {
            match ProviderKind::parse(&raw) {
                Some(kind) => config.provider = kind,
                None => tracing::warn!(value = %raw, "Unknown SDGSCORE_PROVIDER, keeping default"),
            }
        }
        if let Some(model) = lookup("SDGSCORE_MODEL").filter(|m| !m.trim().is_empty()) {
            config.model = model;
        }
        if let Some(language) = lookup("SDGSCORE_LANGUAGE").filter(|l| !l.trim().is_empty()) {
            config.language = language;
        }
        if let Some(base_url) = lookup("SDGSCORE_BASE_URL").filter(|u| !u.trim().is_empty()) {
            config.base_url = base_url;
        }

        config
    }

    /// Credential from the configured variable. Unset, blank or the literal
    /// "undefined" all count as missing.
    pub fn api_key(&self) -> Option<String> {
        self.api_key_from(|key| std::env::var(key).ok())
    }

    pub fn api_key_from<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup(&self.api_key_env).filter(|key| !key.trim().is_empty() && key != "undefined")
    }
}
