use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// Config for persistent settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub api_key: Option<String>,
}

impl Config {
    fn config_file() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("kestrel").join("config.json"))
    }

    pub fn load() -> Self {
        if let Some(config_file) = Self::config_file() {
            if let Ok(contents) = std::fs::read_to_string(&config_file) {
                if let Ok(config) = serde_json::from_str(&contents) {
                    return config;
                }
            }
        }
        Self::default()
    }

    pub fn save(&self) -> Result<(), String> {
        let Some(config_file) = Self::config_file() else {
            return Err("Could not determine config directory".to_string());
        };

        if let Some(parent) = config_file.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        std::fs::write(&config_file, contents)
            .map_err(|e| format!("Failed to write config: {}", e))
    }

    /// The API key the catalog client should use. An empty key is passed
    /// through as-is; the upstream service rejects it on first use.
    pub fn resolve_api_key(&self) -> String {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var("YOUTUBE_API_KEY").ok())
            .unwrap_or_default()
    }
}
