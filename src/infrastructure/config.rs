use crate::application::time_window::TimeWindow;
use crate::domain::chart::ChartGeometry;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "CHART_ANNOTATOR";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub chart: ChartGeometry,
    #[serde(default = "default_preferences_path")]
    pub preferences_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind: String,
    /// Sessions untouched for this long are dropped
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            session_idle_secs: default_session_idle_secs(),
        }
    }
}

fn default_session_idle_secs() -> u64 {
    1800
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendSettings {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_preferences_path() -> PathBuf {
    PathBuf::from("config/preferences.toml")
}

/// Load `config/app.*` (optional) overlaid with `CHART_ANNOTATOR__*` environment variables
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/app").required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to read configuration")?;

    settings
        .try_deserialize()
        .context("Invalid configuration")
}

/// User choices that survive restarts: industry and the default chart selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    pub industry: Option<String>,
    pub selected_tags: Vec<String>,
    pub time_window: TimeWindow,
}

impl Preferences {
    /// Read preferences; a missing file yields the defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::info!("No preferences at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read preferences from {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse preferences in {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(self).context("Failed to serialize preferences")?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write preferences to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("chart-annotator-{}-{}", name, std::process::id()))
            .join("preferences.toml")
    }

    #[test]
    fn test_missing_preferences_are_defaults() {
        let prefs = Preferences::load(&temp_path("missing")).unwrap();
        assert_eq!(prefs, Preferences::default());
        assert_eq!(prefs.time_window, TimeWindow::Points(100));
    }

    #[test]
    fn test_preferences_round_trip() {
        let path = temp_path("round-trip");
        let prefs = Preferences {
            industry: Some("Water Treatment".to_string()),
            selected_tags: vec!["FT-101".to_string(), "PT-202".to_string()],
            time_window: "6hours".parse().unwrap(),
        };
        prefs.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("timeWindow = \"6hours\""));
        assert_eq!(Preferences::load(&path).unwrap(), prefs);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_partial_preferences_fill_defaults() {
        let prefs: Preferences = toml::from_str("industry = \"Oil & Gas\"").unwrap();
        assert_eq!(prefs.industry.as_deref(), Some("Oil & Gas"));
        assert!(prefs.selected_tags.is_empty());
    }
}
