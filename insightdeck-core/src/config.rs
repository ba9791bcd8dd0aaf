//! Configuration system for InsightDeck.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/insightdeck/config.toml` and/or
//! `.insightdeck/config.toml` in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for the report service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub profile: ProfileConfig,
    pub insights: InsightConfig,
    pub charts: ChartConfig,
    pub report: ReportConfig,
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name: "openai", "azure", "local".
    pub provider: String,
    /// Model identifier (e.g., "gpt-4o").
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Explicit API key; takes precedence over `api_key_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Optional base URL override. For Azure this is the resource endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Azure deployment name. Falls back to `model` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,
    /// Azure REST API version.
    pub api_version: String,
    /// Maximum tokens to generate in a response.
    pub max_tokens: usize,
    /// Per-request timeout. `None` waits indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            base_url: None,
            deployment: None,
            api_version: "2024-12-01-preview".to_string(),
            max_tokens: 4096,
            request_timeout_secs: None,
        }
    }
}

impl LlmConfig {
    /// Validate this LLM config and return any warnings.
    ///
    /// Returns an empty Vec if the config is valid. Problems are reported as
    /// human-readable warnings and never as errors.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        match self.provider.as_str() {
            "openai" | "local" => {}
            "azure" => {
                if self.base_url.is_none() {
                    warnings.push(
                        "provider 'azure' needs base_url set to the resource endpoint".to_string(),
                    );
                }
            }
            other => warnings.push(format!(
                "unknown provider '{other}'; falling back to the OpenAI wire format"
            )),
        }
        if self.max_tokens == 0 {
            warnings.push("max_tokens is 0; every response will be empty".to_string());
        }
        if self.request_timeout_secs == Some(0) {
            warnings.push("request_timeout_secs is 0; every request will time out".to_string());
        }
        warnings
    }
}

/// HTTP service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Directory uploaded spreadsheets are written to.
    pub upload_dir: PathBuf,
    /// Directory generated PDF reports are written to.
    pub report_dir: PathBuf,
    /// Optional directory holding `index.html` and other frontend assets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            upload_dir: PathBuf::from("uploads"),
            report_dir: PathBuf::from("generated_reports"),
            static_dir: None,
        }
    }
}

/// Dataset profiling limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Rows beyond this are randomly sampled down before deep profiling.
    pub sample_limit: usize,
    /// Distinct sample values kept per column in the summary.
    pub sample_values: usize,
    /// Most frequent values kept per non-numeric variable in the profile.
    pub max_top_values: usize,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            sample_limit: 10_000,
            sample_values: 5,
            max_top_values: 10,
        }
    }
}

/// Insight generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightConfig {
    pub max_insights: usize,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            max_insights: 9,
            temperature: 1.0,
            top_p: 1.0,
        }
    }
}

/// Chart planning and rasterization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    pub max_charts: usize,
    pub temperature: f32,
    pub width_px: u32,
    pub height_px: u32,
    /// Bar charts keep at most this many groups.
    pub max_categories: usize,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            max_charts: 9,
            temperature: 0.0,
            width_px: 800,
            height_px: 600,
            max_categories: 25,
        }
    }
}

/// PDF assembly settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Font families tried in order; the first one found in `font_dirs` wins.
    pub font_families: Vec<String>,
    /// Directories searched in order for each family.
    pub font_dirs: Vec<PathBuf>,
    /// Resolution used to convert chart pixels to millimetres.
    pub chart_dpi: f64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            font_families: ["LiberationSans", "DejaVuSans", "Arial", "Helvetica"]
                .into_iter()
                .map(String::from)
                .collect(),
            font_dirs: vec![
                PathBuf::from("fonts"),
                PathBuf::from("/usr/share/fonts/truetype/liberation"),
                PathBuf::from("/usr/share/fonts/liberation-sans"),
                PathBuf::from("/usr/share/fonts/liberation"),
                PathBuf::from("/usr/share/fonts/truetype/dejavu"),
                PathBuf::from("/usr/share/fonts/dejavu"),
                PathBuf::from("/System/Library/Fonts"),
                PathBuf::from("/Library/Fonts"),
            ],
            chart_dpi: 150.0,
        }
    }
}

/// Load configuration by merging defaults, config files, and environment variables.
///
/// Precedence, lowest first: built-in defaults, user config, workspace config,
/// `INSIGHTDECK_*` environment variables, explicit overrides.
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&AppConfig>,
) -> Result<AppConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    // User-level config
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "insightdeck", "insightdeck") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".insightdeck").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (INSIGHTDECK_LLM__MODEL, INSIGHTDECK_SERVER__PORT, etc.)
    figment = figment.merge(Env::prefixed("INSIGHTDECK_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}
