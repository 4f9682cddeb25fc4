pub mod validation;

use serde::{Deserialize, Serialize};
use std::fmt;

use self::validation::validate_config;

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Environment variable '{0}' referenced by the config is not set")]
    MissingEnv(String),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    /// Overall upstream request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_http_pool_max_idle_per_host")]
    pub http_pool_max_idle_per_host: usize,
    #[serde(default = "default_http_pool_idle_timeout_secs")]
    pub http_pool_idle_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_worker_threads: Option<usize>,
    #[serde(
        default = "default_runtime_max_blocking_threads",
        skip_serializing_if = "Option::is_none"
    )]
    pub runtime_max_blocking_threads: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_thread_stack_size_kb: Option<usize>,
    #[serde(default)]
    pub base_path: String,
    #[serde(default)]
    pub http_use_env_proxy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_proxy: Option<String>,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default = "default_outputs_dir")]
    pub outputs_dir: String,
    /// Empty means any origin, matching a plain `cors()` middleware.
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    5000
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_timeout() -> u64 {
    180
}
fn default_http_pool_max_idle_per_host() -> usize {
    16
}
fn default_http_pool_idle_timeout_secs() -> u64 {
    15
}
#[allow(clippy::unnecessary_wraps)]
fn default_runtime_max_blocking_threads() -> Option<usize> {
    Some(8)
}
fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}
fn default_outputs_dir() -> String {
    "outputs".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            timeout: default_timeout(),
            http_pool_max_idle_per_host: default_http_pool_max_idle_per_host(),
            http_pool_idle_timeout_secs: default_http_pool_idle_timeout_secs(),
            runtime_worker_threads: None,
            runtime_max_blocking_threads: default_runtime_max_blocking_threads(),
            runtime_thread_stack_size_kb: None,
            base_path: String::new(),
            http_use_env_proxy: false,
            http_proxy: None,
            max_upload_bytes: default_max_upload_bytes(),
            outputs_dir: default_outputs_dir(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Feature flags and settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default)]
    pub analysis_prompt: Option<String>,
    /// Must contain `{artifact_name}`.
    #[serde(default)]
    pub climate_prompt_template: Option<String>,
    #[serde(default)]
    pub restoration_prompt: Option<String>,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            analysis_prompt: None,
            climate_prompt_template: None,
            restoration_prompt: None,
        }
    }
}

/// Vision-language model used for artifact analysis and climate reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_gemini_temperature")]
    pub temperature: f64,
    #[serde(default = "default_gemini_max_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_gemini_temperature() -> f64 {
    0.7
}
fn default_gemini_max_output_tokens() -> u32 {
    800
}

impl GeminiConfig {
    #[must_use]
    pub fn generate_content_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_gemini_base_url(),
            api_key: String::new(),
            model: default_gemini_model(),
            temperature: default_gemini_temperature(),
            max_output_tokens: default_gemini_max_output_tokens(),
        }
    }
}

/// Stability AI image-to-3D.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityConfig {
    #[serde(default = "default_stability_endpoint")]
    pub endpoint: String,
    pub api_key: String,
    #[serde(default = "default_stability_client_id")]
    pub client_id: String,
    #[serde(default = "default_texture_resolution")]
    pub texture_resolution: u32,
    #[serde(default = "default_foreground_ratio")]
    pub foreground_ratio: f64,
    #[serde(default = "default_remesh")]
    pub remesh: String,
}

fn default_stability_endpoint() -> String {
    "https://api.stability.ai/v2beta/3d/stable-fast-3d".to_string()
}
fn default_stability_client_id() -> String {
    "cultural-web-app".to_string()
}
fn default_texture_resolution() -> u32 {
    2048
}
fn default_foreground_ratio() -> f64 {
    0.85
}
fn default_remesh() -> String {
    "quad".to_string()
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            endpoint: default_stability_endpoint(),
            api_key: String::new(),
            client_id: default_stability_client_id(),
            texture_resolution: default_texture_resolution(),
            foreground_ratio: default_foreground_ratio(),
            remesh: default_remesh(),
        }
    }
}

/// Meshy image-URL-to-3D task API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshyConfig {
    #[serde(default = "default_meshy_endpoint")]
    pub endpoint: String,
    pub api_key: String,
    #[serde(default = "default_true")]
    pub enable_pbr: bool,
    #[serde(default = "default_true")]
    pub should_remesh: bool,
    #[serde(default = "default_true")]
    pub should_texture: bool,
}

fn default_meshy_endpoint() -> String {
    "https://api.meshy.ai/openapi/v1/image-to-3d".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for MeshyConfig {
    fn default() -> Self {
        Self {
            endpoint: default_meshy_endpoint(),
            api_key: String::new(),
            enable_pbr: true,
            should_remesh: true,
            should_texture: true,
        }
    }
}

/// Comet API proxy in front of a Gemini image model, used for restoration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CometConfig {
    #[serde(default = "default_comet_endpoint")]
    pub endpoint: String,
    pub api_key: String,
    #[serde(default = "default_comet_client_id")]
    pub client_id: String,
    #[serde(default = "default_comet_temperature")]
    pub temperature: f64,
    #[serde(default = "default_comet_top_p")]
    pub top_p: f64,
}

fn default_comet_endpoint() -> String {
    "https://api.cometapi.com/v1beta/models/gemini-2.5-flash-image-preview:generateContent"
        .to_string()
}
fn default_comet_client_id() -> String {
    "cultural-web-restoration".to_string()
}
fn default_comet_temperature() -> f64 {
    0.4
}
fn default_comet_top_p() -> f64 {
    0.8
}

impl Default for CometConfig {
    fn default() -> Self {
        Self {
            endpoint: default_comet_endpoint(),
            api_key: String::new(),
            client_id: default_comet_client_id(),
            temperature: default_comet_temperature(),
            top_p: default_comet_top_p(),
        }
    }
}

/// Phot.AI old-photo restoration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotAiConfig {
    #[serde(default = "default_photai_endpoint")]
    pub endpoint: String,
    pub api_key: String,
}

fn default_photai_endpoint() -> String {
    "https://prodapi.phot.ai/external/api/v3/user_activity/old-photos-restore-2k".to_string()
}

impl Default for PhotAiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_photai_endpoint(),
            api_key: String::new(),
        }
    }
}

/// Cloudinary object storage, used to give Phot.AI a public image URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudinaryConfig {
    #[serde(default = "default_cloudinary_base_url")]
    pub base_url: String,
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    #[serde(default = "default_cloudinary_folder")]
    pub folder: String,
}

fn default_cloudinary_base_url() -> String {
    "https://api.cloudinary.com/v1_1".to_string()
}
fn default_cloudinary_folder() -> String {
    "reconstructed_images".to_string()
}

impl Default for CloudinaryConfig {
    fn default() -> Self {
        Self {
            base_url: default_cloudinary_base_url(),
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            folder: default_cloudinary_folder(),
        }
    }
}

/// External collaborators. A missing section disables the routes that need it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default)]
    pub gemini: Option<GeminiConfig>,
    #[serde(default)]
    pub stability: Option<StabilityConfig>,
    #[serde(default)]
    pub meshy: Option<MeshyConfig>,
    #[serde(default)]
    pub comet: Option<CometConfig>,
    #[serde(default)]
    pub photai: Option<PhotAiConfig>,
    #[serde(default)]
    pub cloudinary: Option<CloudinaryConfig>,
}

/// Which service answers `/reconstruct`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RestorationBackend {
    #[default]
    Comet,
    PhotAi,
}

impl fmt::Display for RestorationBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestorationBackend::Comet => write!(f, "comet"),
            RestorationBackend::PhotAi => write!(f, "photai"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestorationConfig {
    #[serde(default)]
    pub backend: RestorationBackend,
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub restoration: RestorationConfig,
}

impl AppConfig {
    /// Replace every `${VAR}` secret with the value returned by `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnv`] when a referenced variable is unset.
    pub fn resolve_secrets<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let services = &mut self.services;
        let mut secrets: Vec<&mut String> = Vec::new();
        if let Some(gemini) = services.gemini.as_mut() {
            secrets.push(&mut gemini.api_key);
        }
        if let Some(stability) = services.stability.as_mut() {
            secrets.push(&mut stability.api_key);
        }
        if let Some(meshy) = services.meshy.as_mut() {
            secrets.push(&mut meshy.api_key);
        }
        if let Some(comet) = services.comet.as_mut() {
            secrets.push(&mut comet.api_key);
        }
        if let Some(photai) = services.photai.as_mut() {
            secrets.push(&mut photai.api_key);
        }
        if let Some(cloudinary) = services.cloudinary.as_mut() {
            secrets.push(&mut cloudinary.cloud_name);
            secrets.push(&mut cloudinary.api_key);
            secrets.push(&mut cloudinary.api_secret);
        }

        for secret in secrets {
            if let Some(name) = env_reference(secret) {
                let value = lookup(name).ok_or_else(|| ConfigError::MissingEnv(name.to_string()))?;
                *secret = value;
            }
        }
        Ok(())
    }
}

/// `${NAME}` -> `Some("NAME")`; anything else is a literal value.
fn env_reference(value: &str) -> Option<&str> {
    let name = value.trim().strip_prefix("${")?.strip_suffix('}')?.trim();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Parse, resolve secrets through `lookup`, and validate a YAML document.
///
/// # Errors
///
/// Returns [`ConfigError::Yaml`] when parsing fails, [`ConfigError::MissingEnv`]
/// when a secret reference cannot be resolved, or [`ConfigError::Validation`]
/// when semantic validation fails.
pub fn parse_config<F>(contents: &str, lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: AppConfig = serde_yaml::from_str(contents)?;
    config.resolve_secrets(lookup)?;
    validate_config(&config)?;
    Ok(config)
}

/// Load configuration from a YAML file, resolving secrets from the process
/// environment, and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, and otherwise the
/// errors of [`parse_config`].
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents, |name| std::env::var(name).ok())
}
