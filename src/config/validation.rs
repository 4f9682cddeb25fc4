use super::{AppConfig, ConfigError, RestorationBackend};

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_server_config(config)?;
    validate_services(config)?;
    validate_restoration(config)?;
    validate_log_level(config)?;
    validate_prompts(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_server_config(config: &AppConfig) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.http_pool_max_idle_per_host == 0 {
        return Err(validation_err(
            "server.http_pool_max_idle_per_host must be greater than 0",
        ));
    }
    if server.timeout == 0 {
        return Err(validation_err("server.timeout must be greater than 0"));
    }
    if server.max_upload_bytes == 0 {
        return Err(validation_err(
            "server.max_upload_bytes must be greater than 0",
        ));
    }
    if server.outputs_dir.trim().is_empty() {
        return Err(validation_err("server.outputs_dir cannot be empty"));
    }
    if let Some(worker_threads) = server.runtime_worker_threads {
        if worker_threads == 0 {
            return Err(validation_err(
                "server.runtime_worker_threads must be greater than 0 when set",
            ));
        }
    }
    if let Some(max_blocking_threads) = server.runtime_max_blocking_threads {
        if max_blocking_threads == 0 {
            return Err(validation_err(
                "server.runtime_max_blocking_threads must be greater than 0 when set",
            ));
        }
    }
    if let Some(thread_stack_size_kb) = server.runtime_thread_stack_size_kb {
        if thread_stack_size_kb == 0 {
            return Err(validation_err(
                "server.runtime_thread_stack_size_kb must be greater than 0 when set",
            ));
        }
    }
    if let Some(proxy) = server.http_proxy.as_deref() {
        validate_http_url("server.http_proxy", proxy)?;
    }
    for origin in &server.cors_allowed_origins {
        validate_http_url("server.cors_allowed_origins", origin)?;
    }
    Ok(())
}

const VALID_TEXTURE_RESOLUTIONS: &[u32] = &[512, 1024, 2048];
const VALID_REMESH_MODES: &[&str] = &["none", "triangle", "quad"];

fn validate_services(config: &AppConfig) -> Result<(), ConfigError> {
    let services = &config.services;

    if let Some(gemini) = &services.gemini {
        validate_http_url("services.gemini.base_url", &gemini.base_url)?;
        validate_api_key("services.gemini.api_key", &gemini.api_key)?;
        if gemini.model.trim().is_empty() {
            return Err(validation_err("services.gemini.model cannot be empty"));
        }
        if !(0.0..=2.0).contains(&gemini.temperature) {
            return Err(validation_err(
                "services.gemini.temperature must be between 0 and 2",
            ));
        }
        if gemini.max_output_tokens == 0 {
            return Err(validation_err(
                "services.gemini.max_output_tokens must be greater than 0",
            ));
        }
    }

    if let Some(stability) = &services.stability {
        validate_http_url("services.stability.endpoint", &stability.endpoint)?;
        validate_api_key("services.stability.api_key", &stability.api_key)?;
        if !VALID_TEXTURE_RESOLUTIONS.contains(&stability.texture_resolution) {
            return Err(validation_err(format!(
                "services.stability.texture_resolution must be one of {VALID_TEXTURE_RESOLUTIONS:?}"
            )));
        }
        if !(stability.foreground_ratio > 0.0 && stability.foreground_ratio <= 1.0) {
            return Err(validation_err(
                "services.stability.foreground_ratio must be in (0, 1]",
            ));
        }
        if !VALID_REMESH_MODES.contains(&stability.remesh.as_str()) {
            return Err(validation_err(format!(
                "services.stability.remesh must be one of: {}",
                VALID_REMESH_MODES.join(", ")
            )));
        }
    }

    if let Some(meshy) = &services.meshy {
        validate_http_url("services.meshy.endpoint", &meshy.endpoint)?;
        validate_api_key("services.meshy.api_key", &meshy.api_key)?;
    }

    if let Some(comet) = &services.comet {
        validate_http_url("services.comet.endpoint", &comet.endpoint)?;
        validate_api_key("services.comet.api_key", &comet.api_key)?;
        if !(0.0..=2.0).contains(&comet.temperature) {
            return Err(validation_err(
                "services.comet.temperature must be between 0 and 2",
            ));
        }
        if !(0.0..=1.0).contains(&comet.top_p) {
            return Err(validation_err("services.comet.top_p must be between 0 and 1"));
        }
    }

    if let Some(photai) = &services.photai {
        validate_http_url("services.photai.endpoint", &photai.endpoint)?;
        validate_api_key("services.photai.api_key", &photai.api_key)?;
    }

    if let Some(cloudinary) = &services.cloudinary {
        validate_http_url("services.cloudinary.base_url", &cloudinary.base_url)?;
        validate_api_key("services.cloudinary.api_key", &cloudinary.api_key)?;
        validate_api_key("services.cloudinary.api_secret", &cloudinary.api_secret)?;
        if cloudinary.cloud_name.trim().is_empty()
            || !cloudinary
                .cloud_name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(validation_err(
                "services.cloudinary.cloud_name must be a non-empty identifier",
            ));
        }
        if cloudinary.folder.contains('&') || cloudinary.folder.contains('=') {
            return Err(validation_err(
                "services.cloudinary.folder cannot contain '&' or '='",
            ));
        }
    }

    Ok(())
}

fn validate_restoration(config: &AppConfig) -> Result<(), ConfigError> {
    if config.restoration.backend == RestorationBackend::PhotAi
        && config.services.photai.is_some()
        && config.services.cloudinary.is_none()
    {
        return Err(validation_err(
            "restoration.backend 'photai' requires services.cloudinary to host the uploaded image",
        ));
    }
    Ok(())
}

fn validate_api_key(field_name: &str, key: &str) -> Result<(), ConfigError> {
    if key.trim().is_empty() {
        return Err(validation_err(format!("{field_name} cannot be empty")));
    }
    Ok(())
}

fn validate_http_url(field_name: &str, value: &str) -> Result<(), ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(validation_err(format!("{field_name} cannot be empty")));
    }
    let parsed = url::Url::parse(value)
        .map_err(|err| validation_err(format!("{field_name} is not a valid URL: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(validation_err(format!(
            "{field_name} must use http:// or https://"
        )));
    }
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let valid_levels = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL", "DISABLED"];
    if !valid_levels.contains(&config.features.log_level.to_uppercase().as_str()) {
        return Err(validation_err(format!(
            "log_level must be one of {valid_levels:?}"
        )));
    }
    Ok(())
}

fn validate_prompts(config: &AppConfig) -> Result<(), ConfigError> {
    let features = &config.features;
    if let Some(ref tmpl) = features.climate_prompt_template {
        if !tmpl.contains("{artifact_name}") {
            return Err(validation_err(
                "climate_prompt_template must contain the {artifact_name} placeholder",
            ));
        }
    }
    for (name, prompt) in [
        ("analysis_prompt", &features.analysis_prompt),
        ("restoration_prompt", &features.restoration_prompt),
    ] {
        if prompt.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(validation_err(format!("{name} cannot be empty when set")));
        }
    }
    Ok(())
}
