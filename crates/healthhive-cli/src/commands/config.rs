use std::path::Path;

use healthhive_core::config::default_config_path;
use healthhive_core::util::normalize_text_option;
use healthhive_core::ClientConfig;

use crate::cli::ConfigCommands;
use crate::commands::common::Context;
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, context: &Context) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            api_base_url,
            access_token,
            timeout_secs,
        } => {
            let path = default_config_path()
                .ok_or_else(|| CliError::Config("Failed to resolve config directory".into()))?;
            run_config_init(&path, api_base_url, access_token, timeout_secs)
        }
        ConfigCommands::Show { json } => run_config_show(json, context),
    }
}

/// Merge explicit values into the config file at `path`, creating it if needed.
pub fn run_config_init(
    path: &Path,
    api_base_url: Option<String>,
    access_token: Option<String>,
    timeout_secs: Option<u64>,
) -> Result<(), CliError> {
    let config = apply_init_values(
        ClientConfig::load_from_path(path)?,
        api_base_url,
        access_token,
        timeout_secs,
    );
    config.save_to_path(path)?;

    println!("Saved config to {}", path.display());
    println!("API: {}", config.api_base_url);
    Ok(())
}

pub fn apply_init_values(
    mut config: ClientConfig,
    api_base_url: Option<String>,
    access_token: Option<String>,
    timeout_secs: Option<u64>,
) -> ClientConfig {
    if let Some(url) = normalize_text_option(api_base_url) {
        config.api_base_url = url;
    }
    if let Some(token) = normalize_text_option(access_token) {
        config.access_token = Some(token);
    }
    if let Some(timeout_secs) = timeout_secs {
        config.request_timeout_secs = timeout_secs;
    }
    config
}

fn run_config_show(as_json: bool, context: &Context) -> Result<(), CliError> {
    let mut shown = context.config.clone();
    if shown.access_token.is_some() {
        shown.access_token = Some("[REDACTED]".to_string());
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    let config_path = default_config_path()
        .map_or_else(|| "unavailable".to_string(), |path| path.display().to_string());
    println!("Config file: {config_path}");
    println!("API base URL: {}", shown.api_base_url);
    println!(
        "Access token: {}",
        shown.access_token.as_deref().unwrap_or("not set")
    );
    println!("Request timeout: {}s", shown.request_timeout_secs);
    println!("Database: {}", context.db_path.display());
    println!("Offline mode: {}", if context.offline { "on" } else { "off" });
    Ok(())
}
