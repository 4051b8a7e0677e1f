//! Config command handler

use crate::application::ports::ConfigStore;
use crate::domain::config::{AppConfig, SubmitMode};
use crate::domain::error::ConfigError;

use super::args::{is_valid_config_key, ConfigAction, FORM_KEY_PREFIX, VALID_CONFIG_KEYS};
use super::presenter::Presenter;

const NOT_SET: &str = "(not set)";

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter).await,
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value).await,
        ConfigAction::Get { key } => handle_get(store, presenter, &key).await,
        ConfigAction::List => handle_list(store, presenter).await,
        ConfigAction::Path => handle_path(store, presenter),
    }
}

async fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init().await?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

async fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;

    let mut config = store.load().await?;
    apply_value(&mut config, key, value)?;

    store.save(&config).await?;
    presenter.success(&format!("{} = {}", key, value));

    Ok(())
}

async fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;

    let config = store.load().await?;
    match config_value(&config, key) {
        Some(v) => presenter.output(&v),
        None => presenter.output(NOT_SET),
    }

    Ok(())
}

async fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load().await?;

    for key in VALID_CONFIG_KEYS {
        presenter.key_value(
            key,
            config_value(&config, key).as_deref().unwrap_or(NOT_SET),
        );
    }
    for (name, value) in config.form.iter().flatten() {
        presenter.key_value(&format!("{}{}", FORM_KEY_PREFIX, name), value);
    }

    Ok(())
}

fn handle_path<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    presenter.output(&store.path().to_string_lossy());
    Ok(())
}

fn check_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_config_key(key) {
        return Ok(());
    }
    Err(ConfigError::ValidationError {
        key: key.to_string(),
        message: format!(
            "Unknown key. Valid keys: {}, {}<name>",
            VALID_CONFIG_KEYS.join(", "),
            FORM_KEY_PREFIX
        ),
    })
}

/// Validate `value` for `key` and store it in `config`
fn apply_value(config: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = |message: String| ConfigError::ValidationError {
        key: key.to_string(),
        message,
    };
    let boolean = || parse_bool(value).map_err(|_| invalid("Value must be 'true' or 'false'".into()));

    if let Some(name) = key.strip_prefix(FORM_KEY_PREFIX) {
        config
            .form
            .get_or_insert_with(Default::default)
            .insert(name.trim().to_string(), value.to_string());
        return Ok(());
    }

    match key {
        "endpoint" => {
            reqwest::Url::parse(value).map_err(|e| invalid(e.to_string()))?;
            config.endpoint = Some(value.to_string());
        }
        "context_name" => config.context_name = Some(value.to_string()),
        "submit_mode" => {
            let mode = value
                .parse::<SubmitMode>()
                .map_err(|e| invalid(e.to_string()))?;
            config.submit_mode = Some(mode.to_string());
        }
        "formats" => {
            let formats = parse_list(value);
            if formats.is_empty() {
                return Err(invalid("At least one MIME type is required".into()));
            }
            config.formats = Some(formats);
        }
        "timeslice_ms" => {
            let ms = value
                .trim()
                .parse::<u64>()
                .map_err(|_| invalid("Value must be a whole number of milliseconds".into()))?;
            config.timeslice_ms = Some(ms);
        }
        "download" => config.download = Some(boolean()?),
        "download_dir" => config.download_dir = Some(value.to_string()),
        "file_field" | "marker_field" => {
            if value.trim().is_empty() {
                return Err(invalid("Field name must not be empty".into()));
            }
            if key == "file_field" {
                config.file_field = Some(value.trim().to_string());
            } else {
                config.marker_field = Some(value.trim().to_string());
            }
        }
        "microphone" => config.microphone = Some(boolean()?),
        "system_audio" => config.system_audio = Some(boolean()?),
        "device_id" => config.device_id = Some(value.to_string()),
        "warn_discarded_video" => config.warn_discarded_video = Some(boolean()?),
        _ => unreachable!(), // Already validated
    }
    Ok(())
}

/// Display value of `key`, `None` when unset
fn config_value(config: &AppConfig, key: &str) -> Option<String> {
    if let Some(name) = key.strip_prefix(FORM_KEY_PREFIX) {
        return config.form.as_ref().and_then(|f| f.get(name.trim()).cloned());
    }

    let flag = |b: Option<bool>| b.map(|b| b.to_string());
    match key {
        "endpoint" => config.endpoint.clone(),
        "context_name" => config.context_name.clone(),
        "submit_mode" => config.submit_mode.clone(),
        "formats" => config.formats.as_ref().map(|f| f.join(", ")),
        "timeslice_ms" => config.timeslice_ms.map(|ms| ms.to_string()),
        "download" => flag(config.download),
        "download_dir" => config.download_dir.clone(),
        "file_field" => config.file_field.clone(),
        "marker_field" => config.marker_field.clone(),
        "microphone" => flag(config.microphone),
        "system_audio" => flag(config.system_audio),
        "device_id" => config.device_id.clone(),
        "warn_discarded_video" => flag(config.warn_discarded_video),
        _ => None,
    }
}

/// Parse a boolean value
fn parse_bool(value: &str) -> Result<bool, ()> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(()),
    }
}

/// Comma-separated list, blanks dropped
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
