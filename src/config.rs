use crate::error::AppError;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

pub const SERVICE_NAME: &str = "sources-admin";
pub const ENV_PREFIX: &str = "SOURCES_ADMIN";
const QUALIFIER: &str = "io";
const ORGANIZATION: &str = "danmu";

pub fn normalize_provider_name(provider: &str) -> String {
    provider.trim().to_string()
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, SERVICE_NAME)
}

fn app_home_dir() -> Result<PathBuf, AppError> {
    if let Ok(custom) = std::env::var("SOURCES_ADMIN_HOME") {
        return Ok(PathBuf::from(custom));
    }

    if let Some(dirs) = project_dirs() {
        let candidate = dirs.data_local_dir().to_path_buf();
        if fs::create_dir_all(&candidate).is_ok() {
            return Ok(candidate);
        }
    }

    let cwd = std::env::current_dir()?;
    Ok(cwd.join(".sources-admin"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub api_prefix: String,
    pub request_timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub log_filter: String,
    /// Extra key substrings that get a multi-line input in the config form.
    pub extra_multiline_markers: Vec<String>,
    /// Extra provider name -> instructional note shown above its config form.
    pub extra_notes: BTreeMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:7768".into(),
            api_prefix: "/api/ui".into(),
            request_timeout_seconds: 30,
            connect_timeout_seconds: 10,
            log_filter: "info".into(),
            extra_multiline_markers: vec![],
            extra_notes: BTreeMap::new(),
        }
    }
}

pub fn config_dir() -> Result<PathBuf, AppError> {
    Ok(app_home_dir()?.join("config"))
}

pub fn data_dir() -> Result<PathBuf, AppError> {
    Ok(app_home_dir()?.join("data"))
}

pub fn log_dir() -> Result<PathBuf, AppError> {
    Ok(data_dir()?.join("logs"))
}

pub fn config_path() -> Result<PathBuf, AppError> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn ensure_dirs() -> Result<(), AppError> {
    fs::create_dir_all(config_dir()?)?;
    fs::create_dir_all(log_dir()?)?;
    Ok(())
}

/// Validates an API base URL and strips any trailing slash so paths can be
/// appended verbatim.
pub fn normalize_base_url(raw: &str) -> Result<String, AppError> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed)?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::Config(format!(
            "API base URL must use http or https, got '{}'.",
            parsed.scheme()
        )));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

pub fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

fn normalize_config(config: &mut AppConfig) -> Result<bool, AppError> {
    let mut changed = false;

    let base = normalize_base_url(&config.api_base_url)?;
    if base != config.api_base_url {
        config.api_base_url = base;
        changed = true;
    }

    let prefix = normalize_prefix(&config.api_prefix);
    if prefix != config.api_prefix {
        config.api_prefix = prefix;
        changed = true;
    }

    if config.request_timeout_seconds == 0 {
        config.request_timeout_seconds = AppConfig::default().request_timeout_seconds;
        changed = true;
    }
    if config.connect_timeout_seconds == 0 {
        config.connect_timeout_seconds = AppConfig::default().connect_timeout_seconds;
        changed = true;
    }

    Ok(changed)
}

/// Defaults, then the TOML file (if any), then `<env_prefix>_*` variables.
fn load_layered(path: &Path, env_prefix: &str) -> Result<(AppConfig, bool), AppError> {
    let settings = config::Config::builder()
        .add_source(config::Config::try_from(&AppConfig::default())?)
        .add_source(
            config::File::from(path)
                .format(config::FileFormat::Toml)
                .required(false),
        )
        .add_source(config::Environment::with_prefix(env_prefix).try_parsing(true))
        .build()?;

    let mut parsed: AppConfig = settings.try_deserialize()?;
    let changed = normalize_config(&mut parsed)?;
    Ok((parsed, changed))
}

pub fn load_config() -> Result<AppConfig, AppError> {
    let path = config_path()?;
    let (parsed, normalized) = load_layered(&path, ENV_PREFIX)?;

    // Only rewrite a file that exists; env overrides never reach disk.
    if normalized && path.exists() {
        let on_disk = fs::read_to_string(&path)?;
        if let Ok(mut file_cfg) = toml::from_str::<AppConfig>(&on_disk) {
            if normalize_config(&mut file_cfg)? {
                save_config(&file_cfg)?;
            }
        }
    }

    Ok(parsed)
}

pub fn save_config(config: &AppConfig) -> Result<(), AppError> {
    ensure_dirs()?;
    let path = config_path()?;
    let raw = toml::to_string_pretty(config)?;
    fs::write(path, raw)?;
    Ok(())
}

pub fn ensure_initialized() -> Result<(), AppError> {
    ensure_dirs()?;
    let cfg_path = config_path()?;
    if !Path::new(&cfg_path).exists() {
        save_config(&AppConfig::default())?;
    }
    Ok(())
}
