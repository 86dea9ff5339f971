// Settings for the credential core
use crate::error::{CredsError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_STS_REGION: &str = "us-east-1";
pub const DEFAULT_SESSION_DURATION_SECONDS: i32 = 3600;
pub const DEFAULT_SESSION_NAME_PREFIX: &str = "prx-aws-creds-session";
pub const DEFAULT_LOGIN_COMMAND: &str = "aws";

/// Explicit configuration handed to the profile resolver and credential
/// manager. Nothing in the core reads ambient state after this is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub aws_config_file: PathBuf,
    pub sso_cache_dir: PathBuf,
    pub credential_cache_dir: PathBuf,
    pub sts_region: String,
    pub session_duration_seconds: i32,
    pub session_name_prefix: String,
    pub login_command: String,
}

/// Optional overrides read from the settings TOML file
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct FileSettings {
    pub aws_config_file: Option<PathBuf>,
    pub sso_cache_dir: Option<PathBuf>,
    pub credential_cache_dir: Option<PathBuf>,
    pub sts_region: Option<String>,
    pub session_duration_seconds: Option<i32>,
    pub session_name_prefix: Option<String>,
    pub login_command: Option<String>,
}

impl Settings {
    /// Defaults rooted at the given home directory
    pub fn with_home(home: &Path) -> Self {
        let aws_dir = home.join(".aws");
        Self {
            aws_config_file: aws_dir.join("config"),
            sso_cache_dir: aws_dir.join("sso").join("cache"),
            credential_cache_dir: aws_dir.join("ruby").join("cache"),
            sts_region: DEFAULT_STS_REGION.to_string(),
            session_duration_seconds: DEFAULT_SESSION_DURATION_SECONDS,
            session_name_prefix: DEFAULT_SESSION_NAME_PREFIX.to_string(),
            login_command: DEFAULT_LOGIN_COMMAND.to_string(),
        }
    }

    /// Get the settings directory path
    ///
    /// Priority:
    /// 1. XDG_CONFIG_HOME/prx-aws-creds (if env var is set)
    /// 2. ~/.config/prx-aws-creds (if ~/.config exists)
    /// 3. ~/.prx-aws-creds
    pub fn settings_dir() -> Result<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            return Ok(PathBuf::from(xdg_config).join("prx-aws-creds"));
        }

        let home_dir = home_dir()?;
        let xdg_config = home_dir.join(".config");
        if xdg_config.exists() {
            return Ok(xdg_config.join("prx-aws-creds"));
        }

        Ok(home_dir.join(".prx-aws-creds"))
    }

    pub fn settings_file_path() -> Result<PathBuf> {
        Ok(Self::settings_dir()?.join("config.toml"))
    }

    /// Load settings from defaults, the settings file and environment variables
    pub fn load() -> Result<Self> {
        let mut settings = Self::with_home(&home_dir()?);

        let settings_path = Self::settings_file_path()?;
        if let Some(file) = FileSettings::read(&settings_path)? {
            settings.apply_file(file);
        }

        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn apply_file(&mut self, file: FileSettings) {
        if let Some(path) = file.aws_config_file {
            self.aws_config_file = path;
        }
        if let Some(path) = file.sso_cache_dir {
            self.sso_cache_dir = path;
        }
        if let Some(path) = file.credential_cache_dir {
            self.credential_cache_dir = path;
        }
        if let Some(region) = file.sts_region {
            self.sts_region = region;
        }
        if let Some(duration) = file.session_duration_seconds {
            self.session_duration_seconds = duration;
        }
        if let Some(prefix) = file.session_name_prefix {
            self.session_name_prefix = prefix;
        }
        if let Some(command) = file.login_command {
            self.login_command = command;
        }
    }

    /// Override with environment variables, read through `lookup` so tests
    /// don't have to mutate the process environment
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("AWS_CONFIG_FILE").filter(|v| !v.is_empty()) {
            tracing::debug!("Using AWS_CONFIG_FILE from environment: {}", path);
            self.aws_config_file = PathBuf::from(path);
        }

        if let Some(path) = lookup("PRX_AWS_CREDS_CACHE_DIR").filter(|v| !v.is_empty()) {
            tracing::debug!("Using PRX_AWS_CREDS_CACHE_DIR from environment: {}", path);
            self.credential_cache_dir = PathBuf::from(path);
        }
    }
}

impl FileSettings {
    /// Read the TOML settings file; a missing file is not an error
    pub fn read(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            tracing::debug!("Settings file not found at {}, using defaults", path.display());
            return Ok(None);
        }

        tracing::debug!("Loading settings from: {}", path.display());
        let contents = fs::read_to_string(path)
            .map_err(|e| CredsError::Config(format!("Failed to read settings file: {}", e)))?;

        toml::from_str(&contents)
            .map(Some)
            .map_err(|e| CredsError::Config(format!("Failed to parse settings file: {}", e)))
    }
}

fn home_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .ok_or_else(|| CredsError::Config("Could not determine home directory".to_string()))
}
