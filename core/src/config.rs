use std::{env, fs, net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    /// Public origin of the web application; acceptance links point here.
    #[serde(default = "default_app_base_url")]
    pub app_base_url: String,
    #[serde(default)]
    pub mailer: MailerConfig,
}

/// Outbound email settings for invitation notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct MailerConfig {
    #[serde(default = "default_mailer_api_url")]
    pub api_url: String,
    /// When unset, invitations are logged instead of delivered.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_mailer_from_name")]
    pub from_name: String,
    #[serde(default = "default_mailer_from_email")]
    pub from_email: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            database_path: default_database_path(),
            database_max_connections: default_database_max_connections(),
            app_base_url: default_app_base_url(),
            mailer: MailerConfig::default(),
        }
    }
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            api_url: default_mailer_api_url(),
            api_key: None,
            from_name: default_mailer_from_name(),
            from_email: default_mailer_from_email(),
        }
    }
}

impl AppConfig {
    const CONFIG_ENV: &'static str = "ORGKIT_CONFIG_FILE";
    const BIND_ADDRESS_ENV: &'static str = "ORGKIT_BIND_ADDRESS";
    const DATABASE_PATH_ENV: &'static str = "ORGKIT_DATABASE_PATH";
    const DATABASE_MAX_CONNECTIONS_ENV: &'static str = "ORGKIT_DATABASE_MAX_CONNECTIONS";
    const APP_BASE_URL_ENV: &'static str = "ORGKIT_APP_BASE_URL";
    const MAILER_API_URL_ENV: &'static str = "ORGKIT_MAILER_API_URL";
    const MAILER_API_KEY_ENV: &'static str = "ORGKIT_MAILER_API_KEY";
    const MAILER_FROM_NAME_ENV: &'static str = "ORGKIT_MAILER_FROM_NAME";
    const MAILER_FROM_EMAIL_ENV: &'static str = "ORGKIT_MAILER_FROM_EMAIL";

    /// Load configuration from defaults layered with optional config files and
    /// environment variables.
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    pub fn load_with(config_path: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::resolve_config_path(config_path)? {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            config = Self::from_toml(&contents)
                .with_context(|| format!("invalid config file: {}", path.display()))?;
        }

        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(addr) = env::var(Self::BIND_ADDRESS_ENV) {
            self.bind_address = addr
                .parse()
                .with_context(|| format!("invalid {name}", name = Self::BIND_ADDRESS_ENV))?;
        }

        if let Ok(path) = env::var(Self::DATABASE_PATH_ENV) {
            self.database_path = path;
        }

        if let Ok(value) = env::var(Self::DATABASE_MAX_CONNECTIONS_ENV) {
            self.database_max_connections = value.trim().parse().with_context(|| {
                format!("invalid {name}", name = Self::DATABASE_MAX_CONNECTIONS_ENV)
            })?;
        }

        if let Ok(url) = env::var(Self::APP_BASE_URL_ENV) {
            self.app_base_url = url;
        }

        if let Ok(url) = env::var(Self::MAILER_API_URL_ENV) {
            self.mailer.api_url = url;
        }

        if let Ok(key) = env::var(Self::MAILER_API_KEY_ENV) {
            let key = key.trim().to_owned();
            self.mailer.api_key = (!key.is_empty()).then_some(key);
        }

        if let Ok(name) = env::var(Self::MAILER_FROM_NAME_ENV) {
            self.mailer.from_name = name;
        }

        if let Ok(email) = env::var(Self::MAILER_FROM_EMAIL_ENV) {
            self.mailer.from_email = email;
        }

        Ok(())
    }

    fn resolve_config_path(explicit: Option<PathBuf>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            return Self::validate_path(path);
        }

        if let Ok(path) = env::var(Self::CONFIG_ENV) {
            return Self::validate_path(PathBuf::from(path));
        }

        let mut candidates = vec![PathBuf::from("orgkit.toml")];
        if let Some(dir) = Self::default_config_dir() {
            candidates.push(dir.join("config.toml"));
        }

        Ok(candidates.into_iter().find(|candidate| candidate.exists()))
    }

    fn validate_path(path: PathBuf) -> Result<Option<PathBuf>> {
        if path.exists() {
            Ok(Some(path))
        } else {
            Err(anyhow!(
                "configuration file does not exist: {}",
                path.display()
            ))
        }
    }

    fn default_config_dir() -> Option<PathBuf> {
        env::var_os("HOME")
            .or_else(|| env::var_os("USERPROFILE"))
            .map(|home| PathBuf::from(home).join(".orgkit"))
    }
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_database_path() -> String {
    "./data/orgkit.db".to_owned()
}

fn default_database_max_connections() -> u32 {
    8
}

fn default_app_base_url() -> String {
    "http://localhost:3000".to_owned()
}

fn default_mailer_api_url() -> String {
    "https://api.resend.com/emails".to_owned()
}

fn default_mailer_from_name() -> String {
    "App".to_owned()
}

fn default_mailer_from_email() -> String {
    "noreply@example.com".to_owned()
}
