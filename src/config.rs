//! Layered runtime settings.
//!
//! Sources, lowest precedence first: built-in defaults, a TOML file
//! (`dronitor.toml` in the working directory, or the file given with
//! `--config`), then `DRONITOR_*` environment variables. CLI flags are
//! applied on top by the command layer.

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{DronitorError, Result};
use crate::readers::LinePolicy;
use crate::utils::constants::{
    DEFAULT_CONFIG_FILE, DEFAULT_DATABASE_PATH, DEFAULT_HOST, DEFAULT_MAX_UPLOAD_BYTES,
    DEFAULT_PORT, ENV_PREFIX,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// SQLite database file
    pub database_path: PathBuf,

    pub host: String,

    pub port: u16,

    /// Accepted values of the `X-API-Key` header
    #[serde(default)]
    pub api_keys: Vec<String>,

    pub line_policy: LinePolicy,

    pub max_upload_bytes: usize,
}

impl Settings {
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        Self::load_with_env(config_file, None)
    }

    /// Like [`Settings::load`], reading environment overrides from `env`
    /// instead of the process environment when given.
    pub fn load_with_env(
        config_file: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let builder = Config::builder()
            .set_default("database_path", DEFAULT_DATABASE_PATH)?
            .set_default("host", DEFAULT_HOST)?
            .set_default("port", i64::from(DEFAULT_PORT))?
            .set_default("api_keys", Vec::<String>::new())?
            .set_default("line_policy", "lenient")?
            .set_default("max_upload_bytes", DEFAULT_MAX_UPLOAD_BYTES as i64)?;

        let builder = match config_file {
            Some(path) => builder.add_source(File::from(path).format(FileFormat::Toml)),
            None => builder.add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false)),
        };

        let builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("api_keys")
                .source(env),
        );

        let mut settings: Settings = builder.build()?.try_deserialize()?;
        settings.api_keys = settings
            .api_keys
            .into_iter()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .collect();

        debug!(
            "Loaded settings: database={}, bind={}:{}, {} api keys, {:?} line policy",
            settings.database_path.display(),
            settings.host,
            settings.port,
            settings.api_keys.len(),
            settings.line_policy
        );
        Ok(settings)
    }

    /// Checks that only matter once the HTTP surface is exposed.
    pub fn validate_for_serving(&self) -> Result<()> {
        if self.api_keys.is_empty() {
            return Err(DronitorError::Server(
                "no API keys configured; set api_keys or DRONITOR_API_KEYS".to_string(),
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(DronitorError::Server(
                "max_upload_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            api_keys: Vec::new(),
            line_policy: LinePolicy::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}
