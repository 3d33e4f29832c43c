use std::fs;
use std::io::{Read as _, Write as _};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "LINKTRACK_CONFIG";

pub const DEFAULT_PATH: &str = "localhost:3006/gql";
pub const DEFAULT_PACKAGE: &str = "@l4legenda/vscode-deep-extension";

/// User settings, stored as TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Store endpoint without scheme, e.g. `localhost:3006/gql`.
    pub path: String,
    /// Use TLS when talking to the store.
    pub ssl: bool,
    /// Project name; the working directory's name when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Package holding the tracker's link types.
    pub package: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            ssl: false,
            project: None,
            package: DEFAULT_PACKAGE.to_string(),
        }
    }
}

impl Settings {
    /// `$LINKTRACK_CONFIG`, else `<config dir>/linktrack/config.toml`.
    pub fn default_location() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        dirs::config_dir().map(|d| d.join("linktrack").join("config.toml"))
    }

    /// Load settings; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let mut file = match fs::File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(file = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(CoreError::Io(e)),
        };
        fs2::FileExt::lock_shared(&file).map_err(CoreError::Io)?;
        let mut data = String::new();
        file.read_to_string(&mut data)?;
        fs2::FileExt::unlock(&file).map_err(CoreError::Io)?;
        toml::from_str(&data)
            .map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))
    }

    /// Write settings under an exclusive lock, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self)
            .map_err(|e| CoreError::Config(format!("Failed to serialize settings: {e}")))?;
        let file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        fs2::FileExt::lock_exclusive(&file).map_err(CoreError::Io)?;
        (&file).write_all(text.as_bytes())?;
        fs2::FileExt::unlock(&file).map_err(CoreError::Io)?;
        Ok(())
    }

    /// Full endpoint URL. A `path` that already carries a scheme is kept as is.
    pub fn endpoint(&self) -> String {
        if self.path.contains("://") {
            return self.path.clone();
        }
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{scheme}://{}", self.path)
    }

    /// Interpret a user-typed TLS flag: only `true` (any case) enables it.
    pub fn parse_ssl(input: &str) -> bool {
        input.trim().eq_ignore_ascii_case("true")
    }
}
