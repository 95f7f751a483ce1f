use crate::export::naming::DEFAULT_ACTION_CODE;
use crate::library::LibraryStore;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "fusionforms.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub library: LibrarySection,
    #[serde(default)]
    pub import: ImportSection,
    #[serde(default)]
    pub export: ExportSection,
    /// Directory the config was read from; library paths resolve against it.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
pub struct LibrarySection {
    #[serde(default)]
    pub properties: Option<PathBuf>,
    #[serde(default)]
    pub action_codes: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImportSection {
    #[serde(default)]
    pub fallback_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportSection {
    #[serde(default = "default_action_code")]
    pub default_action_code: String,
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            default_action_code: default_action_code(),
        }
    }
}

fn default_action_code() -> String {
    DEFAULT_ACTION_CODE.to_string()
}

impl Config {
    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Loads `path` when given, else `fusionforms.toml` in the working
    /// directory if there is one, else the defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let local = Path::new(CONFIG_FILE_NAME);
                if local.is_file() {
                    Self::load(local)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn resolve(&self, path: &Option<PathBuf>) -> Option<PathBuf> {
        path.as_ref().map(|p| self.base_dir.join(p))
    }

    pub fn library_store(&self) -> LibraryStore {
        LibraryStore::new(
            self.resolve(&self.library.properties),
            self.resolve(&self.library.action_codes),
        )
    }

    pub fn fallback_name<'a>(&'a self, file_stem: &'a str) -> &'a str {
        self.import.fallback_name.as_deref().unwrap_or(file_stem)
    }
}
