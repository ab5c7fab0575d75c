use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::torrent::{DEFAULT_ID_PATTERN, TorrentIdPattern, TorrentIdPatternError};

pub const LIBRARY_DIR_ENV: &str = "STRMCTL_LIBRARY_DIR";
pub const LISTEN_ENV: &str = "STRMCTL_LISTEN";

const INDEX_FILE_NAME: &str = "processed_paths.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("{0} contains invalid toml: {1}")]
    Toml(PathBuf, #[source] toml::de::Error),
    #[error("invalid listen address {0:?}: {1}")]
    Listen(String, #[source] std::net::AddrParseError),
    #[error(transparent)]
    IdPattern(#[from] TorrentIdPatternError),
}

/// On-disk shape of the config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    library_dir: Option<PathBuf>,
    index_file: Option<PathBuf>,
    log_file: Option<PathBuf>,
    listen: Option<String>,
    id_pattern: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub library_dir: PathBuf,
    pub index_file: PathBuf,
    pub log_file: PathBuf,
    pub listen: SocketAddr,
    pub id_pattern: TorrentIdPattern,
}

impl Config {
    /// Loads the config at `path`. A missing file yields the defaults. Environment overrides
    /// are applied on top of whatever the file says.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str::<RawConfig>(&contents)
                .map_err(|e| ConfigError::Toml(path.to_path_buf(), e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RawConfig::default(),
            Err(e) => return Err(ConfigError::Read(path.to_path_buf(), e)),
        };
        Self::from_raw(
            raw,
            std::env::var_os(LIBRARY_DIR_ENV).map(PathBuf::from),
            std::env::var(LISTEN_ENV).ok(),
        )
    }

    fn from_raw(
        raw: RawConfig,
        library_dir_override: Option<PathBuf>,
        listen_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let library_dir = library_dir_override
            .or(raw.library_dir)
            .unwrap_or_else(|| PathBuf::from("Library"));
        let index_file = raw
            .index_file
            .unwrap_or_else(|| library_dir.join(INDEX_FILE_NAME));
        let log_file = raw
            .log_file
            .unwrap_or_else(|| PathBuf::from("logs").join("strm.log"));
        let listen = listen_override
            .or(raw.listen)
            .unwrap_or_else(|| "0.0.0.0:5001".to_owned());
        let listen = listen
            .parse()
            .map_err(|e| ConfigError::Listen(listen.clone(), e))?;
        let id_pattern =
            TorrentIdPattern::new(raw.id_pattern.as_deref().unwrap_or(DEFAULT_ID_PATTERN))?;

        Ok(Self {
            library_dir,
            index_file,
            log_file,
            listen,
            id_pattern,
        })
    }
}
