//! Configuration file loading for model-collab
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `COLLAB_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./collab.toml` or `./.collab.toml`
//! 4. Global: `$XDG_CONFIG_HOME/model-collab/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigError, ConfigIssue, FileCacheConfig, FileConfig, FileLoggingConfig, FileProviderConfig,
    FileServerConfig, FileStrategyConfig, FileSynthesisConfig,
};
pub use loader::{ConfigLoader, ENV_PREFIX, PROJECT_FILES};
