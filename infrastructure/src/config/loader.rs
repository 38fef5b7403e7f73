//! Configuration file loader with multi-source merging

use super::file_config::{ConfigError, FileConfig};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Project-level file names, checked in order; the first one found wins.
pub const PROJECT_FILES: [&str; 2] = ["collab.toml", ".collab.toml"];

/// Prefix of environment overrides, e.g. `COLLAB_SERVER__QUEUE_CAPACITY=50`.
pub const ENV_PREFIX: &str = "COLLAB_";

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `COLLAB_*` environment variables (`__` separates sections)
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./collab.toml` or `./.collab.toml`
    /// 4. Global: `$XDG_CONFIG_HOME/model-collab/config.toml`
    /// 5. Default values
    ///
    /// The merged result is validated; every issue is reported at once.
    pub fn load(config_path: Option<&Path>) -> Result<FileConfig, ConfigError> {
        Self::load_from(
            Self::global_config_path().as_deref(),
            Path::new("."),
            config_path,
        )
    }

    /// [`load`](Self::load) with explicit global path and project directory.
    pub fn load_from(
        global_path: Option<&Path>,
        project_dir: &Path,
        config_path: Option<&Path>,
    ) -> Result<FileConfig, ConfigError> {
        let config: FileConfig = Self::figment(global_path, project_dir, config_path)
            .extract()
            .map_err(Box::new)?;
        config.check()?;
        Ok(config)
    }

    fn figment(
        global_path: Option<&Path>,
        project_dir: &Path,
        config_path: Option<&Path>,
    ) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(global) = global_path
            && global.exists()
        {
            debug!(path = %global.display(), "Merging global config");
            figment = figment.merge(Toml::file(global));
        }

        if let Some(project) = Self::project_config_path_in(project_dir) {
            debug!(path = %project.display(), "Merging project config");
            figment = figment.merge(Toml::file(project));
        }

        if let Some(path) = config_path {
            debug!(path = %path.display(), "Merging explicit config");
            // A missing explicit file is an error, not a silent no-op.
            figment = figment.merge(Toml::file_exact(path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// `$XDG_CONFIG_HOME/model-collab/config.toml`, falling back to
    /// the platform config directory.
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("model-collab").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        Self::project_config_path_in(Path::new("."))
    }

    fn project_config_path_in(dir: &Path) -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }

    /// Describe the config file locations being used (for `--show-config`).
    pub fn describe_sources(config_path: Option<&Path>) -> Vec<String> {
        let mark = |found: bool| if found { "[FOUND]" } else { "[     ]" };
        let mut lines = vec!["Configuration sources (in priority order):".to_string()];

        lines.push(format!("  [ENV  ] Environment: {}*", ENV_PREFIX));
        if let Some(path) = config_path {
            lines.push(format!(
                "  {} Explicit: {}",
                mark(path.exists()),
                path.display()
            ));
        }
        match Self::project_config_path() {
            Some(path) => lines.push(format!("  {} Project: {}", mark(true), path.display())),
            None => lines.push(format!(
                "  {} Project: ./{} or ./{}",
                mark(false),
                PROJECT_FILES[0],
                PROJECT_FILES[1]
            )),
        }
        if let Some(path) = Self::global_config_path() {
            lines.push(format!(
                "  {} Global:  {}",
                mark(path.exists()),
                path.display()
            ));
        }
        lines.push("  [     ] Default: built-in defaults".to_string());
        lines
    }
}
