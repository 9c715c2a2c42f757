//! XDG-compliant path resolution for factcards.

use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};

const APP_DIR: &str = "factcards";

/// Directories factcards reads from.
#[derive(Debug, Clone)]
pub struct FactcardsPaths {
    /// `$XDG_CONFIG_HOME/factcards/`
    pub config_dir: PathBuf,
}

impl FactcardsPaths {
    /// Resolve directories from environment variables with standard fallbacks.
    pub fn resolve() -> ConfigResult<Self> {
        let home = std::env::var("HOME").ok().map(PathBuf::from);
        let xdg = std::env::var("XDG_CONFIG_HOME").ok().map(PathBuf::from);
        Self::from_env_values(home.as_deref(), xdg.as_deref())
    }

    fn from_env_values(home: Option<&Path>, xdg_config: Option<&Path>) -> ConfigResult<Self> {
        let base = match (xdg_config, home) {
            (Some(xdg), _) if xdg.is_absolute() => xdg.to_path_buf(),
            (_, Some(home)) => home.join(".config"),
            _ => return Err(ConfigError::NoHome),
        };
        Ok(Self {
            config_dir: base.join(APP_DIR),
        })
    }

    /// Path to the default config file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xdg_config_home_wins() {
        let paths =
            FactcardsPaths::from_env_values(Some(Path::new("/home/u")), Some(Path::new("/xdg")))
                .unwrap();
        assert_eq!(paths.config_file(), PathBuf::from("/xdg/factcards/config.toml"));
    }

    #[test]
    fn falls_back_to_home_dot_config() {
        let paths = FactcardsPaths::from_env_values(Some(Path::new("/home/u")), None).unwrap();
        assert_eq!(paths.config_dir, PathBuf::from("/home/u/.config/factcards"));

        // Relative XDG values are ignored.
        let paths =
            FactcardsPaths::from_env_values(Some(Path::new("/home/u")), Some(Path::new("rel")))
                .unwrap();
        assert_eq!(paths.config_dir, PathBuf::from("/home/u/.config/factcards"));
    }

    #[test]
    fn no_home_is_an_error() {
        assert!(matches!(
            FactcardsPaths::from_env_values(None, None),
            Err(ConfigError::NoHome)
        ));
    }
}
