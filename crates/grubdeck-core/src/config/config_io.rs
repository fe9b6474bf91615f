//! Configuration loading and validation.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::InstallerConfig;

/// System-wide config consulted when no explicit path is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/grubdeck/config.toml";
const CONFIG_ENV: &str = "GRUBDECK_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {detail}", .path.display())]
    ReadFailed { path: PathBuf, detail: String },
    #[error("failed to parse config: {0}")]
    ParseFailed(String),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("failed to render config: {0}")]
    RenderFailed(String),
}

impl InstallerConfig {
    /// Load configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|err| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            detail: err.to_string(),
        })?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration text.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: InstallerConfig =
            toml::from_str(contents).map_err(|err| ConfigError::ParseFailed(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from $GRUBDECK_CONFIG, then the system path, then built-in defaults.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_config_path() {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Config file that `load_default` would read, if any.
    pub fn default_config_path() -> Option<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_ENV).filter(|value| !value.is_empty()) {
            return Some(PathBuf::from(path));
        }
        let system = PathBuf::from(DEFAULT_CONFIG_PATH);
        system.is_file().then_some(system)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|err| ConfigError::RenderFailed(err.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let key = self.theme.key.trim();
        if key.is_empty() || key.contains('=') || key.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid(format!(
                "theme.key {:?} is not a valid assignment key",
                self.theme.key
            )));
        }
        if !is_single_component(&self.theme.asset_file) {
            return Err(ConfigError::Invalid(format!(
                "theme.asset_file {:?} must be a plain file name",
                self.theme.asset_file
            )));
        }
        if !is_single_component(&self.theme.asset_subdir) {
            return Err(ConfigError::Invalid(format!(
                "theme.asset_subdir {:?} must be a plain directory name",
                self.theme.asset_subdir
            )));
        }
        if self.fetch.command.first().map_or(true, |program| program.is_empty()) {
            return Err(ConfigError::Invalid("fetch.command is empty".to_string()));
        }
        if let Some(entry) = self.regen.iter().find(|entry| entry.program.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "regen entry with args {:?} has no program",
                entry.args
            )));
        }
        if self.paths.staging_dir.parent().is_none() {
            return Err(ConfigError::Invalid(
                "paths.staging_dir must not be the filesystem root".to_string(),
            ));
        }
        Ok(())
    }
}

fn is_single_component(value: &str) -> bool {
    !value.is_empty() && value != "." && value != ".." && !value.contains('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RegenCommand;

    #[test]
    fn empty_file_yields_defaults() {
        let config = InstallerConfig::from_toml("").unwrap();
        assert_eq!(config, InstallerConfig::default());
        assert_eq!(config.theme.key, "GRUB_THEME");
        assert_eq!(config.regen.len(), 4);
        assert_eq!(config.regen[0].program, "update-grub");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = InstallerConfig::from_toml(
            r#"
[paths]
themes_root = "/tmp/themes"

[[regen]]
program = "grub-mkconfig"
args = ["-o", "/boot/grub/grub.cfg"]
when_exists = "/boot/grub"
"#,
        )
        .unwrap();
        assert_eq!(config.paths.themes_root, PathBuf::from("/tmp/themes"));
        assert_eq!(config.paths.boot_config, PathBuf::from("/etc/default/grub"));
        assert_eq!(
            config.regen,
            vec![RegenCommand::new("grub-mkconfig", &["-o", "/boot/grub/grub.cfg"])
                .when_exists("/boot/grub")]
        );
        assert_eq!(
            config.theme_asset_path("nord"),
            PathBuf::from("/tmp/themes/nord/theme.txt")
        );
    }

    #[test]
    fn rejects_unusable_values() {
        let bad_key = InstallerConfig::from_toml("[theme]\nkey = \"A=B\"\n");
        assert!(matches!(bad_key, Err(ConfigError::Invalid(_))));

        let bad_fetch = InstallerConfig::from_toml("[fetch]\ncommand = []\n");
        assert!(matches!(bad_fetch, Err(ConfigError::Invalid(_))));

        let bad_asset = InstallerConfig::from_toml("[theme]\nasset_file = \"../theme.txt\"\n");
        assert!(matches!(bad_asset, Err(ConfigError::Invalid(_))));

        let garbage = InstallerConfig::from_toml("paths = 3");
        assert!(matches!(garbage, Err(ConfigError::ParseFailed(_))));
    }

    #[test]
    fn rendered_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = InstallerConfig::default();
        fs::write(&path, config.to_toml().unwrap()).unwrap();
        assert_eq!(InstallerConfig::load_from_path(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = InstallerConfig::load_from_path(Path::new("/nonexistent/grubdeck.toml"))
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/grubdeck.toml"));
    }
}
