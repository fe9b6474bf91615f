//! Configuration types and defaults for GrubDeck.
//!
//! Every system path and external command the pipeline touches is declared
//! here so tests can point the worker at scratch directories and fake tools.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from config.toml.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct InstallerConfig {
    pub general: GeneralConfig,
    pub paths: PathsConfig,
    pub theme: ThemeConfig,
    pub fetch: FetchConfig,
    pub elevation: ElevationConfig,
    /// Regeneration candidates, tried in order.
    pub regen: Vec<RegenCommand>,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            paths: PathsConfig::default(),
            theme: ThemeConfig::default(),
            fetch: FetchConfig::default(),
            elevation: ElevationConfig::default(),
            regen: RegenCommand::defaults(),
        }
    }
}

impl InstallerConfig {
    /// Final install location for a theme.
    pub fn theme_dir(&self, theme_name: &str) -> PathBuf {
        self.paths.themes_root.join(theme_name)
    }

    /// Value written to the theme key of the boot configuration.
    pub fn theme_asset_path(&self, theme_name: &str) -> PathBuf {
        self.theme_dir(theme_name).join(&self.theme.asset_file)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub themes_root: PathBuf,
    pub boot_config: PathBuf,
    /// Snapshot written before the boot configuration is rewritten.
    pub backup: Option<PathBuf>,
    /// Recreated with mode 0700 for every run; keep it out of world-writable directories.
    pub staging_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            themes_root: PathBuf::from("/boot/grub/themes"),
            boot_config: PathBuf::from("/etc/default/grub"),
            backup: Some(PathBuf::from("/etc/default/grub.bak")),
            staging_dir: PathBuf::from("/var/cache/grubdeck/staging"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ThemeConfig {
    /// Boot configuration key that selects the theme.
    pub key: String,
    /// Subdirectory of a fetched repository that holds the theme assets.
    pub asset_subdir: String,
    /// Theme descriptor file the boot configuration points at.
    pub asset_file: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            key: "GRUB_THEME".to_string(),
            asset_subdir: "theme".to_string(),
            asset_file: "theme.txt".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    /// Program and leading arguments; the source and staging path are appended.
    pub command: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            command: ["git", "clone", "--depth=1"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ElevationConfig {
    /// Program used to run the worker with root privileges; empty disables elevation.
    pub program: Option<String>,
    /// Spawn the worker directly when the caller is already root.
    pub skip_when_root: bool,
    /// Explicit worker binary; resolved next to the caller or on PATH otherwise.
    pub worker_path: Option<PathBuf>,
    /// Config file forwarded to the worker with `--config`.
    pub worker_config: Option<PathBuf>,
}

impl Default for ElevationConfig {
    fn default() -> Self {
        Self {
            program: Some("pkexec".to_string()),
            skip_when_root: true,
            worker_path: None,
            worker_config: None,
        }
    }
}

/// One external command able to regenerate grub.cfg.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RegenCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Only try this command when the path exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when_exists: Option<PathBuf>,
}

impl RegenCommand {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
            when_exists: None,
        }
    }

    pub fn when_exists(mut self, marker: impl AsRef<Path>) -> Self {
        self.when_exists = Some(marker.as_ref().to_path_buf());
        self
    }

    /// Shell-like rendering for logs and error summaries.
    pub fn label(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Debian, Arch, and Fedora BIOS/EFI layouts, in that order.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("update-grub", &[]),
            Self::new("grub-mkconfig", &["-o", "/boot/grub/grub.cfg"]).when_exists("/boot/grub"),
            Self::new("grub2-mkconfig", &["-o", "/boot/grub2/grub.cfg"])
                .when_exists("/boot/grub2"),
            Self::new("grub2-mkconfig", &["-o", "/boot/efi/EFI/fedora/grub.cfg"])
                .when_exists("/boot/efi/EFI/fedora"),
        ]
    }
}
