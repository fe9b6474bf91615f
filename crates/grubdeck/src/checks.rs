//! Environment checks for elevation, tooling, and bootloader layout.

use std::path::Path;

use grubdeck_core::orchestrator::resolve_worker_path;
use grubdeck_core::util::{find_program, is_root};
use grubdeck_core::{InstallerConfig, Regenerator};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CheckState {
    Ok,
    Warn,
    Fail,
}

impl CheckState {
    fn tag(self) -> &'static str {
        match self {
            CheckState::Ok => "ok",
            CheckState::Warn => "warn",
            CheckState::Fail => "FAIL",
        }
    }
}

#[derive(Debug)]
pub struct CheckItem {
    pub label: &'static str,
    pub state: CheckState,
    pub detail: String,
}

#[derive(Debug)]
pub struct Checks {
    pub elevation: CheckItem,
    pub worker: CheckItem,
    pub fetch: CheckItem,
    pub regen: CheckItem,
    pub boot_config: CheckItem,
    pub themes_root: CheckItem,
}

impl Checks {
    pub fn run(config: &InstallerConfig) -> Self {
        Self::run_as(config, is_root())
    }

    fn run_as(config: &InstallerConfig, root: bool) -> Self {
        let elevation = match config.elevation.program.as_deref() {
            _ if root && config.elevation.skip_when_root => {
                CheckItem::ok("elevation", "running as root")
            }
            None | Some("") => CheckItem::warn("elevation", "disabled; worker runs unprivileged"),
            Some(program) => match find_program(program) {
                Some(path) => CheckItem::ok("elevation", &path.display().to_string()),
                None => CheckItem::fail("elevation", &format!("{program} not installed")),
            },
        };

        let worker_path = resolve_worker_path(config.elevation.worker_path.as_deref());
        let worker = match find_program(&worker_path.to_string_lossy()) {
            Some(path) => CheckItem::ok("worker", &path.display().to_string()),
            None => CheckItem::fail(
                "worker",
                &format!("{} not found", worker_path.display()),
            ),
        };

        let fetch = match config.fetch.command.first() {
            Some(program) => match find_program(program) {
                Some(path) => CheckItem::ok("fetch", &path.display().to_string()),
                None => CheckItem::fail("fetch", &format!("{program} not installed")),
            },
            None => CheckItem::fail("fetch", "no fetch command configured"),
        };

        let regen = if Regenerator::new(config.regen.clone()).any_available() {
            CheckItem::ok("regeneration", "candidate available")
        } else {
            CheckItem::warn(
                "regeneration",
                "no candidate found; installs will need a manual update",
            )
        };

        let boot_config = existing_file("boot config", &config.paths.boot_config);

        let themes_root = if config.paths.themes_root.is_dir() {
            CheckItem::ok("themes root", &config.paths.themes_root.display().to_string())
        } else {
            CheckItem::warn(
                "themes root",
                &format!("{} missing; created on install", config.paths.themes_root.display()),
            )
        };

        Self {
            elevation,
            worker,
            fetch,
            regen,
            boot_config,
            themes_root,
        }
    }

    pub fn items(&self) -> [&CheckItem; 6] {
        [
            &self.elevation,
            &self.worker,
            &self.fetch,
            &self.regen,
            &self.boot_config,
            &self.themes_root,
        ]
    }

    /// First blocking problem, if any. Warnings never block an install.
    pub fn ready(&self) -> Result<(), String> {
        match self
            .items()
            .into_iter()
            .find(|item| item.state == CheckState::Fail)
        {
            Some(item) => Err(format!("{}: {}", item.label, item.detail)),
            None => Ok(()),
        }
    }

    pub fn render(&self) -> String {
        self.items()
            .iter()
            .map(|item| format!("[{:>4}] {:<13} {}\n", item.state.tag(), item.label, item.detail))
            .collect()
    }
}

impl CheckItem {
    fn ok(label: &'static str, detail: &str) -> Self {
        Self {
            label,
            state: CheckState::Ok,
            detail: detail.to_string(),
        }
    }

    fn warn(label: &'static str, detail: &str) -> Self {
        Self {
            label,
            state: CheckState::Warn,
            detail: detail.to_string(),
        }
    }

    fn fail(label: &'static str, detail: &str) -> Self {
        Self {
            label,
            state: CheckState::Fail,
            detail: detail.to_string(),
        }
    }
}

fn existing_file(label: &'static str, path: &Path) -> CheckItem {
    if path.is_file() {
        CheckItem::ok(label, &path.display().to_string())
    } else {
        CheckItem::fail(label, &format!("{} missing", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grubdeck_core::RegenCommand;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    fn executable(path: &Path) -> String {
        fs::write(path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn sandbox_config(root: &Path) -> InstallerConfig {
        let mut config = InstallerConfig::default();
        config.paths.boot_config = root.join("grub");
        config.paths.themes_root = root.join("themes");
        config.elevation.program = Some(executable(&root.join("fake-pkexec")));
        executable(&root.join("fake-worker"));
        config.elevation.worker_path = Some(root.join("fake-worker"));
        config.fetch.command = vec![executable(&root.join("fake-git"))];
        config.regen = vec![RegenCommand::new(executable(&root.join("fake-mkconfig")), &[])];
        config
    }

    #[test]
    fn healthy_layout_is_ready() {
        let dir = tempdir().unwrap();
        let config = sandbox_config(dir.path());
        fs::write(&config.paths.boot_config, "GRUB_TIMEOUT=5\n").unwrap();
        fs::create_dir_all(&config.paths.themes_root).unwrap();

        let checks = Checks::run_as(&config, false);
        assert!(checks.items().iter().all(|item| item.state == CheckState::Ok));
        assert!(checks.ready().is_ok());
    }

    #[test]
    fn missing_boot_config_blocks() {
        let dir = tempdir().unwrap();
        let config = sandbox_config(dir.path());

        let checks = Checks::run_as(&config, false);
        assert_eq!(checks.boot_config.state, CheckState::Fail);
        assert_eq!(checks.themes_root.state, CheckState::Warn);
        let err = checks.ready().unwrap_err();
        assert!(err.starts_with("boot config:"));
    }

    #[test]
    fn missing_regen_tools_only_warn() {
        let dir = tempdir().unwrap();
        let mut config = sandbox_config(dir.path());
        fs::write(&config.paths.boot_config, "").unwrap();
        config.regen = vec![
            RegenCommand::new("grubdeck-no-such-update-grub", &[]),
            RegenCommand::new(executable(&dir.path().join("gated")), &[])
                .when_exists(dir.path().join("absent")),
        ];

        let checks = Checks::run_as(&config, false);
        assert_eq!(checks.regen.state, CheckState::Warn);
        assert!(checks.ready().is_ok());
    }

    #[test]
    fn root_skips_elevation_program() {
        let dir = tempdir().unwrap();
        let mut config = sandbox_config(dir.path());
        config.elevation.program = Some("grubdeck-no-such-pkexec".to_string());

        assert_eq!(Checks::run_as(&config, true).elevation.state, CheckState::Ok);
        assert_eq!(Checks::run_as(&config, false).elevation.state, CheckState::Fail);
    }
}
