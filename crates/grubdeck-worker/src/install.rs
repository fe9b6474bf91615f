//! Copy staged theme content into the themes root.

use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use grubdeck_core::InstallError;
use tracing::{info, warn};

use crate::staging::remove_existing;

const VCS_DIRS: &[&str] = &[".git"];

/// Directory whose contents become the installed theme: the asset
/// subdirectory when the fetched tree has one, the whole tree otherwise.
pub fn content_root(staging: &Path, asset_subdir: &str) -> PathBuf {
    let candidate = staging.join(asset_subdir);
    match fs::symlink_metadata(&candidate) {
        Ok(meta) if meta.is_dir() => candidate,
        _ => staging.to_path_buf(),
    }
}

/// Replace `<themes_root>/<theme_name>` with the staged content.
pub fn install_theme(
    staging: &Path,
    themes_root: &Path,
    theme_name: &str,
    asset_subdir: &str,
) -> Result<PathBuf, InstallError> {
    let source = content_root(staging, asset_subdir);
    let destination = themes_root.join(theme_name);

    fs::create_dir_all(themes_root).map_err(|err| InstallError::filesystem(themes_root, err))?;
    if fs::symlink_metadata(&destination).is_ok() {
        info!(destination = %destination.display(), "removing previous theme version");
    }
    remove_existing(&destination).map_err(|err| InstallError::filesystem(&destination, err))?;

    let skip: &[&str] = if source.as_path() == staging { VCS_DIRS } else { &[] };
    copy_tree(&source, &destination, skip)?;
    info!(
        source = %source.display(),
        destination = %destination.display(),
        "theme files installed"
    );
    Ok(destination)
}

/// Warn when the descriptor the boot configuration will point at is missing.
pub fn check_theme_structure(theme_dir: &Path, asset_file: &str) -> bool {
    let present = theme_dir.join(asset_file).is_file();
    if !present {
        warn!(
            theme = %theme_dir.display(),
            asset_file,
            "installed theme has no descriptor file; GRUB will fall back to its default look"
        );
    }
    present
}

fn copy_tree(source: &Path, destination: &Path, skip: &[&str]) -> Result<(), InstallError> {
    fs::create_dir_all(destination).map_err(|err| InstallError::filesystem(destination, err))?;
    let entries = fs::read_dir(source).map_err(|err| InstallError::filesystem(source, err))?;
    for entry in entries {
        let entry = entry.map_err(|err| InstallError::filesystem(source, err))?;
        let name = entry.file_name();
        if skip.iter().any(|skipped| name.to_str() == Some(*skipped)) {
            continue;
        }
        let from = entry.path();
        let to = destination.join(&name);
        let file_type = entry
            .file_type()
            .map_err(|err| InstallError::filesystem(&from, err))?;

        if file_type.is_dir() {
            copy_tree(&from, &to, &[])?;
        } else if file_type.is_symlink() {
            let target = fs::read_link(&from).map_err(|err| InstallError::filesystem(&from, err))?;
            symlink(&target, &to).map_err(|err| InstallError::filesystem(&to, err))?;
        } else {
            fs::copy(&from, &to).map_err(|err| InstallError::filesystem(&to, err))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn installs_asset_subdirectory_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("stage");
        write(&staging.join("README.md"), "readme");
        write(&staging.join("theme/theme.txt"), "title-text: \"\"");
        write(&staging.join("theme/icons/arch.png"), "png");
        let root = dir.path().join("themes");

        let installed = install_theme(&staging, &root, "nord", "theme").unwrap();
        assert_eq!(installed, root.join("nord"));
        assert!(installed.join("theme.txt").is_file());
        assert!(installed.join("icons/arch.png").is_file());
        assert!(!installed.join("README.md").exists());
        assert!(check_theme_structure(&installed, "theme.txt"));
    }

    #[test]
    fn installs_whole_tree_without_vcs_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("stage");
        write(&staging.join("theme.txt"), "desktop-image: \"bg.png\"");
        write(&staging.join(".git/HEAD"), "ref: refs/heads/main");
        write(&staging.join("fonts/.keep"), "");
        symlink("theme.txt", staging.join("alias.txt")).unwrap();

        let installed = install_theme(&staging, &dir.path().join("themes"), "solo", "theme").unwrap();
        assert!(installed.join("theme.txt").is_file());
        assert!(installed.join("fonts/.keep").is_file());
        assert!(!installed.join(".git").exists());
        assert_eq!(
            fs::read_link(installed.join("alias.txt")).unwrap(),
            PathBuf::from("theme.txt")
        );
    }

    #[test]
    fn replaces_previous_version_instead_of_merging() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("themes");
        write(&root.join("nord/theme.txt"), "old");
        write(&root.join("nord/obsolete.png"), "old");

        let staging = dir.path().join("stage");
        write(&staging.join("theme.txt"), "new");

        let installed = install_theme(&staging, &root, "nord", "theme").unwrap();
        let mut names: Vec<_> = fs::read_dir(&installed)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec!["theme.txt"]);
        assert_eq!(fs::read_to_string(installed.join("theme.txt")).unwrap(), "new");
    }

    #[test]
    fn missing_descriptor_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!check_theme_structure(dir.path(), "theme.txt"));
    }
}
