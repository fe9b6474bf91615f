//! Line-preserving rewrite of the bootloader key-value configuration.
//!
//! Only assignments to the theme key are touched. Comments, blank lines and
//! every other assignment come back out byte-for-byte in their original order,
//! line endings included.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::InstallError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootConfigDocument {
    // Raw lines, each with its original terminator.
    lines: Vec<String>,
}

impl BootConfigDocument {
    pub fn parse(contents: &str) -> Self {
        Self {
            lines: contents.split_inclusive('\n').map(String::from).collect(),
        }
    }

    pub fn read(path: &Path) -> Result<Self, InstallError> {
        let contents =
            fs::read_to_string(path).map_err(|err| InstallError::config_write(path, err))?;
        Ok(Self::parse(&contents))
    }

    /// Lines without their terminators.
    pub fn lines(&self) -> impl Iterator<Item = &str> + '_ {
        self.lines.iter().map(|line| strip_ending(line))
    }

    /// Lines that assign `key`, ignoring surrounding whitespace.
    pub fn assignments<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.lines().filter(move |line| is_assignment(line, key))
    }

    /// Drop every assignment of `key` and append exactly one pointing at `asset_path`.
    pub fn apply_theme(&mut self, key: &str, asset_path: &Path) {
        self.lines.retain(|line| !is_assignment(line, key));
        let ending = self.line_ending();
        if let Some(last) = self.lines.last_mut().filter(|line| !line.ends_with('\n')) {
            last.push_str(ending);
        }
        self.lines
            .push(format!("{}=\"{}\"{}", key, asset_path.display(), ending));
    }

    pub fn render(&self) -> String {
        self.lines.concat()
    }

    /// Replace the file in one rename so readers never see a partial write.
    ///
    /// A symlinked `path` is followed; the link stays and its target is replaced.
    pub fn write(&self, path: &Path) -> Result<(), InstallError> {
        let target = fs::canonicalize(path).map_err(|err| InstallError::config_write(path, err))?;
        write_replacing(&target, self.render().as_bytes())
            .map_err(|err| InstallError::config_write(path, err))
    }

    /// Read, retarget the theme key, and write back.
    pub fn mutate(path: &Path, key: &str, asset_path: &Path) -> Result<Self, InstallError> {
        let mut document = Self::read(path)?;
        document.apply_theme(key, asset_path);
        document.write(path)?;
        Ok(document)
    }

    // CRLF when the document already uses it, LF otherwise.
    fn line_ending(&self) -> &'static str {
        match self.lines.iter().find(|line| line.ends_with('\n')) {
            Some(line) if line.ends_with("\r\n") => "\r\n",
            _ => "\n",
        }
    }
}

fn strip_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

fn is_assignment(line: &str, key: &str) -> bool {
    line.trim()
        .strip_prefix(key)
        .is_some_and(|rest| rest.starts_with('='))
}

fn write_replacing(target: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = target
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut staged = NamedTempFile::new_in(parent)?;
    staged.write_all(contents)?;
    staged.as_file().sync_all()?;
    let permissions = fs::metadata(target)?.permissions();
    fs::set_permissions(staged.path(), permissions)?;
    staged.persist(target).map_err(|err| err.error)?;
    // Persist the rename itself.
    if let Ok(dir) = File::open(parent) {
        let _ = dir.sync_all();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    const KEY: &str = "GRUB_THEME";

    const SAMPLE: &str = "\
# If you change this file, run 'update-grub' afterwards
GRUB_DEFAULT=0
GRUB_TIMEOUT=5

GRUB_CMDLINE_LINUX_DEFAULT=\"quiet splash\"
#GRUB_THEME=\"/commented/out.txt\"
GRUB_THEMES_DIR=/boot/grub/themes
";

    #[test]
    fn appends_assignment_and_preserves_other_lines() {
        let mut doc = BootConfigDocument::parse(SAMPLE);
        let before: Vec<String> = doc.lines().map(String::from).collect();
        doc.apply_theme(KEY, Path::new("/boot/grub/themes/nord/theme.txt"));

        let lines: Vec<&str> = doc.lines().collect();
        assert_eq!(lines.len(), before.len() + 1);
        assert_eq!(&lines[..before.len()], before.as_slice());
        assert_eq!(
            *lines.last().unwrap(),
            "GRUB_THEME=\"/boot/grub/themes/nord/theme.txt\""
        );
        // Neither the comment nor the lookalike key counts as an assignment.
        assert_eq!(doc.assignments(KEY).count(), 1);
    }

    #[test]
    fn replaces_existing_assignments_and_moves_them_to_the_end() {
        let text = "GRUB_THEME=\"/old/path\"\nGRUB_TIMEOUT=5\n  GRUB_THEME=/older\nGRUB_DEFAULT=0\n";
        let mut doc = BootConfigDocument::parse(text);
        doc.apply_theme(KEY, Path::new("/new/theme.txt"));
        assert_eq!(
            doc.lines().collect::<Vec<_>>(),
            ["GRUB_TIMEOUT=5", "GRUB_DEFAULT=0", "GRUB_THEME=\"/new/theme.txt\""]
        );
    }

    #[test]
    fn mutation_is_idempotent() {
        let asset = Path::new("/boot/grub/themes/nord/theme.txt");
        let mut once = BootConfigDocument::parse(SAMPLE);
        once.apply_theme(KEY, asset);
        let mut twice = once.clone();
        twice.apply_theme(KEY, asset);
        assert_eq!(once, twice);
        assert_eq!(twice.assignments(KEY).count(), 1);
    }

    #[test]
    fn mutate_rewrites_file_and_keeps_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grub");
        fs::write(&path, "GRUB_THEME=\"/old/path\"\nGRUB_TIMEOUT=5\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        BootConfigDocument::mutate(&path, KEY, Path::new("/new/theme.txt")).unwrap();
        BootConfigDocument::mutate(&path, KEY, Path::new("/new/theme.txt")).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "GRUB_TIMEOUT=5\nGRUB_THEME=\"/new/theme.txt\"\n"
        );
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn crlf_endings_and_missing_final_newline_survive() {
        let mut doc =
            BootConfigDocument::parse("GRUB_DEFAULT=0\r\nGRUB_THEME=\"/old\"\r\nGRUB_TIMEOUT=5");
        doc.apply_theme(KEY, Path::new("/new/theme.txt"));
        assert_eq!(
            doc.render(),
            "GRUB_DEFAULT=0\r\nGRUB_TIMEOUT=5\r\nGRUB_THEME=\"/new/theme.txt\"\r\n"
        );
        assert_eq!(doc.assignments(KEY).collect::<Vec<_>>(), ["GRUB_THEME=\"/new/theme.txt\""]);
    }

    #[test]
    fn untouched_lines_render_byte_for_byte() {
        let text = "GRUB_DEFAULT=0\r\n\n# comment\r\nGRUB_TIMEOUT=5\n";
        assert_eq!(BootConfigDocument::parse(text).render(), text);
    }

    #[test]
    fn symlinked_config_is_updated_through_the_link() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("grub.real");
        let link = dir.path().join("grub");
        fs::write(&real, "GRUB_TIMEOUT=5\n").unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        BootConfigDocument::mutate(&link, KEY, Path::new("/new/theme.txt")).unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(
            fs::read_to_string(&real).unwrap(),
            "GRUB_TIMEOUT=5\nGRUB_THEME=\"/new/theme.txt\"\n"
        );
    }

    #[test]
    fn missing_file_is_a_config_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = BootConfigDocument::mutate(
            &dir.path().join("absent"),
            KEY,
            Path::new("/new/theme.txt"),
        )
        .unwrap_err();
        assert!(matches!(err, InstallError::ConfigWrite { .. }));
    }

    #[test]
    fn empty_document_gets_single_line() {
        let mut doc = BootConfigDocument::parse("");
        doc.apply_theme(KEY, Path::new("/t/theme.txt"));
        assert_eq!(doc.render(), "GRUB_THEME=\"/t/theme.txt\"\n");
    }
}
