//! Small helpers shared by the worker and the front-end.

use std::env;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const DEFAULT_LOG_LIMIT: usize = 160;
const DIAGNOSTIC_LOG_LIMIT: usize = 1024;

/// Resolve a program name against $PATH, or check an explicit path directly.
pub fn find_program(program: &str) -> Option<PathBuf> {
    if program.is_empty() {
        return None;
    }
    if program.contains(std::path::MAIN_SEPARATOR) {
        let path = PathBuf::from(program);
        return is_executable(&path).then_some(path);
    }
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

/// Check whether a program exists in $PATH.
pub fn program_in_path(program: &str) -> bool {
    find_program(program).is_some()
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// True when the current process already runs with an effective uid of 0.
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// Returns true when verbose subprocess snippets are enabled via environment.
pub fn diagnostic_mode() -> bool {
    diagnostic_mode_from(env::var("GRUBDECK_DIAGNOSTIC").ok().as_deref())
}

fn diagnostic_mode_from(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

/// Collapses line breaks and caps the length of a value destined for a log line.
pub fn sanitize_log_value(value: &str, max_len: usize) -> String {
    let flattened: String = value
        .chars()
        .map(|ch| if ch == '\n' || ch == '\r' { ' ' } else { ch })
        .collect();
    let trimmed = flattened.trim();
    if trimmed.chars().count() <= max_len {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_len).collect();
    format!("{}...", cut.trim_end())
}

/// Log-safe rendition of subprocess output honoring diagnostic mode.
pub fn log_snippet(value: &str) -> String {
    let limit = if diagnostic_mode() {
        DIAGNOSTIC_LOG_LIMIT
    } else {
        DEFAULT_LOG_LIMIT
    };
    sanitize_log_value(value, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn sanitize_log_value_flattens_and_caps() {
        assert_eq!(sanitize_log_value("ab\ncd\rEF", 5), "ab cd...");
        assert_eq!(sanitize_log_value("  ok \n", 5), "ok");
    }

    #[test]
    fn diagnostic_mode_parses_expected_values() {
        assert!(diagnostic_mode_from(Some("1")));
        assert!(diagnostic_mode_from(Some(" YES ")));
        assert!(diagnostic_mode_from(Some("on")));
        assert!(!diagnostic_mode_from(Some("off")));
        assert!(!diagnostic_mode_from(None));
    }

    #[test]
    fn find_program_checks_explicit_paths_for_exec_bit() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("tool");
        fs::write(&script, "#!/bin/sh\n").unwrap();
        let rendered = script.to_string_lossy().to_string();
        assert!(find_program(&rendered).is_none());

        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(find_program(&rendered), Some(script));
        assert!(find_program("").is_none());
    }
}
