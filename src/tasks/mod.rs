//! Concrete pipeline definitions and shared step helpers.
//!
//! `build` and `test` assemble the ordered step lists driven by
//! [`crate::pipeline::run_pipeline`]; the helpers here are the filesystem
//! and environment chores both pipelines share.

pub mod build;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::output::OutputSink;

/// Prepend `~/.cargo/bin` to PATH when present and not already there.
///
/// The PATH map is the only cross-step mutable environment state; it is
/// touched once, before any step runs.
pub fn ensure_cargo_in_path() {
    let Some(home) = dirs::home_dir() else {
        return;
    };
    let cargo_bin = home.join(".cargo").join("bin");
    if !cargo_bin.is_dir() {
        return;
    }
    let path = std::env::var_os("PATH").unwrap_or_default();
    let mut parts: Vec<PathBuf> = std::env::split_paths(&path).collect();
    if parts.iter().any(|p| p == &cargo_bin) {
        return;
    }
    parts.insert(0, cargo_bin);
    if let Ok(joined) = std::env::join_paths(parts) {
        std::env::set_var("PATH", joined);
    }
}

/// Copy a staged artifact, with context on failure.
pub fn stage_file(src: &Path, dst: &Path, out: &mut OutputSink) -> Result<()> {
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating staging directory '{}'", parent.display()))?;
    }
    std::fs::copy(src, dst)
        .with_context(|| format!("copying '{}' to '{}'", src.display(), dst.display()))?;
    out.print(&format!("Staged: {}", dst.display()));
    Ok(())
}

/// Strip carriage returns and guarantee a shebang line.
///
/// Maintainer scripts edited on Windows pick up CRLF endings that break
/// dpkg; the bundler also requires an interpreter line.
pub fn normalize_script_content(content: &str) -> String {
    let content = content.replace('\r', "");
    if content.starts_with("#!") {
        content
    } else {
        format!("#!/bin/sh\n{content}")
    }
}

/// Maintainer scripts bundled into the Linux packages.
const LINUX_SCRIPTS: &[&str] = &[
    "src-tauri/scripts/linux/postinst.sh",
    "src-tauri/scripts/linux/prerm.sh",
    "scripts/ws",
];

/// Normalize the Linux maintainer scripts in place. No-op off Unix.
pub fn normalize_linux_scripts(root: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        for rel in LINUX_SCRIPTS {
            let path = root.join(rel);
            if !path.is_file() {
                continue;
            }
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("reading script '{}'", path.display()))?;
            let normalized = normalize_script_content(&content);
            if normalized != content {
                std::fs::write(&path, &normalized)
                    .with_context(|| format!("rewriting script '{}'", path.display()))?;
            }
            let mode = std::fs::metadata(&path)
                .with_context(|| format!("inspecting script '{}'", path.display()))?
                .permissions()
                .mode();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode | 0o755))
                .with_context(|| format!("marking script executable '{}'", path.display()))?;
        }
    }
    #[cfg(not(unix))]
    {
        let _ = root;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_carriage_returns() {
        let normalized = normalize_script_content("#!/bin/sh\r\necho hi\r\n");
        assert_eq!(normalized, "#!/bin/sh\necho hi\n");
    }

    #[test]
    fn test_normalize_adds_missing_shebang() {
        let normalized = normalize_script_content("echo hi\n");
        assert_eq!(normalized, "#!/bin/sh\necho hi\n");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_script_content("echo hi\r\n");
        let twice = normalize_script_content(&once);
        assert_eq!(once, twice);
    }

    #[cfg(unix)]
    #[test]
    fn test_normalize_linux_scripts_marks_executable() {
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        let temp = TempDir::new().unwrap();
        let script = temp.path().join("scripts/ws");
        std::fs::create_dir_all(script.parent().unwrap()).unwrap();
        std::fs::write(&script, "echo launcher\r\n").unwrap();

        normalize_linux_scripts(temp.path()).unwrap();

        let content = std::fs::read_to_string(&script).unwrap();
        assert_eq!(content, "#!/bin/sh\necho launcher\n");
        let mode = std::fs::metadata(&script).unwrap().permissions().mode();
        assert_eq!(mode & 0o755, 0o755);
    }

    #[test]
    fn test_stage_file_creates_parent_dirs() {
        use tempfile::TempDir;

        let temp = TempDir::new().unwrap();
        let src = temp.path().join("binary");
        std::fs::write(&src, "payload").unwrap();
        let dst = temp.path().join("staging/bin/binary-x86_64");

        stage_file(&src, &dst, &mut OutputSink::terminal_only()).unwrap();
        assert_eq!(std::fs::read_to_string(dst).unwrap(), "payload");
    }
}
