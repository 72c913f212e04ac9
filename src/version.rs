//! Project-wide version rewriting.
//!
//! Pure text substitution: each manifest keeps its own formatting and only
//! the version value changes. Parsing and re-serializing the files would
//! reorder keys and drop comments, so the rewrites are targeted regexes.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use regex::Regex;

use crate::output::OutputSink;

/// Manifests carrying the project version, relative to the repo root.
const CARGO_MANIFESTS: &[&str] = &[
    "Cargo.toml",
    "crates/cli/Cargo.toml",
    "crates/core/Cargo.toml",
    "src-tauri/Cargo.toml",
];

/// `MAJOR.MINOR.PATCH`, nothing else.
pub fn is_valid_version(version: &str) -> bool {
    Regex::new(r"^\d+\.\d+\.\d+$").unwrap().is_match(version)
}

/// Read the current version from the root Cargo.toml `[package]` section.
pub fn read_project_version(root: &Path) -> Option<String> {
    let content = fs::read_to_string(root.join("Cargo.toml")).ok()?;
    let re = Regex::new(r#"(?ms)^\[(?:workspace\.)?package\].*?^version\s*=\s*"([^"]*)""#).unwrap();
    re.captures(&content).map(|c| c[1].to_string())
}

/// Update every manifest under `root` to `new_version`.
///
/// Returns the number of files actually changed. Missing files are
/// skipped; unchanged files are reported but not an error.
pub fn set_version(root: &Path, new_version: &str, out: &mut OutputSink) -> Result<usize> {
    if !is_valid_version(new_version) {
        bail!(
            "invalid version '{}'; expected MAJOR.MINOR.PATCH (e.g. 1.2.3)",
            new_version
        );
    }

    out.print(&format!("Updating project version to {new_version}..."));
    let mut updated = 0;

    for rel in CARGO_MANIFESTS {
        let path = root.join(rel);
        if !path.is_file() {
            continue;
        }
        if rewrite_file(&path, |content| {
            rewrite_cargo_manifest(content, new_version)
        })? {
            out.success(&format!("Updated {}", path.display()));
            updated += 1;
        } else {
            out.info(&format!("No changes in {}", path.display()));
        }
    }

    for rel in ["gui/package.json", "src-tauri/tauri.conf.json"] {
        let path = root.join(rel);
        if !path.is_file() {
            continue;
        }
        if rewrite_file(&path, |content| rewrite_json_version(content, new_version))? {
            out.success(&format!("Updated {}", path.display()));
            updated += 1;
        } else {
            out.info(&format!("No changes in {}", path.display()));
        }
    }

    out.print(&format!("Updated {updated} files to version {new_version}"));
    Ok(updated)
}

fn rewrite_file(path: &Path, rewrite: impl Fn(&str) -> String) -> Result<bool> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading '{}'", path.display()))?;
    let rewritten = rewrite(&content);
    if rewritten == content {
        return Ok(false);
    }
    fs::write(path, rewritten).with_context(|| format!("writing '{}'", path.display()))?;
    Ok(true)
}

/// Replace the `version` value in the `[package]` and `[workspace.package]`
/// sections, leaving dependency version requirements untouched.
fn rewrite_cargo_manifest(content: &str, new_version: &str) -> String {
    let package = Regex::new(r#"(?ms)(^\[package\].*?^version\s*=\s*)"[^"]*""#).unwrap();
    let workspace =
        Regex::new(r#"(?ms)(^\[workspace\.package\].*?^version\s*=\s*)"[^"]*""#).unwrap();

    let replacement = format!("${{1}}\"{new_version}\"");
    let content = package.replace(content, replacement.as_str());
    workspace.replace(&content, replacement.as_str()).into_owned()
}

/// Replace the first `"version": "…"` occurrence.
fn rewrite_json_version(content: &str, new_version: &str) -> String {
    let re = Regex::new(r#"("version"\s*:\s*)"[^"]*""#).unwrap();
    re.replace(content, format!("${{1}}\"{new_version}\"").as_str())
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_version_validation() {
        assert!(is_valid_version("1.2.3"));
        assert!(is_valid_version("0.10.0"));
        assert!(!is_valid_version("1.2"));
        assert!(!is_valid_version("1.2.3-rc1"));
        assert!(!is_valid_version("v1.2.3"));
    }

    #[test]
    fn test_cargo_rewrite_touches_only_package_sections() {
        let manifest = concat!(
            "[package]\n",
            "name = \"website-searcher\"\n",
            "version = \"0.1.0\"\n",
            "\n",
            "[dependencies]\n",
            "serde = { version = \"1.0\", features = [\"derive\"] }\n",
        );
        let rewritten = rewrite_cargo_manifest(manifest, "2.0.0");
        assert!(rewritten.contains("version = \"2.0.0\""));
        assert!(rewritten.contains("serde = { version = \"1.0\""));
    }

    #[test]
    fn test_workspace_package_section_is_rewritten() {
        let manifest = concat!(
            "[workspace]\n",
            "members = [\"crates/cli\"]\n",
            "\n",
            "[workspace.package]\n",
            "edition = \"2021\"\n",
            "version = \"0.1.0\"\n",
        );
        let rewritten = rewrite_cargo_manifest(manifest, "1.5.0");
        assert!(rewritten.contains("version = \"1.5.0\""));
        assert!(!rewritten.contains("version = \"0.1.0\""));
    }

    #[test]
    fn test_json_rewrite_first_occurrence_only() {
        let json = r#"{
  "version": "0.1.0",
  "dependencies": { "left-pad": { "version": "9.9.9" } }
}"#;
        let rewritten = rewrite_json_version(json, "3.1.4");
        assert!(rewritten.contains("\"version\": \"3.1.4\""));
        assert!(rewritten.contains("\"version\": \"9.9.9\""));
    }

    #[test]
    fn test_set_version_reports_changed_count() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("Cargo.toml"),
            "[package]\nname = \"x\"\nversion = \"0.1.0\"\n",
        )
        .unwrap();
        fs::create_dir_all(temp.path().join("gui")).unwrap();
        fs::write(
            temp.path().join("gui/package.json"),
            "{\n  \"version\": \"0.1.0\"\n}\n",
        )
        .unwrap();

        let mut sink = OutputSink::terminal_only();
        let updated = set_version(temp.path(), "0.2.0", &mut sink).unwrap();
        assert_eq!(updated, 2);

        // Second run is a no-op.
        let updated = set_version(temp.path(), "0.2.0", &mut sink).unwrap();
        assert_eq!(updated, 0);
    }

    #[test]
    fn test_set_version_rejects_bad_input() {
        let temp = TempDir::new().unwrap();
        let mut sink = OutputSink::terminal_only();
        assert!(set_version(temp.path(), "banana", &mut sink).is_err());
    }

    #[test]
    fn test_read_project_version() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("Cargo.toml"),
            "[package]\nname = \"x\"\nversion = \"4.5.6\"\n",
        )
        .unwrap();
        assert_eq!(read_project_version(temp.path()).as_deref(), Some("4.5.6"));
        assert!(read_project_version(Path::new("/nonexistent-root")).is_none());
    }
}
