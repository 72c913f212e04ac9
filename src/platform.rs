//! Host platform and distribution probing.
//!
//! Detection never fails: a host without distribution metadata (non-Linux,
//! minimal containers) yields empty id/lineage strings rather than an
//! error. Bundle decisions derived from this data live in [`crate::policy`].

use std::process::Command;

/// Host operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Windows,
    MacOs,
    Linux,
}

impl OsFamily {
    /// The family of the running host.
    pub fn host() -> Self {
        match std::env::consts::OS {
            "windows" => Self::Windows,
            "macos" => Self::MacOs,
            _ => Self::Linux,
        }
    }
}

/// Immutable facts about the host, derived once per run.
#[derive(Debug, Clone)]
pub struct PlatformInfo {
    pub os: OsFamily,
    /// `ID` from os-release, lowercased, empty when unknown.
    pub distro_id: String,
    /// `ID_LIKE` from os-release, lowercased, empty when unknown.
    pub distro_like: String,
}

impl PlatformInfo {
    /// Probe the running host.
    pub fn detect() -> Self {
        let os = OsFamily::host();
        if os != OsFamily::Linux {
            return Self {
                os,
                distro_id: String::new(),
                distro_like: String::new(),
            };
        }
        let content = std::fs::read_to_string("/etc/os-release").unwrap_or_default();
        let (distro_id, distro_like) = parse_os_release(&content);
        Self {
            os,
            distro_id,
            distro_like,
        }
    }

    /// Combined `id id_like` string used for pattern matching and messages.
    pub fn lineage(&self) -> String {
        format!("{} {}", self.distro_id, self.distro_like)
            .trim()
            .to_string()
    }
}

/// Extract lowercased `ID` and `ID_LIKE` from os-release key=value content.
pub fn parse_os_release(content: &str) -> (String, String) {
    let mut id = String::new();
    let mut id_like = String::new();
    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').to_lowercase();
        match key.trim() {
            "ID" => id = value,
            "ID_LIKE" => id_like = value,
            _ => {}
        }
    }
    (id, id_like)
}

/// Rust target triple of the host toolchain.
///
/// Parses `rustc -Vv`; when rustc is unavailable, falls back to the
/// conventional x86_64 triple for the OS family. The triple names the
/// staged sidecar binary, so a wrong guess only mislabels the copy.
pub fn host_triple() -> String {
    if let Ok(output) = Command::new("rustc").arg("-Vv").output() {
        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            for line in stdout.lines() {
                if let Some(rest) = line.strip_prefix("host:") {
                    return rest.trim().to_string();
                }
            }
        }
    }

    match OsFamily::host() {
        OsFamily::Windows => "x86_64-pc-windows-msvc".to_string(),
        OsFamily::MacOs => "x86_64-apple-darwin".to_string(),
        OsFamily::Linux => "x86_64-unknown-linux-gnu".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_os_release_strips_quotes_and_lowercases() {
        let content = "NAME=\"Ubuntu\"\nID=Ubuntu\nID_LIKE=\"Debian\"\nVERSION_ID=\"24.04\"\n";
        let (id, like) = parse_os_release(content);
        assert_eq!(id, "ubuntu");
        assert_eq!(like, "debian");
    }

    #[test]
    fn test_parse_os_release_missing_keys_yield_empty() {
        let (id, like) = parse_os_release("NAME=Whatever\n");
        assert!(id.is_empty());
        assert!(like.is_empty());

        let (id, like) = parse_os_release("");
        assert!(id.is_empty());
        assert!(like.is_empty());
    }

    #[test]
    fn test_parse_os_release_ignores_malformed_lines() {
        let content = "garbage line\nID=fedora\n# comment\n";
        let (id, _) = parse_os_release(content);
        assert_eq!(id, "fedora");
    }

    #[test]
    fn test_lineage_joins_id_and_like() {
        let info = PlatformInfo {
            os: OsFamily::Linux,
            distro_id: "ubuntu".into(),
            distro_like: "debian".into(),
        };
        assert_eq!(info.lineage(), "ubuntu debian");

        let bare = PlatformInfo {
            os: OsFamily::Linux,
            distro_id: String::new(),
            distro_like: String::new(),
        };
        assert_eq!(bare.lineage(), "");
    }

    #[test]
    fn test_host_triple_is_plausible() {
        let triple = host_triple();
        assert!(triple.contains('-'), "unexpected triple: {triple}");
    }
}
