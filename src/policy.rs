//! Bundle policy: which package formats to request from the bundler.
//!
//! Pure functions over [`PlatformInfo`] so every decision is unit-testable
//! without touching the filesystem. Arch-family detection is evaluated
//! independently of the bundle set: it gates the separate makepkg path, and
//! an Arch host still runs the generic Linux bundles.

use std::collections::BTreeSet;
use std::fmt;

use crate::platform::{OsFamily, PlatformInfo};

/// Distro ids treated as Arch-based for the makepkg packaging path.
const ARCH_IDS: &[&str] = &[
    "arch",
    "manjaro",
    "endeavouros",
    "garuda",
    "artix",
    "arcolinux",
    "archcraft",
];

/// A target package/installer format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BundleKind {
    AppImage,
    Deb,
    Rpm,
    Msi,
    Dmg,
    PkgTarZst,
}

impl BundleKind {
    /// Token understood by the bundler's `--bundles` argument.
    pub fn token(self) -> &'static str {
        match self {
            Self::AppImage => "appimage",
            Self::Deb => "deb",
            Self::Rpm => "rpm",
            Self::Msi => "msi",
            Self::Dmg => "dmg",
            Self::PkgTarZst => "pkgtarzst",
        }
    }

    /// Filename suffix of the produced artifact.
    pub fn artifact_suffix(self) -> &'static str {
        match self {
            Self::AppImage => ".AppImage",
            Self::Deb => ".deb",
            Self::Rpm => ".rpm",
            Self::Msi => ".msi",
            Self::Dmg => ".dmg",
            Self::PkgTarZst => ".pkg.tar.zst",
        }
    }
}

impl fmt::Display for BundleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Map host platform + user overrides to the bundle kinds to build.
///
/// Windows and macOS always yield a singleton set; overrides only apply on
/// Linux, where AppImage is the universal fallback and deb/rpm are added by
/// case-insensitive substring matching over the distro id and lineage.
pub fn resolve(info: &PlatformInfo, force_deb: bool, force_rpm: bool) -> BTreeSet<BundleKind> {
    let mut bundles = BTreeSet::new();
    match info.os {
        OsFamily::Windows => {
            bundles.insert(BundleKind::Msi);
        }
        OsFamily::MacOs => {
            bundles.insert(BundleKind::Dmg);
        }
        OsFamily::Linux => {
            bundles.insert(BundleKind::AppImage);

            let lineage = info.lineage().to_lowercase();
            if ["debian", "ubuntu"].iter().any(|p| lineage.contains(p)) {
                bundles.insert(BundleKind::Deb);
            }
            if ["rhel", "fedora", "suse"].iter().any(|p| lineage.contains(p)) {
                bundles.insert(BundleKind::Rpm);
            }

            if force_deb {
                bundles.insert(BundleKind::Deb);
            }
            if force_rpm {
                bundles.insert(BundleKind::Rpm);
            }
        }
    }
    bundles
}

/// Serialize a bundle set as the sorted, comma-joined token list passed to
/// the bundler. Sorting keeps the argument deterministic.
pub fn bundle_arg(bundles: &BTreeSet<BundleKind>) -> String {
    let mut tokens: Vec<&str> = bundles.iter().map(|b| b.token()).collect();
    tokens.sort_unstable();
    tokens.join(",")
}

/// Whether the host is Arch Linux or a derivative.
pub fn is_arch_based(info: &PlatformInfo) -> bool {
    if info.os != OsFamily::Linux {
        return false;
    }
    ARCH_IDS.contains(&info.distro_id.as_str()) || info.distro_like.contains("arch")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux(id: &str, like: &str) -> PlatformInfo {
        PlatformInfo {
            os: OsFamily::Linux,
            distro_id: id.to_string(),
            distro_like: like.to_string(),
        }
    }

    #[test]
    fn test_windows_yields_singleton_msi() {
        let info = PlatformInfo {
            os: OsFamily::Windows,
            distro_id: String::new(),
            distro_like: String::new(),
        };
        let set = resolve(&info, true, true);
        assert_eq!(set.len(), 1);
        assert!(set.contains(&BundleKind::Msi));
    }

    #[test]
    fn test_macos_yields_singleton_dmg() {
        let info = PlatformInfo {
            os: OsFamily::MacOs,
            distro_id: String::new(),
            distro_like: String::new(),
        };
        let set = resolve(&info, true, true);
        assert_eq!(set.len(), 1);
        assert!(set.contains(&BundleKind::Dmg));
    }

    #[test]
    fn test_ubuntu_adds_deb() {
        let set = resolve(&linux("ubuntu", "debian"), false, false);
        assert!(set.contains(&BundleKind::AppImage));
        assert!(set.contains(&BundleKind::Deb));
        assert!(!set.contains(&BundleKind::Rpm));
    }

    #[test]
    fn test_fedora_adds_rpm() {
        let set = resolve(&linux("fedora", ""), false, false);
        assert!(set.contains(&BundleKind::AppImage));
        assert!(set.contains(&BundleKind::Rpm));
        assert!(!set.contains(&BundleKind::Deb));
    }

    #[test]
    fn test_lineage_matching_covers_id_like() {
        // opensuse via ID_LIKE rather than ID
        let set = resolve(&linux("tumbleweed", "opensuse suse"), false, false);
        assert!(set.contains(&BundleKind::Rpm));
    }

    #[test]
    fn test_unknown_distro_still_gets_appimage() {
        let set = resolve(&linux("", ""), false, false);
        assert_eq!(set.len(), 1);
        assert!(set.contains(&BundleKind::AppImage));
    }

    #[test]
    fn test_force_flags_union_in_on_any_distro() {
        let set = resolve(&linux("gentoo", ""), true, true);
        assert!(set.contains(&BundleKind::Deb));
        assert!(set.contains(&BundleKind::Rpm));
        assert!(set.contains(&BundleKind::AppImage));
    }

    #[test]
    fn test_bundle_arg_is_sorted_and_comma_joined() {
        let set = resolve(&linux("ubuntu", "debian"), false, true);
        assert_eq!(bundle_arg(&set), "appimage,deb,rpm");
    }

    #[test]
    fn test_arch_detection_by_id_and_lineage() {
        assert!(is_arch_based(&linux("arch", "")));
        assert!(is_arch_based(&linux("manjaro", "")));
        assert!(is_arch_based(&linux("cachyos", "arch")));
        assert!(!is_arch_based(&linux("ubuntu", "debian")));

        let windows = PlatformInfo {
            os: OsFamily::Windows,
            distro_id: "arch".into(),
            distro_like: String::new(),
        };
        assert!(!is_arch_based(&windows));
    }
}
