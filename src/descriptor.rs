//! Arch package descriptor (PKGBUILD) generation.
//!
//! The descriptor references project files by absolute path because makepkg
//! chdirs into a `src/` staging subdirectory while running `package()`;
//! relative paths captured after that chdir would point nowhere.
//! Regeneration with identical inputs is byte-identical, since makepkg is
//! re-run repeatedly during iteration.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Render `pkg/PKGBUILD` under `root` for the given project version.
///
/// The CLI binary, its `websearcher` alias and the `ws` launcher script are
/// always installed; the GUI binary block is appended only when
/// `include_gui`; the license block comes last and guards on the file's
/// existence at install time. Callers must check that the release binary
/// exists before calling; this function only renders.
pub fn generate(root: &Path, version: &str, include_gui: bool) -> Result<PathBuf> {
    let cli_binary = root.join("target/release/website-searcher");
    let gui_binary = root.join("target/release/website-searcher-gui");
    let license = root.join("LICENSE");
    let ws_script = root.join("scripts/ws");

    let mut install_commands = format!(
        r#"    # Install CLI binary
    install -Dm755 "{cli}" "$pkgdir/usr/bin/website-searcher"
    ln -s website-searcher "$pkgdir/usr/bin/websearcher"

    # Install ws alias script
    if [ -f "{ws}" ]; then
        install -Dm755 "{ws}" "$pkgdir/usr/bin/ws"
    fi"#,
        cli = cli_binary.display(),
        ws = ws_script.display(),
    );

    if include_gui {
        install_commands.push_str(&format!(
            r#"

    # Install GUI binary
    if [ -f "{gui}" ]; then
        install -Dm755 "{gui}" "$pkgdir/usr/bin/website-searcher-gui"
    fi"#,
            gui = gui_binary.display(),
        ));
    }

    install_commands.push_str(&format!(
        r#"

    # Install license
    if [ -f "{license}" ]; then
        install -Dm644 "{license}" "$pkgdir/usr/share/licenses/$pkgname/LICENSE"
    fi"#,
        license = license.display(),
    ));

    let mut provides = String::from("'website-searcher' 'websearcher' 'ws'");
    if include_gui {
        provides.push_str(" 'website-searcher-gui'");
    }

    // makepkg rejects hyphens in pkgver.
    let pkgver = version.replace('-', "_");

    let content = format!(
        r#"# Maintainer: Auto-generated
pkgname=website-searcher
pkgver={pkgver}
pkgrel=1
pkgdesc="Cross-platform CLI that queries multiple game-download sites"
arch=('x86_64')
url="https://github.com/reekid420/website-searcher"
license=('MIT')
depends=('glibc' 'openssl' 'gtk3' 'webkit2gtk-4.1')
provides=({provides})
source=()

package() {{
{install_commands}
}}
"#
    );

    let pkg_dir = root.join("pkg");
    fs::create_dir_all(&pkg_dir)
        .with_context(|| format!("creating package directory '{}'", pkg_dir.display()))?;
    let pkgbuild_path = pkg_dir.join("PKGBUILD");
    fs::write(&pkgbuild_path, content)
        .with_context(|| format!("writing descriptor '{}'", pkgbuild_path.display()))?;
    Ok(pkgbuild_path)
}
