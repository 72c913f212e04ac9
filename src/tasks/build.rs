//! The build pipeline.
//!
//! Formats, lints and builds the workspace, stages the sidecar binary for
//! the desktop shell, then drives the bundler and the optional Arch
//! packaging path. Step order encodes a dependency: the release CLI binary
//! must exist before anything stages or packages it.

use std::env::consts::EXE_SUFFIX;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Result};

use crate::context::BuildContext;
use crate::descriptor;
use crate::output::OutputSink;
use crate::pipeline::{Step, StepContext};
use crate::platform::{host_triple, OsFamily, PlatformInfo};
use crate::policy::{self, BundleKind};
use crate::runner::{command_exists, run, CommandSpec, ExecutionError};
use crate::tasks;
use crate::version::read_project_version;
use crate::wix;

/// Release-mode CLI binary produced by the compile step.
pub fn release_binary(root: &Path) -> PathBuf {
    root.join("target")
        .join("release")
        .join(format!("website-searcher{EXE_SUFFIX}"))
}

/// Assemble the ordered build step list.
pub fn steps<'a>(root: &'a Path, platform: &'a PlatformInfo, ctx: &BuildContext) -> Vec<Step<'a>> {
    let mut steps = vec![
        Step::fatal("cargo in PATH", |_sc: &mut StepContext<'_>| {
            tasks::ensure_cargo_in_path();
            Ok(())
        }),
        Step::fatal("format", |sc| check_formatting(sc)),
        Step::fatal("build CLI (release)", |sc| {
            cargo_build(sc, &["build", "-p", "website-searcher", "--release"])
        }),
    ];

    if platform.os == OsFamily::Windows {
        steps.push(Step::advisory("stage WiX inputs", move |sc| {
            stage_wix_inputs(root, sc)
        }));
    }

    steps.push(Step::advisory("stage sidecar", move |sc| {
        stage_sidecar(root, sc)
    }));
    steps.push(Step::fatal("clippy", |sc| {
        cargo_build(sc, &["clippy", "--all-targets"])
    }));
    steps.push(Step::fatal("build CLI (debug)", |sc| {
        cargo_build(sc, &["build", "-p", "website-searcher"])
    }));
    steps.push(Step::fatal("build workspace (release)", |sc| {
        cargo_build(sc, &["build", "--workspace", "--release"])
    }));
    steps.push(Step::advisory("tauri bundle", move |sc| {
        bundle_tauri(root, platform, sc)
    }));

    if ctx.build_pacman || policy::is_arch_based(platform) {
        steps.push(Step::advisory("arch package", move |sc| {
            build_arch_package(root, sc)
        }));
    }

    steps
}

/// `cargo fmt --all -- --check`; nonconforming sources are fixed in place.
fn check_formatting(sc: &mut StepContext<'_>) -> Result<()> {
    let check = CommandSpec::new("cargo")
        .args(["fmt", "--all", "--", "--check"])
        .quiet()
        .tolerate_failure();
    let outcome = run(&check, sc.build, sc.out)?;

    if outcome.succeeded {
        sc.out.print("Formatting is correct");
        return Ok(());
    }

    sc.out.print("Formatting is incorrect, fixing...");
    run(&CommandSpec::new("cargo").args(["fmt", "--all"]), sc.build, sc.out)?;
    Ok(())
}

/// Run a cargo subcommand, quiet unless verbose.
fn cargo_build(sc: &mut StepContext<'_>, args: &[&str]) -> Result<()> {
    let spec = CommandSpec::new("cargo")
        .arg_if(!sc.build.verbose, "-q")
        .args(args.iter().copied());
    run(&spec, sc.build, sc.out)?;
    Ok(())
}

/// Copy the release exe and the `ws.cmd` launcher where the MSI authoring
/// sources expect them.
fn stage_wix_inputs(root: &Path, sc: &mut StepContext<'_>) -> Result<()> {
    let ws_cmd = root.join("scripts").join("ws.cmd");
    if !ws_cmd.is_file() {
        sc.out.warn("Missing scripts/ws.cmd");
        return Ok(());
    }

    let wix_bin = root.join("src-tauri").join("wix").join("bin");
    let src_exe = release_binary(root);
    if src_exe.is_file() {
        tasks::stage_file(&src_exe, &wix_bin.join("website-searcher.exe"), sc.out)?;
    }
    tasks::stage_file(&ws_cmd, &wix_bin.join("ws.cmd"), sc.out)?;
    Ok(())
}

/// Stage the CLI binary as the desktop shell's sidecar, named with the
/// host triple so the shell can resolve it at runtime.
fn stage_sidecar(root: &Path, sc: &mut StepContext<'_>) -> Result<()> {
    let src = release_binary(root);
    if !src.is_file() {
        sc.out
            .warn(&format!("Source binary not found: {}", src.display()));
        return Ok(());
    }

    let triple = host_triple();
    let dst = root
        .join("src-tauri")
        .join("bin")
        .join(format!("website-searcher-{triple}{EXE_SUFFIX}"));
    tasks::stage_file(&src, &dst, sc.out)
}

/// Drive `cargo tauri build` with the resolved bundle set; on Windows a
/// bundler failure falls back to the manual WiX link before the step is
/// reported as failed.
fn bundle_tauri(root: &Path, platform: &PlatformInfo, sc: &mut StepContext<'_>) -> Result<()> {
    let probe = CommandSpec::new("cargo")
        .args(["tauri", "--version"])
        .quiet()
        .tolerate_failure();
    let available = matches!(run(&probe, sc.build, sc.out), Ok(o) if o.succeeded);
    if !available {
        sc.out.warn("cargo-tauri not found; skipping bundling.");
        sc.out
            .print("Install with: cargo install tauri-cli --locked");
        return Ok(());
    }

    let bundles = policy::resolve(platform, sc.build.force_deb, sc.build.force_rpm);
    let bundle_arg = policy::bundle_arg(&bundles);

    let mut spec = CommandSpec::new("cargo")
        .arg_if(!sc.build.verbose, "-q")
        .args(["tauri", "build", "--bundles"])
        .arg(bundle_arg.as_str())
        .current_dir(root.join("src-tauri"));

    if platform.os == OsFamily::Linux {
        let lineage = platform.lineage();
        if !lineage.is_empty() {
            sc.out.print(&format!("Detected distro: {lineage}"));
        }
        tasks::normalize_linux_scripts(root)?;
        // AppImage tooling cannot mount FUSE in containers; extraction
        // mode works everywhere.
        spec = spec.env("APPIMAGE_EXTRACT_AND_RUN", "1");
    }

    sc.out
        .print(&format!("Tauri bundles to build: {bundle_arg}"));

    match run(&spec, sc.build, sc.out) {
        Ok(_) => Ok(()),
        Err(err @ ExecutionError::Interrupted { .. }) => Err(err.into()),
        Err(err) => {
            sc.out.warn("Tauri build failed");
            if platform.os == OsFamily::Windows {
                sc.out.print("Attempting manual WiX link...");
                wix::manual_link_msi(root, sc.build, sc.out)?;
            }
            Err(anyhow!(err))
        }
    }
}

/// Generate the PKGBUILD and run makepkg against it.
///
/// The descriptor is only rendered once the release binary exists; a
/// missing binary or missing makepkg skips the step with a warning.
fn build_arch_package(root: &Path, sc: &mut StepContext<'_>) -> Result<()> {
    if !command_exists("makepkg") {
        sc.out.warn("makepkg not found; skipping Arch package build");
        return Ok(());
    }

    let include_gui = !sc.build.exclude_gui;
    let Some(pkgbuild) = render_arch_descriptor(root, include_gui, sc.out)? else {
        return Ok(());
    };
    sc.out.print(&format!("Generated: {}", pkgbuild.display()));
    if !include_gui {
        sc.out
            .print("Excluding GUI binary from package (--nogui)");
    }

    let spec = CommandSpec::new("makepkg")
        .args(["-sf", "--noconfirm"])
        .current_dir(root.join("pkg"));
    match run(&spec, sc.build, sc.out) {
        Ok(_) => {}
        Err(err @ ExecutionError::Interrupted { .. }) => return Err(err.into()),
        Err(err) => {
            sc.out.warn(&format!("makepkg failed: {err}"));
            return Err(anyhow!(err));
        }
    }

    match find_arch_package(root)? {
        Some(package) => {
            sc.out
                .success(&format!("Arch package built: {}", package.display()));
            sc.out
                .print(&format!("Install with: sudo pacman -U {}", package.display()));
            Ok(())
        }
        None => bail!("makepkg finished but no package archive was produced"),
    }
}

/// Render the PKGBUILD when its precondition holds.
///
/// A missing release binary skips rendering entirely: no file is written
/// and the skip is reported as a warning, never an error.
fn render_arch_descriptor(
    root: &Path,
    include_gui: bool,
    out: &mut OutputSink,
) -> Result<Option<PathBuf>> {
    if !release_binary(root).is_file() {
        out.warn("Release binary not found; build CLI first");
        return Ok(None);
    }
    let version = read_project_version(root).unwrap_or_else(|| "0.1.0".to_string());
    let pkgbuild = descriptor::generate(root, &version, include_gui)?;
    Ok(Some(pkgbuild))
}

/// Locate the produced `*.pkg.tar.zst` under `pkg/`.
fn find_arch_package(root: &Path) -> Result<Option<PathBuf>> {
    let pkg_dir = root.join("pkg");
    let suffix = BundleKind::PkgTarZst.artifact_suffix();
    for entry in std::fs::read_dir(&pkg_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(suffix))
        {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_release_binary_path_uses_exe_suffix() {
        let path = release_binary(Path::new("/proj"));
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("website-searcher"));
        assert!(path.to_string_lossy().contains("target"));
    }

    #[test]
    fn test_find_arch_package_matches_suffix_only() {
        let temp = TempDir::new().unwrap();
        let pkg = temp.path().join("pkg");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("PKGBUILD"), "").unwrap();
        fs::write(pkg.join("website-searcher.log"), "").unwrap();
        assert!(find_arch_package(temp.path()).unwrap().is_none());

        fs::write(pkg.join("website-searcher-0.1.0-1-x86_64.pkg.tar.zst"), "").unwrap();
        let found = find_arch_package(temp.path()).unwrap().unwrap();
        assert!(found.to_string_lossy().ends_with(".pkg.tar.zst"));
    }

    #[test]
    fn test_descriptor_skipped_when_release_binary_missing() {
        let temp = TempDir::new().unwrap();
        let rendered =
            render_arch_descriptor(temp.path(), true, &mut OutputSink::terminal_only()).unwrap();
        assert!(rendered.is_none());
        assert!(!temp.path().join("pkg").join("PKGBUILD").exists());
    }

    #[test]
    fn test_descriptor_rendered_once_binary_exists() {
        let temp = TempDir::new().unwrap();
        let binary = release_binary(temp.path());
        fs::create_dir_all(binary.parent().unwrap()).unwrap();
        fs::write(&binary, "").unwrap();

        let rendered =
            render_arch_descriptor(temp.path(), false, &mut OutputSink::terminal_only()).unwrap();
        let pkgbuild = rendered.unwrap();
        assert_eq!(pkgbuild, temp.path().join("pkg").join("PKGBUILD"));
        assert!(pkgbuild.is_file());
    }

    #[test]
    fn test_step_list_order_builds_before_staging_and_bundling() {
        let root = PathBuf::from("/proj");
        let platform = PlatformInfo {
            os: OsFamily::Linux,
            distro_id: "arch".into(),
            distro_like: String::new(),
        };
        let ctx = BuildContext::default();
        let steps = steps(&root, &platform, &ctx);
        let names: Vec<&str> = steps.iter().map(|s| s.name()).collect();

        let build = names.iter().position(|n| *n == "build CLI (release)").unwrap();
        let sidecar = names.iter().position(|n| *n == "stage sidecar").unwrap();
        let bundle = names.iter().position(|n| *n == "tauri bundle").unwrap();
        assert!(build < sidecar && sidecar < bundle);
        // Arch host gets the packaging step even without --pacman.
        assert!(names.contains(&"arch package"));
    }

    #[test]
    fn test_pacman_step_requires_flag_or_arch_host() {
        let root = PathBuf::from("/proj");
        let platform = PlatformInfo {
            os: OsFamily::Linux,
            distro_id: "ubuntu".into(),
            distro_like: "debian".into(),
        };

        let plain = BuildContext::default();
        let names: Vec<String> = steps(&root, &platform, &plain)
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert!(!names.iter().any(|n| n == "arch package"));

        let forced = BuildContext {
            build_pacman: true,
            ..Default::default()
        };
        let names: Vec<String> = steps(&root, &platform, &forced)
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert!(names.iter().any(|n| n == "arch package"));
    }
}
