//! Manual MSI link fallback.
//!
//! The desktop bundler occasionally fails to complete its own internal link
//! step on Windows; re-running the two low-level WiX phases (candle, then
//! light) against the already-generated sources recovers the common case
//! without a full rebuild. This path is best-effort: it runs only after the
//! bundler step has already failed, and its own failure is reported but
//! never escalates further.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::context::BuildContext;
use crate::output::OutputSink;
use crate::platform::OsFamily;
use crate::runner::{run, CommandSpec, ExecutionError};
use crate::version::read_project_version;

const WIX_EXTENSIONS: [&str; 4] = ["-ext", "WixUIExtension", "-ext", "WixUtilExtension"];

/// Default install root of the bundler-provisioned WiX toolset.
pub fn wix_toolset_root() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tauri").join("WixTools314"))
}

/// Compiled object produced by the candle phase.
pub fn wixobj_path(root: &Path) -> PathBuf {
    root.join("target/release/wix/x64/main.wixobj")
}

/// Deterministic path of the recovered installer artifact.
pub fn msi_output_path(root: &Path, version: &str) -> PathBuf {
    root.join("target/release/bundle/msi")
        .join(format!("website-searcher_{version}_x64_en-US.msi"))
}

/// Attempt the manual two-phase link. No-op off Windows.
pub fn manual_link_msi(root: &Path, ctx: &BuildContext, out: &mut OutputSink) -> Result<()> {
    if OsFamily::host() != OsFamily::Windows {
        return Ok(());
    }
    let Some(wix_root) = wix_toolset_root() else {
        out.warn("could not resolve the local application data directory");
        return Ok(());
    };
    run_fallback(root, &wix_root, ctx, out)
}

/// The fallback state machine, with the toolset root injected.
///
/// Aborts (with a warning) when the toolset or the packaging source is
/// missing; the link phase is never attempted after a failed compile.
pub fn run_fallback(
    root: &Path,
    wix_root: &Path,
    ctx: &BuildContext,
    out: &mut OutputSink,
) -> Result<()> {
    if !wix_root.exists() {
        out.warn(&format!("WiX tools not found at {}", wix_root.display()));
        return Ok(());
    }

    let wxs = root.join("src-tauri/wix/main.wxs");
    if !wxs.is_file() {
        out.warn(&format!("WiX source not found: {}", wxs.display()));
        return Ok(());
    }

    let obj = wixobj_path(root);
    let version = read_project_version(root).unwrap_or_else(|| "0.1.0".to_string());
    let out_file = msi_output_path(root, &version);

    // Directory creation is not a failure point worth distinguishing from
    // the compile step itself.
    if let Some(parent) = obj.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Some(parent) = out_file.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    out.print(&format!("Manual WiX compile (candle) -> {}", obj.display()));
    let candle = wix_root.join("candle.exe");
    let obj_dir_arg = format!(
        "{}{}",
        obj.parent().unwrap_or(Path::new(".")).display(),
        std::path::MAIN_SEPARATOR
    );
    let compile = CommandSpec::new(candle.display().to_string())
        .args(WIX_EXTENSIONS)
        .args(["-arch", "x64"])
        .arg("-out")
        .arg(obj_dir_arg)
        .arg(wxs.display().to_string())
        .current_dir(root.join("src-tauri"))
        .tolerate_failure();

    match run(&compile, ctx, out) {
        Ok(outcome) if outcome.succeeded => {}
        Ok(_) => {
            out.warn("candle.exe failed");
            return Ok(());
        }
        Err(err @ ExecutionError::Interrupted { .. }) => return Err(err.into()),
        Err(err) => {
            out.warn(&format!("candle.exe could not run: {err}"));
            return Ok(());
        }
    }

    out.print(&format!("Manual WiX link (light) -> {}", out_file.display()));
    let light = wix_root.join("light.exe");
    let link = CommandSpec::new(light.display().to_string())
        .args(WIX_EXTENSIONS)
        .arg(obj.display().to_string())
        .arg("-out")
        .arg(out_file.display().to_string())
        .tolerate_failure();

    match run(&link, ctx, out) {
        Ok(outcome) if outcome.succeeded => {
            out.success(&format!("Recovered installer: {}", out_file.display()));
        }
        Ok(_) => out.warn("light.exe failed"),
        Err(err @ ExecutionError::Interrupted { .. }) => return Err(err.into()),
        Err(err) => out.warn(&format!("light.exe could not run: {err}")),
    }
    Ok(())
}
