//! Run-wide configuration.
//!
//! `BuildContext` is resolved once from CLI flags and passed by reference
//! into every component. Nothing mutates it after construction; the log
//! handle lives in [`crate::output::OutputSink`], not here.

/// Immutable configuration for one orchestrator run.
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    /// Stream full command output to the terminal.
    pub verbose: bool,
    /// Mirror all output into a timestamped log file.
    pub logging_enabled: bool,
    /// Force a .deb bundle on Linux regardless of the detected distro.
    pub force_deb: bool,
    /// Force a .rpm bundle on Linux regardless of the detected distro.
    pub force_rpm: bool,
    /// Build the Arch Linux .pkg.tar.zst package.
    pub build_pacman: bool,
    /// Leave the GUI binary out of the Arch package.
    pub exclude_gui: bool,
}

impl BuildContext {
    /// Whether command output must be streamed line-by-line.
    ///
    /// Streaming is the only path that reaches the log file, so it is
    /// mandatory whenever verbose or logging is requested.
    pub fn stream_output(&self) -> bool {
        self.verbose || self.logging_enabled
    }
}

/// Which test suites a `wsbuild test` invocation runs.
///
/// Resolved once from CLI flags: with no specific selection (and no
/// `--all`), everything runs.
#[derive(Debug, Clone, Copy)]
pub struct TestSelection {
    pub clippy: bool,
    pub rust: bool,
    pub gui: bool,
    pub e2e: bool,
    pub audit: bool,
    /// Generate coverage reports where the suite supports it.
    pub coverage: bool,
}

impl TestSelection {
    pub fn resolve(
        clippy: bool,
        rust: bool,
        gui: bool,
        e2e: bool,
        audit: bool,
        all: bool,
        coverage: bool,
    ) -> Self {
        let has_specific = clippy || rust || gui || e2e || audit;
        let run_all = all || !has_specific;
        Self {
            clippy: clippy || run_all,
            rust: rust || run_all,
            gui: gui || run_all,
            e2e: e2e || run_all,
            audit: audit || run_all,
            coverage,
        }
    }
}
