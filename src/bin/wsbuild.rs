//! wsbuild - build/test/release orchestrator for website-searcher.
//!
//! Exit codes: 0 full success, 1 any failed step or fatal error, 130
//! external interrupt.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use wsbuild::context::{BuildContext, TestSelection};
use wsbuild::output::OutputSink;
use wsbuild::pipeline::{is_interrupt, run_pipeline};
use wsbuild::platform::PlatformInfo;
use wsbuild::runner::install_interrupt_handler;
use wsbuild::version::set_version;
use wsbuild::{tasks, PipelineReport};

#[derive(Parser)]
#[command(name = "wsbuild", version, about = "Build the website-searcher project")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile, lint, stage and bundle the application
    Build {
        /// Show full command output
        #[arg(short, long)]
        verbose: bool,
        /// Enable logging to a timestamped file
        #[arg(short, long)]
        log: bool,
        /// Force .deb bundle (Linux only)
        #[arg(short, long)]
        deb: bool,
        /// Force .rpm bundle (Linux only)
        #[arg(short, long)]
        rpm: bool,
        /// Build Arch Linux .pkg.tar.zst package
        #[arg(short, long)]
        pacman: bool,
        /// Exclude GUI from the Arch package
        #[arg(long)]
        nogui: bool,
    },
    /// Run the project test suites
    Test {
        /// Run Rust tests
        #[arg(short, long)]
        rust: bool,
        /// Run GUI tests
        #[arg(short, long)]
        gui: bool,
        /// Run E2E tests
        #[arg(short, long)]
        e2e: bool,
        /// Run Clippy
        #[arg(short, long)]
        clippy: bool,
        /// Run cargo audit
        #[arg(short, long)]
        audit: bool,
        /// Generate coverage reports
        #[arg(long)]
        coverage: bool,
        /// Run all suites (default when no suite is selected)
        #[arg(long)]
        all: bool,
        /// Show full command output
        #[arg(short, long)]
        verbose: bool,
        /// Enable logging to a timestamped file
        #[arg(short, long)]
        log: bool,
    },
    /// Update the project version across all manifests
    SetVersion {
        /// New version, MAJOR.MINOR.PATCH
        version: String,
    },
}

fn main() -> ExitCode {
    // Keeps the orchestrator alive across Ctrl-C so the run can report the
    // interrupt, write its summary and flush the log before exiting 130.
    if let Err(err) = install_interrupt_handler() {
        eprintln!(
            "{}",
            console::style(format!("Warning: could not install Ctrl-C handler: {err}")).yellow()
        );
    }

    let cli = Cli::parse();
    let code = match dispatch(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}", console::style(format!("Error: {err:#}")).red());
            if is_interrupt(&err) {
                130
            } else {
                1
            }
        }
    };
    ExitCode::from(code as u8)
}

fn dispatch(cli: Cli) -> Result<i32> {
    let root = std::env::current_dir().context("resolving current directory")?;

    match cli.command {
        Command::Build {
            verbose,
            log,
            deb,
            rpm,
            pacman,
            nogui,
        } => {
            let ctx = BuildContext {
                verbose,
                logging_enabled: log,
                force_deb: deb,
                force_rpm: rpm,
                build_pacman: pacman,
                exclude_gui: nogui,
            };
            let mut out = open_sink(&ctx, &root, "build-script")?;
            let platform = PlatformInfo::detect();
            let steps = tasks::build::steps(&root, &platform, &ctx);
            let report = run_pipeline("build", steps, &ctx, &mut out);
            finish(&report, &mut out, "Build complete!", "Build failed");
            Ok(report.exit_code())
        }
        Command::Test {
            rust,
            gui,
            e2e,
            clippy,
            audit,
            coverage,
            all,
            verbose,
            log,
        } => {
            let ctx = BuildContext {
                verbose,
                logging_enabled: log,
                ..Default::default()
            };
            let selection = TestSelection::resolve(clippy, rust, gui, e2e, audit, all, coverage);
            let mut out = open_sink(&ctx, &root, "test-script")?;
            out.print("");
            out.step("Website Searcher test suite");
            let steps = tasks::test::steps(&root, selection);
            let report = run_pipeline("test", steps, &ctx, &mut out);
            finish(&report, &mut out, "All tests passed!", "Some tests failed.");
            Ok(report.exit_code())
        }
        Command::SetVersion { version } => {
            let mut out = OutputSink::terminal_only();
            set_version(&root, &version, &mut out)?;
            out.print("Run `wsbuild build` to apply changes.");
            Ok(0)
        }
    }
}

fn open_sink(ctx: &BuildContext, root: &std::path::Path, prefix: &str) -> Result<OutputSink> {
    if ctx.logging_enabled {
        OutputSink::open(root, prefix)
    } else {
        Ok(OutputSink::terminal_only())
    }
}

fn finish(report: &PipelineReport, out: &mut OutputSink, ok_msg: &str, fail_msg: &str) {
    out.print("");
    if report.interrupted {
        out.warn("Interrupted");
    } else if report.all_passed() {
        out.success(ok_msg);
    } else {
        out.error(fail_msg);
    }
}
