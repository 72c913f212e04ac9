//! Build, test and packaging orchestration for the website-searcher
//! desktop application.
//!
//! The project ships a native CLI binary plus an optional Tauri desktop
//! shell, packaged as MSI on Windows, DMG on macOS and
//! AppImage/DEB/RPM/pkg.tar.zst on Linux. This crate sequences the
//! external tools that produce those artifacts; it does not compile code
//! or implement packaging formats itself.
//!
//! # Architecture
//!
//! ```text
//! wsbuild (bin)
//!     │
//!     ├── tasks::build / tasks::test   ordered step lists
//!     │       └── pipeline             fatal/advisory step execution
//!     │               └── runner       streamed/quiet/passthrough commands
//!     │                       └── output   terminal + ANSI-stripped log
//!     │
//!     ├── platform ──► policy          host facts ──► bundle set
//!     ├── descriptor                   PKGBUILD generation (Arch)
//!     ├── wix                          manual MSI link fallback (Windows)
//!     └── version                      project-wide version rewrite
//! ```
//!
//! Execution is strictly sequential: one control thread drives the steps,
//! and within a streamed command only pipe-reader threads run alongside
//! it. The log file and the PATH augmentation are the only cross-step
//! mutable state, both touched solely by the control thread.

pub mod context;
pub mod descriptor;
pub mod output;
pub mod pipeline;
pub mod platform;
pub mod policy;
pub mod runner;
pub mod tasks;
pub mod version;
pub mod wix;

pub use context::{BuildContext, TestSelection};
pub use pipeline::{run_pipeline, PipelineReport, Step, StepContext};
pub use platform::{OsFamily, PlatformInfo};
pub use runner::{run, CommandOutcome, CommandSpec, ExecutionError};
