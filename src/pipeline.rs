//! Step pipeline: ordered named steps with per-step failure policy.
//!
//! A fatal step that fails aborts everything after it; an advisory step
//! logs its failure and lets the rest run. The pipeline's overall result is
//! the AND of all recorded results. An interrupt observed during a command
//! is reported as its own outcome so the caller can exit with 130.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use time::OffsetDateTime;

use crate::context::BuildContext;
use crate::output::OutputSink;
use crate::runner::{interrupt_requested, ExecutionError};

/// Everything a step action gets to work with.
pub struct StepContext<'a> {
    pub build: &'a BuildContext,
    pub out: &'a mut OutputSink,
}

type StepAction<'a> = Box<dyn FnMut(&mut StepContext<'_>) -> Result<()> + 'a>;

/// One named pipeline step.
pub struct Step<'a> {
    name: String,
    fatal: bool,
    action: StepAction<'a>,
}

impl<'a> Step<'a> {
    /// A step whose failure aborts the whole pipeline.
    pub fn fatal(
        name: impl Into<String>,
        action: impl FnMut(&mut StepContext<'_>) -> Result<()> + 'a,
    ) -> Self {
        Self {
            name: name.into(),
            fatal: true,
            action: Box::new(action),
        }
    }

    /// A step whose failure is recorded but does not stop later steps.
    pub fn advisory(
        name: impl Into<String>,
        action: impl FnMut(&mut StepContext<'_>) -> Result<()> + 'a,
    ) -> Self {
        Self {
            name: name.into(),
            fatal: false,
            action: Box::new(action),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal
    }
}

/// Outcome of a pipeline run.
#[derive(Debug)]
pub struct PipelineReport {
    /// Step name and pass/fail, in execution order. Steps after an abort
    /// never appear here.
    pub results: Vec<(String, bool)>,
    /// Name of the fatal step that aborted the run, if any.
    pub aborted: Option<String>,
    /// An external interrupt ended the run.
    pub interrupted: bool,
}

impl PipelineReport {
    /// Logical AND of all recorded results, false when aborted.
    pub fn all_passed(&self) -> bool {
        self.aborted.is_none() && !self.interrupted && self.results.iter().all(|(_, ok)| *ok)
    }

    /// Process exit code: 0 full success, 1 any failure, 130 interrupt.
    pub fn exit_code(&self) -> i32 {
        if self.interrupted {
            130
        } else if self.all_passed() {
            0
        } else {
            1
        }
    }
}

#[derive(Serialize)]
struct RunSummary<'a> {
    pipeline: &'a str,
    started_at_utc: String,
    results: Vec<SummaryEntry<'a>>,
    succeeded: bool,
}

#[derive(Serialize)]
struct SummaryEntry<'a> {
    step: &'a str,
    ok: bool,
}

/// Drive an ordered list of steps to completion or abort.
pub fn run_pipeline(
    name: &str,
    steps: Vec<Step<'_>>,
    build: &BuildContext,
    out: &mut OutputSink,
) -> PipelineReport {
    let started_at = now_utc_string();
    let mut report = PipelineReport {
        results: Vec::new(),
        aborted: None,
        interrupted: false,
    };

    let mut ctx = StepContext { build, out };
    for mut step in steps {
        // Ctrl-C between commands leaves no signal-terminated child to
        // classify; the handler's flag covers that window.
        if interrupt_requested() {
            ctx.out.warn(&format!("{name} interrupted"));
            report.interrupted = true;
            break;
        }
        ctx.out.step(&step.name);
        match (step.action)(&mut ctx) {
            Ok(()) => report.results.push((step.name, true)),
            Err(err) => {
                if is_interrupt(&err) {
                    ctx.out.warn(&format!("{name} interrupted"));
                    report.results.push((step.name, false));
                    report.interrupted = true;
                    break;
                }
                ctx.out.error(&format!("{err:#}"));
                report.results.push((step.name.clone(), false));
                if step.fatal {
                    report.aborted = Some(step.name);
                    break;
                }
            }
        }
    }
    if !report.interrupted && interrupt_requested() {
        report.interrupted = true;
    }

    print_summary(name, &report, ctx.out);
    write_summary(name, &started_at, &report, ctx.out);
    report
}

/// Whether an error chain bottoms out in an external interrupt.
pub fn is_interrupt(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<ExecutionError>(),
            Some(ExecutionError::Interrupted { .. })
        )
    })
}

fn print_summary(name: &str, report: &PipelineReport, out: &mut OutputSink) {
    out.print("");
    out.step(&format!("{name} summary"));
    for (step, ok) in &report.results {
        if *ok {
            out.success(step);
        } else {
            out.error(&format!("{step} failed"));
        }
    }
    if let Some(aborted) = &report.aborted {
        out.error(&format!("aborted at step '{aborted}'"));
    }
}

/// Persist the results map next to the log when logging is enabled, named
/// after the log prefix.
fn write_summary(name: &str, started_at: &str, report: &PipelineReport, out: &mut OutputSink) {
    let Some(log_path) = out.log_path() else {
        return;
    };
    let prefix = out.log_prefix().unwrap_or(name).to_string();
    let dir = log_path.parent().unwrap_or(Path::new("."));
    let path = dir.join(format!("{prefix}-summary.json"));

    let summary = RunSummary {
        pipeline: name,
        started_at_utc: started_at.to_string(),
        results: report
            .results
            .iter()
            .map(|(step, ok)| SummaryEntry { step, ok: *ok })
            .collect(),
        succeeded: report.all_passed(),
    };
    let json = match serde_json::to_string_pretty(&summary) {
        Ok(json) => json,
        Err(err) => {
            out.warn(&format!("could not serialize run summary: {err}"));
            return;
        }
    };
    if let Err(err) = std::fs::write(&path, json) {
        out.warn(&format!(
            "could not write run summary '{}': {err}",
            path.display()
        ));
    }
}

fn now_utc_string() -> String {
    let now = OffsetDateTime::now_utc();
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}
