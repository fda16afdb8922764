//! buildgate - dependency-ordered build verification
//!
//! ## Commands
//!
//! - `verify`: run the full verification pipeline (compile, tests, style,
//!   bug-pattern, security-pattern, coverage, mutation testing)
//! - `fix-indent`: convert leading 4-space indentation groups to tabs
//!   across a source tree
//!
//! Both commands exit 0 on overall success and non-zero on failure.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;

use buildgate_core::{
    default_pipeline, init_tracing, FsReportSink, PipelineRunner, PipelineSpec, ProcessInvoker,
    TaskGraph, Verdict, VerifierConfig,
};
use buildgate_indent::IndentationNormalizer;

#[derive(Parser)]
#[command(name = "buildgate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Dependency-ordered build verification", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full verification pipeline
    Verify {
        /// Workspace path (default: current directory)
        #[arg(short, long, default_value = ".")]
        workspace: PathBuf,

        /// Pipeline definition file (JSON). Omit for the builtin pipeline.
        #[arg(short, long)]
        pipeline: Option<PathBuf>,

        /// Report output directory (default: <workspace>/build/reports)
        #[arg(long)]
        report_dir: Option<PathBuf>,

        /// Also write a machine-readable verdict summary to this path
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// Convert space indentation to tabs across a source tree
    FixIndent {
        /// Root directory to process
        #[arg(default_value = ".")]
        root: PathBuf,

        /// File extensions to include (repeatable)
        #[arg(short, long, default_value = "java")]
        ext: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    match cli.command {
        Commands::Verify {
            workspace,
            pipeline,
            report_dir,
            summary,
        } => {
            cmd_verify(
                &workspace,
                pipeline.as_deref(),
                report_dir,
                summary.as_deref(),
            )
            .await
        }
        Commands::FixIndent { root, ext } => cmd_fix_indent(&root, &ext),
    }
}

/// Run the verification pipeline and report the verdict.
async fn cmd_verify(
    workspace: &std::path::Path,
    pipeline: Option<&std::path::Path>,
    report_dir: Option<PathBuf>,
    summary: Option<&std::path::Path>,
) -> Result<()> {
    let mut config = VerifierConfig::for_workspace(workspace);
    if let Some(dir) = report_dir {
        config = config.with_report_dir(dir);
    }

    let stages = match pipeline {
        Some(path) => PipelineSpec::load(path)?.stages,
        None => default_pipeline(),
    };

    // Graph validation failures abort before any stage runs.
    let graph = TaskGraph::new(stages).context("invalid pipeline definition")?;

    println!("Verifying workspace: {}", config.workspace.display());
    println!("Reports: {}", config.report_dir.display());
    println!();

    let runner = PipelineRunner::new(Arc::new(ProcessInvoker), Arc::new(FsReportSink), config);
    let run = runner
        .run(&graph)
        .await
        .context("pipeline failed to run")?;

    println!("Run ID: {}", run.run_id);
    for result in run.results() {
        let status = match result.outcome {
            buildgate_core::StageOutcome::Passed => "✓",
            buildgate_core::StageOutcome::Failed => "✗",
            buildgate_core::StageOutcome::Skipped => "-",
        };
        println!(
            "  {} {} ({}ms){}",
            status,
            result.stage_id,
            result.duration_ms,
            result
                .detail
                .as_deref()
                .map(|d| format!(" — {d}"))
                .unwrap_or_default()
        );
    }

    let verdict = Verdict::evaluate(&run, &graph);
    println!();
    println!(
        "Summary: {}/{} stages passed, {} skipped",
        run.passed_count(),
        run.results().len(),
        run.skipped_count()
    );
    println!(
        "Verdict: {} — {}",
        if verdict.succeeded {
            "✓ PASSED"
        } else {
            "✗ FAILED"
        },
        verdict.message
    );

    if let Some(path) = summary {
        let body = serde_json::to_string_pretty(&verdict)?;
        std::fs::write(path, body)
            .with_context(|| format!("failed to write summary {}", path.display()))?;
    }

    if verdict.succeeded {
        Ok(())
    } else {
        anyhow::bail!("verification failed")
    }
}

/// Normalize indentation across a source tree.
fn cmd_fix_indent(root: &std::path::Path, extensions: &[String]) -> Result<()> {
    let exts: Vec<&str> = extensions.iter().map(String::as_str).collect();

    println!("Converting spaces to tabs under: {}", root.display());

    let summary = IndentationNormalizer::new().run(root, &exts)?;

    println!(
        "Processed {} file(s): {} fixed, {} already clean, {} failed",
        summary.scanned, summary.changed, summary.unchanged, summary.failed
    );
    Ok(())
}
