//! Replay a repeated `task_manage:list` action loop with and without the
//! governor and print both traces.
//!
//! # Examples
//!
//! ```sh
//! # Default scenario: 8 identical actions, dry-run backoff
//! cinch-governor
//!
//! # Longer run with a larger retry budget
//! cinch-governor --iterations 20 --max-retries 4
//!
//! # Settings from a TOML file, with tracing output
//! cinch-governor --config governor.toml --verbose
//! ```

use cinch_governor::prelude::*;
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const ACTION: &str = "tool_call";
const TOOL: &str = "task_manage";

/// Replay a repeated tool-call loop BEFORE/AFTER the loop governor.
#[derive(Parser)]
#[command(name = "cinch-governor", version)]
struct Cli {
    /// TOML file with governor settings (replaces the built-in scenario config)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of identical actions to replay
    #[arg(long, default_value_t = 8)]
    iterations: u64,

    // ── Overrides ──────────────────────────────────────────────
    /// Detector window size
    #[arg(long)]
    window: Option<usize>,

    /// Repeats within the window that count as a loop
    #[arg(long)]
    threshold: Option<usize>,

    /// Backoff waits served before escalating to a replan
    #[arg(long)]
    max_retries: Option<u32>,

    /// Actually sleep during backoff instead of dry-running
    #[arg(long)]
    real_sleep: bool,

    // ── Output ─────────────────────────────────────────────────
    /// Log governor decisions to stderr
    #[arg(short, long)]
    verbose: bool,
}

/// The scenario config: small window, short capped waits, two retries.
fn scenario_config() -> GovernorConfig {
    GovernorConfig::default()
        .with_detector(
            DetectorConfig::default()
                .with_window_size(6)
                .with_repeat_threshold(2),
        )
        .with_backoff(
            BackoffConfig::default()
                .with_base(Duration::from_millis(100))
                .with_multiplier(2.0)
                .with_cap(Duration::from_millis(200))
                .with_max_retries(2)
                .with_jitter(false),
        )
        .with_compressor(
            CompressorConfig::default()
                .with_trigger_iteration(15)
                .with_repeat_every(10)
                .with_max_entries_kept(20),
        )
        .with_dry_run(true)
}

fn build_config(cli: &Cli) -> Result<GovernorConfig, GovernorError> {
    let mut config = match &cli.config {
        Some(path) => GovernorConfig::load(path)?,
        None => scenario_config(),
    };
    if let Some(window) = cli.window {
        config.detector.window_size = window;
    }
    if let Some(threshold) = cli.threshold {
        config.detector.repeat_threshold = threshold;
    }
    if let Some(max_retries) = cli.max_retries {
        config.backoff.max_retries = max_retries;
    }
    if cli.real_sleep {
        config.dry_run = false;
    }
    config.validate()?;
    Ok(config)
}

fn run_before(iterations: u64) {
    println!("=== BEFORE (no governor) ===");
    println!("signature={ACTION}|{TOOL}|{{\"action\":\"list\"}}");
    for i in 1..=iterations {
        println!(
            "iter={i} action={ACTION} tool={TOOL} result=repeat_signature_unchecked \
             replanned=false exact_cycle_repeat_suppressed=false"
        );
    }
    println!("note=no loop-break condition; sequence would continue until hard cap");
}

fn run_after(config: GovernorConfig, iterations: u64) -> Result<(), GovernorError> {
    println!();
    println!("=== AFTER (with governor) ===");

    let mut governor = Governor::new(config);

    let context = vec![
        ContextEntry::step("goal", "stabilize reliability lane"),
        ContextEntry::step("trace_blob", "x".repeat(4000)),
        ContextEntry::step("debug_raw", "verbose stack dump"),
    ];
    let mut task_state = TaskState::new();
    task_state.insert("task_id".into(), "task-manage-list-loop".into());

    let trigger = governor.config().compressor.trigger_iteration;
    println!("context_len_before {}", context.len());
    let context = governor.maybe_summarize(trigger, context, Some(&task_state))?;
    println!("context_len_after {}", context.len());
    println!(
        "summary_injected {}",
        context.first().is_some_and(ContextEntry::is_summary)
    );

    let task = Task::new("Investigate repeated task_manage:list loop")
        .with_description("Apply loop suppression and safe terminal fallback");
    let record = ActionRecord::from_serializable(0, ACTION, TOOL, &json!({"action": "list"}))?;

    for iteration in 1..=iterations {
        let record = ActionRecord {
            iteration,
            ..record.clone()
        };
        let outcome = governor.check_record(&record, &context, &task)?;
        println!(
            "iter={iteration} loop={} backoff_applied={} replanned={} exact_cycle_repeat_suppressed={}",
            outcome.loop_detected,
            outcome.backoff_applied,
            outcome.force_replanned,
            outcome.intervened()
        );
        if let Some(replan) = &outcome.replan {
            println!(
                "terminal_fallback=true reason={} subtasks={}",
                replan.reason,
                replan.subtasks.len()
            );
        }
    }

    println!("loop_count {}", governor.loop_events().len());
    println!("replan_count {}", governor.replan_history().len());
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "cinch_governor=debug" } else { "error" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = build_config(&cli).and_then(|config| {
        run_before(cli.iterations);
        run_after(config, cli.iterations)
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
