//! qcrun CLI - Single-Job Execution Harness
//!
//! Runs one compute job with managed resources, scratch isolation and
//! failure diagnosis.

use clap::Parser;
use qcrun::config::{CliArgs, Commands, JobDescriptor, OutputFormat, RunConfig};
use qcrun::error::Result;
use qcrun::progress::ProgressReporter;
use qcrun::resources::is_executable;
use qcrun::runner::{explain, run_job};
use tracing_subscriber::EnvFilter;

fn main() {
    let args = CliArgs::parse();

    // Initialize logging; RUST_LOG wins, -v raises the default level
    let default_filter = match args.verbose {
        0 => "qcrun=warn",
        1 => "qcrun=info",
        2 => "qcrun=debug",
        _ => "qcrun=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: CliArgs) -> Result<()> {
    let config = RunConfig::from_cli(&args);

    if let Some(command) = &args.command {
        return match command {
            Commands::Analyze { ranks } => cmd_analyze(&config, *ranks),
        };
    }

    let job = JobDescriptor::from_cli(&args)?;

    if args.explain {
        let (plan, preview) = explain(&config, &job)?;
        print_plan(&plan);
        println!("Command:      {}", preview);
        println!("Workspace:    {}/{}_{}_<pid> (not created)", config.scratch_base.display(), config.workspace_prefix, job.name);
        return Ok(());
    }

    let progress = if args.quiet {
        ProgressReporter::disabled()
    } else if args.progress {
        ProgressReporter::new()
    } else {
        ProgressReporter::disabled()
    };

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| qcrun::QcrunError::config(format!("failed to start runtime: {}", e)))?;
    let report = rt.block_on(run_job(&config, &job, progress))?;

    match args.output_format {
        OutputFormat::Text => {
            if !args.quiet {
                report.print_summary();
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| qcrun::QcrunError::config(format!("report serialization: {}", e)))?;
            println!("{}", json);
        }
    }

    if !report.result.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_plan(plan: &qcrun::ResourcePlan) {
    println!("=== Resource Plan ===");
    println!("Mode:         {}", plan.mode.name());
    println!("Executable:   {}", plan.executable.display());
    println!("Ranks:        {}", plan.rank_count);
    println!("Threads/rank: {}", plan.threads_per_rank);
    println!("Total cores:  {}", plan.total_cores);
    for (key, value) in plan.env_vars() {
        println!("Env:          {}={}", key, value);
    }
    for note in &plan.notes {
        println!("Warning:      {}", note);
    }
}

fn cmd_analyze(config: &RunConfig, ranks: i64) -> Result<()> {
    println!("=== System ===");
    println!("Logical cores:  {}", num_cpus::get());
    println!("Physical cores: {}", num_cpus::get_physical());
    println!("Planned cores:  {}", config.resolve_cores());
    println!();
    println!("=== Executables ===");
    for (label, path) in [("serial", &config.serial_exe), ("hybrid", &config.hybrid_exe)] {
        let status = if is_executable(path) { "ok" } else { "missing" };
        println!("{}: {} ({})", label, path.display(), status);
    }
    println!();

    // Pure arithmetic preview so analyze works on hosts without the
    // binaries installed
    if ranks < 0 {
        return Err(qcrun::QcrunError::validation(format!(
            "rank count must be a non-negative integer, got {}",
            ranks
        )));
    }
    let cores = config.resolve_cores();
    let ranks = ranks as usize;
    println!("=== Plan for --ranks {} ===", ranks);
    if ranks <= 1 {
        println!("Mode:         serial");
        println!("Threads:      {}", cores);
    } else {
        println!("Mode:         hybrid");
        println!("Ranks:        {}", ranks);
        println!("Threads/rank: {}", (cores / ranks).max(1));
        if ranks > cores {
            println!("Warning:      ranks oversubscribe cores; threads floored to 1");
        }
    }
    Ok(())
}
