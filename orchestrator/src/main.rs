//! Main entry point for the orchestrator binary
//!
//! Wires the file-backed services and the simulated browser collaborators
//! into an `Orchestrator`, and hosts the reporting and maintenance commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};

use orchestrator::core::performance::{self, LogAnalysis};
use orchestrator::services::{
    AutoLoginPrompt, FileResultSink, JsonFileBackend, PerformanceHistory, SimulatedApplier,
    SimulatedJobSource, SimulatedSessionProvider, TerminalLoginPrompt,
};
use orchestrator::{
    DedupStore, LoginPrompt, Orchestrator, RateLimitPolicy, RateLimiter, Services, SessionProvider,
};
use shared::{logging, RunConfig, RunMode};

const DEFAULT_CONFIG: &str = "config.json";
const CONFIG_ENV: &str = "APPLY_CONFIG";

/// Multi-profile job application scheduler
#[derive(Parser)]
#[command(name = "orchestrator")]
#[command(about = "Runs job-application sessions across several profiles with shared dedup and pacing")]
pub struct Args {
    /// Run configuration file (falls back to $APPLY_CONFIG, then config.json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Data directory overriding the configured one
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run every configured profile against the search queue
    Run {
        /// sequential or parallel
        #[arg(long)]
        mode: Option<RunMode>,

        /// Maximum concurrent sessions in parallel mode
        #[arg(long)]
        max_concurrent: Option<usize>,

        /// Seed for delays and simulated collaborators
        #[arg(long)]
        seed: Option<u64>,

        /// Skip every pacing delay
        #[arg(long)]
        no_delays: bool,

        /// Probability that a simulated application succeeds
        #[arg(long, default_value = "0.7")]
        success_rate: f64,

        /// Wait for Enter on stdin when a session is not logged in
        #[arg(long)]
        interactive_login: bool,
    },
    /// Per-profile report over all result logs
    Report,
    /// Snapshot history of the last N days
    Trends {
        #[arg(long, default_value = "7")]
        days: u32,
    },
    /// Back up applied_jobs.json and start from an empty record
    ResetApplied,
    /// Delete result logs older than N days
    CleanupLogs {
        #[arg(long, default_value = "30")]
        days: u32,
    },
    /// Open and close each configured profile
    CheckProfiles,
}

fn config_path(arg: Option<PathBuf>) -> PathBuf {
    arg.or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG))
}

fn load_config(path: &Path) -> anyhow::Result<RunConfig> {
    if path.exists() {
        RunConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
    } else {
        tracing::warn!("Config file {} not found, using defaults", path.display());
        Ok(RunConfig::default())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    logging::init_tracing_with_level(Some(&args.log_level));

    let mut config = load_config(&config_path(args.config))?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }

    match args.command {
        Command::Run {
            mode,
            max_concurrent,
            seed,
            no_delays,
            success_rate,
            interactive_login,
        } => {
            if let Some(mode) = mode {
                config.schedule.mode = mode;
            }
            if let Some(max_concurrent) = max_concurrent {
                config.schedule.max_concurrent = max_concurrent;
            }
            if seed.is_some() {
                config.schedule.seed = seed;
            }
            run(config, no_delays, success_rate, interactive_login).await
        }
        Command::Report => report(&config).await,
        Command::Trends { days } => trends(&config, days).await,
        Command::ResetApplied => reset_applied(&config).await,
        Command::CleanupLogs { days } => cleanup_logs(&config, days).await,
        Command::CheckProfiles => check_profiles(&config).await,
    }
}

async fn run(
    config: RunConfig,
    no_delays: bool,
    success_rate: f64,
    interactive_login: bool,
) -> anyhow::Result<()> {
    let seed = config.schedule.seed.unwrap_or_else(rand::random);
    tracing::info!("🧪 Using simulated browser collaborators (seed {})", seed);

    let store = DedupStore::open(
        Arc::new(JsonFileBackend::in_dir(&config.data_dir)),
        config.limits.allow_retry,
    )
    .await?;
    let login: Arc<dyn LoginPrompt> = if interactive_login {
        Arc::new(TerminalLoginPrompt::stdin())
    } else {
        Arc::new(AutoLoginPrompt)
    };
    let services = Services {
        sessions: Arc::new(SimulatedSessionProvider::new()),
        login,
        jobs: Arc::new(SimulatedJobSource::new(seed)),
        applier: Arc::new(SimulatedApplier::new(seed, success_rate)),
        sink: Arc::new(FileResultSink::in_dir(&config.data_dir)),
    };

    let history = PerformanceHistory::in_dir(&config.data_dir);
    let mut orchestrator = Orchestrator::new(config, services, Arc::new(store))?;
    if no_delays {
        let limits = &orchestrator.config().limits;
        let policy = RateLimitPolicy::immediate(
            limits.max_applications_per_profile,
            limits.max_applications_per_run,
        );
        orchestrator = orchestrator.with_rate_limiter(RateLimiter::with_seed(policy, seed));
    }

    let summary = orchestrator.run().await?;
    history.append(&summary.to_snapshot()).await?;
    logging::log_success(&format!("Performance snapshot saved to {}", history.path().display()));
    logging::log_shutdown("all sessions finished");
    Ok(())
}

async fn report(config: &RunConfig) -> anyhow::Result<()> {
    let sink = FileResultSink::in_dir(&config.data_dir);
    let records = sink.read_all().await?;
    if records.is_empty() {
        println!("No result logs found in {}", sink.dir().display());
        return Ok(());
    }
    let analysis = LogAnalysis::from_records(&records);

    println!("{}", "=".repeat(60));
    println!("MULTI-PROFILE PERFORMANCE REPORT");
    println!("{}", "=".repeat(60));
    println!("Report generated: {}\n", Local::now().format("%Y-%m-%d %H:%M:%S"));

    println!("OVERALL STATISTICS:");
    println!("Total Profiles: {}", analysis.profiles.len());
    println!("Total Applications: {}", analysis.total_applications());
    println!("Successful Applications: {}", analysis.total_successful());
    println!("Failed Applications: {}", analysis.total_failed());
    if analysis.total_applications() > 0 {
        println!("Overall Success Rate: {:.1}%", analysis.success_rate());
    }
    println!("\n{}\n", "-".repeat(60));

    println!("PROFILE-BY-PROFILE BREAKDOWN:\n");
    for (name, profile) in &analysis.profiles {
        println!("Profile: {name}");
        println!("  Active Days: {}", profile.active_days.len());
        println!("  Total Applications: {}", profile.total_applications);
        println!("  Successful: {}", profile.successful);
        println!("  Failed: {}", profile.failed);
        if profile.total_applications > 0 {
            println!("  Success Rate: {:.1}%", profile.success_rate());
        }
        println!("  Blacklisted Encounters: {}", profile.blacklisted);
        println!("  Already Applied: {}", profile.already_applied);
        if !profile.active_days.is_empty() {
            println!("  Average Applications/Day: {:.1}", profile.applications_per_day());
        }
        println!();
    }

    if let Some((name, best)) = analysis.best_profile() {
        println!("{}", "-".repeat(60));
        println!("BEST PERFORMING PROFILE: {name}");
        println!("With {} successful applications", best.successful);
    }

    let recommendations = analysis.recommendations();
    if !recommendations.is_empty() {
        println!("\nRECOMMENDATIONS:\n");
        for rec in recommendations {
            println!("  {}: {}", rec.profile, rec.advice.message());
        }
    }
    println!("\n{}", "=".repeat(60));
    Ok(())
}

async fn trends(config: &RunConfig, days: u32) -> anyhow::Result<()> {
    let history = PerformanceHistory::in_dir(&config.data_dir);
    let snapshots = history.load().await?;
    if snapshots.is_empty() {
        println!("No performance history found in {}", history.path().display());
        return Ok(());
    }

    println!("\nPERFORMANCE TRENDS (Last {days} days):");
    let by_profile = performance::trends(&snapshots, days, Utc::now());
    if by_profile.is_empty() {
        println!("No data available for the specified period.");
    }
    for (profile, points) in by_profile {
        println!("\nProfile: {profile}");
        println!("Date       | Apps | Success | Rate");
        println!("{}", "-".repeat(38));
        for point in points {
            println!(
                "{} | {:4} | {:7} | {:4.1}%",
                point.date, point.applications, point.successes, point.success_rate
            );
        }
    }
    Ok(())
}

async fn reset_applied(config: &RunConfig) -> anyhow::Result<()> {
    let backend = JsonFileBackend::in_dir(&config.data_dir);
    match backend.backup_and_reset().await? {
        Some(backup) => logging::log_success(&format!("Backed up applied jobs to {}", backup.display())),
        None => logging::log_progress("Reset", "no applied jobs record to back up"),
    }
    logging::log_success(&format!("Reset {}", backend.path().display()));
    Ok(())
}

async fn cleanup_logs(config: &RunConfig, days: u32) -> anyhow::Result<()> {
    let sink = FileResultSink::in_dir(&config.data_dir);
    let removed = sink.cleanup_older_than(days, Local::now().date_naive()).await?;
    for path in &removed {
        logging::log_progress("Removed", &path.display().to_string());
    }
    logging::log_success(&format!("Removed {} result logs older than {} days", removed.len(), days));
    Ok(())
}

async fn check_profiles(config: &RunConfig) -> anyhow::Result<()> {
    let provider = SimulatedSessionProvider::new();
    let mut working = 0;

    for profile in &config.profiles {
        let status = match provider.open(profile).await {
            Ok(handle) => {
                let authenticated = provider.is_authenticated(&handle).await.unwrap_or(false);
                provider.close(handle).await?;
                if authenticated {
                    working += 1;
                    "✅ working"
                } else {
                    "⚠️ opened, not logged in"
                }
            }
            Err(e) => {
                logging::log_error(&format!("Opening {}", profile.display_name()), &e);
                "❌ failed"
            }
        };
        println!("{} ({}): {}", profile.display_name(), profile.id, status);
    }

    println!("\n{}/{} profiles working", working, config.profiles.len());
    Ok(())
}
