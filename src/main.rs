use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;

use buildreap::config::Config;
use buildreap::driver::{Confirm, Driver, NuclearSummary, PassOptions, PassReport};
use buildreap::policy::PolicyOutcome;
use buildreap::{rlog, ArtifactScanner, BuildState, RedisStore, Result};

/// Clean up old build metadata, stuck queues and orphaned artifacts
#[derive(Parser, Debug)]
#[command(name = "buildreap")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    BUILDREAP_DEBUG=1     Enable debug logging (alternative to --debug)")]
pub struct Cli {
    /// Maximum age of builds to keep, in hours [default: 24]
    #[arg(long, value_name = "HOURS")]
    pub max_age_hours: Option<u32>,

    /// Redis host [default: localhost]
    #[arg(long)]
    pub redis_host: Option<String>,

    /// Redis port [default: 6379]
    #[arg(long)]
    pub redis_port: Option<u16>,

    /// Path to the artifacts directory [default: base/artifacts]
    #[arg(long, value_name = "PATH")]
    pub artifacts_dir: Option<String>,

    /// Show what would be cleaned without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Clean up FAILURE and ERROR builds
    #[arg(long)]
    pub clean_failed: bool,

    /// Status to clean instead of the defaults (repeatable, implies --clean-failed)
    #[arg(long = "status", value_name = "NAME")]
    pub statuses: Vec<String>,

    /// Clear the build queue if anything is left in it
    #[arg(long)]
    pub clean_queue: bool,

    /// Leave orphaned artifact directories alone
    #[arg(long)]
    pub skip_orphans: bool,

    /// Delete ALL builds and artifacts (asks for confirmation)
    #[arg(long)]
    pub nuclear: bool,

    /// Config file [default: ~/.buildreap/config.toml]
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging (writes to ~/.buildreap/buildreap.log)
    #[arg(short = 'd', long)]
    pub debug: bool,
}

impl Cli {
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        if let Some(hours) = self.max_age_hours {
            config.max_age_hours = hours;
        }
        if let Some(host) = &self.redis_host {
            config.redis_host = host.clone();
        }
        if let Some(port) = self.redis_port {
            config.redis_port = port;
        }
        if let Some(dir) = &self.artifacts_dir {
            config.artifacts_dir = dir.clone();
        }
        if !self.statuses.is_empty() {
            config.clean_statuses = self.statuses.clone();
        }
        config.validate()?;
        Ok(config)
    }

    fn pass_options(&self, config: &Config) -> Result<PassOptions> {
        let clean_statuses: Option<BTreeSet<BuildState>> =
            if self.clean_failed || !self.statuses.is_empty() {
                Some(config.statuses()?)
            } else {
                None
            };
        Ok(PassOptions {
            max_age_hours: config.max_age_hours,
            clean_statuses,
            clean_queue: self.clean_queue,
            clean_orphans: !self.skip_orphans,
            nuclear: self.nuclear,
            dry_run: self.dry_run,
        })
    }
}

/// Reads the nuclear confirmation from the terminal.
struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn ask(&mut self, summary: &NuclearSummary) -> Result<String> {
        println!("\x1b[31mWARNING: Nuclear option selected - cleaning ALL builds!\x1b[0m");
        println!(
            "This will delete {} build record(s) and {} artifact directory(ies).",
            summary.records, summary.directories
        );
        print!("Are you sure? Type 'yes' to continue: ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(input)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    buildreap::log::init(cli.debug);

    let config = cli.resolve_config()?;
    let options = cli.pass_options(&config)?;
    rlog!("buildreap invoked: {:?}", cli);

    println!("Build Cleanup Tool");
    println!("Max age: {} hours", config.max_age_hours);
    println!("Redis: {}:{}", config.redis_host, config.redis_port);
    println!("Artifacts: {}", config.artifacts_path().display());
    println!("{}", "=".repeat(50));
    if buildreap::log::is_debug() {
        if let Some(path) = buildreap::log::path() {
            println!("Debug log: {}", path.display());
        }
    }
    if options.dry_run {
        println!("DRY RUN MODE - No changes will be made");
    }

    let store = RedisStore::connect(&config.redis_host, config.redis_port)?;
    let artifacts = ArtifactScanner::new(config.artifacts_path());
    let driver = Driver::new(store, artifacts);

    let report = driver.run(&options, &mut StdinConfirm)?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &PassReport) {
    if report.cancelled {
        println!("\nNuclear cleanup cancelled");
        return;
    }

    for outcome in &report.outcomes {
        print_outcome(outcome, report.dry_run);
    }

    println!("{}", "=".repeat(50));
    if report.dry_run {
        println!("DRY RUN completed - no changes made");
        println!("Items that would be cleaned: {}", report.total());
    } else {
        println!("Cleanup complete. Total items cleaned: {}", report.total());
    }
}

fn print_outcome(outcome: &PolicyOutcome, dry_run: bool) {
    for warning in &outcome.warnings {
        println!("\x1b[33mWarning: {}\x1b[0m", warning);
    }
    for (id, reason) in &outcome.skipped {
        println!("Error processing build {}: {}", id, reason);
    }
    for eviction in &outcome.evicted {
        if dry_run {
            println!("[dry run] {}", eviction);
        } else {
            println!("{}", eviction);
        }
    }
    for (id, error) in &outcome.failed {
        println!("\x1b[31mFailed to remove {}: {}\x1b[0m", id, error);
    }

    let mut summary = format!("[{}] cleaned {}", outcome.policy, outcome.cleaned);
    if outcome.already_gone > 0 {
        summary.push_str(&format!(", {} already gone", outcome.already_gone));
    }
    if !outcome.skipped.is_empty() {
        summary.push_str(&format!(", {} skipped", outcome.skipped.len()));
    }
    if !outcome.failed.is_empty() {
        summary.push_str(&format!(", {} failed", outcome.failed.len()));
    }
    println!("{}", summary);
}
