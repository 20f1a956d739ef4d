//! # Pushcamp — MFA Push Campaign Runner
//!
//! Sends controlled batches of MFA push notifications to directory accounts
//! during authorized security assessments, recording one outcome per account
//! in a resumable CSV log.
//!
//! Usage:
//!   pushcamp api-1234abcd.duosecurity.com -b 3 -t 300
//!   pushcamp api-1234abcd.duosecurity.com -l user-list.txt -p "IT verification"
//!   pushcamp api-1234abcd.duosecurity.com --list-groups

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use pushcamp_core::config::{ApiCredentials, CampaignConfig};
use pushcamp_core::types::Outcome;
use pushcamp_engine::{CancelFlag, ResultLog, SelectionCriteria, run_campaign};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pushcamp",
    version,
    about = "Batch MFA push-notification campaign runner for authorized security assessments"
)]
struct Cli {
    /// API host, e.g. api-1234abcd.duosecurity.com
    host: String,

    /// Admin API integration key (falls back to ADMIN_IKEY)
    #[arg(long, env = "ADMIN_IKEY", default_value = "", hide_env_values = true)]
    admin_ikey: String,

    /// Admin API secret key (falls back to ADMIN_SKEY)
    #[arg(long, env = "ADMIN_SKEY", default_value = "", hide_env_values = true)]
    admin_skey: String,

    /// Auth API integration key (falls back to AUTH_IKEY)
    #[arg(long, env = "AUTH_IKEY", default_value = "", hide_env_values = true)]
    auth_ikey: String,

    /// Auth API secret key (falls back to AUTH_SKEY)
    #[arg(long, env = "AUTH_SKEY", default_value = "", hide_env_values = true)]
    auth_skey: String,

    /// Accounts to challenge concurrently per batch
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Seconds to wait between batches
    #[arg(short, long)]
    time_between: Option<u64>,

    /// Push attempts per account before giving up
    #[arg(short, long)]
    user_pings: Option<u32>,

    /// Seconds to wait between attempts to the same account
    #[arg(short = 'w', long)]
    user_wait: Option<u64>,

    /// Text to display in the push notification
    #[arg(short, long)]
    push_text: Option<String>,

    /// Output file path (defaults to results/results<datetime>.csv)
    #[arg(short, long, group = "output")]
    output_file: Option<PathBuf>,

    /// Resume from a previous campaign's result file
    #[arg(short = 'f', long, group = "output")]
    resume_from_file: Option<PathBuf>,

    /// Resume from the most recent file in the results folder
    #[arg(short, long, group = "output")]
    resume_from_last: bool,

    /// File of handles (one per line) to target; lines may carry a phone
    /// number hint after a comma
    #[arg(short = 'l', long)]
    user_list: Option<PathBuf>,

    /// File of handles to exclude
    #[arg(short, long)]
    ignore_list: Option<PathBuf>,

    /// Only target accounts in these groups (comma separated)
    #[arg(short = 'g', long)]
    by_groups: Option<String>,

    /// Standalone: list directory groups and exit (admin keys only)
    #[arg(long)]
    list_groups: bool,

    /// Standalone: delete everything in the results folder and exit
    #[arg(long)]
    empty_results: bool,

    /// Answer yes to all prompts
    #[arg(short, long)]
    yes: bool,

    /// Path to a campaign config file (defaults to ~/.pushcamp/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn ask(prompt: &str) -> bool {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush().ok();
    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y" | "yes")
}

fn load_config(cli: &Cli) -> Result<CampaignConfig> {
    let mut config = match &cli.config {
        Some(path) => CampaignConfig::load_from(path)
            .with_context(|| format!("invalid config file {}", path.display()))?,
        None => {
            let default = CampaignConfig::default_path();
            if default.is_file() {
                CampaignConfig::load_from(&default)
                    .with_context(|| format!("invalid config file {}", default.display()))?
            } else {
                CampaignConfig::default()
            }
        }
    };
    if let Some(v) = cli.batch_size {
        config.batch_size = v;
    }
    if let Some(v) = cli.time_between {
        config.batch_wait_secs = v;
    }
    if let Some(v) = cli.user_pings {
        config.retry_count = v;
    }
    if let Some(v) = cli.user_wait {
        config.retry_wait_secs = v;
    }
    if let Some(v) = &cli.push_text {
        config.push_text = v.clone();
    }
    config.validate()?;
    Ok(config)
}

fn open_result_log(cli: &Cli, results_dir: &Path) -> Result<ResultLog> {
    if let Some(path) = &cli.resume_from_file {
        return Ok(ResultLog::resume(path)?);
    }
    if cli.resume_from_last {
        return Ok(ResultLog::resume_latest(results_dir)?);
    }
    let path = match &cli.output_file {
        Some(path) => path.clone(),
        None => {
            let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
            results_dir.join(format!("results{stamp}.csv"))
        }
    };
    Ok(ResultLog::create(&path)?)
}

fn build_criteria(cli: &Cli) -> Result<SelectionCriteria> {
    let user_list = match &cli.user_list {
        Some(path) => Some(pushcamp_engine::lists::load_user_list(path)?),
        None => None,
    };
    let ignore: HashSet<String> = match &cli.ignore_list {
        Some(path) => pushcamp_engine::lists::load_ignore_list(path)?,
        None => HashSet::new(),
    };
    let group_names = cli
        .by_groups
        .as_ref()
        .map(|g| g.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect());
    Ok(SelectionCriteria { user_list, group_names, ignore })
}

fn print_summary(log_path: &Path, stats: &pushcamp_engine::RunStats) {
    println!();
    if stats.interrupted {
        println!("Campaign interrupted. Partial results in {}", log_path.display());
        println!("Re-run with -f {} to resume.", log_path.display());
    } else {
        println!("Campaign complete. Results in {}", log_path.display());
    }
    println!("  batches:    {}", stats.batches);
    println!("  dispatched: {}", stats.dispatched);
    for outcome in [
        Outcome::Allowed,
        Outcome::Denied,
        Outcome::TimedOut,
        Outcome::LockedOut,
        Outcome::FraudFlagged,
        Outcome::Unreachable,
        Outcome::ProviderError,
    ] {
        let count = stats.count(outcome);
        if count > 0 {
            println!("  {:<11} {count}", format!("{outcome}:"));
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "pushcamp=debug,pushcamp_engine=debug,pushcamp_providers=debug"
    } else {
        "pushcamp=info,pushcamp_engine=info,pushcamp_providers=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = load_config(&cli)?;
    let results_dir = PathBuf::from(shellexpand::tilde(&config.results_dir).to_string());

    if cli.empty_results {
        if cli.yes || ask(&format!("Delete content of {}?", results_dir.display())) {
            if results_dir.is_dir() {
                std::fs::remove_dir_all(&results_dir)
                    .with_context(|| format!("unable to clear {}", results_dir.display()))?;
            }
            std::fs::create_dir_all(&results_dir)?;
            println!("Results folder emptied.");
        }
        return Ok(());
    }

    let admin = ApiCredentials { ikey: cli.admin_ikey.clone(), skey: cli.admin_skey.clone() };
    let auth = ApiCredentials { ikey: cli.auth_ikey.clone(), skey: cli.auth_skey.clone() };
    if admin.is_empty() {
        bail!("admin API keys missing: pass --admin-ikey/--admin-skey or set ADMIN_IKEY/ADMIN_SKEY");
    }
    if !cli.list_groups && auth.is_empty() {
        bail!("auth API keys missing: pass --auth-ikey/--auth-skey or set AUTH_IKEY/AUTH_SKEY");
    }

    let gateway = pushcamp_providers::create_gateway(&cli.host, admin, auth)?;

    if cli.list_groups {
        let groups = gateway.list_groups().await?;
        println!("List of groups:");
        for group in &groups {
            println!("- {}", group.name);
        }
        return Ok(());
    }

    std::fs::create_dir_all(&results_dir)
        .with_context(|| format!("unable to create {}", results_dir.display()))?;

    let criteria = build_criteria(&cli)?;
    tracing::debug!(
        "batch_size={} time_between={}s user_pings={} user_wait={}s",
        config.batch_size,
        config.batch_wait_secs,
        config.retry_count,
        config.retry_wait_secs
    );
    let mut log = open_result_log(&cli, &results_dir)?;
    println!("Writing results to {}", log.path().display());

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nInterrupt received, finishing the current batch...");
                cancel.cancel();
            }
        });
    }

    let assume_yes = cli.yes;
    let confirm = move |prompt: &str| assume_yes || ask(prompt);

    let log_path = log.path().to_path_buf();
    let stats = run_campaign(
        &config,
        &criteria,
        Arc::from(gateway),
        &mut log,
        &confirm,
        &cancel,
    )
    .await?;

    print_summary(&log_path, &stats);
    Ok(())
}
