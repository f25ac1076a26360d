//! Claimer CLI
//!
//! Signs into Prime Gaming in a Chromium instance driven over the DevTools
//! protocol, claims the free game offers and records them in
//! `<data-dir>/prime-gaming.json`.
//!
//! Usage from workspace root:
//!   cargo run --bin claimer                  # headless run with configured credentials
//!   cargo run --bin claimer -- --show        # visible browser, sign in by hand if needed
//!   cargo run --bin claimer -- --dryrun      # only list what would be claimed
//!
//! Every flag can also be set in the environment, `<data-dir>/config.env` or `.env`.

use anyhow::{Context, Result};
use clap::builder::FalseyValueParser;
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use claimer::driver::{BrowserOptions, CdpDriver};
use claimer::{ClaimConfig, RunSummary};

mod logging;
mod prompt;

use prompt::TerminalPrompter;

#[derive(Parser, Debug)]
#[command(name = "claimer")]
#[command(about = "Claims free Prime Gaming offers and keeps a ledger of them")]
struct Args {
    /// Show the browser window (required to sign in by hand)
    #[clap(long, env = "SHOW", value_parser = FalseyValueParser::new())]
    show: bool,

    /// Only list offers; claim and record nothing
    #[clap(long, env = "DRYRUN", value_parser = FalseyValueParser::new())]
    dryrun: bool,

    /// Disable all operation timeouts
    #[clap(long, env = "PWDEBUG", value_parser = FalseyValueParser::new())]
    debug: bool,

    /// Operation timeout in seconds
    #[clap(long, env = "TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// Browser viewport width
    #[clap(long, env = "WIDTH", default_value_t = 1280)]
    width: u32,

    /// Browser viewport height
    #[clap(long, env = "HEIGHT", default_value_t = 1280)]
    height: u32,

    /// Amazon account email
    #[clap(long, env = "PG_EMAIL")]
    email: Option<String>,

    /// Amazon account password
    #[clap(long, env = "PG_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Base32 seed of the authenticator app, used to generate sign-in codes
    #[clap(long = "otp-key", env = "PG_OTPKEY", hide_env_values = true)]
    otp_key: Option<String>,

    /// Directory for the browser profile, screenshots, logs and the ledger
    #[clap(long, env = "DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Chromium or Chrome executable
    #[clap(long, env = "BROWSER_PATH", default_value = "chromium")]
    browser: PathBuf,

    /// Remote debugging port the browser listens on
    #[clap(long, env = "DEBUG_PORT", default_value_t = 9222)]
    debug_port: u16,
}

impl Args {
    fn config(&self) -> ClaimConfig {
        ClaimConfig {
            headless: !self.show,
            timeout: Duration::from_secs(self.timeout),
            dry_run: self.dryrun,
            debug: self.debug,
            width: self.width,
            height: self.height,
            email: self.email.clone(),
            password: self.password.clone(),
            otp_key: self.otp_key.clone(),
            data_dir: self.data_dir.clone(),
        }
    }

    fn browser_options(&self, config: &ClaimConfig) -> BrowserOptions {
        BrowserOptions {
            executable: self.browser.clone(),
            user_data_dir: config.browser_dir(),
            headless: config.headless,
            width: config.width,
            height: config.height,
            debug_port: self.debug_port,
        }
    }
}

/// Data directory named on the command line, else by `DATA_DIR`, else `data`.
/// Read before clap runs, since the env files it locates feed clap's defaults.
fn env_data_dir(mut args: impl Iterator<Item = String>) -> PathBuf {
    while let Some(arg) = args.next() {
        if arg == "--data-dir" {
            if let Some(dir) = args.next() {
                return PathBuf::from(dir);
            }
        } else if let Some(dir) = arg.strip_prefix("--data-dir=") {
            return PathBuf::from(dir);
        }
    }
    std::env::var_os("DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"))
}

/// Loads `<data-dir>/config.env`, then `.env`; variables already set win.
fn load_env_files() {
    let data_dir = env_data_dir(std::env::args().skip(1));
    for file in [data_dir.join("config.env"), PathBuf::from(".env")] {
        match dotenvy::from_path(&file) {
            Ok(()) => eprintln!("Loaded environment from {}", file.display()),
            Err(e) if e.not_found() => {}
            Err(e) => eprintln!("Ignoring {}: {e}", file.display()),
        }
    }
}

fn print_summary(summary: &RunSummary, dry_run: bool) {
    let mode = if dry_run { " (dry run)" } else { "" };
    println!(
        "{} {}{}",
        "✓".green().bold(),
        format!("Signed in as {}", summary.account).bold(),
        mode
    );
    println!("  Prime Gaming games claimed: {}", summary.direct_claimed);
    println!("  External offers processed:  {}", summary.external_processed);
    for title in &summary.link_required {
        println!(
            "  {} {} needs a linked game account, claim it by hand",
            "!".yellow().bold(),
            title
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env_files();
    let args = Args::parse();
    let config = args.config();

    let log_guard = logging::init_logging(&config.logs_dir())?;
    debug!(
        headless = config.headless,
        timeout = ?config.timeout,
        dry_run = config.dry_run,
        debug = config.debug,
        "Starting"
    );

    let driver = CdpDriver::launch(&args.browser_options(&config))
        .await
        .with_context(|| format!("Failed to start {}", args.browser.display()))?
        .with_command_timeout(config.timeout);
    info!(data_dir = %config.data_dir.display(), "Browser ready");

    match claimer::run(Arc::new(driver), &config, Arc::new(TerminalPrompter)).await {
        Ok(summary) => {
            print_summary(&summary, config.dry_run);
            Ok(())
        }
        Err(e) => {
            error!("Run failed: {}", e);
            eprintln!("{} {}", "✗".red().bold(), e);
            drop(log_guard);
            std::process::exit(1);
        }
    }
}
