//! Forum Archiver main entry point
//!
//! This is the command-line interface for the forum snapshot archiver.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use forum_archiver::config::{load_config_with_hash, Config};
use forum_archiver::url::parse_target_url;
use forum_archiver::{Archiver, JobSpec, ProfileJob, RunContext, UrlListJob, UrlListMode};
use std::path::{Path, PathBuf};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

/// Forum Archiver: resumable snapshots of a JavaScript-rendered forum
///
/// Renders profile, listing and topic pages in a real browser and saves each
/// one as HTML plus a full-page screenshot. Interrupted runs pick up where
/// they left off.
#[derive(Parser, Debug)]
#[command(name = "forum-archiver")]
#[command(version = "1.0.0")]
#[command(about = "A resumable forum snapshot archiver", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    /// Override the output directory from the config
    #[arg(short, long, value_name = "DIR", global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Archive a user's profile, topics and posts
    Profile {
        /// Forum username
        username: String,

        /// Skip the profile, wall, friends and reputation views
        #[arg(long)]
        no_profile: bool,

        /// Topics the user started on the live forums
        #[arg(long)]
        topics_live: bool,

        /// Topics the user started in the archives
        #[arg(long)]
        topics_arch: bool,

        /// Posts by the user on the live forums
        #[arg(long)]
        posts_live: bool,

        /// Posts by the user in the archives
        #[arg(long)]
        posts_arch: bool,

        /// Capture only the user's posts, not the full topics they appear in
        #[arg(long)]
        posts_only: bool,

        /// Pause after opening the site so you can log in
        #[arg(long)]
        login: bool,
    },

    /// Archive a list of URLs, one per line ("-" reads stdin)
    Urls {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Archive every page of each topic instead of just the given page
        #[arg(long)]
        all_pages: bool,

        /// Pause after opening the site so you can log in
        #[arg(long)]
        login: bool,
    },

    /// Show statistics from the archive ledger and exit
    Stats,

    /// Write a markdown index of the archive and exit
    ExportSummary,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (cfg, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            Config::default()
        }
    };
    if let Some(dir) = cli.output {
        config.output.directory = dir;
    }

    match cli.command {
        Command::Stats => handle_stats(&config),
        Command::ExportSummary => handle_export_summary(&config),
        Command::Profile {
            username,
            no_profile,
            topics_live,
            topics_arch,
            posts_live,
            posts_arch,
            posts_only,
            login,
        } => {
            let any_group = topics_live || topics_arch || posts_live || posts_arch;
            let job = ProfileJob {
                username,
                include_profile: !no_profile,
                topics_live: topics_live || !any_group,
                topics_arch: topics_arch || !any_group,
                posts_live: posts_live || !any_group,
                posts_arch: posts_arch || !any_group,
                posts_only,
                pause_for_login: login,
            };
            handle_archive(config, JobSpec::Profile(job)).await
        }
        Command::Urls {
            file,
            all_pages,
            login,
        } => {
            check_url_source(&file, login)?;
            let urls = read_url_list(&file).await?;
            if urls.is_empty() {
                bail!("no URLs found in {}", file.display());
            }
            let job = UrlListJob {
                urls,
                mode: if all_pages {
                    UrlListMode::AllPages
                } else {
                    UrlListMode::SinglePage
                },
                pause_for_login: login,
            };
            handle_archive(config, JobSpec::UrlList(job)).await
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("forum_archiver=info,warn"),
            1 => EnvFilter::new("forum_archiver=debug,info"),
            2 => EnvFilter::new("forum_archiver=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Rejects reading the list from stdin when stdin also releases the login pause
fn check_url_source(file: &Path, login: bool) -> anyhow::Result<()> {
    if login && file == Path::new("-") {
        bail!("--login reads Enter from stdin, so the URL list cannot also come from stdin; pass a file instead");
    }
    Ok(())
}

/// Reads one URL per line, skipping blanks and `#` comments
async fn read_url_list(path: &Path) -> anyhow::Result<Vec<String>> {
    let text = if path == Path::new("-") {
        let mut text = String::new();
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            text.push_str(&line);
            text.push('\n');
        }
        text
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?
    };

    parse_url_list(&text).with_context(|| format!("invalid URL list {}", path.display()))
}

/// Parses a URL list; every entry must be an absolute http(s) URL
fn parse_url_list(text: &str) -> anyhow::Result<Vec<String>> {
    let mut urls = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        parse_target_url(line).with_context(|| format!("line {}: {:?}", n + 1, line))?;
        urls.push(line.to_string());
    }
    Ok(urls)
}

/// Handles the stats command: shows statistics from the ledger
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use forum_archiver::output::{load_statistics, print_statistics};

    println!("Archive: {}\n", config.output.directory.display());

    let stats = load_statistics(&config.output.directory)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the export-summary command: writes the markdown index
fn handle_export_summary(config: &Config) -> anyhow::Result<()> {
    use forum_archiver::output::generate_markdown_index;

    println!("=== Exporting Archive Index ===\n");
    println!("Archive: {}", config.output.directory.display());
    println!();

    tracing::info!("Loading archive ledger...");
    let path = generate_markdown_index(&config.output.directory)?;

    println!("✓ Index exported to: {}", path.display());

    Ok(())
}

/// Handles an archive run in either mode
async fn handle_archive(config: Config, job: JobSpec) -> anyhow::Result<()> {
    let pause_for_login = match &job {
        JobSpec::Profile(p) => p.pause_for_login,
        JobSpec::UrlList(l) => l.pause_for_login,
    };

    std::fs::create_dir_all(&config.output.directory).with_context(|| {
        format!(
            "failed to create output directory {}",
            config.output.directory.display()
        )
    })?;

    let browser = launch_browser(&config).await?;
    let ctx = RunContext::new()
        .with_continue_poll(config.timing.continue_poll())
        .with_progress_sink(|current: usize, total: usize, status: &str| {
            tracing::debug!("[{}/{}] {}", current, total, status);
        });

    let mut archiver = Archiver::new(config, browser, ctx);
    let handle = archiver.handle();

    let stop_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current step");
            stop_handle.stop();
        }
    });

    if pause_for_login {
        let gate = handle.clone();
        tokio::spawn(async move {
            let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(_)) = lines.next_line().await {
                gate.continue_after_pause();
            }
        });
        tracing::info!("Press Enter once you are logged in");
    }

    let result = archiver.start(job).await;
    if let Err(e) = archiver.close().await {
        tracing::debug!("Closing browser: {}", e);
    }

    match result {
        Ok(summary) => {
            tracing::info!(
                "Run finished: {} archived, {} failed, {} skipped, {} already done",
                summary.archived,
                summary.failed,
                summary.skipped,
                summary.already_done
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Archive run failed: {}", e);
            Err(e.into())
        }
    }
}

#[cfg(feature = "browser")]
async fn launch_browser(config: &Config) -> anyhow::Result<Box<dyn forum_archiver::browser::Browser>> {
    use forum_archiver::browser::chromium::ChromiumBrowser;

    tracing::info!("Launching browser...");
    let browser = ChromiumBrowser::launch(&config.browser, &config.output.directory)
        .await
        .context("failed to launch browser")?;
    Ok(Box::new(browser))
}

#[cfg(not(feature = "browser"))]
async fn launch_browser(_config: &Config) -> anyhow::Result<Box<dyn forum_archiver::browser::Browser>> {
    bail!("this build has no browser support; rebuild with `--features browser`")
}
