//! CLI entry point for `mailgrab`.

use std::path::PathBuf;
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mailgrab::config::Config;
use mailgrab::pipeline::RunReport;
use mailgrab::store::gmail::{http_client, GmailClient};

#[derive(Parser)]
#[command(
    name = "mailgrab",
    version,
    about = "Download the attachments of your most recent matching Gmail messages"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH", env = "MAILGRAB_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Search, select and download attachments (the default)
    Run {
        /// Directory to save attachments into
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
        /// Number of most recent messages to process
        #[arg(short, long, value_name = "N")]
        limit: Option<usize>,
        /// Search query, tried in the order given (repeatable)
        #[arg(short, long = "pattern", value_name = "QUERY")]
        patterns: Vec<String>,
    },
    /// Report how many messages a set of diagnostic queries find
    Probe,
    /// Obtain or refresh the access token and store it
    Auth,
    /// Print the effective configuration as TOML
    Config,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = mailgrab::config::load_config(cli.config.as_deref());

    let log_level = match cli.verbose {
        0 => config.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    setup_logging(&log_level, &config);

    match cli.command {
        None => cmd_run(&config),
        Some(Commands::Run {
            output,
            limit,
            patterns,
        }) => {
            if let Some(dir) = output {
                config.fetch.target_directory = Some(dir);
            }
            if let Some(n) = limit {
                config.fetch.message_limit = n;
            }
            if !patterns.is_empty() {
                config.fetch.search_patterns = patterns;
            }
            cmd_run(&config)
        }
        Some(Commands::Probe) => cmd_probe(&config),
        Some(Commands::Auth) => cmd_auth(&config),
        Some(Commands::Config) => cmd_config(&config),
        Some(Commands::Completions { shell }) => cmd_completions(shell),
        Some(Commands::Manpage) => cmd_manpage(),
    }
}

fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = mailgrab::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailgrab.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Authenticate and build the Gmail client.
fn connect(config: &Config) -> anyhow::Result<GmailClient> {
    let http = http_client(&config.network)?;
    let session = mailgrab::auth::authenticate(&config.account, &http)?;
    Ok(GmailClient::new(http, session, &config.network))
}

fn cmd_run(config: &Config) -> anyhow::Result<()> {
    let start = Instant::now();
    let api = connect(config)?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Downloading [{bar:40.cyan/blue}] {pos}/{len}")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let report = mailgrab::pipeline::run(&api, &config.fetch, &|current, total| {
        pb.set_length(total as u64);
        pb.set_position(current as u64);
    })?;
    pb.finish_and_clear();

    print_run_summary(&report);
    println!("  Done in {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn print_run_summary(report: &RunReport) {
    use humansize::{format_size, BINARY};

    let Some(ref pattern) = report.matched_pattern else {
        println!("  No messages found with any search pattern:");
        for p in &report.empty_patterns {
            println!("    {p}");
        }
        return;
    };

    println!("  Matched pattern: {pattern}");
    println!(
        "  {} candidate(s), {} selected",
        report.candidates,
        report.messages.len() + report.failed_messages.len()
    );
    println!();

    for m in &report.messages {
        println!(
            "  {}  {}  {} attachment(s)",
            m.received_at.format("%Y-%m-%d %H:%M"),
            m.subject,
            m.attachments
        );
    }
    for f in &report.failed_messages {
        println!("  ! message {} not processed: {}", f.id, f.reason);
    }

    let saved = &report.attachments.saved;
    let total: u64 = saved.iter().map(|s| s.bytes).sum();
    println!();
    println!(
        "  Saved {} attachment(s), {} to {}",
        saved.len(),
        format_size(total, BINARY),
        report.target_directory.display()
    );
    for s in &report.attachments.skipped {
        println!("  ! skipped {} ({}): {}", s.filename, s.message_id, s.reason);
    }
}

fn cmd_probe(config: &Config) -> anyhow::Result<()> {
    let api = connect(config)?;
    let results = mailgrab::diagnose::probe(
        &api,
        &config.probe.queries,
        config.fetch.max_results,
        config.probe.sample,
    );

    for r in &results {
        let label = if r.query.is_empty() {
            "(all mail)"
        } else {
            r.query.as_str()
        };
        match r.error {
            Some(ref e) => println!("  {label}: error: {e}"),
            None => {
                println!("  {label}: {} message(s)", r.hits);
                for subject in &r.subjects {
                    println!("      {subject}");
                }
            }
        }
    }
    Ok(())
}

fn cmd_auth(config: &Config) -> anyhow::Result<()> {
    let http = http_client(&config.network)?;
    let session = mailgrab::auth::authenticate(&config.account, &http)?;
    let token = session.token();

    println!(
        "  Token stored in {}",
        config.account.token_store_path().display()
    );
    match token.expires_at {
        Some(at) => println!("  Access token valid until {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("  Access token has no expiry"),
    }
    if token.refresh_token.is_none() {
        println!("  No refresh token was issued; the next run may ask to authorize again");
    }
    Ok(())
}

fn cmd_config(config: &Config) -> anyhow::Result<()> {
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailgrab", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
