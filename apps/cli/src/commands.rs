//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use examsubmit_core::{CancelToken, ProgressReporter, SubmissionDesk};
use examsubmit_shared::{
    AppConfig, DeskConfig, SubmissionResult, init_config, load_config, load_config_from,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// examsubmit: collect assignment submissions with duplicate and
/// plagiarism checks.
#[derive(Parser)]
#[command(
    name = "examsubmit",
    version,
    about = "Accept assignment uploads, reject duplicates and flag likely plagiarism.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.examsubmit/examsubmit.toml.
    #[arg(long, global = true, env = "EXAMSUBMIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Root directory the submissions folder and audit log live under.
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    /// Audit log path (overrides the configured one).
    #[arg(long, global = true)]
    pub log: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Submit an assignment file.
    Submit {
        /// Student submitting the file.
        #[arg(short, long)]
        name: String,

        /// Path to the .pdf or .docx file. It is moved into storage on success.
        path: PathBuf,

        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Check whether a file's exact bytes were already submitted.
    Check {
        /// File to check. Nothing is moved or recorded.
        path: PathBuf,
    },

    /// List stored submission files.
    List {
        /// Print as a JSON array.
        #[arg(long)]
        json: bool,
    },

    /// Show the audit log.
    History {
        /// Print as a JSON array.
        #[arg(long)]
        json: bool,
    },

    /// Compare the submissions directory with the audit log.
    Verify,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

/// Path overrides shared by every desk command.
struct Locations {
    config: Option<PathBuf>,
    dir: Option<PathBuf>,
    log: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so JSON output
/// on stdout stays clean.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "examsubmit=info",
        1 => "examsubmit=debug",
        _ => "examsubmit=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let locations = Locations {
        config: cli.config,
        dir: cli.dir,
        log: cli.log,
    };

    match cli.command {
        Command::Submit { name, path, json } => cmd_submit(&locations, name, path, json).await,
        Command::Check { path } => cmd_check(&locations, &path),
        Command::List { json } => cmd_list(&locations, json),
        Command::History { json } => cmd_history(&locations, json),
        Command::Verify => cmd_verify(&locations),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&locations),
        },
    }
}

fn load_app_config(locations: &Locations) -> Result<AppConfig> {
    Ok(match &locations.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

/// Config file values with `--dir` / `--log` applied on top.
fn resolve_desk_config(locations: &Locations) -> Result<DeskConfig> {
    let app = load_app_config(locations)?;
    Ok(apply_overrides(DeskConfig::from(&app), locations))
}

fn apply_overrides(mut desk: DeskConfig, locations: &Locations) -> DeskConfig {
    if let Some(root) = &locations.dir {
        desk.submissions_dir = root.join(&desk.submissions_dir);
        desk.log_file = root.join(&desk.log_file);
    }
    if let Some(log) = &locations.log {
        desk.log_file = log.clone();
    }
    desk
}

fn open_desk(locations: &Locations) -> Result<SubmissionDesk> {
    let config = resolve_desk_config(locations)?;
    Ok(SubmissionDesk::open(config)?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_submit(locations: &Locations, name: String, path: PathBuf, json: bool) -> Result<()> {
    let desk = open_desk(locations)?;
    info!(student = %name, path = %path.display(), "submitting assignment");

    let cancel = CancelToken::new();
    let mut task = {
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            let progress = CliProgress::new(json);
            desk.submit_with(&name, &path, &progress, &cancel)
        })
    };

    let joined = tokio::select! {
        joined = &mut task => joined,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupt received, stopping at the next safe point");
            cancel.cancel();
            task.await
        }
    };
    let result = joined.map_err(|e| eyre!("submission task failed: {e}"))??;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_outcome(&result);
    }

    match result {
        SubmissionResult::Rejected { reason } => Err(eyre!("submission rejected: {reason}")),
        _ => Ok(()),
    }
}

fn print_outcome(result: &SubmissionResult) {
    match result {
        SubmissionResult::Accepted { receipt } => {
            println!(
                "Assignment submitted successfully as {}",
                receipt.record.stored_filename
            );
        }
        SubmissionResult::AcceptedWithPlagiarismWarning { receipt, matched } => {
            println!(
                "Assignment submitted successfully as {}",
                receipt.record.stored_filename
            );
            println!(
                "Warning: potential plagiarism detected with {} (similarity {}%)",
                matched.matched_filename, matched.score
            );
        }
        SubmissionResult::Rejected { .. } => {}
    }
}

fn cmd_check(locations: &Locations, path: &Path) -> Result<()> {
    let desk = open_desk(locations)?;
    if desk.check_duplicate(path)? {
        println!("{} matches an existing submission.", path.display());
    } else {
        println!("{} has not been submitted before.", path.display());
    }
    Ok(())
}

fn cmd_list(locations: &Locations, json: bool) -> Result<()> {
    let desk = open_desk(locations)?;
    let files = desk.list_submissions()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&files)?);
    } else if files.is_empty() {
        println!("No assignments submitted yet.");
    } else {
        println!("Submitted assignments:");
        for file in &files {
            println!("  {file}");
        }
    }
    Ok(())
}

fn cmd_history(locations: &Locations, json: bool) -> Result<()> {
    let desk = open_desk(locations)?;
    let records = desk.history()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else if records.is_empty() {
        println!("No submissions recorded yet.");
    } else {
        for record in &records {
            println!(
                "{}  {:<24} {}  {}",
                record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                record.student_name,
                record.stored_filename,
                &record.content_hash[..record.content_hash.len().min(12)],
            );
        }
    }
    Ok(())
}

fn cmd_verify(locations: &Locations) -> Result<()> {
    let desk = open_desk(locations)?;
    let report = desk.verify()?;

    println!("  Logged entries: {}", report.logged);
    println!("  Stored files:   {}", report.stored);

    let sections = [
        ("Untracked files", &report.untracked_files),
        ("Missing files", &report.missing_files),
        ("Hash mismatches", &report.hash_mismatches),
        ("Shared file names", &report.shared_filenames),
    ];
    for (title, names) in sections {
        if names.is_empty() {
            continue;
        }
        println!("  {title}:");
        for name in names {
            println!("    {name}");
        }
    }

    if report.is_consistent() {
        println!("Storage and audit log are consistent.");
        Ok(())
    } else {
        Err(eyre!("storage and audit log disagree"))
    }
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(locations: &Locations) -> Result<()> {
    let config = load_app_config(locations)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new(hidden: bool) -> Self {
        if hidden {
            return Self {
                spinner: ProgressBar::hidden(),
            };
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn compared(&self, filename: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Comparing [{current}/{total}] {filename}"));
    }

    fn done(&self, _result: &SubmissionResult) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_submit_with_global_flags() {
        let cli = Cli::try_parse_from([
            "examsubmit",
            "-vv",
            "--dir",
            "/srv/course",
            "submit",
            "--name",
            "Ada Lovelace",
            "essay.pdf",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.dir, Some(PathBuf::from("/srv/course")));
        match cli.command {
            Command::Submit { name, path, json } => {
                assert_eq!(name, "Ada Lovelace");
                assert_eq!(path, PathBuf::from("essay.pdf"));
                assert!(!json);
            }
            _ => panic!("expected submit"),
        }
    }

    #[test]
    fn submit_requires_a_name() {
        assert!(Cli::try_parse_from(["examsubmit", "submit", "essay.pdf"]).is_err());
    }

    #[test]
    fn dir_and_log_overrides_apply() {
        let base = DeskConfig::from(&AppConfig::default());

        let rooted = apply_overrides(
            base.clone(),
            &Locations {
                config: None,
                dir: Some(PathBuf::from("/srv/course")),
                log: None,
            },
        );
        assert_eq!(rooted.submissions_dir, Path::new("/srv/course/Submissions"));
        assert_eq!(rooted.log_file, Path::new("/srv/course/submission_log.txt"));

        let custom_log = apply_overrides(
            base,
            &Locations {
                config: None,
                dir: Some(PathBuf::from("/srv/course")),
                log: Some(PathBuf::from("/var/log/exam.log")),
            },
        );
        assert_eq!(custom_log.log_file, Path::new("/var/log/exam.log"));
        assert_eq!(
            custom_log.submissions_dir,
            Path::new("/srv/course/Submissions")
        );
    }

    #[test]
    fn explicit_config_file_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exam.toml");
        std::fs::write(
            &path,
            "[storage]\nsubmissions_dir = \"Inbox\"\n\n[plagiarism]\nthreshold = 75\n",
        )
        .unwrap();

        let locations = Locations {
            config: Some(path),
            dir: None,
            log: None,
        };
        let desk = resolve_desk_config(&locations).unwrap();
        assert_eq!(desk.submissions_dir, Path::new("Inbox"));
        assert_eq!(desk.plagiarism_threshold, 75);
    }
}
