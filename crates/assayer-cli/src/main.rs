//! Assayer CLI
//!
//! The `assayer` command walks a directory tree, finds git repositories and
//! reports the uncompleted work in each of them.
//!
//! ## Reports
//!
//! - default: one line per finding
//! - `--count`: repositories per kind of finding
//! - `--reporter`: a template filled with the per-kind counts
//! - `--json`: one JSON object per finding

mod exclude;
mod report;

use std::ffi::OsString;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use assayer_core::{
    AssayError, CheckSelection, GitCli, RepositoryProvider, ScanOptions, Scanner, VerdictFamily,
    METRICS, VERSION,
};
use clap::Parser;
use tracing::{debug, Level};

use exclude::GlobExclusion;
use report::{Report, Style, Template};

/// Exclude patterns used when no `--exclude` is given, separated like `PATH`.
const EXCLUDE_ENV: &str = "ASSAYER_EXCLUDE";

const FAMILY_FLAGS: [&str; 7] = [
    "unmodified",
    "modified",
    "untracked",
    "stashed",
    "behind_branches",
    "ahead_branches",
    "local_only_branches",
];

#[derive(Parser, Debug)]
#[command(name = "assayer")]
#[command(version = VERSION)]
#[command(about = "Find git repositories with uncompleted work", long_about = None)]
struct Cli {
    /// Directory to scan
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Run every check, including unmodified repositories
    #[arg(short, long, conflicts_with_all = FAMILY_FLAGS)]
    all: bool,

    /// Report repositories without uncompleted work
    #[arg(short, long)]
    unmodified: bool,

    /// Check for modified files
    #[arg(short, long)]
    modified: bool,

    /// Check for untracked files
    #[arg(short = 't', long)]
    untracked: bool,

    /// Check for stashed changes
    #[arg(short, long)]
    stashed: bool,

    /// Check for local branches with commits not pushed to their remote
    #[arg(short, long)]
    behind_branches: bool,

    /// Check for remote branches with commits not merged locally
    #[arg(short = 'A', long)]
    ahead_branches: bool,

    /// Check for branches that exist only locally
    #[arg(short, long)]
    local_only_branches: bool,

    /// Keep looking for repositories inside repositories
    #[arg(short, long)]
    nested: bool,

    /// Report every finding per repository instead of the first
    #[arg(short, long)]
    deep: bool,

    /// Print the number of repositories per check
    #[arg(short, long, conflicts_with = "reporter")]
    count: bool,

    /// Skip repositories whose absolute path matches the glob (repeatable)
    #[arg(short, long)]
    exclude: Vec<String>,

    /// Print details for each finding
    #[arg(short, long)]
    verbose: bool,

    /// Template filled with per-check counts, e.g. "{modified} modified"
    #[arg(short, long)]
    reporter: Option<String>,

    /// Print findings as JSON lines
    #[arg(long, conflicts_with_all = ["count", "reporter"])]
    json: bool,

    /// Enable debug logging on stderr
    #[arg(long)]
    debug: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn selection(&self) -> CheckSelection {
        if self.all {
            return CheckSelection::all();
        }
        let flags = [
            (VerdictFamily::Unmodified, self.unmodified),
            (VerdictFamily::Modified, self.modified),
            (VerdictFamily::Untracked, self.untracked),
            (VerdictFamily::Stashed, self.stashed),
            (VerdictFamily::RemoteBehind, self.behind_branches),
            (VerdictFamily::RemoteAhead, self.ahead_branches),
            (VerdictFamily::LocalOnlyBranch, self.local_only_branches),
        ];
        let chosen: Vec<VerdictFamily> = flags
            .into_iter()
            .filter_map(|(family, set)| set.then_some(family))
            .collect();
        if chosen.is_empty() {
            CheckSelection::default()
        } else {
            CheckSelection::only(&chosen)
        }
    }

    fn style(&self, checks: CheckSelection) -> Result<Style> {
        if let Some(source) = &self.reporter {
            return Ok(Style::Template(Template::parse(source)?));
        }
        if self.count {
            return Ok(Style::Count { checks });
        }
        if self.json {
            return Ok(Style::Json);
        }
        Ok(Style::List {
            verbose: self.verbose,
            unmodified: checks.unmodified,
        })
    }

    /// `--exclude` values, or else the entries of the `ASSAYER_EXCLUDE` list.
    fn exclude_patterns(&self, env: Option<OsString>) -> Vec<String> {
        if !self.exclude.is_empty() {
            return self.exclude.clone();
        }
        let Some(list) = env else {
            return Vec::new();
        };
        std::env::split_paths(&list)
            .map(|pattern| pattern.to_string_lossy().into_owned())
            .filter(|pattern| !pattern.is_empty())
            .collect()
    }

    fn options(&self, checks: CheckSelection) -> ScanOptions {
        ScanOptions {
            checks,
            nested: self.nested,
            deep: self.deep,
            ..ScanOptions::default()
        }
    }
}

fn scan_root(path: &Path) -> Result<PathBuf> {
    let root = path
        .canonicalize()
        .with_context(|| format!("cannot access {}", path.display()))?;
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }
    Ok(root)
}

/// Flush what was already reported before bailing out.
fn flush_partial(out: &mut impl Write) {
    if let Err(err) = out.flush() {
        debug!(error = %err, "cannot flush partial report");
    }
}

fn checker_failure(err: AssayError) -> anyhow::Error {
    let context = match err.repository() {
        Some(repository) => format!("checker error in {}", repository.display()),
        None => "checker error".to_string(),
    };
    anyhow!(err).context(context)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::WARN };
    assayer_core::init_tracing(cli.log_json, level);

    let root = scan_root(&cli.path)?;
    let checks = cli.selection();
    let style = cli.style(checks)?;
    let options = cli.options(checks);
    let provider: Arc<dyn RepositoryProvider> = Arc::new(GitCli::new());
    let patterns = cli.exclude_patterns(std::env::var_os(EXCLUDE_ENV));
    let scanner = match GlobExclusion::compile(&patterns)? {
        Some(filter) => Scanner::with_exclusion(provider, options, Arc::new(filter)),
        None => Scanner::new(provider, options),
    };

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut report = Report::new(style);
    let mut scan = scanner.start(&root);

    while let Some(response) = scan.recv().await {
        match response {
            Ok(verdict) => {
                if let Err(err) = report.record(&verdict, &mut out) {
                    scan.cancel();
                    flush_partial(&mut out);
                    scan.finish().await.context("scan task failed")?;
                    return Err(err).context("cannot write report");
                }
            }
            Err(err) => {
                scan.cancel();
                flush_partial(&mut out);
                scan.finish().await.context("scan task failed")?;
                return Err(checker_failure(err));
            }
        }
    }

    report.finish(&mut out).context("cannot write report")?;
    let summary = scan.finish().await.context("scan task failed")?;
    debug!(
        repositories = summary.repositories_found,
        discovery_errors = summary.discovery_errors,
        directories = summary.directories_visited,
        "scan finished"
    );
    METRICS.flush();
    Ok(())
}
