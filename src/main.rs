//! spelunk - A depth-first disk usage scanner.
//!
//! Usage:
//!   spelunk scan [PATH]      Scan and show the largest entries
//!   spelunk events [PATH]    Stream scan events as JSON lines
//!   spelunk export [PATH]    Export the scanned tree to JSON
//!   spelunk --help           Show help

use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Context, Result, bail};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use spelunk_core::{FileNode, SizeMode};
use spelunk_scan::{CwdFs, LastError, ScanConfig, ScanConsumer, ScanEvent, Scanner, TreeScan};

#[derive(Parser)]
#[command(
    name = "spelunk",
    version,
    about = "A depth-first disk usage scanner",
    long_about = "spelunk walks a directory tree one level at a time and reports \
                  where the space goes.\n\n\
                  Set RUST_LOG (e.g. RUST_LOG=spelunk_scan=debug) to see \
                  per-entry diagnostics on stderr."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Options shared by every subcommand that scans.
#[derive(Args)]
struct ScanArgs {
    /// Path to scan
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Do not cross filesystem boundaries
    #[arg(short = 'x', long)]
    one_file_system: bool,

    /// Exclude entries matching this glob (repeatable)
    #[arg(long = "exclude", value_name = "GLOB")]
    exclude: Vec<String>,

    /// Sum apparent sizes instead of disk usage
    #[arg(long)]
    apparent: bool,
}

impl ScanArgs {
    fn config(&self) -> Result<ScanConfig> {
        ScanConfig::builder()
            .root(self.path.clone())
            .same_filesystem(self.one_file_system)
            .apparent_size(self.apparent)
            .exclude_patterns(self.exclude.clone())
            .build()
            .context("Invalid scan configuration")
    }
}

#[derive(Subcommand)]
enum Command {
    /// Scan and show a size summary
    Scan {
        #[command(flatten)]
        scan: ScanArgs,

        /// Maximum depth to display
        #[arg(short, long, default_value = "3")]
        depth: u32,

        /// Show all entries (no depth limit on display)
        #[arg(short, long)]
        all: bool,

        /// Number of top entries to show per directory
        #[arg(short = 'n', long, default_value = "10")]
        top: usize,
    },

    /// Stream raw scan events as JSON lines
    Events {
        #[command(flatten)]
        scan: ScanArgs,
    },

    /// Export the scanned tree to JSON
    Export {
        #[command(flatten)]
        scan: ScanArgs,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    setup_logging();

    let cli = Cli::parse();

    match cli.command {
        Command::Scan {
            scan,
            depth,
            all,
            top,
        } => run_scan(&scan, if all { None } else { Some(depth) }, top),
        Command::Events { scan } => run_events(&scan),
        Command::Export { scan, output } => run_export(&scan, output),
    }
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Scan into a tree, reporting progress on stderr.
fn scan_with_progress(config: &ScanConfig) -> Result<TreeScan> {
    eprintln!("Scanning {}...", config.root.display());

    let scanner = Scanner::new();
    let mut rx = scanner.subscribe();
    let reporter = thread::spawn(move || {
        loop {
            match rx.blocking_recv() {
                Ok(progress) => eprint!(
                    "\r {} entries, {} ({:.0}/s)   ",
                    progress.entries_scanned,
                    format_size(progress.bytes_scanned),
                    progress.entries_per_second()
                ),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        eprintln!();
    });

    let result = scanner.scan_tree(config);
    // Dropping the scanner closes the channel and ends the reporter.
    drop(scanner);
    let _ = reporter.join();

    let scan = result.context("Scan failed")?;
    if let Some(err) = &scan.outcome.fatal_error {
        eprintln!("Scan aborted: {err}");
    }
    Ok(scan)
}

/// Run a scan and display the size tree.
fn run_scan(args: &ScanArgs, max_depth: Option<u32>, top_n: usize) -> Result<()> {
    let config = args.config()?;
    let scan = scan_with_progress(&config)?;
    let tree = &scan.tree;

    println!();
    println!("{}", "─".repeat(60));
    println!(
        " {} - {}",
        tree.root_path.display(),
        format_size(tree.total_size())
    );
    println!(
        " {} files, {} directories",
        tree.stats.total_files, tree.stats.total_dirs
    );
    println!(" Scanned in {:.2}s", scan.outcome.duration.as_secs_f64());
    println!("{}", "─".repeat(60));
    println!();

    print_node(
        &tree.root,
        &tree.root_path,
        tree.size_mode,
        0,
        max_depth.unwrap_or(u32::MAX),
        top_n,
        tree.total_size(),
    );

    if tree.has_warnings() {
        println!();
        println!("{} warning(s) during scan", tree.warnings.len());
        if let Some(last) = &scan.last_error {
            println!("Last error: {}", last.display());
        }
    }

    finish(&scan)
}

/// Consumer writing each event as one JSON object per line.
struct JsonLines<W: Write> {
    out: W,
    failed: Option<io::Error>,
}

#[derive(Serialize)]
struct Finalize {
    finalize: bool,
}

impl<W: Write> JsonLines<W> {
    fn new(out: W) -> Self {
        Self { out, failed: None }
    }

    fn write<T: Serialize>(&mut self, value: &T) {
        if self.failed.is_some() {
            return;
        }
        let result = serde_json::to_writer(&mut self.out, value)
            .map_err(io::Error::from)
            .and_then(|()| self.out.write_all(b"\n"));
        if let Err(err) = result {
            self.failed = Some(err);
        }
    }
}

impl<W: Write> ScanConsumer for JsonLines<W> {
    fn on_event(&mut self, event: ScanEvent) {
        self.write(&event);
    }

    fn on_finalize(&mut self, fatal: bool) -> bool {
        self.write(&Finalize { finalize: fatal });
        if let Err(err) = self.out.flush() {
            if self.failed.is_none() {
                self.failed = Some(err);
            }
        }
        !fatal
    }
}

/// Stream events to stdout.
fn run_events(args: &ScanArgs) -> Result<()> {
    let config = args.config()?;
    let stdout = io::stdout();
    let mut sink = JsonLines::new(BufWriter::new(stdout.lock()));
    let mut errors = LastError::new();

    let outcome = Scanner::new()
        .scan(&mut CwdFs::new(), &config, &mut sink, &mut errors)
        .context("Scan failed")?;

    if let Some(err) = sink.failed {
        return Err(err).context("Could not write events");
    }
    if let Some(err) = outcome.fatal_error {
        bail!("Scan aborted: {err}");
    }
    Ok(())
}

/// Export scan results to JSON.
fn run_export(args: &ScanArgs, output: Option<PathBuf>) -> Result<()> {
    let config = args.config()?;
    let scan = scan_with_progress(&config)?;

    let json = serde_json::to_string_pretty(&scan.tree)?;

    match output {
        Some(output_path) => {
            std::fs::write(&output_path, json)
                .with_context(|| format!("Could not write {}", output_path.display()))?;
            eprintln!("Exported to {}", output_path.display());
        }
        None => {
            println!("{}", json);
        }
    }

    finish(&scan)
}

/// Turn the consumer's verdict into the process result.
fn finish(scan: &TreeScan) -> Result<()> {
    if !scan.outcome.continue_host {
        bail!("Scan aborted; results are incomplete");
    }
    Ok(())
}

/// Print a node and its children.
fn print_node(
    node: &FileNode,
    path: &Path,
    mode: SizeMode,
    depth: u32,
    max_depth: u32,
    top_n: usize,
    root_size: u64,
) {
    let indent = "  ".repeat(depth as usize);
    let size = node.size(mode);
    let ratio = if root_size > 0 {
        size as f64 / root_size as f64 * 100.0
    } else {
        0.0
    };

    let bar = make_bar(ratio / 100.0, 10);

    let name = if depth == 0 {
        path.display().to_string()
    } else {
        node.name.to_string()
    };

    let dir_marker = if node.is_dir() { "/" } else { "" };

    println!(
        "{}{}{}{:<40} {:>10} {:>5.1}% {}",
        indent,
        flag_marker(node),
        if node.is_dir() { "▼ " } else { "  " },
        truncate(&format!("{}{}", name, dir_marker), 40),
        format_size(size),
        ratio,
        bar
    );

    if node.is_dir() && depth < max_depth {
        let children_to_show = node.children.iter().take(top_n);
        let remaining = node.children.len().saturating_sub(top_n);

        for child in children_to_show {
            let child_path = path.join(&*child.name);
            print_node(child, &child_path, mode, depth + 1, max_depth, top_n, root_size);
        }

        if remaining > 0 {
            let indent = "  ".repeat((depth + 1) as usize);
            println!("{}  ... and {} more", indent, remaining);
        }
    }
}

/// One-character marker for entries that were not fully counted.
fn flag_marker(node: &FileNode) -> char {
    if node.flags.error {
        '!'
    } else if node.flags.excluded {
        '<'
    } else if node.flags.other_filesystem {
        '>'
    } else if node.flags.hard_link_candidate {
        'H'
    } else {
        ' '
    }
}

/// Create a simple ASCII bar.
fn make_bar(ratio: f64, width: usize) -> String {
    let filled = (ratio * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Truncate a string to at most `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}
