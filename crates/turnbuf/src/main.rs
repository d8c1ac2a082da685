//! Inspect and compact conversation snapshots offline.
//!
//! Works on the JSON files written by [`MemoryStore`](turnbuf::store::MemoryStore)
//! or any other `MemoryState` export.
//!
//! # Examples
//!
//! ```sh
//! # Summarize a snapshot
//! turnbuf inspect sessions/chat-1.json
//!
//! # Re-compact under a smaller budget, writing a new file
//! turnbuf compact sessions/chat-1.json --capacity 32000 --ceiling 8000 \
//!   --output chat-1.small.json
//!
//! # Estimate a document piped from stdin
//! cat page.html | turnbuf estimate
//!
//! # Print the snapshot JSON Schema
//! turnbuf schema
//! ```

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use turnbuf::context::ContentKind;
use turnbuf::prelude::*;

/// Inspect and compact token-budgeted conversation snapshots.
#[derive(Parser)]
#[command(name = "turnbuf", version)]
struct Cli {
    /// Log more (repeat for trace output). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a snapshot and print its turns and budget usage.
    Inspect {
        /// Snapshot file.
        file: PathBuf,

        /// Skip unreadable turn records instead of rejecting the file.
        #[arg(long)]
        lenient: bool,
    },

    /// Load a snapshot, compact it under a budget, and write it back out.
    Compact {
        /// Snapshot file.
        file: PathBuf,

        /// Nominal token budget (default: from the snapshot, else MAX_CONTEXT_TOKENS).
        #[arg(long)]
        capacity: Option<usize>,

        /// Usable fraction of capacity, in (0, 1].
        #[arg(long)]
        reserve: Option<f64>,

        /// Per-turn token ceiling (default: MEMORY_TURN_CEILING or 50000).
        #[arg(long)]
        ceiling: Option<usize>,

        /// Where to write the compacted snapshot (default: stdout).
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Skip unreadable turn records instead of rejecting the file.
        #[arg(long)]
        lenient: bool,
    },

    /// Estimate the token cost of a file, or stdin when no file is given.
    Estimate {
        file: Option<PathBuf>,
    },

    /// Print the JSON Schema of the snapshot format.
    Schema,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| MemoryError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

fn load(
    path: &Path,
    config: MemoryConfig,
    strict: bool,
) -> Result<(BoundedMemory, CompactionReport)> {
    let json = read_file(path)?;
    let mut memory = BoundedMemory::new(config)?;
    let report = memory.import_json(&json, strict)?;
    Ok((memory, report))
}

fn inspect(file: &Path, lenient: bool) -> Result<String> {
    let (memory, report) = load(file, MemoryConfig::from_env(), !lenient)?;

    let mut out = String::new();
    out.push_str(&memory.usage().to_log_string());
    out.push('\n');
    if !report.is_noop() {
        out.push_str(&format!(
            "loading truncated {} and evicted {} turn(s)\n",
            report.truncated, report.evicted
        ));
    }
    for (i, turn) in memory.turns().enumerate() {
        let rendered = turn.content.render();
        let preview: String = rendered.chars().take(60).collect();
        let preview = preview.replace('\n', " ");
        out.push_str(&format!(
            "{i:>4}  {:<9} {:>7} tok  {}  {preview}{}\n",
            turn.role,
            turn.estimated_tokens(),
            turn.id,
            if rendered.chars().count() > 60 { "..." } else { "" },
        ));
    }
    Ok(out)
}

fn compact(
    file: &Path,
    capacity: Option<usize>,
    reserve: Option<f64>,
    ceiling: Option<usize>,
    output: Option<&Path>,
    lenient: bool,
) -> Result<String> {
    let strict = !lenient;
    let env = MemoryConfig::from_env();
    let (mut memory, _) = load(file, env, strict)?;

    // Command-line budget overrides whatever the snapshot carried.
    let mut config = *memory.config();
    if let Some(capacity) = capacity {
        config.capacity_tokens = capacity;
    }
    if let Some(reserve) = reserve {
        config.reserve_fraction = reserve;
    }
    if let Some(ceiling) = ceiling {
        config.per_turn_ceiling_tokens = ceiling;
    }

    let before = memory.usage();
    // Import adopts the budget carried by the state, so stamp the new one on it.
    let mut state = memory.export();
    state.capacity_tokens = Some(config.capacity_tokens);
    state.reserve_fraction = Some(config.reserve_fraction);
    let mut compacted = BoundedMemory::new(config)?;
    let report = compacted.import(state, strict)?;
    memory = compacted;
    eprintln!(
        "  {} -> {} (truncated {}, evicted {})",
        before.to_log_string(),
        memory.usage().to_log_string(),
        report.truncated,
        report.evicted,
    );

    let json = memory.export().to_json_pretty()?;
    match output {
        Some(path) => {
            std::fs::write(path, &json).map_err(|e| MemoryError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
            Ok(format!("wrote {}\n", path.display()))
        }
        None => Ok(format!("{json}\n")),
    }
}

fn estimate(file: Option<&Path>) -> Result<String> {
    let text = match file {
        Some(path) => read_file(path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).map_err(|e| MemoryError::Io {
                path: PathBuf::from("<stdin>"),
                source: e,
            })?;
            buf
        }
    };
    let kind = ContentKind::classify(&text);
    Ok(format!(
        "{} tokens ({} chars, {:?}, {} chars/token)\n",
        estimate_tokens(&text),
        text.chars().count(),
        kind,
        kind.chars_per_token(),
    ))
}

fn run(cli: &Cli) -> Result<String> {
    match &cli.command {
        Command::Inspect { file, lenient } => inspect(file, *lenient),
        Command::Compact {
            file,
            capacity,
            reserve,
            ceiling,
            output,
            lenient,
        } => compact(file, *capacity, *reserve, *ceiling, output.as_deref(), *lenient),
        Command::Estimate { file } => estimate(file.as_deref()),
        Command::Schema => Ok(format!(
            "{}\n",
            serde_json::to_string_pretty(&MemoryState::json_schema())?
        )),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(output) => print!("{output}"),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
