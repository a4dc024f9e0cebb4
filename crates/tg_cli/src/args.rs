// crates/tg_cli/src/args.rs
//
// Offline CLI argument surface: subcommands, path checks and helpers.
//
// Rules:
// - No networked paths (reject any scheme:// like http/https/file)
// - Input files must exist and be regular files
// - `slots` takes exactly one of --pairs | --insert

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};

use tg_algo::allocation::parse_assignment_pair;
use tg_core::{MemberId, TagNumber};

/// Parsed CLI arguments (raw).
#[derive(Debug, Parser, Clone)]
#[command(
    name = "tags",
    disable_help_subcommand = true,
    about = "Offline CLI for the league tag engine"
)]
pub struct Args {
    /// Log filter for stderr output (e.g. `debug`, `tg_pipeline=trace`). Overrides RUST_LOG.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print the fingerprint of a round's results (JSON array of {member_id, finish_rank}).
    Fingerprint {
        #[arg(long)]
        round: PathBuf,
    },
    /// Load and validate a parameter file; print the effective parameters.
    Params {
        #[arg(long)]
        params: PathBuf,
    },
    /// Feed a JSON-lines event log through the engine; print outbound events as JSON lines.
    Replay {
        #[arg(long)]
        events: PathBuf,
        #[arg(long)]
        params: Option<PathBuf>,
        /// Keep pending swap intents in this directory instead of memory.
        #[arg(long)]
        intents_dir: Option<PathBuf>,
    },
    /// Rebuild a board (JSON array of {member_id, tag}) from "tag:member" pairs,
    /// or insert one holder into it.
    Slots {
        #[arg(long)]
        board: PathBuf,
        /// JSON array of "tag:member" strings.
        #[arg(long, conflicts_with = "insert")]
        pairs: Option<PathBuf>,
        /// One "tag:member" pair to insert.
        #[arg(long, value_parser = parse_pair)]
        insert: Option<(TagNumber, MemberId)>,
    },
}

/// Errors surfaced by argument validation.
/// Keep messages short/stable (handy for scripts/tests).
#[derive(Debug)]
pub enum CliError {
    Missing(&'static str),
    NonLocalPath(String),
    NotFound(String),
    NotADirectory(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use CliError::*;
        match self {
            Missing(s) => write!(f, "missing required flag: {s}"),
            NonLocalPath(p) => write!(f, "path must be local file (no scheme): {p}"),
            NotFound(p) => write!(f, "file not found: {p}"),
            NotADirectory(p) => write!(f, "not a directory: {p}"),
        }
    }
}
impl std::error::Error for CliError {}

/// `--insert` parser: a strict "tag:member" pair.
pub fn parse_pair(s: &str) -> Result<(TagNumber, MemberId), String> {
    parse_assignment_pair(s).ok_or_else(|| format!("expected TAG:MEMBER, got {s:?}"))
}

/// Entry point used by main.rs
pub fn parse_and_validate() -> Result<Args, CliError> {
    let mut args = Args::parse();
    validate(&mut args)?;
    Ok(args)
}

fn validate(args: &mut Args) -> Result<(), CliError> {
    match &mut args.command {
        Command::Fingerprint { round } => {
            ensure_local_exists(round, "--round")?;
            *round = normalize_path(round);
        }
        Command::Params { params } => {
            ensure_local_exists(params, "--params")?;
            *params = normalize_path(params);
        }
        Command::Replay { events, params, intents_dir } => {
            ensure_local_exists(events, "--events")?;
            *events = normalize_path(events);
            if let Some(p) = params {
                ensure_local_exists(p, "--params")?;
                *p = normalize_path(p);
            }
            if let Some(dir) = intents_dir {
                ensure_local_path(dir)?;
                if dir.exists() && !dir.is_dir() {
                    return Err(CliError::NotADirectory(format!("--intents-dir {}", dir.display())));
                }
                *dir = normalize_path(dir);
            }
        }
        Command::Slots { board, pairs, insert } => {
            ensure_local_exists(board, "--board")?;
            *board = normalize_path(board);
            match (pairs.as_mut(), insert) {
                (None, None) => return Err(CliError::Missing("--pairs | --insert")),
                (Some(p), _) => {
                    ensure_local_exists(p, "--pairs")?;
                    *p = normalize_path(p);
                }
                (None, Some(_)) => {}
            }
        }
    }
    Ok(())
}

/// Reject any explicit URI scheme (e.g., http://, https://, file://).
#[inline]
fn has_scheme(s: &str) -> bool {
    let lower = s.trim().to_ascii_lowercase();
    lower.contains("://") || lower.starts_with("http:") || lower.starts_with("https:") || lower.starts_with("file:")
}

#[inline]
fn ensure_local_path(p: &Path) -> Result<(), CliError> {
    if let Some(s) = p.to_str() {
        if has_scheme(s) {
            return Err(CliError::NonLocalPath(s.to_string()));
        }
    }
    Ok(())
}

/// Ensure a path is local (no scheme) and exists as a regular file.
fn ensure_local_exists(p: &Path, label: &'static str) -> Result<(), CliError> {
    ensure_local_path(p)?;
    let meta = fs::metadata(p).map_err(|_| CliError::NotFound(format!("{label} {}", p.display())))?;
    if !meta.is_file() {
        return Err(CliError::NotFound(format!("{label} {}", p.display())));
    }
    Ok(())
}

/// Best-effort normalization to an absolute path.
/// If canonicalize fails (e.g., path doesn't exist yet), produce an absolute path relative to CWD.
fn normalize_path(p: &Path) -> PathBuf {
    fs::canonicalize(p).unwrap_or_else(|_| {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join(p)
        }
    })
}
