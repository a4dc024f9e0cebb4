// crates/tg_cli/src/main.rs
//
// Exit codes, typed error mapping, logging setup and the subcommand bodies.
// Logs go to stderr; stdout carries only machine-readable output.

mod args;

mod exitcodes {
    pub const OK: i32 = 0;
    pub const VALIDATION: i32 = 2;
    pub const IO: i32 = 4;
    /// Engine or collaborator failure during replay.
    pub const ENGINE: i32 = 5;
}

use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use args::{parse_and_validate as parse_cli, Args, Command};

use tg_algo::allocation::{build_leaderboard_slots, insert_tag_holder};
use tg_core::{EngineParams, LeaderboardSlotMap, MemberTagAssignment, RoundInput};
use tg_io::canonical_json::to_canonical_bytes;
use tg_io::hasher::fingerprint;
use tg_io::intent_store::{FileIntentStore, IntentStore, MemoryIntentStore};
use tg_io::{config, IoError};
use tg_pipeline::{InboundEvent, LeagueEngine, MemoryLeaderboard};

/// Central error type for CLI → exit-code mapping.
#[derive(Debug)]
enum MainError {
    /// Malformed input files or parameters
    Validation(String),
    /// Read/write/path errors
    Io(String),
    /// The engine reported a collaborator failure for at least one event
    Engine(String),
}

impl std::fmt::Display for MainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MainError::Validation(m) => write!(f, "validation: {m}"),
            MainError::Io(m) => write!(f, "io: {m}"),
            MainError::Engine(m) => write!(f, "engine: {m}"),
        }
    }
}

fn main() -> ExitCode {
    let args = match parse_cli() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("tags: error: {e}");
            return ExitCode::from(exitcodes::VALIDATION as u8);
        }
    };
    init_tracing(args.log_level.as_deref());

    let rc = match run(&args) {
        Ok(()) => exitcodes::OK,
        Err(e) => {
            eprintln!("tags: error: {e}");
            map_error(&e)
        }
    };
    ExitCode::from(rc as u8)
}

/// `--log-level` wins over RUST_LOG; default `info`.
fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(l) => EnvFilter::new(l),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(false)
        .with_env_filter(filter)
        .compact()
        .init();
}

fn map_error(e: &MainError) -> i32 {
    use exitcodes::*;
    match e {
        MainError::Validation(_) => VALIDATION,
        MainError::Io(_) => IO,
        MainError::Engine(_) => ENGINE,
    }
}

/// Translate tg_io::IoError into MainError buckets.
fn map_io_err(e: IoError) -> MainError {
    match e {
        IoError::Path(m) => MainError::Io(m),
        IoError::Json { pointer, msg } => MainError::Validation(format!("json {pointer}: {msg}")),
        IoError::Invalid(m) => MainError::Validation(m),
    }
}

fn run(args: &Args) -> Result<(), MainError> {
    match &args.command {
        Command::Fingerprint { round } => run_fingerprint(round),
        Command::Params { params } => {
            let p = config::load_params(params).map_err(map_io_err)?;
            print_canonical(&p)
        }
        Command::Replay { events, params, intents_dir } => {
            let params = match params {
                Some(p) => config::load_params(p).map_err(map_io_err)?,
                None => EngineParams::default(),
            };
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .map_err(|e| MainError::Io(format!("runtime: {e}")))?;
            rt.block_on(async {
                match intents_dir {
                    Some(dir) => replay(events, params, FileIntentStore::new(dir)).await,
                    None => replay(events, params, MemoryIntentStore::new()).await,
                }
            })
        }
        Command::Slots { board, pairs, insert } => {
            let current: Vec<MemberTagAssignment> = read_json(board)?;
            let current: LeaderboardSlotMap = current.into_iter().map(|a| (a.tag, a.member_id)).collect();
            let next = match (pairs, insert) {
                (Some(p), _) => {
                    let pairs: Vec<String> = read_json(p)?;
                    build_leaderboard_slots(&current, &pairs)
                }
                (None, Some((tag, member))) => insert_tag_holder(&current, *tag, member),
                (None, None) => return Err(MainError::Validation("--pairs or --insert required".into())),
            };
            let out: Vec<MemberTagAssignment> = next
                .into_iter()
                .map(|(tag, member_id)| MemberTagAssignment { member_id, tag })
                .collect();
            print_canonical(&out)
        }
    }
}

fn run_fingerprint(path: &Path) -> Result<(), MainError> {
    let results: Vec<RoundInput> = read_json(path)?;
    let fp = fingerprint(&results).map_err(|e| MainError::Validation(e.to_string()))?;
    let mut out = io::stdout().lock();
    writeln!(out, "{fp}").map_err(|e| MainError::Io(format!("stdout: {e}")))
}

/// One engine per replay; every event runs to completion before the next line is read.
async fn replay<S: IntentStore>(events: &Path, params: EngineParams, store: S) -> Result<(), MainError> {
    let file = fs::File::open(events).map_err(|e| MainError::Io(format!("open {}: {e}", events.display())))?;
    let engine = LeagueEngine::new(params, store, Arc::new(MemoryLeaderboard::new()));
    let mut stdout = io::stdout().lock();

    let mut handled = 0usize;
    let mut failures = 0usize;
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| MainError::Io(format!("read {}: {e}", events.display())))?;
        if line.trim().is_empty() {
            continue;
        }
        let event: InboundEvent = serde_json::from_str(&line)
            .map_err(|e| MainError::Validation(format!("{}:{}: {e}", events.display(), n + 1)))?;
        debug!(line = n + 1, event = event.kind(), "replaying");
        for out in engine.handle(event).await {
            if out.is_failure() {
                failures += 1;
            }
            let bytes = to_canonical_bytes(&out).map_err(map_io_err)?;
            stdout
                .write_all(&bytes)
                .and_then(|()| stdout.write_all(b"\n"))
                .map_err(|e| MainError::Io(format!("stdout: {e}")))?;
        }
        handled += 1;
    }
    info!(count = handled, failures, "replay finished");

    if failures > 0 {
        return Err(MainError::Engine(format!("{failures} event(s) failed")));
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, MainError> {
    let text = fs::read_to_string(path).map_err(|e| MainError::Io(format!("read {}: {e}", path.display())))?;
    serde_json::from_str(&text).map_err(|e| MainError::Validation(format!("{}: {e}", path.display())))
}

fn print_canonical<T: serde::Serialize>(value: &T) -> Result<(), MainError> {
    let bytes = to_canonical_bytes(value).map_err(map_io_err)?;
    let mut out = io::stdout().lock();
    out.write_all(&bytes)
        .and_then(|()| out.write_all(b"\n"))
        .map_err(|e| MainError::Io(format!("stdout: {e}")))
}
