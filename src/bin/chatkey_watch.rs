//! chatkey line-oriented watcher
//!
//! Reads chat events and operator commands as JSON lines on stdin and writes
//! deliveries as JSON lines on stdout. Logs go to stderr.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chatkey::{
    ChatEvent, ChatKeyError, ChatWatcher, Delivery, ExecutionError, MatchMode, MatchStream, Roster,
    RosterStyle, SessionSnapshot, WatcherConfig,
};

/// How long the printer waits for a delivery before checking for snapshots.
const PRINT_POLL: Duration = Duration::from_millis(20);

/// Command-line configuration
struct Args {
    /// Keyword active from the start
    keyword: Option<String>,
    /// Force whole-message matching
    anchored: bool,
    /// JSON configuration file
    config: Option<PathBuf>,
    /// Log filter directive
    log: String,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            keyword: None,
            anchored: false,
            config: None,
            log: "info".to_string(),
        }
    }
}

fn print_help() {
    println!("chatkey-watch - keyword matcher for live chat");
    println!();
    println!("USAGE:");
    println!("    chatkey-watch [OPTIONS] < events.jsonl");
    println!();
    println!("OPTIONS:");
    println!("    -k, --keyword <TEXT>      Keyword to activate at startup");
    println!("    -a, --anchored            Require the keyword to be the whole message");
    println!("    -c, --config <FILE>       JSON configuration file");
    println!("    -l, --log <FILTER>        Log filter [default: info, or RUST_LOG]");
    println!("    -h, --help                Print help information");
    println!();
    println!("INPUT LINES:");
    println!(r#"    {{"type":"chat","nickname":"ann","unique_id":"ann_01","comment":"yes!!"}}"#);
    println!(r#"    {{"type":"set_keyword","keyword":"happy birthday"}}"#);
    println!(r#"    {{"type":"clear_keyword"}}"#);
    println!(r#"    {{"type":"snapshot","style":"sanitized"}}"#);
}

fn parse_args() -> Result<Args, String> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let mut args = Args::default();
    if let Ok(filter) = std::env::var("RUST_LOG") {
        args.log = filter;
    }

    let mut it = argv.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--keyword" | "-k" => {
                args.keyword = Some(it.next().ok_or("--keyword requires a value")?);
            }
            "--anchored" | "-a" => args.anchored = true,
            "--config" | "-c" => {
                args.config = Some(PathBuf::from(it.next().ok_or("--config requires a value")?));
            }
            "--log" | "-l" => {
                args.log = it.next().ok_or("--log requires a value")?;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }

    Ok(args)
}

/// One stdin line.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Input {
    Chat {
        #[serde(default)]
        nickname: Option<String>,
        #[serde(default)]
        unique_id: Option<String>,
        #[serde(default)]
        comment: Option<String>,
    },
    SetKeyword {
        keyword: String,
    },
    ClearKeyword,
    Snapshot {
        #[serde(default)]
        style: RosterStyle,
    },
}

/// A snapshot line handed to the printer, acknowledged once written.
struct SnapshotLine {
    value: serde_json::Value,
    done: Sender<()>,
}

fn snapshot_json(snap: &SessionSnapshot, style: RosterStyle) -> serde_json::Value {
    serde_json::json!({
        "type": "snapshot",
        "keyword": snap.keyword,
        "generation": snap.generation,
        "roster": Roster::join(&snap.matched, style),
    })
}

fn write_line<W: Write>(out: &mut W, value: &serde_json::Value) {
    let _ = writeln!(out, "{value}");
    let _ = out.flush();
}

fn write_delivery<W: Write>(out: &mut W, delivery: &Delivery) {
    match serde_json::to_value(delivery) {
        Ok(value) => write_line(out, &value),
        Err(e) => warn!(error = %e, "failed to encode delivery"),
    }
}

/// Writes each pending snapshot after every delivery buffered ahead of it.
fn flush_snapshots<W: Write>(stream: &MatchStream, snapshots: &Receiver<SnapshotLine>, out: &mut W) {
    while let Ok(line) = snapshots.try_recv() {
        while let Ok(Some(delivery)) = stream.try_recv() {
            write_delivery(out, &delivery);
        }
        write_line(out, &line.value);
        let _ = line.done.send(());
    }
}

/// Sole writer of stdout.
///
/// Deliveries dispatched before a snapshot are already buffered in the stream when
/// the snapshot arrives, so draining the stream first keeps the output in order.
fn print_deliveries<W: Write>(stream: &MatchStream, snapshots: &Receiver<SnapshotLine>, out: &mut W) {
    loop {
        match stream.recv_timeout(PRINT_POLL) {
            Ok(delivery) => write_delivery(out, &delivery),
            Err(ChatKeyError::Execution(ExecutionError::Timeout { .. })) => {}
            Err(_) => break,
        }
        flush_snapshots(stream, snapshots, out);
    }
    flush_snapshots(stream, snapshots, out);
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("error: {msg}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&args.log))
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let mut cfg = match &args.config {
        Some(path) => WatcherConfig::from_json_file(path)?,
        None => WatcherConfig::default(),
    };
    if args.anchored {
        cfg.matcher.mode = MatchMode::Anchored;
    }

    info!(version = env!("CARGO_PKG_VERSION"), mode = ?cfg.matcher.mode, "chatkey-watch starting");
    let watcher = ChatWatcher::new(cfg)?;
    let stream = watcher.subscribe()?;

    let (snapshot_tx, snapshot_rx) = unbounded::<SnapshotLine>();

    let printer = thread::Builder::new()
        .name("chatkey-print".to_string())
        .spawn(move || {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            print_deliveries(&stream, &snapshot_rx, &mut out);
        })?;

    if let Some(keyword) = &args.keyword {
        watcher.set_keyword(keyword)?;
    }

    for (lineno, line) in io::stdin().lock().lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let input: Input = match serde_json::from_str(trimmed) {
            Ok(input) => input,
            Err(e) => {
                warn!(line = lineno + 1, error = %e, "skipping invalid input line");
                continue;
            }
        };

        match input {
            Input::Chat {
                nickname,
                unique_id,
                comment,
            } => {
                let event = ChatEvent::from_platform(
                    nickname.as_deref(),
                    unique_id.as_deref(),
                    comment.as_deref(),
                );
                watcher.ingest_blocking(event)?;
            }
            Input::SetKeyword { keyword } => {
                if let Err(e) = watcher.set_keyword(&keyword) {
                    warn!(line = lineno + 1, error = %e, "keyword rejected");
                }
            }
            Input::ClearKeyword => {
                watcher.clear_keyword()?;
            }
            Input::Snapshot { style } => {
                let snap = watcher.snapshot()?;
                let (done_tx, done_rx) = bounded::<()>(1);
                let line = SnapshotLine {
                    value: snapshot_json(&snap, style),
                    done: done_tx,
                };
                // Hold further input until the printer has written the snapshot.
                if snapshot_tx.send(line).is_err() || done_rx.recv().is_err() {
                    warn!(line = lineno + 1, "printer stopped, snapshot not written");
                }
            }
        }
    }

    watcher.shutdown()?;
    if printer.join().is_err() {
        warn!("printer thread panicked");
    }

    info!("chatkey-watch stopped");
    Ok(())
}
