use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use directories::BaseDirs;
use rustyline::{error::ReadlineError, DefaultEditor};
use tessera_shard::{Cluster, OwnedKey, ShardConfig};
use tokio::net::TcpStream;
use tracing::{debug, Level};

/// Tessera shard routing tool.
#[derive(Parser)]
#[command(name = "tesserctl", author, version, about = "Tessera shard routing tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    opts: Options,
}

#[derive(Args)]
struct Options {
    /// Shard file, YAML or JSON (default: $HOME/.tessera.yaml when present, else environment).
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,

    /// Environment prefix for [PREFIX_]SHARD_ADDRESS_n.
    #[arg(long, global = true)]
    prefix: Option<String>,

    /// Log level (RUST_LOG overrides).
    #[arg(long, default_value = "warn", global = true)]
    log_level: Level,

    /// Write JSON logs to this directory instead of stdout.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum KeyKind {
    Int,
    Uint,
    Str,
    Bytes,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured shards.
    Shards,

    /// Print the shard a key routes to.
    Route {
        key: String,
        #[arg(long, value_enum, default_value_t = KeyKind::Str)]
        kind: KeyKind,
    },

    /// Group keys by shard.
    Map {
        #[arg(required = true)]
        keys: Vec<String>,
        #[arg(long, value_enum, default_value_t = KeyKind::Str)]
        kind: KeyKind,
    },

    /// Open a TCP connection to every shard and report peers.
    Ping {
        /// Per-shard connect timeout in seconds.
        #[arg(long, default_value_t = 3)]
        timeout: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log = tessera_log::init(cli.opts.log_dir.as_deref(), cli.opts.log_level)?;
    let shards = load_shards(&cli.opts)?;
    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Some(Commands::Shards) => {
            let cluster = rt.block_on(offline(shards))?;
            for shard in cluster.all() {
                println!("id={} address={}", shard.id(), shard.conn());
            }
        }

        Some(Commands::Route { key, kind }) => {
            let cluster = rt.block_on(offline(shards))?;
            println!("{}", route(&cluster, &parse_key(&key, kind)?));
        }

        Some(Commands::Map { keys, kind }) => {
            let cluster = rt.block_on(offline(shards))?;
            let keys = keys
                .iter()
                .map(|k| parse_key(k, kind))
                .collect::<anyhow::Result<Vec<_>>>()?;
            for line in map_lines(&cluster, keys) {
                println!("{line}");
            }
        }

        Some(Commands::Ping { timeout }) => {
            for (id, peer) in rt.block_on(ping(shards, Duration::from_secs(timeout)))? {
                println!("id={id} peer={peer} ok");
            }
        }

        None => {
            let cluster = rt.block_on(offline(shards))?;
            interactive_shell(&cluster)?;
        }
    }
    Ok(())
}

/// Shards from --config, then $HOME/.tessera.yaml, then the environment.
fn load_shards(opts: &Options) -> anyhow::Result<Vec<ShardConfig>> {
    let file = opts.config.clone().or_else(|| {
        BaseDirs::new()
            .map(|b| b.home_dir().join(".tessera.yaml"))
            .filter(|p| p.exists())
    });
    if let Some(path) = &file {
        debug!(path = %path.display(), "loading shard file");
    }
    let shards = tessera_config::resolve(file.as_deref(), opts.prefix.as_deref())?;
    if shards.is_empty() {
        bail!("no shards configured: set [PREFIX_]SHARD_ADDRESS_1.. or pass --config");
    }
    Ok(shards)
}

/// Cluster whose connections are just the shard addresses. Routing only.
async fn offline(shards: Vec<ShardConfig>) -> anyhow::Result<Cluster<i64, String>> {
    let cluster = Cluster::builder(shards)
        .connector(|addr: String| async move { Ok::<_, Infallible>(addr) })
        .connect()
        .await?;
    Ok(cluster)
}

async fn ping(shards: Vec<ShardConfig>, timeout: Duration) -> anyhow::Result<Vec<(i64, SocketAddr)>> {
    let cluster = Cluster::builder(shards)
        .connector(move |addr: String| async move {
            match tokio::time::timeout(timeout, TcpStream::connect(addr.as_str())).await {
                Ok(res) => res,
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect to {addr} timed out"),
                )),
            }
        })
        .connect()
        .await
        .context("connect shards")?;

    let peers = Arc::new(Mutex::new(Vec::new()));
    cluster
        .each(|shard| {
            let peers = peers.clone();
            async move {
                let peer = shard.conn().peer_addr()?;
                peers.lock().unwrap_or_else(|e| e.into_inner()).push((*shard.id(), peer));
                Ok::<(), io::Error>(())
            }
        })
        .await
        .context("inspect shards")?;

    let mut peers = std::mem::take(&mut *peers.lock().unwrap_or_else(|e| e.into_inner()));
    peers.sort();
    Ok(peers)
}

fn parse_key(raw: &str, kind: KeyKind) -> anyhow::Result<OwnedKey> {
    Ok(match kind {
        KeyKind::Int => OwnedKey::Int(raw.parse().with_context(|| format!("invalid int key {raw:?}"))?),
        KeyKind::Uint => OwnedKey::Uint(raw.parse().with_context(|| format!("invalid uint key {raw:?}"))?),
        KeyKind::Str => OwnedKey::Str(raw.to_string()),
        KeyKind::Bytes => OwnedKey::Bytes(raw.as_bytes().to_vec()),
    })
}

fn route(cluster: &Cluster<i64, String>, key: &OwnedKey) -> String {
    let shard = cluster.shard(key);
    format!("key={key} shard_id={} address={}", shard.id(), shard.conn())
}

fn map_lines(cluster: &Cluster<i64, String>, keys: Vec<OwnedKey>) -> Vec<String> {
    cluster
        .map(keys)
        .into_iter()
        .map(|(shard, keys)| {
            let keys: Vec<String> = keys.iter().map(ToString::to_string).collect();
            format!("shard_id={} address={} keys={}", shard.id(), shard.conn(), keys.join(","))
        })
        .collect()
}

/// Evaluate one shell line. `None` ends the session.
fn eval_line(cluster: &Cluster<i64, String>, line: &str) -> Option<String> {
    let line = line.trim();
    if line.eq_ignore_ascii_case("exit") || line == "\\q" {
        return None;
    }
    if line == "shards" {
        let lines: Vec<String> = cluster
            .all()
            .iter()
            .map(|s| format!("id={} address={}", s.id(), s.conn()))
            .collect();
        return Some(lines.join("\n"));
    }
    let (kind, raw) = match line.split_once(' ') {
        Some(("int", rest)) => (KeyKind::Int, rest.trim()),
        Some(("uint", rest)) => (KeyKind::Uint, rest.trim()),
        Some(("bytes", rest)) => (KeyKind::Bytes, rest.trim()),
        _ => (KeyKind::Str, line),
    };
    Some(match parse_key(raw, kind) {
        Ok(key) => route(cluster, &key),
        Err(e) => format!("Error: {e:#}"),
    })
}

/// Interactive readline shell routing typed keys.
fn interactive_shell(cluster: &Cluster<i64, String>) -> anyhow::Result<()> {
    let mut rl = DefaultEditor::new().context("failed to init editor")?;
    let prompt = "tesserctl> ";

    loop {
        match rl.readline(prompt) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.trim());
                match eval_line(cluster, &line) {
                    Some(out) => println!("{out}"),
                    None => break,
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Readline error: {err}");
                break;
            }
        }
    }
    Ok(())
}
