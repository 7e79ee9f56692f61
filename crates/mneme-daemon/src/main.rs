//! `mneme-daemon`: the JSON-RPC 2.0 Unix-socket daemon and a thin CLI
//! client. Startup parses args, initializes logging, opens storage,
//! spawns the accept loop and the background dynamics task, then runs
//! until shutdown.

mod lock;
mod protocol;
mod server;
mod tools;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mneme_core::embeddings::{Embedder, NullEmbedder};
#[cfg(feature = "embeddings")]
use mneme_core::embeddings::{Pooling, TransformerConfig, TransformerEmbedder};
use mneme_core::{Config, Mind, Storage};

use protocol::transport;
use protocol::types::{JsonRpcRequest, JSONRPC_VERSION};

/// Wire-contract service name used in the socket path
/// (`/tmp/<service>-<semver>.sock`, spec.md §6).
const SERVICE_NAME: &str = "mneme";

#[derive(Parser)]
#[command(name = "mneme-daemon")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Semantic memory engine daemon and CLI")]
struct Cli {
    /// Override the storage base path (also settable via CHITTA_DB_PATH,
    /// per spec.md §6).
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Path to a TOML config file overriding `Config::default()`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon: bind the socket, accept JSON-RPC connections,
    /// and run the background dynamics loop until terminated.
    Serve {
        /// Directory to load bundled transformer weights from
        /// (vocab.txt + model weights); without it the embedder falls
        /// back to zero vectors and BM25-only recall.
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
    /// Report whether the daemon is reachable and its current vitality.
    Status,
    /// Hybrid recall against a running daemon.
    Recall {
        query: String,
        #[arg(long, default_value = "10")]
        k: usize,
    },
    /// Create a memory node via a running daemon.
    Remember {
        text: String,
        #[arg(long, default_value = "episode")]
        node_type: String,
    },
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

/// `<base>.hot` holds the SQLite-backed store (spec.md §6's persisted
/// state layout; see `mneme-core::storage` for why the actual on-disk
/// format is one `rusqlite` file rather than the literal multi-file
/// layout spec.md sketches).
fn resolve_base_path(cli_path: Option<PathBuf>) -> std::io::Result<PathBuf> {
    if let Some(p) = cli_path {
        return Ok(p);
    }
    if let Ok(env_path) = std::env::var("CHITTA_DB_PATH") {
        return Ok(PathBuf::from(env_path));
    }
    let proj_dirs = ProjectDirs::from("dev", "mneme", "mneme")
        .ok_or_else(|| std::io::Error::other("could not determine project directories"))?;
    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(data_dir, std::fs::Permissions::from_mode(0o700));
    }
    Ok(data_dir.join("mneme.hot"))
}

fn load_config(path: Option<&Path>) -> Config {
    let Some(path) = path else {
        return Config::default();
    };
    match std::fs::read_to_string(path) {
        Ok(contents) => Config::from_toml_str(&contents).unwrap_or_else(|e| {
            warn!(error = %e, "failed to parse config file, using defaults");
            Config::default()
        }),
        Err(e) => {
            warn!(error = %e, "failed to read config file, using defaults");
            Config::default()
        }
    }
}

fn build_embedder(
    #[allow(unused_variables)] model_dir: Option<PathBuf>,
    #[allow(unused_variables)] config: &Config,
) -> Box<dyn Embedder> {
    #[cfg(feature = "embeddings")]
    if let Some(dir) = model_dir {
        return Box::new(TransformerEmbedder::new(TransformerConfig {
            model_dir: dir,
            dimension: config.dimension,
            max_seq_len: config.max_seq_len,
            pooling: Pooling::Mean,
        }));
    }
    Box::new(NullEmbedder::new(config.dimension))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging();

    let base_path = match resolve_base_path(cli.db_path.clone()) {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "could not resolve storage path");
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Serve { model_dir } => run_serve(base_path, cli.config, model_dir).await,
        Commands::Status => run_status().await,
        Commands::Recall { query, k } => run_recall(query, k).await,
        Commands::Remember { text, node_type } => run_remember(text, node_type).await,
    }
}

async fn run_serve(base_path: PathBuf, config_path: Option<PathBuf>, model_dir: Option<PathBuf>) {
    let store_lock = match lock::StoreLock::try_acquire(&base_path) {
        Ok(Some(lock)) => lock,
        Ok(None) => {
            warn!(path = %base_path.display(), "storage directory already locked by another process");
            signal_running_daemon().await;
            std::process::exit(lock::EXIT_LOCK_CONTENTION);
        }
        Err(e) => {
            error!(error = %e, "failed to acquire storage lock");
            std::process::exit(1);
        }
    };
    info!(lock = %store_lock.path().display(), "storage lock acquired");

    let config = load_config(config_path.as_deref());
    let storage = match Storage::open(&base_path, config.tiers.hot_capacity) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to open storage");
            std::process::exit(1);
        }
    };

    let embedder = build_embedder(model_dir, &config);
    let now_ms = chrono::Utc::now().timestamp_millis();
    let mind: tools::SharedMind = Arc::new(Mind::new(storage, embedder, config, now_ms));

    let socket_path = transport::socket_path(SERVICE_NAME, env!("CARGO_PKG_VERSION"));
    let listener = match transport::bind(&socket_path) {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, socket = %socket_path.display(), "failed to bind socket");
            std::process::exit(1);
        }
    };
    info!(socket = %socket_path.display(), "listening");

    let server = Arc::new(server::Server::new(mind.clone()));
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

    let accept_server = server.clone();
    let accept_task = tokio::spawn(async move {
        transport::accept_loop(
            listener,
            move |req: JsonRpcRequest| {
                let server = accept_server.clone();
                async move { server.handle(req).await }
            },
            shutdown_rx,
        )
        .await;
    });

    let tick_mind = mind.clone();
    let tick_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            let now_ms = chrono::Utc::now().timestamp_millis();
            if let Err(e) = tick_mind.tick(now_ms) {
                warn!(error = %e, "background tick failed");
            }
        }
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutdown requested");
    let _ = shutdown_tx.send(()).await;
    tick_task.abort();
    let _ = accept_task.await;
    let _ = std::fs::remove_file(&socket_path);
    drop(store_lock);
}

/// spec.md §5: "a second start attempt ... signals the existing daemon
/// via its socket instead of opening the store." A plain liveness
/// check is enough — the existing daemon already owns the store.
async fn signal_running_daemon() {
    let socket_path = transport::socket_path(SERVICE_NAME, env!("CARGO_PKG_VERSION"));
    let request = JsonRpcRequest {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id: Some(serde_json::json!(0)),
        method: "initialize".to_string(),
        params: None,
    };
    match transport::call(&socket_path, &request).await {
        Ok(_) => info!("existing daemon responded on socket; nothing to do"),
        Err(e) => warn!(error = %e, "lock held but socket unreachable; daemon may be starting or wedged"),
    }
}

async fn call_running_daemon(method: &str, params: Option<serde_json::Value>) -> Option<serde_json::Value> {
    let socket_path = transport::socket_path(SERVICE_NAME, env!("CARGO_PKG_VERSION"));
    let init = JsonRpcRequest {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id: Some(serde_json::json!(0)),
        method: "initialize".to_string(),
        params: None,
    };
    if let Err(e) = transport::call(&socket_path, &init).await {
        eprintln!("could not reach daemon at {}: {e}", socket_path.display());
        return None;
    }

    let request = JsonRpcRequest {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id: Some(serde_json::json!(1)),
        method: method.to_string(),
        params,
    };
    match transport::call(&socket_path, &request).await {
        Ok(resp) => {
            if let Some(err) = resp.error {
                eprintln!("daemon error: {err}");
                None
            } else {
                resp.result
            }
        }
        Err(e) => {
            eprintln!("call failed: {e}");
            None
        }
    }
}

async fn run_status() {
    let result = call_running_daemon(
        "tools/call",
        Some(serde_json::json!({"name": "competence", "arguments": {}})),
    )
    .await;
    match result {
        Some(v) => println!("{}", serde_json::to_string_pretty(&v).unwrap_or_default()),
        None => std::process::exit(1),
    }
}

async fn run_recall(query: String, k: usize) {
    let result = call_running_daemon(
        "tools/call",
        Some(serde_json::json!({"name": "recall", "arguments": {"query": query, "k": k}})),
    )
    .await;
    match result {
        Some(v) => println!("{}", serde_json::to_string_pretty(&v).unwrap_or_default()),
        None => std::process::exit(1),
    }
}

async fn run_remember(text: String, node_type: String) {
    let result = call_running_daemon(
        "tools/call",
        Some(serde_json::json!({"name": "grow", "arguments": {"node_type": node_type, "text": text}})),
    )
    .await;
    match result {
        Some(v) => println!("{}", serde_json::to_string_pretty(&v).unwrap_or_default()),
        None => std::process::exit(1),
    }
}
