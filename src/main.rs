//! `lsp-bridge` CLI entrypoint.
//!
//! Default behavior (no subcommand, or `serve`): run the MCP⇄LSP bridge on
//! stdio — read MCP JSON-RPC requests from stdin, write responses to
//! stdout, exactly the process model spec.md assumes. `doctor` and `status`
//! are diagnostic subcommands; neither starts the long-running bridge loop.

use anyhow::Result;
use clap::{Parser, Subcommand};
use lsp_bridge::config::BridgeConfig;
use lsp_bridge::lsp::watcher::EditWatcher;
use lsp_bridge::mcp;
use lsp_bridge::BridgeContext;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{debug, error, info, warn};

#[derive(Parser)]
#[command(
    name = "lsp-bridge",
    about = "MCP⇄LSP bridge — exposes live language-server diagnostics, hover, and definitions over MCP",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Data directory for `servers.toml` and per-workspace state.
    #[arg(long, env = "LSP_BRIDGE_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Log level filter (EnvFilter syntax, e.g. "info", "lsp_bridge=debug,warn").
    #[arg(long, env = "LSP_BRIDGE_LOG", global = true)]
    log: Option<String>,

    /// Write logs to this file in addition to stderr. Never stdout — stdout
    /// is the MCP wire.
    #[arg(long, env = "LSP_BRIDGE_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,

    /// Path to the edit-notify file (spec.md §6). Default: `/tmp/lsp-bridge-notify.txt`.
    #[arg(long, env = "LSP_BRIDGE_NOTIFY_FILE", global = true)]
    notify_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the bridge in the foreground on stdio (the default).
    ///
    /// Examples:
    ///   lsp-bridge serve
    ///   lsp-bridge
    Serve,
    /// Check that every configured language server is reachable and every
    /// required directory is writable, without starting the bridge loop.
    ///
    /// Examples:
    ///   lsp-bridge doctor
    Doctor,
    /// Start the registry, report configured workspaces and their resolved
    /// commands, and exit. This bridge has no background daemon to query —
    /// `status` is a one-shot config report, not a live connection check.
    ///
    /// Examples:
    ///   lsp-bridge status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = args.log.as_deref().unwrap_or("info").to_owned();
    let _log_guard = setup_logging(&log_level, args.log_file.as_deref());

    let config = BridgeConfig::new(args.data_dir.clone(), args.log.clone(), args.notify_file.clone());

    match args.command {
        Some(Command::Doctor) => {
            let ok = run_doctor(&config).await;
            std::process::exit(if ok { 0 } else { 1 });
        }
        Some(Command::Status) => {
            run_status(config).await?;
        }
        None | Some(Command::Serve) => {
            run_server(config).await?;
        }
    }

    Ok(())
}

/// Initialize the tracing subscriber. Logs never go to stdout — stdout
/// carries MCP JSON-RPC traffic exclusively. Returns a `WorkerGuard` that
/// must stay alive for the process lifetime when file logging is enabled.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("lsp-bridge.log"));

        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stderr only",
                dir.display()
            );
            tracing_subscriber::fmt()
                .with_env_filter(log_level)
                .with_writer(std::io::stderr)
                .compact()
                .init();
            return None;
        }

        // Single append-only log file (spec.md §6) — `rolling::never`, not
        // the teacher's `rolling::daily`, since spec.md asks for one file.
        let appender = tracing_appender::rolling::never(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(log_level))
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).compact())
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
            .init();

        Some(guard)
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .with_writer(std::io::stderr)
            .compact()
            .init();
        None
    }
}

/// Run the MCP⇄LSP bridge: read MCP requests from stdin, dispatch, write
/// responses to stdout, until stdin closes or a shutdown signal arrives.
async fn run_server(config: BridgeConfig) -> Result<()> {
    info!(
        servers = config.servers.len(),
        notify_file = %config.notify_file.display(),
        "starting lsp-bridge"
    );

    let ctx = Arc::new(BridgeContext::new(config));
    let dispatcher = Arc::new(mcp::McpDispatcher::new(ctx.clone()));

    let watcher = EditWatcher::start(ctx.config.notify_file.clone(), ctx.registry.clone());
    if watcher.is_none() {
        warn!("continuing without out-of-band edit delivery");
    }

    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin);
    let mut stdout = tokio::io::stdout();

    let serve_loop = async {
        loop {
            match mcp::read_message(&mut reader).await {
                Ok(Some(msg)) => {
                    if let Some(response) = handle_message(&ctx, &dispatcher, msg).await {
                        if let Err(e) = mcp::write_response(&mut stdout, &response).await {
                            error!(error = %e, "failed to write MCP response, stopping");
                            break;
                        }
                    }
                }
                Ok(None) => {
                    debug!("stdin closed, shutting down");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "fatal MCP transport error");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = serve_loop => {}
        _ = tokio::signal::ctrl_c() => {
            info!("received interrupt, shutting down");
        }
    }

    if let Some(watcher) = &watcher {
        watcher.cancel();
    }
    ctx.shutdown().await;
    Ok(())
}

/// Route one incoming MCP message to the right handler. Returns `None` for
/// notifications, which never get a reply.
async fn handle_message(
    ctx: &Arc<BridgeContext>,
    dispatcher: &Arc<mcp::McpDispatcher>,
    msg: mcp::McpMessage,
) -> Option<mcp::McpResponse> {
    let is_notification = msg.is_notification();
    let id = msg.id.clone().unwrap_or(Value::Null);

    let result: Result<Value, mcp::McpError> = match msg.method.as_str() {
        "initialize" => {
            let client_caps = msg.params.get("capabilities").cloned().unwrap_or(json!({}));
            let caps = mcp::negotiate(client_caps).to_mcp_value();
            return Some(mcp::handle_initialize(id, caps));
        }
        "notifications/initialized" | "initialized" => {
            mcp::handle_initialized();
            return None;
        }
        "ping" => return Some(mcp::handle_ping(id)),
        "tools/list" => Ok(mcp::handle_tools_list()),
        "tools/call" => {
            let name = msg.params.get("name").and_then(|v| v.as_str()).unwrap_or_default();
            let arguments = msg.params.get("arguments").cloned().unwrap_or(json!({}));
            match dispatcher.dispatch(name, arguments).await {
                Ok(value) => Ok(json!({
                    "content": [{ "type": "text", "text": value.to_string() }],
                    "isError": false,
                })),
                Err(e) => Ok(json!({
                    "content": [{ "type": "text", "text": e.message }],
                    "isError": true,
                })),
            }
        }
        "resources/list" => {
            let resources = mcp::list_resources(&ctx.facade).await;
            Ok(json!({ "resources": resources }))
        }
        "resources/read" => {
            let uri = msg.params.get("uri").and_then(|v| v.as_str()).unwrap_or_default();
            match mcp::read_resource(&ctx.facade, uri).await {
                Some(contents) => Ok(contents),
                None => Err(mcp::McpError::new(
                    mcp::MCP_INVALID_PARAMS,
                    format!("unknown resource uri: {uri}"),
                )),
            }
        }
        "prompts/list" => Ok(json!({ "prompts": mcp::prompts::list_prompts() })),
        "prompts/get" => {
            let name = msg.params.get("name").and_then(|v| v.as_str()).unwrap_or_default();
            let arguments = msg.params.get("arguments").cloned().unwrap_or(json!({}));
            match mcp::prompts::get_prompt(name, &arguments) {
                Some(prompt) => Ok(prompt),
                None => Err(mcp::McpError::new(
                    mcp::MCP_INVALID_PARAMS,
                    format!("unknown prompt: {name}"),
                )),
            }
        }
        other => {
            warn!(method = other, "unrecognized MCP method");
            Err(mcp::McpError::new(
                mcp::MCP_METHOD_NOT_FOUND,
                format!("method not found: {other}"),
            ))
        }
    };

    if is_notification {
        return None;
    }

    Some(match result {
        Ok(value) => mcp::McpResponse::ok(id, value),
        Err(e) => mcp::McpResponse::err(id, e),
    })
}

/// `doctor` — checks the configured LSP commands are on `$PATH`, the notify
/// file's parent directory is writable, and the data directory is writable.
/// Returns `true` if every check passed.
async fn run_doctor(config: &BridgeConfig) -> bool {
    let mut all_ok = true;

    println!("lsp-bridge doctor");
    println!();

    for server in &config.servers {
        let program = server.command.first().map(String::as_str).unwrap_or("");
        let found = which(program);
        let status = if found { "ok" } else { "MISSING" };
        if !found {
            all_ok = false;
        }
        println!("  [{status}] {} — command `{program}`", server.name);
    }
    if config.servers.is_empty() {
        println!("  (no workspaces configured in servers.toml)");
    }

    let notify_dir = config
        .notify_file
        .parent()
        .map(std::path::Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let notify_writable = is_writable_dir(&notify_dir).await;
    println!(
        "  [{}] notify file directory writable: {}",
        if notify_writable { "ok" } else { "MISSING" },
        notify_dir.display()
    );
    all_ok &= notify_writable;

    let data_dir_writable = is_writable_dir(&config.data_dir).await;
    println!(
        "  [{}] data directory writable: {}",
        if data_dir_writable { "ok" } else { "MISSING" },
        config.data_dir.display()
    );
    all_ok &= data_dir_writable;

    all_ok
}

fn which(program: &str) -> bool {
    if program.is_empty() {
        return false;
    }
    if std::path::Path::new(program).is_absolute() {
        return std::path::Path::new(program).exists();
    }
    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| {
                let candidate = dir.join(program);
                candidate.is_file()
            })
        })
        .unwrap_or(false)
}

async fn is_writable_dir(path: &std::path::Path) -> bool {
    if tokio::fs::create_dir_all(path).await.is_err() {
        return false;
    }
    let probe = path.join(".lsp-bridge-doctor-probe");
    let writable = tokio::fs::write(&probe, b"ok").await.is_ok();
    let _ = tokio::fs::remove_file(&probe).await;
    writable
}

/// `status` — start the registry (without connecting to any language
/// server) and report configured workspaces and their resolved commands.
async fn run_status(config: BridgeConfig) -> Result<()> {
    println!("lsp-bridge status");
    println!("  data_dir: {}", config.data_dir.display());
    println!("  notify_file: {}", config.notify_file.display());
    println!("  workspaces:");
    if config.servers.is_empty() {
        println!("    (none configured — add entries to {}/servers.toml)", config.data_dir.display());
    }
    for server in &config.servers {
        println!(
            "    {} — root {} — command {:?}",
            server.name,
            server.workspace_root.display(),
            server.command
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn which_finds_absolute_path_to_existing_file() {
        assert!(which("/bin/sh") || which("/usr/bin/sh"));
    }

    #[test]
    fn which_rejects_empty_program() {
        assert!(!which(""));
    }

    #[tokio::test]
    async fn is_writable_dir_creates_and_probes() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested");
        assert!(is_writable_dir(&target).await);
    }
}
