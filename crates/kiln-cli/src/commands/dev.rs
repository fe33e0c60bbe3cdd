//! `kiln dev` command implementation.
//!
//! ```text
//! notify watcher ──paths──▶ build loop (ChangeQueue → DevSession)
//!        │                         │
//!        └─ cancel running pass    └─ HmrMessage ──broadcast──▶ /__kiln_hmr sockets
//! ```
//!
//! The build loop owns the session and runs on its own thread, so one batch
//! is fully processed before the next. The HTTP side only serves files from
//! the output directory and the content base.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use kiln_core::config::CONFIG_FILE;
use kiln_core::dev::{CancelSlot, ChangeQueue, DevSession, HmrMessage, PassResult, HMR_PATH};
use kiln_core::{BuildConfig, Bundler, Mode};
use miette::{IntoDiagnostic, Result};
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Instant;
use tokio::sync::broadcast;
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;

/// Dev server action.
#[derive(Debug, Clone)]
pub struct DevAction {
    pub cwd: PathBuf,
    pub config: Option<PathBuf>,
    pub mode: Option<Mode>,
    /// Port override.
    pub port: Option<u16>,
    /// Host override.
    pub host: Option<String>,
}

#[derive(Clone)]
struct DevState {
    hmr_tx: broadcast::Sender<HmrMessage>,
}

/// Run the dev server until Ctrl+C.
pub fn run(action: DevAction) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    runtime.block_on(serve(action))
}

async fn serve(action: DevAction) -> Result<()> {
    let mut config = BuildConfig::load(&action.cwd, action.config.as_deref(), action.mode).into_diagnostic()?;
    if let Some(port) = action.port {
        config.dev_server.port = port;
    }
    if let Some(host) = action.host {
        config.dev_server.host = host;
    }

    let root = config.root.clone();
    let output_dir = config.output.dir.clone();
    let server = config.dev_server.clone();

    let bundler = Bundler::new(config).into_diagnostic()?.watching(server.hot);
    let mut session = DevSession::new(bundler);

    println!("  Building...");
    report(&session.start());

    let (hmr_tx, _) = broadcast::channel::<HmrMessage>(16);

    let (change_tx, change_rx) = mpsc::channel::<PathBuf>();
    let cancel = session.cancel_slot();
    let watch_root = root.clone();
    let ignored = output_dir.clone();
    std::thread::Builder::new()
        .name("kiln-watch".to_string())
        .spawn(move || {
            if let Err(e) = watch_files(&watch_root, &ignored, &change_tx, &cancel) {
                eprintln!("  File watcher error: {e}");
            }
        })
        .into_diagnostic()?;

    let loop_tx = hmr_tx.clone();
    std::thread::Builder::new()
        .name("kiln-build".to_string())
        .spawn(move || build_loop(session, &change_rx, &loop_tx))
        .into_diagnostic()?;

    let files = ServeDir::new(&output_dir).fallback(ServeDir::new(&server.content_base));
    let mut app = Router::new()
        .route(HMR_PATH, get(hmr_websocket))
        .fallback_service(files)
        .with_state(DevState { hmr_tx });
    if server.compress {
        app = app.layer(CompressionLayer::new());
    }

    let host_ip = if server.host == "localhost" {
        "127.0.0.1"
    } else {
        server.host.as_str()
    };
    let addr: SocketAddr = format!("{}:{}", host_ip, server.port).parse().into_diagnostic()?;

    println!();
    println!("  Dev server running at http://{}:{}", server.host, server.port);
    if server.hot {
        println!("  Hot reload enabled");
    }
    println!();
    println!("  Press Ctrl+C to stop");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await.into_diagnostic()?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .into_diagnostic()?;

    Ok(())
}

// ============================================================================
// Build loop
// ============================================================================

fn build_loop(mut session: DevSession, changes: &mpsc::Receiver<PathBuf>, hmr_tx: &broadcast::Sender<HmrMessage>) {
    let mut queue = ChangeQueue::default();
    loop {
        let event = match queue.deadline() {
            Some(deadline) => changes.recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => changes.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match event {
            Ok(path) => {
                if path.file_name().is_some_and(|name| name == CONFIG_FILE) {
                    println!("  {CONFIG_FILE} changed; restart kiln dev to apply it");
                    continue;
                }
                queue.push(path, Instant::now());
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if let Some(batch) = queue.take_ready(Instant::now()) {
            let result = session.on_change(batch);
            report(&result);
            if let Some(message) = result.message() {
                // No subscribers is fine.
                let _ = hmr_tx.send(message);
            }
        }
    }
    tracing::debug!("build loop stopped");
}

fn report(result: &PassResult) {
    match result {
        PassResult::Ready { changed } if changed.is_empty() => println!("  Rebuilt, output unchanged"),
        PassResult::Ready { changed } => println!("  Rebuilt: {}", changed.join(", ")),
        PassResult::Failed {
            code,
            message,
            path,
            stage,
        } => {
            eprintln!("  error: {code}: {message}");
            match (path, stage) {
                (Some(path), Some(stage)) => eprintln!("    at {} [{stage}]", path.display()),
                (Some(path), None) => eprintln!("    at {}", path.display()),
                _ => {}
            }
            eprintln!("  Still serving the last good build");
        }
        PassResult::Cancelled => tracing::debug!("pass superseded by newer changes"),
        PassResult::Skipped => tracing::debug!("change outside the module graph"),
    }
}

// ============================================================================
// WebSocket
// ============================================================================

async fn hmr_websocket(ws: WebSocketUpgrade, State(state): State<DevState>) -> impl IntoResponse {
    let rx = state.hmr_tx.subscribe();
    ws.on_upgrade(move |socket| handle_hmr_socket(socket, rx))
}

async fn handle_hmr_socket(mut socket: WebSocket, mut rx: broadcast::Receiver<HmrMessage>) {
    if socket
        .send(Message::Text(HmrMessage::Connected.to_json()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            msg = rx.recv() => {
                let msg = match msg {
                    Ok(msg) => msg,
                    // Missed updates cannot be patched in.
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "hmr client lagged");
                        HmrMessage::Reload
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if socket.send(Message::Text(msg.to_json())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

// ============================================================================
// File Watching
// ============================================================================

/// Paths the watcher never reports: build output, dependencies, and hidden
/// files or directories below the project root (VCS data, editor swap
/// files, the emitter's staging and backup directories).
fn should_ignore(path: &Path, root: &Path, output_dir: &Path) -> bool {
    if path.starts_with(output_dir) {
        return true;
    }
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components().any(|c| {
        let name = c.as_os_str().to_string_lossy();
        name == "node_modules" || name == "target" || name.starts_with('.')
    })
}

fn watch_files(root: &Path, output_dir: &Path, changes: &mpsc::Sender<PathBuf>, cancel: &CancelSlot) -> Result<()> {
    let (tx, rx) = mpsc::channel();

    let mut watcher = RecommendedWatcher::new(tx, Config::default()).into_diagnostic()?;
    watcher.watch(root, RecursiveMode::Recursive).into_diagnostic()?;

    for event in rx {
        match event {
            Ok(event) => {
                if matches!(event.kind, EventKind::Access(_)) {
                    continue;
                }
                for path in event.paths {
                    if should_ignore(&path, root, output_dir) {
                        continue;
                    }
                    tracing::trace!(path = %path.display(), kind = ?event.kind, "file event");
                    // A running pass is stale now.
                    cancel.cancel_current();
                    if changes.send(path).is_err() {
                        return Ok(());
                    }
                }
            }
            Err(e) => eprintln!("  Watch error: {e}"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_ignore() {
        let (root, out) = (Path::new("/p"), Path::new("/p/dist"));
        assert!(should_ignore(Path::new("/p/dist/main.js"), root, out));
        assert!(should_ignore(Path::new("/p/node_modules/x/index.js"), root, out));
        assert!(should_ignore(Path::new("/p/.git/HEAD"), root, out));
        assert!(should_ignore(Path::new("/p/src/.index.js.swp"), root, out));
        assert!(!should_ignore(Path::new("/p/src/index.js"), root, out));
        assert!(!should_ignore(Path::new("/p/distant/a.js"), root, out));
    }

    #[test]
    fn test_should_ignore_emit_staging_dirs() {
        let (root, out) = (Path::new("/p"), Path::new("/p/dist"));
        let pid = std::process::id();
        let staging = format!("/p/.dist.kiln-staging-{pid}/main.1234abcd.js");
        let backup = format!("/p/.dist.kiln-backup-{pid}/index.html");
        assert!(should_ignore(Path::new(&staging), root, out));
        assert!(should_ignore(Path::new(&backup), root, out));
    }

    #[test]
    fn test_hidden_dirs_above_root_do_not_matter() {
        let (root, out) = (Path::new("/home/u/.work/app"), Path::new("/home/u/.work/app/dist"));
        assert!(!should_ignore(Path::new("/home/u/.work/app/src/index.js"), root, out));
        assert!(should_ignore(Path::new("/home/u/.work/app/.cache/x.js"), root, out));
    }
}
