// src/server/mod.rs

//! Development server.
//!
//! Serves the destination root as static files and pushes
//! [`ReloadSignal`]s to connected browsers over Server-Sent Events:
//!
//! - `GET /__sitepipe/events`: SSE stream (`reload` and `css` events).
//! - `GET /__sitepipe/livereload.js`: the client script injected by the
//!   `template` transform in development builds.
//! - everything else: files under the destination, `index.html` for
//!   directories.

mod reload;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use futures::stream::Stream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tracing::{debug, error, info, warn};

use crate::errors::Result;

pub use reload::ReloadSignal;

pub const EVENTS_PATH: &str = "/__sitepipe/events";
pub const LIVERELOAD_SCRIPT_PATH: &str = "/__sitepipe/livereload.js";

const LIVERELOAD_JS: &str = include_str!("livereload.js");

#[derive(Clone)]
struct AppState {
    signals: broadcast::Sender<ReloadSignal>,
    shutdown: watch::Receiver<bool>,
}

/// Static file server with live reload, not yet bound.
#[derive(Debug, Clone)]
pub struct DevServer {
    root: PathBuf,
    host: String,
    port: u16,
}

impl DevServer {
    pub fn new(root: impl Into<PathBuf>, host: impl Into<String>, port: u16) -> Self {
        Self {
            root: root.into(),
            host: host.into(),
            port,
        }
    }

    /// Bind and start serving in the background.
    pub async fn start(self) -> Result<ServerHandle> {
        let listener = tokio::net::TcpListener::bind((self.host.as_str(), self.port)).await?;
        let local_addr = listener.local_addr()?;

        let (signals, _) = broadcast::channel::<ReloadSignal>(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = AppState {
            signals: signals.clone(),
            shutdown: shutdown_rx.clone(),
        };

        let app = Router::new()
            .route(EVENTS_PATH, get(events_handler))
            .route(LIVERELOAD_SCRIPT_PATH, get(livereload_script))
            .fallback_service(ServeDir::new(&self.root).append_index_html_on_directories(true))
            .with_state(state);

        let mut graceful = shutdown_rx;
        let server = tokio::spawn(async move {
            let shutdown = async move {
                let _ = graceful.changed().await;
            };
            if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
                error!(error = %e, "dev server stopped with an error");
            }
        });

        let (signal_tx, mut signal_rx) = mpsc::channel::<ReloadSignal>(16);
        let relay_signals = signals.clone();
        let relay = tokio::spawn(async move {
            while let Some(signal) = signal_rx.recv().await {
                let clients = relay_signals.receiver_count();
                info!(event = signal.event_name(), clients, "notifying browsers");
                // No subscribers is fine: nobody has the page open.
                let _ = relay_signals.send(signal);
            }
        });

        info!(url = %format!("http://{local_addr}"), root = %self.root.display(), "dev server listening");
        Ok(ServerHandle {
            local_addr,
            signal_tx,
            signals,
            shutdown: shutdown_tx,
            server,
            relay,
        })
    }
}

/// Running dev server.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    signal_tx: mpsc::Sender<ReloadSignal>,
    signals: broadcast::Sender<ReloadSignal>,
    shutdown: watch::Sender<bool>,
    server: JoinHandle<()>,
    relay: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Sender the watch runtime uses to request reloads.
    pub fn signals(&self) -> mpsc::Sender<ReloadSignal> {
        self.signal_tx.clone()
    }

    /// Observe the signals sent to browsers.
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadSignal> {
        self.signals.subscribe()
    }

    pub async fn reload_all(&self) {
        self.notify(ReloadSignal::ReloadAll).await;
    }

    pub async fn inject_style(&self, paths: Vec<String>) {
        self.notify(ReloadSignal::InjectStyle(paths)).await;
    }

    async fn notify(&self, signal: ReloadSignal) {
        if self.signal_tx.send(signal).await.is_err() {
            warn!("reload relay is gone");
        }
    }

    /// Close event streams and stop accepting connections.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        self.relay.abort();
        match tokio::time::timeout(Duration::from_secs(5), self.server).await {
            Ok(_) => debug!("dev server stopped"),
            Err(_) => warn!("dev server did not stop within 5s"),
        }
    }
}

async fn events_handler(State(state): State<AppState>) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let mut rx = state.signals.subscribe();
    let mut shutdown = state.shutdown.clone();

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("connected").data("{}"));

        loop {
            let received = tokio::select! {
                _ = shutdown.changed() => None,
                r = rx.recv() => Some(r),
            };
            match received {
                Some(Ok(signal)) => yield Ok(signal.to_event()),
                Some(Err(broadcast::error::RecvError::Lagged(n))) => {
                    warn!(skipped = n, "live-reload client lagged; forcing full reload");
                    yield Ok(ReloadSignal::ReloadAll.to_event());
                }
                Some(Err(broadcast::error::RecvError::Closed)) | None => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping"))
}

async fn livereload_script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript; charset=utf-8")], LIVERELOAD_JS)
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use super::*;

    async fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8_lossy(&response).into_owned()
    }

    #[tokio::test]
    async fn serves_destination_and_client_script() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>hello</h1>").unwrap();
        let server = DevServer::new(dir.path(), "127.0.0.1", 0).start().await.unwrap();
        let addr = server.local_addr();

        let index = get(addr, "/").await;
        assert!(index.starts_with("HTTP/1.1 200"), "{index}");
        assert!(index.contains("<h1>hello</h1>"));

        let script = get(addr, LIVERELOAD_SCRIPT_PATH).await;
        assert!(script.starts_with("HTTP/1.1 200"));
        assert!(script.contains(EVENTS_PATH));

        assert!(get(addr, "/missing.css").await.starts_with("HTTP/1.1 404"));
        server.stop().await;
    }

    #[tokio::test]
    async fn signals_are_relayed_to_subscribers() {
        let dir = tempfile::tempdir().unwrap();
        let server = DevServer::new(dir.path(), "127.0.0.1", 0).start().await.unwrap();
        let mut rx = server.subscribe();

        server.inject_style(vec!["css/main.css".into()]).await;
        let got = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert_eq!(got, ReloadSignal::InjectStyle(vec!["css/main.css".into()]));

        server.reload_all().await;
        let got = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert_eq!(got, ReloadSignal::ReloadAll);
        server.stop().await;
    }
}
