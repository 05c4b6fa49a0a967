//! Preview server implementation.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::debounce::Debouncer;
use crate::resolve::{Mount, Resolved, Resolver, INDEX_FILE};
use crate::watcher::{FileWatcher, IgnoreSet};
use crate::websocket::{
    inject_reload_script, reload_client_script, ReloadHub, ReloadMessage, RELOAD_SCRIPT_PATH,
    RELOAD_SOCKET_PATH,
};

/// Configuration for the preview server.
#[derive(Debug, Clone)]
pub struct PreviewConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Primary directory to serve
    pub document_root: PathBuf,

    /// Extra directories served under route prefixes, tried in order
    pub mounts: Vec<Mount>,

    /// File served for unmatched paths, relative to the document root
    pub fallback_file: String,

    /// Quiet period after the last change before browsers reload
    pub debounce_ms: u64,

    /// Open browser on start
    pub open: bool,

    /// Watch for changes and reload connected browsers
    pub live_reload: bool,

    /// Glob patterns for paths that never trigger a reload
    pub ignore: Vec<String>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            document_root: PathBuf::from("docs"),
            mounts: Vec::new(),
            fallback_file: INDEX_FILE.to_string(),
            debounce_ms: 1000,
            open: true,
            live_reload: true,
            ignore: Vec::new(),
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Directory not found: {0}. Run 'stitch build' first.")]
    MissingRoot(PathBuf),

    #[error("Failed to bind to {0}: {1}")]
    BindError(String, std::io::Error),

    #[error("File watch error: {0}")]
    WatchError(String),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared server state.
struct PreviewState {
    resolver: Resolver,
    fallback: PathBuf,
    hub: ReloadHub,
    live_reload: bool,
}

/// Preview server.
pub struct PreviewServer {
    config: PreviewConfig,
    hub: ReloadHub,
}

impl PreviewServer {
    /// Create a new preview server.
    pub fn new(config: PreviewConfig) -> Self {
        Self {
            config,
            hub: ReloadHub::new(),
        }
    }

    /// Build the HTTP router without binding.
    pub fn router(&self) -> Router {
        let state = Arc::new(PreviewState {
            resolver: Resolver::new(&self.config.document_root, self.config.mounts.clone()),
            fallback: self.config.document_root.join(&self.config.fallback_file),
            hub: self.hub.clone(),
            live_reload: self.config.live_reload,
        });

        let mut app = Router::new();
        if self.config.live_reload {
            app = app
                .route(RELOAD_SOCKET_PATH, get(ws_handler))
                .route(RELOAD_SCRIPT_PATH, get(reload_script_handler));
        }

        app.fallback(file_handler).with_state(state)
    }

    /// Start serving until Ctrl-C.
    pub async fn start(self) -> Result<(), ServerError> {
        self.start_with_shutdown(shutdown_signal()).await
    }

    /// Start serving until `shutdown` resolves.
    pub async fn start_with_shutdown<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.config.document_root.is_dir() {
            return Err(ServerError::MissingRoot(self.config.document_root.clone()));
        }

        // Keep the watcher alive for as long as we serve.
        let _watcher = if self.config.live_reload {
            Some(self.spawn_reload_pipeline()?)
        } else {
            None
        };

        let app = self.router();

        let listener = tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|e| {
                ServerError::BindError(format!("{}:{}", self.config.host, self.config.port), e)
            })?;

        let url = format!("http://{}", listener.local_addr()?);
        tracing::info!(
            "Serving {} at {}",
            self.config.document_root.display(),
            url
        );

        if self.config.open {
            if let Err(e) = open::that(&url) {
                tracing::warn!("Failed to open browser: {}", e);
            }
        }

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Preview server stopped");
        Ok(())
    }

    /// Watch the served roots and broadcast one reload per settled burst.
    fn spawn_reload_pipeline(&self) -> Result<FileWatcher, ServerError> {
        let mut watch_paths = vec![self.config.document_root.clone()];
        watch_paths.extend(self.config.mounts.iter().map(|m| m.target_dir.clone()));

        let ignore = IgnoreSet::new(&self.config.ignore)
            .map_err(|e| ServerError::WatchError(e.to_string()))?;

        let (watcher, rx) = FileWatcher::new(&watch_paths, ignore)
            .map_err(|e| ServerError::WatchError(e.to_string()))?;

        let hub = self.hub.clone();
        let debouncer = Debouncer::from_millis(self.config.debounce_ms);
        tokio::spawn(debouncer.run(rx, move |changes| {
            tracing::info!(
                "{} file change(s) settled, reloading {} client(s)",
                changes,
                hub.subscriber_count()
            );
            hub.send(ReloadMessage::Reload);
        }));

        Ok(watcher)
    }
}

/// Serve a file from the first matching root, or the fallback document.
async fn file_handler(State(state): State<Arc<PreviewState>>, request: Request) -> Response {
    let request_path = request.uri().path().to_string();
    let path = match state.resolver.resolve(&request_path).await {
        Some(Resolved::DirectoryIndex(_)) if !request_path.ends_with('/') => {
            // Relative links in the index only work from the slash form.
            let location = match request.uri().query() {
                Some(query) => format!("{}/?{}", request_path, query),
                None => format!("{}/", request_path),
            };
            return Redirect::permanent(&location).into_response();
        }
        Some(resolved) => resolved.path().to_path_buf(),
        None => return serve_fallback(&state).await,
    };

    if state.live_reload && is_html(&path) {
        return serve_html(&path).await;
    }

    match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

/// Answer an unmatched path with the fallback document and a 200.
async fn serve_fallback(state: &PreviewState) -> Response {
    match tokio::fs::read_to_string(&state.fallback).await {
        Ok(content) if state.live_reload => Html(inject_reload_script(&content)).into_response(),
        Ok(content) => Html(content).into_response(),
        Err(e) => {
            tracing::debug!("Fallback {} unavailable: {}", state.fallback.display(), e);
            (StatusCode::NOT_FOUND, "Not Found").into_response()
        }
    }
}

async fn serve_html(path: &Path) -> Response {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Html(inject_reload_script(&content)).into_response(),
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", path.display(), e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file").into_response()
        }
    }
}

fn is_html(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("html") | Some("htm")
    )
}

/// Handler for the live-reload WebSocket endpoint.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<PreviewState>>,
) -> impl IntoResponse {
    let rx = state.hub.subscribe();
    ws.on_upgrade(move |socket| handle_ws(socket, rx))
}

/// Forward reload messages to one browser.
async fn handle_ws(
    mut socket: WebSocket,
    mut rx: broadcast::Receiver<ReloadMessage>,
) {
    if send_message(&mut socket, &ReloadMessage::Connected)
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Ok(msg) => {
                    if send_message(&mut socket, &msg).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Reload client lagged by {} message(s)", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ReloadMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    socket.send(Message::Text(json.into())).await
}

/// Handler for the live-reload client script.
async fn reload_script_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        reload_client_script(),
    )
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_test::TestServer;
    use futures_util::StreamExt;
    use std::fs;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    fn site() -> TempDir {
        let temp = tempdir().unwrap();
        let root = temp.path().join("site");
        fs::create_dir_all(root.join("guide")).unwrap();
        fs::write(
            root.join("index.html"),
            "<html><body><div id=\"app\"></div></body></html>",
        )
        .unwrap();
        fs::write(root.join("guide/index.html"), "<body>guide</body>").unwrap();
        fs::write(root.join("style.css"), "body { color: red; }").unwrap();
        temp
    }

    fn server(config: PreviewConfig) -> TestServer {
        TestServer::new(PreviewServer::new(config).router()).unwrap()
    }

    fn config(temp: &TempDir) -> PreviewConfig {
        PreviewConfig {
            document_root: temp.path().join("site"),
            open: false,
            ..Default::default()
        }
    }

    #[test]
    fn creates_server_with_default_config() {
        let server = PreviewServer::new(PreviewConfig::default());
        assert_eq!(server.config.port, 3000);
        assert_eq!(server.config.debounce_ms, 1000);
        assert_eq!(server.config.fallback_file, "index.html");
    }

    #[tokio::test]
    async fn serves_static_files() {
        let temp = site();
        let server = server(config(&temp));

        let response = server.get("/style.css").await;

        response.assert_status_ok();
        assert_eq!(response.text(), "body { color: red; }");
    }

    #[tokio::test]
    async fn unknown_paths_get_fallback_with_success() {
        let temp = site();
        let server = server(config(&temp));

        let response = server.get("/does/not/exist").await;

        response.assert_status_ok();
        assert!(response.text().contains("<div id=\"app\"></div>"));
    }

    #[tokio::test]
    async fn missing_fallback_is_not_found() {
        let temp = site();
        let server = server(PreviewConfig {
            fallback_file: "app.html".to_string(),
            ..config(&temp)
        });

        let response = server.get("/does/not/exist").await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn html_gets_reload_script() {
        let temp = site();
        let server = server(config(&temp));

        let response = server.get("/guide/").await;

        response.assert_status_ok();
        assert_eq!(
            response.text(),
            "<body>guide<script src=\"/__livereload.js\"></script></body>"
        );
    }

    #[tokio::test]
    async fn directories_without_slash_redirect() {
        let temp = site();
        let server = server(config(&temp));

        let response = server.get("/guide").await;

        response.assert_status(StatusCode::PERMANENT_REDIRECT);
        assert_eq!(response.header(header::LOCATION).to_str().unwrap(), "/guide/");
    }

    #[tokio::test]
    async fn redirect_keeps_query_string() {
        let temp = site();
        let server = server(config(&temp));

        let response = server.get("/guide").add_query_param("v", "2").await;

        response.assert_status(StatusCode::PERMANENT_REDIRECT);
        assert_eq!(
            response.header(header::LOCATION).to_str().unwrap(),
            "/guide/?v=2"
        );
    }

    #[tokio::test]
    async fn relative_links_from_directory_index_stay_inside_it() {
        let temp = site();
        let reference = temp.path().join("site/doxygen");
        fs::create_dir_all(&reference).unwrap();
        fs::write(
            reference.join("index.html"),
            "<body><a href=\"annotated.html\">classes</a></body>",
        )
        .unwrap();
        fs::write(reference.join("annotated.html"), "<body>class list</body>").unwrap();
        let server = server(config(&temp));

        let redirect = server.get("/doxygen").await;
        assert_eq!(redirect.header(header::LOCATION).to_str().unwrap(), "/doxygen/");

        let linked = server.get("/doxygen/annotated.html").await;
        linked.assert_status_ok();
        assert!(linked.text().contains("class list"));
    }

    #[tokio::test]
    async fn plain_serving_leaves_html_untouched() {
        let temp = site();
        let server = server(PreviewConfig {
            live_reload: false,
            ..config(&temp)
        });

        let response = server.get("/guide/index.html").await;

        assert_eq!(response.text(), "<body>guide</body>");

        // Without live reload the script route falls through to the SPA fallback.
        let script = server.get(RELOAD_SCRIPT_PATH).await;
        assert!(script.text().contains("<div id=\"app\">"));
    }

    #[tokio::test]
    async fn serves_mounted_directories_after_document_root() {
        let temp = site();
        let vendor = temp.path().join("vendor");
        fs::create_dir_all(&vendor).unwrap();
        fs::write(vendor.join("style.css"), "vendor").unwrap();
        fs::write(vendor.join("lib.js"), "vendor lib").unwrap();

        let server = server(PreviewConfig {
            mounts: vec![Mount::new("/", &vendor)],
            ..config(&temp)
        });

        assert_eq!(server.get("/style.css").await.text(), "body { color: red; }");
        assert_eq!(server.get("/lib.js").await.text(), "vendor lib");
    }

    #[tokio::test]
    async fn serves_reload_client_script() {
        let temp = site();
        let server = server(config(&temp));

        let response = server.get(RELOAD_SCRIPT_PATH).await;

        response.assert_status_ok();
        assert!(response.text().contains("location.reload()"));
    }

    #[tokio::test]
    async fn refuses_missing_document_root() {
        let temp = tempdir().unwrap();
        let server = PreviewServer::new(PreviewConfig {
            document_root: temp.path().join("nope"),
            open: false,
            live_reload: false,
            port: 0,
            ..Default::default()
        });

        let err = server.start_with_shutdown(async {}).await.unwrap_err();

        assert!(matches!(err, ServerError::MissingRoot(_)));
    }

    #[tokio::test]
    async fn reports_bind_failure() {
        let temp = site();
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let server = PreviewServer::new(PreviewConfig {
            port,
            live_reload: false,
            ..config(&temp)
        });

        let err = server.start_with_shutdown(async {}).await.unwrap_err();

        assert!(matches!(err, ServerError::BindError(..)));
    }

    #[tokio::test]
    async fn binds_host_names() {
        let temp = site();
        let server = PreviewServer::new(PreviewConfig {
            host: "localhost".to_string(),
            port: 0,
            live_reload: false,
            ..config(&temp)
        });

        server.start_with_shutdown(async {}).await.unwrap();
    }

    #[tokio::test]
    async fn closed_browsers_unsubscribe() {
        let temp = site();
        let server = PreviewServer::new(config(&temp));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = server.router();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let (mut client, _) =
            tokio_tungstenite::connect_async(format!("ws://{}{}", addr, RELOAD_SOCKET_PATH))
                .await
                .unwrap();
        let greeting = client.next().await.unwrap().unwrap();
        assert!(greeting.to_text().unwrap().contains("connected"));
        assert_eq!(server.hub.subscriber_count(), 1);

        client.close(None).await.unwrap();

        let unsubscribed = tokio::time::timeout(Duration::from_secs(3), async {
            while server.hub.subscriber_count() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(unsubscribed.is_ok(), "socket task kept its subscription");
    }

    #[tokio::test]
    async fn file_changes_trigger_one_reload() {
        let temp = site();
        let root = temp.path().join("site");
        let server = PreviewServer::new(PreviewConfig {
            debounce_ms: 200,
            ..config(&temp)
        });
        let mut reloads = server.hub.subscribe();
        let _watcher = server.spawn_reload_pipeline().unwrap();

        // Give inotify time to set up
        tokio::time::sleep(Duration::from_millis(100)).await;

        for name in ["a.html", "b.html", "c.css"] {
            fs::write(root.join(name), name).unwrap();
        }

        let first = tokio::time::timeout(Duration::from_secs(3), reloads.recv()).await;
        assert_eq!(first.unwrap().unwrap(), ReloadMessage::Reload);

        let second = tokio::time::timeout(Duration::from_millis(600), reloads.recv()).await;
        assert!(second.is_err(), "burst produced more than one reload");
    }
}
