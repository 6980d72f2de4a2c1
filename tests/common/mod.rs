//! Shared fixtures for the integration tests
//!
//! - A throwaway launcher layout inside a [`TempDir`]
//! - A tiny HTTP server standing in for the statistics API

#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use ga_launcher::{LauncherConfig, Settings, StateManager};
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Duration, Instant, sleep};

pub fn create_test_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, root)
}

/// Launcher config that runs `<root>/bot.sh` with `sh`
pub fn launcher_config(root: &Utf8Path, api_base_url: &str) -> LauncherConfig {
    LauncherConfig {
        settings_path: root.join("settings.json"),
        log_dir: root.join("logs"),
        interpreter: "sh".to_string(),
        script: root.join("bot.sh"),
        api_base_url: api_base_url.to_string(),
        api_timeout_secs: 5,
        ..LauncherConfig::default()
    }
}

pub fn write_script(root: &Utf8Path, body: &str) {
    fs::write(root.join("bot.sh"), body).unwrap();
}

pub fn write_settings(root: &Utf8Path, settings: &Settings) {
    fs::write(
        root.join("settings.json"),
        serde_json::to_string_pretty(settings).unwrap(),
    )
    .unwrap();
}

/// Settings that pass the readiness check with API credentials filled in
pub fn ready_settings() -> Settings {
    let mut settings = Settings::default();
    settings.api.username = "player".to_string();
    settings.api.password = "secret".to_string();
    settings.game.farming_mode = "Quest".to_string();
    settings.game.item = "Gold Brick".to_string();
    settings.game.mission = "Scattered Cargo".to_string();
    settings.game.summons = vec!["Colossus Omega".to_string()];
    settings
}

/// Poll the message log until an entry contains `needle`.
pub async fn wait_for_message(state: &StateManager, needle: &str) {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if state.messages_since(0).iter().any(|m| m.contains(needle)) {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "no message containing {:?} in {:?}",
            needle,
            state.messages_since(0)
        );
        sleep(Duration::from_millis(20)).await;
    }
}

/// Poll `condition` until it holds.
pub async fn wait_until<F: FnMut() -> bool>(mut condition: F) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        sleep(Duration::from_millis(20)).await;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub cookie: Option<String>,
    pub body: String,
}

/// Minimal statistics API: answers every request with an empty body and a
/// session cookie, failing `create-item` when asked to.
pub struct MockApi {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockApi {
    pub async fn start(fail_create_item: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, Arc::clone(&recorded), fail_create_item));
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }
}

async fn serve(stream: TcpStream, recorded: Arc<Mutex<Vec<RecordedRequest>>>, fail_create_item: bool) {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).await.unwrap_or(0) == 0 {
        return;
    }

    let mut content_length = 0;
    let mut cookie = None;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header).await.unwrap_or(0) == 0 {
            return;
        }
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            } else if name.eq_ignore_ascii_case("cookie") {
                cookie = Some(value.trim().to_string());
            }
        }
    }

    let mut body = vec![0; content_length];
    if reader.read_exact(&mut body).await.is_err() {
        return;
    }

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let status = if fail_create_item && path.contains("/create-item/") {
        "500 Internal Server Error"
    } else {
        "200 OK"
    };

    recorded.lock().unwrap().push(RecordedRequest {
        method,
        path,
        cookie,
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: 0\r\nSet-Cookie: session=test; Path=/\r\nConnection: close\r\n\r\n",
        status
    );
    let stream = reader.get_mut();
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}
