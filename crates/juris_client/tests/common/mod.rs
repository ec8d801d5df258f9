//! Minimal in-process HTTP/1.1 server for integration tests. No mocks: the
//! client under test talks to a real socket.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A request as seen by the test server.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub body: String,
}

/// What to send back. Body chunks are written with a short pause between them.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub chunks: Vec<String>,
    /// Advertise this length instead of closing to delimit the body. A value
    /// larger than the chunks makes the body end early.
    pub content_length: Option<usize>,
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            chunks: Vec::new(),
            content_length: Some(0),
        }
    }

    pub fn ndjson(lines: &[&str]) -> Self {
        Self {
            status: 200,
            chunks: lines.iter().map(|l| format!("{l}\n")).collect(),
            content_length: None,
        }
    }

    /// Body that stops short of its advertised length.
    pub fn truncated(lines: &[&str]) -> Self {
        let mut reply = Self::ndjson(lines);
        let sent: usize = reply.chunks.iter().map(String::len).sum();
        reply.content_length = Some(sent + 1024);
        reply
    }
}

pub type Handler = Arc<dyn Fn(&Request) -> Reply + Send + Sync>;

/// Running server: its base API URL and every request it has received.
pub struct TestServer {
    pub api_url: String,
    pub requests: Arc<Mutex<Vec<Request>>>,
}

impl TestServer {
    pub fn count(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .count()
    }

    pub fn bodies(&self, path: &str) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .map(|r| r.body.clone())
            .collect()
    }
}

/// Serve on an ephemeral port from the current tokio runtime.
pub async fn spawn(handler: Handler) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let log = requests.clone();
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let handler = handler.clone();
            let log = log.clone();
            tokio::spawn(async move {
                handle(socket, handler, log).await;
            });
        }
    });
    TestServer {
        api_url: format!("http://127.0.0.1:{port}/api"),
        requests,
    }
}

/// Serve from a dedicated thread with its own runtime, for tests that block
/// (e.g. running the CLI binary). Returns the base API URL.
pub fn spawn_in_thread(handler: Handler) -> (String, Arc<Mutex<Vec<Request>>>) {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let server = spawn(handler).await;
            tx.send((server.api_url.clone(), server.requests.clone()))
                .unwrap();
            // Keep serving until the test process exits.
            std::future::pending::<()>().await;
        });
    });
    rx.recv().unwrap()
}

/// Pick a port with nothing listening on it.
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn handle(mut socket: TcpStream, handler: Handler, log: Arc<Mutex<Vec<Request>>>) {
    let Some(request) = read_request(&mut socket).await else {
        return;
    };
    log.lock().unwrap().push(request.clone());
    let reply = handler(&request);

    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/x-ndjson\r\nConnection: close\r\n",
        reply.status,
        reason(reply.status)
    );
    if let Some(len) = reply.content_length {
        head.push_str(&format!("Content-Length: {len}\r\n"));
    }
    head.push_str("\r\n");
    if socket.write_all(head.as_bytes()).await.is_err() {
        return;
    }
    for chunk in &reply.chunks {
        if socket.write_all(chunk.as_bytes()).await.is_err() {
            return;
        }
        let _ = socket.flush().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let _ = socket.shutdown().await;
}

async fn read_request(socket: &mut TcpStream) -> Option<Request> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut tmp).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&tmp[..n]);
    };
    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let content_length = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[head_end..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut tmp).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&tmp[..n]);
    }
    Some(Request {
        method,
        path: path.trim_start_matches("/api").to_string(),
        body: String::from_utf8_lossy(&body).to_string(),
    })
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
