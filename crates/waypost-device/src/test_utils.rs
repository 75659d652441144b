//! Test utilities for device transport
//!
//! Stub servers bound to ephemeral localhost ports, standing in for the
//! Device's WebSocket channel and HTTP endpoints.

use std::net::SocketAddr;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;

/// Server side of one accepted event-channel connection.
pub type StubWs = WebSocketStream<TcpStream>;

/// Starts a WebSocket stub that accepts connections forever.
///
/// # Returns
/// The bound address and a receiver yielding each accepted connection, so a
/// test can script frames on it or drop it to simulate a lost channel.
pub async fn spawn_ws_stub() -> (SocketAddr, mpsc::UnboundedReceiver<StubWs>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ws stub");
    let addr = listener.local_addr().expect("ws stub addr");
    let (conn_tx, conn_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                continue;
            };
            if conn_tx.send(ws).is_err() {
                return;
            }
        }
    });

    (addr, conn_rx)
}

/// One HTTP request captured by [`spawn_http_stub`].
#[derive(Debug, Clone)]
pub struct StubRequest {
    /// Request line plus headers, up to the blank line.
    pub head: String,
    /// Request body, sized by the Content-Length header.
    pub body: String,
}

/// Starts an HTTP stub that answers every request with the given status
/// line and an empty body.
///
/// # Arguments
/// * `status_line` - e.g. `"200 OK"` or `"503 Service Unavailable"`
///
/// # Returns
/// The bound address, a receiver yielding each captured request, and a hit
/// counter for asserting exactly how many requests arrived.
pub async fn spawn_http_stub(
    status_line: &'static str,
) -> (
    SocketAddr,
    mpsc::UnboundedReceiver<StubRequest>,
    Arc<AtomicUsize>,
) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind http stub");
    let addr = listener.local_addr().expect("http stub addr");
    let (req_tx, req_rx) = mpsc::unbounded_channel();
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_inner = Arc::clone(&hits);

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let Some(request) = read_http_request(&mut stream).await else {
                continue;
            };
            hits_inner.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let _ = req_tx.send(request);
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    (addr, req_rx, hits)
}

/// Starts a TCP stub that accepts connections and then never responds.
/// Useful for exercising request timeouts.
pub async fn spawn_silent_stub() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind silent stub");
    let addr = listener.local_addr().expect("silent stub addr");

    tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            held.push(stream);
        }
    });

    addr
}

/// Returns a localhost address that was just bound and released, so
/// connecting to it fails fast.
pub async fn unused_local_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind probe addr");
    listener.local_addr().expect("probe addr")
}

async fn read_http_request(stream: &mut TcpStream) -> Option<StubRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let (head, mut body) = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(split) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..split]).into_owned();
            let body = buf[split + 4..].to_vec();
            break (head, body);
        }
    };

    let expected = content_length(&head).unwrap_or(0);
    while body.len() < expected {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(StubRequest {
        head,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn content_length(head: &str) -> Option<usize> {
    head.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}
