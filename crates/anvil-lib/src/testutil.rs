//! Canned-response loopback HTTP servers for exercising the fetcher and
//! downloader without the network. Test-only.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Scripted server: each accepted connection consumes the next canned
/// response; once the script is exhausted every request gets a 404.
pub struct TestServer {
    base: String,
    hits: Arc<AtomicUsize>,
    queue: Arc<Mutex<VecDeque<(u16, Vec<u8>)>>>,
}

impl TestServer {
    pub async fn start(script: Vec<(u16, Vec<u8>)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let queue = Arc::new(Mutex::new(VecDeque::from(script)));
        let queue_inner = queue.clone();

        let hits_inner = hits.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                hits_inner.fetch_add(1, Ordering::SeqCst);
                let (status, body) = queue_inner
                    .lock()
                    .pop_front()
                    .unwrap_or((404, b"gone".to_vec()));
                tokio::spawn(async move {
                    // Drain the request head before answering.
                    let mut buf = [0u8; 4096];
                    let mut head = Vec::new();
                    loop {
                        match socket.read(&mut buf).await {
                            Ok(0) => break,
                            Ok(n) => {
                                head.extend_from_slice(&buf[..n]);
                                if head.windows(4).any(|w| w == b"\r\n\r\n") {
                                    break;
                                }
                            }
                            Err(_) => return,
                        }
                    }
                    let header = format!(
                        "HTTP/1.1 {} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        status,
                        body.len()
                    );
                    let _ = socket.write_all(header.as_bytes()).await;
                    let _ = socket.write_all(&body).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { base, hits, queue }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    /// Append a response to the script. Useful when a canned body needs to
    /// reference the server's own address.
    pub fn push(&self, status: u16, body: Vec<u8>) {
        self.queue.lock().push_back((status, body));
    }

    /// Connections accepted so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// One-shot convenience: a server that answers the next request with the
/// given status and body, then 404s.
pub async fn serve_once(status: u16, body: Vec<u8>) -> String {
    // The accept loop owns the listener, so it outlives the handle.
    TestServer::start(vec![(status, body)])
        .await
        .url("resource")
}
