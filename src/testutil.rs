//! In-process JSON-RPC stub used by the async tests.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// A canned HTTP reply.
#[derive(Debug, Clone)]
pub(crate) struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn ok(body: serde_json::Value) -> Self {
        Reply {
            status: 200,
            body: body.to_string(),
        }
    }

    pub fn result(result: serde_json::Value) -> Self {
        Self::ok(serde_json::json!({"jsonrpc": "2.0", "id": 1, "result": result}))
    }

    pub fn error(code: i64, message: &str) -> Self {
        Self::ok(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": code, "message": message}
        }))
    }
}

/// Serves each incoming request with the next reply, repeating the final
/// reply forever. Returns the stub's base URL.
pub(crate) async fn spawn_rpc_stub(replies: Vec<Reply>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");

    tokio::spawn(async move {
        let mut queue = replies.into_iter();
        let mut current = queue.next();
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            if read_request(&mut socket).await.is_none() {
                continue;
            }
            let reply = current.clone().unwrap_or(Reply {
                status: 200,
                body: "{}".to_string(),
            });
            if let Some(next) = queue.next() {
                current = Some(next);
            }
            let response = format!(
                "HTTP/1.1 {} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                reply.status,
                reply.body.len(),
                reply.body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.flush().await;
        }
    });

    format!("http://{addr}")
}

/// Reads one HTTP request (headers plus content-length body), returning the
/// body.
async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        if let Some(pos) = find_header_end(&buf) {
            break pos;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let content_length: usize = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0);

    let body_start = header_end + 4;
    while buf.len() < body_start + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Some(buf.get(body_start..body_start + content_length)?.to_vec())
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}
