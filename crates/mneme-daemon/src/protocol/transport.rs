//! Unix-domain socket transport: newline-delimited JSON, one
//! connection per client, 1 MiB message cap, backlog 128. Each
//! connection gets its own read/dispatch/write loop; a listener
//! accepts many concurrent connections rather than a single
//! stdin/stdout pair.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;

use super::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};

/// Messages larger than this are rejected with a parse error rather
/// than read to completion (spec.md §6: "Max message size 1 MiB").
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// `listen(128)` backlog, per spec.md §6.
pub const BACKLOG: u32 = 128;

/// Derives the versioned socket path `/tmp/<service>-<semver>.sock`
/// (spec.md §6).
pub fn socket_path(service: &str, version: &str) -> PathBuf {
    PathBuf::from(format!("/tmp/{service}-{version}.sock"))
}

/// Binds the listener at `path`, removing a stale socket file left
/// behind by an unclean shutdown first. Mode 0600 per spec.md §6.
pub fn bind(path: &Path) -> std::io::Result<UnixListener> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let listener = UnixListener::bind(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(listener)
}

/// One accepted connection's request/response loop. `handle` is called
/// for every well-formed request and returns `None` for pure
/// notifications (no reply written), matching `initialized`'s
/// no-response contract in spec.md §6.
pub async fn serve_connection<F, Fut>(stream: UnixStream, handle: F)
where
    F: Fn(JsonRpcRequest) -> Fut + Clone,
    Fut: std::future::Future<Output = Option<JsonRpcResponse>>,
{
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let line = match read_capped_line(&mut reader, MAX_MESSAGE_BYTES).await {
            Ok(CappedLine::Line(l)) => l,
            Ok(CappedLine::Eof) => break,
            Ok(CappedLine::TooLarge) => {
                // The stream is no longer line-aligned once a message
                // exceeds the cap (we stopped reading mid-line), so the
                // connection is closed rather than resynced.
                let resp = JsonRpcResponse::error(None, JsonRpcError::parse_error());
                let _ = write_response(&mut write_half, &resp).await;
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "connection read error");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let request: JsonRpcRequest = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(_) => {
                let resp = JsonRpcResponse::error(None, JsonRpcError::parse_error());
                if write_response(&mut write_half, &resp).await.is_err() {
                    break;
                }
                continue;
            }
        };

        if let Some(response) = handle(request).await {
            if write_response(&mut write_half, &response).await.is_err() {
                break;
            }
        }
    }
}

enum CappedLine {
    Line(String),
    Eof,
    TooLarge,
}

/// Reads one newline-delimited line, bailing out as soon as the
/// accumulated byte count exceeds `cap` rather than after buffering
/// the whole (possibly unbounded) line — spec.md §6's 1 MiB cap must
/// bound memory use, not just the size of the message we accept.
async fn read_capped_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    cap: usize,
) -> std::io::Result<CappedLine> {
    let mut buf: Vec<u8> = Vec::new();
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(if buf.is_empty() {
                CappedLine::Eof
            } else {
                CappedLine::Line(String::from_utf8_lossy(&buf).into_owned())
            });
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                buf.extend_from_slice(&available[..pos]);
                reader.consume(pos + 1);
                if buf.len() > cap {
                    return Ok(CappedLine::TooLarge);
                }
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
                return Ok(CappedLine::Line(String::from_utf8_lossy(&buf).into_owned()));
            }
            None => {
                buf.extend_from_slice(available);
                let consumed = available.len();
                reader.consume(consumed);
                if buf.len() > cap {
                    return Ok(CappedLine::TooLarge);
                }
            }
        }
    }
}

async fn write_response(
    writer: &mut tokio::net::unix::OwnedWriteHalf,
    response: &JsonRpcResponse,
) -> std::io::Result<()> {
    let mut line = serde_json::to_string(response).unwrap_or_else(|_| {
        r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"internal error"}}"#
            .to_string()
    });
    line.push('\n');
    writer.write_all(line.as_bytes()).await
}

/// Sends one line-delimited JSON-RPC request over `path` and returns the
/// decoded response line, for the thin CLI client (spec.md §1's
/// `mneme-daemon` CLI subset).
pub async fn call(path: &Path, request: &JsonRpcRequest) -> std::io::Result<JsonRpcResponse> {
    let stream = UnixStream::connect(path).await?;
    let (read_half, mut write_half) = stream.into_split();
    let mut line = serde_json::to_string(request)?;
    line.push('\n');
    write_half.write_all(line.as_bytes()).await?;

    let mut lines = BufReader::new(read_half).lines();
    match lines.next_line().await? {
        Some(l) => serde_json::from_str(&l)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        None => Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "daemon closed connection without responding",
        )),
    }
}

/// Runs the accept loop until `shutdown` resolves, spawning one task
/// per connection.
pub async fn accept_loop<F, Fut>(
    listener: UnixListener,
    handle: F,
    mut shutdown: mpsc::Receiver<()>,
) where
    F: Fn(JsonRpcRequest) -> Fut + Clone + Send + Sync + 'static,
    Fut: std::future::Future<Output = Option<JsonRpcResponse>> + Send,
{
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let handle = handle.clone();
                        tokio::spawn(async move {
                            serve_connection(stream, handle).await;
                        });
                    }
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("accept loop shutting down");
                break;
            }
        }
    }
}
