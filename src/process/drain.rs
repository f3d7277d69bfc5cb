//! # StreamDrain: continuous consumption of a child's output stream.
//!
//! One drain runs per monitored stream, on its own spawned task. That is not
//! an optimization: a caller reading stdout and stderr sequentially would
//! deadlock against a child that fills the unread pipe's buffer.
//!
//! The drain reads whatever bytes are available, appends them verbatim to the
//! cumulative capture buffer, and emits each complete line to the diagnostic
//! sink. On end-of-file or cancellation it flushes any partial final line and
//! finishes; its join handle is the drain's completion signal.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Spawns a drain task for one stream.
pub(crate) fn spawn<R>(
    process: String,
    stream: &'static str,
    reader: R,
    capture: Arc<Mutex<Vec<u8>>>,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(drain_stream(process, stream, reader, capture, cancel))
}

async fn drain_stream<R>(
    process: String,
    stream: &'static str,
    mut reader: R,
    capture: Arc<Mutex<Vec<u8>>>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    debug!(process = %process, stream, "stream drain started");

    let mut chunk = [0u8; 4096];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(process = %process, stream, "stream drain cancelled");
                break;
            }
            read = reader.read(&mut chunk) => read,
        };

        match read {
            Ok(0) => break, // end of file: child closed its end
            Ok(n) => {
                capture.lock().unwrap().extend_from_slice(&chunk[..n]);
                pending.extend_from_slice(&chunk[..n]);
                while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = pending.drain(..=pos).collect();
                    emit_line(&process, stream, &line);
                }
            }
            Err(error) => {
                warn!(process = %process, stream, %error, "stream read failed");
                break;
            }
        }
    }

    if !pending.is_empty() {
        emit_line(&process, stream, &pending);
    }
    debug!(process = %process, stream, "stream drain finished");
}

/// Emits one buffered line to the diagnostic sink.
fn emit_line(process: &str, stream: &'static str, raw: &[u8]) {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    debug!(process = %process, stream, line = %line, "child output");
}
