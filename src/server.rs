/// Connection listener and per-session query loop.
use std::future::Future;
use std::io::ErrorKind;
use std::sync::Arc;

use log::{error, info};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_postgres::Client;

use crate::dispatch::dispatch;
use crate::index::DeviceIndex;

/// Receive-buffer ceiling. One read is one query code and one write is one
/// response; anything larger is truncated, never chunked or reassembled.
pub const MESSAGE_CEILING_BYTES: usize = 1024;

/// Accept loop: one spawned session task per connection. The store client
/// and the device index are immutable after startup and shared by Arc.
pub async fn run_listener(
    listener: TcpListener,
    client: Arc<Client>,
    index: Arc<DeviceIndex>,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        match listener.accept().await {
            Ok((socket, addr)) => {
                info!("Connected to client: {}", addr);
                let client = Arc::clone(&client);
                let index = Arc::clone(&index);
                tokio::spawn(async move {
                    let outcome = run_session(socket, move |code| {
                        let client = Arc::clone(&client);
                        let index = Arc::clone(&index);
                        async move { dispatch(&code, &client, &index).await }
                    })
                    .await;
                    match outcome {
                        Ok(()) => info!("Session with {} ended", addr),
                        Err(e) => error!("Session with {} failed: {}", addr, e),
                    }
                });
            }
            Err(e) => {
                error!("Accept error: {}", e);
            }
        }
    }
}

/// Per-connection state loop: read a code, dispatch, write the response,
/// repeat until the peer closes or resets.
///
/// Generic over the stream and the dispatch closure so the loop can be
/// exercised against in-memory pipes without a live store.
pub async fn run_session<S, F, Fut>(mut stream: S, dispatch: F) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: Fn(String) -> Fut,
    Fut: Future<Output = String>,
{
    let mut buffer = [0u8; MESSAGE_CEILING_BYTES];

    loop {
        let received = match stream.read(&mut buffer).await {
            Ok(0) => {
                info!("Client disconnected.");
                return Ok(());
            }
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::ConnectionReset => {
                info!("Client forcefully disconnected.");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        // One read is one query code; no reassembly across reads.
        let code = String::from_utf8_lossy(&buffer[..received])
            .trim()
            .to_string();
        info!("Received query from client: {}", code);

        let response = dispatch(code).await;
        let payload = response.as_bytes();
        let limit = payload.len().min(MESSAGE_CEILING_BYTES);
        stream.write_all(&payload[..limit]).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::io::duplex;

    #[tokio::test]
    async fn clean_close_ends_the_session() {
        let (server_end, client_end) = duplex(4096);
        let handle =
            tokio::spawn(run_session(server_end, |code| async move { code }));
        drop(client_end);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn codes_are_trimmed_and_answered_in_order() {
        let (server_end, mut client_end) = duplex(4096);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_inner = Arc::clone(&seen);

        let handle = tokio::spawn(run_session(server_end, move |code| {
            let seen = Arc::clone(&seen_inner);
            async move {
                seen.lock().unwrap().push(code.clone());
                format!("answer to {}", code)
            }
        }));

        client_end.write_all(b" 1 \n").await.unwrap();
        let mut buf = vec![0u8; 64];
        let n = client_end.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"answer to 1");

        client_end.write_all(b"9").await.unwrap();
        let n = client_end.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"answer to 9");

        drop(client_end);
        handle.await.unwrap().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["1".to_string(), "9".to_string()]);
    }

    #[tokio::test]
    async fn oversized_responses_are_truncated_to_the_ceiling() {
        let (server_end, mut client_end) = duplex(8192);

        let handle = tokio::spawn(run_session(server_end, |code| async move {
            if code == "big" {
                "x".repeat(MESSAGE_CEILING_BYTES + 500)
            } else {
                "ok".to_string()
            }
        }));

        client_end.write_all(b"big").await.unwrap();
        let mut truncated = vec![0u8; MESSAGE_CEILING_BYTES];
        client_end.read_exact(&mut truncated).await.unwrap();
        assert!(truncated.iter().all(|&b| b == b'x'));

        // The next response follows immediately; nothing beyond the ceiling
        // was written for the oversized one.
        client_end.write_all(b"2").await.unwrap();
        let mut tail = [0u8; 2];
        client_end.read_exact(&mut tail).await.unwrap();
        assert_eq!(&tail, b"ok");

        drop(client_end);
        handle.await.unwrap().unwrap();
    }
}
