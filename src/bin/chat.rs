//! Duplex chat variant: free-form two-way messaging over one socket.
//!
//! The two directions of a stream socket are independent, so no lock guards
//! them: a spawned task reads the socket and prints whatever arrives, while
//! the main loop forwards stdin lines to the peer. Either side ending (peer
//! close, read error, stdin EOF, or typing `exit`) stops the other.
use std::io::Write;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Stdin};
use tokio::net::TcpStream;

const MESSAGE_CEILING_BYTES: usize = 1024;

async fn prompt(stdin: &mut BufReader<Stdin>, text: &str) -> std::io::Result<String> {
    print!("{}", text);
    std::io::stdout().flush()?;

    let mut line = String::new();
    stdin.read_line(&mut line).await?;
    Ok(line.trim().to_string())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdin = BufReader::new(tokio::io::stdin());

    let peer_ip = prompt(&mut stdin, "Enter peer IP address: ").await?;
    let peer_port = prompt(&mut stdin, "Enter peer port number: ")
        .await?
        .parse::<u16>()
        .map_err(|_| "Invalid port number")?;

    let stream = TcpStream::connect((peer_ip.as_str(), peer_port))
        .await
        .map_err(|e| format!("Invalid IP or peer unreachable: {}", e))?;
    println!("Connected. Type messages; 'exit' quits.");

    let (mut reader, mut writer) = stream.into_split();

    // Inbound direction: print whatever the peer sends until it closes.
    let mut read_task = tokio::spawn(async move {
        let mut buffer = [0u8; MESSAGE_CEILING_BYTES];
        loop {
            match reader.read(&mut buffer).await {
                Ok(0) => {
                    println!("Peer closed the connection.");
                    return;
                }
                Ok(n) => {
                    println!("{}", String::from_utf8_lossy(&buffer[..n]).trim_end());
                }
                Err(e) => {
                    eprintln!("Read error: {}", e);
                    return;
                }
            }
        }
    });

    // Outbound direction: forward stdin lines until either side ends.
    let mut lines = stdin.lines();
    loop {
        tokio::select! {
            _ = &mut read_task => {
                // Inbound side finished; stop writing too.
                return Ok(());
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break; // stdin EOF
                };
                if line.trim().eq_ignore_ascii_case("exit") {
                    println!("Closing connection.");
                    break;
                }
                let bytes = line.as_bytes();
                let limit = bytes.len().min(MESSAGE_CEILING_BYTES);
                writer.write_all(&bytes[..limit]).await?;
            }
        }
    }

    // Local side ended first; tear down the reader so nothing leaks.
    read_task.abort();
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
