//! Interactive query client: connects to the query server, shows the menu
//! of supported questions, sends the chosen code, and prints the response.
use std::io::Write;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Stdin};
use tokio::net::TcpStream;

const VALID_QUERIES: [&str; 3] = [
    "What is the average moisture inside my kitchen fridge in the past three hours?",
    "What is the average water consumption per cycle in my smart dishwasher?",
    "Which device consumed more electricity among my three IoT devices?",
];

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

    let server_ip = prompt(&mut stdin, "Enter server IP address: ").await?;
    let server_port = prompt(&mut stdin, "Enter server port number: ")
        .await?
        .parse::<u16>()
        .map_err(|_| "Invalid port number")?;

    let mut stream = TcpStream::connect((server_ip.as_str(), server_port))
        .await
        .map_err(|e| format!("Invalid IP or server unreachable: {}", e))?;

    loop {
        println!("\nAvailable queries:");
        for (i, query) in VALID_QUERIES.iter().enumerate() {
            println!("{}. {}", i + 1, query);
        }
        println!("Type 'exit' to disconnect.\n");

        let choice = prompt(&mut stdin, "Enter your query number: ").await?;

        if choice.eq_ignore_ascii_case("exit") {
            println!("Closing connection...");
            break;
        }

        if matches!(choice.as_str(), "1" | "2" | "3") {
            stream.write_all(choice.as_bytes()).await?;

            let mut buffer = [0u8; MESSAGE_CEILING_BYTES];
            let received = stream.read(&mut buffer).await?;
            if received == 0 {
                println!("Server closed the connection.");
                break;
            }
            println!(
                "Server response: {}",
                String::from_utf8_lossy(&buffer[..received])
            );
        } else {
            println!(
                "\nSorry, this query cannot be processed. Please try one of the following options:"
            );
            for query in VALID_QUERIES {
                println!("- {}", query);
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
