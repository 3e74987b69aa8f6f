use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;
use ws_bridge::client::{BridgeClient, ClientError, Framing, RequestBuilder};

#[derive(Parser)]
#[command(name = "bridge-cli")]
#[command(about = "Client and management CLI for the WebSocket bridge", long_about = None)]
struct Cli {
    /// Admin API base URL
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a bridge connection, send one request and print the frames
    Send {
        /// Bridge endpoint, e.g. ws://localhost:8080/websocket/web/bookstore
        endpoint: String,
        /// Request method
        method: String,
        /// Request path, beneath the endpoint's base path
        path: String,
        /// Header as `Name: value`; repeatable
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
        /// Request body
        #[arg(short, long)]
        body: Option<String>,
        /// Send as a text message instead of binary
        #[arg(long)]
        text: bool,
        /// Stop after this many frames
        #[arg(short, long, default_value_t = 1)]
        frames: usize,
        /// Seconds to wait for each frame
        #[arg(long, default_value_t = 5)]
        timeout: u64,
    },
    /// Check bridge status
    Status,
    /// List live bridge sessions
    Sessions,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Send {
            endpoint,
            method,
            path,
            headers,
            body,
            text,
            frames,
            timeout,
        } => {
            let mut request = RequestBuilder::new(method.to_ascii_uppercase(), path);
            for header in headers {
                let Some((name, value)) = header.split_once(':') else {
                    return Err(format!("invalid header {header:?}, expected `Name: value`").into());
                };
                request = request.header(name.trim(), value.trim());
            }
            if let Some(body) = body {
                request = request.body(body);
            }
            let framing = if text { Framing::Text } else { Framing::Binary };
            send(&endpoint, &request, framing, frames, Duration::from_secs(timeout)).await?;
        }
        Commands::Status => {
            let res = reqwest::get(format!("{}/admin/status", cli.url)).await?;
            print_response(res).await?;
        }
        Commands::Sessions => {
            let res = reqwest::get(format!("{}/admin/sessions", cli.url)).await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn send(
    endpoint: &str,
    request: &RequestBuilder,
    framing: Framing,
    frames: usize,
    timeout: Duration,
) -> Result<(), ClientError> {
    let mut client = BridgeClient::connect(endpoint).await?;
    client.send_framed(request, framing).await?;

    for _ in 0..frames {
        match client.next_response_within(timeout).await {
            Ok(response) if response.is_continuation() => println!("{}", response.text()),
            Ok(response) => {
                println!(
                    "{} {}",
                    response.status,
                    response.content_type.as_deref().unwrap_or("-")
                );
                for (name, value) in response.headers.iter() {
                    println!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
                }
                println!("{}", response.text());
            }
            Err(ClientError::Timeout(_)) => {
                eprintln!("No further frames within {timeout:?}");
                break;
            }
            Err(e) => return Err(e),
        }
    }

    client.close().await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
