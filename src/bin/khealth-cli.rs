use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "khealth-cli")]
#[command(about = "Query the khealth rcscheduler health endpoint", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 5)]
    request_timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current health snapshot
    Status,
    /// Poll until the pool reports healthy
    Wait {
        /// Give up after this many seconds
        #[arg(long, default_value_t = 120)]
        timeout: u64,

        /// Seconds between polls
        #[arg(long, default_value_t = 2)]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(cli.request_timeout))
        .build()?;
    let endpoint = format!("{}/health", cli.url.trim_end_matches('/'));

    match cli.command {
        Commands::Status => {
            let res = client.get(&endpoint).send().await?;
            print_response(res).await
        }
        Commands::Wait { timeout, interval } => {
            let deadline = Instant::now() + Duration::from_secs(timeout);
            loop {
                if let Some(json) = fetch_snapshot(&client, &endpoint).await {
                    if is_healthy(&json) {
                        println!("{}", serde_json::to_string_pretty(&json)?);
                        return Ok(ExitCode::SUCCESS);
                    }
                    eprintln!(
                        "Waiting: {} ({}/{} running)",
                        json["overall"], json["healthy_count"], json["desired_count"]
                    );
                }

                if Instant::now() >= deadline {
                    eprintln!("Error: not healthy after {}s", timeout);
                    return Ok(ExitCode::FAILURE);
                }
                tokio::time::sleep(Duration::from_secs(interval)).await;
            }
        }
    }
}

/// One poll; `None` when the endpoint is unreachable or the body is not JSON.
async fn fetch_snapshot(client: &reqwest::Client, endpoint: &str) -> Option<Value> {
    let res = match client.get(endpoint).send().await {
        Ok(res) => res,
        Err(e) => {
            eprintln!("Waiting: {}", e);
            return None;
        }
    };

    let status = res.status();
    match res.json::<Value>().await {
        Ok(json) => Some(json),
        Err(e) => {
            eprintln!("Waiting: status {} with unreadable body: {}", status, e);
            None
        }
    }
}

fn is_healthy(snapshot: &Value) -> bool {
    snapshot["overall"] == "healthy"
}

async fn print_response(res: reqwest::Response) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let status = res.status();
    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);

    if status.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("Error: health endpoint returned status {}", status);
        Ok(ExitCode::FAILURE)
    }
}
