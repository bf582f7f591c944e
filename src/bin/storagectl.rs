use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "storagectl")]
#[command(about = "Command-line client for the storage proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the entities of a table
    Table { name: String },
    /// List pending message bodies of a queue
    Queue { name: String },
    /// Check proxy liveness
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let mut base = url::Url::parse(&cli.url)?;

    {
        let mut segments = base
            .path_segments_mut()
            .map_err(|_| format!("'{}' cannot be a base URL", cli.url))?;
        segments.pop_if_empty();
        match &cli.command {
            Commands::Table { name } => {
                segments.extend(["table", name.as_str()]);
            }
            Commands::Queue { name } => {
                segments.extend(["queue", name.as_str()]);
            }
            Commands::Health => {
                segments.push("health");
            }
        }
    }

    let res = client.get(base).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: proxy returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
