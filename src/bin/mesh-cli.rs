use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "mesh-cli")]
#[command(about = "Admin CLI for a mesh node", long_about = None)]
struct Cli {
    #[arg(short, long, env = "MESH_NODE_URL", default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, env = "MESH_ADMIN_KEY", default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lifecycle state and counts
    Health,
    /// List known peers (self first)
    Peers,
    /// Register a peer
    AddPeer { address: String },
    /// Remove a peer
    RemovePeer { address: String },
    /// Number of ids in the set
    Stats,
    /// Dump the full id set
    Pull,
    /// Clear the id set
    ClearStats,
    /// Push ids to the node as if from a peer
    Push { ids: Vec<u64> },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if !cli.key.is_empty() {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
        );
    }

    let url = cli.url.trim_end_matches('/');
    let request = match cli.command {
        Commands::Health => client.get(format!("{}/health", url)),
        Commands::Peers => client.get(format!("{}/peers", url)),
        Commands::AddPeer { address } => client
            .post(format!("{}/peers", url))
            .json(&json!({ "address": address })),
        Commands::RemovePeer { address } => client
            .delete(format!("{}/peers", url))
            .query(&[("id", address)]),
        Commands::Stats => client.get(format!("{}/stats", url)),
        Commands::Pull => client.get(format!("{}/sync/stats", url)),
        Commands::ClearStats => client.delete(format!("{}/stats", url)),
        Commands::Push { ids } => client
            .post(format!("{}/sync/stats", url))
            .json(&json!({ "timestamps": ids })),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await?;
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: node returned status {}", status);
        eprintln!("Response: {}", text);
        std::process::exit(1);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
