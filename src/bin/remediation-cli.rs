use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "remediation-cli")]
#[command(about = "Management CLI for the remediation gate", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "GATE_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gate status
    Status,
    /// List approval requests
    List {
        /// PENDING, APPROVED, REJECTED or EXPIRED
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        requester: Option<String>,
    },
    /// Show one approval request
    Show { id: String },
    /// Approve a pending request
    Approve {
        id: String,
        #[arg(short, long)]
        comment: Option<String>,
    },
    /// Reject a pending request
    Reject {
        id: String,
        #[arg(short, long)]
        comment: Option<String>,
    },
    /// Expire a pending request now
    Expire { id: String },
    /// Delete a request
    Delete { id: String },
    /// Report a test failure
    Fail { subject: String, description: String },
    /// Report a test success
    Pass { subject: String },
    /// Aggregate statistics
    Stats,
    /// Recent failure outcomes
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", cli.key))?);

    let base = cli.url.trim_end_matches('/');
    let request = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", base)),
        Commands::List { status, subject, requester } => {
            let mut query = Vec::new();
            if let Some(s) = status {
                query.push(("status", s));
            }
            if let Some(s) = subject {
                query.push(("subject_name", s));
            }
            if let Some(r) = requester {
                query.push(("requester_id", r));
            }
            client.get(format!("{}/admin/requests", base)).query(&query)
        }
        Commands::Show { id } => client.get(format!("{}/admin/requests/{}", base, id)),
        Commands::Approve { id, comment } => client
            .post(format!("{}/admin/requests/{}/respond", base, id))
            .json(&json!({ "approved": true, "comment": comment })),
        Commands::Reject { id, comment } => client
            .post(format!("{}/admin/requests/{}/respond", base, id))
            .json(&json!({ "approved": false, "comment": comment })),
        Commands::Expire { id } => client.post(format!("{}/admin/requests/{}/expire", base, id)),
        Commands::Delete { id } => client.delete(format!("{}/admin/requests/{}", base, id)),
        Commands::Fail { subject, description } => client
            .post(format!("{}/admin/events/failure", base))
            .json(&json!({ "subject": subject, "description": description })),
        Commands::Pass { subject } => client
            .post(format!("{}/admin/events/success", base))
            .json(&json!({ "subject": subject })),
        Commands::Stats => client.get(format!("{}/admin/stats", base)),
        Commands::History { limit } => client.get(format!("{}/admin/history", base)).query(&[("limit", limit)]),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
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

    let body = res.text().await?;
    if body.is_empty() {
        println!("{}", status);
        return Ok(());
    }
    let json: Value = serde_json::from_str(&body)?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
