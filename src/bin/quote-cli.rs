use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{json, Value};
use uuid::Uuid;

use booking_core::config::{load_config, ServiceConfig};
use booking_core::http::X_AGENT_ID;
use booking_core::lifecycle::{signals, Shutdown};
use booking_core::observability::init_logging;
use booking_core::quoting::types::{generate_reference, QuotePatch};
use booking_core::resilience::{fetch_with_cancellation, HttpError, RetryError};

#[derive(Parser)]
#[command(name = "quote-cli")]
#[command(about = "Command-line client for the booking-core quote API", long_about = None)]
struct Cli {
    /// Configuration file providing the base URL and retry policy.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the quote API (overrides the config).
    #[arg(short, long)]
    url: Option<String>,

    /// Acting agent, sent as the `x-agent-id` header.
    #[arg(short, long)]
    agent: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a quote
    Get { id: Uuid },
    /// Create a DRAFT quote for the acting agent
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        client_email: String,
        #[arg(long, default_value_t = 0)]
        total_cents: i64,
        #[arg(long, default_value = "USD")]
        currency: String,
        #[arg(long)]
        notes: Option<String>,
        /// Quote reference; generated when omitted. A retried create with the
        /// same reference is rejected as a duplicate instead of creating twice.
        #[arg(long)]
        reference: Option<String>,
    },
    /// Update a quote at a known version
    Update {
        id: Uuid,
        #[arg(long)]
        expected_version: u64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        client_email: Option<String>,
        #[arg(long)]
        total_cents: Option<i64>,
        #[arg(long)]
        currency: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Send a DRAFT quote to the client
    Send {
        id: Uuid,
        #[arg(long)]
        expected_version: u64,
    },
    /// Delete a quote at a known version
    Delete {
        id: Uuid,
        #[arg(long)]
        expected_version: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    init_logging(&config.observability);

    let base = cli.url.clone().unwrap_or_else(|| config.http_client.base_url.clone());
    let base = base.trim_end_matches('/');
    let client = Client::builder()
        .timeout(Duration::from_secs(config.http_client.timeout_secs))
        .build()?;
    let policy = config.retry.to_policy();

    let request = match cli.command {
        Commands::Get { id } => client.request(Method::GET, format!("{}/api/v1/quotes/{}", base, id)),
        Commands::Create {
            title,
            client_email,
            total_cents,
            currency,
            notes,
            reference,
        } => {
            let agent_id = cli.agent.clone().ok_or("--agent is required to create a quote")?;
            let reference = reference.unwrap_or_else(|| generate_reference(&Uuid::new_v4()));
            client.post(format!("{}/api/v1/quotes", base)).json(&json!({
                "agent_id": agent_id,
                "title": title,
                "client_email": client_email,
                "total_cents": total_cents,
                "currency": currency,
                "notes": notes,
                "reference": reference,
            }))
        }
        Commands::Update {
            id,
            expected_version,
            title,
            client_email,
            total_cents,
            currency,
            notes,
        } => {
            let patch = QuotePatch {
                title,
                client_email,
                total_cents,
                currency,
                notes,
            };
            client
                .patch(format!("{}/api/v1/quotes/{}", base, id))
                .json(&json!({ "expected_version": expected_version, "patch": patch }))
        }
        Commands::Send { id, expected_version } => client
            .post(format!("{}/api/v1/quotes/{}/send", base, id))
            .json(&json!({ "expected_version": expected_version })),
        Commands::Delete { id, expected_version } => client
            .delete(format!("{}/api/v1/quotes/{}", base, id))
            .query(&[("expected_version", expected_version)]),
    };

    let request = with_agent(request, cli.agent.as_deref()).build()?;

    // Ctrl-C abandons the pending attempt or backoff.
    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    match fetch_with_cancellation(&client, request, &policy, shutdown.token()).await {
        Ok(response) => print_response(response).await?,
        Err(err) => {
            report_failure(&err);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn with_agent(request: RequestBuilder, agent: Option<&str>) -> RequestBuilder {
    match agent {
        Some(agent) => request.header(X_AGENT_ID, agent),
        None => request,
    }
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let text = res.text().await?;
    if text.is_empty() {
        println!("OK");
        return Ok(());
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}

fn report_failure(err: &RetryError<HttpError>) {
    match err.last_error() {
        Some(HttpError::Status { status }) => {
            eprintln!("Error: quote API returned status {} after {} attempt(s)", status, err.attempts())
        }
        Some(other) => eprintln!("Error: {} after {} attempt(s)", other, err.attempts()),
        None => eprintln!("Error: {}", err),
    }
}
