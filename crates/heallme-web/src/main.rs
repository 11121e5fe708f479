//! HealLLMe REST API server.
//!
//! # Usage
//!
//! ```bash
//! OPENROUTER_KEY=sk-... cargo run -p heallme-web
//! OPENROUTER_KEY=sk-... cargo run -p heallme-web -- --port 8080
//! OPENROUTER_KEY=sk-... N8N_WEBHOOK_URL=https://automation.example.com/webhook/health \
//!   cargo run -p heallme-web -- --model google/gemini-2.5-flash
//! ```

use std::net::IpAddr;
use std::process;

use clap::Parser;
use heallme::config::{self, ServiceConfig};
use heallme::Orchestrator;
use heallme_web::{AppState, WebConfig, run_web};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(about = "REST API for the HealLLMe health assistant")]
struct Args {
    /// Model identifier (overrides HEALLME_MODEL).
    #[arg(long)]
    model: Option<String>,

    /// Address to bind.
    #[arg(long, env = "HEALLME_HOST", default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port to listen on.
    #[arg(long, env = "HEALLME_PORT", default_value_t = 8000)]
    port: u16,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    let args = Args::parse();

    let mut service = ServiceConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        process::exit(1);
    });
    if let Some(model) = args.model {
        service = service.with_model(model);
    }
    let orchestrator = Orchestrator::new(&service).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        process::exit(1);
    });

    let config = WebConfig {
        bind_addr: (args.host, args.port).into(),
    };
    if let Err(e) = run_web(AppState::new(orchestrator), config).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
