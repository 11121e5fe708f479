//! One-shot HealLLMe operations from the command line.
//!
//! Reads the API key from the `OPENROUTER_KEY` environment variable and the
//! optional webhook from `N8N_WEBHOOK_URL`. Results are printed as pretty JSON.
//!
//! # Examples
//!
//! ```sh
//! heallme quote
//! heallme chat --message "Is it normal to feel tired after lunch?"
//! heallme symptoms --symptoms "headache, blurred vision" --history hypertension --age 45
//! heallme recommend --health-data '{"sleep_hours": 6}' --lifestyle '{"exercise": "none"}'
//! heallme analyze --file vitals.json
//! heallme emergency --kind "chest pain"
//! ```

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use heallme::config::{self, ServiceConfig};
use heallme::{Orchestrator, UserProfile};

#[derive(Parser)]
#[command(name = "heallme", about = "Run a single HealLLMe operation and print the result")]
struct Cli {
    /// Model identifier (overrides HEALLME_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Subject id attached to notifications
    #[arg(long, global = true)]
    user_id: Option<String>,

    /// Age of the person the request is about
    #[arg(long, global = true)]
    age: Option<u32>,

    #[arg(long, global = true)]
    gender: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a random health quote
    Quote,
    /// Ask the health assistant a question
    Chat {
        #[arg(long)]
        message: String,
    },
    /// Analyze a free-text symptom description
    Symptoms {
        #[arg(long)]
        symptoms: String,
        /// Medical history tag (repeatable)
        #[arg(long)]
        history: Vec<String>,
    },
    /// Generate personalized recommendations
    Recommend {
        /// Current health data as a JSON string
        #[arg(long, default_value = "{}")]
        health_data: String,
        /// Lifestyle description as a JSON string
        #[arg(long, default_value = "{}")]
        lifestyle: String,
    },
    /// Analyze a JSON file of health measurements
    Analyze {
        #[arg(long)]
        file: PathBuf,
    },
    /// Get first-aid guidance for an emergency
    Emergency {
        #[arg(long)]
        kind: String,
    },
}

fn parse_json_arg(flag: &str, raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        eprintln!("Error: --{flag} is not valid JSON: {e}");
        process::exit(2);
    })
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("Error: failed to encode result: {e}");
            process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Command::Quote = cli.command {
        print_json(&serde_json::json!({ "quote": heallme::quotes::daily_quote() }));
        return;
    }

    let mut service = ServiceConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        process::exit(1);
    });
    if let Some(model) = cli.model {
        service = service.with_model(model);
    }
    let orchestrator = Orchestrator::new(&service).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        process::exit(1);
    });

    let mut profile = UserProfile {
        user_id: cli.user_id,
        age: cli.age,
        gender: cli.gender,
        medical_history: Vec::new(),
    };

    match cli.command {
        Command::Quote => {}
        Command::Chat { message } => {
            let reply = orchestrator.chat(&message, &[], &profile).await;
            print_json(&serde_json::json!({
                "user_message": message,
                "ai_response": reply,
            }));
        }
        Command::Symptoms { symptoms, history } => {
            profile.medical_history = history.clone();
            let result = orchestrator
                .analyze_symptoms(&symptoms, &history, &profile)
                .await;
            print_json(&result);
        }
        Command::Recommend {
            health_data,
            lifestyle,
        } => {
            let health = parse_json_arg("health-data", &health_data);
            let lifestyle = parse_json_arg("lifestyle", &lifestyle);
            let result = orchestrator
                .generate_recommendations(&profile, &health, &lifestyle)
                .await;
            print_json(&result);
        }
        Command::Analyze { file } => {
            let raw = std::fs::read_to_string(&file).unwrap_or_else(|e| {
                eprintln!("Error: cannot read {}: {e}", file.display());
                process::exit(1);
            });
            let payload = parse_json_arg("file", &raw);
            let result = orchestrator.analyze_health_data(&payload, &profile).await;
            print_json(&result);
        }
        Command::Emergency { kind } => {
            let result = orchestrator.emergency_guidance(&kind, &profile).await;
            print_json(&result);
        }
    }
}
