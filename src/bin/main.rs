use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tokio::task::JoinSet;

use script_bridge::config::{BridgeSettings, load_settings};
use script_bridge::protocol::{Message, decode, encode};
use script_bridge::transport::channel::connect_pair;
use script_bridge::transport::script::bootstrap_script;

/// Bidirectional message bridge between a native host and an embedded script context
#[derive(Parser)]
#[command(name = "script-bridge")]
#[command(version)]
#[command(
    about = "Bidirectional message bridge between a native host and an embedded script context"
)]
struct Cli {
    /// Log every message crossing the bridge
    #[arg(long, global = true)]
    verbose: bool,

    /// Project directory containing script-bridge.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a Message given as JSON into its wire text
    Encode {
        /// Message JSON, e.g. {"call":"send","handlerName":"echo","data":1}
        json: String,
    },
    /// Decode wire text into Message JSON
    Decode {
        /// Percent-encoded Message text
        text: String,
    },
    /// Print the script-side bootstrap routine
    Bootstrap {
        /// Global object name to install (default: from config, else WKB)
        #[arg(long)]
        namespace: Option<String>,
    },
    /// Run the echo and parallel counter scenarios over an in-process pair
    Demo {
        /// Number of concurrent counter calls
        #[arg(long, default_value_t = 100)]
        parallel: u64,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let override_value = cli.verbose.then(|| json!({ "verbose": true }));
    let outcome = load_settings(cli.config.as_deref(), override_value);
    for event in &outcome.events {
        event.log();
    }
    let settings = outcome.settings;

    match cli.command {
        Commands::Encode { json } => {
            let message: Message = serde_json::from_str(&json).unwrap_or_else(|e| {
                eprintln!("Error: invalid Message JSON: {}", e);
                std::process::exit(1);
            });
            match encode(&message) {
                Ok(encoded) => println!("{}", encoded),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Decode { text } => match decode(&text) {
            Ok(message) => match serde_json::to_string(&message) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            },
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        Commands::Bootstrap { namespace } => {
            let namespace = namespace.unwrap_or(settings.namespace);
            match bootstrap_script(&namespace) {
                Ok(script) => print!("{}", script),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Demo { parallel } => {
            if let Err(e) = run_demo(settings, parallel).await {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}

async fn run_demo(settings: BridgeSettings, parallel: u64) -> script_bridge::BridgeResult<()> {
    let pair = connect_pair(settings.clone(), settings);

    pair.b.register("echo", |payload, responder| {
        if let Some(responder) = responder {
            let _ = responder.respond(payload);
        }
    });
    let counter = Arc::new(AtomicU64::new(0));
    pair.b
        .register_with_context("counterReset", Arc::clone(&counter), |count, _, responder| {
            count.store(0, Ordering::SeqCst);
            if let Some(responder) = responder {
                let _ = responder.respond(json!({ "counter": 0 }));
            }
        });
    pair.b.register_with_context(
        "counterIncrement",
        Arc::clone(&counter),
        |count, _, responder| {
            let value = count.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(responder) = responder {
                let _ = responder.respond(json!({ "counter": value }));
            }
        },
    );

    let echoed = pair.a.call("echo", json!({ "hello": "From host" })).await?;
    println!("echo: {}", echoed);

    pair.a.call("counterReset", Value::Null).await?;
    let mut calls = JoinSet::new();
    for _ in 0..parallel {
        let a = Arc::clone(&pair.a);
        calls.spawn(async move { a.call("counterIncrement", Value::Null).await });
    }

    let mut highest = 0;
    while let Some(joined) = calls.join_next().await {
        let Ok(result) = joined else {
            continue;
        };
        let value = result?;
        highest = highest.max(value["counter"].as_u64().unwrap_or_default());
    }
    println!(
        "counter: {} after {} parallel calls (pending: {})",
        highest,
        parallel,
        pair.a.pending_count()
    );

    Ok(())
}
