// intent-resolver/crates/intent-resolver/src/main.rs

#[cfg(feature = "cli")]
use anyhow::{Context, Result};
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use intent_resolver::{config::Config, telemetry, ConversationTurn, IntentEngine};
#[cfg(feature = "cli")]
use std::io::{BufRead, Write};

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "intent-resolver", version, about = "Resolve questions onto the forecast query catalog")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Command {
    /// Build the persisted embedding cache
    BuildCache {
        /// Rebuild even when the cache is current
        #[arg(long)]
        force: bool,
    },
    /// Resolve a single question
    Ask {
        #[arg(long)]
        session: Option<String>,
        question: String,
    },
    /// Read questions from stdin, one per line, in one session
    Repl {
        #[arg(long)]
        session: Option<String>,
    },
}

#[cfg(feature = "cli")]
async fn answer(engine: &IntentEngine, session: &str, question: &str) -> Result<()> {
    let decision = engine.resolve(session, question).await;
    if let Some(turn) = ConversationTurn::from_decision(question, &decision) {
        engine.record_turn(session, turn);
    }
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing();
    let cfg = Config::from_env()?;
    cfg.print_config();

    let engine = IntentEngine::from_config(&cfg)?;
    let new_session = || uuid::Uuid::new_v4().to_string();

    match cli.command {
        Command::BuildCache { force } => {
            let (index, outcome) = engine.loader().rebuild(force)?;
            let path = engine
                .loader()
                .cache_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(disabled)".to_string());
            println!("cache: {}", path);
            println!("outcome: {:?}", outcome);
            println!("entries: {}", index.len());
            println!("fingerprint: {}", engine.loader().fingerprint());
        }
        Command::Ask { session, question } => {
            let session = session.unwrap_or_else(new_session);
            answer(&engine, &session, &question).await?;
        }
        Command::Repl { session } => {
            let session = session.unwrap_or_else(new_session);
            eprintln!("session {} (empty line or ctrl-d to quit)", session);

            let stdin = std::io::stdin();
            let mut lines = stdin.lock().lines();
            loop {
                eprint!("> ");
                std::io::stderr().flush().ok();
                let Some(line) = lines.next() else { break };
                let line = line.context("Failed to read stdin")?;
                if line.trim().is_empty() {
                    break;
                }
                answer(&engine, &session, &line).await?;
            }
        }
    }

    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    println!("CLI feature not enabled. Enable with --features cli");
}
