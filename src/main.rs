use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use prismcare_engine::config::Config;
use prismcare_engine::errors;
use prismcare_engine::interaction::InteractionEngine;
use prismcare_engine::mcp_server::PrismCareServer;

#[derive(Parser)]
#[command(name = "prismcare", version, about = "Drug interaction checking for prescriptions")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve JSON-RPC requests over stdio (default)
    Serve,
    /// Check one new medicine against a medication history
    Check {
        /// Current medications, repeated or comma separated
        #[arg(long, value_delimiter = ',')]
        history: Vec<String>,
        /// Medicine being prescribed
        #[arg(long = "new")]
        new_medicine: String,
    },
    /// Print the loaded rule catalogue
    Rules,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries protocol and command output
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "prismcare_engine=info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{}", errors::format_user_error(&e));
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!("Starting PrismCare interaction server...");
            let server = PrismCareServer::new(config).await?;
            server.run().await
        }
        Command::Check { history, new_medicine } => {
            let engine = load_engine(&config).await?;
            let result = engine.analyze(&history, &new_medicine).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Command::Rules => {
            let engine = load_engine(&config).await?;
            let rules = engine.get_all_rules().await?;
            println!("{}", serde_json::to_string_pretty(&rules)?);
            Ok(())
        }
    }
}

async fn load_engine(config: &Config) -> Result<InteractionEngine> {
    let engine: InteractionEngine = InteractionEngine::new(config.embedding())?;
    engine.load_rules(config.load_rule_file()?).await?;
    Ok(engine)
}
