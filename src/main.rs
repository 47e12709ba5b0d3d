// sql-chat: ask questions about a database in plain language
//
// This is the main entry point: load the config, connect, extract the
// schema, then hand over to the REPL.

use anyhow::{Context, Result};
use clap::Parser;
use sql_chat::cli::Repl;
use sql_chat::config::storage::DEFAULT_CONFIG_FILE;
use sql_chat::config::Config;
use sql_chat::database::DatabaseManager;
use sql_chat::llm::{LLMProvider, OpenAIProvider};
use sql_chat::session::{Session, SessionSettings};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Ask questions about a database in plain language
#[derive(Debug, Parser)]
#[command(name = "sql-chat", version, about)]
struct Args {
    /// Path to the JSON (or .toml) configuration file
    #[arg(default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log filter, e.g. "info" or "sql_chat=debug"
    #[arg(long, env = "SQL_CHAT_LOG", default_value = "warn")]
    log_level: String,
}

/// Initialize the tracing subscriber for logging.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = Config::load(&args.config)
        .with_context(|| format!("could not load {}", args.config.display()))?;

    let mut db = DatabaseManager::connect(&config).await?;
    db.extract_schema(&config.schema_name, config.sample_rows).await?;
    let schema = db.schema();
    for warning in &schema.warnings {
        warn!(table = %warning.table, "{}", warning.message);
    }
    info!(tables = schema.tables.len(), "schema ready");

    println!("\nYou are connected to {}.", db.target());
    println!("{}\n", schema.format_summary());
    println!("Schema and example rows:\n\n{}", schema.format_for_llm());

    let provider = OpenAIProvider::new(
        config.openai_api_key.clone(),
        config.openai_model.clone(),
        config.api_base_url.clone(),
        config.api_timeout(),
    )?;
    provider.validate_config()?;

    let session = Session::new(db, Box::new(provider), SessionSettings::from(&config));
    let mut repl = Repl::new(session)?;
    let outcome = repl.run().await;

    repl.into_session().close().await;
    outcome?;
    Ok(())
}
