mod agent;
mod cli;
mod config;
mod server;
mod storage;

use std::sync::Arc;

use crate::cli::ConfigCommand;
use clap::Parser;
use color_eyre::Result;
use nl2sql_core::{
    database::Database,
    gate::{AccessGate, GateError},
    storage::ConfigStore,
};
use nl2sql_db::mysql::MySqlDatabase;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    match cli.command.unwrap_or(cli::Command::Serve { bind: None }) {
        cli::Command::Serve { bind } => run_server(&config, bind).await?,
        cli::Command::Version => print_version(),
        cli::Command::Health => run_health_check(&config).await?,
        cli::Command::Config(ConfigCommand::Init) => init_config(&config)?,
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("nl2sql {}", env!("CARGO_PKG_VERSION"));
}

async fn run_server(config: &config::Config, bind: Option<String>) -> Result<()> {
    let store: Arc<dyn ConfigStore> = Arc::new(storage::store_from_config(config));
    let db: Arc<dyn Database> = Arc::new(MySqlDatabase::default());
    let agent = agent::build_agent(config);
    let state = server::AppState::new(store, db, agent);

    let addr = config.listen_addr(bind, std::env::var("PORT").ok());
    server::serve(state, &addr).await
}

#[derive(Debug, PartialEq, Eq)]
enum HealthReport {
    NotConfigured,
    Connected,
    Disconnected(String),
}

async fn run_health_check(config: &config::Config) -> Result<()> {
    let store: Arc<dyn ConfigStore> = Arc::new(storage::store_from_config(config));
    let gate = AccessGate::new(store);
    match check_health(&gate, &MySqlDatabase::default()).await? {
        HealthReport::NotConfigured => println!("Database: not configured"),
        HealthReport::Connected => println!("Database: connected"),
        HealthReport::Disconnected(reason) => {
            color_eyre::eyre::bail!("database connection failed: {reason}")
        }
    }
    Ok(())
}

async fn check_health(gate: &AccessGate, db: &dyn Database) -> Result<HealthReport> {
    let record = match gate.require().await {
        Ok(record) => record,
        Err(GateError::NotConfigured) => return Ok(HealthReport::NotConfigured),
        Err(err) => return Err(color_eyre::eyre::eyre!(err.to_string())),
    };
    Ok(match db.check(&record).await {
        Ok(()) => HealthReport::Connected,
        Err(err) => HealthReport::Disconnected(err.to_string()),
    })
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}
