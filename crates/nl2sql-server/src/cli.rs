use clap::{Parser, Subcommand};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "nl2sql",
    about = "Natural-language to SQL gateway for a configured MySQL database",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Optional subcommand; defaults to running the HTTP server when absent.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP API.
    Serve {
        /// Listen address, e.g. `127.0.0.1:8080`. Overrides config and `PORT`.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Print version and exit.
    Version,
    /// Report whether a database is configured and reachable.
    Health,
    /// Manage service configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_serve_when_missing_subcommand() {
        let cli = Cli::try_parse_from(["nl2sql"]).expect("parse should succeed");
        assert_eq!(cli.command, None);
    }

    #[test]
    fn parses_serve_with_bind() {
        let cli = Cli::try_parse_from(["nl2sql", "serve", "--bind", "127.0.0.1:8080"])
            .expect("parse should succeed");
        assert_eq!(
            cli.command,
            Some(Command::Serve {
                bind: Some("127.0.0.1:8080".into())
            })
        );
    }

    #[test]
    fn parses_health_subcommand() {
        let cli = Cli::try_parse_from(["nl2sql", "health"]).expect("parse should succeed");
        assert_eq!(cli.command, Some(Command::Health));
    }

    #[test]
    fn parses_config_init_subcommand() {
        let cli = Cli::try_parse_from(["nl2sql", "config", "init"]).expect("parse should succeed");
        assert_eq!(cli.command, Some(Command::Config(ConfigCommand::Init)));
    }
}
