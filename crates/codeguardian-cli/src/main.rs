use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codeguardian_core::{GuardianConfig, LoggingConfig, ProviderId};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "codeguardian", version)]
#[command(about = "CodeGuardian - technical debt scoring and AI code review")]
struct Cli {
    /// Configuration file, replaces the default search paths
    #[arg(long, global = true, env = "CODEGUARDIAN_CONFIG")]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Override the configured AI provider (gemini, openai, ollama)
    #[arg(long, global = true)]
    provider: Option<ProviderId>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score a snippet locally, no AI call
    Score {
        #[arg(help = "Source file, or - for stdin")]
        input: Option<PathBuf>,
    },

    /// Full analysis: score, AI explanation, security audit, stored in history
    Analyze {
        #[arg(help = "Source file, or - for stdin")]
        input: Option<PathBuf>,

        #[arg(long, env = "CODEGUARDIAN_USER", default_value = "local")]
        user: String,
    },

    /// Security audit: local findings plus the AI's
    Audit {
        #[arg(help = "Source file, or - for stdin")]
        input: Option<PathBuf>,
    },

    /// AI refactoring guided by the local analysis
    Refactor {
        #[arg(help = "Source file, or - for stdin")]
        input: Option<PathBuf>,
    },

    /// AI rewrite into optimized, secure, clean code
    Perfect {
        #[arg(help = "Source file, or - for stdin")]
        input: Option<PathBuf>,
    },

    /// AI-written documentation comments
    Document {
        #[arg(help = "Source file, or - for stdin")]
        input: Option<PathBuf>,
    },

    /// Pre-commit quality gate, exits with status 1 below the threshold
    Gate {
        #[arg(help = "Source file, or - for stdin")]
        input: Option<PathBuf>,

        /// Minimum passing score, defaults to analysis.commit_threshold
        #[arg(long)]
        threshold: Option<u8>,
    },

    /// Check that the AI provider is reachable
    Status,

    #[command(subcommand)]
    History(HistoryCommands),
}

#[derive(Subcommand, Debug)]
enum HistoryCommands {
    /// List past analyses, newest first
    List {
        #[arg(long, env = "CODEGUARDIAN_USER", default_value = "local")]
        user: String,
    },

    /// Show one past analysis
    Show {
        id: Uuid,

        #[arg(long, env = "CODEGUARDIAN_USER", default_value = "local")]
        user: String,
    },
}

fn load_config(cli: &Cli) -> Result<GuardianConfig> {
    let mut config = match &cli.config {
        Some(path) => GuardianConfig::load_from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => GuardianConfig::load_with_env().context("failed to load configuration")?,
    };

    if let Some(provider) = cli.provider {
        config.ai.provider = provider;
    }
    config.validate()?;

    Ok(config)
}

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(&config.logging, cli.verbose);

    let output = commands::Output { json: cli.json };

    match cli.command {
        Commands::Score { input } => commands::score(&config, input.as_deref(), output).await,
        Commands::Analyze { input, user } => {
            commands::analyze(config, input.as_deref(), &user, output).await
        }
        Commands::Audit { input } => commands::audit(config, input.as_deref(), output).await,
        Commands::Refactor { input } => commands::refactor(config, input.as_deref(), output).await,
        Commands::Perfect { input } => commands::perfect(config, input.as_deref(), output).await,
        Commands::Document { input } => commands::document(config, input.as_deref(), output).await,
        Commands::Gate { input, threshold } => {
            commands::gate(&config, input.as_deref(), threshold, output).await
        }
        Commands::Status => commands::status(config, output).await,
        Commands::History(HistoryCommands::List { user }) => {
            commands::history_list(&config, &user, output).await
        }
        Commands::History(HistoryCommands::Show { id, user }) => {
            commands::history_show(&config, &user, id, output).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "codeguardian",
            "gate",
            "src/app.js",
            "--threshold",
            "80",
            "--json",
            "--provider",
            "ollama",
        ])
        .unwrap();

        assert!(cli.json);
        assert_eq!(cli.provider, Some(ProviderId::Ollama));
        match cli.command {
            Commands::Gate { input, threshold } => {
                assert_eq!(input, Some(PathBuf::from("src/app.js")));
                assert_eq!(threshold, Some(80));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_history_show_parses_uuid() {
        let id = Uuid::new_v4();
        let cli = Cli::try_parse_from(["codeguardian", "history", "show", &id.to_string(), "--user", "ada"])
            .unwrap();

        match cli.command {
            Commands::History(HistoryCommands::Show { id: parsed, user }) => {
                assert_eq!(parsed, id);
                assert_eq!(user, "ada");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_unknown_provider_rejected() {
        assert!(Cli::try_parse_from(["codeguardian", "--provider", "claude", "status"]).is_err());
    }
}
