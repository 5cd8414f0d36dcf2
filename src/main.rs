use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use alertlens::alert::source::JsonFileSource;
use alertlens::config::{AlertLensConfig, LogFormat, LoggingConfig};
use alertlens::report;

#[derive(Parser)]
#[command(
    name = "alertlens",
    about = "Explain alert storms: causal timeline, root cause, blast radius",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true, env = "ALERTLENS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Bind address (overrides the config file)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Analyze a JSON file of alerts
    Analyze {
        /// Alert document: a JSON array or {"alerts": [...]}
        #[arg(long, short)]
        input: PathBuf,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,

        /// Slack mrkdwn output
        #[arg(long, conflicts_with = "json")]
        slack: bool,
    },

    /// List the active propagation rules
    Rules {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    // Logs go to stderr so report output on stdout stays clean.
    match logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AlertLensConfig::load(path)?,
        None => AlertLensConfig::load_or_default(),
    };
    init_tracing(&config.logging);

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            tracing::info!(bind = %config.server.bind, "Starting alertlens API");
            alertlens::serve(&config).await?;
        }
        Commands::Analyze { input, json, slack } => {
            let engine = config.engine()?;
            let source = JsonFileSource::new(&input);
            let intel = engine.analyze_source(&source).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&intel)?);
            } else if slack {
                println!("{}", report::format_slack(&intel));
            } else {
                print!("{}", report::format_summary(&intel));
            }
        }
        Commands::Rules { json } => {
            let rules = config.rule_table()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rules)?);
            } else {
                println!("{:<10} | {:<10} | {:>7} | Description", "From", "To", "Window");
                println!("{:-<10}-|-{:-<10}-|-{:->7}-|-{:-<40}", "", "", "", "");
                for rule in rules.rules() {
                    println!(
                        "{:<10} | {:<10} | {:>7} | {}",
                        rule.from.as_str(),
                        rule.to.as_str(),
                        report::format_duration(rule.max_window_secs),
                        rule.description
                    );
                }
            }
        }
    }

    Ok(())
}
