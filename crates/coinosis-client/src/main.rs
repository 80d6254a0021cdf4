use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coinosis_assessment::{AssessmentBackend, DistributionGate};
use coinosis_client::{init_logging, ClientConfig, HttpBackend};
use coinosis_types::Address;
use std::path::{Path, PathBuf};
use tracing::info;

const DEFAULT_CONFIG: &str = "./coinosis.toml";

#[derive(Parser)]
#[command(name = "coinosis")]
#[command(about = "Coinosis peer assessment client", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the committed assessment of an attendee
    Assessment {
        /// Event url
        event: String,
        /// Attendee address
        account: String,
    },

    /// Show the current gas price recommendation
    Gas,

    /// Show the distribution record of an event
    Distribution {
        /// Event url
        event: String,
    },

    /// Show when the distribute control of an event opens
    Gate {
        /// Event end, RFC 3339
        end: String,
    },

    /// Write a default configuration file
    Init {
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        output: PathBuf,
    },
}

fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    let mut config = match path {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG).exists() => {
            ClientConfig::from_file(Path::new(DEFAULT_CONFIG))?
        }
        None => ClientConfig::default(),
    };
    config.apply_env_overrides();
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    if let Err(e) = init_logging(&config.logging, cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match cli.command {
        Commands::Assessment { event, account } => {
            let account = Address::parse(&account)?;
            let backend = HttpBackend::new(&config.backend)?;
            match backend.fetch_assessment(&event, &account).await? {
                Some(assessment) => println!("{}", serde_json::to_string_pretty(&assessment)?),
                None => println!("no assessment committed by {} for {}", account, event),
            }
        }
        Commands::Gas => {
            let backend = HttpBackend::new(&config.backend)?;
            let quote = backend.gas_quote().await?;
            println!(
                "safe {} gwei, propose {} gwei ({} wei)",
                quote.safe,
                quote.propose,
                quote.propose_wei()
            );
        }
        Commands::Distribution { event } => {
            let backend = HttpBackend::new(&config.backend)?;
            let info = backend.distribution(&event).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::Gate { end } => {
            let end = chrono::DateTime::parse_from_rfc3339(&end)
                .context("event end must be RFC 3339")?
                .with_timezone(&chrono::Utc);
            let gate = DistributionGate::new(end, config.distribution_config().commitment_window);
            let open = gate.is_open(chrono::Utc::now());
            println!("opens at {} ({})", gate.opens_at(), if open { "open" } else { "closed" });
        }
        Commands::Init { output } => {
            ClientConfig::default().save_to_file(&output)?;
            info!(path = %output.display(), "✨ Configuration written");
        }
    }

    Ok(())
}
