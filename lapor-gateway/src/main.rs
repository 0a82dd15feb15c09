use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lapor::gateway::{self, GatewayConfig};
use lapor::{Assistant, AssistantConfig};

#[derive(Parser)]
#[command(name = "lapor-gateway")]
#[command(version)]
#[command(about = "Conversational report-schedule assistant gateway")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Serve(ServeArgs),
    /// Print the effective configuration and exit.
    CheckConfig(ConfigArgs),
}

#[derive(Parser)]
struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:8003", env = "AI_SERVICE_ADDR")]
    bind_addr: String,

    /// Optional TOML configuration file; environment variables override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for the JSONL conversation log.
    #[arg(long)]
    turn_log_dir: Option<PathBuf>,
}

#[derive(Parser)]
struct ConfigArgs {
    #[arg(long)]
    config: Option<PathBuf>,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AssistantConfig> {
    let config = match path {
        Some(path) => AssistantConfig::from_toml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => AssistantConfig::default(),
    };
    Ok(config.apply_env())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::CheckConfig(args) => check_config(args),
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_ref())?;
    if args.turn_log_dir.is_some() {
        config.turn_log_dir = args.turn_log_dir;
    }

    let assistant = Assistant::from_config(&config).context("assembling assistant")?;
    let info = assistant.provider_info();
    tracing::info!(
        provider = info.name,
        model = info.model.as_str(),
        "starting gateway"
    );

    gateway::serve(
        GatewayConfig {
            bind_addr: args.bind_addr,
        },
        Arc::new(assistant),
    )
    .await
    .context("running gateway")
}

fn check_config(args: ConfigArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_ref())?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
