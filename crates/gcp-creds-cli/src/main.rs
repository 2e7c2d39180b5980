//! gcp-creds CLI entrypoint.

use clap::Parser;
use console::style;
use gcp_creds_core::{CallContext, Error};
use gcp_creds_secrets::MemorySecretStore;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod handlers;
mod materialize;


use commands::{Commands, ConfigCommands, CredentialArgs};
use config::CliConfig;
use handlers::RegistryConfigTarget;

#[derive(Parser)]
#[command(name = "gcp-creds")]
#[command(
    author,
    version,
    about = "Issue Google Cloud credentials and inject them into execution contexts",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    credentials: CredentialArgs,

    /// Seconds to wait for network operations
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Configuration file
    #[arg(long, global = true)]
    config_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let store = Arc::new(MemorySecretStore::new());

    match run(cli, store.clone()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let message = store.mask_string(&format!("{:#}", err)).await;
            eprintln!("{} {}", style("error:").red().bold(), message);

            match err.downcast_ref::<Error>() {
                Some(Error::Cancelled) => ExitCode::from(130),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

async fn run(cli: Cli, store: Arc<MemorySecretStore>) -> anyhow::Result<()> {
    let config =
        CliConfig::load(cli.config_file.as_deref())?.merge(&cli.credentials, cli.timeout);
    let ctx = call_context(&config);

    match cli.command {
        Commands::Token { format } => {
            let gcp = config.gcp(store.clone()).await?;
            handlers::token(&gcp, store.as_ref(), &ctx, &format).await?
        }
        Commands::Descriptor {
            provider,
            token_path,
        } => handlers::descriptor(&config, provider, &token_path)?,
        Commands::Mount {
            root,
            registry_config,
            owner,
            mode,
            plan,
        } => {
            let gcp = config.gcp(store.clone()).await?;
            let target = registry_config.map(|path| RegistryConfigTarget { path, owner, mode });
            handlers::mount(&gcp, store.as_ref(), &ctx, &root, target, plan).await?
        }
        Commands::RegistryConfig { output } => {
            let gcp = config.gcp(store.clone()).await?;
            handlers::registry_config(&gcp, &ctx, output).await?
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => handlers::show_config(&config, cli.config_file.as_deref())?,
        },
    }

    Ok(())
}

/// Call context bounded by the configured timeout and cancelled on Ctrl-C.
fn call_context(config: &CliConfig) -> CallContext {
    let ctx = match config.timeout() {
        Some(timeout) => CallContext::new().with_timeout(timeout),
        None => CallContext::new(),
    };

    let token = ctx.cancellation_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            token.cancel();
        }
    });

    ctx
}
