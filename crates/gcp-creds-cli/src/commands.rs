//! CLI command definitions.

use clap::{Args, Subcommand};
use gcp_creds_auth::external_account::SUBJECT_TOKEN_PATH;
use std::path::PathBuf;

/// Credential inputs shared by every command.
#[derive(Args, Debug, Default, Clone)]
pub struct CredentialArgs {
    /// Static credential key (env:NAME, file:PATH or literal:VALUE)
    #[arg(long, env = "GCP_CREDENTIALS", global = true)]
    pub credentials: Option<String>,

    /// Workload identity provider resource name
    #[arg(long, env = "GCP_WORKLOAD_IDENTITY_PROVIDER", global = true)]
    pub workload_identity_provider: Option<String>,

    /// Workload identity subject token (env:NAME, file:PATH or literal:VALUE)
    #[arg(long, env = "GCP_WORKLOAD_IDENTITY_TOKEN", global = true)]
    pub workload_identity_token: Option<String>,

    /// Registry hosts to authenticate
    #[arg(
        long = "registry",
        env = "GCP_REGISTRIES",
        value_delimiter = ',',
        global = true
    )]
    pub registries: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print an access token
    Token {
        /// Output format (text or json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the external account descriptor for a workload identity provider
    Descriptor {
        /// Provider resource name (defaults to the configured provider)
        #[arg(long)]
        provider: Option<String>,

        /// Path the subject token is read from
        #[arg(long, default_value = SUBJECT_TOKEN_PATH)]
        token_path: String,
    },

    /// Inject credentials into a directory tree
    Mount {
        /// Directory treated as the execution context's filesystem root
        #[arg(long)]
        root: PathBuf,

        /// Also mount a registry config at this path
        #[arg(long)]
        registry_config: Option<String>,

        /// Owner of the registry config (user:group)
        #[arg(long, requires = "registry_config")]
        owner: Option<String>,

        /// Permission bits of the registry config, in octal
        #[arg(long, requires = "registry_config", value_parser = parse_mode)]
        mode: Option<u32>,

        /// Print the execution context instead of writing it
        #[arg(long)]
        plan: bool,
    },

    /// Write the registry auth document
    RegistryConfig {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
}

/// Parse octal permission bits such as `0600`, `600` or `0o600`.
pub fn parse_mode(value: &str) -> Result<u32, String> {
    let digits = value.strip_prefix("0o").unwrap_or(value);
    let mode =
        u32::from_str_radix(digits, 8).map_err(|_| format!("invalid octal mode: {}", value))?;

    if mode > 0o7777 {
        return Err(format!("mode out of range: {}", value));
    }
    Ok(mode)
}
