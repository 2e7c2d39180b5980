//! Command handlers.

use crate::config::CliConfig;
use crate::materialize;
use anyhow::anyhow;
use console::style;
use gcp_creds_auth::Gcp;
use gcp_creds_auth::external_account::ExternalAccountDescriptor;
use gcp_creds_core::{CallContext, ExecutionContext, SecretStore};
use std::path::{Path, PathBuf};

/// Registry config mount requested alongside `mount`.
pub struct RegistryConfigTarget {
    pub path: String,
    pub owner: Option<String>,
    pub mode: Option<u32>,
}

/// Print an access token in the requested format.
pub async fn token(
    gcp: &Gcp,
    store: &dyn SecretStore,
    ctx: &CallContext,
    format: &str,
) -> anyhow::Result<()> {
    let secret = gcp.get_access_token(ctx, format).await?;
    let value = store.plaintext(&secret).await?;
    println!("{}", value.expose());
    Ok(())
}

/// Print the external account descriptor for `provider`.
pub fn descriptor(
    config: &CliConfig,
    provider: Option<String>,
    token_path: &str,
) -> anyhow::Result<()> {
    let provider = provider
        .or_else(|| config.workload_identity_provider.clone())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| anyhow!("workload identity provider must be specified"))?;

    let auth = config.auth_config();
    let descriptor = ExternalAccountDescriptor::build(&provider, token_path)
        .with_token_url(&auth.sts_token_url)
        .with_universe_domain(&auth.universe_domain);

    println!("{}", serde_json::to_string_pretty(&descriptor)?);
    Ok(())
}

/// Build the mounted execution context.
pub async fn mount_plan(
    gcp: &Gcp,
    ctx: &CallContext,
    registry_config: Option<&RegistryConfigTarget>,
) -> anyhow::Result<ExecutionContext> {
    let ctr = gcp.mount(&ExecutionContext::new())?;

    match registry_config {
        Some(target) => Ok(gcp
            .registry_config(target.path.as_str(), target.owner.clone(), target.mode)
            .mount(ctx, &ctr)
            .await?),
        None => Ok(ctr),
    }
}

/// Mount credentials under `root`, or print the plan.
pub async fn mount(
    gcp: &Gcp,
    store: &dyn SecretStore,
    ctx: &CallContext,
    root: &Path,
    registry_config: Option<RegistryConfigTarget>,
    plan: bool,
) -> anyhow::Result<()> {
    let ctr = mount_plan(gcp, ctx, registry_config.as_ref()).await?;

    if plan {
        println!("{}", serde_json::to_string_pretty(&ctr)?);
        return Ok(());
    }

    let written = materialize::materialize(&ctr, store, root).await?;
    for path in &written {
        eprintln!("{} {}", style("✓").green(), path.display());
    }
    for line in materialize::export_lines(&ctr) {
        println!("{}", line);
    }
    Ok(())
}

/// Write the registry auth document to `output`, or stdout.
pub async fn registry_config(
    gcp: &Gcp,
    ctx: &CallContext,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let document = gcp.registry_document(ctx).await?;
    let json = document.to_json()?;

    match output {
        Some(path) => {
            materialize::write_private_file(&path, &json).await?;
            eprintln!(
                "{} Wrote {} registries to {}",
                style("✓").green(),
                document.auths.len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Show configuration.
pub fn show_config(config: &CliConfig, config_file: Option<&Path>) -> anyhow::Result<()> {
    println!("Current configuration:");
    print!("{}", serde_yaml::to_string(&config.redacted())?);

    match config_file.map(Path::to_path_buf).or_else(CliConfig::config_path) {
        Some(path) if path.exists() => println!("\nConfig file: {}", path.display()),
        Some(path) => println!("\nConfig file: {} (not found)", path.display()),
        None => println!("\nConfig file: (no config directory)"),
    }
    Ok(())
}
