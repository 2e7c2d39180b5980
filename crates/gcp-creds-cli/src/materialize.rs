//! Writing an execution context onto a directory tree.

use anyhow::{Context, bail};
use gcp_creds_core::{ExecutionContext, SecretStore, SecretValue};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

const DEFAULT_FILE_MODE: u32 = 0o644;
const DEFAULT_SECRET_MODE: u32 = 0o400;

/// Resolve a context path under `root`, refusing paths that escape it.
pub fn rooted(root: &Path, path: &str) -> anyhow::Result<PathBuf> {
    let relative = Path::new(path.trim_start_matches('/'));
    if relative.as_os_str().is_empty() {
        bail!("invalid context path: {:?}", path);
    }
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        bail!("context path escapes root: {}", path);
    }
    Ok(root.join(relative))
}

/// A resolved secret mount waiting to be written.
struct StagedSecret<'a> {
    target: PathBuf,
    value: SecretValue,
    mode: u32,
    owner: Option<&'a str>,
}

/// Write files and mounted secrets of `ctr` under `root`.
///
/// Every path and secret is resolved before the first write, so a
/// missing secret leaves the tree untouched. Returns the written paths in
/// context order.
pub async fn materialize(
    ctr: &ExecutionContext,
    store: &dyn SecretStore,
    root: &Path,
) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::with_capacity(ctr.files.len());
    for (path, file) in &ctr.files {
        let mode = file.permissions.unwrap_or(DEFAULT_FILE_MODE);
        files.push((rooted(root, path)?, file.contents.as_str(), mode));
    }

    let mut secrets = Vec::with_capacity(ctr.secrets.len());
    for (path, mount) in &ctr.secrets {
        let target = rooted(root, path)?;
        let value = store
            .plaintext(&mount.secret)
            .await
            .with_context(|| format!("reading {} for {}", mount.secret, path))?;
        secrets.push(StagedSecret {
            target,
            value,
            mode: mount.options.mode.unwrap_or(DEFAULT_SECRET_MODE),
            owner: mount.options.owner.as_deref(),
        });
    }

    let mut written = Vec::with_capacity(files.len() + secrets.len());
    for (target, contents, mode) in files {
        write_file(&target, contents, mode).await?;
        written.push(target);
    }

    for staged in secrets {
        write_file(&staged.target, staged.value.expose(), staged.mode).await?;
        if let Some(owner) = staged.owner {
            set_owner(&staged.target, owner)?;
        }
        written.push(staged.target);
    }

    if !ctr.registry_auths.is_empty() {
        warn!(
            count = ctr.registry_auths.len(),
            "Registry logins cannot be written to a directory; skipping"
        );
    }

    Ok(written)
}

/// `export` lines for the context's environment variables.
pub fn export_lines(ctr: &ExecutionContext) -> Vec<String> {
    ctr.env
        .iter()
        .map(|(name, value)| format!("export {}={}", name, shell_quote(value)))
        .collect()
}

/// Write a file readable only by its owner.
pub async fn write_private_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    write_file(path, contents, 0o600).await
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

async fn write_file(path: &Path, contents: &str, mode: u32) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    // Existing read-only files would reject the write.
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        tokio::fs::remove_file(path)
            .await
            .with_context(|| format!("replacing {}", path.display()))?;
    }

    create_with_mode(path, contents.as_bytes(), mode)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    // The umask may have narrowed the creation mode.
    set_mode(path, mode).await?;

    debug!(path = %path.display(), mode = %format!("{:o}", mode), "Wrote file");
    Ok(())
}

/// Create `path` with `mode` from the start, so its contents are never
/// readable under looser permissions.
#[cfg(unix)]
async fn create_with_mode(path: &Path, contents: &[u8], mode: u32) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(mode)
        .open(path)
        .await?;
    file.write_all(contents).await?;
    file.flush().await
}

#[cfg(not(unix))]
async fn create_with_mode(path: &Path, contents: &[u8], _mode: u32) -> std::io::Result<()> {
    tokio::fs::write(path, contents).await
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .with_context(|| format!("setting mode {:o} on {}", mode, path.display()))
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> anyhow::Result<()> {
    Ok(())
}

/// Apply a numeric `uid:gid` owner. Named owners only resolve inside the
/// container, so they are left alone.
#[cfg(unix)]
fn set_owner(path: &Path, owner: &str) -> anyhow::Result<()> {
    let (uid, gid) = owner.split_once(':').unwrap_or((owner, ""));
    let (Ok(uid), gid) = (uid.parse::<u32>(), gid.parse::<u32>().ok()) else {
        warn!(owner = %owner, path = %path.display(), "Skipping non-numeric owner");
        return Ok(());
    };

    std::os::unix::fs::chown(path, Some(uid), gid)
        .with_context(|| format!("changing owner of {} to {}", path.display(), owner))
}

#[cfg(not(unix))]
fn set_owner(path: &Path, owner: &str) -> anyhow::Result<()> {
    warn!(owner = %owner, path = %path.display(), "Ownership is not supported on this platform");
    Ok(())
}
