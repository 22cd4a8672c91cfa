use crate::error::{BootstrapError, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// `<certs_dir>/<registry>/ca.crt`, where dockerd looks up a registry's CA.
pub fn ca_path(certs_dir: &Path, registry: &str) -> PathBuf {
    certs_dir.join(registry).join("ca.crt")
}

/// `<base_url>/ca.pem`
pub fn ca_url(base_url: &str) -> String {
    format!("{}/ca.pem", base_url.trim_end_matches('/'))
}

/// Downloads the registry CA certificate into the docker certs directory.
///
/// The body is streamed to disk chunk by chunk.
pub async fn install_registry_ca(
    certs_dir: &Path,
    registry: &str,
    base_url: &str,
) -> Result<PathBuf> {
    let target = ca_path(certs_dir, registry);
    let url = ca_url(base_url);

    if let Some(dir) = target.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| BootstrapError::path(dir, e))?;
    }

    info!("Downloading the {} registry CA certificate", registry);
    download_file(&url, &target).await?;
    Ok(target)
}

async fn download_file(url: &str, target: &Path) -> Result<()> {
    let download_err = |reason: String| BootstrapError::Download {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .user_agent(concat!("docker-bootstrap/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| download_err(format!("Failed to create HTTP client: {}", e)))?;

    let mut response = client
        .get(url)
        .send()
        .await
        .map_err(|e| download_err(e.to_string()))?;

    if !response.status().is_success() {
        return Err(download_err(format!("server returned {}", response.status())));
    }

    let mut file = tokio::fs::File::create(target)
        .await
        .map_err(|e| BootstrapError::path(target, e))?;

    let mut written: u64 = 0;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| download_err(e.to_string()))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| BootstrapError::path(target, e))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| BootstrapError::path(target, e))?;

    debug!("Wrote {} bytes to {}", written, target.display());
    Ok(())
}
