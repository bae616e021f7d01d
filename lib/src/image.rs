use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use log::info;
use reqwest::Client;
use sha2::{Digest, Sha256};

use crate::check_cmd;
use crate::error::DeployError;
use crate::types::{OvaRelease, StreamManifest};

const SIGNING_KEY_URL: &str = "https://fedoraproject.org/fedora.asc";
const STREAM_BASE_URL: &str = "https://builds.coreos.fedoraproject.org/streams";

/// Download the Fedora signing key and dearmor it into a gpg keyring.
/// Both steps are cached by file existence.
pub async fn fetch_signing_key(client: &Client, download_dir: &Path) -> Result<PathBuf> {
    let armored = download_dir.join("fedora.asc");
    if armored.is_file() {
        info!("{} already present, skipping download", armored.display());
    } else {
        download(client, SIGNING_KEY_URL, &armored).await?;
    }

    let keyring = download_dir.join("fedora.gpg");
    if keyring.is_file() {
        info!("{} already present, skipping dearmor", keyring.display());
    } else {
        check_cmd(
            Command::new("gpg")
                .arg("--dearmor")
                .arg("--output")
                .arg(&keyring)
                .arg(&armored),
        )?;
    }
    Ok(keyring)
}

/// The stream manifest is always re-fetched; releases move underneath us.
/// A copy is cached in the download dir for inspection.
pub async fn fetch_stream(
    client: &Client,
    stream: &str,
    download_dir: &Path,
) -> Result<StreamManifest> {
    let url = format!("{}/{}.json", STREAM_BASE_URL, stream);
    info!("fetch: {}", url);
    let body = client
        .get(url.as_str())
        .send()
        .await?
        .error_for_status()
        .with_context(|| format!("no stream manifest at {}", url))?
        .text()
        .await?;

    fs::write(download_dir.join(format!("{}.json", stream)), &body)
        .context("couldn't cache the stream manifest")?;

    serde_json::from_str(&body).context("couldn't parse the stream manifest")
}

/// Download the OVA and its detached signature unless the versioned files
/// already exist, then verify signature and checksum. Any verification
/// failure is fatal, nothing has touched the hypervisor yet.
pub async fn fetch_ova(
    client: &Client,
    stream: &str,
    release: &OvaRelease,
    download_dir: &Path,
    keyring: &Path,
) -> Result<PathBuf> {
    let ova = download_dir.join(format!(
        "fedora-coreos-{}-{}.ova",
        stream, release.version
    ));
    let sig = download_dir.join(format!(
        "fedora-coreos-{}-{}.ova.sig",
        stream, release.version
    ));

    if ova.is_file() {
        info!("{} already present, skipping download", ova.display());
    } else {
        download(client, &release.location, &ova).await?;
    }
    if sig.is_file() {
        info!("{} already present, skipping download", sig.display());
    } else {
        download(client, &release.signature, &sig).await?;
    }

    verify_signature(keyring, &sig, &ova)?;
    verify_checksum(&ova, &release.sha256)?;
    Ok(ova)
}

fn verify_signature(keyring: &Path, sig: &Path, target: &Path) -> Result<()> {
    check_cmd(
        Command::new("gpg")
            .arg("--no-default-keyring")
            .arg("--keyring")
            .arg(keyring)
            .arg("--verify")
            .arg(sig)
            .arg(target),
    )
    .with_context(|| format!("signature verification failed for {}", target.display()))
}

/// Streaming sha256 of the downloaded artifact against the manifest value.
pub fn verify_checksum(path: &Path, expected: &str) -> Result<()> {
    let mut file =
        File::open(path).with_context(|| format!("couldn't open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let actual = format!("{:x}", hasher.finalize());

    if actual == expected {
        info!("checksum verified for {}", path.display());
        Ok(())
    } else {
        Err(DeployError::ChecksumMismatch {
            path: path.display().to_string(),
            expected: expected.to_string(),
            actual,
        }
        .into())
    }
}

async fn download(client: &Client, url: &str, dest: &Path) -> Result<()> {
    info!("fetch: {}", url);
    let mut response = client
        .get(url)
        .send()
        .await?
        .error_for_status()
        .with_context(|| format!("download failed: {}", url))?;

    let mut file =
        File::create(dest).with_context(|| format!("couldn't create {}", dest.display()))?;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::verify_checksum;
    use std::fs;

    const HELLO_SHA256: &str =
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_checksum_matches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.ova");
        fs::write(&path, "hello world").unwrap();
        verify_checksum(&path, HELLO_SHA256).unwrap();
    }

    #[test]
    fn test_checksum_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.ova");
        fs::write(&path, "tampered").unwrap();

        let err = verify_checksum(&path, HELLO_SHA256).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }
}
