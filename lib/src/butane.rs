use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use log::info;

use crate::cmd_output;

/// Transpile a Butane source against the staged includes tree, returning
/// the raw Ignition JSON.
pub fn transpile(bu_file: &Path, includes: &Path) -> Result<Vec<u8>> {
    let output = cmd_output(
        Command::new("butane")
            .arg("--strict")
            .arg("--files-dir")
            .arg(includes)
            .arg(bu_file),
    )?;
    Ok(output.into_bytes())
}

/// Compress and base64-encode an Ignition document for the guestinfo
/// channel.
pub fn encode(ignition: &[u8]) -> Result<String> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(ignition)
        .context("failed to compress the ignition config")?;
    let compressed = encoder
        .finish()
        .context("failed to compress the ignition config")?;
    Ok(base64::encode(compressed))
}

/// Write the encoded artifact next to the Butane source.
pub fn write_encoded(bu_file: &Path, instance: &str, encoded: &str) -> Result<PathBuf> {
    let path = artifact_path(bu_file, instance, "ign.gzip.b64");
    fs::write(&path, encoded)
        .with_context(|| format!("couldn't write {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(path)
}

/// Non-deploy mode: write the plaintext document for inspection.
pub fn write_plain(bu_file: &Path, instance: &str, ignition: &[u8]) -> Result<PathBuf> {
    let value: serde_json::Value =
        serde_json::from_slice(ignition).context("transpiler emitted invalid JSON")?;
    let path = artifact_path(bu_file, instance, "ign.json");
    fs::write(&path, serde_json::to_string_pretty(&value)?)
        .with_context(|| format!("couldn't write {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(path)
}

fn artifact_path(bu_file: &Path, instance: &str, ext: &str) -> PathBuf {
    bu_file.with_file_name(format!("{}.{}", instance, ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use pretty_assertions::assert_eq;
    use std::io::Read;

    #[test]
    fn test_encode_round_trips() {
        let ignition = br#"{"ignition":{"version":"3.4.0"}}"#;
        let encoded = encode(ignition).unwrap();

        let compressed = base64::decode(encoded).unwrap();
        let mut decoder = GzDecoder::new(compressed.as_slice());
        let mut decoded = Vec::new();
        decoder.read_to_end(&mut decoded).unwrap();

        assert_eq!(decoded, ignition);
    }

    #[test]
    fn test_artifact_naming() {
        let bu = Path::new("/srv/core/core.bu");
        assert_eq!(
            artifact_path(bu, "lab-core", "ign.gzip.b64"),
            Path::new("/srv/core/lab-core.ign.gzip.b64")
        );
        assert_eq!(
            artifact_path(bu, "core", "ign.json"),
            Path::new("/srv/core/core.ign.json")
        );
    }

    #[test]
    fn test_write_plain_pretty_prints() {
        let dir = tempfile::tempdir().unwrap();
        let bu = dir.path().join("core.bu");

        let path = write_plain(&bu, "core", br#"{"ignition":{"version":"3.4.0"}}"#).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("\n"));
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["ignition"]["version"], "3.4.0");
    }

    #[test]
    fn test_write_plain_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let bu = dir.path().join("core.bu");
        assert!(write_plain(&bu, "core", b"not json").is_err());
    }
}
