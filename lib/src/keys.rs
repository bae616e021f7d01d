use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};

use crate::check_cmd;
use crate::cleanup::Staging;

pub const HOST_KEY_TYPES: [&str; 2] = ["ed25519", "rsa"];

/// Generate fresh host keys into the includes tree. Keys are never reused
/// across runs; every deploy gives the machine a new identity.
pub fn generate_host_keys(includes: &Path, instance: &str, staging: &Staging) -> Result<()> {
    for key_type in HOST_KEY_TYPES {
        let key = includes.join(format!("ssh_host_{}_key", key_type));
        let pubkey = includes.join(format!("ssh_host_{}_key.pub", key_type));

        // A run that died without cleanup may have left keys behind, and
        // ssh-keygen would stop to ask before overwriting them.
        let _ = fs::remove_file(&key);
        let _ = fs::remove_file(&pubkey);

        check_cmd(
            Command::new("ssh-keygen")
                .args(["-q", "-t", key_type, "-N", "", "-C", instance, "-f"])
                .arg(&key),
        )?;
        staging.track(&key);
        staging.track(&pubkey);
    }
    Ok(())
}

/// Certify a generated host key with the CA at `signing_key`. ssh-keygen
/// writes the certificate next to the public key as `*-cert.pub`.
pub fn sign_host_key(
    includes: &Path,
    instance: &str,
    key_type: &str,
    signing_key: &Path,
    password: Option<&str>,
    staging: &Staging,
) -> Result<()> {
    let pubkey = includes.join(format!("ssh_host_{}_key.pub", key_type));

    let mut cmd = Command::new("ssh-keygen");
    cmd.arg("-s").arg(signing_key);
    if let Some(password) = password {
        cmd.arg("-P").arg(password);
    }
    cmd.args(["-I", instance, "-h", "-n", instance]).arg(&pubkey);
    check_cmd(&mut cmd)?;

    staging.track(includes.join(format!("ssh_host_{}_key-cert.pub", key_type)));
    Ok(())
}

/// Copy the user CA public key for sshd's TrustedUserCAKeys.
pub fn stage_user_ca(includes: &Path, user_signing_key: &Path, staging: &Staging) -> Result<()> {
    staging.copy_into(user_signing_key, includes, "ssh_user_key.pub")?;
    Ok(())
}

/// Copy the TLS bundle into includes under the names the Butane config
/// references.
pub fn stage_tls_certs(
    includes: &Path,
    tls_dir: &Path,
    name: &str,
    staging: &Staging,
) -> Result<()> {
    let pairs = [
        ("ca.pem".to_string(), "tls_ca.pem"),
        (format!("{}.pem", name), "tls_cert.pem"),
        (format!("{}-key.pem", name), "tls_key.pem"),
    ];
    for (src, dest) in &pairs {
        staging.copy_into(&tls_dir.join(src), includes, dest)?;
    }
    Ok(())
}

/// Copy shared Butane snippets into the includes tree.
pub fn stage_common(includes: &Path, common: &Path, staging: &Staging) -> Result<()> {
    for entry in fs::read_dir(common)
        .with_context(|| format!("couldn't read {}", common.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            staging.copy_into(&entry.path(), includes, &name)?;
        }
    }
    Ok(())
}
