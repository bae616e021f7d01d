pub mod butane;
pub mod cleanup;
pub mod error;
pub mod govc;
pub mod image;
pub mod keys;
pub mod types;

use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use execute::Execute;
use log::{debug, info};

use crate::error::DeployError;

/// Run a command to completion, failing on a non-zero exit.
pub fn check_cmd(cmd: &mut Command) -> Result<()> {
    info!("run: {:?}", cmd);
    let status = cmd
        .status()
        .with_context(|| format!("failed to run: {:?}", cmd))?;
    if status.success() {
        Ok(())
    } else {
        Err(DeployError::CommandFailed(format!("{:?}", cmd)).into())
    }
}

/// Run a command and capture its stdout, failing on a non-zero exit with
/// the tool's stderr attached.
pub fn cmd_output(cmd: &mut Command) -> Result<String> {
    info!("run: {:?}", cmd);
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let output = cmd
        .execute_output()
        .with_context(|| format!("failed to run: {:?}", cmd))?;

    match output.status.code() {
        Some(0) => Ok(String::from_utf8_lossy(&output.stdout).to_string()),
        _ => Err(DeployError::CommandError {
            command: format!("{:?}", cmd),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into()),
    }
}

/// Existence probes are allowed to fail; a non-zero exit means "absent",
/// not an error.
pub fn probe_cmd(cmd: &mut Command) -> bool {
    debug!("probe: {:?}", cmd);
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());
    matches!(cmd.status(), Ok(status) if status.success())
}

/// Run a command and parse its stdout as JSON.
pub fn cmd_json<T: serde::de::DeserializeOwned>(cmd: &mut Command) -> Result<T> {
    let output = cmd_output(cmd)?;
    serde_json::from_str(&output).with_context(|| format!("unparsable JSON from: {:?}", cmd))
}
