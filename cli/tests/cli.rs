use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*; // Used for writing assertions
use std::fs;
use std::process::Command;

fn fcosup() -> Command {
    let mut cmd = Command::cargo_bin("fcosup").expect("binary not built");
    // Tests must not pick up hypervisor credentials from the outside.
    for var in ["GOVC_URL", "GOVC_USERNAME", "GOVC_PASSWORD", "GOVC_TLS_CA_CERTS"] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn no_subcommand_fails() {
    fcosup().assert().failure();
}

#[test]
fn deploy_requires_name() {
    fcosup()
        .arg("deploy")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--name"));
}

#[test]
fn deploy_rejects_missing_butane_file() {
    fcosup()
        .args(&[
            "deploy",
            "--name",
            "core",
            "--bu-file",
            "no/such/core.bu",
            "--download-dir",
            ".",
            "--tls-certs",
            ".",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn remove_requires_hypervisor_credentials() {
    fcosup()
        .args(&["remove", "--name", "core"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "GOVC_URL environment variable must be set",
        ));
}

#[test]
fn deploy_requires_hypervisor_credentials() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let bu_file = dir.path().join("core.bu");
    fs::write(&bu_file, "variant: fcos\nversion: 1.5.0\n")?;
    let tls = dir.path().join("tls");
    fs::create_dir(&tls)?;

    fcosup()
        .arg("deploy")
        .arg("--name")
        .arg("core")
        .arg("--bu-file")
        .arg(&bu_file)
        .arg("--download-dir")
        .arg(dir.path())
        .arg("--tls-certs")
        .arg(&tls)
        .arg("--deploy")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "GOVC_URL environment variable must be set",
        ));

    Ok(())
}
