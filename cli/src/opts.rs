use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use fcosup_lib::types::VmName;

#[derive(Parser)]
#[clap(version, about)]
pub struct Fcosup {
    /// Log subprocess invocations and progress
    #[clap(short, long, global = true)]
    pub verbose: bool,
    #[clap(subcommand)]
    pub command: SubCommands,
}

#[derive(Subcommand)]
pub enum SubCommands {
    Deploy(Deploy),
    Remove(Remove),
}

/// Stage secrets, build the Ignition config and deploy a CoreOS VM
#[derive(Args)]
pub struct Deploy {
    /// Name of the virtual machine
    #[clap(long, value_name = "NAME")]
    pub name: String,
    /// Butane source of the machine configuration
    #[clap(long, value_name = "PATH")]
    pub bu_file: PathBuf,
    /// Cache directory for images, signatures and stream manifests
    #[clap(long, value_name = "PATH")]
    pub download_dir: PathBuf,
    /// Directory holding ca.pem, <name>.pem and <name>-key.pem
    #[clap(long, value_name = "PATH")]
    pub tls_certs: PathBuf,
    /// Shared Butane snippets copied into the includes tree
    #[clap(long, value_name = "PATH")]
    pub common_dir: Option<PathBuf>,
    /// SSH CA key used to certify the generated host keys
    #[clap(long, value_name = "PATH")]
    pub host_signing_key: Option<PathBuf>,
    /// Passphrase of the host signing key
    #[clap(
        long,
        value_name = "PASS",
        env = "SIMPLE_CA_SSH_PASSWORD",
        hide_env_values = true
    )]
    pub host_signing_pw: Option<String>,
    /// SSH CA public key trusted for user logins
    #[clap(long, value_name = "PATH")]
    pub user_signing_key: Option<PathBuf>,
    /// Content library holding the imported OVA images
    #[clap(long, value_name = "NAME", default_value = "fcos")]
    pub library: String,
    /// Datastore backing a newly created library
    #[clap(long, value_name = "NAME")]
    pub datastore: Option<String>,
    /// Prefix prepended to the instance name
    #[clap(long, value_name = "NAME")]
    pub prefix: Option<String>,
    /// CoreOS release stream
    #[clap(long, value_name = "NAME", default_value = "stable")]
    pub stream: String,
    /// Talk to vSphere; without this only <name>.ign.json is written
    #[clap(long)]
    pub deploy: bool,
    /// Attach a serial console logger to the VM
    #[clap(long)]
    pub debug: bool,
}

impl Deploy {
    pub fn instance(&self) -> String {
        VmName::new(&self.name, self.prefix.clone()).instance()
    }
}

/// Tear down a deployed VM, optionally keeping its data disks
#[derive(Args)]
pub struct Remove {
    /// Name of the virtual machine
    #[clap(long, value_name = "NAME")]
    pub name: String,
    /// Prefix prepended to the instance name
    #[clap(long, value_name = "NAME")]
    pub prefix: Option<String>,
    /// Execute the plan instead of printing it
    #[clap(long)]
    pub apply: bool,
    /// Detach the docker and data disks instead of destroying them
    #[clap(long)]
    pub keep_data: bool,
}

impl Remove {
    pub fn instance(&self) -> String {
        VmName::new(&self.name, self.prefix.clone()).instance()
    }
}
