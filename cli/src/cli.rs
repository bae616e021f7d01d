use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use colored::*;
use fcosup_lib::cleanup::Staging;
use fcosup_lib::types::VmResources;
use fcosup_lib::{butane, govc, image, keys};
use log::info;
use prettytable::{cell, row, Table};

use crate::opts::{Deploy, Remove};

pub(crate) async fn deploy(opts: Deploy) -> Result<()> {
    let instance = opts.instance();

    if !opts.bu_file.is_file() {
        bail!("butane file {} does not exist", opts.bu_file.display());
    }
    if !opts.download_dir.is_dir() {
        bail!("download dir {} does not exist", opts.download_dir.display());
    }
    if !opts.tls_certs.is_dir() {
        bail!("tls certs dir {} does not exist", opts.tls_certs.display());
    }
    for key in [&opts.host_signing_key, &opts.user_signing_key]
        .into_iter()
        .flatten()
    {
        if !key.is_file() {
            bail!("signing key {} does not exist", key.display());
        }
    }
    if let Some(common) = &opts.common_dir {
        if !common.is_dir() {
            bail!("common dir {} does not exist", common.display());
        }
    }
    if opts.deploy {
        govc::check_env()?;
        govc::ensure_tls_trust()?;
    }

    let bu_dir = opts
        .bu_file
        .parent()
        .context("butane file has no parent directory")?;
    let includes = bu_dir.join("includes");
    fs::create_dir_all(&includes)
        .with_context(|| format!("couldn't create {}", includes.display()))?;

    let staging = Staging::new();
    staging.arm_interrupt_cleanup();
    let _guard = staging.guard();

    stage_secrets(&opts, &instance, &includes, &staging)?;

    let ignition = butane::transpile(&opts.bu_file, &includes)?;

    if !opts.deploy {
        let path = butane::write_plain(&opts.bu_file, &instance, &ignition)?;
        println!("{} {}", "wrote".green(), path.display());
        return Ok(());
    }

    let encoded = butane::encode(&ignition)?;
    let artifact = butane::write_encoded(&opts.bu_file, &instance, &encoded)?;
    staging.track(&artifact);

    let client = reqwest::Client::builder().gzip(true).build()?;
    let keyring = image::fetch_signing_key(&client, &opts.download_dir).await?;
    let manifest = image::fetch_stream(&client, &opts.stream, &opts.download_dir).await?;
    let release = manifest.vmware_ova("x86_64")?;
    info!("current {} release: {}", opts.stream, release.version);
    let ova = image::fetch_ova(
        &client,
        &opts.stream,
        &release,
        &opts.download_dir,
        &keyring,
    )
    .await?;

    let item = govc::item_name(&release.version);
    if !govc::library_exists(&opts.library) {
        govc::create_library(&opts.library, opts.datastore.as_deref())?;
    }
    if govc::library_has_item(&opts.library, &item) {
        info!("library item {} already imported", item);
    } else {
        govc::import_ova(&opts.library, &ova, &item)?;
    }

    govc::deploy_from_library(&opts.library, &item, &instance)?;
    govc::set_ignition(&instance, &encoded)?;

    let resources = VmResources::load(&opts.bu_file.with_file_name("resources.json"))?;
    if let Some(resources) = &resources {
        govc::apply_resources(&instance, resources)?;
    }
    let resources = resources.unwrap_or_default();
    govc::ensure_data_disk(
        &instance,
        &format!("{}-docker", instance),
        resources.docker_gib.unwrap_or(10),
    )?;
    govc::ensure_data_disk(
        &instance,
        &format!("{}-data", instance),
        resources.data_gib.unwrap_or(10),
    )?;

    if opts.debug {
        govc::attach_serial_logger(&instance)?;
    }
    govc::power_on(&instance)?;

    println!("{} {}", instance, "deployed".green());
    Ok(())
}

fn stage_secrets(
    opts: &Deploy,
    instance: &str,
    includes: &Path,
    staging: &Staging,
) -> Result<()> {
    keys::generate_host_keys(includes, instance, staging)?;
    if let Some(signing_key) = &opts.host_signing_key {
        for key_type in keys::HOST_KEY_TYPES {
            keys::sign_host_key(
                includes,
                instance,
                key_type,
                signing_key,
                opts.host_signing_pw.as_deref(),
                staging,
            )?;
        }
    }
    if let Some(user_ca) = &opts.user_signing_key {
        keys::stage_user_ca(includes, user_ca, staging)?;
    }
    keys::stage_tls_certs(includes, &opts.tls_certs, &opts.name, staging)?;
    if let Some(common) = &opts.common_dir {
        keys::stage_common(includes, common, staging)?;
    }
    Ok(())
}

pub(crate) async fn remove(opts: Remove) -> Result<()> {
    govc::check_env()?;
    govc::ensure_tls_trust()?;

    let instance = opts.instance();
    let vm = match govc::vm_info(&instance)? {
        Some(vm) => vm,
        None => bail!("no virtual machine named {}", instance),
    };

    let disk_action = if opts.keep_data {
        "detach and keep"
    } else {
        "destroy with VM"
    };

    let mut plan = Table::new();
    plan.add_row(row!["Object", "State", "Action"]);
    plan.add_row(row![instance, vm.runtime.power_state, "destroy"]);
    let mut attached = Vec::new();
    for slot in govc::DATA_DISK_SLOTS {
        if govc::device_exists(&instance, slot) {
            plan.add_row(row![format!("{}/{}", instance, slot), "attached", disk_action]);
            attached.push(slot);
        }
    }
    plan.printstd();

    if !opts.apply {
        println!("{}", "dry-run, pass --apply to make it so".yellow());
        return Ok(());
    }

    govc::power_off(&instance);
    if opts.keep_data {
        for slot in attached {
            govc::detach_disk(&instance, slot)?;
        }
    }
    govc::destroy(&instance)?;

    println!("{} {}", instance, "destroyed".red());
    Ok(())
}
