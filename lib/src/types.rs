use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::DeployError;

/// Top level of a CoreOS stream metadata document, e.g.
/// `https://builds.coreos.fedoraproject.org/streams/stable.json`.
#[derive(Debug, Deserialize)]
pub struct StreamManifest {
    pub stream: String,
    pub architectures: HashMap<String, Architecture>,
}

#[derive(Debug, Deserialize)]
pub struct Architecture {
    pub artifacts: HashMap<String, PlatformArtifacts>,
}

#[derive(Debug, Deserialize)]
pub struct PlatformArtifacts {
    pub release: String,
    pub formats: HashMap<String, FormatArtifacts>,
}

#[derive(Debug, Deserialize)]
pub struct FormatArtifacts {
    pub disk: Option<ArtifactRef>,
}

#[derive(Debug, Deserialize)]
pub struct ArtifactRef {
    pub location: String,
    pub signature: String,
    pub sha256: String,
    #[serde(rename = "uncompressed-sha256")]
    pub uncompressed_sha256: Option<String>,
}

/// Everything the deploy flow needs to know about one published OVA.
#[derive(Debug, Clone, PartialEq)]
pub struct OvaRelease {
    pub version: String,
    pub location: String,
    pub signature: String,
    pub sha256: String,
}

impl StreamManifest {
    /// Walk down to the vmware OVA published for an architecture.
    pub fn vmware_ova(&self, arch: &str) -> Result<OvaRelease, DeployError> {
        let platform = self
            .architectures
            .get(arch)
            .and_then(|architecture| architecture.artifacts.get("vmware"))
            .ok_or_else(|| DeployError::NoArtifact(format!("{}/{}", self.stream, arch)))?;

        let disk = platform
            .formats
            .get("ova")
            .and_then(|format| format.disk.as_ref())
            .ok_or_else(|| DeployError::NoArtifact(format!("{}/{}/ova", self.stream, arch)))?;

        Ok(OvaRelease {
            version: platform.release.clone(),
            location: disk.location.clone(),
            signature: disk.signature.clone(),
            sha256: disk.sha256.clone(),
        })
    }
}

/// Hardware overrides read from an optional `resources.json` next to the
/// Butane source.
#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct VmResources {
    pub cpus: Option<u32>,
    pub memory_mib: Option<u64>,
    pub root_gib: Option<u64>,
    pub docker_gib: Option<u64>,
    pub data_gib: Option<u64>,
}

impl VmResources {
    /// Load the sibling resources file when present.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.is_file() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("couldn't read {}", path.display()))?;
        let resources = serde_json::from_str(&raw)
            .with_context(|| format!("couldn't parse {}", path.display()))?;
        Ok(Some(resources))
    }
}

/// A VM name plus the optional prefix that together form the name of the
/// instance on the hypervisor.
#[derive(Debug, Clone)]
pub struct VmName {
    name: String,
    prefix: Option<String>,
}

impl VmName {
    pub fn new(name: impl Into<String>, prefix: Option<String>) -> Self {
        VmName {
            name: name.into(),
            prefix,
        }
    }

    pub fn instance(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}-{}", prefix, self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for VmName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.instance())
    }
}

// govc switched its -json output to camelCase in 0.29; accept both.
#[derive(Debug, Deserialize)]
pub struct VmInfoList {
    #[serde(rename = "VirtualMachines", alias = "virtualMachines")]
    pub virtual_machines: Option<Vec<VmInfo>>,
}

#[derive(Debug, Deserialize)]
pub struct VmInfo {
    #[serde(rename = "Name", alias = "name")]
    pub name: String,
    #[serde(rename = "Runtime", alias = "runtime")]
    pub runtime: VmRuntime,
}

#[derive(Debug, Deserialize)]
pub struct VmRuntime {
    #[serde(rename = "PowerState", alias = "powerState")]
    pub power_state: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MANIFEST: &str = r#"{
      "stream": "stable",
      "architectures": {
        "x86_64": {
          "artifacts": {
            "vmware": {
              "release": "39.20240210.3.0",
              "formats": {
                "ova": {
                  "disk": {
                    "location": "https://example.com/fedora-coreos-39.20240210.3.0-vmware.x86_64.ova",
                    "signature": "https://example.com/fedora-coreos-39.20240210.3.0-vmware.x86_64.ova.sig",
                    "sha256": "0123456789abcdef"
                  }
                }
              }
            }
          }
        }
      }
    }"#;

    #[test]
    fn test_vmware_ova_lookup() {
        let manifest: StreamManifest = serde_json::from_str(MANIFEST).unwrap();
        let release = manifest.vmware_ova("x86_64").unwrap();
        assert_eq!(release.version, "39.20240210.3.0");
        assert_eq!(release.sha256, "0123456789abcdef");
        assert!(release.signature.ends_with(".ova.sig"));
    }

    #[test]
    fn test_vmware_ova_unknown_arch() {
        let manifest: StreamManifest = serde_json::from_str(MANIFEST).unwrap();
        let err = manifest.vmware_ova("s390x").unwrap_err();
        assert_eq!(err.to_string(), "no vmware ova published for stable/s390x");
    }

    #[test]
    fn test_resources_partial() {
        let resources: VmResources =
            serde_json::from_str(r#"{"cpus": 4, "memory_mib": 8192}"#).unwrap();
        assert_eq!(resources.cpus, Some(4));
        assert_eq!(resources.memory_mib, Some(8192));
        assert_eq!(resources.data_gib, None);
    }

    #[test]
    fn test_resources_absent_file() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = VmResources::load(&dir.path().join("resources.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_vm_info_accepts_both_casings() {
        let pascal =
            r#"{"VirtualMachines":[{"Name":"core","Runtime":{"PowerState":"poweredOn"}}]}"#;
        let list: VmInfoList = serde_json::from_str(pascal).unwrap();
        assert_eq!(
            list.virtual_machines.unwrap()[0].runtime.power_state,
            "poweredOn"
        );

        let camel =
            r#"{"virtualMachines":[{"name":"core","runtime":{"powerState":"poweredOff"}}]}"#;
        let list: VmInfoList = serde_json::from_str(camel).unwrap();
        assert_eq!(list.virtual_machines.unwrap()[0].name, "core");
    }

    #[test]
    fn test_instance_name() {
        assert_eq!(VmName::new("core", None).instance(), "core");
        assert_eq!(
            VmName::new("core", Some("lab".to_string())).instance(),
            "lab-core"
        );
    }
}
