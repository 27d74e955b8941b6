//! StorageContract parsing and validation
//!
//! A StorageContract (`hostk8s.storage.yaml`) declares the persistent
//! directories a stack needs under the shared `/mnt/pv` mount. Each directory
//! is later realized as a StorageClass + PersistentVolume pair plus a
//! `mkdir`/`chown`/`chmod` inside the Kind node.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::secrets::{CONTRACT_API_VERSION, ContractMetadata};

/// Required prefix for contract directory paths
pub const PV_MOUNT_PREFIX: &str = "/mnt/pv/";

fn default_owner() -> String {
    "1000:1000".to_string()
}

fn default_permissions() -> String {
    "755".to_string()
}

/// A declared persistent directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySpec {
    pub name: String,
    pub path: String,
    pub size: String,
    #[serde(rename = "accessModes")]
    pub access_modes: Vec<String>,
    #[serde(rename = "storageClass")]
    pub storage_class: String,
    #[serde(default = "default_owner")]
    pub owner: String,
    #[serde(default = "default_permissions")]
    pub permissions: String,
}

impl DirectorySpec {
    /// The PersistentVolume name for this directory within a stack
    pub fn pv_name(&self, stack: &str) -> String {
        format!("hostk8s-{stack}-{}-pv", self.name)
    }

    fn validate(&self, index: usize) -> Result<()> {
        let fail = |message: String| Err(CoreError::InvalidContract { message });

        if !self.path.starts_with(PV_MOUNT_PREFIX) {
            return fail(format!(
                "directory {index}: path must start with '{PV_MOUNT_PREFIX}', got '{}'",
                self.path
            ));
        }

        match self.owner.split_once(':') {
            Some((uid, gid))
                if uid.parse::<u32>().is_ok() && gid.parse::<u32>().is_ok() => {}
            _ => {
                return fail(format!(
                    "directory {index}: owner must be numeric 'UID:GID', got '{}'",
                    self.owner
                ));
            }
        }

        if self.permissions.len() != 3 || !self.permissions.chars().all(|c| c.is_ascii_digit()) {
            return fail(format!(
                "directory {index}: permissions must be 3-digit octal, got '{}'",
                self.permissions
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageContractSpec {
    #[serde(default)]
    pub directories: Vec<DirectorySpec>,
}

/// The `hostk8s.storage.yaml` contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageContract {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: ContractMetadata,
    #[serde(default)]
    pub spec: StorageContractSpec,
}

impl StorageContract {
    /// Load and validate a contract file for the given stack
    pub fn load(path: &Path, stack: &str) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::ContractNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let contract: Self = serde_yaml::from_str(&content)?;
        contract.validate(stack)?;
        Ok(contract)
    }

    fn validate(&self, stack: &str) -> Result<()> {
        let fail = |message: String| Err(CoreError::InvalidContract { message });

        if self.api_version != CONTRACT_API_VERSION {
            return fail(format!(
                "storage contract must have apiVersion: {CONTRACT_API_VERSION}"
            ));
        }
        if self.kind != "StorageContract" {
            return fail("storage contract must have kind: StorageContract".to_string());
        }
        if self.metadata.name != stack {
            return fail(format!(
                "storage contract metadata.name must match stack name '{stack}'"
            ));
        }
        if self.spec.directories.is_empty() {
            return fail("storage contract must define at least one directory".to_string());
        }

        let mut names = HashSet::new();
        for (index, directory) in self.spec.directories.iter().enumerate() {
            directory.validate(index)?;
            if !names.insert(directory.name.as_str()) {
                return fail(format!(
                    "directory {index}: duplicate name '{}'",
                    directory.name
                ));
            }
        }

        Ok(())
    }

    /// Unique StorageClass names referenced by the contract, sorted
    pub fn storage_classes(&self) -> Vec<&str> {
        let mut classes: Vec<&str> = self
            .spec
            .directories
            .iter()
            .map(|d| d.storage_class.as_str())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        classes.sort_unstable();
        classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
apiVersion: hostk8s.io/v1
kind: StorageContract
metadata:
  name: sample
spec:
  directories:
    - name: postgres
      path: /mnt/pv/sample/postgres
      size: 5Gi
      accessModes: [ReadWriteOnce]
      storageClass: hostk8s-storage
    - name: redis
      path: /mnt/pv/sample/redis
      size: 1Gi
      accessModes: [ReadWriteOnce]
      storageClass: hostk8s-storage
      owner: "999:999"
      permissions: "700"
"#;

    fn parse(content: &str) -> StorageContract {
        serde_yaml::from_str(content).unwrap()
    }

    #[test]
    fn test_parse_and_validate() {
        let contract = parse(SAMPLE);
        contract.validate("sample").unwrap();
        assert_eq!(contract.spec.directories.len(), 2);
        assert_eq!(contract.spec.directories[0].owner, "1000:1000");
        assert_eq!(contract.spec.directories[0].permissions, "755");
        assert_eq!(contract.spec.directories[1].owner, "999:999");
    }

    #[test]
    fn test_storage_classes_deduplicated() {
        let contract = parse(SAMPLE);
        assert_eq!(contract.storage_classes(), vec!["hostk8s-storage"]);
    }

    #[test]
    fn test_pv_name() {
        let contract = parse(SAMPLE);
        assert_eq!(
            contract.spec.directories[0].pv_name("sample"),
            "hostk8s-sample-postgres-pv"
        );
    }

    #[test]
    fn test_name_mismatch_rejected() {
        let contract = parse(SAMPLE);
        assert!(contract.validate("other").is_err());
    }

    #[test]
    fn test_bad_path_rejected() {
        let contract = parse(&SAMPLE.replace("/mnt/pv/sample/postgres", "/data/postgres"));
        assert!(contract.validate("sample").is_err());
    }

    #[test]
    fn test_bad_owner_rejected() {
        let contract = parse(&SAMPLE.replace("999:999", "redis:redis"));
        assert!(contract.validate("sample").is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let contract = parse(&SAMPLE.replace("name: redis", "name: postgres"));
        assert!(contract.validate("sample").is_err());
    }
}
