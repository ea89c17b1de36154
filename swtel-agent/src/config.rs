//! Metric definition file loader.
//!
//! The file is a YAML sequence; every entry names one interface counter
//! column and the archive metric names for the two interface roles:
//!
//! ```yaml
//! - name: ifHCInOctets
//!   description: Ingress octets.
//!   oidStub: .1.3.6.1.2.1.31.1.1.1.6
//!   mlabUplinkName: switch.octets.uplink.rx
//!   mlabMachineName: switch.octets.local.rx
//! ```
//!
//! Unknown fields are rejected.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Deserializer};
use swtel_fs::{Filesystem, FsError};
use swtel_snmp::Oid;
use thiserror::Error;

use crate::resolver::Role;

/// Errors from metric file loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read metrics file: {0}")]
    Read(#[from] FsError),

    #[error("failed to parse metrics file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("metrics file defines no metrics")]
    Empty,

    #[error("metric #{index} ({name:?}): {reason}")]
    Invalid {
        index: usize,
        name: String,
        reason: String,
    },
}

/// One polled counter column.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricDefinition {
    /// Exported counter name.
    pub name: String,
    /// Help text of the exported counter.
    pub description: String,
    /// Column OID; the interface index is appended to it.
    #[serde(rename = "oidStub", deserialize_with = "deserialize_oid")]
    pub oid_stub: Oid,
    /// Archive metric name for the uplink interface.
    #[serde(rename = "mlabUplinkName")]
    pub uplink_name: String,
    /// Archive metric name for the node's own interface.
    #[serde(rename = "mlabMachineName")]
    pub machine_name: String,
}

impl MetricDefinition {
    /// Archive metric name for a role.
    pub fn output_name(&self, role: Role) -> &str {
        match role {
            Role::Machine => &self.machine_name,
            Role::Uplink => &self.uplink_name,
        }
    }
}

fn deserialize_oid<'de, D>(deserializer: D) -> Result<Oid, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

/// Load and validate metric definitions from a file.
pub fn load_metrics<F: Filesystem>(fs: &F, path: &Path) -> Result<Vec<MetricDefinition>, ConfigError> {
    let content = fs.read_file(path)?;
    parse_metrics(&content)
}

/// Parse and validate metric definitions.
pub fn parse_metrics(content: &str) -> Result<Vec<MetricDefinition>, ConfigError> {
    let definitions: Vec<MetricDefinition> = serde_yaml::from_str(content)?;
    validate(&definitions)?;
    Ok(definitions)
}

fn validate(definitions: &[MetricDefinition]) -> Result<(), ConfigError> {
    if definitions.is_empty() {
        return Err(ConfigError::Empty);
    }

    let mut names = HashSet::new();
    let mut stubs = HashSet::new();
    for (i, def) in definitions.iter().enumerate() {
        let invalid = |reason: &str| ConfigError::Invalid {
            index: i + 1,
            name: def.name.clone(),
            reason: reason.to_string(),
        };

        if !is_valid_metric_name(&def.name) {
            return Err(invalid("name is not a valid Prometheus metric name"));
        }
        if def.description.trim().is_empty() {
            return Err(invalid("description is empty"));
        }
        if def.uplink_name.trim().is_empty() || def.machine_name.trim().is_empty() {
            return Err(invalid("output names must not be empty"));
        }
        if def.uplink_name == def.machine_name {
            return Err(invalid("uplink and machine output names are identical"));
        }
        if !names.insert(def.name.as_str()) {
            return Err(invalid("duplicate name"));
        }
        if !stubs.insert(&def.oid_stub) {
            return Err(invalid("duplicate oidStub"));
        }
    }
    Ok(())
}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use swtel_fs::MockFilesystem;

    const GOOD: &str = r#"
- name: ifHCInOctets
  description: Ingress octets.
  oidStub: .1.3.6.1.2.1.31.1.1.1.6
  mlabUplinkName: switch.octets.uplink.rx
  mlabMachineName: switch.octets.local.rx
- name: ifHCOutUcastPkts
  description: Egress unicast packets.
  oidStub: 1.3.6.1.2.1.31.1.1.1.11
  mlabUplinkName: switch.unicast.uplink.tx
  mlabMachineName: switch.unicast.local.tx
"#;

    #[test]
    fn test_parse_good_file() {
        let defs = parse_metrics(GOOD).expect("parse");
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "ifHCInOctets");
        assert_eq!(defs[0].oid_stub.to_string(), ".1.3.6.1.2.1.31.1.1.1.6");
        assert_eq!(defs[1].oid_stub.to_string(), ".1.3.6.1.2.1.31.1.1.1.11");
        assert_eq!(defs[1].machine_name, "switch.unicast.local.tx");
    }

    #[test]
    fn test_output_name_by_role() {
        let defs = parse_metrics(GOOD).expect("parse");
        assert_eq!(defs[0].output_name(Role::Machine), "switch.octets.local.rx");
        assert_eq!(defs[0].output_name(Role::Uplink), "switch.octets.uplink.rx");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = r#"
- badName: ifHCOutUcastPkts
  description: Egress unicast packets.
  oidStub: .1.3.6.1.2.1.31.1.1.1.11
  mlabUplinkName: switch.unicast.uplink.tx
  mlabMachineName: switch.unicast.local.tx
"#;
        assert!(matches!(parse_metrics(yaml), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_field_rejected() {
        let yaml = "- name: x\n  description: d\n  oidStub: .1.3\n  mlabUplinkName: u\n";
        assert!(matches!(parse_metrics(yaml), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_bad_oid_rejected() {
        let yaml = "- name: x\n  description: d\n  oidStub: .1.3.x\n  mlabUplinkName: u\n  mlabMachineName: m\n";
        let err = parse_metrics(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("1.3.x"));
    }

    #[test]
    fn test_empty_list_rejected() {
        assert!(matches!(parse_metrics("[]"), Err(ConfigError::Empty)));
    }

    #[test]
    fn test_not_a_sequence_rejected() {
        assert!(matches!(parse_metrics("name: x"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_invalid_metric_name() {
        let yaml = "- name: if-in-octets\n  description: d\n  oidStub: .1.3\n  mlabUplinkName: u\n  mlabMachineName: m\n";
        match parse_metrics(yaml) {
            Err(ConfigError::Invalid { index, name, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(name, "if-in-octets");
            }
            other => panic!("expected invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_description_rejected() {
        let yaml = "- name: x\n  description: ''\n  oidStub: .1.3\n  mlabUplinkName: u\n  mlabMachineName: m\n";
        assert!(matches!(parse_metrics(yaml), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_identical_output_names_rejected() {
        let yaml = "- name: x\n  description: d\n  oidStub: .1.3\n  mlabUplinkName: same\n  mlabMachineName: same\n";
        assert!(matches!(parse_metrics(yaml), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_duplicates_rejected() {
        let dup_name = format!(
            "{GOOD}- name: ifHCInOctets\n  description: d\n  oidStub: .1.3.9\n  mlabUplinkName: a\n  mlabMachineName: b\n"
        );
        assert!(matches!(parse_metrics(&dup_name), Err(ConfigError::Invalid { index: 3, .. })));

        let dup_stub = format!(
            "{GOOD}- name: other\n  description: d\n  oidStub: 1.3.6.1.2.1.31.1.1.1.6\n  mlabUplinkName: a\n  mlabMachineName: b\n"
        );
        assert!(matches!(parse_metrics(&dup_stub), Err(ConfigError::Invalid { index: 3, .. })));
    }

    #[test]
    fn test_metric_name_rules() {
        assert!(is_valid_metric_name("ifHCInOctets"));
        assert!(is_valid_metric_name("_x:y_1"));
        assert!(!is_valid_metric_name(""));
        assert!(!is_valid_metric_name("1abc"));
        assert!(!is_valid_metric_name("a.b"));
    }

    #[test]
    fn test_load_from_filesystem() {
        let fs = MockFilesystem::new();
        let path = PathBuf::from("/etc/swtel/metrics.yaml");
        fs.add_file(path.clone(), GOOD.as_bytes().to_vec());

        let defs = load_metrics(&fs, &path).expect("load");
        assert_eq!(defs.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let fs = MockFilesystem::new();
        let result = load_metrics(&fs, Path::new("/does/not/exist.yaml"));
        assert!(matches!(result, Err(ConfigError::Read(_))));
    }
}
