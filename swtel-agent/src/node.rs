//! Node identity derived from the node's FQDN.
//!
//! Hostnames follow `<machine>-<site>.<project>.<domain>`, for example
//! `mlab2-abc0t.mlab-sandbox.measurement-lab.org`. The machine identifier is
//! what the switch carries as the interface alias of the node's port, and the
//! site names the switch when no target is given.

use crate::cli::CliError;

/// Domain of switches derived from a site name.
pub const DEFAULT_TARGET_DOMAIN: &str = "measurement-lab.org";

/// Who we are and which switch we poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    /// FQDN of the node, used for archive paths and the `node` label.
    pub hostname: String,
    /// Machine identifier matched against interface aliases.
    pub machine: String,
    /// Switch to poll; also the `experiment` field of archived documents.
    pub target: String,
}

impl NodeIdentity {
    /// Build the identity, deriving the target from the hostname when it is
    /// not given explicitly.
    pub fn new(hostname: &str, target: Option<&str>) -> Result<Self, CliError> {
        let hostname = hostname.trim();
        if !is_path_safe(hostname) {
            return Err(CliError::InvalidHostname(hostname.to_string()));
        }
        let machine = machine_id(hostname)?.to_string();
        let target = match target.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => t.to_string(),
            None => derive_target(hostname)?,
        };
        Ok(Self {
            hostname: hostname.to_string(),
            machine,
            target,
        })
    }
}

/// The hostname names a directory under the archive root, so it must stay a
/// single path component.
fn is_path_safe(hostname: &str) -> bool {
    !hostname.contains(['/', '\\']) && !hostname.contains("..")
}

/// The hostname component before the first `-`.
pub fn machine_id(hostname: &str) -> Result<&str, CliError> {
    match hostname.split_once('-') {
        Some((machine, _)) if !machine.is_empty() && !machine.contains('.') => Ok(machine),
        _ => Err(CliError::InvalidHostname(hostname.to_string())),
    }
}

/// The site component between the first `-` and the following `.`.
pub fn site_id(hostname: &str) -> Result<&str, CliError> {
    let (_, rest) = hostname
        .split_once('-')
        .ok_or_else(|| CliError::InvalidHostname(hostname.to_string()))?;
    match rest.split_once('.') {
        Some((site, _)) if !site.is_empty() => Ok(site),
        _ => Err(CliError::InvalidHostname(hostname.to_string())),
    }
}

/// `s1-<site>.measurement-lab.org`
pub fn derive_target(hostname: &str) -> Result<String, CliError> {
    Ok(format!("s1-{}.{}", site_id(hostname)?, DEFAULT_TARGET_DOMAIN))
}
