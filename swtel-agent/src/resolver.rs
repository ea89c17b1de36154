//! Interface resolution.
//!
//! At startup the agent finds the two switch ports it cares about by their
//! interface alias: the port whose alias equals the machine identifier, and
//! the port whose alias starts with `uplink`. Both must be found or the agent
//! refuses to start.

use std::fmt;

use swtel_snmp::{Oid, SnmpClient, SnmpError, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

/// IF-MIB::ifAlias, `.1.3.6.1.2.1.31.1.1.1.18`
pub const IF_ALIAS: [u32; 11] = [1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 18];

/// IF-MIB::ifDescr, `.1.3.6.1.2.1.2.2.1.2`
pub const IF_DESCR: [u32; 10] = [1, 3, 6, 1, 2, 1, 2, 2, 1, 2];

/// Alias prefix marking the switch uplink.
pub const UPLINK_ALIAS_PREFIX: &str = "uplink";

/// Which physical interface a counter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// The port the node itself is connected to.
    Machine,
    /// The switch's uplink port.
    Uplink,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Machine, Role::Uplink];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Machine => "machine",
            Role::Uplink => "uplink",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A resolved interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceBinding {
    pub role: Role,
    /// ifIndex of the port.
    pub index: u32,
    /// ifDescr of the port, e.g. `xe-0/0/12`.
    pub description: String,
    /// ifAlias that matched.
    pub alias: String,
}

/// Both resolved interfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interfaces {
    pub machine: InterfaceBinding,
    pub uplink: InterfaceBinding,
}

impl Interfaces {
    pub fn get(&self, role: Role) -> &InterfaceBinding {
        match role {
            Role::Machine => &self.machine,
            Role::Uplink => &self.uplink,
        }
    }

    /// Bindings in role order.
    pub fn iter(&self) -> impl Iterator<Item = &InterfaceBinding> {
        Role::ALL.into_iter().map(move |role| self.get(role))
    }
}

/// Errors from interface resolution. All are fatal at startup.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to walk ifAlias: {0}")]
    Walk(#[source] SnmpError),

    #[error("no interface found for role {0}")]
    Missing(Role),

    #[error("failed to read ifDescr: {0}")]
    Describe(#[source] SnmpError),

    #[error("no ifDescr for {role} interface {index}: got {found}")]
    MissingDescription {
        role: Role,
        index: u32,
        found: String,
    },
}

/// A matched alias before its description is known.
#[derive(Debug, Clone)]
struct Candidate {
    index: u32,
    alias: String,
}

fn classify(alias: &str, machine: &str) -> Option<Role> {
    if alias == machine {
        Some(Role::Machine)
    } else if alias.starts_with(UPLINK_ALIAS_PREFIX) {
        Some(Role::Uplink)
    } else {
        None
    }
}

/// Resolve the machine and uplink interfaces of `machine`.
///
/// The last alias match per role in walk order wins; replaced matches are
/// logged.
pub fn resolve_interfaces<C>(client: &C, machine: &str) -> Result<Interfaces, ResolveError>
where
    C: SnmpClient + ?Sized,
{
    let alias_oid = Oid::new(IF_ALIAS.to_vec());
    let descr_oid = Oid::new(IF_DESCR.to_vec());

    let aliases = client.walk(&alias_oid).map_err(ResolveError::Walk)?;
    debug!(entries = aliases.len(), "walked ifAlias");

    let mut machine_match: Option<Candidate> = None;
    let mut uplink_match: Option<Candidate> = None;

    for vb in aliases {
        let Some(text) = vb.value.as_text() else {
            debug!(oid = %vb.name, kind = vb.value.type_name(), "skipping non-string alias");
            continue;
        };
        let alias = text.trim();
        let Some(role) = classify(alias, machine) else {
            continue;
        };
        let Some(index) = vb.name.last() else {
            continue;
        };

        let slot = match role {
            Role::Machine => &mut machine_match,
            Role::Uplink => &mut uplink_match,
        };
        let replaced = slot.replace(Candidate {
            index,
            alias: alias.to_string(),
        });
        if let Some(previous) = replaced {
            warn!(
                %role,
                replaced = previous.index,
                kept = index,
                alias,
                "duplicate interface alias, using later match"
            );
        }
    }

    let machine_match = machine_match.ok_or(ResolveError::Missing(Role::Machine))?;
    let uplink_match = uplink_match.ok_or(ResolveError::Missing(Role::Uplink))?;

    let names = [
        descr_oid.child(machine_match.index),
        descr_oid.child(uplink_match.index),
    ];
    let descriptions = client.get(&names).map_err(ResolveError::Describe)?;

    let describe = |role: Role, candidate: Candidate, name: &Oid| {
        let value = descriptions
            .iter()
            .find(|vb| &vb.name == name)
            .map(|vb| &vb.value);
        match value.and_then(Value::as_text) {
            Some(description) if !description.trim().is_empty() => Ok(InterfaceBinding {
                role,
                index: candidate.index,
                description,
                alias: candidate.alias,
            }),
            _ => Err(ResolveError::MissingDescription {
                role,
                index: candidate.index,
                found: value.map_or_else(|| "nothing".to_string(), |v| v.to_string()),
            }),
        }
    };

    let interfaces = Interfaces {
        machine: describe(Role::Machine, machine_match, &names[0])?,
        uplink: describe(Role::Uplink, uplink_match, &names[1])?,
    };

    for binding in interfaces.iter() {
        info!(
            role = %binding.role,
            index = binding.index,
            description = %binding.description,
            alias = %binding.alias,
            "resolved interface"
        );
    }

    Ok(interfaces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use swtel_snmp::MockSnmpClient;

    fn oid(s: &str) -> Oid {
        s.parse().expect("valid oid")
    }

    fn text(s: &str) -> Value {
        Value::OctetString(s.as_bytes().to_vec())
    }

    /// Switch with the node on port 524 and the uplink on 568.
    fn switch() -> MockSnmpClient {
        MockSnmpClient::with_values([
            (oid(".1.3.6.1.2.1.31.1.1.1.18.500"), text("")),
            (oid(".1.3.6.1.2.1.31.1.1.1.18.524"), text(" mlab2 ")),
            (oid(".1.3.6.1.2.1.31.1.1.1.18.530"), text("mlab3")),
            (oid(".1.3.6.1.2.1.31.1.1.1.18.568"), text("uplink-10g")),
            (oid(".1.3.6.1.2.1.2.2.1.2.524"), text("xe-0/0/12")),
            (oid(".1.3.6.1.2.1.2.2.1.2.530"), text("xe-0/0/13")),
            (oid(".1.3.6.1.2.1.2.2.1.2.568"), text("xe-0/0/45")),
        ])
    }

    #[test]
    fn test_resolves_both_roles() {
        let interfaces = resolve_interfaces(&switch(), "mlab2").expect("resolve");

        assert_eq!(interfaces.machine.index, 524);
        assert_eq!(interfaces.machine.description, "xe-0/0/12");
        assert_eq!(interfaces.machine.alias, "mlab2");
        assert_eq!(interfaces.uplink.index, 568);
        assert_eq!(interfaces.uplink.description, "xe-0/0/45");
        assert_eq!(interfaces.uplink.alias, "uplink-10g");
    }

    #[test]
    fn test_machine_match_is_exact() {
        let interfaces = resolve_interfaces(&switch(), "mlab3").expect("resolve");
        assert_eq!(interfaces.machine.index, 530);
    }

    #[test]
    fn test_missing_machine_is_fatal() {
        let err = resolve_interfaces(&switch(), "mlab9").unwrap_err();
        assert!(matches!(err, ResolveError::Missing(Role::Machine)));
    }

    #[test]
    fn test_missing_uplink_is_fatal() {
        let client = MockSnmpClient::with_values([
            (oid(".1.3.6.1.2.1.31.1.1.1.18.524"), text("mlab2")),
            (oid(".1.3.6.1.2.1.2.2.1.2.524"), text("xe-0/0/12")),
        ]);
        let err = resolve_interfaces(&client, "mlab2").unwrap_err();
        assert!(matches!(err, ResolveError::Missing(Role::Uplink)));
        assert_eq!(err.to_string(), "no interface found for role uplink");
    }

    #[test]
    fn test_last_uplink_wins() {
        let client = switch();
        client.set(oid(".1.3.6.1.2.1.31.1.1.1.18.600"), text("uplink-backup"));
        client.set(oid(".1.3.6.1.2.1.2.2.1.2.600"), text("xe-0/0/47"));

        let interfaces = resolve_interfaces(&client, "mlab2").expect("resolve");
        assert_eq!(interfaces.uplink.index, 600);
        assert_eq!(interfaces.uplink.alias, "uplink-backup");
        assert_eq!(interfaces.uplink.description, "xe-0/0/47");
        assert_eq!(interfaces.machine.index, 524);
    }

    #[test]
    fn test_last_machine_match_wins() {
        let client = switch();
        client.set(oid(".1.3.6.1.2.1.31.1.1.1.18.700"), text("mlab2"));
        client.set(oid(".1.3.6.1.2.1.2.2.1.2.700"), text("xe-0/0/50"));

        let interfaces = resolve_interfaces(&client, "mlab2").expect("resolve");
        assert_eq!(interfaces.machine.index, 700);
        assert_eq!(interfaces.machine.description, "xe-0/0/50");
    }

    #[test]
    fn test_non_string_alias_skipped() {
        let client = switch();
        client.set(oid(".1.3.6.1.2.1.31.1.1.1.18.1"), Value::Integer(7));
        assert!(resolve_interfaces(&client, "mlab2").is_ok());
    }

    #[test]
    fn test_missing_description_is_fatal() {
        let client = MockSnmpClient::with_values([
            (oid(".1.3.6.1.2.1.31.1.1.1.18.524"), text("mlab2")),
            (oid(".1.3.6.1.2.1.31.1.1.1.18.568"), text("uplink")),
            (oid(".1.3.6.1.2.1.2.2.1.2.524"), text("xe-0/0/12")),
        ]);
        match resolve_interfaces(&client, "mlab2").unwrap_err() {
            ResolveError::MissingDescription { role, index, found } => {
                assert_eq!(role, Role::Uplink);
                assert_eq!(index, 568);
                assert_eq!(found, "noSuchInstance");
            }
            other => panic!("expected missing description, got {other:?}"),
        }
    }

    #[test]
    fn test_walk_failure() {
        let client = switch();
        client.set_walk_error(Some("unreachable"));
        assert!(matches!(
            resolve_interfaces(&client, "mlab2"),
            Err(ResolveError::Walk(_))
        ));
    }

    #[test]
    fn test_describe_failure() {
        let client = switch();
        client.fail_next_get("timeout");
        assert!(matches!(
            resolve_interfaces(&client, "mlab2"),
            Err(ResolveError::Describe(_))
        ));
    }

    #[test]
    fn test_interfaces_iter_order() {
        let interfaces = resolve_interfaces(&switch(), "mlab2").expect("resolve");
        let roles: Vec<Role> = interfaces.iter().map(|b| b.role).collect();
        assert_eq!(roles, vec![Role::Machine, Role::Uplink]);
    }

    #[test]
    fn test_table_oids() {
        assert_eq!(Oid::new(IF_ALIAS.to_vec()).to_string(), ".1.3.6.1.2.1.31.1.1.1.18");
        assert_eq!(Oid::new(IF_DESCR.to_vec()).to_string(), ".1.3.6.1.2.1.2.2.1.2");
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Machine.to_string(), "machine");
        assert_eq!(Role::Uplink.as_str(), "uplink");
    }
}
