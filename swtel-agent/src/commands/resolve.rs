//! Resolve command.
//!
//! Runs only the startup interface lookup, for checking a switch's alias
//! configuration without starting the agent.

use swtel_snmp::SnmpClient;

use crate::cli::ResolveArgs;
use crate::node::NodeIdentity;
use crate::resolver::{resolve_interfaces, Interfaces};

use super::CommandResult;

/// Result of resolve command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveResult {
    pub identity: NodeIdentity,
    pub interfaces: Interfaces,
}

/// Execute the resolve command against an already connected `client`.
pub fn execute_resolve<S: SnmpClient>(args: &ResolveArgs, client: &S) -> CommandResult<ResolveResult> {
    args.validate()?;
    let identity = args.switch.identity()?;
    let interfaces = resolve_interfaces(client, &identity.machine)?;
    Ok(ResolveResult {
        identity,
        interfaces,
    })
}
