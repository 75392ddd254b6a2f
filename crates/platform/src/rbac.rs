//! Role checks for tenant memberships.
//!
//! Roles are hierarchical: viewer < editor < admin. Readers need viewer,
//! writers need editor, member and invite management needs admin.

use tlx_core::{Role, TlxError, TlxResult};
use tracing::debug;

pub fn require_role(actual: Role, minimum: Role) -> TlxResult<()> {
    if actual.level() < minimum.level() {
        debug!(actual = %actual, required = %minimum, "Role check failed");
        return Err(TlxError::forbidden("Insufficient permissions"));
    }
    Ok(())
}

/// Parse a role claim coming from a token or request body.
pub fn parse_role(value: &str) -> TlxResult<Role> {
    value
        .parse()
        .map_err(|_| TlxError::bad_request("Invalid role"))
}
