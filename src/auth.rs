use std::collections::HashSet;
use tracing::warn;

/// Identity and permission context of the user invoking an operation, as
/// delivered by the command gateway. Trusted as given.
#[derive(Debug, Clone)]
pub struct Actor {
    /// Stable opaque identity string (Discord user ID).
    pub identity: String,

    /// Role identities the actor currently holds.
    pub roles: Vec<String>,

    /// Whether the platform grants the actor elevated (manage-server)
    /// permission independent of any role.
    pub has_elevated_permission: bool,
}

impl Actor {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            roles: Vec::new(),
            has_elevated_permission: false,
        }
    }
}

/// Decides whether an actor may perform privileged operations.
///
/// Pure: no I/O, no side effects. Every privileged engine operation calls
/// this before touching any state.
#[derive(Debug, Clone, Default)]
pub struct AuthGate {
    privileged_roles: HashSet<String>,
}

impl AuthGate {
    pub fn new(privileged_roles: impl IntoIterator<Item = String>) -> Self {
        Self {
            privileged_roles: privileged_roles.into_iter().collect(),
        }
    }

    /// Read the staff role set from STAFF_ROLE_IDS (comma-separated role IDs).
    pub fn from_env() -> Self {
        let roles: HashSet<String> = std::env::var("STAFF_ROLE_IDS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if roles.is_empty() {
            warn!("STAFF_ROLE_IDS is empty; only members with Manage Server can use staff commands");
        }

        Self {
            privileged_roles: roles,
        }
    }

    pub fn is_privileged(&self, actor: &Actor) -> bool {
        actor.has_elevated_permission
            || actor
                .roles
                .iter()
                .any(|role| self.privileged_roles.contains(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> AuthGate {
        AuthGate::new(vec!["mod-role".to_string(), "judge-role".to_string()])
    }

    #[test]
    fn test_elevated_permission_is_privileged() {
        let mut actor = Actor::new("u1");
        actor.has_elevated_permission = true;
        assert!(gate().is_privileged(&actor));
    }

    #[test]
    fn test_privileged_role_is_privileged() {
        let mut actor = Actor::new("u1");
        actor.roles = vec!["other".to_string(), "judge-role".to_string()];
        assert!(gate().is_privileged(&actor));
    }

    #[test]
    fn test_plain_actor_is_denied() {
        let mut actor = Actor::new("u1");
        actor.roles = vec!["other".to_string()];
        assert!(!gate().is_privileged(&actor));
        assert!(!AuthGate::default().is_privileged(&actor));
    }
}
