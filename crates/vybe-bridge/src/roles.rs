use vybe_core::{resolve_role, RoleResolution};

use crate::config::HookConfig;

/// Declared member roles for the project.
#[derive(Debug, Clone, Default)]
pub struct RoleRegistry {
    declared: Vec<String>,
}

impl RoleRegistry {
    pub fn new(declared: Vec<String>) -> Self {
        Self { declared }
    }

    pub fn from_config(config: &HookConfig) -> Self {
        Self::new(config.members.clone())
    }

    pub fn declared(&self) -> &[String] {
        &self.declared
    }

    pub fn is_multi_member(&self) -> bool {
        !self.declared.is_empty()
    }

    pub fn resolve(&self, env_member: Option<&str>) -> RoleResolution {
        let resolution = resolve_role(env_member, &self.declared);
        if let RoleResolution::Assigned(role) = &resolution {
            if !self.declared.iter().any(|d| d == role.as_str()) {
                tracing::debug!(role = %role, "selected role is not in the declared member list");
            }
        }
        resolution
    }

    /// Human-facing warning for resolutions that need attention.
    pub fn warning(&self, resolution: &RoleResolution) -> Option<String> {
        match resolution {
            RoleResolution::NoRoleSpecified => Some(format!(
                "vybe: {} members configured ({}) but VYBE_MEMBER is not set; \
                 export VYBE_MEMBER=<role> to enable conflict detection",
                self.declared.len(),
                self.declared.join(", ")
            )),
            RoleResolution::InvalidRole(raw) => Some(format!(
                "vybe: VYBE_MEMBER={raw:?} is not a valid role (expected solo, dev-1..dev-5)"
            )),
            RoleResolution::SoloMode | RoleResolution::Assigned(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vybe_core::{Role, RoleStatus};

    #[test]
    fn solo_registry() {
        let reg = RoleRegistry::default();
        assert!(!reg.is_multi_member());
        let r = reg.resolve(Some("dev-1"));
        assert_eq!(r.status(), RoleStatus::SoloMode);
        assert!(reg.warning(&r).is_none());
    }

    #[test]
    fn multi_member_warnings() {
        let reg = RoleRegistry::new(vec!["dev-1".into(), "dev-2".into()]);
        let missing = reg.resolve(None);
        assert!(reg.warning(&missing).unwrap().contains("VYBE_MEMBER is not set"));

        let invalid = reg.resolve(Some("dev-9"));
        assert!(reg.warning(&invalid).unwrap().contains("\"dev-9\""));

        let ok = reg.resolve(Some("dev-2"));
        assert_eq!(ok, RoleResolution::Assigned(Role::Dev2));
        assert!(reg.warning(&ok).is_none());
    }
}
