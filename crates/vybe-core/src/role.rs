use serde::{Deserialize, Serialize};
use std::fmt;

/// A member role from the fixed role set.
///
/// Any identifier outside this set is rejected by [`Role::parse`]; there is no
/// case folding or trimming.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    #[serde(rename = "solo")]
    Solo,
    #[serde(rename = "dev-1")]
    Dev1,
    #[serde(rename = "dev-2")]
    Dev2,
    #[serde(rename = "dev-3")]
    Dev3,
    #[serde(rename = "dev-4")]
    Dev4,
    #[serde(rename = "dev-5")]
    Dev5,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Solo,
        Role::Dev1,
        Role::Dev2,
        Role::Dev3,
        Role::Dev4,
        Role::Dev5,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Solo => "solo",
            Self::Dev1 => "dev-1",
            Self::Dev2 => "dev-2",
            Self::Dev3 => "dev-3",
            Self::Dev4 => "dev-4",
            Self::Dev5 => "dev-5",
        }
    }

    /// Total parse: every string either names a role exactly or is an error.
    pub fn parse(s: &str) -> Result<Self, RoleError> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| RoleError::Invalid(s.to_string()))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoleError {
    #[error("invalid role: {0:?} (expected one of solo, dev-1..dev-5)")]
    Invalid(String),
}

/// Status half of a role resolution, as persisted in session records.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoleStatus {
    SoloMode,
    Assigned,
    NoRoleSpecified,
    InvalidRole,
}

impl fmt::Display for RoleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SoloMode => write!(f, "solo_mode"),
            Self::Assigned => write!(f, "assigned"),
            Self::NoRoleSpecified => write!(f, "no_role_specified"),
            Self::InvalidRole => write!(f, "invalid_role"),
        }
    }
}

/// Outcome of resolving the member identity for the current process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoleResolution {
    SoloMode,
    Assigned(Role),
    NoRoleSpecified,
    /// Raw selection that did not name a role in the fixed set.
    InvalidRole(String),
}

impl RoleResolution {
    pub fn status(&self) -> RoleStatus {
        match self {
            Self::SoloMode => RoleStatus::SoloMode,
            Self::Assigned(_) => RoleStatus::Assigned,
            Self::NoRoleSpecified => RoleStatus::NoRoleSpecified,
            Self::InvalidRole(_) => RoleStatus::InvalidRole,
        }
    }

    /// Role label recorded alongside the status. `None` only for
    /// `no_role_specified`.
    pub fn role_label(&self) -> Option<String> {
        match self {
            Self::SoloMode => Some(Role::Solo.to_string()),
            Self::Assigned(role) => Some(role.to_string()),
            Self::NoRoleSpecified => None,
            Self::InvalidRole(raw) => Some(raw.clone()),
        }
    }

    pub fn assigned_role(&self) -> Option<Role> {
        match self {
            Self::Assigned(role) => Some(*role),
            _ => None,
        }
    }
}

/// Resolve the member identity from the selection variable and the declared
/// member roles.
///
/// An empty declaration means solo mode regardless of the selection. An empty
/// selection string counts as no selection.
pub fn resolve_role(env_member: Option<&str>, declared_roles: &[String]) -> RoleResolution {
    if declared_roles.is_empty() {
        return RoleResolution::SoloMode;
    }
    match env_member.filter(|s| !s.is_empty()) {
        None => RoleResolution::NoRoleSpecified,
        Some(raw) => match Role::parse(raw) {
            Ok(role) => RoleResolution::Assigned(role),
            Err(_) => RoleResolution::InvalidRole(raw.to_string()),
        },
    }
}
