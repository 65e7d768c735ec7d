pub mod graph;
pub mod role;
pub mod session;
pub mod status;

pub use graph::{propagate, DependencyGraph, GraphError, TaskNode, TaskState};
pub use role::{resolve_role, Role, RoleError, RoleResolution, RoleStatus};
pub use session::SessionRecord;
pub use status::{ReadyStatus, Severity};

/// Current time as RFC 3339 (UTC).
pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
