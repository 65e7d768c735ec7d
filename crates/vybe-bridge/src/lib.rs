pub mod config;
pub mod conflicts;
pub mod deps;
pub mod precompact;
pub mod probe;
pub mod redact;
pub mod roles;
pub mod session;
pub mod validator;

mod admin;
mod dispatch;
mod parse;

pub use admin::{host_registration, install, uninstall, HostRegistration, InstallSummary};
pub use config::HookConfig;
pub use dispatch::{
    hook_entrypoint, run_post_hook, run_pre_hook, run_precompact_hook, HookPhase, HookResult,
};
pub use parse::{HookInput, SessionLogEntry};
pub use probe::{CommandProbe, PathProbe, ProbeReport};
pub use roles::RoleRegistry;
pub use session::SessionStore;
pub use validator::{
    enable_manual_hooks, manual_hooks_enabled, ScriptRunner, ValidateMode, ValidationReport,
    Validator,
};
