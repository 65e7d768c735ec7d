use std::path::Path;

use vybe_core::{now_rfc3339, RoleResolution};
use vybe_store::{ContextPaths, FileStore};

use crate::config::HookConfig;
use crate::conflicts::ConflictDetector;
use crate::deps::update_dependencies;
use crate::parse::{append_session_log, HookInput, SessionLogEntry};
use crate::precompact::{save_checkpoint, PrecompactInput};
use crate::roles::RoleRegistry;
use crate::session::SessionStore;

// ── Hook Result ──

/// Output of a hook run. The caller prints `stdout`/`stderr` and always
/// exits 0.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HookResult {
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl HookResult {
    pub fn output(stdout: String) -> Self {
        Self {
            stdout: Some(stdout),
            stderr: None,
        }
    }

    pub fn warning(msg: String) -> Self {
        Self {
            stdout: None,
            stderr: Some(msg),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        if !warnings.is_empty() {
            let joined = warnings.join("\n");
            self.stderr = Some(match self.stderr.take() {
                Some(existing) => format!("{existing}\n{joined}"),
                None => joined,
            });
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    Pre,
    Post,
    Precompact,
}

impl HookPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::Post => "post",
            Self::Precompact => "precompact",
        }
    }
}

// ── Shared state for one hook run ──

struct HookContext {
    paths: ContextPaths,
    registry: RoleRegistry,
    role: RoleResolution,
}

impl HookContext {
    fn new(config: &HookConfig, member: Option<&str>) -> Self {
        let registry = RoleRegistry::from_config(config);
        let role = registry.resolve(member);
        Self {
            paths: config.paths(),
            registry,
            role,
        }
    }

    fn sessions(&self) -> SessionStore<FileStore> {
        SessionStore::new(FileStore::new(self.paths.sessions_dir()))
    }

    fn log(&self, event: &str, input: &HookInput, exit_code: Option<i32>) -> anyhow::Result<()> {
        append_session_log(
            &self.paths,
            &SessionLogEntry {
                ts: now_rfc3339(),
                event: event.to_string(),
                session_id: input.session_id.clone(),
                tool_name: input.tool_name.clone(),
                member_role: self.role.role_label(),
                member_status: Some(self.role.status()),
                exit_code,
            },
        )
    }
}

/// Record a failed step as a warning and keep going.
fn soft<T>(warnings: &mut Vec<String>, step: &str, result: anyhow::Result<T>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(step, error = %e, "hook step failed");
            warnings.push(format!("vybe: {step} failed: {e:#}"));
            None
        }
    }
}

// ── Hook dispatch ──

/// Pre-tool hook: create or refresh the session record and report role problems.
pub fn run_pre_hook(config: &HookConfig, input: &HookInput) -> HookResult {
    let ctx = HookContext::new(config, input.member.as_deref());
    let mut warnings = Vec::new();

    soft(&mut warnings, "context directory setup", ctx.paths.ensure_dirs());
    if let Some(w) = ctx.registry.warning(&ctx.role) {
        warnings.push(w);
    }
    soft(
        &mut warnings,
        "session record update",
        ctx.sessions().touch_pre(
            &input.session_id,
            &input.tool_name,
            &ctx.role,
            input.tool_args.as_deref(),
        ),
    );
    soft(&mut warnings, "session log", ctx.log("pre", input, None));

    HookResult::empty().with_warnings(warnings)
}

/// Post-tool hook: merge completion, propagate task readiness, and relay
/// conflicts when several members are configured. Each step runs even if an
/// earlier one failed.
pub fn run_post_hook(config: &HookConfig, input: &HookInput) -> HookResult {
    let ctx = HookContext::new(config, input.member.as_deref());
    let mut warnings = Vec::new();

    soft(&mut warnings, "context directory setup", ctx.paths.ensure_dirs());
    soft(
        &mut warnings,
        "session record update",
        ctx.sessions()
            .touch_post(&input.session_id, &input.tool_name, input.exit_code),
    );
    soft(
        &mut warnings,
        "session log",
        ctx.log("post", input, Some(input.exit_code)),
    );

    let graph_store = FileStore::new(&ctx.paths.root);
    if let Some(Some(outcome)) = soft(
        &mut warnings,
        "dependency update",
        update_dependencies(&graph_store),
    ) {
        warnings.extend(outcome.warnings());
    }

    if ctx.registry.is_multi_member() {
        if let Some(w) = ctx.registry.warning(&ctx.role) {
            warnings.push(w);
        }
        let records = FileStore::new(ctx.paths.conflicts_dir());
        let detector = ConflictDetector::new(&records, &ctx.paths);
        if let Some(report) = soft(
            &mut warnings,
            "conflict detection",
            detector.detect(&ctx.role, &input.session_id, &input.tool_name),
        ) {
            warnings.extend(report.render());
        }
    }

    HookResult::empty().with_warnings(warnings)
}

/// Pre-compaction hook: write the checkpoint and print continuation
/// instructions on stdout.
pub fn run_precompact_hook(config: &HookConfig, stdin: &str, member: Option<&str>) -> HookResult {
    let ctx = HookContext::new(config, member);
    let input = PrecompactInput::from_stdin(stdin);
    match save_checkpoint(config, &input, &ctx.role) {
        Ok((_, files, instructions)) => HookResult::output(format!(
            "{instructions}\nInstructions saved to: {}",
            files.instructions.display()
        )),
        Err(e) => HookResult::warning(format!("vybe: precompact checkpoint failed: {e:#}")),
    }
}

/// Entry point for `vybe hook <phase>`. Never fails: configuration errors
/// become warnings and the hook runs with defaults.
pub fn hook_entrypoint(phase: HookPhase, project_root: &Path, stdin: &str) -> HookResult {
    let mut warnings = Vec::new();
    let config = match HookConfig::load(project_root) {
        Ok(cfg) => cfg,
        Err(e) => {
            warnings.push(format!("vybe: config unreadable, using defaults: {e:#}"));
            HookConfig::from_map(project_root, &serde_json::Map::new())
        }
    };
    tracing::debug!(phase = phase.as_str(), root = %project_root.display(), "hook invoked");

    let result = match phase {
        HookPhase::Pre => run_pre_hook(&config, &HookInput::from_env(stdin)),
        HookPhase::Post => run_post_hook(&config, &HookInput::from_env(stdin)),
        HookPhase::Precompact => {
            let member = std::env::var("VYBE_MEMBER").ok().filter(|v| !v.is_empty());
            run_precompact_hook(&config, stdin, member.as_deref())
        }
    };
    HookResult {
        stdout: result.stdout,
        stderr: None,
    }
    .with_warnings(warnings)
    .with_warnings(result.stderr.into_iter().collect())
}
