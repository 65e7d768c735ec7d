use std::io::{IsTerminal, Read};
use std::path::Path;

use vybe_bridge::{HookConfig, HookPhase, RoleRegistry};

/// `vybe hook <phase>`: read stdin, dispatch, print. Never fails the tool call.
pub fn hook(repo_root: &Path, phase: HookPhase) -> anyhow::Result<()> {
    let mut stdin_buf = String::new();
    let stdin = std::io::stdin();
    // Manual invocation from a terminal has no payload to wait for.
    if !stdin.is_terminal() {
        if let Err(e) = stdin.lock().read_to_string(&mut stdin_buf) {
            tracing::debug!(error = %e, "stdin read failed; continuing without payload");
            stdin_buf.clear();
        }
    }
    tracing::debug!(phase = phase.as_str(), bytes = stdin_buf.len(), "hook stdin");

    let result = vybe_bridge::hook_entrypoint(phase, repo_root, &stdin_buf);
    if let Some(output) = &result.stdout {
        println!("{output}");
    }
    if let Some(warning) = &result.stderr {
        eprintln!("{warning}");
    }
    Ok(())
}

/// `vybe install`
pub fn install(repo_root: &Path) -> anyhow::Result<()> {
    let config = HookConfig::load(repo_root)?;
    let summary = vybe_bridge::install(&config)?;
    for script in &summary.scripts {
        println!("script: {}", script.display());
    }
    if let Some(backup) = &summary.backup {
        println!("backup: {}", backup.display());
    }
    println!("Registered vybe hooks in {}", summary.settings.display());
    Ok(())
}

/// `vybe uninstall`
pub fn uninstall(repo_root: &Path) -> anyhow::Result<()> {
    let config = HookConfig::load(repo_root)?;
    if vybe_bridge::uninstall(&config)? {
        println!("Removed vybe hooks from .claude/settings.local.json");
    } else {
        println!("No .claude/settings.local.json found; nothing to remove.");
    }
    Ok(())
}

/// `vybe role`
pub fn role(repo_root: &Path) -> anyhow::Result<()> {
    let config = HookConfig::load(repo_root)?;
    let registry = RoleRegistry::from_config(&config);
    let member = std::env::var("VYBE_MEMBER").ok().filter(|v| !v.is_empty());
    let resolution = registry.resolve(member.as_deref());

    println!("status: {}", resolution.status());
    println!(
        "role: {}",
        resolution.role_label().unwrap_or_else(|| "(none)".into())
    );
    if registry.is_multi_member() {
        println!("members: {}", registry.declared().join(", "));
    } else {
        println!("members: (none, solo mode)");
    }
    if let Some(warning) = registry.warning(&resolution) {
        eprintln!("{warning}");
    }
    Ok(())
}
