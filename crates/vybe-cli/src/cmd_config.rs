use clap::Subcommand;
use std::path::Path;

use vybe_bridge::config::{parse_value, read_config, write_config, CONFIG_FILE};

// ── CLI Schema ──

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Set a config value
    Set {
        /// Config key (members, hooks_dir, context_dir, smoke_tests)
        key: String,
        /// Config value (true/false/number/comma list/string)
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
}

// ── Dispatch ──

pub fn run(cmd: ConfigCmd, repo_root: &Path) -> anyhow::Result<()> {
    match cmd {
        ConfigCmd::Set { key, value } => set(repo_root, &key, &value),
        ConfigCmd::Get { key } => get(repo_root, &key),
        ConfigCmd::List => list(repo_root),
    }
}

// ── Command Implementations ──

/// `vybe config set <key> <value>`
pub fn set(repo_root: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let path = repo_root.join(CONFIG_FILE);
    let mut config = read_config(&path)?;
    let parsed = parse_value(value);
    println!("{key} = {parsed}");
    config.insert(key.to_string(), parsed);
    write_config(&path, &config)
}

/// `vybe config get <key>`
pub fn get(repo_root: &Path, key: &str) -> anyhow::Result<()> {
    let config = read_config(&repo_root.join(CONFIG_FILE))?;
    match config.get(key) {
        Some(val) => println!("{val}"),
        None => println!("(not set)"),
    }
    Ok(())
}

/// `vybe config list`
pub fn list(repo_root: &Path) -> anyhow::Result<()> {
    let config = read_config(&repo_root.join(CONFIG_FILE))?;
    if config.is_empty() {
        println!("(no config set)");
    } else {
        for (k, v) in &config {
            println!("{k} = {v}");
        }
    }
    Ok(())
}
