mod cmd_bridge;
mod cmd_config;
mod cmd_deps;
mod cmd_session;
mod cmd_validate;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "vybe", version, about = "Hook coordination for multi-member coding sessions")]
struct Cli {
    /// Log debug output to stderr (overrides VYBE_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a hook (called by the installed hook scripts; always exits 0)
    Hook {
        #[command(subcommand)]
        cmd: HookCmd,
    },
    /// Check that the hook layer is ready (exit 0 READY, 1 PARTIAL, 2 FAILED)
    Validate {
        /// Print nothing; report through the exit code only
        #[arg(long)]
        silent: bool,
        /// Skip all checks and switch to manual hook invocation (wins over --status)
        #[arg(long)]
        fallback: bool,
        /// Only check that the hook scripts exist and are executable
        #[arg(long)]
        status: bool,
    },
    /// Inspect session records
    Session {
        #[command(subcommand)]
        cmd: cmd_session::SessionCmd,
    },
    /// Inspect or update the task dependency graph
    Deps {
        #[command(subcommand)]
        cmd: cmd_deps::DepsCmd,
    },
    /// Show how VYBE_MEMBER resolves against the configured members
    Role,
    /// Manage .vybe/config.json
    Config {
        #[command(subcommand)]
        cmd: cmd_config::ConfigCmd,
    },
    /// Write hook scripts and register them in .claude/settings.local.json
    Install,
    /// Remove vybe hooks from .claude/settings.local.json
    Uninstall,
}

#[derive(Subcommand)]
enum HookCmd {
    /// Before a tool runs
    Pre,
    /// After a tool runs
    Post,
    /// Before the assistant compacts its context
    Precompact,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("VYBE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let repo_root = std::env::current_dir()?;

    match cli.cmd {
        Command::Hook { cmd } => {
            let phase = match cmd {
                HookCmd::Pre => vybe_bridge::HookPhase::Pre,
                HookCmd::Post => vybe_bridge::HookPhase::Post,
                HookCmd::Precompact => vybe_bridge::HookPhase::Precompact,
            };
            cmd_bridge::hook(&repo_root, phase)
        }
        Command::Validate {
            silent,
            fallback,
            status,
        } => {
            let code = cmd_validate::execute(&repo_root, silent, fallback, status)?;
            std::process::exit(code);
        }
        Command::Session { cmd } => cmd_session::run(cmd, &repo_root),
        Command::Deps { cmd } => cmd_deps::run(cmd, &repo_root),
        Command::Role => cmd_bridge::role(&repo_root),
        Command::Config { cmd } => cmd_config::run(cmd, &repo_root),
        Command::Install => cmd_bridge::install(&repo_root),
        Command::Uninstall => cmd_bridge::uninstall(&repo_root),
    }
}
