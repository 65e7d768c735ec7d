use clap::Subcommand;
use std::path::Path;

use vybe_bridge::deps::{load_graph, set_task_state, update_dependencies, PropagateOutcome};
use vybe_bridge::HookConfig;
use vybe_core::{propagate, GraphError, TaskState};
use vybe_store::FileStore;

// ── CLI Schema ──

#[derive(Subcommand)]
pub enum DepsCmd {
    /// List tasks in dependency order with their states
    Show,
    /// Promote blocked tasks whose dependencies are all done
    Propagate {
        /// Print what would change without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Move one task to a new state (blocked, ready, in_progress, done)
    Set {
        /// Task id
        id: String,
        /// Target state
        state: String,
    },
}

// ── Dispatch ──

pub fn run(cmd: DepsCmd, repo_root: &Path) -> anyhow::Result<()> {
    let config = HookConfig::load(repo_root)?;
    let store = FileStore::new(&config.context_dir);
    match cmd {
        DepsCmd::Show => show(&store),
        DepsCmd::Propagate { dry_run } => run_propagate(&store, dry_run),
        DepsCmd::Set { id, state } => set(&store, &id, &state),
    }
}

// ── Command Implementations ──

fn show(store: &FileStore) -> anyhow::Result<()> {
    let Some(graph) = load_graph(store)? else {
        println!("No dependency graph.");
        return Ok(());
    };
    let order = match graph.topo_order() {
        Ok(order) => order,
        Err(GraphError::Cycle(members)) => {
            println!("cycle: [{}]", members.join(", "));
            graph.tasks.iter().map(|t| t.id.clone()).collect()
        }
        Err(e) => return Err(e.into()),
    };
    for id in &order {
        if let Some(task) = graph.get(id) {
            let deps = if task.depends_on.is_empty() {
                String::new()
            } else {
                format!(" <- {}", task.depends_on.join(", "))
            };
            println!("{:<12} {}{deps}", task.state.to_string(), task.id);
        }
    }
    println!(
        "\n{} blocked, {} ready, {} in progress, {} done",
        graph.count_by_state(TaskState::Blocked),
        graph.count_by_state(TaskState::Ready),
        graph.count_by_state(TaskState::InProgress),
        graph.count_by_state(TaskState::Done),
    );
    for (task, dep) in graph.unknown_dependencies() {
        println!("unknown dependency: {task} -> {dep}");
    }
    for v in graph.violations() {
        println!(
            "violation: {} is {} but [{}] not done",
            v.id,
            v.state,
            v.pending.join(", ")
        );
    }
    Ok(())
}

fn run_propagate(store: &FileStore, dry_run: bool) -> anyhow::Result<()> {
    if dry_run {
        let Some(graph) = load_graph(store)? else {
            println!("No dependency graph.");
            return Ok(());
        };
        let next = propagate(&graph);
        for (before, after) in graph.tasks.iter().zip(&next.tasks) {
            if before.state != after.state {
                println!("would promote: {} ({} -> {})", after.id, before.state, after.state);
            }
        }
        return Ok(());
    }
    match update_dependencies(store)? {
        Some(outcome) => report(&outcome),
        None => println!("No dependency graph."),
    }
    Ok(())
}

fn set(store: &FileStore, id: &str, state: &str) -> anyhow::Result<()> {
    let state: TaskState = state.parse()?;
    let outcome = set_task_state(store, id, state)?;
    println!("{id} -> {state}");
    report(&outcome);
    Ok(())
}

fn report(outcome: &PropagateOutcome) {
    if outcome.promoted.is_empty() {
        println!("No tasks promoted.");
    } else {
        println!("ready: {}", outcome.promoted.join(", "));
    }
    for warning in outcome.warnings() {
        eprintln!("{warning}");
    }
}
