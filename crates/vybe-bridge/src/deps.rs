use anyhow::Context;
use vybe_core::graph::Violation;
use vybe_core::{DependencyGraph, GraphError, TaskState};
use vybe_store::{get_json, put_json, KvStore};

/// Store key of the dependency graph document (`dependencies.json`).
pub const GRAPH_KEY: &str = "dependencies";

/// What one propagation pass found and changed.
#[derive(Debug, Default)]
pub struct PropagateOutcome {
    pub promoted: Vec<String>,
    pub violations: Vec<Violation>,
    pub cycle: Option<Vec<String>>,
}

impl PropagateOutcome {
    /// Warnings worth showing to the user.
    pub fn warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(members) = &self.cycle {
            out.push(format!(
                "vybe: dependency cycle among tasks [{}]",
                members.join(", ")
            ));
        }
        for v in &self.violations {
            out.push(format!(
                "vybe: task {} is {} but depends on unfinished [{}]",
                v.id,
                v.state,
                v.pending.join(", ")
            ));
        }
        out
    }
}

pub fn load_graph<S: KvStore + ?Sized>(store: &S) -> anyhow::Result<Option<DependencyGraph>> {
    get_json(store, GRAPH_KEY).context("reading dependency graph")
}

fn save_graph<S: KvStore + ?Sized>(store: &S, graph: &DependencyGraph) -> anyhow::Result<()> {
    put_json(store, GRAPH_KEY, graph).context("writing dependency graph")
}

/// Propagate readiness through the stored graph.
///
/// No graph document → `Ok(None)`. The document is rewritten only when a
/// node was promoted.
pub fn update_dependencies<S: KvStore + ?Sized>(
    store: &S,
) -> anyhow::Result<Option<PropagateOutcome>> {
    let Some(mut graph) = load_graph(store)? else {
        tracing::debug!("no dependency graph; skipping propagation");
        return Ok(None);
    };

    let cycle = match graph.topo_order() {
        Ok(_) => None,
        Err(GraphError::Cycle(members)) => Some(members),
        Err(e) => return Err(e.into()),
    };
    let promoted = graph.propagate_in_place();
    if !promoted.is_empty() {
        save_graph(store, &graph)?;
        tracing::info!(promoted = ?promoted, "tasks became ready");
    }
    Ok(Some(PropagateOutcome {
        promoted,
        violations: graph.violations(),
        cycle,
    }))
}

/// Apply a checked state transition to one task, then propagate.
pub fn set_task_state<S: KvStore + ?Sized>(
    store: &S,
    id: &str,
    state: TaskState,
) -> anyhow::Result<PropagateOutcome> {
    let mut graph = load_graph(store)?
        .ok_or_else(|| anyhow::anyhow!("no dependency graph found"))?;
    graph.transition(id, state)?;
    let promoted = graph.propagate_in_place();
    save_graph(store, &graph)?;
    Ok(PropagateOutcome {
        promoted,
        violations: graph.violations(),
        cycle: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vybe_core::TaskNode;
    use vybe_store::{FileStore, MemoryStore};

    fn seed(store: &MemoryStore, tasks: Vec<TaskNode>) {
        put_json(store, GRAPH_KEY, &DependencyGraph::from_tasks(tasks)).unwrap();
    }

    #[test]
    fn missing_graph_is_noop() {
        let store = MemoryStore::new();
        assert!(update_dependencies(&store).unwrap().is_none());
        assert!(store.get(GRAPH_KEY).unwrap().is_none());
    }

    #[test]
    fn missing_graph_file_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());
        assert!(update_dependencies(&store).unwrap().is_none());
        assert!(!store.path_for(GRAPH_KEY).exists());
    }

    #[test]
    fn promotes_and_persists() {
        let store = MemoryStore::new();
        seed(
            &store,
            vec![
                TaskNode::new("a", &[], TaskState::Done),
                TaskNode::new("b", &["a"], TaskState::Blocked),
            ],
        );
        let outcome = update_dependencies(&store).unwrap().unwrap();
        assert_eq!(outcome.promoted, vec!["b".to_string()]);
        assert!(outcome.warnings().is_empty());

        let graph = load_graph(&store).unwrap().unwrap();
        assert_eq!(graph.get("b").unwrap().state, TaskState::Ready);

        let again = update_dependencies(&store).unwrap().unwrap();
        assert!(again.promoted.is_empty());
    }

    #[test]
    fn cycle_reported_not_fatal() {
        let store = MemoryStore::new();
        seed(
            &store,
            vec![
                TaskNode::new("a", &["b"], TaskState::Blocked),
                TaskNode::new("b", &["a"], TaskState::Blocked),
                TaskNode::new("c", &[], TaskState::Blocked),
            ],
        );
        let outcome = update_dependencies(&store).unwrap().unwrap();
        assert_eq!(outcome.cycle, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(outcome.promoted, vec!["c".to_string()]);
        assert!(outcome.warnings()[0].contains("cycle"));
    }

    #[test]
    fn set_state_marks_done_and_unblocks() {
        let store = MemoryStore::new();
        seed(
            &store,
            vec![
                TaskNode::new("a", &[], TaskState::InProgress),
                TaskNode::new("b", &["a"], TaskState::Blocked),
            ],
        );
        let outcome = set_task_state(&store, "a", TaskState::Done).unwrap();
        assert_eq!(outcome.promoted, vec!["b".to_string()]);
        assert!(set_task_state(&store, "a", TaskState::InProgress).is_err());
    }

    #[test]
    fn set_state_without_graph_errors() {
        let store = MemoryStore::new();
        assert!(set_task_state(&store, "a", TaskState::Done).is_err());
    }
}
