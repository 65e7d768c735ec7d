//! Task dependency graph and readiness propagation.
//!
//! The graph document is produced by an external analysis process. Only the
//! minimal shape (`tasks[].id`, `tasks[].depends_on`, `tasks[].state`) is
//! interpreted here; every other field is carried through untouched.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

// ── States ──

/// Task state. Ordering follows progress: `Blocked < Ready < InProgress < Done`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    #[default]
    Blocked,
    Ready,
    InProgress,
    Done,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocked => write!(f, "blocked"),
            Self::Ready => write!(f, "ready"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Done => write!(f, "done"),
        }
    }
}

impl std::str::FromStr for TaskState {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blocked" => Ok(Self::Blocked),
            "ready" => Ok(Self::Ready),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            other => Err(GraphError::UnknownState(other.to_string())),
        }
    }
}

// ── Valid transitions ──

const VALID_TRANSITIONS: &[(TaskState, &[TaskState])] = &[
    (TaskState::Blocked, &[TaskState::Ready]),
    (TaskState::Ready, &[TaskState::InProgress, TaskState::Done]),
    (TaskState::InProgress, &[TaskState::Done]),
    // Done is terminal
];

fn is_valid_transition(from: TaskState, to: TaskState) -> bool {
    VALID_TRANSITIONS
        .iter()
        .any(|(f, targets)| *f == from && targets.contains(&to))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("unknown task: {0}")]
    UnknownTask(String),
    #[error("unknown task state: {0:?}")]
    UnknownState(String),
    #[error("invalid transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: TaskState,
        to: TaskState,
    },
    #[error("task {id} has unfinished dependencies: [{}]", .pending.join(", "))]
    DependenciesPending { id: String, pending: Vec<String> },
    #[error("dependency cycle detected among tasks: [{}]", .0.join(", "))]
    Cycle(Vec<String>),
}

// ── Document types ──

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TaskNode {
    pub id: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub state: TaskState,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TaskNode {
    pub fn new(id: &str, depends_on: &[&str], state: TaskState) -> Self {
        Self {
            id: id.to_string(),
            depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
            state,
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct DependencyGraph {
    #[serde(default)]
    pub tasks: Vec<TaskNode>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A node that holds `ready` or later while some dependency is not `done`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub id: String,
    pub state: TaskState,
    pub pending: Vec<String>,
}

impl DependencyGraph {
    pub fn from_tasks(tasks: Vec<TaskNode>) -> Self {
        Self {
            tasks,
            extra: serde_json::Map::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&TaskNode> {
        self.tasks.iter().find(|t| t.id == id)
    }

    fn done_set(&self) -> HashSet<&str> {
        self.tasks
            .iter()
            .filter(|t| t.state == TaskState::Done)
            .map(|t| t.id.as_str())
            .collect()
    }

    /// Dependencies of `node` that are not `done`. Unknown ids count as not done.
    fn pending_deps(node: &TaskNode, done: &HashSet<&str>) -> Vec<String> {
        node.depends_on
            .iter()
            .filter(|d| !done.contains(d.as_str()))
            .cloned()
            .collect()
    }

    /// Promote every `blocked` node whose dependencies are all `done` to `ready`.
    /// Returns the ids that changed. No other state is touched.
    ///
    /// A single pass is a fixpoint: promotion never creates new `done` nodes.
    pub fn propagate_in_place(&mut self) -> Vec<String> {
        let done: HashSet<String> = self.done_set().into_iter().map(String::from).collect();
        let mut promoted = Vec::new();
        for node in &mut self.tasks {
            if node.state != TaskState::Blocked {
                continue;
            }
            if node.depends_on.iter().all(|d| done.contains(d)) {
                node.state = TaskState::Ready;
                promoted.push(node.id.clone());
            }
        }
        promoted
    }

    /// Apply a manual state change, checked against the transition table.
    /// Moving to `ready` additionally requires every dependency to be `done`.
    pub fn transition(&mut self, id: &str, to: TaskState) -> Result<(), GraphError> {
        let done: HashSet<String> = self.done_set().into_iter().map(String::from).collect();
        let node = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| GraphError::UnknownTask(id.to_string()))?;
        if !is_valid_transition(node.state, to) {
            return Err(GraphError::InvalidTransition {
                id: id.to_string(),
                from: node.state,
                to,
            });
        }
        if to >= TaskState::Ready {
            let pending: Vec<String> = node
                .depends_on
                .iter()
                .filter(|d| !done.contains(d.as_str()))
                .cloned()
                .collect();
            if !pending.is_empty() {
                return Err(GraphError::DependenciesPending {
                    id: id.to_string(),
                    pending,
                });
            }
        }
        node.state = to;
        Ok(())
    }

    /// Nodes at `ready` or later with a dependency that is not `done`.
    pub fn violations(&self) -> Vec<Violation> {
        let done = self.done_set();
        self.tasks
            .iter()
            .filter(|t| t.state >= TaskState::Ready)
            .filter_map(|t| {
                let pending = Self::pending_deps(t, &done);
                (!pending.is_empty()).then(|| Violation {
                    id: t.id.clone(),
                    state: t.state,
                    pending,
                })
            })
            .collect()
    }

    /// `(task, dependency)` pairs naming a task that is not in the graph.
    pub fn unknown_dependencies(&self) -> Vec<(String, String)> {
        let ids: HashSet<&str> = self.tasks.iter().map(|t| t.id.as_str()).collect();
        self.tasks
            .iter()
            .flat_map(|t| {
                t.depends_on
                    .iter()
                    .filter(|d| !ids.contains(d.as_str()))
                    .map(|d| (t.id.clone(), d.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Topological order of task ids (Kahn's algorithm, ties sorted by id).
    /// Dependencies on unknown ids are ignored here.
    pub fn topo_order(&self) -> Result<Vec<String>, GraphError> {
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

        for task in &self.tasks {
            in_degree.entry(&task.id).or_insert(0);
            dependents.entry(&task.id).or_default();
        }
        for task in &self.tasks {
            for dep in &task.depends_on {
                if !dependents.contains_key(dep.as_str()) {
                    continue;
                }
                *in_degree.entry(&task.id).or_insert(0) += 1;
                dependents.entry(dep.as_str()).or_default().push(&task.id);
            }
        }

        let mut initial: Vec<&str> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&id, _)| id)
            .collect();
        initial.sort();
        let mut queue: VecDeque<&str> = initial.into();

        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(id) = queue.pop_front() {
            order.push(id.to_string());
            let mut next = Vec::new();
            for &dependent in dependents.get(id).map(Vec::as_slice).unwrap_or_default() {
                if let Some(deg) = in_degree.get_mut(dependent) {
                    *deg -= 1;
                    if *deg == 0 {
                        next.push(dependent);
                    }
                }
            }
            next.sort();
            queue.extend(next);
        }

        if order.len() != in_degree.len() {
            let in_order: HashSet<&str> = order.iter().map(|s| s.as_str()).collect();
            let mut members: Vec<String> = in_degree
                .keys()
                .filter(|id| !in_order.contains(*id))
                .map(|id| id.to_string())
                .collect();
            members.sort();
            return Err(GraphError::Cycle(members));
        }
        Ok(order)
    }

    pub fn count_by_state(&self, state: TaskState) -> usize {
        self.tasks.iter().filter(|t| t.state == state).count()
    }
}

/// Pure form of [`DependencyGraph::propagate_in_place`].
pub fn propagate(graph: &DependencyGraph) -> DependencyGraph {
    let mut next = graph.clone();
    next.propagate_in_place();
    next
}
