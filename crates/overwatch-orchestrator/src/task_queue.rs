use crate::types::{Task, TaskStatus};
use std::collections::HashMap;
use uuid::Uuid;

/// Owned task table with dependency-aware eligibility.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: HashMap<Uuid, Task>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task. Returns `false` if the id is already taken.
    pub fn add(&mut self, task: Task) -> bool {
        if self.tasks.contains_key(&task.id) {
            return false;
        }
        self.tasks.insert(task.id, task);
        true
    }

    pub fn remove(&mut self, id: Uuid) -> Option<Task> {
        self.tasks.remove(&id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.tasks.contains_key(&id)
    }

    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut Task> {
        self.tasks.get_mut(&id)
    }

    /// Whether every dependency exists and is `Completed`.
    ///
    /// Dependencies on ids not yet submitted are unmet.
    pub fn dependencies_met(&self, task: &Task) -> bool {
        task.dependencies.iter().all(|dep| {
            self.tasks
                .get(dep)
                .is_some_and(|t| t.status == TaskStatus::Completed)
        })
    }

    /// Pending tasks with all dependencies completed and no open escalation,
    /// ordered by priority (desc), creation time (asc), then id.
    pub fn eligible(&self) -> Vec<&Task> {
        let mut ready: Vec<&Task> = self
            .tasks
            .values()
            .filter(|t| {
                t.status == TaskStatus::Pending && !t.is_awaiting_human() && self.dependencies_met(t)
            })
            .collect();
        ready.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        ready
    }

    /// All tasks, oldest first.
    pub fn all_tasks(&self) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.values().collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        tasks
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.values().filter(|t| t.status == status).count()
    }

    pub fn total_count(&self) -> usize {
        self.tasks.len()
    }

    /// Whether every task is in a terminal state.
    pub fn is_done(&self) -> bool {
        self.tasks.values().all(|t| t.status.is_terminal())
    }

    /// Check for cycles in the dependency graph among known tasks.
    /// Returns true if a cycle is detected.
    pub fn has_cycle(&self) -> bool {
        let mut visited = HashMap::new();
        self.tasks
            .keys()
            .any(|&id| self.dfs_cycle(id, &mut visited))
    }

    fn dfs_cycle(&self, id: Uuid, visited: &mut HashMap<Uuid, u8>) -> bool {
        match visited.get(&id) {
            Some(1) => return true,  // back edge
            Some(2) => return false, // finished
            _ => {}
        }
        visited.insert(id, 1);
        if let Some(task) = self.tasks.get(&id) {
            for dep in &task.dependencies {
                if self.dfs_cycle(*dep, visited) {
                    return true;
                }
            }
        }
        visited.insert(id, 2);
        false
    }
}
