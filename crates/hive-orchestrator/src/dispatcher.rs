use crate::registry::AgentRegistry;
use crate::types::{AgentId, DistributeOutcome, Task, TaskId, TaskStatus};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Selects agents for incoming tasks and keeps the FIFO back-pressure queue.
///
/// A task is either in this queue or in exactly one agent's in-flight set.
/// Task completions and load-driven spawns are followed by
/// [`drain`](Self::drain). An agent added through an explicit spawn waits
/// for the next drain, so spawn-then-terminate leaves the queue untouched.
pub struct TaskDispatcher {
    queue: VecDeque<TaskId>,
}

impl TaskDispatcher {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Hand a task to the least-busy ready agent, or queue it.
    pub fn distribute(&mut self, task: &mut Task, registry: &mut AgentRegistry) -> DistributeOutcome {
        if self.queue.is_empty() {
            while let Some(agent_id) = registry.ready_candidate() {
                if registry.assign(agent_id, task) {
                    debug!(task_id = %task.id, agent_id = %agent_id, "Task dispatched");
                    return DistributeOutcome {
                        task_id: task.id,
                        queued: false,
                        queue_position: None,
                        assigned_to: Some(agent_id),
                    };
                }
            }
        }

        task.status = TaskStatus::Queued;
        task.assigned_to = None;
        self.queue.push_back(task.id);
        let position = self.queue.len();
        debug!(task_id = %task.id, position, "Task queued");
        DistributeOutcome {
            task_id: task.id,
            queued: true,
            queue_position: Some(position),
            assigned_to: None,
        }
    }

    /// Pop queued tasks in submission order onto ready agents until one runs out.
    pub fn drain(
        &mut self,
        tasks: &mut HashMap<TaskId, Task>,
        registry: &mut AgentRegistry,
    ) -> Vec<(TaskId, AgentId)> {
        let mut dispatched = Vec::new();
        while let Some(agent_id) = registry.ready_candidate() {
            let Some(task_id) = self.queue.pop_front() else {
                break;
            };
            let Some(task) = tasks.get_mut(&task_id) else {
                continue;
            };
            if registry.assign(agent_id, task) {
                debug!(task_id = %task_id, agent_id = %agent_id, "Queued task dispatched");
                dispatched.push((task_id, agent_id));
            } else {
                self.queue.push_front(task_id);
            }
        }
        dispatched
    }

    /// 1-based queue position of a task.
    pub fn position(&self, task_id: TaskId) -> Option<usize> {
        self.queue.iter().position(|id| *id == task_id).map(|i| i + 1)
    }

    pub fn contains(&self, task_id: TaskId) -> bool {
        self.queue.contains(&task_id)
    }

    pub fn queued_ids(&self) -> Vec<TaskId> {
        self.queue.iter().copied().collect()
    }

    /// Empty the queue, returning what was in it in order.
    pub fn clear(&mut self) -> Vec<TaskId> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Default for TaskDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
