//! The agent worker loop.
//!
//! Every agent runs as its own tokio task. The orchestrator talks to it over
//! an unbounded command channel and hears back over the shared, bounded
//! event channel; the two never share mutable state.

use crate::backend::AgentBackend;
use crate::types::{AgentId, MessageEnvelope, MessageId, Task, TaskId};
use chrono::{DateTime, Utc};
use hive_core::{HiveError, HiveResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

/// Orchestrator -> agent.
#[derive(Debug)]
pub enum AgentCommand {
    /// Start executing a task. Tasks run concurrently inside the agent.
    Assign(Task),
    /// Deliver a message; deliveries to one agent happen in send order.
    Deliver(MessageEnvelope),
    /// Stop accepting work and exit once in-flight tasks have finished.
    Terminate,
}

/// Agent -> orchestrator.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    TaskStarted {
        agent_id: AgentId,
        task_id: TaskId,
        at: DateTime<Utc>,
    },
    TaskCompleted {
        agent_id: AgentId,
        task_id: TaskId,
        output: serde_json::Value,
        duration: Duration,
    },
    TaskFailed {
        agent_id: AgentId,
        task_id: TaskId,
        reason: String,
        duration: Duration,
    },
    MessageDelivered {
        agent_id: AgentId,
        message_id: MessageId,
    },
    MessageFailed {
        agent_id: AgentId,
        message_id: MessageId,
        reason: String,
    },
    /// The backend reported that the agent itself is broken.
    Faulted { agent_id: AgentId, reason: String },
    /// The worker loop has exited; nothing else will arrive from this agent.
    Stopped { agent_id: AgentId },
}

/// Run a backend's initialization under a deadline.
pub async fn initialize(
    agent_id: AgentId,
    backend: &Arc<dyn AgentBackend>,
    deadline: Duration,
) -> HiveResult<()> {
    match tokio::time::timeout(deadline, backend.initialize(agent_id)).await {
        Ok(result) => result,
        Err(_) => Err(HiveError::Timeout(format!(
            "{agent_id} did not initialize within {}ms",
            deadline.as_millis()
        ))),
    }
}

/// A running agent's worker loop.
pub struct Agent {
    id: AgentId,
    backend: Arc<dyn AgentBackend>,
    events: mpsc::Sender<AgentEvent>,
}

type Execution = (TaskId, HiveResult<serde_json::Value>, Duration);

impl Agent {
    pub fn new(
        id: AgentId,
        backend: Arc<dyn AgentBackend>,
        events: mpsc::Sender<AgentEvent>,
    ) -> Self {
        Self {
            id,
            backend,
            events,
        }
    }

    /// Spawn the worker loop; returns its command sender and join handle.
    pub fn start(self) -> (mpsc::UnboundedSender<AgentCommand>, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(self.run(rx));
        (tx, handle)
    }

    async fn run(self, mut commands: mpsc::UnboundedReceiver<AgentCommand>) {
        let mut in_flight: JoinSet<Execution> = JoinSet::new();
        let (mail_tx, mail_rx) = mpsc::unbounded_channel();
        let mailbox = tokio::spawn(deliver_mail(
            self.id,
            Arc::clone(&self.backend),
            mail_rx,
            self.events.clone(),
        ));
        let mut terminating = false;

        loop {
            if terminating && in_flight.is_empty() {
                break;
            }
            tokio::select! {
                cmd = commands.recv(), if !terminating => match cmd {
                    Some(AgentCommand::Assign(task)) => self.begin(task, &mut in_flight).await,
                    Some(AgentCommand::Deliver(envelope)) => {
                        if mail_tx.send(envelope).is_err() {
                            warn!(agent_id = %self.id, "Mailbox closed; message lost");
                        }
                    }
                    Some(AgentCommand::Terminate) | None => {
                        debug!(agent_id = %self.id, in_flight = in_flight.len(), "Agent draining");
                        terminating = true;
                    }
                },
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => match joined {
                    Ok(execution) => self.finish(execution).await,
                    Err(e) => warn!(agent_id = %self.id, error = %e, "Task supervisor aborted"),
                },
            }
        }

        drop(mail_tx);
        if let Err(e) = mailbox.await {
            warn!(agent_id = %self.id, error = %e, "Mailbox task aborted");
        }
        let _ = self.events.send(AgentEvent::Stopped { agent_id: self.id }).await;
        debug!(agent_id = %self.id, "Agent stopped");
    }

    async fn begin(&self, task: Task, in_flight: &mut JoinSet<Execution>) {
        let task_id = task.id;
        self.emit(AgentEvent::TaskStarted {
            agent_id: self.id,
            task_id,
            at: Utc::now(),
        })
        .await;

        let agent_id = self.id;
        let backend = Arc::clone(&self.backend);
        in_flight.spawn(async move {
            let started = Instant::now();
            // Inner spawn so a panicking backend still yields a result for this task.
            let result = tokio::spawn(async move { backend.execute(agent_id, &task).await })
                .await
                .unwrap_or_else(|e| Err(HiveError::Agent(format!("task execution panicked: {e}"))));
            (task_id, result, started.elapsed())
        });
    }

    async fn finish(&self, (task_id, result, duration): Execution) {
        match result {
            Ok(output) => {
                self.emit(AgentEvent::TaskCompleted {
                    agent_id: self.id,
                    task_id,
                    output,
                    duration,
                })
                .await;
            }
            Err(e) => {
                // The fault must land first so the freed agent is never
                // handed queued work.
                if e.is_fault() {
                    self.emit(AgentEvent::Faulted {
                        agent_id: self.id,
                        reason: e.to_string(),
                    })
                    .await;
                }
                self.emit(AgentEvent::TaskFailed {
                    agent_id: self.id,
                    task_id,
                    reason: e.to_string(),
                    duration,
                })
                .await;
            }
        }
    }

    async fn emit(&self, event: AgentEvent) {
        if self.events.send(event).await.is_err() {
            debug!(agent_id = %self.id, "Orchestrator gone; event discarded");
        }
    }
}

async fn deliver_mail(
    agent_id: AgentId,
    backend: Arc<dyn AgentBackend>,
    mut mail: mpsc::UnboundedReceiver<MessageEnvelope>,
    events: mpsc::Sender<AgentEvent>,
) {
    while let Some(envelope) = mail.recv().await {
        let message_id = envelope.id();
        let event = match backend.handle_message(agent_id, &envelope).await {
            Ok(()) => AgentEvent::MessageDelivered {
                agent_id,
                message_id,
            },
            Err(e) => AgentEvent::MessageFailed {
                agent_id,
                message_id,
                reason: e.to_string(),
            },
        };
        if events.send(event).await.is_err() {
            break;
        }
    }
}
