//! Durable task service: lifecycle orchestration over a task store.
//!
//! Every status change is a store compare-and-set from an expected state,
//! so racing writers (completion vs. cancel, two resumes) record exactly one
//! outcome.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::domain::error::{TaskError, WorkflowError};
use crate::domain::models::config::{Config, StoreBackend};
use crate::domain::models::{
    Checkpoint, CheckpointPolicy, ExecutionScope, RetryPolicy, TaskConfiguration, TaskEvent,
    TaskEventKind, TaskId, TaskMetadata, TaskStatus,
};
use crate::domain::ports::{Planner, TaskExecutionStore, TaskWorkflow};
use crate::infrastructure::store::{FileTaskStore, InMemoryTaskStore};
use crate::services::checkpoint_manager::{CheckpointManager, StoreCheckpointHook};
use crate::services::journaling_listener::JournalingAgentListener;
use crate::services::replaying_planner::ReplayingPlanner;
use crate::services::task_handle::{CancellationHook, TaskHandle, TaskOutcome};

/// Pause reason recorded for tasks found running after a restart.
pub const RECOVERY_REASON: &str = "Recovered after process restart";

/// Starts, resumes, cancels and inspects durable tasks.
///
/// Cheap to clone; clones share the store and the in-process task table.
#[derive(Clone)]
pub struct DurableTaskService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    store: Arc<dyn TaskExecutionStore>,
    checkpoints: CheckpointManager,
    default_checkpoint_policy: CheckpointPolicy,
    default_retry_policy: RetryPolicy,
    default_timeout: Option<Duration>,
    active: Mutex<HashMap<TaskId, TaskHandle>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// Settings resolved for one run of a task.
#[derive(Clone)]
struct RunSettings {
    checkpoint_policy: CheckpointPolicy,
    retry_policy: RetryPolicy,
    timeout: Option<Duration>,
}

/// Builder for [`DurableTaskService`].
#[derive(Default)]
pub struct DurableTaskServiceBuilder {
    store: Option<Arc<dyn TaskExecutionStore>>,
    checkpoint_policy: CheckpointPolicy,
    retry_policy: RetryPolicy,
    timeout: Option<Duration>,
}

impl DurableTaskServiceBuilder {
    pub fn store(mut self, store: Arc<dyn TaskExecutionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn default_checkpoint_policy(mut self, policy: CheckpointPolicy) -> Self {
        self.checkpoint_policy = policy;
        self
    }

    pub fn default_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<DurableTaskService, TaskError> {
        let store = self
            .store
            .ok_or_else(|| TaskError::InvalidConfiguration("a task store is required".to_string()))?;
        Ok(DurableTaskService {
            inner: Arc::new(ServiceInner {
                checkpoints: CheckpointManager::new(Arc::clone(&store)),
                store,
                default_checkpoint_policy: self.checkpoint_policy,
                default_retry_policy: self.retry_policy,
                default_timeout: self.timeout,
                active: Mutex::new(HashMap::new()),
                workers: Mutex::new(Vec::new()),
            }),
        })
    }
}

impl DurableTaskService {
    pub fn builder() -> DurableTaskServiceBuilder {
        DurableTaskServiceBuilder::default()
    }

    /// Build a service from loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, TaskError> {
        let store: Arc<dyn TaskExecutionStore> = match config.store.backend {
            StoreBackend::Memory => Arc::new(InMemoryTaskStore::new()),
            StoreBackend::File => Arc::new(FileTaskStore::new(&config.store.base_dir)),
        };
        let retry_policy = RetryPolicy::builder()
            .max_retries(config.retry.max_retries)
            .initial_delay(Duration::from_millis(config.retry.initial_delay_ms))
            .max_delay(Duration::from_millis(config.retry.max_delay_ms))
            .multiplier(config.retry.multiplier)
            .build()?;

        let mut builder = Self::builder()
            .store(store)
            .default_checkpoint_policy(config.checkpoint.policy)
            .default_retry_policy(retry_policy);
        if let Some(secs) = config.task.timeout_secs {
            builder = builder.default_timeout(Duration::from_secs(secs));
        }
        builder.build()
    }

    pub fn store(&self) -> &Arc<dyn TaskExecutionStore> {
        &self.inner.store
    }

    /// Submit a new task and start executing it in the background.
    pub async fn start<W>(
        &self,
        configuration: TaskConfiguration,
        workflow: W,
    ) -> Result<TaskHandle, TaskError>
    where
        W: TaskWorkflow + 'static,
    {
        let task_id = TaskId::random();
        let metadata = TaskMetadata::create(
            task_id.clone(),
            configuration.agent_name.clone(),
            configuration.labels.clone(),
        );
        self.inner.store.save_metadata(&metadata).await?;
        self.inner
            .store
            .append_event(&TaskEvent::now(
                task_id.clone(),
                TaskEventKind::TaskStarted {
                    initial_inputs: configuration.initial_inputs.clone(),
                },
            ))
            .await?;

        info!(task_id = %task_id, agent = %metadata.agent_name(), "Task started");
        let settings = self.inner.settings(Some(&configuration));
        Ok(self.launch(metadata, Arc::new(workflow), settings))
    }

    /// Resume a paused (or never started) task.
    ///
    /// The workflow should rebuild its planner with
    /// [`DurableTaskService::replaying_planner`] so completed steps are not
    /// executed again.
    pub async fn resume<W>(
        &self,
        task_id: &TaskId,
        workflow: W,
        configuration: Option<TaskConfiguration>,
    ) -> Result<TaskHandle, TaskError>
    where
        W: TaskWorkflow + 'static,
    {
        let metadata = self.inner.require_metadata(task_id).await?;
        let status = metadata.status();
        if status.is_terminal() {
            return Err(TaskError::TaskInTerminalState {
                task_id: task_id.clone(),
                status,
            });
        }
        if status.is_active() {
            return Err(TaskError::TaskAlreadyActive {
                task_id: task_id.clone(),
                status,
            });
        }

        let running = self
            .inner
            .store
            .compare_and_set_status(task_id, status, TaskStatus::Running, None)
            .await?
            .ok_or_else(|| TaskError::ConcurrentTransition {
                task_id: task_id.clone(),
                expected: status,
            })?;

        self.inner
            .append_best_effort(
                task_id,
                TaskEventKind::TaskResumed {
                    user_input: HashMap::new(),
                },
            )
            .await;

        info!(task_id = %task_id, from = %status, "Task resumed");
        let settings = self.inner.settings(configuration.as_ref());
        Ok(self.launch(running, Arc::new(workflow), settings))
    }

    /// Record input for a paused task, applied on its next resume.
    pub async fn provide_input(
        &self,
        task_id: &TaskId,
        key: impl Into<String>,
        value: Value,
    ) -> Result<(), TaskError> {
        let metadata = self.inner.require_metadata(task_id).await?;
        if metadata.status() != TaskStatus::Paused {
            return Err(TaskError::NotPaused {
                task_id: task_id.clone(),
                status: metadata.status(),
            });
        }

        let key = key.into();
        debug!(task_id = %task_id, key = %key, "Input provided");
        self.inner
            .store
            .append_event(&TaskEvent::now(
                task_id.clone(),
                TaskEventKind::TaskResumed {
                    user_input: HashMap::from([(key, value)]),
                },
            ))
            .await?;
        Ok(())
    }

    /// Cancel a task. Returns `false` for unknown or already finished tasks.
    pub async fn cancel(&self, task_id: &TaskId) -> Result<bool, TaskError> {
        self.inner.cancel(task_id).await
    }

    /// Pause every task a previous process left running.
    pub async fn recover_interrupted_tasks(&self) -> Result<HashSet<TaskId>, TaskError> {
        let mut recovered = HashSet::new();

        for status in [TaskStatus::Running, TaskStatus::Retrying] {
            for task_id in self.inner.store.get_task_ids_by_status(status).await? {
                if self.handle(&task_id).is_some() {
                    continue;
                }
                let paused = self
                    .inner
                    .store
                    .compare_and_set_status(&task_id, status, TaskStatus::Paused, None)
                    .await?;
                if paused.is_none() {
                    continue;
                }

                self.inner
                    .append_best_effort(
                        &task_id,
                        TaskEventKind::TaskPaused {
                            reason: RECOVERY_REASON.to_string(),
                            pending_agent_name: None,
                        },
                    )
                    .await;
                info!(task_id = %task_id, from = %status, "Recovered interrupted task");
                recovered.insert(task_id);
            }
        }

        Ok(recovered)
    }

    /// In-process handle of a task started or resumed by this service.
    pub fn handle(&self, task_id: &TaskId) -> Option<TaskHandle> {
        self.inner.active().get(task_id).cloned()
    }

    pub async fn status(&self, task_id: &TaskId) -> Result<Option<TaskStatus>, TaskError> {
        Ok(self.metadata(task_id).await?.map(|m| m.status()))
    }

    pub async fn metadata(&self, task_id: &TaskId) -> Result<Option<TaskMetadata>, TaskError> {
        Ok(self.inner.store.load_metadata(task_id).await?)
    }

    pub async fn events(&self, task_id: &TaskId) -> Result<Vec<TaskEvent>, TaskError> {
        Ok(self.inner.store.load_events(task_id).await?)
    }

    pub async fn checkpoint(&self, task_id: &TaskId) -> Result<Option<Checkpoint>, TaskError> {
        Ok(self.inner.store.load_checkpoint(task_id).await?)
    }

    /// Metadata of all tasks, optionally filtered by status, oldest first.
    pub async fn list_tasks(
        &self,
        status: Option<TaskStatus>,
    ) -> Result<Vec<TaskMetadata>, TaskError> {
        let ids: Vec<TaskId> = match status {
            Some(status) => self.inner.store.get_task_ids_by_status(status).await?,
            None => self.inner.store.get_all_task_ids().await?.into_iter().collect(),
        };

        let mut tasks = Vec::with_capacity(ids.len());
        for task_id in ids {
            if let Some(metadata) = self.inner.store.load_metadata(&task_id).await? {
                tasks.push(metadata);
            }
        }
        tasks.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(tasks)
    }

    /// Purge a finished task from the store.
    pub async fn cleanup(&self, task_id: &TaskId) -> Result<bool, TaskError> {
        let Some(metadata) = self.inner.store.load_metadata(task_id).await? else {
            return Ok(false);
        };
        if !metadata.status().is_terminal() {
            return Err(TaskError::TaskNotTerminal {
                task_id: task_id.clone(),
                status: metadata.status(),
            });
        }

        self.inner.active().remove(task_id);
        let deleted = self.inner.store.delete(task_id).await?;
        info!(task_id = %task_id, deleted, "Task cleaned up");
        Ok(deleted)
    }

    /// Listener that journals agent invocations of `task_id` and checkpoints
    /// according to `policy`.
    pub fn create_journaling_listener(
        &self,
        task_id: &TaskId,
        policy: CheckpointPolicy,
    ) -> JournalingAgentListener {
        let store = Arc::clone(&self.inner.store);
        let mut listener = JournalingAgentListener::new(task_id.clone(), Arc::clone(&store));
        if policy.checkpoints_after_agent() {
            listener = listener.with_after_agent_checkpoint(Arc::new(StoreCheckpointHook::new(
                task_id.clone(),
                Arc::clone(&store),
            )));
        }
        if policy.checkpoints_after_root_call() {
            listener = listener
                .with_root_call_checkpoint(Arc::new(StoreCheckpointHook::new(task_id.clone(), store)));
        }
        listener
    }

    /// Wrap `delegate` so it fast-forwards through the task's journal.
    pub async fn replaying_planner<P: Planner>(
        &self,
        task_id: &TaskId,
        delegate: P,
    ) -> Result<ReplayingPlanner<P>, TaskError> {
        let events = self.inner.store.load_events(task_id).await?;
        Ok(ReplayingPlanner::new(delegate, events))
    }

    /// Wait up to `timeout` for in-flight runs, then abort the rest.
    pub async fn shutdown(&self, timeout: Duration) {
        let workers: Vec<JoinHandle<()>> = {
            let mut workers = self.inner.workers.lock().unwrap_or_else(PoisonError::into_inner);
            workers.drain(..).collect()
        };

        let deadline = Instant::now() + timeout;
        let mut aborted = 0usize;
        for mut worker in workers {
            if tokio::time::timeout_at(deadline, &mut worker).await.is_err() {
                worker.abort();
                aborted += 1;
            }
        }
        info!(aborted, "Durable task service shut down");
    }

    fn launch(
        &self,
        metadata: TaskMetadata,
        workflow: Arc<dyn TaskWorkflow>,
        settings: RunSettings,
    ) -> TaskHandle {
        let task_id = metadata.id().clone();
        let hook: Arc<dyn CancellationHook> = Arc::new(ServiceCancellation {
            inner: Arc::downgrade(&self.inner),
        });
        let handle = TaskHandle::with_cancellation_hook(metadata, hook);

        if let Some(previous) = self.inner.active().insert(task_id.clone(), handle.clone()) {
            if previous.resolve(TaskOutcome::Superseded) {
                debug!(task_id = %task_id, "Previous handle superseded");
            }
            previous.abort();
        }

        let worker = tokio::spawn(run_task(
            Arc::clone(&self.inner),
            handle.clone(),
            workflow,
            settings.clone(),
        ));
        handle.attach(worker.abort_handle());
        self.inner.track(worker);

        if let Some(timeout) = settings.timeout {
            tokio::spawn(enforce_timeout(Arc::downgrade(&self.inner), handle.clone(), timeout));
        }

        handle
    }
}

impl ServiceInner {
    fn active(&self) -> std::sync::MutexGuard<'_, HashMap<TaskId, TaskHandle>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn track(&self, worker: JoinHandle<()>) {
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        workers.retain(|w| !w.is_finished());
        workers.push(worker);
    }

    fn release(&self, handle: &TaskHandle) {
        let mut active = self.active();
        if active.get(handle.id()).is_some_and(|h| h.same_as(handle)) {
            active.remove(handle.id());
        }
    }

    fn settings(&self, configuration: Option<&TaskConfiguration>) -> RunSettings {
        RunSettings {
            checkpoint_policy: configuration
                .and_then(|c| c.checkpoint_policy)
                .unwrap_or(self.default_checkpoint_policy),
            retry_policy: configuration
                .and_then(|c| c.retry_policy.clone())
                .unwrap_or_else(|| self.default_retry_policy.clone()),
            timeout: configuration.and_then(|c| c.timeout).or(self.default_timeout),
        }
    }

    async fn require_metadata(&self, task_id: &TaskId) -> Result<TaskMetadata, TaskError> {
        self.store
            .load_metadata(task_id)
            .await?
            .ok_or_else(|| TaskError::TaskNotFound(task_id.clone()))
    }

    async fn append_best_effort(&self, task_id: &TaskId, kind: TaskEventKind) {
        let event = TaskEvent::now(task_id.clone(), kind);
        if let Err(e) = self.store.append_event(&event).await {
            warn!(
                task_id = %task_id,
                event_type = event.type_name(),
                error = %e,
                "Failed to journal task event"
            );
        }
    }

    async fn checkpoint_without_scope(&self, metadata: &TaskMetadata) {
        self.checkpoints
            .checkpoint::<ExecutionScope>(metadata.id(), metadata, None)
            .await;
    }

    async fn cancel(&self, task_id: &TaskId) -> Result<bool, TaskError> {
        // One re-read after a lost race, e.g. Running -> Retrying
        for _ in 0..2 {
            let Some(current) = self.store.load_metadata(task_id).await? else {
                return Ok(false);
            };
            if current.status().is_terminal() {
                return Ok(false);
            }

            let cancelled = self
                .store
                .compare_and_set_status(task_id, current.status(), TaskStatus::Cancelled, None)
                .await?;
            let Some(cancelled) = cancelled else {
                continue;
            };

            self.append_best_effort(task_id, TaskEventKind::TaskCancelled).await;
            let handle = self.active().remove(task_id);
            if let Some(handle) = handle {
                handle.update_metadata(cancelled);
                handle.resolve(TaskOutcome::Cancelled);
                handle.abort();
            }
            info!(task_id = %task_id, from = %current.status(), "Task cancelled");
            return Ok(true);
        }

        warn!(task_id = %task_id, "Cancel lost the race twice, giving up");
        Ok(false)
    }

    /// Resolve the handle from the store when the stored status is already
    /// terminal. Returns whether it was.
    async fn settle_if_terminal(&self, handle: &TaskHandle) -> bool {
        match self.store.load_metadata(handle.id()).await {
            Ok(Some(metadata)) if metadata.status().is_terminal() => {
                debug!(
                    task_id = %handle.id(),
                    status = %metadata.status(),
                    "Stored status already terminal"
                );
                self.settle_from_store(handle).await;
                true
            }
            Ok(_) => false,
            Err(e) => {
                warn!(task_id = %handle.id(), error = %e, "Could not read stored status");
                false
            }
        }
    }

    /// Resolve `handle` from whatever the store says after a lost CAS.
    async fn settle_from_store(&self, handle: &TaskHandle) {
        let metadata = match self.store.load_metadata(handle.id()).await {
            Ok(Some(metadata)) => metadata,
            Ok(None) => {
                handle.resolve(TaskOutcome::Failed("task metadata disappeared".to_string()));
                return;
            }
            Err(e) => {
                handle.resolve(TaskOutcome::Failed(e.to_string()));
                return;
            }
        };

        let outcome = match metadata.status() {
            TaskStatus::Cancelled => Some(TaskOutcome::Cancelled),
            TaskStatus::Failed => Some(TaskOutcome::Failed(
                metadata.failure_reason().unwrap_or("task failed").to_string(),
            )),
            TaskStatus::Completed => Some(TaskOutcome::Completed(Value::Null)),
            TaskStatus::Paused => Some(TaskOutcome::Paused {
                reason: "paused concurrently".to_string(),
                pending_agent: None,
            }),
            TaskStatus::Created | TaskStatus::Running | TaskStatus::Retrying => None,
        };
        handle.update_metadata(metadata);
        if let Some(outcome) = outcome {
            handle.resolve(outcome);
        }
    }

    /// Move the task to `Running` for an attempt. `None` means stop.
    async fn activate(&self, handle: &TaskHandle) -> Option<TaskMetadata> {
        let current = match self.require_metadata(handle.id()).await {
            Ok(metadata) => metadata,
            Err(e) => {
                error!(task_id = %handle.id(), error = %e, "Cannot load task for execution");
                handle.resolve(TaskOutcome::Failed(e.to_string()));
                return None;
            }
        };

        if current.status() == TaskStatus::Running {
            return Some(current);
        }
        if current.status().is_terminal() {
            self.settle_from_store(handle).await;
            return None;
        }

        match self
            .store
            .compare_and_set_status(handle.id(), current.status(), TaskStatus::Running, None)
            .await
        {
            Ok(Some(running)) => Some(running),
            Ok(None) => {
                self.settle_from_store(handle).await;
                None
            }
            Err(e) => {
                error!(task_id = %handle.id(), error = %e, "Cannot activate task");
                handle.resolve(TaskOutcome::Failed(e.to_string()));
                None
            }
        }
    }

    /// CAS `Running -> next`; on a lost race settle from the store.
    async fn finish_transition(
        &self,
        handle: &TaskHandle,
        next: TaskStatus,
        failure_reason: Option<String>,
    ) -> Option<TaskMetadata> {
        match self
            .store
            .compare_and_set_status(handle.id(), TaskStatus::Running, next, failure_reason)
            .await
        {
            Ok(Some(metadata)) => {
                handle.update_metadata(metadata.clone());
                Some(metadata)
            }
            Ok(None) => {
                debug!(task_id = %handle.id(), to = %next, "Lost status race");
                self.settle_from_store(handle).await;
                None
            }
            Err(e) => {
                error!(task_id = %handle.id(), to = %next, error = %e, "Status update failed");
                handle.resolve(TaskOutcome::Failed(e.to_string()));
                None
            }
        }
    }
}

/// Runs a task to its next resting state: completed, failed, paused or
/// cancelled.
async fn run_task(
    inner: Arc<ServiceInner>,
    handle: TaskHandle,
    workflow: Arc<dyn TaskWorkflow>,
    settings: RunSettings,
) {
    let task_id = handle.id().clone();
    let retry = &settings.retry_policy;
    let mut attempt: u32 = 1;

    loop {
        let Some(running) = inner.activate(&handle).await else {
            break;
        };
        handle.update_metadata(running);
        debug!(task_id = %task_id, attempt, "Running workflow");

        match workflow.run(&task_id).await {
            Ok(value) => {
                let serialized = serde_json::to_string(&value).unwrap_or_else(|_| value.to_string());
                if inner
                    .finish_transition(&handle, TaskStatus::Completed, None)
                    .await
                    .is_some()
                {
                    inner
                        .append_best_effort(
                            &task_id,
                            TaskEventKind::TaskCompleted {
                                serialized_result: Some(serialized),
                            },
                        )
                        .await;
                    info!(task_id = %task_id, attempt, "Task completed");
                    handle.resolve(TaskOutcome::Completed(value));
                }
                break;
            }
            Err(WorkflowError::Paused {
                reason,
                pending_agent,
            }) => {
                if let Some(paused) = inner
                    .finish_transition(&handle, TaskStatus::Paused, None)
                    .await
                {
                    inner
                        .append_best_effort(
                            &task_id,
                            TaskEventKind::TaskPaused {
                                reason: reason.clone(),
                                pending_agent_name: pending_agent.clone(),
                            },
                        )
                        .await;
                    if settings.checkpoint_policy.checkpoints_after_agent() {
                        inner.checkpoint_without_scope(&paused).await;
                    }
                    info!(task_id = %task_id, reason = %reason, "Task paused");
                    handle.resolve(TaskOutcome::Paused {
                        reason,
                        pending_agent,
                    });
                }
                break;
            }
            Err(err) => {
                // A cancel that landed while the attempt was failing wins
                if inner.settle_if_terminal(&handle).await {
                    break;
                }
                let message = err.to_string();
                if retry.is_retryable(&err) && attempt <= retry.max_retries() {
                    let delay = retry.delay_for_attempt(attempt);
                    let delay_millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                    let Some(retrying) = inner
                        .finish_transition(&handle, TaskStatus::Retrying, None)
                        .await
                    else {
                        break;
                    };
                    warn!(
                        task_id = %task_id,
                        attempt,
                        max_retries = retry.max_retries(),
                        delay_ms = delay_millis,
                        error = %message,
                        "Task attempt failed, retrying"
                    );
                    inner
                        .append_best_effort(
                            &task_id,
                            TaskEventKind::TaskRetry {
                                attempt,
                                max_retries: retry.max_retries(),
                                error_message: message,
                                delay_millis,
                            },
                        )
                        .await;
                    if settings.checkpoint_policy.checkpoints_after_agent() {
                        inner.checkpoint_without_scope(&retrying).await;
                    }
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }

                if inner
                    .finish_transition(&handle, TaskStatus::Failed, Some(message.clone()))
                    .await
                    .is_some()
                {
                    inner
                        .append_best_effort(
                            &task_id,
                            TaskEventKind::TaskFailed {
                                error_message: message.clone(),
                                stack_trace: Some(err.stack_trace()),
                            },
                        )
                        .await;
                    error!(task_id = %task_id, attempt, error = %message, "Task failed");
                    handle.resolve(TaskOutcome::Failed(message));
                }
                break;
            }
        }
    }

    inner.release(&handle);
}

async fn enforce_timeout(inner: Weak<ServiceInner>, handle: TaskHandle, timeout: Duration) {
    tokio::select! {
        () = tokio::time::sleep(timeout) => {}
        _ = handle.wait() => return,
    }

    let Some(inner) = inner.upgrade() else {
        return;
    };
    let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    warn!(task_id = %handle.id(), timeout_ms, "Task timed out");
    if let Err(e) = inner.cancel(handle.id()).await {
        warn!(task_id = %handle.id(), error = %e, "Timeout cancellation failed");
    }
}

/// Routes handle cancellation back through the service without keeping it
/// alive.
struct ServiceCancellation {
    inner: Weak<ServiceInner>,
}

#[async_trait]
impl CancellationHook for ServiceCancellation {
    async fn cancel(&self, task_id: &TaskId) -> Result<bool, TaskError> {
        match self.inner.upgrade() {
            Some(inner) => inner.cancel(task_id).await,
            None => Ok(false),
        }
    }
}
