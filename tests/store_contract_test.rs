//! Behaviour every `TaskExecutionStore` implementation must share.

mod common;

use chrono::Utc;
use durable_tasks::{
    Checkpoint, FileTaskStore, InMemoryTaskStore, StoreError, TaskEvent, TaskEventKind,
    TaskExecutionStore, TaskId, TaskMetadata, TaskStatus,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

fn metadata(id: &str) -> TaskMetadata {
    TaskMetadata::create(
        TaskId::new(id),
        "writer",
        HashMap::from([("team".to_string(), "docs".to_string())]),
    )
}

fn completed(id: &TaskId, agent: &str, output: &str) -> TaskEvent {
    TaskEvent::now(
        id.clone(),
        TaskEventKind::AgentInvocationCompleted {
            agent_name: agent.to_string(),
            agent_id: None,
            serialized_output: Some(output.to_string()),
        },
    )
}

fn checkpoint(metadata: &TaskMetadata, event_count: usize, scope: &str) -> Checkpoint {
    Checkpoint {
        task_id: metadata.id().clone(),
        metadata: metadata.clone(),
        serialized_scope: Some(scope.to_string()),
        event_count,
        taken_at: Utc::now(),
    }
}

async fn check_metadata_roundtrip(store: &dyn TaskExecutionStore) {
    let meta = metadata("meta-1");
    assert!(store.load_metadata(meta.id()).await.unwrap().is_none());

    store.save_metadata(&meta).await.unwrap();
    assert_eq!(store.load_metadata(meta.id()).await.unwrap(), Some(meta.clone()));

    let running = meta.transition_to(TaskStatus::Running, None).unwrap();
    store.save_metadata(&running).await.unwrap();
    let loaded = store.load_metadata(meta.id()).await.unwrap().unwrap();
    assert_eq!(loaded.status(), TaskStatus::Running);
    assert_eq!(loaded.labels().get("team").map(String::as_str), Some("docs"));
}

async fn check_events_keep_append_order(store: &dyn TaskExecutionStore) {
    let id = TaskId::new("events-1");
    store.save_metadata(&metadata("events-1")).await.unwrap();
    assert!(store.load_events(&id).await.unwrap().is_empty());

    for n in 0..5 {
        store
            .append_event(&completed(&id, &format!("agent-{n}"), &n.to_string()))
            .await
            .unwrap();
    }

    let events = store.load_events(&id).await.unwrap();
    let agents: Vec<String> = events
        .iter()
        .map(|e| match &e.kind {
            TaskEventKind::AgentInvocationCompleted { agent_name, .. } => agent_name.clone(),
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(agents, vec!["agent-0", "agent-1", "agent-2", "agent-3", "agent-4"]);
    assert_eq!(store.event_count(&id).await.unwrap(), 5);
}

async fn check_checkpoint_keeps_latest(store: &dyn TaskExecutionStore) {
    let meta = metadata("ckpt-1");
    store.save_metadata(&meta).await.unwrap();
    assert!(store.load_checkpoint(meta.id()).await.unwrap().is_none());

    store.save_checkpoint(&checkpoint(&meta, 2, "{\"a\":1}")).await.unwrap();
    store.save_checkpoint(&checkpoint(&meta, 4, "{\"a\":2}")).await.unwrap();

    let latest = store.load_checkpoint(meta.id()).await.unwrap().unwrap();
    assert_eq!(latest.event_count, 4);
    assert_eq!(latest.serialized_scope.as_deref(), Some("{\"a\":2}"));
}

async fn check_listing_and_delete(store: &dyn TaskExecutionStore) {
    let a = metadata("list-a");
    let b = metadata("list-b").transition_to(TaskStatus::Running, None).unwrap();
    store.save_metadata(&a).await.unwrap();
    store.save_metadata(&b).await.unwrap();
    store.append_event(&completed(b.id(), "x", "1")).await.unwrap();

    let all = store.get_all_task_ids().await.unwrap();
    assert!(all.contains(a.id()));
    assert!(all.contains(b.id()));

    let running = store.get_task_ids_by_status(TaskStatus::Running).await.unwrap();
    assert!(running.contains(b.id()));
    assert!(!running.contains(a.id()));

    assert!(store.delete(b.id()).await.unwrap());
    assert!(!store.delete(b.id()).await.unwrap());
    assert!(store.load_metadata(b.id()).await.unwrap().is_none());
    assert!(store.load_events(b.id()).await.unwrap().is_empty());
    assert!(!store.get_all_task_ids().await.unwrap().contains(b.id()));
}

async fn check_compare_and_set(store: &dyn TaskExecutionStore) {
    let meta = metadata("cas-1");
    store.save_metadata(&meta).await.unwrap();

    let running = store
        .compare_and_set_status(meta.id(), TaskStatus::Created, TaskStatus::Running, None)
        .await
        .unwrap()
        .expect("CAS from the current status succeeds");
    assert_eq!(running.status(), TaskStatus::Running);

    // Stale expectation loses
    let stale = store
        .compare_and_set_status(meta.id(), TaskStatus::Created, TaskStatus::Cancelled, None)
        .await
        .unwrap();
    assert!(stale.is_none());

    let failed = store
        .compare_and_set_status(
            meta.id(),
            TaskStatus::Running,
            TaskStatus::Failed,
            Some("boom".to_string()),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failed.failure_reason(), Some("boom"));

    let err = store
        .compare_and_set_status(meta.id(), TaskStatus::Failed, TaskStatus::Running, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidTransition { .. }));

    let missing = store
        .compare_and_set_status(
            &TaskId::new("cas-missing"),
            TaskStatus::Created,
            TaskStatus::Running,
            None,
        )
        .await
        .unwrap();
    assert!(missing.is_none());
}

async fn check_concurrent_cas_has_one_winner(store: Arc<dyn TaskExecutionStore>) {
    let meta = metadata("cas-race").transition_to(TaskStatus::Running, None).unwrap();
    store.save_metadata(&meta).await.unwrap();

    let attempts = [TaskStatus::Completed, TaskStatus::Cancelled, TaskStatus::Failed];
    let tasks: Vec<_> = attempts
        .into_iter()
        .map(|target| {
            let store = Arc::clone(&store);
            let id = meta.id().clone();
            tokio::spawn(async move {
                store
                    .compare_and_set_status(&id, TaskStatus::Running, target, None)
                    .await
                    .unwrap()
            })
        })
        .collect();

    let winners = futures::future::join_all(tasks)
        .await
        .into_iter()
        .filter(|r| r.as_ref().unwrap().is_some())
        .count();
    assert_eq!(winners, 1);
}

async fn run_contract(store: Arc<dyn TaskExecutionStore>) {
    check_metadata_roundtrip(store.as_ref()).await;
    check_events_keep_append_order(store.as_ref()).await;
    check_checkpoint_keeps_latest(store.as_ref()).await;
    check_listing_and_delete(store.as_ref()).await;
    check_compare_and_set(store.as_ref()).await;
    check_concurrent_cas_has_one_winner(store).await;
}

#[tokio::test]
async fn test_in_memory_store_contract() {
    run_contract(Arc::new(InMemoryTaskStore::new())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_file_store_contract() {
    let dir = common::temp_dir();
    run_contract(Arc::new(FileTaskStore::new(dir.path()))).await;
}

#[tokio::test]
async fn test_file_store_survives_restart() {
    let dir = common::temp_dir();
    let meta = metadata("restart-1");

    {
        let store = FileTaskStore::new(dir.path());
        store.save_metadata(&meta).await.unwrap();
        store.append_event(&completed(meta.id(), "a", "{\"n\":1}")).await.unwrap();
        store.append_event(&completed(meta.id(), "b", "{\"n\":2}")).await.unwrap();
        store.save_checkpoint(&checkpoint(&meta, 2, "{}")).await.unwrap();
    }

    let reopened = FileTaskStore::new(dir.path());
    assert_eq!(reopened.load_metadata(meta.id()).await.unwrap(), Some(meta.clone()));
    assert_eq!(reopened.event_count(meta.id()).await.unwrap(), 2);
    assert_eq!(
        reopened.load_checkpoint(meta.id()).await.unwrap().unwrap().event_count,
        2
    );
    assert!(reopened.get_all_task_ids().await.unwrap().contains(meta.id()));

    let events = reopened.load_events(meta.id()).await.unwrap();
    match &events[0].kind {
        TaskEventKind::AgentInvocationCompleted {
            serialized_output, ..
        } => {
            let value: serde_json::Value =
                serde_json::from_str(serialized_output.as_deref().unwrap()).unwrap();
            assert_eq!(value, json!({"n": 1}));
        }
        other => panic!("unexpected event {other:?}"),
    }
}
