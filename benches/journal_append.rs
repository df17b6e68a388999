use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use durable_tasks::{
    FileTaskStore, InMemoryTaskStore, TaskEvent, TaskEventKind, TaskExecutionStore, TaskId,
};
use serde_json::json;
use std::collections::HashMap;

fn completed(task_id: &TaskId, step: usize) -> TaskEvent {
    TaskEvent::now(
        task_id.clone(),
        TaskEventKind::AgentInvocationCompleted {
            agent_name: format!("agent-{step}"),
            agent_id: None,
            serialized_output: Some(json!({ "step": step, "text": "lorem ipsum" }).to_string()),
        },
    )
}

fn bench_append(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let file_store = FileTaskStore::new(dir.path());
    let memory_store = InMemoryTaskStore::new();
    let task_id = TaskId::new("bench-append");
    let event = completed(&task_id, 0);

    let mut group = c.benchmark_group("journal_append");
    group.bench_function("in_memory", |b| {
        b.to_async(&runtime)
            .iter(|| async { memory_store.append_event(black_box(&event)).await.unwrap() });
    });
    group.bench_function("file", |b| {
        b.to_async(&runtime)
            .iter(|| async { file_store.append_event(black_box(&event)).await.unwrap() });
    });
    group.finish();
}

fn bench_load(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let store = FileTaskStore::new(dir.path());

    let mut group = c.benchmark_group("journal_load");
    for size in [10usize, 100, 1000] {
        let task_id = TaskId::new(format!("bench-load-{size}"));
        runtime.block_on(async {
            for step in 0..size {
                store.append_event(&completed(&task_id, step)).await.unwrap();
            }
        });

        group.bench_with_input(BenchmarkId::from_parameter(size), &task_id, |b, task_id| {
            b.to_async(&runtime)
                .iter(|| async { black_box(store.load_events(task_id).await.unwrap()) });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_append, bench_load);
criterion_main!(benches);
