use agentflow_rt::{
    estimate_tokens, execute_tool_calls, maybe_compact, should_compact, tool, ContentBlock,
    EventSequence, Message, MessageRole, MiddlewarePipeline, ToolContext, ToolRegistry,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::time::Duration;

fn create_messages(count: usize, text_size: usize) -> Vec<Message> {
    let text = "a".repeat(text_size);
    (0..count)
        .map(|i| {
            if i == 0 {
                Message::system(&text)
            } else if i % 2 == 0 {
                Message::user(&text)
            } else {
                Message::assistant_text(&text)
            }
        })
        .collect()
}

fn create_messages_with_tools(count: usize) -> Vec<Message> {
    let mut messages = vec![Message::system("You are a helpful assistant")];

    for i in 0..count {
        if i % 3 == 0 {
            messages.push(Message::user("Calculate 2 + 2"));
        } else if i % 3 == 1 {
            messages.push(Message::assistant_blocks(vec![ContentBlock::tool_use(
                format!("tool_{i}"),
                "calculator",
                json!({"operation": "add", "a": 2, "b": 2}),
            )]));
        } else {
            messages.push(Message {
                role: MessageRole::User,
                content: agentflow_rt::MessageContent::Blocks(vec![ContentBlock::tool_result(format!("tool_{}", i - 1), json!({"result": 4}).to_string(), false)]),
            });
        }
    }

    messages
}

fn bench_estimate_tokens_by_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("estimate_tokens_by_count");

    for count in [0, 1, 5, 10, 20, 50, 100].iter() {
        let messages = create_messages(*count, 100);
        group.bench_with_input(BenchmarkId::from_parameter(count), &messages, |b, msgs| {
            b.iter(|| estimate_tokens(black_box(msgs)));
        });
    }

    group.finish();
}

fn bench_estimate_tokens_by_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("estimate_tokens_by_size");

    for size in [10, 100, 1000, 10000].iter() {
        let messages = create_messages(10, *size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &messages, |b, msgs| {
            b.iter(|| estimate_tokens(black_box(msgs)));
        });
    }

    group.finish();
}

fn bench_estimate_tokens_with_tools(c: &mut Criterion) {
    let mut group = c.benchmark_group("estimate_tokens_with_tools");

    for count in [3, 9, 30, 90].iter() {
        let messages = create_messages_with_tools(*count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &messages, |b, msgs| {
            b.iter(|| estimate_tokens(black_box(msgs)));
        });
    }

    group.finish();
}

fn bench_maybe_compact(c: &mut Criterion) {
    let mut group = c.benchmark_group("maybe_compact");

    let sizes = [("small", 20usize), ("medium", 50), ("large", 100)];
    for (name, count) in sizes {
        group.bench_with_input(BenchmarkId::new(name, count), &count, |b, &count| {
            b.iter_batched(
                || create_messages(count, 200),
                |mut msgs| maybe_compact(black_box(&mut msgs), black_box(50)),
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_maybe_compact_with_tools(c: &mut Criterion) {
    let mut group = c.benchmark_group("maybe_compact_with_tools");

    for count in [30, 90].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter_batched(
                || create_messages_with_tools(count),
                |mut msgs| maybe_compact(black_box(&mut msgs), black_box(50)),
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_should_compact(c: &mut Criterion) {
    let mut group = c.benchmark_group("should_compact");

    for count in [10, 50, 100].iter() {
        let messages = create_messages(*count, 500);
        group.bench_with_input(BenchmarkId::from_parameter(count), &messages, |b, msgs| {
            b.iter(|| should_compact(black_box(msgs), black_box(32000)));
        });
    }

    group.finish();
}

fn bench_realistic_workflow(c: &mut Criterion) {
    let mut group = c.benchmark_group("realistic_workflow");

    group.bench_function("check_and_compact", |b| {
        b.iter_batched(
            || create_messages(50, 200),
            |mut msgs| {
                if should_compact(black_box(&msgs), black_box(10_000)) {
                    maybe_compact(&mut msgs, 10_000);
                }
                msgs
            },
            criterion::BatchSize::SmallInput,
        );
    });

    group.finish();
}

/// Tool executor hot path: `execute_tool_calls` dispatching a batch of
/// trivial tool calls in parallel, with an empty middleware pipeline.
fn bench_execute_tool_calls(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("execute_tool_calls");

    for batch_size in [1usize, 5, 20].iter() {
        let echo = tool("echo", "echoes a value").param("value", "string").build(|args, _ctx| {
            Box::pin(async move { Ok(args["value"].as_str().unwrap_or_default().to_string()) })
        });
        let registry = ToolRegistry::build(vec![echo]).unwrap();
        let calls: Vec<(String, String, serde_json::Value)> =
            (0..*batch_size).map(|i| (format!("t{i}"), "echo".to_string(), json!({"value": "hi"}))).collect();

        group.bench_with_input(BenchmarkId::from_parameter(batch_size), &calls, |b, calls| {
            b.iter(|| {
                rt.block_on(async {
                    execute_tool_calls(
                        black_box(calls),
                        &registry,
                        &ToolContext::default(),
                        &MiddlewarePipeline::new(),
                        &EventSequence::new(),
                        None,
                        "bench",
                        Duration::from_secs(5),
                    )
                    .await
                    .unwrap()
                })
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_estimate_tokens_by_count,
    bench_estimate_tokens_by_size,
    bench_estimate_tokens_with_tools,
    bench_maybe_compact,
    bench_maybe_compact_with_tools,
    bench_should_compact,
    bench_realistic_workflow,
    bench_execute_tool_calls,
);
criterion_main!(benches);
