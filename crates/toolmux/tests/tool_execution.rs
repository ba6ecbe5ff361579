use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_stream::stream;
use futures::StreamExt;
use serde_json::json;
use tokio::sync::Mutex;
use uuid::Uuid;

use toolmux::{
    execute_tools, Content, ExecutionEvent, FunctionHandler, InvocationResult, ToolError,
    ToolHandler, ToolNotification, ToolRequest, ToolStream, ToolStreamItem,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn outputs() -> (Arc<Mutex<Vec<String>>>, Arc<Mutex<Vec<InvocationResult>>>) {
    (
        Arc::new(Mutex::new(Vec::new())),
        Arc::new(Mutex::new(Vec::new())),
    )
}

/// Arithmetic handler: `add` sums `a` and `b` from the request input and
/// reports progress along the way; anything else is not found.
fn arithmetic_handler(calls: Arc<AtomicUsize>) -> Arc<dyn ToolHandler> {
    Arc::new(FunctionHandler::new(move |req: &ToolRequest| -> ToolStream {
        calls.fetch_add(1, Ordering::SeqCst);
        let name = req.name.clone();
        let input = req.input.clone();
        Box::pin(stream! {
            if name != "add" {
                yield ToolStreamItem::Result(Err(ToolError::NotFound(name)));
                return;
            }
            yield ToolStreamItem::Notification(ToolNotification::new(
                "progress",
                json!({"stage": "computing"}),
            ));
            let a = input["a"].as_i64().unwrap_or(0);
            let b = input["b"].as_i64().unwrap_or(0);
            yield ToolStreamItem::Result(Ok(vec![Content::text((a + b).to_string())]));
        })
    }))
}

#[tokio::test]
async fn single_successful_invocation_end_to_end() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let (invalid_ids, results) = outputs();

    let request = ToolRequest::new("t1", "add", json!({"a": 1, "b": 2}));
    let events: Vec<_> = execute_tools(
        arithmetic_handler(Arc::clone(&calls)),
        vec![request],
        Arc::clone(&invalid_ids),
        Arc::clone(&results),
    )
    .collect()
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(invalid_ids.lock().await.is_empty());

    let events: Vec<_> = events.into_iter().map(Result::unwrap).collect();
    assert_eq!(events.len(), 2);
    assert!(
        matches!(&events[0], ExecutionEvent::Notification { request_id, .. } if request_id == "t1")
    );

    let results = results.lock().await;
    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.id, "t1");
    assert!(result.is_success());
    assert_eq!(result.content, vec![Content::text("3")]);
}

#[tokio::test]
async fn mixed_batch_keeps_every_result_correlated_and_ordered() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let (invalid_ids, results) = outputs();

    let ids: Vec<String> = (0..4).map(|_| Uuid::new_v4().to_string()).collect();
    let requests = vec![
        ToolRequest::new(&ids[0], "add", json!({"a": 2, "b": 3})),
        ToolRequest::new(&ids[1], "bad name!", json!({})),
        ToolRequest::new(&ids[2], "subtract", json!({})),
        ToolRequest::new(&ids[3], "add", json!({"a": 40, "b": 2})),
    ];

    let mut stream = execute_tools(
        arithmetic_handler(Arc::clone(&calls)),
        requests,
        Arc::clone(&invalid_ids),
        Arc::clone(&results),
    );
    while let Some(event) = stream.next().await {
        event.unwrap();
    }

    // the malformed request never reached the handler
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(*invalid_ids.lock().await, vec![ids[1].clone()]);

    let results = results.lock().await;
    let result_ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
    let expected: Vec<_> = ids.iter().map(String::as_str).collect();
    assert_eq!(result_ids, expected);

    assert!(results[0].is_success());
    assert_eq!(results[0].content, vec![Content::text("5")]);
    // malformed name: synthesized locally
    assert!(results[1].is_error());
    // unknown tool: downgraded handler failure, uniformly shaped
    assert!(results[2].is_error());
    assert!(results[2].content[0].as_text().unwrap().contains("subtract"));
    assert!(results[3].is_success());
    assert_eq!(results[3].content, vec![Content::text("42")]);
}
