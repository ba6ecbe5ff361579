use std::future::Future;
use std::pin::Pin;

use futures::{Stream, StreamExt};

use toolmux_core::{Content, ToolNotification, ToolRequest, ToolResult};

/// One item of a tool's event stream. The terminal `Result` item is always
/// the last one; anything after it is ignored.
#[derive(Debug, Clone)]
pub enum ToolStreamItem {
    Notification(ToolNotification),
    Result(ToolResult<Vec<Content>>),
}

pub type ToolStream = Pin<Box<dyn Stream<Item = ToolStreamItem> + Send>>;

/// Performs an invocation's work. Implementations may run in-process, shell
/// out, or proxy to a remote protocol client; the engine only relies on the
/// stream ending with a terminal `Result` item.
pub trait ToolHandler: Send + Sync {
    fn stream(&self, request: &ToolRequest) -> ToolStream;
}

/// Native-function handler variant: wraps a plain closure producing the
/// event stream.
pub struct FunctionHandler<F> {
    call: F,
}

impl<F> FunctionHandler<F>
where
    F: Fn(&ToolRequest) -> ToolStream + Send + Sync,
{
    pub fn new(call: F) -> Self {
        Self { call }
    }
}

impl<F> ToolHandler for FunctionHandler<F>
where
    F: Fn(&ToolRequest) -> ToolStream + Send + Sync,
{
    fn stream(&self, request: &ToolRequest) -> ToolStream {
        (self.call)(request)
    }
}

// tool_stream combines a stream of notifications with a future representing
// the final outcome of the tool call, so a handler built from the common
// channel-plus-future pair presents the single-stream contract. The select
// is biased toward the notification side: queued notifications drain before
// the terminal result closes the stream.
pub fn tool_stream<S, F>(rx: S, done: F) -> ToolStream
where
    S: Stream<Item = ToolNotification> + Send + Unpin + 'static,
    F: Future<Output = ToolResult<Vec<Content>>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        tokio::pin!(done);
        let mut rx = rx;

        loop {
            tokio::select! {
                biased;
                Some(msg) = rx.next() => {
                    yield ToolStreamItem::Notification(msg);
                }
                r = &mut done => {
                    yield ToolStreamItem::Result(r);
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    #[tokio::test]
    async fn tool_stream_relays_notifications_then_result() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tx.send(ToolNotification::new("progress", json!({"pct": 50})))
            .unwrap();
        tx.send(ToolNotification::new("progress", json!({"pct": 100})))
            .unwrap();
        drop(tx);

        let stream = tool_stream(UnboundedReceiverStream::new(rx), async {
            Ok(vec![Content::text("done")])
        });
        let items: Vec<_> = stream.collect().await;

        assert_eq!(items.len(), 3);
        assert!(matches!(&items[0], ToolStreamItem::Notification(n) if n.params["pct"] == 50));
        assert!(matches!(&items[1], ToolStreamItem::Notification(n) if n.params["pct"] == 100));
        match &items[2] {
            ToolStreamItem::Result(Ok(content)) => {
                assert_eq!(content[0].as_text(), Some("done"));
            }
            other => panic!("expected terminal result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn tool_stream_ends_with_result_when_no_notifications_arrive() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<ToolNotification>();
        drop(tx);

        let stream = tool_stream(UnboundedReceiverStream::new(rx), async {
            Err(toolmux_core::ToolError::ExecutionError("kaput".into()))
        });
        let items: Vec<_> = stream.collect().await;

        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], ToolStreamItem::Result(Err(_))));
    }

    #[tokio::test]
    async fn function_handler_delegates_to_the_closure() {
        let handler = FunctionHandler::new(|request: &ToolRequest| -> ToolStream {
            let id = request.id.clone();
            Box::pin(async_stream::stream! {
                yield ToolStreamItem::Result(Ok(vec![Content::text(id)]));
            })
        });

        let request = ToolRequest::new("t1", "echo", json!({}));
        let items: Vec<_> = handler.stream(&request).collect().await;
        assert_eq!(items.len(), 1);
        match &items[0] {
            ToolStreamItem::Result(Ok(content)) => assert_eq!(content[0].as_text(), Some("t1")),
            other => panic!("expected terminal result, got {other:?}"),
        }
    }
}
