//! A local fake model for testing purpose.

mod preset;

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use tokio::time::{Sleep, sleep};
use toolgate_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ModelResponseEvent,
};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    preset: PresetResponse,
    interrupted: bool,
    event_idx: usize,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();

        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;

            let preset_events = &this.preset.events;
            if this.event_idx < preset_events.len() {
                let event = match &preset_events[this.event_idx] {
                    PresetEvent::MessageDelta(msg) => {
                        ModelResponseEvent::MessageDelta(msg.clone())
                    }
                    PresetEvent::ToolCall(req) => {
                        ModelResponseEvent::ToolCall(req.clone())
                    }
                };
                this.event_idx += 1;
                return Poll::Ready(Ok(Some(event)));
            } else if this.event_idx == preset_events.len() {
                this.event_idx += 1;
                if this.interrupted {
                    return Poll::Ready(Err(Error {
                        message: "stream interrupted",
                        kind: ErrorKind::Unavailable,
                    }));
                }
                return Poll::Ready(Ok(Some(ModelResponseEvent::Completed(
                    if this.preset.has_tool_call() {
                        ModelFinishReason::ToolCalls
                    } else {
                        ModelFinishReason::Stop
                    },
                ))));
            } else {
                // In case this method is called after completion.
                return Poll::Ready(Ok(None));
            }
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_event(cx)
    }
}

#[derive(Clone)]
struct ScriptedTurn {
    preset: PresetResponse,
    attempts: Arc<AtomicU64>,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the conversation script, which
/// is how the model should respond to a request. The assistant turn to replay
/// is selected by counting the assistant messages already present in the
/// request, so tool results and extra user inputs don't shift the script. If
/// there are no enough turns in the script, an error will be returned.
///
/// Every request is recorded and can be inspected afterwards.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    conversation_script: Vec<ScriptedTurn>,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
}

impl TestModelProvider {
    #[inline]
    pub fn add_assistant_turn(&mut self, preset: PresetResponse) {
        self.conversation_script.push(ScriptedTurn {
            preset,
            attempts: Default::default(),
        });
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far, including the failed ones.
    pub fn recorded_requests(&self) -> Vec<ModelRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, req: &ModelRequest) {
        let mut requests = match self.requests.lock() {
            Ok(requests) => requests,
            Err(poisoned) => poisoned.into_inner(),
        };
        requests.push(req.clone());
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        self.record(req);

        let turn_idx = req
            .messages
            .iter()
            .filter(|msg| matches!(msg, ModelMessage::Assistant { .. }))
            .count();
        let result = 'blk: {
            let Some(turn) = self.conversation_script.get(turn_idx) else {
                break 'blk Err(Error {
                    message: "no enough turns",
                    kind: ErrorKind::Other,
                });
            };

            let attempt = turn.attempts.fetch_add(1, Ordering::Relaxed);
            let failures = match turn.preset.failures {
                Some(0) => u64::MAX,
                Some(failures) => failures,
                None => 0,
            };
            let should_fail = attempt < failures;
            if should_fail {
                break 'blk Err(Error {
                    message: "injected failure",
                    kind: ErrorKind::Unavailable,
                });
            }

            Ok(TestModelResponse {
                preset: turn.preset.clone(),
                interrupted: attempt - failures < turn.preset.interruptions,
                event_idx: 0,
                delay: self.delay.unwrap_or(Duration::from_millis(1)),
                sleep: None,
            })
        };
        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use serde_json::json;
    use toolgate_model::{ModelTool, ToolCallRequest};

    use super::*;

    async fn collect_response(
        resp: TestModelResponse,
    ) -> (String, Option<ToolCallRequest>) {
        let mut resp = pin!(resp);
        let mut msg = String::new();
        let mut tool_call = None;
        loop {
            let event = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
                .await
                .unwrap()
                .unwrap();
            match event {
                ModelResponseEvent::Completed(_) => break,
                ModelResponseEvent::MessageDelta(delta) => {
                    msg.push_str(&delta);
                }
                ModelResponseEvent::ToolCall(req) => tool_call = Some(req),
            }
        }
        (msg, tool_call)
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut provider = TestModelProvider::default();
        provider.add_assistant_turn(PresetResponse::with_events([
            PresetEvent::MessageDelta("Hello, ".to_owned()),
            PresetEvent::MessageDelta("world!".to_owned()),
        ]));
        provider.add_assistant_turn(PresetResponse::with_events([
            PresetEvent::MessageDelta("Sure, ".to_owned()),
            PresetEvent::MessageDelta("let me look it up.".to_owned()),
            PresetEvent::ToolCall(ToolCallRequest {
                id: "tool:1".to_owned(),
                name: "wiki_search".to_owned(),
                arguments: json!({ "query": "otters" }),
            }),
        ]));

        let mut req = ModelRequest {
            messages: vec![ModelMessage::user("Hi")],
            tools: vec![ModelTool {
                name: "wiki_search".to_owned(),
                description: "Searches Wikipedia".to_owned(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "What to search for"
                        }
                    }
                }),
            }],
        };
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, _) = collect_response(resp).await;
        assert_eq!(msg, "Hello, world!");

        req.messages.push(ModelMessage::assistant(msg));
        req.messages.push(ModelMessage::user("Tell me about otters"));
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, tool_call) = collect_response(resp).await;
        assert_eq!(msg, "Sure, let me look it up.");
        let tool_call = tool_call.unwrap();
        assert_eq!(tool_call.name, "wiki_search");
        assert_eq!(tool_call.arguments, json!({ "query": "otters" }));

        assert_eq!(provider.recorded_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let mut provider = TestModelProvider::default();
        provider.add_assistant_turn(
            PresetResponse::with_text("Finally.").with_failures(2),
        );

        let req = ModelRequest {
            messages: vec![ModelMessage::user("Hi")],
            tools: vec![],
        };
        for _ in 0..2 {
            let err = provider.send_request(&req).await.err().unwrap();
            assert_eq!(err.kind(), ErrorKind::Unavailable);
        }
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, _) = collect_response(resp).await;
        assert_eq!(msg, "Finally.");
    }

    #[tokio::test]
    async fn test_interrupted_stream() {
        let mut provider = TestModelProvider::default();
        provider.add_assistant_turn(
            PresetResponse::with_text("Half").with_interruptions(1),
        );

        let req = ModelRequest {
            messages: vec![ModelMessage::user("Hi")],
            tools: vec![],
        };
        let mut resp = pin!(provider.send_request(&req).await.unwrap());
        let event = poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await;
        assert_eq!(
            event.unwrap(),
            Some(ModelResponseEvent::MessageDelta("Half".to_owned()))
        );
        let err = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);

        let resp = provider.send_request(&req).await.unwrap();
        let (msg, _) = collect_response(resp).await;
        assert_eq!(msg, "Half");
    }

    #[tokio::test]
    async fn test_script_exhausted() {
        let provider = TestModelProvider::default();
        let req = ModelRequest {
            messages: vec![ModelMessage::user("Hi")],
            tools: vec![],
        };
        let err = provider.send_request(&req).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Other);
    }
}
