use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use pin_project_lite::pin_project;
use serde_json::Value;
use toolgate_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
    ToolCallRequest,
};

use crate::Error;
use crate::io::{Sse, SseError};
use crate::proto::{ChatCompletionChunk, FunctionNames, ToolCall};

struct PartialState {
    sse: Sse,
    names: FunctionNames,
    id: Option<String>,
    tool_calls: Vec<ToolCall>,
    // This field records the index of the tool calls that are generated but not
    // yet sent to the model user. When calling `poll_next_event`, the response
    // will return the pending tool calls.
    pending_tool_call_idx: VecDeque<usize>,
    // This field will be cleared after the response returns the complete event.
    pending_finish_reason: Option<ModelFinishReason>,
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    pub struct OpenAIResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub fn from_sse(sse: Sse, names: FunctionNames) -> Self {
        let partial_state = PartialState {
            sse,
            names,
            id: None,
            tool_calls: Default::default(),
            pending_tool_call_idx: Default::default(),
            pending_finish_reason: Default::default(),
        };
        let next_event_fut = async move { next_event(partial_state).await };
        Self {
            next_event_fut: Some(Box::pin(next_event_fut)),
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, _)) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        // The stream may still have more data to pull, create a new future for
        // the next event.
        let next_event_fut = async move { next_event(partial_state).await };
        *this.next_event_fut = Some(Box::pin(next_event_fut));

        Poll::Ready(Ok(Some(event)))
    }
}

async fn next_event(
    mut partial_state: PartialState,
) -> Result<(Option<ModelResponseEvent>, PartialState), Error> {
    let mut message_delta = None;

    // Once the finish reason is known, only the queued events are left.
    while partial_state.pending_finish_reason.is_none() {
        let sse_event = match partial_state.sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(SseError::ChunksError(err)) => {
                let kind = if err.transient {
                    ErrorKind::Unavailable
                } else {
                    ErrorKind::Other
                };
                return Err(Error::new(err.reason, kind));
            }
            Err(err) => {
                return Err(Error::new(format!("{err:?}"), ErrorKind::Other));
            }
        };
        trace!("got sse event: {sse_event}");
        if sse_event == "[DONE]" {
            break;
        }

        let mut chunk = serde_json::from_str::<ChatCompletionChunk>(&sse_event)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
        if partial_state.id.get_or_insert_with(|| chunk.id.clone()) != &chunk.id
        {
            return Err(Error::new("chunk id mismatch", ErrorKind::Other));
        };

        // The usage chunk carries no choices.
        let Some(choice) = chunk.choices.pop() else {
            continue;
        };

        if let Some(content) = choice.delta.content {
            if !content.is_empty() {
                message_delta = Some(content);
            }
        }
        if let Some(tool_calls) = choice.delta.tool_calls {
            merge_tool_calls(&mut partial_state, tool_calls);
        }
        if let Some(finish_reason) = choice.finish_reason {
            partial_state.pending_finish_reason =
                Some(match finish_reason.as_str() {
                    "tool_calls" => ModelFinishReason::ToolCalls,
                    "length" => ModelFinishReason::Length,
                    _ => ModelFinishReason::Stop,
                });
        }

        if message_delta.is_some() {
            break;
        }
    }

    // The order of events are important. Always emit message delta first, then
    // emit pending tool calls, and finally emit pending finish reason if any.

    if let Some(message_delta) = message_delta {
        return Ok((
            Some(ModelResponseEvent::MessageDelta(message_delta)),
            partial_state,
        ));
    }

    if let Some(idx) = partial_state.pending_tool_call_idx.pop_front() {
        let event = tool_call_event(&partial_state.tool_calls[idx], &partial_state.names);
        return Ok((Some(event), partial_state));
    }

    if let Some(finish_reason) = partial_state.pending_finish_reason.take() {
        return Ok((
            Some(ModelResponseEvent::Completed(finish_reason)),
            partial_state,
        ));
    }

    Ok((None, partial_state))
}

fn merge_tool_calls(partial_state: &mut PartialState, tool_calls: Vec<ToolCall>) {
    for tool_call in tool_calls {
        let Some(partial_tool_call) = partial_state
            .tool_calls
            .iter_mut()
            .find(|t| t.index == tool_call.index)
        else {
            partial_state
                .pending_tool_call_idx
                .push_back(partial_state.tool_calls.len());
            partial_state.tool_calls.push(tool_call);
            continue;
        };
        // Patch the partial tool call.
        if let Some(id) = tool_call.id {
            partial_tool_call.id.get_or_insert_default().push_str(&id);
        }
        if let Some(function) = tool_call.function {
            match partial_tool_call.function {
                Some(ref mut partial_func) => {
                    if let Some(name) = function.name {
                        partial_func.name.get_or_insert_default().push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        partial_func
                            .arguments
                            .get_or_insert_default()
                            .push_str(&arguments);
                    }
                }
                None => partial_tool_call.function = Some(function),
            }
        }
    }
}

fn tool_call_event(tool_call: &ToolCall, names: &FunctionNames) -> ModelResponseEvent {
    let function = tool_call.function.as_ref();
    let id = tool_call.id.clone().unwrap_or_default();
    let name = function
        .and_then(|f| f.name.as_deref())
        .map(|name| names.tool_name(name))
        .unwrap_or_default();
    let raw_arguments = function
        .and_then(|f| f.arguments.as_deref())
        .unwrap_or_default();
    let arguments = if raw_arguments.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        // Malformed arguments are passed through, the tool will reject them.
        serde_json::from_str(raw_arguments)
            .unwrap_or_else(|_| Value::String(raw_arguments.to_owned()))
    };
    ModelResponseEvent::ToolCall(ToolCallRequest {
        id,
        name,
        arguments,
    })
}
