use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use toolgate_model::{
    ModelFinishReason, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse, ModelResponseEvent, ToolCallRequest,
};
use tracing::Instrument;

use crate::error::{Backend, Error};
use crate::retry::RetryPolicy;

type AttemptResult = Result<CompletedTurn, Box<dyn ModelProviderError>>;
type AttemptFuture = Pin<Box<dyn Future<Output = AttemptResult> + Send>>;
type AttemptFn = Arc<dyn Fn(ModelRequest) -> AttemptFuture + Send + Sync>;

/// Receives the text of each assistant turn.
pub type TranscriptFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Asks a model for complete assistant turns.
///
/// The provider type is erased, so the workflow and any tool that needs the
/// model can share one client. A client retries transient provider failures
/// according to its [`RetryPolicy`] (none by default).
#[derive(Clone)]
pub struct ModelClient {
    attempt_fn: AttemptFn,
    retry_policy: RetryPolicy,
}

impl ModelClient {
    /// Wraps a provider. The client makes a single attempt per turn until
    /// a retry policy is set.
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        let attempt_fn: AttemptFn = Arc::new(move |req| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("requesting a turn after {} messages", req.messages.len());
                    match fut.await {
                        Ok(resp) => collect_turn(resp).await,
                        Err(err) => Err(Box::new(err) as Box<dyn ModelProviderError>),
                    }
                }
                .instrument(trace_span!("model turn")),
            )
        });
        Self {
            attempt_fn,
            retry_policy: RetryPolicy::none(),
        }
    }

    /// Sets how transient provider failures are retried.
    #[inline]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Generates the next assistant turn for `req`.
    ///
    /// `on_transcript` sees the text of the successful attempt only, once
    /// the turn is complete. Provider failures that outlive the retries are
    /// reported as [`Error::BackendUnavailable`] if they're transient, and
    /// as [`Error::Model`] otherwise.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. Dropping the future stops the response
    /// from streaming further.
    pub async fn complete(
        &self,
        req: ModelRequest,
        on_transcript: Option<&TranscriptFn>,
    ) -> Result<CompletedTurn, Error> {
        let turn = self
            .retry_policy
            .run(
                "model request",
                |err: &Box<dyn ModelProviderError>| err.is_transient(),
                || (self.attempt_fn)(req.clone()),
            )
            .await
            .map_err(|err| {
                let reason = err.to_string();
                if err.is_transient() {
                    Error::BackendUnavailable {
                        backend: Backend::Model,
                        reason,
                    }
                } else {
                    Error::Model {
                        kind: err.kind(),
                        reason,
                    }
                }
            })?;

        match turn.finish_reason {
            Some(ModelFinishReason::Length) => {
                warn!("the model ran out of output tokens");
            }
            None => warn!("the turn ended without a finish reason"),
            _ => {}
        }
        if let Some(on_transcript) = on_transcript {
            if !turn.text.is_empty() {
                on_transcript(&turn.text);
            }
        }
        Ok(turn)
    }
}

/// An assistant turn received in full.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedTurn {
    /// The assistant's text, possibly empty.
    pub text: String,
    /// Tool calls requested by the model, in the order they arrived.
    pub tool_calls: Vec<ToolCallRequest>,
    /// Why the model ended the turn.
    pub finish_reason: Option<ModelFinishReason>,
}

async fn collect_turn<R: ModelResponse>(resp: R) -> AttemptResult {
    let mut turn = CompletedTurn {
        text: String::new(),
        tool_calls: vec![],
        finish_reason: None,
    };

    let mut resp = pin!(resp);
    loop {
        let event = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
            .await
            .map_err(|err| {
                debug!("the turn broke off: {err}");
                Box::new(err) as Box<dyn ModelProviderError>
            })?;
        let Some(event) = event else {
            break;
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(delta) => turn.text.push_str(&delta),
            ModelResponseEvent::ToolCall(call) => turn.tool_calls.push(call),
            ModelResponseEvent::Completed(reason) => {
                turn.finish_reason = Some(reason);
            }
        }
    }
    Ok(turn)
}
