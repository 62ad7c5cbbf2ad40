use std::pin::Pin;
use std::task::{self, Poll};

use serde::{Deserialize, Serialize};

use crate::error::ModelProviderError;
use crate::request::ToolCallRequest;

/// An assistant turn as it's being generated.
///
/// A well-formed turn is a sequence of [`ModelResponseEvent`]s in this
/// order:
///
/// 1. zero or more [`MessageDelta`](ModelResponseEvent::MessageDelta)s,
///    which concatenated form the assistant's text;
/// 2. zero or more complete [`ToolCall`](ModelResponseEvent::ToolCall)s,
///    in the order the model requested them;
/// 3. exactly one [`Completed`](ModelResponseEvent::Completed).
///
/// After `Completed` the response yields `Ok(None)` forever. A response
/// that ends without `Completed` was cut off, and consumers may treat it as
/// a failure of the provider.
pub trait ModelResponse: Sized + Send + 'static {
    /// The failure type of the provider.
    type Error: ModelProviderError;

    /// Pulls the next event of the turn.
    ///
    /// `Poll::Pending` registers the current task for wake-up like any
    /// other poll function. `Ok(None)` ends the turn. An error ends the
    /// turn too, and everything received so far should be discarded.
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>>;
}

/// Why the model ended its turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFinishReason {
    /// The model is waiting for the results of the tools it called.
    ToolCalls,
    /// The model has answered.
    Stop,
    /// The model ran out of output tokens. The text may be truncated.
    Length,
}

/// One piece of an assistant turn.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelResponseEvent {
    /// More assistant text.
    MessageDelta(String),
    /// A fully received tool call.
    ToolCall(ToolCallRequest),
    /// The turn is over.
    Completed(ModelFinishReason),
}
