use crate::error::ModelProviderError;
use crate::request::ModelRequest;
use crate::response::ModelResponse;

/// A language model that can produce assistant turns.
///
/// Every [`send_request`](ModelProvider::send_request) call asks for exactly
/// one assistant turn continuing `req.messages`. The model may answer with
/// text, ask for some of `req.tools` to be called, or both. Tool names in
/// the turn must be the names given in `req.tools`, even if the provider
/// has to encode them differently on the wire.
///
/// Providers keep no conversation state between calls: the request carries
/// the whole history, tool calls and tool results included. A provider may
/// be dropped while a response is still being consumed.
pub trait ModelProvider: Send + Sync {
    /// The failure type of requests and responses.
    type Error: ModelProviderError;

    /// The streamed assistant turn.
    type Response: ModelResponse<Error = Self::Error>;

    /// Starts generating the next assistant turn.
    ///
    /// The returned future resolves once the model started answering. The
    /// turn itself is read from the response. Failures are classified with
    /// [`ModelProviderError::kind`] so that callers know whether sending
    /// the same request again may help.
    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static;
}
