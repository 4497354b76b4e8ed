use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("{provider} request failed: {message}")]
    Request { provider: String, message: String },

    #[error("{provider} did not answer within {}s", .after.as_secs())]
    Timeout { provider: String, after: Duration },

    #[error("{provider} returned an empty reply")]
    EmptyReply { provider: String },

    /// A scripted client ran out of replies.
    #[error("no scripted reply left")]
    Exhausted,
}
