use super::client_types::{ChatCompletionRequest, ChatCompletionResponse};
use super::DiagnosisError;

/// Chat-completion transport abstraction (allows mocking).
///
/// Implementations block; the orchestrator calls them from the blocking pool.
pub trait ChatClient {
    fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, DiagnosisError>;
}
