use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::Instrument;

use super::client_types::ChatCompletionRequest;
use super::parser::{parse_card_response, parse_diagnosis_response};
use super::prompt::{build_card_messages, build_diagnosis_messages};
use super::state::ReleaseState;
use super::types::ChatClient;
use super::{DiagnosisError, ErrorCategory};
use crate::models::{CardResult, DiagnosisResult, SendMessage};

/// Result of a chain that reached `CardReady`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseOutcome {
    pub generation: u64,
    pub raw_input: String,
    pub diagnosis: DiagnosisResult,
    pub card: CardResult,
}

/// Drives the two-stage release pipeline:
/// user text → diagnosis call → parse → card call → parse → outcome.
///
/// Every state change goes through one `watch` channel as a full
/// snapshot. A new `submit` supersedes the chain in flight: the old task
/// is aborted and anything it still tries to publish is dropped.
pub struct DiagnosisOrchestrator {
    client: Arc<dyn ChatClient + Send + Sync>,
    model: String,
    state_tx: watch::Sender<ReleaseState>,
    /// Bumped on every submit/cancel; only the current chain may publish.
    generation: AtomicU64,
    in_flight: Mutex<Option<AbortHandle>>,
}

impl DiagnosisOrchestrator {
    pub fn new(client: Arc<dyn ChatClient + Send + Sync>, model: &str) -> Self {
        let (state_tx, _) = watch::channel(ReleaseState::default());
        Self {
            client,
            model: model.to_string(),
            state_tx,
            generation: AtomicU64::new(0),
            in_flight: Mutex::new(None),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Receive every published snapshot from now on.
    pub fn subscribe(&self) -> watch::Receiver<ReleaseState> {
        self.state_tx.subscribe()
    }

    /// Latest published snapshot.
    pub fn state(&self) -> ReleaseState {
        self.state_tx.borrow().clone()
    }

    /// Start a new chain for `raw_text`, superseding any chain in flight.
    ///
    /// Publishes `AwaitingDiagnosis` before returning. Must be called from
    /// within a Tokio runtime. The handle yields `Some` only when this
    /// chain reaches `CardReady` while still current.
    pub fn submit(self: &Arc<Self>, raw_text: impl Into<String>) -> JoinHandle<Option<ReleaseOutcome>> {
        let raw_text = raw_text.into();
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());

        let generation = self.advance(ReleaseState::awaiting_diagnosis);
        if let Some(previous) = in_flight.take() {
            tracing::info!(generation, "Superseding release chain in flight");
            previous.abort();
        }

        let this = Arc::clone(self);
        let span = tracing::info_span!("release_chain", generation);
        let handle = tokio::spawn(
            async move { this.run_chain(generation, raw_text).await }.instrument(span),
        );
        *in_flight = Some(handle.abort_handle());
        handle
    }

    /// Abort the chain in flight (if any) and return to `Idle`.
    pub fn cancel(&self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        let generation = self.advance(ReleaseState::idle);
        if let Some(previous) = in_flight.take() {
            tracing::info!(generation, "Release chain cancelled");
            previous.abort();
        }
    }

    /// Retry affordance: clear the invalid-input notice and go back to `Idle`.
    /// Returns false when no notice was showing.
    pub fn acknowledge_invalid_input(&self) -> bool {
        self.state_tx.send_if_modified(|state| {
            if !state.invalid_input_notice() {
                return false;
            }
            *state = ReleaseState::idle(state.generation);
            true
        })
    }

    /// Close a finished release (card shown, failure acknowledged).
    /// No effect while a request is in flight.
    pub fn dismiss(&self) -> bool {
        self.state_tx.send_if_modified(|state| {
            if !state.is_terminal() {
                return false;
            }
            *state = ReleaseState::idle(state.generation);
            true
        })
    }

    /// Bump the generation and publish `make(generation)` under one write lock.
    fn advance(&self, make: fn(u64) -> ReleaseState) -> u64 {
        let mut generation = 0;
        self.state_tx.send_modify(|state| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *state = make(generation);
        });
        generation
    }

    /// Publish `next` only if `generation` is still current.
    fn publish(&self, generation: u64, next: ReleaseState) -> bool {
        let published = self.state_tx.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *state = next;
            true
        });
        if !published {
            tracing::debug!(generation, "Dropping update from superseded chain");
        }
        published
    }

    /// The awaited two-step pipeline. Stage-2 starts only after Stage-1
    /// produced a valid diagnosis.
    async fn run_chain(&self, generation: u64, raw_text: String) -> Option<ReleaseOutcome> {
        let stage_one = build_diagnosis_messages(&raw_text);
        tracing::info!(chars = raw_text.chars().count(), "Requesting energy diagnosis");

        let diagnosis = match self
            .request_content(stage_one.clone())
            .await
            .and_then(|content| parse_diagnosis_response(&content))
        {
            Ok(diagnosis) => diagnosis,
            Err(e) => {
                self.publish(generation, diagnosis_failure(generation, &e));
                return None;
            }
        };

        tracing::info!(
            emotions = diagnosis.detected_emotions.len(),
            energy_state = %diagnosis.energy_state,
            "Diagnosis accepted, requesting card"
        );
        if !self.publish(generation, ReleaseState::awaiting_card(generation, diagnosis.clone())) {
            return None;
        }

        let Some(stage_two) = build_card_messages(&stage_one) else {
            let e = DiagnosisError::MalformedResponse("No user message to forward".into());
            self.publish(
                generation,
                ReleaseState::card_failed(generation, diagnosis, e.category(), e.user_message()),
            );
            return None;
        };

        let card = match self
            .request_content(stage_two)
            .await
            .and_then(|content| parse_card_response(&content))
        {
            Ok(card) => card,
            Err(e) => {
                tracing::warn!(error = %e, "Card request failed");
                let category = match e.category() {
                    ErrorCategory::InvalidInput => ErrorCategory::Decode,
                    other => other,
                };
                self.publish(
                    generation,
                    ReleaseState::card_failed(generation, diagnosis, category, e.user_message()),
                );
                return None;
            }
        };

        let ready = ReleaseState::card_ready(generation, diagnosis.clone(), card.clone());
        if !self.publish(generation, ready) {
            return None;
        }
        tracing::info!("Release card ready");

        Some(ReleaseOutcome {
            generation,
            raw_input: raw_text,
            diagnosis,
            card,
        })
    }

    /// One transport call on the blocking pool; returns the first choice's text.
    async fn request_content(&self, messages: Vec<SendMessage>) -> Result<String, DiagnosisError> {
        let request = ChatCompletionRequest::new(&self.model, messages);
        let client = Arc::clone(&self.client);

        let response = tokio::task::spawn_blocking(move || client.complete(&request))
            .await
            .map_err(|e| DiagnosisError::HttpClient(format!("Transport worker failed: {e}")))??;

        response.first_content().map(str::to_string)
    }
}

/// Map a Stage-1 failure to its terminal snapshot.
fn diagnosis_failure(generation: u64, error: &DiagnosisError) -> ReleaseState {
    match error.category() {
        ErrorCategory::InvalidInput => {
            tracing::info!("Release text rejected by the model");
            ReleaseState::invalid_input(generation)
        }
        category => {
            tracing::warn!(error = %error, ?category, "Diagnosis request failed");
            ReleaseState::diagnosis_failed(generation, category, error.user_message())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::enums::{EnergyState, Participant};
    use crate::pipeline::diagnosis::client::MockChatClient;
    use crate::pipeline::diagnosis::prompt::{CARD_SYSTEM_PROMPT, ENERGY_DIAGNOSIS_SYSTEM_PROMPT};
    use crate::pipeline::diagnosis::state::ReleasePhase;

    const DIAGNOSIS_REPLY: &str =
        r#"{"detectedEmotions":["anxious","tense"],"chakraBalance":{"heart":0.3},"energyState":"blocked"}"#;
    const CARD_REPLY: &str = r#"{"response":"Breathe deeply.","quote":"This too shall pass."}"#;

    fn orchestrator(client: &Arc<MockChatClient>) -> Arc<DiagnosisOrchestrator> {
        let client: Arc<dyn ChatClient + Send + Sync> = client.clone();
        Arc::new(DiagnosisOrchestrator::new(client, "test-model"))
    }

    #[tokio::test]
    async fn valid_diagnosis_chains_exactly_one_card_call() {
        let client = Arc::new(MockChatClient::with_contents(&[DIAGNOSIS_REPLY, CARD_REPLY]));
        let orch = orchestrator(&client);

        let outcome = orch.submit("I feel anxious and tense").await.unwrap().unwrap();

        assert_eq!(outcome.diagnosis.detected_emotions, vec!["anxious", "tense"]);
        assert_eq!(outcome.diagnosis.chakra_balance.get("heart"), Some(&0.3));
        assert_eq!(outcome.diagnosis.energy_state, EnergyState::Blocked);
        assert_eq!(outcome.card.response_text, "Breathe deeply.");
        assert_eq!(outcome.raw_input, "I feel anxious and tense");

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].messages[0].content, ENERGY_DIAGNOSIS_SYSTEM_PROMPT);
        assert_eq!(requests[1].messages.len(), 2);
        assert_eq!(requests[1].messages[0].content, CARD_SYSTEM_PROMPT);
        assert_eq!(requests[1].messages[1].role, Participant::User);
        assert_eq!(requests[1].messages[1].content, "I feel anxious and tense");
        assert!(requests.iter().all(|r| r.model == "test-model" && !r.stream));

        let state = orch.state();
        assert_eq!(state.phase, ReleasePhase::CardReady);
        assert!(state.show_card());
        assert!(!state.loading());
        assert!(!state.invalid_input_notice());
    }

    #[tokio::test]
    async fn invalid_marker_stops_before_card_call() {
        let client = Arc::new(MockChatClient::with_contents(&["INVALID_INPUT", CARD_REPLY]));
        let orch = orchestrator(&client);

        let outcome = orch.submit("asdfgh").await.unwrap();

        assert!(outcome.is_none());
        assert_eq!(client.call_count(), 1);
        let state = orch.state();
        assert_eq!(state.phase, ReleasePhase::InvalidInput);
        assert!(state.invalid_input_notice());
        assert!(!state.loading());
        assert!(state.error_message.is_none());
    }

    #[tokio::test]
    async fn undecodable_diagnosis_sets_error_and_notice() {
        let client = Arc::new(MockChatClient::with_contents(&["I am not sure what to say."]));
        let orch = orchestrator(&client);

        assert!(orch.submit("tired").await.unwrap().is_none());

        let state = orch.state();
        assert_eq!(
            state.phase,
            ReleasePhase::DiagnosisFailed { reason: ErrorCategory::Decode }
        );
        assert!(state.invalid_input_notice());
        assert!(state.error_message.is_some());
        assert!(!state.loading());
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn transport_failure_clears_loading() {
        let client = Arc::new(
            MockChatClient::with_contents(&[])
                .then_error(DiagnosisError::Connection("https://example.invalid".into())),
        );
        let orch = orchestrator(&client);

        assert!(orch.submit("angry").await.unwrap().is_none());

        let state = orch.state();
        assert_eq!(
            state.phase,
            ReleasePhase::DiagnosisFailed { reason: ErrorCategory::Transport }
        );
        assert!(!state.loading());
        assert!(!state.invalid_input_notice());
        assert!(state.error_message.unwrap().starts_with("Error: "));
    }

    #[tokio::test]
    async fn card_failure_keeps_diagnosis() {
        let client = Arc::new(MockChatClient::with_contents(&[DIAGNOSIS_REPLY, "no json here"]));
        let orch = orchestrator(&client);

        assert!(orch.submit("anxious").await.unwrap().is_none());

        let state = orch.state();
        assert_eq!(state.phase, ReleasePhase::CardFailed { reason: ErrorCategory::Decode });
        assert_eq!(state.diagnosis.as_ref().unwrap().energy_state, EnergyState::Blocked);
        assert!(state.card.is_none());
        assert!(!state.loading());
    }

    #[tokio::test]
    async fn card_transport_failure() {
        let client = Arc::new(
            MockChatClient::with_contents(&[DIAGNOSIS_REPLY])
                .then_error(DiagnosisError::ApiError { status: 502, body: "bad gateway".into() }),
        );
        let orch = orchestrator(&client);

        assert!(orch.submit("anxious").await.unwrap().is_none());
        assert_eq!(
            orch.state().phase,
            ReleasePhase::CardFailed { reason: ErrorCategory::Transport }
        );
    }

    #[tokio::test]
    async fn subscriber_sees_ordered_snapshots() {
        let client = Arc::new(
            MockChatClient::with_contents(&[DIAGNOSIS_REPLY, CARD_REPLY])
                .with_delay(Duration::from_millis(50)),
        );
        let orch = orchestrator(&client);
        let mut rx = orch.subscribe();

        let handle = orch.submit("anxious");

        let mut phases = Vec::new();
        loop {
            rx.changed().await.unwrap();
            let snapshot = rx.borrow_and_update().clone();
            // A ready card is never observed together with loading.
            assert!(!(snapshot.show_card() && snapshot.loading()));
            phases.push(snapshot.phase);
            if snapshot.is_terminal() {
                break;
            }
        }
        handle.await.unwrap();

        assert_eq!(
            phases,
            vec![
                ReleasePhase::AwaitingDiagnosis,
                ReleasePhase::AwaitingCard,
                ReleasePhase::CardReady
            ]
        );
    }

    #[tokio::test]
    async fn new_submit_supersedes_chain_in_flight() {
        let client = Arc::new(
            MockChatClient::with_contents(&[DIAGNOSIS_REPLY, DIAGNOSIS_REPLY, CARD_REPLY])
                .with_delay(Duration::from_millis(100)),
        );
        let orch = orchestrator(&client);

        let first = orch.submit("first release");
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = orch.submit("second release");

        let first_result = first.await;
        assert!(first_result.is_err() || first_result.unwrap().is_none());

        let outcome = second.await.unwrap().unwrap();
        assert_eq!(outcome.raw_input, "second release");
        assert_eq!(outcome.generation, 2);

        let state = orch.state();
        assert_eq!(state.generation, 2);
        assert_eq!(state.phase, ReleasePhase::CardReady);
    }

    #[tokio::test]
    async fn stale_publish_is_dropped() {
        let client = Arc::new(MockChatClient::with_contents(&[]));
        let orch = orchestrator(&client);

        let generation = orch.advance(ReleaseState::awaiting_diagnosis);
        orch.cancel();
        assert!(!orch.publish(generation, ReleaseState::invalid_input(generation)));
        assert_eq!(orch.state().phase, ReleasePhase::Idle);
    }

    #[tokio::test]
    async fn acknowledge_clears_notice() {
        let client = Arc::new(MockChatClient::with_contents(&["INVALID_INPUT"]));
        let orch = orchestrator(&client);
        orch.submit("qwerty").await.unwrap();

        assert!(orch.acknowledge_invalid_input());
        assert_eq!(orch.state().phase, ReleasePhase::Idle);
        assert!(!orch.acknowledge_invalid_input());
    }

    #[tokio::test]
    async fn dismiss_ignored_while_loading() {
        let client = Arc::new(
            MockChatClient::with_contents(&[DIAGNOSIS_REPLY, CARD_REPLY])
                .with_delay(Duration::from_millis(50)),
        );
        let orch = orchestrator(&client);
        let handle = orch.submit("anxious");

        assert!(!orch.dismiss());
        handle.await.unwrap();
        assert!(orch.dismiss());
        assert_eq!(orch.state().phase, ReleasePhase::Idle);
    }

    #[tokio::test]
    async fn cancel_aborts_and_returns_to_idle() {
        let client = Arc::new(
            MockChatClient::with_contents(&[DIAGNOSIS_REPLY, CARD_REPLY])
                .with_delay(Duration::from_millis(100)),
        );
        let orch = orchestrator(&client);
        let handle = orch.submit("anxious");
        tokio::time::sleep(Duration::from_millis(10)).await;

        orch.cancel();

        let result = handle.await;
        assert!(result.is_err() || result.unwrap().is_none());
        // Let the blocking call finish; nothing may overwrite Idle.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(orch.state().phase, ReleasePhase::Idle);
    }
}
