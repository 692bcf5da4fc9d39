//! Release service: the single entry point the UI shell talks to.
//!
//! Wraps the diagnosis orchestrator with the daily limit in front and
//! persistence behind it.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{ApiConfig, ConfigError, MAX_RELEASE_CHARS};
use crate::db::{self, DatabaseError};
use crate::persistence::{persist_release, PersistedRelease, ReleaseStore, SqliteReleaseStore};
use crate::pipeline::diagnosis::{
    ChatClient, ChatCompletionClient, DiagnosisError, DiagnosisOrchestrator, ReleaseState,
};
use crate::release_limit::{DailyReleaseLimit, ReleaseLimiter};

pub struct ReleaseService {
    orchestrator: Arc<DiagnosisOrchestrator>,
    limiter: Arc<dyn ReleaseLimiter>,
    store: Arc<dyn ReleaseStore>,
}

impl ReleaseService {
    pub fn new(
        client: Arc<dyn ChatClient + Send + Sync>,
        model: &str,
        limiter: Arc<dyn ReleaseLimiter>,
        store: Arc<dyn ReleaseStore>,
    ) -> Self {
        Self {
            orchestrator: Arc::new(DiagnosisOrchestrator::new(client, model)),
            limiter,
            store,
        }
    }

    /// Wire the HTTP client, the daily limit and the SQLite store for
    /// one database file. Runs migrations up front.
    pub fn open(config: ApiConfig, db_path: &Path) -> Result<Self, ReleaseError> {
        db::open_database(db_path)?;
        tracing::info!(
            path = %db_path.display(),
            model = %config.model,
            daily_limit = config.daily_release_limit,
            "Release service ready"
        );

        let client = Arc::new(ChatCompletionClient::from_config(&config));
        let limiter = Arc::new(DailyReleaseLimit::new(db_path, config.daily_release_limit));
        let store = Arc::new(SqliteReleaseStore::new(db_path));
        Ok(Self::new(client, &config.model, limiter, store))
    }

    pub fn subscribe(&self) -> watch::Receiver<ReleaseState> {
        self.orchestrator.subscribe()
    }

    pub fn state(&self) -> ReleaseState {
        self.orchestrator.state()
    }

    /// Start a release for `raw_text`.
    ///
    /// The limit is checked and consumed in one step before any network
    /// call. The handle resolves once the chain ends; `Some` when a card
    /// was shown and saved.
    pub async fn submit(
        &self,
        raw_text: &str,
    ) -> Result<JoinHandle<Option<PersistedRelease>>, ReleaseError> {
        if raw_text.trim().is_empty() {
            return Err(ReleaseError::EmptyInput);
        }
        if raw_text.chars().count() > MAX_RELEASE_CHARS {
            return Err(ReleaseError::InputTooLong { max: MAX_RELEASE_CHARS });
        }

        let limiter = Arc::clone(&self.limiter);
        let admitted = tokio::task::spawn_blocking(move || limiter.try_release())
            .await
            .map_err(|e| ReleaseError::Worker(e.to_string()))??;
        if !admitted {
            let limit = self.limiter.daily_limit();
            tracing::info!(limit, "Daily release limit reached");
            return Err(ReleaseError::LimitReached { limit });
        }

        let chain = self.orchestrator.submit(raw_text);
        let store = Arc::clone(&self.store);

        Ok(tokio::spawn(async move {
            let outcome = match chain.await {
                Ok(Some(outcome)) => outcome,
                Ok(None) => return None,
                Err(e) if e.is_cancelled() => return None,
                Err(e) => {
                    tracing::error!(error = %e, "Release chain panicked");
                    return None;
                }
            };

            tokio::task::spawn_blocking(move || {
                persist_release(
                    store.as_ref(),
                    &outcome.diagnosis,
                    &outcome.card,
                    &outcome.raw_input,
                )
            })
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Persistence worker failed");
                None
            })
        }))
    }

    pub fn acknowledge_invalid_input(&self) -> bool {
        self.orchestrator.acknowledge_invalid_input()
    }

    pub fn dismiss(&self) -> bool {
        self.orchestrator.dismiss()
    }

    pub fn cancel(&self) {
        self.orchestrator.cancel();
    }

    pub fn remaining_releases(&self) -> u32 {
        self.limiter.remaining()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    #[error("Nothing to release")]
    EmptyInput,
    #[error("Release text is longer than {max} characters")]
    InputTooLong { max: usize },
    #[error("Daily release limit of {limit} reached")]
    LimitReached { limit: u32 },
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Transport error: {0}")]
    Transport(#[from] DiagnosisError),
    #[error("Background worker failed: {0}")]
    Worker(String),
}
