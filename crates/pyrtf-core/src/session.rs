//! Generation session state machine.
//!
//! A [`GenerationSession`] is owned by its caller (the TUI, the one-shot
//! command, a test) and holds the current [`Configuration`], the status of
//! the single in-flight request, and its outcome.
//!
//! ```text
//! Idle | Completed | Error  --begin()-->     Generating
//! Generating               --finish(Ok)-->  Completed
//! Generating               --finish(Err)--> Error
//! ```
//!
//! `begin()` while `Generating` is rejected with [`CoreError::Busy`].

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::client::GenerationClient;
use crate::config::{ConfigUpdate, Configuration};
use crate::error::{CoreError, GenerationFailure};
use crate::result::GenerationResult;

/// Lifecycle of one generation request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationStatus {
    #[default]
    Idle,
    Generating,
    Completed,
    Error,
}

impl GenerationStatus {
    /// Human-readable status label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Generating => "Generating...",
            Self::Completed => "Completed",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Point-in-time view of a session for the presentation layer.
///
/// Outside `Idle` and `Generating`, exactly one of `result` and `error` is
/// `Some`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub status: GenerationStatus,
    pub result: Option<GenerationResult>,
    pub error: Option<String>,
}

/// Session state for configuring and generating one utility at a time.
#[derive(Debug, Clone, Default)]
pub struct GenerationSession {
    config: Configuration,
    status: GenerationStatus,
    /// Last successful result; surfaced only while `Completed`.
    last_result: Option<GenerationResult>,
    error: Option<String>,
}

impl GenerationSession {
    /// Create an idle session holding `config`.
    pub fn new(config: Configuration) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Returns the current configuration.
    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// Replace the configuration wholesale.
    pub fn set_configuration(&mut self, config: Configuration) {
        self.config = config;
    }

    /// Replace one configuration field.
    pub fn update(&mut self, update: ConfigUpdate) {
        self.config = self.config.with_update(update);
    }

    /// Returns the current status.
    pub fn status(&self) -> GenerationStatus {
        self.status
    }

    /// Returns whether a request is in flight.
    pub fn is_generating(&self) -> bool {
        self.status == GenerationStatus::Generating
    }

    /// Returns the current result, present only while `Completed`.
    pub fn result(&self) -> Option<&GenerationResult> {
        match self.status {
            GenerationStatus::Completed => self.last_result.as_ref(),
            _ => None,
        }
    }

    /// Returns the error message, present only in the `Error` state.
    pub fn error(&self) -> Option<&str> {
        match self.status {
            GenerationStatus::Error => self.error.as_deref(),
            _ => None,
        }
    }

    /// Capture the status and surfaced outcome.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            result: self.result().cloned(),
            error: self.error().map(str::to_owned),
        }
    }

    /// Enter `Generating`, clearing the previous error.
    ///
    /// Returns the configuration the request should be built from.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Busy` if a request is already in flight.
    pub fn begin(&mut self) -> Result<Configuration, CoreError> {
        if self.is_generating() {
            warn!("generation requested while another request is in flight");
            return Err(CoreError::Busy);
        }

        debug!(from = ?self.status, "entering generating state");
        self.status = GenerationStatus::Generating;
        self.error = None;
        Ok(self.config.clone())
    }

    /// Record the outcome of the in-flight request.
    ///
    /// Success stores the result and enters `Completed`; failure stores the
    /// message and enters `Error`, keeping the previous result hidden. An
    /// outcome arriving outside `Generating` is ignored.
    pub fn finish(&mut self, outcome: Result<GenerationResult, GenerationFailure>) {
        if !self.is_generating() {
            warn!(status = ?self.status, "ignoring generation outcome outside generating state");
            return;
        }

        match outcome {
            Ok(result) => {
                self.last_result = Some(result);
                self.status = GenerationStatus::Completed;
            }
            Err(failure) => {
                let message = if failure.message().trim().is_empty() {
                    GenerationFailure::default().message().to_owned()
                } else {
                    failure.message().to_owned()
                };
                self.error = Some(message);
                self.status = GenerationStatus::Error;
            }
        }
        debug!(status = ?self.status, "generation finished");
    }

    /// Store `config`, run one generation with `client`, and return the
    /// resulting snapshot.
    ///
    /// Generation failures are reported through the snapshot, not as `Err`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Busy` if a request is already in flight.
    #[instrument(skip_all)]
    pub async fn invoke(
        &mut self,
        client: &GenerationClient,
        config: Configuration,
    ) -> Result<SessionSnapshot, CoreError> {
        if self.is_generating() {
            return Err(CoreError::Busy);
        }
        self.set_configuration(config);

        let config = self.begin()?;
        let outcome = client.generate(&config).await;
        self.finish(outcome);

        Ok(self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::GENERATION_FAILURE_MESSAGE;
    use crate::provider::mock::MockProvider;

    const FULL_REPLY: &str = r#"{"code":"C","requirements":"R","instructions":"I"}"#;

    fn client_with(provider: MockProvider) -> GenerationClient {
        let pm = pyrtf_pm::PromptManager::new().expect("should create manager");
        GenerationClient::new(pm, Arc::new(provider))
    }

    fn sample_result() -> GenerationResult {
        GenerationResult {
            code: "C".to_owned(),
            requirements: "R".to_owned(),
            instructions: "I".to_owned(),
        }
    }

    #[test]
    fn test_should_start_idle_without_result_or_error() {
        let session = GenerationSession::new(Configuration::default());
        let snapshot = session.snapshot();

        assert_eq!(snapshot.status, GenerationStatus::Idle);
        assert!(snapshot.result.is_none());
        assert!(snapshot.error.is_none());
    }

    #[test]
    fn test_should_walk_idle_generating_completed() {
        let mut session = GenerationSession::new(Configuration::default());

        let config = session.begin().expect("should begin");
        assert_eq!(config, Configuration::default());
        assert_eq!(session.status(), GenerationStatus::Generating);
        assert!(session.result().is_none());

        session.finish(Ok(sample_result()));
        assert_eq!(session.status(), GenerationStatus::Completed);
        assert_eq!(session.result(), Some(&sample_result()));
        assert!(session.error().is_none());
    }

    #[test]
    fn test_should_reject_begin_while_generating() {
        let mut session = GenerationSession::default();
        session.begin().expect("should begin");

        let second = session.begin();
        assert!(matches!(second, Err(CoreError::Busy)));
        assert_eq!(session.status(), GenerationStatus::Generating);
    }

    #[test]
    fn test_should_hide_previous_result_after_failure() {
        let mut session = GenerationSession::default();
        session.begin().expect("should begin");
        session.finish(Ok(sample_result()));

        session.begin().expect("should begin again");
        assert!(session.result().is_none(), "result is not surfaced while generating");
        session.finish(Err(GenerationFailure::new("boom")));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.status, GenerationStatus::Error);
        assert!(snapshot.result.is_none());
        assert_eq!(snapshot.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_should_replace_empty_failure_message() {
        let mut session = GenerationSession::default();
        session.begin().expect("should begin");
        session.finish(Err(GenerationFailure::new("  ")));

        assert_eq!(session.error(), Some(GENERATION_FAILURE_MESSAGE));
    }

    #[test]
    fn test_should_ignore_outcome_when_not_generating() {
        let mut session = GenerationSession::default();
        session.finish(Ok(sample_result()));

        assert_eq!(session.status(), GenerationStatus::Idle);
        assert!(session.result().is_none());
    }

    #[test]
    fn test_should_update_single_field_in_session() {
        let mut session = GenerationSession::default();
        session.update(ConfigUpdate::TocDepth(5));

        assert_eq!(session.configuration().toc_depth, 5);
        assert_eq!(
            session.configuration(),
            &Configuration::default().with_update(ConfigUpdate::TocDepth(5))
        );
    }

    #[test]
    fn test_should_serialize_status_in_screaming_snake_case() {
        let value = serde_json::to_value(GenerationStatus::Generating).expect("should serialize");
        assert_eq!(value, "GENERATING");
    }

    #[tokio::test]
    async fn test_should_complete_with_exact_reply_fields() {
        let client = client_with(MockProvider::replying(FULL_REPLY));
        let mut session = GenerationSession::default();

        let snapshot = session
            .invoke(&client, Configuration::default())
            .await
            .expect("should invoke");

        assert_eq!(snapshot.status, GenerationStatus::Completed);
        assert_eq!(snapshot.result, Some(sample_result()));
        assert!(snapshot.error.is_none());
    }

    #[tokio::test]
    async fn test_should_enter_error_for_non_json_reply() {
        let client = client_with(MockProvider::replying("<!doctype html>"));
        let mut session = GenerationSession::default();

        let snapshot = session
            .invoke(&client, Configuration::default())
            .await
            .expect("should invoke");

        assert_eq!(snapshot.status, GenerationStatus::Error);
        assert!(snapshot.result.is_none());
        let message = snapshot.error.expect("error message should be set");
        assert!(!message.is_empty());
    }

    #[tokio::test]
    async fn test_should_clear_error_when_retrying_after_failure() {
        let client = client_with(
            MockProvider::new()
                .then_fail("network down")
                .then_fail("still down"),
        );
        let mut session = GenerationSession::default();

        session
            .invoke(&client, Configuration::default())
            .await
            .expect("should invoke");
        assert_eq!(session.status(), GenerationStatus::Error);

        session.begin().expect("should begin retry");
        assert!(session.error().is_none(), "error cleared on entering generating");
        assert_eq!(session.snapshot().error, None);

        // Second attempt fails again; the new message comes from this attempt.
        let outcome = client.generate(session.configuration()).await;
        session.finish(outcome);
        assert_eq!(session.status(), GenerationStatus::Error);
        assert_eq!(session.error(), Some(GENERATION_FAILURE_MESSAGE));
    }

    #[tokio::test]
    async fn test_should_recover_after_error() {
        let client = client_with(MockProvider::new().then_fail("timeout").then_reply(FULL_REPLY));
        let mut session = GenerationSession::default();

        let first = session
            .invoke(&client, Configuration::default())
            .await
            .expect("should invoke");
        assert_eq!(first.status, GenerationStatus::Error);

        let second = session
            .invoke(&client, Configuration::default())
            .await
            .expect("should invoke");
        assert_eq!(second.status, GenerationStatus::Completed);
        assert!(second.error.is_none());
        assert_eq!(second.result, Some(sample_result()));
    }

    #[tokio::test]
    async fn test_should_store_invoked_configuration() {
        let client = client_with(MockProvider::replying(FULL_REPLY));
        let mut session = GenerationSession::default();
        let config = Configuration::default().with_update(ConfigUpdate::AppName("New".to_owned()));

        session.invoke(&client, config.clone()).await.expect("should invoke");
        assert_eq!(session.configuration(), &config);
    }

    #[tokio::test]
    async fn test_should_reject_invoke_while_generating() {
        let client = client_with(MockProvider::replying(FULL_REPLY));
        let mut session = GenerationSession::default();
        session.begin().expect("should begin");

        let result = session.invoke(&client, Configuration::default()).await;
        assert!(matches!(result, Err(CoreError::Busy)));
    }
}
