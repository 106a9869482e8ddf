//! Temporary step disabling around a queued build
//!
//! [`StepBracket::engage`] switches steps off one at a time. If any switch
//! fails, the steps already switched off are switched back on before the
//! error is returned. [`StepBracket::release`] switches everything back on,
//! attempting every step even when one fails. A step whose switch-off
//! request failed may still have been switched off by the server, so it gets
//! one best-effort switch-on request before the rollback.
//!
//! Release is async and cannot run from `Drop`. A bracket dropped while steps
//! are still off logs an error naming them.

use buildkick_client::{CiTransport, RestPaths};
use buildkick_report::{ArtifactSlot, DebugArtifacts, ServiceMessages};
use buildkick_utils::error::{BuildKickError, TransportError};
use buildkick_utils::types::BuildStep;
use tracing::{error, warn};

#[derive(Debug, Clone)]
struct ToggledStep {
    id: String,
    name: String,
}

/// Steps of one configuration switched off for the duration of its build.
pub struct StepBracket<'a> {
    transport: &'a dyn CiTransport,
    paths: &'a RestPaths,
    artifacts: &'a DebugArtifacts,
    messages: &'a ServiceMessages,
    config_id: String,
    disabled: Vec<ToggledStep>,
    released: bool,
}

impl std::fmt::Debug for StepBracket<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepBracket")
            .field("config_id", &self.config_id)
            .field("disabled", &self.step_ids())
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl<'a> StepBracket<'a> {
    #[must_use]
    pub fn new(
        transport: &'a dyn CiTransport,
        paths: &'a RestPaths,
        artifacts: &'a DebugArtifacts,
        messages: &'a ServiceMessages,
        config_id: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            paths,
            artifacts,
            messages,
            config_id: config_id.into(),
            disabled: Vec::new(),
            released: false,
        }
    }

    /// Ids of the steps currently switched off.
    #[must_use]
    pub fn step_ids(&self) -> Vec<String> {
        self.disabled.iter().map(|s| s.id.clone()).collect()
    }

    /// Switch off every step in `steps`, in order.
    ///
    /// # Errors
    ///
    /// Returns the first failure after rolling back the steps already switched
    /// off. When the rollback itself fails, returns
    /// `BuildKickError::StepsLeftDisabled` instead and logs the first failure.
    pub async fn engage<'s>(
        &mut self,
        steps: impl IntoIterator<Item = &'s BuildStep>,
    ) -> Result<(), BuildKickError> {
        for step in steps {
            if let Err(err) = self.disable(step).await {
                return Err(self.rollback(err).await);
            }
        }
        Ok(())
    }

    async fn disable(&mut self, step: &BuildStep) -> Result<(), BuildKickError> {
        self.messages.write_line(&format!(
            "Disabling: {}.{}: '{}'",
            self.config_id, step.id, step.name
        ));
        self.artifacts.record_request(ArtifactSlot::StepDisable, "true")?;
        let address = self.paths.step_disabled(&self.config_id, &step.id);
        let result = match self.transport.put_text(&address, "true").await {
            Ok(result) => result,
            Err(err) => {
                self.enable_uncertain(step, &address).await;
                return Err(err.into());
            }
        };
        self.disabled.push(ToggledStep {
            id: step.id.clone(),
            name: step.name.clone(),
        });
        self.artifacts
            .record_result(ArtifactSlot::StepDisable, Some(&result))?;
        Ok(())
    }

    /// Switch on a step whose switch-off outcome is unknown. Failures only warn.
    async fn enable_uncertain(&self, step: &BuildStep, address: &str) {
        self.messages.write_line(&format!(
            "Enabling: {}.{}: '{}'",
            self.config_id, step.id, step.name
        ));
        if let Err(e) = self.transport.put_text(address, "false").await {
            warn!(
                "Could not confirm {}.{} is enabled: {e}",
                self.config_id, step.id
            );
        }
    }

    async fn rollback(&mut self, err: BuildKickError) -> BuildKickError {
        match self.restore().await {
            Ok(()) => err,
            Err(restore_err) => {
                error!("Failed to disable steps in {}: {err}", self.config_id);
                restore_err
            }
        }
    }

    /// Switch every disabled step back on.
    ///
    /// # Errors
    ///
    /// Returns `BuildKickError::StepsLeftDisabled` naming every step that
    /// could not be switched back on, with the first transport failure as
    /// its source.
    pub async fn release(mut self) -> Result<(), BuildKickError> {
        self.restore().await
    }

    async fn restore(&mut self) -> Result<(), BuildKickError> {
        self.released = true;
        let steps = std::mem::take(&mut self.disabled);

        let mut left: Vec<String> = Vec::new();
        let mut first_failure: Option<TransportError> = None;
        for step in steps {
            self.messages.write_line(&format!(
                "Enabling: {}.{}: '{}'",
                self.config_id, step.id, step.name
            ));
            if let Err(e) = self.artifacts.record_request(ArtifactSlot::StepEnable, "false") {
                warn!("{e}");
            }
            let address = self.paths.step_disabled(&self.config_id, &step.id);
            match self.transport.put_text(&address, "false").await {
                Ok(result) => {
                    if let Err(e) = self
                        .artifacts
                        .record_result(ArtifactSlot::StepEnable, Some(&result))
                    {
                        warn!("{e}");
                    }
                }
                Err(e) => {
                    error!("Failed to re-enable {}.{}: {e}", self.config_id, step.id);
                    left.push(step.id);
                    first_failure.get_or_insert(e);
                }
            }
        }

        match first_failure {
            None => Ok(()),
            Some(source) => Err(BuildKickError::StepsLeftDisabled {
                config_id: self.config_id.clone(),
                step_ids: left,
                source,
            }),
        }
    }
}

impl Drop for StepBracket<'_> {
    fn drop(&mut self) {
        if !self.released && !self.disabled.is_empty() {
            error!(
                "Steps left disabled in {}: {}",
                self.config_id,
                self.step_ids().join(", ")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeTransport, paths};
    use buildkick_redaction::CredentialRedactor;
    use buildkick_report::CapturedOutput;

    fn steps() -> Vec<BuildStep> {
        vec![
            BuildStep::new("s1", "Compile", "MSBuild", false),
            BuildStep::new("s2", "Push", "NuGetPublish", false),
            BuildStep::new("s3", "Tag", "simpleRunner", false),
        ]
    }

    fn console() -> (CapturedOutput, ServiceMessages) {
        let captured = CapturedOutput::new();
        let messages = ServiceMessages::with_writer(captured.clone(), CredentialRedactor::new());
        (captured, messages)
    }

    #[tokio::test]
    async fn test_engage_then_release() {
        let fake = FakeTransport::new();
        let (captured, messages) = console();
        let (p, artifacts) = (paths(), DebugArtifacts::disabled());
        let mut bracket = StepBracket::new(&fake, &p, &artifacts, &messages, "A");

        bracket.engage(&steps()[..2]).await.unwrap();
        assert_eq!(bracket.step_ids(), vec!["s1", "s2"]);
        bracket.release().await.unwrap();

        assert_eq!(
            fake.toggles(),
            vec![
                ("A/steps/s1/disabled".to_string(), "true".to_string()),
                ("A/steps/s2/disabled".to_string(), "true".to_string()),
                ("A/steps/s1/disabled".to_string(), "false".to_string()),
                ("A/steps/s2/disabled".to_string(), "false".to_string()),
            ]
        );
        let text = captured.contents();
        assert!(text.contains("Disabling: A.s1: 'Compile'\n"));
        assert!(text.contains("Enabling: A.s2: 'Push'\n"));
    }

    #[tokio::test]
    async fn test_partial_disable_rolls_back() {
        let p = paths();
        let fake = FakeTransport::new().fail("PUT", &p.step_disabled("A", "s2"), 403);
        let (_captured, messages) = console();
        let artifacts = DebugArtifacts::disabled();
        let mut bracket = StepBracket::new(&fake, &p, &artifacts, &messages, "A");

        let err = bracket.engage(&steps()).await.unwrap_err();

        assert!(matches!(err, BuildKickError::Transport(_)));
        assert!(bracket.step_ids().is_empty());
        assert_eq!(
            fake.toggles(),
            vec![
                ("A/steps/s1/disabled".to_string(), "true".to_string()),
                ("A/steps/s2/disabled".to_string(), "true".to_string()),
                ("A/steps/s2/disabled".to_string(), "false".to_string()),
                ("A/steps/s1/disabled".to_string(), "false".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_disable_still_tries_to_enable_that_step() {
        let p = paths();
        let fake = FakeTransport::new()
            .fail("PUT", &p.step_disabled("A", "s1"), 504)
            .reply("PUT", &p.step_disabled("A", "s1"), "false");
        let (captured, messages) = console();
        let artifacts = DebugArtifacts::disabled();
        let mut bracket = StepBracket::new(&fake, &p, &artifacts, &messages, "A");

        let err = bracket.engage(&steps()).await.unwrap_err();

        assert!(matches!(err, BuildKickError::Transport(_)));
        assert_eq!(
            fake.toggles(),
            vec![
                ("A/steps/s1/disabled".to_string(), "true".to_string()),
                ("A/steps/s1/disabled".to_string(), "false".to_string()),
            ]
        );
        assert!(captured.contents().contains("Enabling: A.s1: 'Compile'\n"));
    }

    #[tokio::test]
    async fn test_failed_rollback_reports_steps_left_disabled() {
        let p = paths();
        let fake = FakeTransport::new()
            .reply("PUT", &p.step_disabled("A", "s1"), "true")
            .fail("PUT", &p.step_disabled("A", "s1"), 500)
            .fail("PUT", &p.step_disabled("A", "s2"), 403);
        let (_captured, messages) = console();
        let artifacts = DebugArtifacts::disabled();
        let mut bracket = StepBracket::new(&fake, &p, &artifacts, &messages, "A");

        let err = bracket.engage(&steps()).await.unwrap_err();

        match err {
            BuildKickError::StepsLeftDisabled {
                config_id,
                step_ids,
                source,
            } => {
                assert_eq!(config_id, "A");
                assert_eq!(step_ids, vec!["s1"]);
                assert!(source.address.ends_with("/A/steps/s1/disabled"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_release_attempts_every_step() {
        let p = paths();
        let fake = FakeTransport::new()
            .reply("PUT", &p.step_disabled("A", "s1"), "true")
            .fail("PUT", &p.step_disabled("A", "s1"), 500);
        let (_captured, messages) = console();
        let artifacts = DebugArtifacts::disabled();
        let mut bracket = StepBracket::new(&fake, &p, &artifacts, &messages, "A");
        bracket.engage(&steps()).await.unwrap();

        let err = bracket.release().await.unwrap_err();

        let enables: Vec<_> = fake
            .toggles()
            .into_iter()
            .filter(|(_, body)| body == "false")
            .map(|(address, _)| address)
            .collect();
        assert_eq!(
            enables,
            vec!["A/steps/s1/disabled", "A/steps/s2/disabled", "A/steps/s3/disabled"]
        );
        assert!(err.to_string().contains("Steps left disabled in A: s1"));
    }

    #[tokio::test]
    async fn test_empty_bracket_makes_no_calls() {
        let fake = FakeTransport::new();
        let (_captured, messages) = console();
        let (p, artifacts) = (paths(), DebugArtifacts::disabled());
        let mut bracket = StepBracket::new(&fake, &p, &artifacts, &messages, "A");
        bracket.engage(std::iter::empty()).await.unwrap();
        bracket.release().await.unwrap();
        assert!(fake.calls().is_empty());
    }
}
