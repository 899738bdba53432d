//! Step-up (redirect) authentication flow.
//!
//! The engine does not render anything itself: an external redirect-capable
//! renderer loads the confirmation URL and reports navigation events back
//! into this state machine. The flow resolves exactly once, through a
//! single-shot channel, no matter how many events arrive afterwards.
//!
//! ```text
//! Loading --(callback prefix reached | explicit confirmation)--> Success
//! Loading --(navigation failure)--> Error --(retry)--> Loading
//! any     --(cancel)--> Cancelled, or Failed if an error was recorded
//! ```

use tokio::sync::oneshot;
use url::Url;

use crate::errors::{ErrorCode, ErrorType, PaymentError};

/// Terminal result of one confirmation flow instance.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfirmationOutcome {
    Success,
    Failed(PaymentError),
    Cancelled,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum FlowState {
    Loading,
    Error,
    Finished,
}

/// State machine for one redirect confirmation attempt.
pub struct ConfirmationFlow {
    confirmation_url: Url,
    callback_prefix: Url,
    state: FlowState,
    last_error: Option<PaymentError>,
    outcome: Option<oneshot::Sender<ConfirmationOutcome>>,
}

impl ConfirmationFlow {
    /// Creates a flow for the given gateway confirmation URL. The returned
    /// receiver resolves exactly once with the terminal outcome.
    pub fn new(
        confirmation_url: Url,
        callback_prefix: Url,
    ) -> (Self, oneshot::Receiver<ConfirmationOutcome>) {
        let (outcome_tx, outcome_rx) = oneshot::channel();
        (
            Self {
                confirmation_url,
                callback_prefix,
                state: FlowState::Loading,
                last_error: None,
                outcome: Some(outcome_tx),
            },
            outcome_rx,
        )
    }

    /// The URL the renderer should load.
    pub fn confirmation_url(&self) -> &Url {
        &self.confirmation_url
    }

    pub fn is_finished(&self) -> bool {
        self.state == FlowState::Finished
    }

    /// The renderer observed a navigation to `url`. Reaching the callback
    /// prefix means the gateway accepted the confirmation; the match is a
    /// prefix match because the gateway appends query parameters.
    pub fn on_url_changed(&mut self, url: &Url) {
        if self.state == FlowState::Finished {
            return;
        }
        if url.as_str().starts_with(self.callback_prefix.as_str()) {
            self.finish(ConfirmationOutcome::Success);
        }
    }

    /// A page load completed on `url`; treated the same as a URL change.
    pub fn on_navigation_finished(&mut self, url: &Url) {
        self.on_url_changed(url);
    }

    /// The gateway signalled completion out of band.
    pub fn on_confirmed(&mut self) {
        if self.state == FlowState::Finished {
            return;
        }
        self.finish(ConfirmationOutcome::Success);
    }

    /// Navigation failed. The flow stays alive: the caller may retry.
    pub fn on_navigation_failed(&mut self, description: impl Into<String>) {
        if self.state == FlowState::Finished {
            return;
        }
        self.state = FlowState::Error;
        self.last_error = Some(
            PaymentError::new(ErrorCode::NetworkUnreachable, ErrorType::NetworkError)
                .with_message(description),
        );
    }

    /// Retries after a navigation failure, returning the URL to reload.
    pub fn on_retry(&mut self) -> Option<&Url> {
        match self.state {
            FlowState::Error => {
                self.state = FlowState::Loading;
                Some(&self.confirmation_url)
            }
            FlowState::Loading | FlowState::Finished => None,
        }
    }

    /// The caller abandoned the flow. Resolves as `Cancelled`, or as
    /// `Failed` when a navigation error was already recorded.
    pub fn on_cancelled(&mut self) {
        if self.state == FlowState::Finished {
            return;
        }
        match self.last_error.take() {
            Some(error) => self.finish(ConfirmationOutcome::Failed(error)),
            None => self.finish(ConfirmationOutcome::Cancelled),
        }
    }

    fn finish(&mut self, outcome: ConfirmationOutcome) {
        match self.outcome.take() {
            Some(sender) => {
                self.state = FlowState::Finished;
                // The receiver may already be gone; the flow is finished
                // either way.
                let _ = sender.send(outcome);
            }
            None => {
                tracing::debug!("confirmation flow already finished, dropping terminal event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow() -> (ConfirmationFlow, oneshot::Receiver<ConfirmationOutcome>) {
        ConfirmationFlow::new(
            Url::parse("https://acs.bank.example/challenge").unwrap(),
            Url::parse("https://merchant.example/callback").unwrap(),
        )
    }

    #[test]
    fn reaching_the_callback_prefix_succeeds() {
        let (mut flow, mut outcome) = flow();
        flow.on_url_changed(&Url::parse("https://merchant.example/callback?result=ok&tx=1").unwrap());
        assert!(flow.is_finished());
        assert_eq!(outcome.try_recv().unwrap(), ConfirmationOutcome::Success);
    }

    #[test]
    fn unrelated_navigation_does_not_finish_the_flow() {
        let (mut flow, mut outcome) = flow();
        flow.on_url_changed(&Url::parse("https://acs.bank.example/step2").unwrap());
        assert!(!flow.is_finished());
        assert!(outcome.try_recv().is_err());
    }

    #[test]
    fn exactly_one_terminal_outcome_is_delivered() {
        let (mut flow, mut outcome) = flow();
        let callback = Url::parse("https://merchant.example/callback?ok=1").unwrap();
        flow.on_url_changed(&callback);
        // Event storm after the terminal transition: all suppressed.
        flow.on_url_changed(&callback);
        flow.on_navigation_failed("late failure");
        flow.on_cancelled();
        flow.on_confirmed();
        assert_eq!(outcome.try_recv().unwrap(), ConfirmationOutcome::Success);
        assert!(outcome.try_recv().is_err());
    }

    #[test]
    fn cancelling_without_an_error_yields_cancelled() {
        let (mut flow, mut outcome) = flow();
        flow.on_cancelled();
        assert_eq!(outcome.try_recv().unwrap(), ConfirmationOutcome::Cancelled);
    }

    #[test]
    fn cancelling_after_an_error_yields_failed() {
        let (mut flow, mut outcome) = flow();
        flow.on_navigation_failed("TLS handshake failed");
        flow.on_cancelled();
        match outcome.try_recv().unwrap() {
            ConfirmationOutcome::Failed(error) => {
                assert_eq!(error.code, ErrorCode::NetworkUnreachable);
                assert_eq!(error.message.as_deref(), Some("TLS handshake failed"));
            }
            other => panic!("expected failed outcome, got {other:?}"),
        }
    }

    #[test]
    fn retry_reenters_loading_and_can_still_succeed() {
        let (mut flow, mut outcome) = flow();
        flow.on_navigation_failed("connection reset");
        assert_eq!(
            flow.on_retry().map(Url::as_str),
            Some("https://acs.bank.example/challenge")
        );
        assert!(flow.on_retry().is_none());
        flow.on_url_changed(&Url::parse("https://merchant.example/callback").unwrap());
        assert_eq!(outcome.try_recv().unwrap(), ConfirmationOutcome::Success);
    }
}
